//! Matcher-level errors.
//!
//! "No match" is never an error: it is an empty result. Errors are either broken
//! graph invariants, malformed input orders, or failures of the external store.

use thiserror::Error;

use crate::flow::FlowError;
use crate::store::StoreError;
use crate::types::{OrderError, OrderId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error("order store: {0}")]
    Store(#[from] StoreError),

    #[error("invalid order: {0}")]
    InvalidOrder(#[from] OrderError),

    #[error("root order {0:?} not found")]
    RootNotFound(OrderId),

    #[error("root order {0:?} is not active")]
    RootNotActive(OrderId),
}

pub type MatchingResult<T> = std::result::Result<T, MatchError>;
