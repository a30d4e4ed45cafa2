//! # NFT Matching Engine
//!
//! Matching core for NFT listings and offers whose prices move linearly over
//! time (fixed-price and Dutch-auction orders).
//!
//! ## Entry point
//!
//! Use [`Matcher`] as the single entry point: build it over an [`OrderStore`]
//! and a [`Clock`], then call [`Matcher::match_order`] with the id of a root order.
//! It returns every one-to-one and one-to-many match found for that order.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use nft_matching_engine::{
//!     ChainId, FixedClock, InMemoryOrderStore, Matcher, MatcherConfig, Order, OrderId,
//!     OrderItem, OrderItemId, OrderStatus, Side,
//! };
//! use rust_decimal::Decimal;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let order = |id: u64, side: Side| Order {
//!     id: OrderId(id),
//!     chain_id: ChainId(1),
//!     side,
//!     num_items: 1,
//!     start_time_ms: 0,
//!     end_time_ms: 3_600_000,
//!     start_price_eth: Decimal::ONE,
//!     end_price_eth: Decimal::ONE,
//!     currency: "WETH".into(),
//!     status: OrderStatus::Active,
//!     maker: format!("maker-{}", id),
//! };
//! let listing = order(1, Side::Sell);
//! let offer = order(2, Side::Buy);
//! let store = InMemoryOrderStore::new();
//! let listing_item = OrderItem::for_order(&listing, OrderItemId(10), "0xabc", Some("7".into()));
//! let offer_item = OrderItem::for_order(&offer, OrderItemId(20), "0xabc", None);
//! store.insert(listing, vec![listing_item]).await;
//! store.insert(offer, vec![offer_item]).await;
//!
//! let matcher = Matcher::new(store, Arc::new(FixedClock::new(60_000)), MatcherConfig::default());
//! let outcome = matcher.match_order(OrderId(1), &[]).await.unwrap();
//! assert_eq!(outcome.matches.len(), 1);
//! assert_eq!(outcome.matches[0].price_eth, Decimal::ONE);
//! # });
//! ```
//!
//! ## Lower-level API
//!
//! [`intersect`], [`FlowGraph`], [`OneToOneSearch`] and [`OneToManySearch`] can be
//! used directly when orders are already in memory.

pub mod clock;
pub mod constraints;
pub mod error;
pub mod flow;
pub mod geometry;
pub mod match_result;
pub mod matcher;
pub mod one_to_many;
pub mod one_to_one;
pub mod order_gen;
pub mod store;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use constraints::{
    CandidateQuery, Constraint, ConstraintSet, Cursor, OrderItemConstraint, QueryFilter,
};
pub use error::{MatchError, MatchingResult};
pub use flow::{CollectionId, EdgeId, FlowError, FlowGraph, FlowStep, FlowStream, NodeId};
pub use geometry::{combine_curves, intersect, PriceCurve, PriceIntersection};
pub use match_result::{Allocation, MatchKind, MatchResult, MatchStatus};
pub use matcher::{MatchOutcome, Matcher, MatcherConfig, ScanMarker};
pub use one_to_many::OneToManySearch;
pub use one_to_one::OneToOneSearch;
pub use order_gen::{load_into_store, Generator, GeneratorConfig};
pub use store::{CandidateStream, InMemoryOrderStore, OrderStore, StoreError, StoreSnapshot};
pub use types::{
    CandidateOrder, ChainId, Order, OrderError, OrderId, OrderItem, OrderItemId, OrderStatus, Side,
};
