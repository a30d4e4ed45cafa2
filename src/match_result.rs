//! Match results emitted by the search strategies.
//!
//! A [`MatchResult`] names the root order, the opposing orders it consumes, the
//! per item-pair quantities, and the agreed price and time.

use rust_decimal::Decimal;

use crate::geometry::PriceIntersection;
use crate::types::{OrderId, OrderItemId};

/// Which search strategy produced the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MatchKind {
    OneToOne,
    OneToMany,
}

/// `Active`: the curves have already crossed; priced at decision time.
/// `Pending`: the curves cross later; priced at the crossing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MatchStatus {
    Active,
    Pending,
}

/// Quantity moved from one root item to one opposing item.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Allocation {
    pub root_item_id: OrderItemId,
    pub opposing_item_id: OrderItemId,
    pub opposing_order_id: OrderId,
    pub quantity: u64,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MatchResult {
    pub kind: MatchKind,
    pub root_order_id: OrderId,
    pub opposing_order_ids: Vec<OrderId>,
    pub allocations: Vec<Allocation>,
    pub price_eth: Decimal,
    pub timestamp_ms: u64,
    pub status: MatchStatus,
}

impl MatchResult {
    /// Prices a match from its intersection as of `now_ms`.
    ///
    /// Returns `None` if `now_ms` or the agreed time is at or past `valid_until_ms`,
    /// the earliest end time among the involved orders.
    pub(crate) fn priced(
        kind: MatchKind,
        root_order_id: OrderId,
        opposing_order_ids: Vec<OrderId>,
        allocations: Vec<Allocation>,
        intersection: &PriceIntersection,
        valid_until_ms: u64,
        now_ms: u64,
    ) -> Option<Self> {
        if now_ms >= valid_until_ms || intersection.timestamp_ms >= valid_until_ms {
            return None;
        }
        let (status, timestamp_ms, price_eth) = if intersection.timestamp_ms > now_ms {
            (MatchStatus::Pending, intersection.timestamp_ms, intersection.price_eth)
        } else {
            (MatchStatus::Active, now_ms, intersection.price_at_time(now_ms))
        };
        Some(Self {
            kind,
            root_order_id,
            opposing_order_ids,
            allocations,
            price_eth,
            timestamp_ms,
            status,
        })
    }

    /// Sum of allocated quantities.
    pub fn total_quantity(&self) -> u64 {
        self.allocations.iter().map(|a| a.quantity).sum()
    }
}
