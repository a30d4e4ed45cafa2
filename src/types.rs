//! Core types and IDs for the matching core.
//!
//! All identifiers are newtype wrappers. [`Order`] is a listing or an offer priced
//! along a linear (Dutch) curve; [`OrderItem`] is one decomposed unit of an order,
//! denormalized with the fields of its owning order the way an indexed store keeps it.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::constraints::ConstraintSet;
use crate::geometry::PriceCurve;

/// Unique order identifier.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct OrderId(pub u64);

/// Order item identifier.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct OrderItemId(pub u64);

/// Chain identifier (e.g. 1 for mainnet).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ChainId(pub u64);

/// Order side. A listing sells, an offer buys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Order lifecycle status as seen by the matcher. Only `Active` orders are matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum OrderStatus {
    Active,
    Inactive,
    Filled,
    Cancelled,
    Expired,
}

/// Rejection reasons for malformed orders.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("order {0} has no items to trade")]
    ZeroItems(u64),

    #[error("order {0} ends before it starts")]
    EmptyWindow(u64),

    #[error("order {0} has a negative price")]
    NegativePrice(u64),
}

/// Listing or offer.
///
/// Valid over `[start_time_ms, end_time_ms)`; the total price for all `num_items`
/// moves linearly from `start_price_eth` to `end_price_eth`. A flat price has both
/// endpoints equal.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub chain_id: ChainId,
    pub side: Side,
    pub num_items: u64,
    pub start_time_ms: u64,
    pub end_time_ms: u64,
    pub start_price_eth: Decimal,
    pub end_price_eth: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub maker: String,
}

impl Order {
    pub fn is_sell_order(&self) -> bool {
        matches!(self.side, Side::Sell)
    }

    /// Price curve for the whole order (all `num_items`).
    pub fn curve(&self) -> PriceCurve {
        PriceCurve {
            start_time_ms: self.start_time_ms,
            end_time_ms: self.end_time_ms,
            start_price_eth: self.start_price_eth,
            end_price_eth: self.end_price_eth,
            is_sell_order: self.is_sell_order(),
        }
    }

    pub fn validate(&self) -> Result<(), OrderError> {
        if self.num_items == 0 {
            return Err(OrderError::ZeroItems(self.id.0));
        }
        if self.end_time_ms <= self.start_time_ms {
            return Err(OrderError::EmptyWindow(self.id.0));
        }
        if self.start_price_eth.is_sign_negative() || self.end_price_eth.is_sign_negative() {
            return Err(OrderError::NegativePrice(self.id.0));
        }
        Ok(())
    }
}

/// One asset (or, for collection-wide offers, one criterion) of an order.
///
/// Carries a copy of the owning order's window, prices and status so constraints can
/// be evaluated on items alone.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub chain_id: ChainId,
    pub side: Side,
    pub currency: String,
    pub collection: String,
    /// `None` matches any token of `collection`. Only offers may leave it open.
    pub token_id: Option<String>,
    /// Token amount per asset (1 for ERC-721).
    pub num_tokens: u64,
    /// Upper bound on how much of the order's quantity this item can fill by itself.
    pub max_num_items_contribution: u64,
    pub num_items: u64,
    pub start_time_ms: u64,
    pub end_time_ms: u64,
    pub start_price_eth: Decimal,
    pub end_price_eth: Decimal,
    pub order_status: OrderStatus,
}

impl OrderItem {
    /// Builds an item for `order` covering one asset of `collection`.
    pub fn for_order(
        order: &Order,
        id: OrderItemId,
        collection: impl Into<String>,
        token_id: Option<String>,
    ) -> Self {
        let max_num_items_contribution = if token_id.is_some() { 1 } else { order.num_items };
        Self {
            id,
            order_id: order.id,
            chain_id: order.chain_id,
            side: order.side,
            currency: order.currency.clone(),
            collection: collection.into(),
            token_id,
            num_tokens: 1,
            max_num_items_contribution,
            num_items: order.num_items,
            start_time_ms: order.start_time_ms,
            end_time_ms: order.end_time_ms,
            start_price_eth: order.start_price_eth,
            end_price_eth: order.end_price_eth,
            order_status: order.status,
        }
    }

    pub fn is_sell_order(&self) -> bool {
        matches!(self.side, Side::Sell)
    }

    /// Curve of the price paid per item of the owning order.
    pub fn per_item_curve(&self) -> PriceCurve {
        let n = Decimal::from(self.num_items.max(1));
        PriceCurve {
            start_time_ms: self.start_time_ms,
            end_time_ms: self.end_time_ms,
            start_price_eth: self.start_price_eth / n,
            end_price_eth: self.end_price_eth / n,
            is_sell_order: self.is_sell_order(),
        }
    }

    pub fn constraints(&self) -> ConstraintSet {
        ConstraintSet::for_item(self)
    }

    /// Higher means more restrictive; stores hand out high-score items first.
    pub fn constraint_score(&self) -> u32 {
        self.constraints().score(self)
    }

    /// True if `candidate` satisfies every constraint of this item.
    pub fn is_match(&self, candidate: &OrderItem) -> bool {
        self.constraints().is_satisfied(self, candidate)
    }
}

/// An opposing order together with its items, as handed to the search strategies.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CandidateOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn order(
        id: u64,
        side: Side,
        num_items: u64,
        start: u64,
        end: u64,
        start_price: Decimal,
        end_price: Decimal,
    ) -> Order {
        Order {
            id: OrderId(id),
            chain_id: ChainId(1),
            side,
            num_items,
            start_time_ms: start,
            end_time_ms: end,
            start_price_eth: start_price,
            end_price_eth: end_price,
            currency: "WETH".into(),
            status: OrderStatus::Active,
            maker: format!("maker-{}", id),
        }
    }

    pub fn flat(id: u64, side: Side, num_items: u64, price: i64) -> Order {
        order(id, side, num_items, 100_000, 200_000, Decimal::from(price), Decimal::from(price))
    }

    /// `order` with one specific token item per unit, ids `id * 100 + i`.
    pub fn items(order: &Order, collection: &str) -> Vec<OrderItem> {
        (0..order.num_items)
            .map(|i| {
                OrderItem::for_order(
                    order,
                    OrderItemId(order.id.0 * 100 + i),
                    collection,
                    Some(format!("{}", i)),
                )
            })
            .collect()
    }

    /// Single collection-wide item able to fill the whole order.
    pub fn collection_item(order: &Order, collection: &str) -> OrderItem {
        OrderItem::for_order(order, OrderItemId(order.id.0 * 100), collection, None)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn validate_rejects_zero_items_and_empty_window() {
        let mut o = flat(1, Side::Sell, 1, 1);
        assert!(o.validate().is_ok());
        o.num_items = 0;
        assert_eq!(o.validate(), Err(OrderError::ZeroItems(1)));
        let mut o = flat(2, Side::Sell, 1, 1);
        o.end_time_ms = o.start_time_ms;
        assert_eq!(o.validate(), Err(OrderError::EmptyWindow(2)));
    }

    #[test]
    fn per_item_curve_divides_by_num_items() {
        let o = flat(1, Side::Sell, 4, 2);
        let item = collection_item(&o, "0xabc");
        let curve = item.per_item_curve();
        assert_eq!(curve.start_price_eth, Decimal::new(5, 1));
        assert!(curve.is_sell_order);
        assert_eq!(item.max_num_items_contribution, 4);
    }

    #[test]
    fn specific_token_item_contributes_one() {
        let o = flat(1, Side::Sell, 3, 3);
        let its = items(&o, "0xabc");
        assert_eq!(its.len(), 3);
        assert!(its.iter().all(|i| i.max_num_items_contribution == 1));
    }
}
