//! Price/time intersection of two linear price curves.
//!
//! Each order is priced along a segment from `(start_time_ms, start_price_eth)` to
//! `(end_time_ms, end_price_eth)`. [`intersect`] finds the earliest whole second at
//! which a listing and an offer agree on a price, and reports that price against
//! the seller's curve.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

const MS_PER_SECOND: u64 = 1_000;
/// Crossing times are kept to the nanosecond; finer digits are division noise.
const TIME_DP: u32 = 6;

/// A linear price curve over an order's validity window `[start_time_ms, end_time_ms)`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PriceCurve {
    pub start_time_ms: u64,
    pub end_time_ms: u64,
    pub start_price_eth: Decimal,
    pub end_price_eth: Decimal,
    pub is_sell_order: bool,
}

impl PriceCurve {
    /// ETH per millisecond. Zero for flat or zero-length curves.
    pub fn slope(&self) -> Decimal {
        if self.end_time_ms <= self.start_time_ms {
            return Decimal::ZERO;
        }
        (self.end_price_eth - self.start_price_eth)
            / Decimal::from(self.end_time_ms - self.start_time_ms)
    }

    pub fn intercept(&self) -> Decimal {
        self.start_price_eth - self.slope() * Decimal::from(self.start_time_ms)
    }

    /// Price on the line through this curve at `time_ms`. Not clamped to the window.
    pub fn price_at(&self, time_ms: u64) -> Decimal {
        self.slope() * Decimal::from(time_ms) + self.intercept()
    }

    pub fn overlaps(&self, other: &PriceCurve) -> bool {
        self.start_time_ms.max(other.start_time_ms) < self.end_time_ms.min(other.end_time_ms)
    }
}

/// Earliest agreed `(timestamp, price)` between a listing and an offer.
///
/// `price_at_time` evaluates the seller's line, which is authoritative once the
/// curves have crossed.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PriceIntersection {
    pub timestamp_ms: u64,
    pub price_eth: Decimal,
    slope: Decimal,
    intercept: Decimal,
}

impl PriceIntersection {
    fn on_seller_curve(seller: &PriceCurve, timestamp_ms: u64) -> Self {
        let slope = seller.slope();
        let intercept = seller.intercept();
        Self {
            timestamp_ms,
            price_eth: slope * Decimal::from(timestamp_ms) + intercept,
            slope,
            intercept,
        }
    }

    pub fn price_at_time(&self, time_ms: u64) -> Decimal {
        self.slope * Decimal::from(time_ms) + self.intercept
    }
}

/// Intersects a listing curve with an offer curve (in either argument order).
///
/// Returns `None` when both curves are on the same side, when the windows do not
/// overlap, when the buyer never bids at least the seller's price inside the
/// overlap, or when the agreed whole second falls at or past the end of either
/// window.
pub fn intersect(a: &PriceCurve, b: &PriceCurve) -> Option<PriceIntersection> {
    let (seller, buyer) = match (a.is_sell_order, b.is_sell_order) {
        (true, false) => (a, b),
        (false, true) => (b, a),
        _ => return None,
    };
    if !a.overlaps(b) {
        return None;
    }
    let earlier_end = a.end_time_ms.min(b.end_time_ms);

    let agreed_ms = match crossing_time(seller, buyer) {
        Some(crossing_ms) => crossing_ms,
        None => {
            // Parallel, collinear or crossing outside the windows: agree from the
            // start of the overlap if the buyer is already at or above the seller.
            let later_start = a.start_time_ms.max(b.start_time_ms);
            if buyer.price_at(later_start) < seller.price_at(later_start) {
                return None;
            }
            Decimal::from(later_start)
        }
    };
    let timestamp_ms = ceil_to_second(agreed_ms)?;
    if timestamp_ms >= earlier_end {
        return None;
    }
    Some(PriceIntersection::on_seller_curve(seller, timestamp_ms))
}

/// Time of the point intersection of the two segments, if `t` and `u` are both in
/// `[0, 1]`. Taken as a single quotient and kept to `TIME_DP` places.
fn crossing_time(p: &PriceCurve, q: &PriceCurve) -> Option<Decimal> {
    let (x1, y1) = (Decimal::from(p.start_time_ms), p.start_price_eth);
    let (x2, y2) = (Decimal::from(p.end_time_ms), p.end_price_eth);
    let (x3, y3) = (Decimal::from(q.start_time_ms), q.start_price_eth);
    let (x4, y4) = (Decimal::from(q.end_time_ms), q.end_price_eth);

    let mut denominator = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);
    if denominator.is_zero() {
        return None;
    }
    let mut t_num = (x1 - x3) * (y3 - y4) - (y1 - y3) * (x3 - x4);
    let mut u_num = (x1 - x3) * (y1 - y2) - (y1 - y3) * (x1 - x2);
    if denominator < Decimal::ZERO {
        denominator = -denominator;
        t_num = -t_num;
        u_num = -u_num;
    }
    let unit = Decimal::ZERO..=denominator;
    if !unit.contains(&t_num) || !unit.contains(&u_num) {
        return None;
    }
    let time_ms = (x1 * denominator + t_num * (x2 - x1)) / denominator;
    Some(time_ms.round_dp(TIME_DP))
}

fn ceil_to_second(time_ms: Decimal) -> Option<u64> {
    let second = Decimal::from(MS_PER_SECOND);
    ((time_ms / second).ceil() * second).to_u64()
}

/// Sums same-side curves over their common window, e.g. several offers filling
/// one listing together. `None` if the set is empty, mixes sides, or the windows
/// share no instant.
pub fn combine_curves(curves: &[PriceCurve]) -> Option<PriceCurve> {
    let first = curves.first()?;
    if curves.iter().any(|c| c.is_sell_order != first.is_sell_order) {
        return None;
    }
    let start_time_ms = curves.iter().map(|c| c.start_time_ms).max()?;
    let end_time_ms = curves.iter().map(|c| c.end_time_ms).min()?;
    if start_time_ms >= end_time_ms {
        return None;
    }
    Some(PriceCurve {
        start_time_ms,
        end_time_ms,
        start_price_eth: curves.iter().map(|c| c.price_at(start_time_ms)).sum(),
        end_price_eth: curves.iter().map(|c| c.price_at(end_time_ms)).sum(),
        is_sell_order: first.is_sell_order,
    })
}
