//! Composable order-item constraints.
//!
//! Every [`Constraint`] variant does two jobs: an exact in-memory check of a
//! candidate item ([`OrderItemConstraint::is_satisfied`]) and a contribution to the
//! store query that fetches candidates in the first place (filters, ordering and the
//! pagination cursor). A [`ConstraintSet`] composes them by plain iteration.

use rust_decimal::Decimal;
use std::cmp::Ordering;

use crate::geometry::intersect;
use crate::types::{ChainId, OrderItem, OrderItemId, OrderStatus, Side};

/// Indexable filter a store can apply before returning candidates.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum QueryFilter {
    ChainId(ChainId),
    Side(Side),
    Currency(String),
    Collection(String),
    /// The given token, or a collection-wide item.
    TokenIdOrAny(String),
    NumTokens(u64),
    Status(OrderStatus),
    EndTimeAfter(u64),
}

impl QueryFilter {
    pub fn accepts(&self, item: &OrderItem) -> bool {
        match self {
            QueryFilter::ChainId(chain) => item.chain_id == *chain,
            QueryFilter::Side(side) => item.side == *side,
            QueryFilter::Currency(currency) => item.currency == *currency,
            QueryFilter::Collection(collection) => item.collection == *collection,
            QueryFilter::TokenIdOrAny(token) => item.token_id.as_ref().map_or(true, |t| t == token),
            QueryFilter::NumTokens(n) => item.num_tokens == *n,
            QueryFilter::Status(status) => item.order_status == *status,
            QueryFilter::EndTimeAfter(t) => item.end_time_ms > *t,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Sort key of a candidate query. Ties are broken by ascending item id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SortKey {
    /// Order start price divided by its `num_items`.
    StartPricePerItem,
}

impl SortKey {
    pub fn value(&self, item: &OrderItem) -> Decimal {
        match self {
            SortKey::StartPricePerItem => {
                item.start_price_eth / Decimal::from(item.num_items.max(1))
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QueryOrdering {
    pub key: SortKey,
    pub direction: SortDirection,
}

/// Resume point of a paginated candidate stream: the sort value and id of the
/// last item returned.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Cursor {
    pub sort_value: Decimal,
    pub item_id: OrderItemId,
}

/// Derives the cursor from the last item of a page.
pub type CursorExtractor = fn(&OrderItem) -> Cursor;

fn cursor_by_price(item: &OrderItem) -> Cursor {
    Cursor {
        sort_value: SortKey::StartPricePerItem.value(item),
        item_id: item.id,
    }
}

fn cursor_by_id(item: &OrderItem) -> Cursor {
    Cursor {
        sort_value: Decimal::ZERO,
        item_id: item.id,
    }
}

/// Query for opposing candidates, as narrowed by a [`ConstraintSet`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CandidateQuery {
    pub filters: Vec<QueryFilter>,
    pub ordering: Option<QueryOrdering>,
    pub page_size: usize,
    pub cursor: Option<Cursor>,
}

impl CandidateQuery {
    pub fn new(page_size: usize) -> Self {
        Self {
            filters: Vec::new(),
            ordering: None,
            page_size,
            cursor: None,
        }
    }

    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn accepts(&self, item: &OrderItem) -> bool {
        self.filters.iter().all(|f| f.accepts(item))
    }

    fn position(&self, item: &OrderItem) -> Cursor {
        match self.ordering {
            Some(ordering) => Cursor {
                sort_value: ordering.key.value(item),
                item_id: item.id,
            },
            None => cursor_by_id(item),
        }
    }

    /// Result order of the query.
    pub fn compare(&self, a: &OrderItem, b: &OrderItem) -> Ordering {
        let (pa, pb) = (self.position(a), self.position(b));
        let by_value = match self.ordering.map(|o| o.direction) {
            Some(SortDirection::Desc) => pb.sort_value.cmp(&pa.sort_value),
            _ => pa.sort_value.cmp(&pb.sort_value),
        };
        by_value.then(pa.item_id.cmp(&pb.item_id))
    }

    /// True if `item` sorts strictly after the query cursor (or there is no cursor).
    pub fn is_after_cursor(&self, item: &OrderItem) -> bool {
        let Some(cursor) = &self.cursor else {
            return true;
        };
        let pos = self.position(item);
        let by_value = match self.ordering.map(|o| o.direction) {
            Some(SortDirection::Desc) => cursor.sort_value.cmp(&pos.sort_value),
            _ => pos.sort_value.cmp(&cursor.sort_value),
        };
        by_value.then(pos.item_id.cmp(&cursor.item_id)) == Ordering::Greater
    }
}

/// Capability shared by every constraint kind.
pub trait OrderItemConstraint {
    /// Exact check of `candidate` against `source`.
    fn is_satisfied(&self, source: &OrderItem, candidate: &OrderItem) -> bool;

    /// Adds an indexable filter. Default: none.
    fn narrow_query(&self, _source: &OrderItem, query: CandidateQuery) -> CandidateQuery {
        query
    }

    /// Adds a sort key and returns the matching cursor extractor. Default: none.
    fn add_ordering(
        &self,
        _source: &OrderItem,
        query: CandidateQuery,
    ) -> (CandidateQuery, Option<CursorExtractor>) {
        (query, None)
    }

    /// Restrictiveness of this constraint for `source`.
    fn score(&self, _source: &OrderItem) -> u32 {
        0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Constraint {
    Chain,
    Side,
    Currency,
    Collection,
    Token,
    NumTokens,
    Status,
    EndTime,
    Price,
}

impl Constraint {
    pub const ALL: [Constraint; 9] = [
        Constraint::Chain,
        Constraint::Side,
        Constraint::Currency,
        Constraint::Collection,
        Constraint::Token,
        Constraint::NumTokens,
        Constraint::Status,
        Constraint::EndTime,
        Constraint::Price,
    ];
}

impl OrderItemConstraint for Constraint {
    fn is_satisfied(&self, source: &OrderItem, candidate: &OrderItem) -> bool {
        match self {
            Constraint::Chain => source.chain_id == candidate.chain_id,
            Constraint::Side => candidate.side == source.side.opposite(),
            Constraint::Currency => source.currency == candidate.currency,
            Constraint::Collection => source.collection == candidate.collection,
            Constraint::Token => match (&source.token_id, &candidate.token_id) {
                (Some(a), Some(b)) => a == b,
                (None, None) => false,
                _ => true,
            },
            Constraint::NumTokens => source.num_tokens == candidate.num_tokens,
            Constraint::Status => candidate.order_status == OrderStatus::Active,
            Constraint::EndTime => candidate.end_time_ms > source.start_time_ms,
            Constraint::Price => {
                intersect(&source.per_item_curve(), &candidate.per_item_curve()).is_some()
            }
        }
    }

    fn narrow_query(&self, source: &OrderItem, query: CandidateQuery) -> CandidateQuery {
        match self {
            Constraint::Chain => query.with_filter(QueryFilter::ChainId(source.chain_id)),
            Constraint::Side => query.with_filter(QueryFilter::Side(source.side.opposite())),
            Constraint::Currency => {
                query.with_filter(QueryFilter::Currency(source.currency.clone()))
            }
            Constraint::Collection => {
                query.with_filter(QueryFilter::Collection(source.collection.clone()))
            }
            Constraint::Token => match &source.token_id {
                Some(token) => query.with_filter(QueryFilter::TokenIdOrAny(token.clone())),
                None => query,
            },
            Constraint::NumTokens => query.with_filter(QueryFilter::NumTokens(source.num_tokens)),
            Constraint::Status => query.with_filter(QueryFilter::Status(OrderStatus::Active)),
            Constraint::EndTime => {
                query.with_filter(QueryFilter::EndTimeAfter(source.start_time_ms))
            }
            // A moving curve has no cheap index range.
            Constraint::Price => query,
        }
    }

    fn add_ordering(
        &self,
        source: &OrderItem,
        mut query: CandidateQuery,
    ) -> (CandidateQuery, Option<CursorExtractor>) {
        match self {
            Constraint::Price => {
                // Cheapest listings for a buyer, richest offers for a seller.
                let direction = match source.side {
                    Side::Buy => SortDirection::Asc,
                    Side::Sell => SortDirection::Desc,
                };
                query.ordering = Some(QueryOrdering {
                    key: SortKey::StartPricePerItem,
                    direction,
                });
                (query, Some(cursor_by_price as CursorExtractor))
            }
            _ => (query, None),
        }
    }

    fn score(&self, source: &OrderItem) -> u32 {
        match self {
            Constraint::Collection => 1,
            Constraint::Token if source.token_id.is_some() => 2,
            _ => 0,
        }
    }
}

/// The constraints of one order item, applied in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn new(constraints: Vec<Constraint>) -> Self {
        Self { constraints }
    }

    /// Every constraint kind applies to every item.
    pub fn for_item(_item: &OrderItem) -> Self {
        Self::new(Constraint::ALL.to_vec())
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn is_satisfied(&self, source: &OrderItem, candidate: &OrderItem) -> bool {
        self.constraints.iter().all(|c| c.is_satisfied(source, candidate))
    }

    pub fn score(&self, source: &OrderItem) -> u32 {
        self.constraints.iter().map(|c| c.score(source)).sum()
    }

    /// Composes every constraint's filter and ordering into one query. The cursor
    /// extractor is the one contributed by the last ordering constraint.
    pub fn build_query(
        &self,
        source: &OrderItem,
        page_size: usize,
    ) -> (CandidateQuery, CursorExtractor) {
        let mut query = CandidateQuery::new(page_size);
        let mut extractor: CursorExtractor = cursor_by_id;
        for constraint in &self.constraints {
            query = constraint.narrow_query(source, query);
            let (ordered, contributed) = constraint.add_ordering(source, query);
            query = ordered;
            if let Some(contributed) = contributed {
                extractor = contributed;
            }
        }
        (query, extractor)
    }
}
