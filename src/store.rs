//! Order store port and an in-memory implementation.
//!
//! The matcher only reads: a root order and its items, and pages of candidate
//! items narrowed by a [`CandidateQuery`]. [`CandidateStream`] turns the paged
//! query into a resumable sequence. [`InMemoryOrderStore`] backs tests, benches
//! and embedders without a database.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::constraints::{CandidateQuery, Cursor, CursorExtractor};
use crate::types::{Order, OrderId, OrderItem, OrderStatus};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("malformed record: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Items of one order, most restrictive (highest constraint score) first.
    async fn get_order_items(&self, id: OrderId) -> Result<Vec<OrderItem>, StoreError>;

    /// At most `query.page_size` items accepted by the query's filters, in query
    /// order, strictly after the query's cursor.
    async fn stream_candidates(&self, query: &CandidateQuery) -> Result<Vec<OrderItem>, StoreError>;
}

/// Paged walk over a candidate query. The cursor advances after every page, so a
/// stream can be dropped and rebuilt from [`CandidateStream::cursor`].
#[derive(Debug, Clone)]
pub struct CandidateStream {
    query: CandidateQuery,
    extractor: CursorExtractor,
    exhausted: bool,
}

impl CandidateStream {
    pub fn new(query: CandidateQuery, extractor: CursorExtractor) -> Self {
        Self {
            query,
            extractor,
            exhausted: false,
        }
    }

    /// Position after the last item handed out.
    pub fn cursor(&self) -> Option<&Cursor> {
        self.query.cursor.as_ref()
    }

    /// True once a short or empty page has been seen.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Fetches the next page, or `None` once the store has nothing further.
    pub async fn next_page<S>(&mut self, store: &S) -> Result<Option<Vec<OrderItem>>, StoreError>
    where
        S: OrderStore + ?Sized,
    {
        if self.exhausted {
            return Ok(None);
        }
        let page = store.stream_candidates(&self.query).await?;
        if page.len() < self.query.page_size {
            self.exhausted = true;
        }
        let Some(last) = page.last() else {
            self.exhausted = true;
            return Ok(None);
        };
        self.query.cursor = Some((self.extractor)(last));
        Ok(Some(page))
    }
}

/// Orders and items as loaded from a JSON fixture.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct StoreSnapshot {
    pub orders: Vec<Order>,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Default)]
struct StoreState {
    orders: HashMap<OrderId, Order>,
    items: HashMap<OrderId, Vec<OrderItem>>,
}

impl StoreState {
    fn insert(&mut self, order: Order, mut items: Vec<OrderItem>) {
        items.sort_by(|a, b| b.constraint_score().cmp(&a.constraint_score()).then(a.id.cmp(&b.id)));
        self.items.insert(order.id, items);
        self.orders.insert(order.id, order);
    }
}

/// Store held in memory behind an async lock. Safe to share across tasks.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    state: RwLock<StoreState>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from a [`StoreSnapshot`] in JSON. Items whose order is
    /// missing from the snapshot are rejected.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let snapshot: StoreSnapshot =
            serde_json::from_str(json).map_err(|e| StoreError::Malformed(e.to_string()))?;
        let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for item in snapshot.items {
            by_order.entry(item.order_id).or_default().push(item);
        }
        let mut state = StoreState::default();
        for order in snapshot.orders {
            let items = by_order.remove(&order.id).unwrap_or_default();
            state.insert(order, items);
        }
        if let Some(orphan) = by_order.keys().next() {
            return Err(StoreError::Malformed(format!(
                "items reference unknown order {}",
                orphan.0
            )));
        }
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Inserts or replaces an order and its items.
    pub async fn insert(&self, order: Order, items: Vec<OrderItem>) {
        self.state.write().await.insert(order, items);
    }

    /// Updates an order's status on the order and on its items. Returns `false` if unknown.
    pub async fn set_status(&self, id: OrderId, status: OrderStatus) -> bool {
        let mut state = self.state.write().await;
        let Some(order) = state.orders.get_mut(&id) else {
            return false;
        };
        order.status = status;
        if let Some(items) = state.items.get_mut(&id) {
            for item in items {
                item.order_status = status;
            }
        }
        true
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn get_order_items(&self, id: OrderId) -> Result<Vec<OrderItem>, StoreError> {
        Ok(self.state.read().await.items.get(&id).cloned().unwrap_or_default())
    }

    async fn stream_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<OrderItem>, StoreError> {
        let state = self.state.read().await;
        let mut hits: Vec<&OrderItem> = state
            .items
            .values()
            .flatten()
            .filter(|item| query.accepts(item) && query.is_after_cursor(item))
            .collect();
        hits.sort_by(|a, b| query.compare(a, b));
        Ok(hits.into_iter().take(query.page_size).cloned().collect())
    }
}
