//! Single-entry matcher facade.
//!
//! Loads a root order from an [`OrderStore`], pages through candidate items for
//! each of its items, loads the opposing orders they belong to, and runs the
//! one-to-one and one-to-many searches over them.

use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;

use crate::clock::Clock;
use crate::constraints::Cursor;
use crate::error::{MatchError, MatchingResult};
use crate::match_result::MatchResult;
use crate::one_to_many::OneToManySearch;
use crate::one_to_one::OneToOneSearch;
use crate::store::{CandidateStream, OrderStore};
use crate::types::{CandidateOrder, OrderId, OrderItemId, OrderStatus};

/// Matcher tuning. Read from the environment with [`MatcherConfig::from_env`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatcherConfig {
    /// Candidate items fetched per store query.
    pub page_size: usize,
    /// Pages fetched per root item in one call.
    pub max_pages: usize,
    pub enable_one_to_one: bool,
    pub enable_one_to_many: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            max_pages: 4,
            enable_one_to_one: true,
            enable_one_to_many: true,
        }
    }
}

impl MatcherConfig {
    /// `MATCHER_PAGE_SIZE`, `MATCHER_MAX_PAGES`, `MATCHER_ONE_TO_ONE` and
    /// `MATCHER_ONE_TO_MANY`; unset or unparsable values fall back to the default.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            page_size: env_or("MATCHER_PAGE_SIZE", d.page_size).max(1),
            max_pages: env_or("MATCHER_MAX_PAGES", d.max_pages),
            enable_one_to_one: env_or("MATCHER_ONE_TO_ONE", d.enable_one_to_one),
            enable_one_to_many: env_or("MATCHER_ONE_TO_MANY", d.enable_one_to_many),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

/// How far the candidate scan for one root item got.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ScanMarker {
    pub root_item_id: OrderItemId,
    pub cursor: Option<Cursor>,
    pub exhausted: bool,
}

/// Matches found in one call, and where each root item's scan stopped. Pass
/// `last_scanned` back to [`Matcher::match_order`] to continue past those candidates.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MatchOutcome {
    pub matches: Vec<MatchResult>,
    pub last_scanned: Vec<ScanMarker>,
}

pub struct Matcher<S> {
    store: S,
    clock: Arc<dyn Clock>,
    config: MatcherConfig,
}

impl<S: OrderStore> Matcher<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, config: MatcherConfig) -> Self {
        Self { store, clock, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Finds matches for `order_id`.
    ///
    /// Returns `Err` if the root order is missing, inactive or malformed, if the
    /// store fails, or if the flow graph breaks an invariant. An empty `matches`
    /// is a normal outcome.
    pub async fn match_order(
        &self,
        order_id: OrderId,
        resume: &[ScanMarker],
    ) -> MatchingResult<MatchOutcome> {
        let root = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(MatchError::RootNotFound(order_id))?;
        if root.status != OrderStatus::Active {
            return Err(MatchError::RootNotActive(order_id));
        }
        root.validate()?;
        let root_items = self.store.get_order_items(order_id).await?;
        info!(
            "match started root_order_id={} side={:?} num_items={} items={} resume_markers={}",
            order_id.0,
            root.side,
            root.num_items,
            root_items.len(),
            resume.len()
        );

        let mut seen = HashSet::new();
        let mut candidate_ids = Vec::new();
        let mut last_scanned = Vec::with_capacity(root_items.len());
        for item in &root_items {
            let (mut query, extractor) =
                item.constraints().build_query(item, self.config.page_size.max(1));
            if let Some(marker) = resume.iter().find(|m| m.root_item_id == item.id) {
                query.cursor = marker.cursor.clone();
            }
            let mut stream = CandidateStream::new(query, extractor);
            let mut pages = 0;
            while pages < self.config.max_pages {
                let Some(page) = stream.next_page(&self.store).await? else {
                    break;
                };
                pages += 1;
                for candidate in page {
                    if candidate.order_id != root.id
                        && item.is_match(&candidate)
                        && seen.insert(candidate.order_id)
                    {
                        candidate_ids.push(candidate.order_id);
                    }
                }
            }
            debug!(
                "candidate scan item_id={} pages={} exhausted={}",
                item.id.0,
                pages,
                stream.is_exhausted()
            );
            last_scanned.push(ScanMarker {
                root_item_id: item.id,
                cursor: stream.cursor().cloned(),
                exhausted: stream.is_exhausted(),
            });
        }

        let mut candidates = Vec::with_capacity(candidate_ids.len());
        for id in candidate_ids {
            let Some(order) = self.store.get_order(id).await? else {
                debug!("candidate vanished order_id={}", id.0);
                continue;
            };
            if order.status != OrderStatus::Active {
                continue;
            }
            if let Err(e) = order.validate() {
                warn!("candidate skipped order_id={} reason={}", id.0, e);
                continue;
            }
            let items = self.store.get_order_items(id).await?;
            candidates.push(CandidateOrder { order, items });
        }

        let mut matches = Vec::new();
        if self.config.enable_one_to_one {
            let one_to_one = OneToOneSearch::new(self.clock.as_ref());
            matches.extend(one_to_one.search(&root, &root_items, &candidates));
        }
        if self.config.enable_one_to_many {
            // Single orders large enough to fill the root are one-to-one territory.
            let smaller: Vec<CandidateOrder> = candidates
                .iter()
                .filter(|c| c.order.num_items < root.num_items)
                .cloned()
                .collect();
            for result in OneToManySearch::new(&root, &root_items, &smaller, self.clock.as_ref())? {
                matches.push(result?);
            }
        }

        for m in &matches {
            info!(
                "match found root_order_id={} kind={:?} status={:?} opposing={:?} price={} timestamp_ms={} quantity={}",
                m.root_order_id.0,
                m.kind,
                m.status,
                m.opposing_order_ids.iter().map(|id| id.0).collect::<Vec<_>>(),
                m.price_eth,
                m.timestamp_ms,
                m.total_quantity()
            );
        }
        info!(
            "match finished root_order_id={} candidates={} matches={}",
            order_id.0,
            candidates.len(),
            matches.len()
        );
        Ok(MatchOutcome { matches, last_scanned })
    }
}
