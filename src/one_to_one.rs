//! One-to-one search: a root order against exactly one opposing order.
//!
//! Both orders may be split over several items (e.g. a multi-asset offer against a
//! bundle listing). Compatible item pairings are searched depth-first for the
//! fullest one, which is dropped if it pairs fewer items than the smaller order.

use log::debug;

use crate::clock::Clock;
use crate::geometry::intersect;
use crate::match_result::{Allocation, MatchKind, MatchResult};
use crate::types::{CandidateOrder, Order, OrderItem};

/// Pairing of root item index to opposing item index.
type Pairing = Vec<(usize, usize)>;

pub struct OneToOneSearch<'c> {
    clock: &'c dyn Clock,
}

impl<'c> OneToOneSearch<'c> {
    pub fn new(clock: &'c dyn Clock) -> Self {
        Self { clock }
    }

    /// Tries the root against every candidate independently. One result per matching candidate.
    pub fn search(
        &self,
        root: &Order,
        root_items: &[OrderItem],
        candidates: &[CandidateOrder],
    ) -> Vec<MatchResult> {
        candidates
            .iter()
            .filter(|c| c.order.id != root.id)
            .filter_map(|c| self.match_pair(root, root_items, &c.order, &c.items))
            .collect()
    }

    pub fn match_pair(
        &self,
        root: &Order,
        root_items: &[OrderItem],
        opposing: &Order,
        opposing_items: &[OrderItem],
    ) -> Option<MatchResult> {
        let required_pairs = root.num_items.min(opposing.num_items) as usize;
        let compatible: Vec<Vec<bool>> = root_items
            .iter()
            .map(|r| opposing_items.iter().map(|o| r.is_match(o) && o.is_match(r)).collect())
            .collect();

        let mut best = Vec::new();
        let mut claimed = vec![false; opposing_items.len()];
        let full = root_items.len().min(opposing_items.len());
        best_pairing(0, &compatible, &mut claimed, &mut Vec::new(), &mut best, full);
        if best.len() < required_pairs || best.is_empty() {
            debug!(
                "one_to_one no pairing root_order_id={} opposing_order_id={} required_pairs={}",
                root.id.0, opposing.id.0, required_pairs
            );
            return None;
        }

        let Some(intersection) = intersect(&root.curve(), &opposing.curve()) else {
            debug!(
                "one_to_one no intersection root_order_id={} opposing_order_id={}",
                root.id.0, opposing.id.0
            );
            return None;
        };
        let allocations = best
            .iter()
            .map(|&(r, o)| Allocation {
                root_item_id: root_items[r].id,
                opposing_item_id: opposing_items[o].id,
                opposing_order_id: opposing.id,
                quantity: 1,
            })
            .collect();
        MatchResult::priced(
            MatchKind::OneToOne,
            root.id,
            vec![opposing.id],
            allocations,
            &intersection,
            root.end_time_ms.min(opposing.end_time_ms),
            self.clock.now_ms(),
        )
    }
}

/// Depth-first walk over pairings where each root item from `root_idx` on is
/// either paired with one unclaimed compatible opposing item or left out. Keeps
/// the first longest pairing in `best`. Returns `true` once `best` reaches `full`,
/// which ends the walk.
fn best_pairing(
    root_idx: usize,
    compatible: &[Vec<bool>],
    claimed: &mut [bool],
    current: &mut Pairing,
    best: &mut Pairing,
    full: usize,
) -> bool {
    if current.len() > best.len() {
        best.clone_from(current);
    }
    if best.len() >= full {
        return true;
    }
    if root_idx == compatible.len() || current.len() + compatible.len() - root_idx <= best.len() {
        return false;
    }
    for opposing_idx in 0..claimed.len() {
        if claimed[opposing_idx] || !compatible[root_idx][opposing_idx] {
            continue;
        }
        claimed[opposing_idx] = true;
        current.push((root_idx, opposing_idx));
        let done = best_pairing(root_idx + 1, compatible, claimed, current, best, full);
        current.pop();
        claimed[opposing_idx] = false;
        if done {
            return true;
        }
    }
    best_pairing(root_idx + 1, compatible, claimed, current, best, full)
}
