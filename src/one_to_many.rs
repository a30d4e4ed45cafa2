//! One-to-many search: fill a root order's whole quantity from several smaller
//! opposing orders.
//!
//! Each round connects the root's items to every compatible item of the
//! candidates still pending, takes the earliest pending candidate out of the pool,
//! and streams flow until it stabilises. Opposing orders left partly filled are
//! retracted one at a time (largest shortfall first) and the flow is re-streamed.
//! When every contributing order is exactly filled and the root is exactly filled,
//! the combined price curve of the contributors is intersected with the root's and
//! a match is yielded. The pool shrinks by at least one order per round, so the
//! search terminates. Greedy; earliest-created orders win ties.

use log::debug;
use std::collections::VecDeque;

use crate::clock::Clock;
use crate::error::MatchingResult;
use crate::flow::{CollectionId, FlowGraph, NodeId};
use crate::geometry::{combine_curves, intersect};
use crate::match_result::{Allocation, MatchKind, MatchResult};
use crate::types::{CandidateOrder, Order, OrderItem};

/// Payload of a graph node: the item, and the candidate it belongs to (`None` for the root).
#[derive(Clone, Debug)]
pub struct GraphItem {
    pub item: OrderItem,
    pub candidate: Option<usize>,
}

struct CandidateNodes<'a> {
    order: &'a Order,
    collection: CollectionId,
    /// Compatible `(root node, candidate node)` pairs, in link priority order.
    links: Vec<(NodeId, NodeId)>,
}

/// Lazy one-to-many search over a fixed candidate pool.
///
/// Iterate to get matches; an `Err` ends the iteration.
pub struct OneToManySearch<'a> {
    root: &'a Order,
    clock: &'a dyn Clock,
    graph: FlowGraph<GraphItem>,
    root_collection: CollectionId,
    candidates: Vec<CandidateNodes<'a>>,
    pending: VecDeque<usize>,
    done: bool,
}

impl<'a> OneToManySearch<'a> {
    /// Builds the graph for `root` and `candidates`. Candidates are consumed in the
    /// order given. Candidates on the root's own order are ignored.
    pub fn new(
        root: &'a Order,
        root_items: &[OrderItem],
        candidates: &'a [CandidateOrder],
        clock: &'a dyn Clock,
    ) -> MatchingResult<Self> {
        let mut graph = FlowGraph::new();
        let root_collection = graph.add_collection(root.num_items);
        let mut root_nodes = Vec::with_capacity(root_items.len());
        for item in root_items {
            let max_flow = item.max_num_items_contribution.min(root.num_items);
            let node = graph.add_node(
                root_collection,
                GraphItem {
                    item: item.clone(),
                    candidate: None,
                },
                max_flow,
            )?;
            root_nodes.push((node, item));
        }

        let mut nodes = Vec::new();
        for (idx, candidate) in candidates.iter().enumerate() {
            if candidate.order.id == root.id {
                continue;
            }
            let collection = graph.add_collection(candidate.order.num_items);
            let mut links = Vec::new();
            for item in &candidate.items {
                let max_flow = item.max_num_items_contribution.min(candidate.order.num_items);
                let node = graph.add_node(
                    collection,
                    GraphItem {
                        item: item.clone(),
                        candidate: Some(nodes.len()),
                    },
                    max_flow,
                )?;
                for (root_node, root_item) in &root_nodes {
                    if root_item.is_match(item) && item.is_match(root_item) {
                        links.push((*root_node, node));
                    }
                }
            }
            debug!(
                "one_to_many candidate root_order_id={} candidate_idx={} opposing_order_id={} links={}",
                root.id.0,
                idx,
                candidate.order.id.0,
                links.len()
            );
            nodes.push(CandidateNodes {
                order: &candidate.order,
                collection,
                links,
            });
        }
        let pending = (0..nodes.len()).collect();
        Ok(Self {
            root,
            clock,
            graph,
            root_collection,
            candidates: nodes,
            pending,
            done: false,
        })
    }

    /// Number of candidates not yet taken out of the pool.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Clears all edges and links the root to every candidate in `round`.
    fn connect(&mut self, round: &[usize]) -> MatchingResult<()> {
        self.graph.unlink_collection(self.root_collection)?;
        for &idx in round {
            for (from, to) in self.candidates[idx].links.clone() {
                self.graph.link(from, to)?;
            }
        }
        Ok(())
    }

    /// Candidates in `round` receiving flow, with that flow, earliest start first.
    fn contributing(&self, round: &[usize]) -> MatchingResult<Vec<(usize, u64)>> {
        let mut out = Vec::new();
        for &idx in round {
            let flow = self.graph.collection_incoming_flow(self.candidates[idx].collection)?;
            if flow > 0 {
                out.push((idx, flow));
            }
        }
        out.sort_by_key(|(idx, _)| {
            let order = self.candidates[*idx].order;
            (order.start_time_ms, order.id)
        });
        Ok(out)
    }

    fn next_match(&mut self) -> MatchingResult<Option<MatchResult>> {
        while !self.pending.is_empty() {
            let mut round: Vec<usize> = self.pending.iter().copied().collect();
            self.pending.pop_front();
            self.connect(&round)?;

            loop {
                let mut stream = self.graph.stream_flow(self.root_collection);
                let root_flow = stream.run_to_stable(&mut self.graph)?;
                self.graph.check_invariants()?;

                let contributing = self.contributing(&round)?;
                // Sorted earliest first, so `>=` leaves the latest of equal shortfalls.
                let mut worst: Option<(usize, u64)> = None;
                for &(idx, flow) in &contributing {
                    let shortfall = self.candidates[idx].order.num_items.saturating_sub(flow);
                    if shortfall > 0 && worst.map_or(true, |(_, s)| shortfall >= s) {
                        worst = Some((idx, shortfall));
                    }
                }
                if let Some((idx, shortfall)) = worst {
                    debug!(
                        "one_to_many retract root_order_id={} opposing_order_id={} shortfall={}",
                        self.root.id.0, self.candidates[idx].order.id.0, shortfall
                    );
                    self.graph.unlink_collection(self.candidates[idx].collection)?;
                    round.retain(|r| *r != idx);
                    continue;
                }

                if contributing.is_empty() || root_flow != self.root.num_items {
                    debug!(
                        "one_to_many round exhausted root_order_id={} root_flow={} required={}",
                        self.root.id.0, root_flow, self.root.num_items
                    );
                    break;
                }

                match self.price(&contributing)? {
                    Some(result) => {
                        let used: Vec<usize> = contributing.iter().map(|(idx, _)| *idx).collect();
                        self.pending.retain(|p| !used.contains(p));
                        return Ok(Some(result));
                    }
                    None => {
                        debug!(
                            "one_to_many no combined intersection root_order_id={} contributors={}",
                            self.root.id.0,
                            contributing.len()
                        );
                        break;
                    }
                }
            }
        }
        Ok(None)
    }

    fn price(&self, contributing: &[(usize, u64)]) -> MatchingResult<Option<MatchResult>> {
        let orders: Vec<&Order> = contributing
            .iter()
            .map(|(idx, _)| self.candidates[*idx].order)
            .collect();
        let curves: Vec<_> = orders.iter().map(|o| o.curve()).collect();
        let Some(combined) = combine_curves(&curves) else {
            return Ok(None);
        };
        let Some(intersection) = intersect(&self.root.curve(), &combined) else {
            return Ok(None);
        };

        let mut allocations = Vec::new();
        for (_, edge) in self.graph.edges() {
            if edge.flow() == 0 {
                continue;
            }
            let from = self.graph.node(edge.from())?.data();
            let to = self.graph.node(edge.to())?.data();
            allocations.push(Allocation {
                root_item_id: from.item.id,
                opposing_item_id: to.item.id,
                opposing_order_id: to.item.order_id,
                quantity: edge.flow(),
            });
        }
        allocations.sort_by_key(|a| (a.root_item_id, a.opposing_item_id));

        Ok(MatchResult::priced(
            MatchKind::OneToMany,
            self.root.id,
            orders.iter().map(|o| o.id).collect(),
            allocations,
            &intersection,
            self.root.end_time_ms.min(combined.end_time_ms),
            self.clock.now_ms(),
        ))
    }
}

impl Iterator for OneToManySearch<'_> {
    type Item = MatchingResult<MatchResult>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_match() {
            Ok(Some(result)) => Some(Ok(result)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::match_result::MatchStatus;
    use crate::types::fixtures::{collection_item, flat, items, order};
    use crate::types::{OrderId, Side};
    use rust_decimal_macros::dec;

    fn offer(id: u64, num_items: u64, price: i64) -> CandidateOrder {
        let order = flat(id, Side::Buy, num_items, price);
        CandidateOrder {
            items: vec![collection_item(&order, "0xabc")],
            order,
        }
    }

    fn quantity_for(result: &MatchResult, order: u64) -> u64 {
        result
            .allocations
            .iter()
            .filter(|a| a.opposing_order_id == OrderId(order))
            .map(|a| a.quantity)
            .sum()
    }

    #[test]
    fn listing_of_three_filled_by_offers_of_two_and_one() {
        let clock = FixedClock::new(150_000);
        let root = flat(1, Side::Sell, 3, 3);
        let root_items = items(&root, "0xabc");
        let candidates = vec![offer(2, 2, 2), offer(3, 1, 1)];
        let results: Vec<_> = OneToManySearch::new(&root, &root_items, &candidates, &clock)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(results.len(), 1);
        let m = &results[0];
        assert_eq!(m.kind, MatchKind::OneToMany);
        assert_eq!(m.opposing_order_ids, vec![OrderId(2), OrderId(3)]);
        assert_eq!(quantity_for(m, 2), 2);
        assert_eq!(quantity_for(m, 3), 1);
        assert_eq!(m.total_quantity(), root.num_items);
        assert_eq!(m.status, MatchStatus::Active);
        assert_eq!(m.price_eth, dec!(3));
    }

    #[test]
    fn oversized_offer_is_retracted_and_flow_reallocated() {
        let clock = FixedClock::new(150_000);
        let root = flat(1, Side::Sell, 2, 2);
        let root_items = items(&root, "0xabc");
        // Offer 2 wants three items; only offer 3 can be filled exactly.
        let candidates = vec![offer(2, 3, 3), offer(3, 2, 2)];
        let mut search = OneToManySearch::new(&root, &root_items, &candidates, &clock).unwrap();
        let m = search.next().unwrap().unwrap();
        assert_eq!(m.opposing_order_ids, vec![OrderId(3)]);
        assert_eq!(quantity_for(&m, 3), 2);
        assert!(search.next().is_none());
    }

    #[test]
    fn no_match_when_pool_cannot_fill_root() {
        let clock = FixedClock::new(150_000);
        let root = flat(1, Side::Sell, 3, 3);
        let root_items = items(&root, "0xabc");
        let candidates = vec![offer(2, 1, 1), offer(3, 1, 1)];
        let mut search = OneToManySearch::new(&root, &root_items, &candidates, &clock).unwrap();
        assert!(search.next().is_none());
        assert_eq!(search.pending(), 0);
    }

    #[test]
    fn combined_price_below_listing_discards_round() {
        let clock = FixedClock::new(150_000);
        let root = order(1, Side::Sell, 2, 100_000, 200_000, dec!(2), dec!(2));
        let root_items = items(&root, "0xabc");
        // Each offer clears the per-item price only on part of its window; combined
        // window has no crossing.
        let a = order(2, Side::Buy, 1, 100_000, 150_000, dec!(0.5), dec!(1));
        let b = order(3, Side::Buy, 1, 160_000, 200_000, dec!(1), dec!(1.5));
        let candidates = vec![
            CandidateOrder { items: vec![collection_item(&a, "0xabc")], order: a },
            CandidateOrder { items: vec![collection_item(&b, "0xabc")], order: b },
        ];
        let mut search = OneToManySearch::new(&root, &root_items, &candidates, &clock).unwrap();
        assert!(search.next().is_none());
    }

    #[test]
    fn disjoint_pools_yield_successive_matches() {
        let clock = FixedClock::new(150_000);
        let root = flat(1, Side::Sell, 1, 1);
        let root_items = items(&root, "0xabc");
        let candidates = vec![offer(2, 1, 1), offer(3, 1, 1)];
        let results: Vec<_> = OneToManySearch::new(&root, &root_items, &candidates, &clock)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].opposing_order_ids, vec![OrderId(2)]);
        assert_eq!(results[1].opposing_order_ids, vec![OrderId(3)]);
    }

    #[test]
    fn earliest_start_time_listed_first() {
        let clock = FixedClock::new(150_000);
        let root = flat(1, Side::Sell, 2, 2);
        let root_items = items(&root, "0xabc");
        let mut late = offer(2, 1, 1);
        late.order.start_time_ms = 120_000;
        late.items[0].start_time_ms = 120_000;
        let early = offer(3, 1, 1);
        let candidates = vec![late, early];
        let m = OneToManySearch::new(&root, &root_items, &candidates, &clock)
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(m.opposing_order_ids, vec![OrderId(3), OrderId(2)]);
    }
}
