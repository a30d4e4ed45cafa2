//! Property-based and deterministic invariant tests.
//!
//! Uses proptest to generate price curves, flow graphs and (seed, num_orders)
//! pairs for the synthetic order generator, and asserts: intersections land on
//! the first agreeing second, flow never exceeds a bound, streams terminate, one-to-many
//! matches fill every order exactly. Deterministic replay: same config ⇒ same
//! outcome.

use std::collections::HashSet;
use std::sync::Arc;

use nft_matching_engine::order_gen::{load_into_store, Generator, GeneratorConfig};
use nft_matching_engine::{
    intersect, CandidateOrder, FixedClock, FlowGraph, InMemoryOrderStore, Matcher, MatcherConfig,
    OneToManySearch, PriceCurve, Side,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn curve(start: u64, len: u64, p0_milli: i64, p1_milli: i64, sell: bool) -> PriceCurve {
    PriceCurve {
        start_time_ms: start,
        end_time_ms: start + len,
        start_price_eth: Decimal::new(p0_milli, 3),
        end_price_eth: Decimal::new(p1_milli, 3),
        is_sell_order: sell,
    }
}

fn ceil_to_second(ms: u64) -> u64 {
    ms.div_ceil(1000) * 1000
}

/// Invariant: each opposing order in a one-to-many match is filled to exactly its
/// `num_items`, and the root is filled to exactly its own.
fn assert_exact_fill(
    root: &CandidateOrder,
    candidates: &[CandidateOrder],
    result: &nft_matching_engine::MatchResult,
) {
    assert_eq!(
        result.total_quantity(),
        root.order.num_items,
        "root must be filled exactly"
    );
    for id in &result.opposing_order_ids {
        let wanted = candidates
            .iter()
            .find(|c| c.order.id == *id)
            .map(|c| c.order.num_items)
            .unwrap_or_default();
        let got: u64 = result
            .allocations
            .iter()
            .filter(|a| a.opposing_order_id == *id)
            .map(|a| a.quantity)
            .sum();
        assert_eq!(got, wanted, "opposing order {:?} must be filled exactly", id);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Curves whose windows do not overlap never intersect.
    #[test]
    fn prop_disjoint_windows_never_intersect(
        start in 0u64..1_000_000,
        len_a in 1u64..1_000_000,
        gap in 0u64..1_000_000,
        len_b in 1u64..1_000_000,
        prices in prop::array::uniform4(0i64..10_000),
    ) {
        let listing = curve(start, len_a, prices[0], prices[1], true);
        let offer = curve(start + len_a + gap, len_b, prices[2], prices[3], false);
        prop_assert!(intersect(&listing, &offer).is_none());
        prop_assert!(intersect(&offer, &listing).is_none());
    }

    /// A real crossing is reported at the first whole second at which the offer
    /// has reached the listing, before either window ends, on the seller's line.
    #[test]
    fn prop_crossing_is_first_agreeing_second(
        start_a in 0u64..500_000,
        start_b in 0u64..500_000,
        len_a in 1_000u64..1_000_000,
        len_b in 1_000u64..1_000_000,
        prices in prop::array::uniform4(0i64..10_000),
    ) {
        let listing = curve(start_a, len_a, prices[0], prices[1], true);
        let offer = curve(start_b, len_b, prices[2], prices[3], false);
        let later_start = start_a.max(start_b);
        let already_crossed = offer.price_at(later_start) >= listing.price_at(later_start);
        if let (Some(i), false) = (intersect(&listing, &offer), already_crossed) {
            let ts = i.timestamp_ms;
            prop_assert_eq!(ts % 1000, 0);
            prop_assert!(ts < listing.end_time_ms.min(offer.end_time_ms));
            prop_assert_eq!(i.price_eth, listing.price_at(ts));
            let slack = Decimal::new(1, 7);
            prop_assert!(
                offer.price_at(ts) + slack >= listing.price_at(ts),
                "offer {} still below listing {} at {}",
                offer.price_at(ts),
                listing.price_at(ts),
                ts
            );
            if ts >= 1000 {
                let before = ts - 1000;
                prop_assert!(
                    offer.price_at(before) < listing.price_at(before),
                    "curves already agreed at {}, reported {}",
                    before,
                    ts
                );
            }
        }
    }

    /// Parallel flat curves with the offer at or above the listing agree at the
    /// first whole second of the overlap, at the listing price.
    #[test]
    fn prop_flat_offer_above_listing_agrees_at_overlap_start(
        start_a in 0u64..100_000,
        start_b in 0u64..100_000,
        listing_milli in 0i64..10_000,
        premium_milli in 0i64..10_000,
    ) {
        let listing = curve(start_a, 200_000, listing_milli, listing_milli, true);
        let offer_milli = listing_milli + premium_milli;
        let offer = curve(start_b, 200_000, offer_milli, offer_milli, false);
        let i = intersect(&offer, &listing).unwrap();
        prop_assert_eq!(i.timestamp_ms, ceil_to_second(start_a.max(start_b)));
        prop_assert_eq!(i.price_eth, Decimal::new(listing_milli, 3));
    }

    /// push_flow never exceeds the request, the node's headroom or the summed edge
    /// capacities, and the graph bounds hold afterwards.
    #[test]
    fn prop_push_flow_respects_bounds(
        root_max in 1u64..10,
        amount in 0u64..20,
        targets in prop::collection::vec((1u64..5, 1u64..5), 1..6),
    ) {
        let mut g = FlowGraph::new();
        let root_collection = g.add_collection(root_max);
        let root = g.add_node(root_collection, (), root_max).unwrap();
        for (required, max_flow) in &targets {
            let c = g.add_collection(*required);
            let n = g.add_node(c, (), *max_flow).unwrap();
            g.link(root, n).unwrap();
        }
        let total_capacity: u64 = g.edges().map(|(_, e)| e.capacity()).sum();
        let pushed = g.push_flow(root, amount).unwrap();
        prop_assert!(pushed <= amount.min(root_max).min(total_capacity));
        prop_assert_eq!(g.outgoing_flow(root).unwrap(), pushed);
        prop_assert!(g.check_invariants().is_ok());
    }

    /// Every stream step before the last pushes at least one unit, so a stream
    /// yields at most `required + 1` steps.
    #[test]
    fn prop_flow_stream_terminates(
        required in 1u64..12,
        root_nodes in prop::collection::vec(1u64..6, 1..4),
        targets in prop::collection::vec((1u64..6, 1u64..6), 1..6),
        links in prop::collection::vec((0usize..4, 0usize..6), 0..16),
    ) {
        let mut g = FlowGraph::new();
        let root_collection = g.add_collection(required);
        let roots: Vec<_> = root_nodes
            .iter()
            .map(|m| g.add_node(root_collection, (), *m).unwrap())
            .collect();
        let others: Vec<_> = targets
            .iter()
            .map(|(req, m)| {
                let c = g.add_collection(*req);
                g.add_node(c, (), *m).unwrap()
            })
            .collect();
        for (r, o) in links {
            g.link(roots[r % roots.len()], others[o % others.len()]).unwrap();
        }

        let mut stream = g.stream_flow(root_collection);
        let mut steps = 0u64;
        let mut last = None;
        while let Some(step) = stream.step(&mut g).unwrap() {
            steps += 1;
            prop_assert!(steps <= required + 1);
            last = Some(step);
        }
        let last = last.unwrap();
        prop_assert_eq!(last.flow_pushed, 0);
        prop_assert!(last.total_flow_pushed <= required);
        prop_assert!(g.check_invariants().is_ok());
    }

    /// One-to-many matches over generated pools fill every participant exactly and
    /// never reuse an opposing order.
    #[test]
    fn prop_one_to_many_fills_exactly(seed in 0u64..100_000, num_orders in 10usize..40) {
        let config = GeneratorConfig {
            seed,
            num_orders,
            num_items_max: 4,
            ..Default::default()
        };
        let now = config.start_time_ms + config.start_spread_ms;
        let orders = Generator::new(config).all_orders();
        let clock = FixedClock::new(now);
        for root in orders.iter().filter(|o| o.order.side == Side::Sell) {
            let candidates: Vec<CandidateOrder> = orders
                .iter()
                .filter(|o| o.order.side == Side::Buy && o.order.num_items < root.order.num_items)
                .cloned()
                .collect();
            let search =
                OneToManySearch::new(&root.order, &root.items, &candidates, &clock).unwrap();
            let mut used = HashSet::new();
            for result in search {
                let result = result.unwrap();
                assert_exact_fill(root, &candidates, &result);
                for id in &result.opposing_order_ids {
                    prop_assert!(used.insert(*id), "opposing order {:?} matched twice", id);
                }
            }
        }
    }
}

/// Deterministic replay: same config and clock ⇒ identical match outcomes.
#[tokio::test]
async fn deterministic_replay_same_outcome() {
    let config = GeneratorConfig {
        seed: 999,
        num_orders: 60,
        ..Default::default()
    };
    let now = config.start_time_ms + config.start_spread_ms;

    let mut runs = Vec::new();
    for _ in 0..2 {
        let orders = Generator::new(config.clone()).all_orders();
        let ids: Vec<_> = orders.iter().map(|o| o.order.id).collect();
        let store = InMemoryOrderStore::new();
        load_into_store(&store, orders).await;
        let matcher = Matcher::new(store, Arc::new(FixedClock::new(now)), MatcherConfig::default());
        let mut outcomes = Vec::new();
        for id in ids {
            outcomes.push(matcher.match_order(id, &[]).await.unwrap());
        }
        runs.push(outcomes);
    }
    assert_eq!(runs[0], runs[1], "same config must produce same match outcomes");
}
