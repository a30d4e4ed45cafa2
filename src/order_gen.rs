//! Synthetic NFT order generator.
//!
//! Deterministic, configurable stream of listings and offers for replay tests,
//! demos and benches. Same seed ⇒ same sequence of orders.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use crate::store::InMemoryOrderStore;
use crate::types::{
    CandidateOrder, ChainId, Order, OrderId, OrderItem, OrderItemId, OrderStatus, Side,
};

/// Configuration for the synthetic order generator.
/// All ranges are inclusive. Same config + seed produces the same stream.
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    /// RNG seed. Same seed ⇒ same order stream.
    pub seed: u64,
    pub chain_id: ChainId,
    pub currency: String,
    pub collection: String,
    /// Number of orders to generate (used by [`Generator::all_orders`]).
    pub num_orders: usize,
    /// Probability of a listing (0.0..=1.0). Offer otherwise.
    pub sell_ratio: f64,
    /// Probability that an offer accepts any token of the collection.
    pub collection_offer_ratio: f64,
    /// Token ids are drawn from `0..num_tokens`.
    pub num_tokens: u64,
    /// Items per order (inclusive).
    pub num_items_min: u64,
    pub num_items_max: u64,
    /// Per-item start price in milli-ETH (inclusive).
    pub price_min_milli: i64,
    pub price_max_milli: i64,
    /// Probability of a declining (listing) or rising (offer) price curve. Flat otherwise.
    pub dutch_ratio: f64,
    /// Start times are drawn from `start_time_ms..start_time_ms + start_spread_ms`.
    pub start_time_ms: u64,
    pub start_spread_ms: u64,
    /// Order duration (inclusive).
    pub duration_min_ms: u64,
    pub duration_max_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            chain_id: ChainId(1),
            currency: "WETH".into(),
            collection: "0xabc".into(),
            num_orders: 100,
            sell_ratio: 0.5,
            collection_offer_ratio: 0.7,
            num_tokens: 20,
            num_items_min: 1,
            num_items_max: 3,
            price_min_milli: 900,
            price_max_milli: 1100,
            dutch_ratio: 0.3,
            start_time_ms: 1_000_000,
            start_spread_ms: 60_000,
            duration_min_ms: 600_000,
            duration_max_ms: 3_600_000,
        }
    }
}

/// Deterministic order stream. Create with [`Generator::new`]; call
/// [`Generator::next_order`] or collect with [`Generator::all_orders`].
pub struct Generator {
    rng: StdRng,
    config: GeneratorConfig,
    next_order_id: u64,
    next_item_id: u64,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            rng,
            config,
            next_order_id: 1,
            next_item_id: 1,
        }
    }

    /// Generates the next order and its items.
    pub fn next_order(&mut self) -> CandidateOrder {
        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        let side = if self.rng.gen::<f64>() < self.config.sell_ratio {
            Side::Sell
        } else {
            Side::Buy
        };
        let items_min = self.config.num_items_min.max(1);
        let items_max = self.config.num_items_max.max(items_min);
        let num_items = self.rng.gen_range(items_min..=items_max);
        let start_time_ms =
            self.config.start_time_ms + self.rng.gen_range(0..=self.config.start_spread_ms);
        let duration_min = self.config.duration_min_ms.max(1);
        let duration_max = self.config.duration_max_ms.max(duration_min);
        let duration = self.rng.gen_range(duration_min..=duration_max);

        let per_item = Decimal::new(
            self.rng.gen_range(self.config.price_min_milli..=self.config.price_max_milli),
            3,
        );
        let start_price_eth = per_item * Decimal::from(num_items);
        // Listings decay, offers climb, by up to a fifth of the start price.
        let end_price_eth = if self.rng.gen::<f64>() < self.config.dutch_ratio {
            let drift = start_price_eth * Decimal::new(self.rng.gen_range(1..=20), 2);
            match side {
                Side::Sell => start_price_eth - drift,
                Side::Buy => start_price_eth + drift,
            }
        } else {
            start_price_eth
        };

        let order = Order {
            id,
            chain_id: self.config.chain_id,
            side,
            num_items,
            start_time_ms,
            end_time_ms: start_time_ms + duration,
            start_price_eth,
            end_price_eth,
            currency: self.config.currency.clone(),
            status: OrderStatus::Active,
            maker: format!("gen-{}", id.0),
        };
        let items = self.items_for(&order);
        CandidateOrder { order, items }
    }

    fn items_for(&mut self, order: &Order) -> Vec<OrderItem> {
        let collection_wide =
            order.side == Side::Buy && self.rng.gen::<f64>() < self.config.collection_offer_ratio;
        if collection_wide {
            let collection = self.config.collection.clone();
            let item = OrderItem::for_order(order, self.item_id(), collection, None);
            return vec![item];
        }
        let mut tokens: Vec<u64> = Vec::with_capacity(order.num_items as usize);
        while (tokens.len() as u64) < order.num_items.min(self.config.num_tokens.max(1)) {
            let token = self.rng.gen_range(0..self.config.num_tokens.max(1));
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
        tokens
            .into_iter()
            .map(|t| {
                let collection = self.config.collection.clone();
                OrderItem::for_order(order, self.item_id(), collection, Some(t.to_string()))
            })
            .collect()
    }

    fn item_id(&mut self) -> OrderItemId {
        let id = OrderItemId(self.next_item_id);
        self.next_item_id += 1;
        id
    }

    /// Returns exactly `n` orders. Advances the generator state.
    pub fn take_orders(&mut self, n: usize) -> Vec<CandidateOrder> {
        (0..n).map(|_| self.next_order()).collect()
    }

    /// Returns the full stream of orders as defined by `config.num_orders`.
    pub fn all_orders(&mut self) -> Vec<CandidateOrder> {
        self.take_orders(self.config.num_orders)
    }
}

/// Loads generated orders into a store. Returns how many were inserted.
pub async fn load_into_store(
    store: &InMemoryOrderStore,
    orders: impl IntoIterator<Item = CandidateOrder>,
) -> usize {
    let mut count = 0;
    for CandidateOrder { order, items } in orders {
        store.insert(order, items).await;
        count += 1;
    }
    count
}
