//! Taker bot
//!
//! Consumes random resting orders with deterministic seeded RNG, standing in
//! for the third parties that drain a market maker's ladder over time.

use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use types::ids::{AccountName, OrderId};

use crate::venue::{Fill, PaperVenue};

/// Configuration for the taker bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TakerConfig {
    /// Probability of taking anything on a given tick (0.0 to 1.0)
    pub take_probability: f64,
    /// Most orders taken in one tick
    pub max_per_tick: usize,
}

impl Default for TakerConfig {
    fn default() -> Self {
        Self {
            take_probability: 0.5,
            max_per_tick: 2,
        }
    }
}

/// Random order taker with deterministic seeded RNG.
pub struct Taker {
    pub config: TakerConfig,
    pub orders_taken: usize,
    /// Only orders resting for this account are taken; all accounts when None
    target: Option<AccountName>,
    rng: ChaCha8Rng,
}

impl Taker {
    /// Create a new taker with a deterministic seed.
    pub fn new(config: TakerConfig, seed: u64) -> Self {
        Self {
            config,
            orders_taken: 0,
            target: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Restrict the taker to one maker's orders.
    pub fn targeting(mut self, account: AccountName) -> Self {
        self.target = Some(account);
        self
    }

    /// Take up to `max_per_tick` random orders resting in `scope`.
    pub fn tick(&mut self, venue: &PaperVenue, scope: &str) -> Vec<Fill> {
        if !self.rng.gen_bool(self.config.take_probability.clamp(0.0, 1.0)) {
            return Vec::new();
        }
        let resting: Vec<_> = match &self.target {
            Some(account) => venue.orders_of(scope, account),
            None => venue.orders(scope),
        };
        if resting.is_empty() || self.config.max_per_tick == 0 {
            return Vec::new();
        }
        let n = self.rng.gen_range(1..=self.config.max_per_tick).min(resting.len());
        let ids = resting
            .choose_multiple(&mut self.rng, n)
            .map(|o| o.identifier)
            .collect();
        self.take(venue, scope, ids)
    }

    /// Take `count` random orders in `scope` right away.
    pub fn take_now(&mut self, venue: &PaperVenue, scope: &str, count: usize) -> Vec<Fill> {
        let resting: Vec<_> = match &self.target {
            Some(account) => venue.orders_of(scope, account),
            None => venue.orders(scope),
        };
        let ids = resting
            .choose_multiple(&mut self.rng, count.min(resting.len()))
            .map(|o| o.identifier)
            .collect();
        self.take(venue, scope, ids)
    }

    fn take(&mut self, venue: &PaperVenue, scope: &str, ids: Vec<OrderId>) -> Vec<Fill> {
        let mut fills = Vec::with_capacity(ids.len());
        for id in ids {
            // the maker may have cancelled it since the snapshot
            if let Ok(fill) = venue.fill_order(scope, id) {
                debug!(scope, order_id = %id, maker = %fill.maker, "Taker filled order");
                fills.push(fill);
            }
        }
        self.orders_taken += fills.len();
        fills
    }
}
