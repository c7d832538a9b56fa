//! Random-walk price publisher
//!
//! Stands in for an exchange rate fetcher: each step moves the price by a
//! random fraction in `[min_change, max_change]` up or down and publishes it
//! into a [`PriceFeed`].

use std::time::Duration;

use market_maker::oracle::PriceFeed;
use market_maker::shutdown::Shutdown;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Parameters of the walk. Changes are fractions of the current price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkConfig {
    pub start_price: Decimal,
    pub min_change: Decimal,
    pub max_change: Decimal,
    pub interval_ms: u64,
}

pub struct RandomWalkFeed {
    config: WalkConfig,
    price: Decimal,
    rng: ChaCha8Rng,
}

impl RandomWalkFeed {
    pub fn new(config: WalkConfig, seed: u64) -> Self {
        Self {
            price: config.start_price,
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    /// Advance the walk one step and return the new price.
    pub fn step(&mut self) -> Decimal {
        let span = (self.config.max_change - self.config.min_change).max(Decimal::ZERO);
        let k: i64 = self.rng.gen_range(0..=1_000_000);
        let change = self.config.min_change + span * Decimal::new(k, 6);
        let factor = if self.rng.gen_bool(0.5) {
            Decimal::ONE + change
        } else {
            Decimal::ONE - change
        };
        let next = (self.price * factor).round_dp(16);
        if next > Decimal::ZERO {
            self.price = next;
        }
        self.price
    }

    /// Publish the start price, then a new step every interval until shutdown.
    pub async fn run(mut self, feed: PriceFeed, mut shutdown: Shutdown) {
        let interval = Duration::from_millis(self.config.interval_ms);
        feed.publish(self.price);
        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = tokio::time::sleep(interval) => {
                    let price = self.step();
                    debug!(price = %price, "Published walk price");
                    feed.publish(price);
                }
            }
        }
    }
}
