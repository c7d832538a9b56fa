//! Price oracle collaborator
//!
//! The engine asks for a base price once per tick. `WatchPriceOracle` is fed
//! in-process by a publisher holding the matching [`PriceFeed`].

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::time::Instant;
use types::ids::TradingPair;

use crate::error::OracleError;

#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn current_price(&self, pair: &TradingPair) -> Result<Decimal, OracleError>;
}

/// Constant price, useful for paper trading and tests
#[derive(Debug, Clone, Copy)]
pub struct FixedPriceOracle {
    price: Decimal,
}

impl FixedPriceOracle {
    pub fn new(price: Decimal) -> Self {
        Self { price }
    }
}

#[async_trait]
impl PriceOracle for FixedPriceOracle {
    async fn current_price(&self, pair: &TradingPair) -> Result<Decimal, OracleError> {
        if self.price <= Decimal::ZERO {
            return Err(OracleError::Unavailable {
                pair: pair.to_string(),
                reason: format!("non-positive price {}", self.price),
            });
        }
        Ok(self.price)
    }
}

#[derive(Debug, Clone, Copy)]
struct Reading {
    price: Decimal,
    at: Instant,
}

/// Publishing half of an in-process price channel
#[derive(Debug, Clone)]
pub struct PriceFeed {
    tx: watch::Sender<Option<Reading>>,
}

impl PriceFeed {
    pub fn publish(&self, price: Decimal) {
        let _ = self.tx.send(Some(Reading {
            price,
            at: Instant::now(),
        }));
    }
}

/// Reads the latest published price; readings older than `max_age` are refused
#[derive(Debug, Clone)]
pub struct WatchPriceOracle {
    rx: watch::Receiver<Option<Reading>>,
    max_age: Duration,
}

impl WatchPriceOracle {
    pub fn channel(max_age: Duration) -> (PriceFeed, WatchPriceOracle) {
        let (tx, rx) = watch::channel(None);
        (PriceFeed { tx }, WatchPriceOracle { rx, max_age })
    }
}

#[async_trait]
impl PriceOracle for WatchPriceOracle {
    async fn current_price(&self, pair: &TradingPair) -> Result<Decimal, OracleError> {
        let reading = *self.rx.borrow();
        let Some(reading) = reading else {
            return Err(OracleError::Unavailable {
                pair: pair.to_string(),
                reason: "no price published yet".to_string(),
            });
        };
        let age = reading.at.elapsed();
        if age > self.max_age {
            return Err(OracleError::Stale {
                pair: pair.to_string(),
                age_ms: age.as_millis(),
            });
        }
        if reading.price <= Decimal::ZERO {
            return Err(OracleError::Unavailable {
                pair: pair.to_string(),
                reason: format!("non-positive price {}", reading.price),
            });
        }
        Ok(reading.price)
    }
}
