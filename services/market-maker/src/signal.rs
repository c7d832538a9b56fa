//! Per-tick trading signal
//!
//! The signal variants form a closed set selected by configuration. All of
//! them produce the same [`Signal`]; only where the base price and the spread
//! range come from differs.

use rand::Rng;
use rust_decimal::Decimal;
use tracing::debug;
use types::ids::TradingPair;

use crate::config::{SignalConfig, StrategyParameters};
use crate::error::MakerResult;
use crate::ladder::SpreadLadder;
use crate::oracle::PriceOracle;

/// Base price plus the spread range to quote around it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signal {
    pub base_price: Decimal,
    pub min_spread: Decimal,
    pub max_spread: Decimal,
}

impl Signal {
    pub fn ladder(&self) -> MakerResult<SpreadLadder> {
        SpreadLadder::new(self.min_spread, self.max_spread)
    }

    /// Distinct prices a side of `per_side` orders can rest at. A single
    /// spread puts every rung on one price.
    pub fn distinct_rungs(&self, per_side: usize) -> usize {
        if self.min_spread == self.max_spread {
            per_side.min(1)
        } else {
            per_side
        }
    }
}

const WALK_PRICE_DP: u32 = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum SignalGenerator {
    /// Oracle price with the configured spread range
    OrderBookMaker {
        min_spread: Decimal,
        max_spread: Decimal,
    },
    /// Oracle price, quoted at half the spread on each side
    MarketRate { spread: Decimal },
    /// Self-driven price walk; never consults the oracle
    RandomWalk {
        current_price: Decimal,
        min_change: Decimal,
        max_change: Decimal,
        spread: Decimal,
    },
}

impl SignalGenerator {
    pub fn from_params(params: &StrategyParameters) -> Self {
        match &params.signal {
            SignalConfig::OrderBookMaker => SignalGenerator::OrderBookMaker {
                min_spread: params.min_spread_percentage,
                max_spread: params.max_spread_percentage,
            },
            SignalConfig::MarketRate { spread } => SignalGenerator::MarketRate { spread: *spread },
            SignalConfig::RandomWalk {
                start_price,
                min_change,
                max_change,
                spread,
            } => SignalGenerator::RandomWalk {
                current_price: *start_price,
                min_change: *min_change,
                max_change: *max_change,
                spread: *spread,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SignalGenerator::OrderBookMaker { .. } => "order_book_maker",
            SignalGenerator::MarketRate { .. } => "market_rate",
            SignalGenerator::RandomWalk { .. } => "random_walk",
        }
    }

    /// Produce this tick's signal.
    pub async fn generate<R: Rng + Send>(
        &mut self,
        oracle: &dyn PriceOracle,
        pair: &TradingPair,
        rng: &mut R,
    ) -> MakerResult<Signal> {
        match self {
            SignalGenerator::OrderBookMaker {
                min_spread,
                max_spread,
            } => {
                let (min_spread, max_spread) = (*min_spread, *max_spread);
                let base_price = oracle.current_price(pair).await?;
                Ok(Signal {
                    base_price,
                    min_spread,
                    max_spread,
                })
            }
            SignalGenerator::MarketRate { spread } => {
                let half = *spread / Decimal::TWO;
                let base_price = oracle.current_price(pair).await?;
                Ok(Signal {
                    base_price,
                    min_spread: half,
                    max_spread: half,
                })
            }
            SignalGenerator::RandomWalk {
                current_price,
                min_change,
                max_change,
                spread,
            } => {
                let change = uniform_decimal(rng, *min_change, *max_change);
                let factor = if rng.gen_bool(0.5) {
                    Decimal::ONE + change
                } else {
                    Decimal::ONE - change
                };
                // bounded scale keeps repeated products inside 28 digits
                let next = (*current_price * factor).round_dp(WALK_PRICE_DP);
                // a walk that would cross zero holds its price
                if next > Decimal::ZERO {
                    *current_price = next;
                }
                debug!(pair = %pair, price = %current_price, change = %change, "Random walk step");
                let half = *spread / Decimal::TWO;
                Ok(Signal {
                    base_price: *current_price,
                    min_spread: half,
                    max_spread: half,
                })
            }
        }
    }
}

/// Uniform draw from `[lo, hi]` at micro resolution
pub(crate) fn uniform_decimal<R: Rng + ?Sized>(rng: &mut R, lo: Decimal, hi: Decimal) -> Decimal {
    if hi <= lo {
        return lo;
    }
    let k: i64 = rng.gen_range(0..=1_000_000);
    lo + (hi - lo) * Decimal::new(k, 6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MakerError, OracleError};
    use crate::oracle::FixedPriceOracle;
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn pair() -> TradingPair {
        TradingPair::new("BTC", "USDT").unwrap()
    }

    struct DownOracle;

    #[async_trait]
    impl PriceOracle for DownOracle {
        async fn current_price(&self, pair: &TradingPair) -> Result<Decimal, OracleError> {
            Err(OracleError::Unavailable {
                pair: pair.to_string(),
                reason: "offline".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_order_book_maker_uses_param_spreads() {
        let params = StrategyParameters::default();
        let mut generator = SignalGenerator::from_params(&params);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let signal = generator
            .generate(&FixedPriceOracle::new(d("50000")), &pair(), &mut rng)
            .await
            .unwrap();
        assert_eq!(signal.base_price, d("50000"));
        assert_eq!(signal.min_spread, d("0.01"));
        assert_eq!(signal.max_spread, d("0.05"));
    }

    #[tokio::test]
    async fn test_market_rate_halves_spread() {
        let params = StrategyParameters {
            signal: SignalConfig::MarketRate { spread: d("0.02") },
            ..Default::default()
        };
        let mut generator = SignalGenerator::from_params(&params);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let signal = generator
            .generate(&FixedPriceOracle::new(d("100")), &pair(), &mut rng)
            .await
            .unwrap();
        assert_eq!(signal.min_spread, d("0.01"));
        assert_eq!(signal.max_spread, d("0.01"));
    }

    #[tokio::test]
    async fn test_oracle_failure_propagates() {
        let mut generator = SignalGenerator::from_params(&StrategyParameters::default());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = generator.generate(&DownOracle, &pair(), &mut rng).await.unwrap_err();
        assert!(matches!(err, MakerError::Oracle(_)));
    }

    #[tokio::test]
    async fn test_random_walk_ignores_oracle_and_stays_in_band() {
        let params = StrategyParameters {
            signal: SignalConfig::RandomWalk {
                start_price: d("0.00000100"),
                min_change: d("0.001"),
                max_change: d("0.01"),
                spread: d("0.02"),
            },
            ..Default::default()
        };
        let mut generator = SignalGenerator::from_params(&params);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut last = d("0.00000100");
        for _ in 0..50 {
            let signal = generator.generate(&DownOracle, &pair(), &mut rng).await.unwrap();
            let moved = ((signal.base_price - last) / last).abs();
            assert!(moved >= d("0.000999") && moved <= d("0.010001"), "moved {moved}");
            assert_eq!(signal.min_spread, d("0.01"));
            last = signal.base_price;
        }
    }

    #[test]
    fn test_single_spread_has_one_rung() {
        let band = Signal {
            base_price: d("50000"),
            min_spread: d("0.01"),
            max_spread: d("0.05"),
        };
        assert_eq!(band.distinct_rungs(15), 15);
        let point = Signal {
            min_spread: d("0.01"),
            max_spread: d("0.01"),
            ..band
        };
        assert_eq!(point.distinct_rungs(15), 1);
        assert_eq!(point.distinct_rungs(0), 0);
    }

    #[test]
    fn test_uniform_decimal_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..1_000 {
            let x = uniform_decimal(&mut rng, d("0.01"), d("0.05"));
            assert!(x >= d("0.01") && x <= d("0.05"));
        }
        assert_eq!(uniform_decimal(&mut rng, d("1"), d("1")), d("1"));
    }
}
