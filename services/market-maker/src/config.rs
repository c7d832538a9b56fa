//! Strategy and venue configuration
//!
//! Loaded from a JSON file at startup. Every field has a default so a config
//! only names what it changes. Spreads are fractions (`0.01` is 1%).

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::{AccountName, TradingPair};
use types::token::{TokenRegistry, TokenSpec};

use crate::error::{MakerError, MakerResult};
use crate::ladder::SpreadLadder;
use crate::retry::RetryPolicy;

/// Inclusive range of milliseconds to sleep between venue calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn zero() -> Self {
        Self::new(0, 0)
    }
}

/// How the per-tick signal is produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalConfig {
    /// Oracle price, spreads from the strategy parameters
    OrderBookMaker,
    /// Oracle price, both spreads fixed at `spread / 2`
    MarketRate { spread: Decimal },
    /// Self-driven price that moves by ±[min_change, max_change] each tick
    RandomWalk {
        start_price: Decimal,
        min_change: Decimal,
        max_change: Decimal,
        spread: Decimal,
    },
}

impl Default for SignalConfig {
    fn default() -> Self {
        SignalConfig::OrderBookMaker
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParameters {
    pub min_spread_percentage: Decimal,
    pub max_spread_percentage: Decimal,
    /// Full ladder size across both sides
    pub num_orders: usize,
    /// Smallest order, in base-token units
    pub min_order_value: Decimal,
    /// Largest order, in base-token units
    pub max_order_value: Decimal,
    pub update_interval_ms: u64,
    /// Own orders per side below which the book counts as depleted
    pub min_orders_per_side: usize,
    /// Upper bound of orders replaced per maintenance tick
    pub max_churn: usize,
    pub placement_delay_ms: DelayRange,
    pub cancel_delay_ms: DelayRange,
    /// Relative quantity jitter for replacement orders
    pub quantity_jitter: Decimal,
    /// Cancel own orders that drift outside the spread range
    pub prune_out_of_range: bool,
    /// Fixed RNG seed; OS entropy when absent
    pub seed: Option<u64>,
    pub signal: SignalConfig,
    pub retry: RetryPolicy,
}

impl Default for StrategyParameters {
    fn default() -> Self {
        Self {
            min_spread_percentage: Decimal::new(1, 2),
            max_spread_percentage: Decimal::new(5, 2),
            num_orders: 30,
            min_order_value: Decimal::new(1, 3),
            max_order_value: Decimal::ONE,
            update_interval_ms: 10_000,
            min_orders_per_side: 11,
            max_churn: 4,
            placement_delay_ms: DelayRange::new(300, 700),
            cancel_delay_ms: DelayRange::new(200, 400),
            quantity_jitter: Decimal::new(5, 2),
            prune_out_of_range: false,
            seed: None,
            signal: SignalConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl StrategyParameters {
    pub fn orders_per_side(&self) -> usize {
        self.num_orders / 2
    }

    /// Validated spread range of the parameters
    pub fn ladder(&self) -> MakerResult<SpreadLadder> {
        SpreadLadder::new(self.min_spread_percentage, self.max_spread_percentage)
    }

    /// Startup checks. Any error here is fatal.
    pub fn validate(&self) -> MakerResult<()> {
        self.ladder()?;
        if self.max_spread_percentage >= Decimal::ONE {
            return Err(MakerError::InvalidSpreadRange {
                min: self.min_spread_percentage,
                max: self.max_spread_percentage,
            });
        }
        if self.orders_per_side() == 0 {
            return Err(MakerError::Config(format!(
                "num_orders must be at least 2, got {}",
                self.num_orders
            )));
        }
        if self.min_orders_per_side >= self.orders_per_side() {
            return Err(MakerError::Config(format!(
                "min_orders_per_side ({}) must be below orders per side ({})",
                self.min_orders_per_side,
                self.orders_per_side()
            )));
        }
        if self.min_order_value <= Decimal::ZERO || self.max_order_value <= Decimal::ZERO {
            return Err(MakerError::Config("order values must be positive".to_string()));
        }
        if self.min_order_value > self.max_order_value {
            return Err(MakerError::Config(format!(
                "min_order_value {} exceeds max_order_value {}",
                self.min_order_value, self.max_order_value
            )));
        }
        if self.max_churn == 0 {
            return Err(MakerError::Config("max_churn must be at least 1".to_string()));
        }
        if self.quantity_jitter < Decimal::ZERO || self.quantity_jitter >= Decimal::ONE {
            return Err(MakerError::Config(format!(
                "quantity_jitter must be in [0, 1), got {}",
                self.quantity_jitter
            )));
        }
        for (name, range) in [
            ("placement_delay_ms", self.placement_delay_ms),
            ("cancel_delay_ms", self.cancel_delay_ms),
        ] {
            if range.min_ms > range.max_ms {
                return Err(MakerError::Config(format!(
                    "{name} min {} exceeds max {}",
                    range.min_ms, range.max_ms
                )));
            }
        }
        match &self.signal {
            SignalConfig::OrderBookMaker => {}
            SignalConfig::MarketRate { spread } => check_spread(*spread)?,
            SignalConfig::RandomWalk {
                start_price,
                min_change,
                max_change,
                spread,
            } => {
                check_spread(*spread)?;
                if *start_price <= Decimal::ZERO {
                    return Err(MakerError::Config("random walk start_price must be positive".to_string()));
                }
                if *min_change < Decimal::ZERO || min_change > max_change {
                    return Err(MakerError::Config(format!(
                        "random walk change range [{min_change}, {max_change}] is invalid"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn check_spread(spread: Decimal) -> MakerResult<()> {
    if spread < Decimal::ZERO || spread >= Decimal::TWO {
        return Err(MakerError::InvalidSpreadRange {
            min: spread / Decimal::TWO,
            max: spread / Decimal::TWO,
        });
    }
    Ok(())
}

/// Contract and table names on the venue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VenueConfig {
    pub dex_contract: String,
    pub order_table: String,
    pub cancel_action: String,
    pub balance_table: String,
    pub page_size: u32,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            dex_contract: "dex.libre".to_string(),
            order_table: "orderbook2".to_string(),
            cancel_action: "cancelorder".to_string(),
            balance_table: "accounts".to_string(),
            page_size: 1000,
        }
    }
}

impl VenueConfig {
    pub fn dex_account(&self) -> MakerResult<AccountName> {
        Ok(AccountName::new(self.dex_contract.clone())?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PairConfig {
    base: String,
    quote: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawAppConfig {
    account: AccountName,
    pair: PairConfig,
    #[serde(default)]
    strategy: StrategyParameters,
    #[serde(default)]
    venue: VenueConfig,
    #[serde(default)]
    tokens: Vec<TokenSpec>,
    #[serde(default = "default_log_level")]
    log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Complete process configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub account: AccountName,
    pub pair: TradingPair,
    pub strategy: StrategyParameters,
    pub venue: VenueConfig,
    pub tokens: TokenRegistry,
    pub log_level: String,
}

impl AppConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> MakerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MakerError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> MakerResult<Self> {
        let raw: RawAppConfig =
            serde_json::from_str(text).map_err(|e| MakerError::Config(format!("invalid config: {e}")))?;
        let pair = TradingPair::new(raw.pair.base, raw.pair.quote)?;

        let mut tokens = TokenRegistry::default();
        for spec in raw.tokens {
            tokens.insert(TokenSpec {
                symbol: spec.symbol.to_ascii_uppercase(),
                ..spec
            });
        }
        tokens.get(&pair.base)?;
        tokens.get(&pair.quote)?;

        raw.strategy.validate()?;
        Ok(Self {
            account: raw.account,
            pair,
            strategy: raw.strategy,
            venue: raw.venue,
            tokens,
            log_level: raw.log_level,
        })
    }
}
