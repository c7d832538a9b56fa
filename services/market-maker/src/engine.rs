//! Market maker engine
//!
//! One cooperative loop per account and pair:
//!
//! ```text
//!   Idle ──signal──▶ Filling ──ladder placed──▶ Maintaining ──┐
//!                       ▲                           │  churn  │
//!                       └──────── depleted ─────────┴─────────┘
//! ```
//!
//! Every decision is re-derived from a fresh book fetch; nothing carries
//! over between ticks except the state and the statistics. The venue is
//! shared with other writers, so every read-decide-write step is best effort.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use types::ids::{AccountName, TradingPair};
use types::numeric::{round_down, unit};
use types::order::{Order, OrderBook, OrderIntent, Side};
use types::token::TokenRegistry;

use crate::allocator::BalanceAllocator;
use crate::book::OrderBookView;
use crate::codec::OrderCodec;
use crate::config::{DelayRange, StrategyParameters, VenueConfig};
use crate::error::{MakerError, MakerResult};
use crate::ladder::price_at;
use crate::ledger::Ledger;
use crate::lifecycle::OrderLifecycleManager;
use crate::oracle::PriceOracle;
use crate::shutdown::Shutdown;
use crate::signal::{uniform_decimal, Signal, SignalGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineState {
    Idle,
    Filling,
    Maintaining,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineState::Idle => "idle",
            EngineState::Filling => "filling",
            EngineState::Maintaining => "maintaining",
        };
        f.write_str(s)
    }
}

/// Running counters, returned when the engine stops
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub ticks: u64,
    pub orders_placed: u64,
    /// Venue rejections, including empty transaction ids
    pub orders_rejected: u64,
    /// Placements lost to precision, transport or balance problems
    pub placement_failures: u64,
    pub cancels: u64,
    pub cancel_failures: u64,
    /// Depletion resets
    pub resets: u64,
    pub skipped_rows: u64,
}

/// Shared collaborators of an engine
#[derive(Clone)]
pub struct EngineDeps {
    pub ledger: Arc<dyn Ledger>,
    pub oracle: Arc<dyn PriceOracle>,
    pub tokens: TokenRegistry,
    pub venue: VenueConfig,
}

pub struct MarketMakerEngine {
    pair: TradingPair,
    account: AccountName,
    params: StrategyParameters,
    oracle: Arc<dyn PriceOracle>,
    book: Arc<OrderBookView>,
    orders: OrderLifecycleManager,
    signals: SignalGenerator,
    allocator: BalanceAllocator,
    quote_precision: u32,
    rng: ChaCha8Rng,
    state: EngineState,
    stats: EngineStats,
}

impl MarketMakerEngine {
    /// Build an engine. Invalid parameters or an unknown token are fatal.
    pub fn new(
        pair: TradingPair,
        account: AccountName,
        params: StrategyParameters,
        deps: EngineDeps,
    ) -> MakerResult<Self> {
        params.validate()?;
        let base_precision = deps.tokens.precision(&pair.base)?;
        let quote_precision = deps.tokens.precision(&pair.quote)?;
        let allocator = BalanceAllocator::new(base_precision);
        allocator.bounds(params.min_order_value, params.max_order_value)?;

        let codec = OrderCodec::new(deps.tokens);
        let book = Arc::new(OrderBookView::new(deps.ledger.clone(), codec, deps.venue));
        let orders = OrderLifecycleManager::new(deps.ledger, book.clone(), account.clone(), params.retry)?;
        let rng = match params.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Ok(Self {
            pair,
            account,
            signals: SignalGenerator::from_params(&params),
            params,
            oracle: deps.oracle,
            book,
            orders,
            allocator,
            quote_precision,
            rng,
            state: EngineState::Idle,
            stats: EngineStats::default(),
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn pair(&self) -> &TradingPair {
        &self.pair
    }

    /// Run ticks until `shutdown` fires, then cancel our orders once.
    pub async fn run(mut self, mut shutdown: Shutdown) -> EngineStats {
        info!(
            pair = %self.pair,
            account = %self.account,
            signal = self.signals.name(),
            orders_per_side = self.params.orders_per_side(),
            "Market maker started"
        );
        let interval = Duration::from_millis(self.params.update_interval_ms);
        while !shutdown.is_triggered() {
            self.tick().await;
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        self.cleanup().await;
        info!(pair = %self.pair, stats = ?self.stats, "Market maker stopped");
        self.stats
    }

    /// One pass of the state machine.
    ///
    /// A transport failure aborts the rest of the tick. An aborted fill leaves
    /// the engine in `Filling`, which clears any partial ladder before the
    /// next attempt.
    pub async fn tick(&mut self) -> EngineState {
        self.stats.ticks += 1;
        match self.state {
            EngineState::Idle | EngineState::Filling => {
                if let Some(signal) = self.signal().await {
                    match self.fill(&signal).await {
                        Ok(()) => self.transition(EngineState::Maintaining),
                        Err(err) => {
                            warn!(pair = %self.pair, kind = err.kind(), error = %err, "Fill aborted, retrying next tick");
                            self.transition(EngineState::Filling);
                        }
                    }
                }
            }
            EngineState::Maintaining => {
                if let Err(err) = self.maintain().await {
                    warn!(pair = %self.pair, kind = err.kind(), error = %err, "Maintenance tick aborted");
                }
            }
        }
        self.stats.skipped_rows = self.book.skipped_rows();
        self.state
    }

    fn transition(&mut self, next: EngineState) {
        if self.state != next {
            info!(pair = %self.pair, from = %self.state, to = %next, "State transition");
            self.state = next;
        }
    }

    async fn signal(&mut self) -> Option<Signal> {
        match self
            .signals
            .generate(self.oracle.as_ref(), &self.pair, &mut self.rng)
            .await
        {
            Ok(signal) => {
                debug!(
                    pair = %self.pair,
                    base_price = %signal.base_price,
                    min_spread = %signal.min_spread,
                    max_spread = %signal.max_spread,
                    "Signal"
                );
                Some(signal)
            }
            Err(err) => {
                warn!(pair = %self.pair, state = %self.state, error = %err, "No signal this tick");
                None
            }
        }
    }

    /// Place the full ladder against current balances.
    async fn fill(&mut self, signal: &Signal) -> MakerResult<()> {
        let ladder = signal.ladder()?;
        if self.state == EngineState::Filling {
            // leftovers of a reset or an aborted fill
            let summary = self.orders.cancel_all(&self.pair).await?;
            self.stats.cancels += summary.cancelled as u64;
            self.stats.cancel_failures += summary.failed as u64;
        }
        let per_side = self.params.orders_per_side();
        let rungs = ladder.rungs(per_side);

        let buys = self.side_quantities(Side::Buy, signal, per_side).await?;
        let sells = self.side_quantities(Side::Sell, signal, per_side).await?;

        let mut plan: Vec<OrderIntent> = Vec::with_capacity(per_side * 2);
        if let Some(quantities) = buys {
            // buys walk from the far rung inward
            for (spread, quantity) in rungs.iter().rev().zip(quantities) {
                plan.push(OrderIntent::new(Side::Buy, quantity, price_at(signal.base_price, *spread, Side::Buy)));
            }
        }
        if let Some(quantities) = sells {
            for (spread, quantity) in rungs.iter().zip(quantities) {
                plan.push(OrderIntent::new(Side::Sell, quantity, price_at(signal.base_price, *spread, Side::Sell)));
            }
        }

        info!(
            pair = %self.pair,
            base_price = %signal.base_price,
            planned = plan.len(),
            "Filling order ladder"
        );
        let mut seen = HashSet::new();
        for intent in plan {
            self.place_unique(intent, &mut seen).await?;
            self.pause(self.params.placement_delay_ms).await;
        }
        Ok(())
    }

    /// Allocated base quantities for one side of the ladder, jittered and
    /// capped so the side's total stays within its balance. `None` skips the
    /// side.
    async fn side_quantities(&mut self, side: Side, signal: &Signal, count: usize) -> MakerResult<Option<Vec<Decimal>>> {
        let Some(mut budget) = self.side_budget(side, signal).await? else {
            return Ok(None);
        };
        let quantities = match self.allocator.allocate(
            budget,
            self.params.min_order_value,
            self.params.max_order_value,
            count,
        ) {
            Ok(quantities) => quantities,
            Err(err) => {
                warn!(pair = %self.pair, side = %side, budget = %budget, error = %err, "Side skipped");
                return Ok(None);
            }
        };

        let mut out = Vec::with_capacity(quantities.len());
        for quantity in quantities {
            let Some(quantity) = self.jittered(quantity, budget) else {
                break;
            };
            budget -= quantity;
            out.push(quantity);
        }
        Ok(Some(out))
    }

    /// Balance available to one side, in base-token units.
    ///
    /// Buys convert the quote balance at the nearest buy price, less one quote
    /// unit per order for rounding of the escrow amount. Transport failures
    /// are returned; anything else skips the side.
    async fn side_budget(&mut self, side: Side, signal: &Signal) -> MakerResult<Option<Decimal>> {
        let symbol = match side {
            Side::Buy => self.pair.quote.clone(),
            Side::Sell => self.pair.base.clone(),
        };
        let balance = match self.orders.available_balance(&symbol).await {
            Ok(balance) => balance,
            Err(err) if err.is_retryable() => return Err(err),
            Err(err) => {
                warn!(pair = %self.pair, side = %side, symbol = %symbol, error = %err, "Balance unavailable");
                return Ok(None);
            }
        };
        match side {
            Side::Sell => Ok(Some(balance)),
            Side::Buy => {
                let top = price_at(signal.base_price, signal.min_spread, Side::Buy);
                let Ok(top) = self.book.codec().normalize_price(top, &self.pair) else {
                    return Ok(None);
                };
                if top <= Decimal::ZERO {
                    return Ok(None);
                }
                let reserve = unit(self.quote_precision) * Decimal::from(self.params.orders_per_side());
                let spendable = (balance - reserve).max(Decimal::ZERO);
                Ok(Some(round_down(spendable / top, self.allocator.precision())))
            }
        }
    }

    /// Jitter `quantity`, re-clamp to the order bounds and refuse it if it
    /// no longer fits in `budget`.
    fn jittered(&mut self, quantity: Decimal, budget: Decimal) -> Option<Decimal> {
        let jitter = self.params.quantity_jitter;
        let factor = uniform_decimal(&mut self.rng, Decimal::ONE - jitter, Decimal::ONE + jitter);
        let clamped = self
            .allocator
            .clamp(quantity * factor, self.params.min_order_value, self.params.max_order_value)
            .ok()?;
        let capped = clamped.min(round_down(budget, self.allocator.precision()));
        let (min, _) = self
            .allocator
            .bounds(self.params.min_order_value, self.params.max_order_value)
            .ok()?;
        (capped >= min).then_some(capped)
    }

    /// Place `intent` unless its normalized price was already used on that side.
    ///
    /// `Ok(false)` covers skips, rejections and local precision failures.
    /// Transport failures are returned so the caller can abort the tick.
    async fn place_unique(&mut self, intent: OrderIntent, seen: &mut HashSet<(Side, Decimal)>) -> MakerResult<bool> {
        let price = match self.book.codec().normalize_price(intent.price, &self.pair) {
            Ok(price) => price,
            Err(err) => {
                self.stats.placement_failures += 1;
                warn!(pair = %self.pair, side = %intent.side, price = %intent.price, error = %err, "Unpriceable intent");
                return Ok(false);
            }
        };
        if !seen.insert((intent.side, price.normalize())) {
            debug!(pair = %self.pair, side = %intent.side, price = %price, "Duplicate price, rung skipped");
            return Ok(false);
        }
        match self.orders.place(&intent, &self.pair).await {
            Ok(_) => {
                self.stats.orders_placed += 1;
                Ok(true)
            }
            Err(MakerError::OrderRejected { .. }) => {
                self.stats.orders_rejected += 1;
                Ok(false)
            }
            Err(err) if err.is_retryable() => {
                self.stats.placement_failures += 1;
                Err(err)
            }
            Err(_) => {
                self.stats.placement_failures += 1;
                Ok(false)
            }
        }
    }

    async fn maintain(&mut self) -> MakerResult<()> {
        // without a price nothing is replaced and nothing is cancelled
        let Some(signal) = self.signal().await else {
            return Ok(());
        };
        let book = self.book.fetch(&self.pair).await?;

        let depth = book.depth_of(&self.account);
        let floor = self
            .params
            .min_orders_per_side
            .min(signal.distinct_rungs(self.params.orders_per_side()));
        debug!(pair = %self.pair, bids = depth.bids, asks = depth.asks, floor, "Own depth");
        if depth.total() < 2 * floor {
            info!(
                pair = %self.pair,
                bids = depth.bids,
                asks = depth.asks,
                threshold = 2 * floor,
                "Book depleted, resetting"
            );
            let own: Vec<&Order> = book.owned_by(&self.account).collect();
            let summary = self.orders.cancel_orders(own, &self.pair).await;
            self.stats.cancels += summary.cancelled as u64;
            self.stats.cancel_failures += summary.failed as u64;
            self.stats.resets += 1;
            self.transition(EngineState::Filling);
            return Ok(());
        }

        if self.params.prune_out_of_range {
            let summary = self.orders.cancel_out_of_range(&self.pair, &signal).await?;
            self.stats.cancels += summary.cancelled as u64;
            self.stats.cancel_failures += summary.failed as u64;
        }
        self.churn(&book, &signal).await
    }

    /// Replace a few random own orders with fresh ones on the same sides.
    async fn churn(&mut self, book: &OrderBook, signal: &Signal) -> MakerResult<()> {
        let own: Vec<&Order> = book.owned_by(&self.account).collect();
        if own.is_empty() {
            return Ok(());
        }
        let n = self.rng.gen_range(1..=self.params.max_churn).min(own.len());
        let victims: Vec<&Order> = own.choose_multiple(&mut self.rng, n).copied().collect();

        let mut freed: Vec<Side> = Vec::with_capacity(victims.len());
        for order in &victims {
            match self.orders.cancel(order.identifier, &self.pair).await {
                Ok(_) => {
                    self.stats.cancels += 1;
                    freed.push(order.side);
                }
                Err(err) if err.is_retryable() => {
                    self.stats.cancel_failures += 1;
                    return Err(err);
                }
                Err(_) => self.stats.cancel_failures += 1,
            }
            self.pause(self.params.cancel_delay_ms).await;
        }
        debug!(pair = %self.pair, cancelled = freed.len(), "Churn cancels done");

        let mut budgets = [
            (Side::Buy, self.side_budget(Side::Buy, signal).await?),
            (Side::Sell, self.side_budget(Side::Sell, signal).await?),
        ];
        // prices we still rest at must not be doubled up
        let victim_ids: HashSet<_> = victims.iter().map(|o| o.identifier).collect();
        let mut seen: HashSet<(Side, Decimal)> = own
            .iter()
            .filter(|o| !victim_ids.contains(&o.identifier))
            .map(|o| (o.side, o.price.normalize()))
            .collect();

        for side in freed {
            let slot = match side {
                Side::Buy => 0,
                Side::Sell => 1,
            };
            let Some(budget) = budgets[slot].1 else {
                continue;
            };
            let share = match self.allocator.allocate(
                budget,
                self.params.min_order_value,
                self.params.max_order_value,
                self.params.orders_per_side(),
            ) {
                Ok(quantities) => quantities.first().copied().unwrap_or_default(),
                Err(err) => {
                    warn!(pair = %self.pair, side = %side, budget = %budget, error = %err, "Replacement skipped");
                    continue;
                }
            };
            let Some(quantity) = self.jittered(share, budget) else {
                continue;
            };
            let spread = uniform_decimal(&mut self.rng, signal.min_spread, signal.max_spread);
            let intent = OrderIntent::new(side, quantity, price_at(signal.base_price, spread, side));
            if self.place_unique(intent, &mut seen).await? {
                budgets[slot].1 = Some(budget - quantity);
            }
            self.pause(self.params.placement_delay_ms).await;
        }
        Ok(())
    }

    async fn cleanup(&mut self) {
        match self.orders.cancel_all(&self.pair).await {
            Ok(summary) => {
                self.stats.cancels += summary.cancelled as u64;
                self.stats.cancel_failures += summary.failed as u64;
            }
            Err(err) => {
                error!(pair = %self.pair, error = %err, "Shutdown cleanup failed, orders may remain")
            }
        }
    }

    async fn pause(&mut self, range: DelayRange) {
        let ms = if range.max_ms > range.min_ms {
            self.rng.gen_range(range.min_ms..=range.max_ms)
        } else {
            range.min_ms
        };
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

/// Run one market maker for `account` on `pair` until `shutdown` fires.
///
/// Fails only when the engine cannot be built from the given parameters.
pub async fn run(
    pair: TradingPair,
    account: AccountName,
    params: StrategyParameters,
    deps: EngineDeps,
    shutdown: Shutdown,
) -> MakerResult<EngineStats> {
    let engine = MarketMakerEngine::new(pair, account, params, deps)?;
    Ok(engine.run(shutdown).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DelayRange, SignalConfig};
    use crate::error::OracleError;
    use crate::oracle::FixedPriceOracle;
    use crate::shutdown;
    use crate::testing::MockLedger;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn pair() -> TradingPair {
        TradingPair::new("BTC", "USDT").unwrap()
    }

    fn params() -> StrategyParameters {
        StrategyParameters {
            min_spread_percentage: d("0.01"),
            max_spread_percentage: d("0.05"),
            num_orders: 30,
            min_order_value: d("0.001"),
            max_order_value: d("0.01"),
            update_interval_ms: 1_000,
            seed: Some(11),
            ..Default::default()
        }
    }

    fn funded_ledger() -> Arc<MockLedger> {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_balance("btc.libre", "bentester", "1.00000000 BTC");
        ledger.set_balance("usdt.libre", "bentester", "50000.00000000 USDT");
        ledger
    }

    fn engine_with(ledger: Arc<MockLedger>, oracle: Arc<dyn PriceOracle>, params: StrategyParameters) -> MarketMakerEngine {
        let deps = EngineDeps {
            ledger,
            oracle,
            tokens: TokenRegistry::default(),
            venue: VenueConfig::default(),
        };
        MarketMakerEngine::new(pair(), AccountName::new("bentester").unwrap(), params, deps).unwrap()
    }

    fn engine(ledger: Arc<MockLedger>) -> MarketMakerEngine {
        engine_with(ledger, Arc::new(FixedPriceOracle::new(d("50000"))), params())
    }

    fn own_rows(ledger: &MockLedger) -> Vec<Value> {
        ledger
            .rows("btcusdt")
            .into_iter()
            .filter(|r| r["account"] == "bentester")
            .collect()
    }

    fn resting(id: u64, side: &str, price: &str) -> Value {
        json!({
            "identifier": id,
            "account": "bentester",
            "type": side,
            "price": price,
            "baseAsset": "0.00500000 BTC",
        })
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

    #[test]
    fn test_invalid_spreads_fail_construction() {
        let params = StrategyParameters {
            min_spread_percentage: d("0.05"),
            max_spread_percentage: d("0.01"),
            ..params()
        };
        let deps = EngineDeps {
            ledger: Arc::new(MockLedger::new()),
            oracle: Arc::new(FixedPriceOracle::new(d("1"))),
            tokens: TokenRegistry::default(),
            venue: VenueConfig::default(),
        };
        let result = MarketMakerEngine::new(pair(), AccountName::new("bentester").unwrap(), params, deps);
        assert!(matches!(result, Err(MakerError::InvalidSpreadRange { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_without_signal_places_nothing() {
        let ledger = funded_ledger();
        let mut engine = engine_with(ledger.clone(), Arc::new(DownOracle), params());
        assert_eq!(engine.tick().await, EngineState::Idle);
        assert_eq!(engine.tick().await, EngineState::Idle);
        assert!(ledger.transfers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_fills_ladder() {
        let ledger = funded_ledger();
        let mut engine = engine(ledger.clone());
        assert_eq!(engine.tick().await, EngineState::Maintaining);

        let rows = own_rows(&ledger);
        assert_eq!(rows.len(), 30);
        assert_eq!(engine.stats().orders_placed, 30);

        let codec = OrderCodec::new(TokenRegistry::default());
        let (orders, _) = codec.decode_rows(&rows, &pair());
        let book = OrderBook::from_orders(orders);
        assert_eq!(book.bids().len(), 15);
        assert_eq!(book.asks().len(), 15);
        // nearest buy at 1%, farthest at 5%
        assert_eq!(book.bids()[0].price, d("49500"));
        assert_eq!(book.bids()[14].price, d("47500"));
        assert_eq!(book.asks()[0].price, d("50500"));
        assert_eq!(book.asks()[14].price, d("52500"));
        for order in book.iter() {
            assert!(order.quantity >= d("0.001") && order.quantity <= d("0.01"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_never_spends_more_than_balance() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_balance("btc.libre", "bentester", "0.00350000 BTC");
        ledger.set_balance("usdt.libre", "bentester", "100.00000000 USDT");
        let mut engine = engine(ledger.clone());
        engine.tick().await;

        let mut sold = Decimal::ZERO;
        let mut spent = Decimal::ZERO;
        for transfer in ledger.transfers() {
            match transfer.quantity.symbol.as_str() {
                "BTC" => sold += transfer.quantity.amount,
                _ => spent += transfer.quantity.amount,
            }
        }
        assert!(sold <= d("0.0035"), "sold {sold}");
        assert!(spent <= d("100"), "spent {spent}");
        assert!(engine.stats().orders_placed > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unfunded_side_is_skipped() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_balance("btc.libre", "bentester", "1.00000000 BTC");
        let mut engine = engine(ledger.clone());
        assert_eq!(engine.tick().await, EngineState::Maintaining);
        let rows = own_rows(&ledger);
        assert_eq!(rows.len(), 15);
        assert!(rows.iter().all(|r| r["type"] == "sell"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_depletion_resets_to_filling() {
        let ledger = funded_ledger();
        let rows = (1..=5)
            .map(|i| resting(i, "buy", &format!("{}", 49_000 - i)))
            .chain((6..=10).map(|i| resting(i, "sell", &format!("{}", 51_000 + i))))
            .collect();
        ledger.set_rows("btcusdt", rows);

        let mut engine = engine(ledger.clone());
        engine.state = EngineState::Maintaining;
        assert_eq!(engine.tick().await, EngineState::Filling);
        assert!(own_rows(&ledger).is_empty());
        assert_eq!(engine.stats().resets, 1);
        assert_eq!(engine.stats().cancels, 10);

        assert_eq!(engine.tick().await, EngineState::Maintaining);
        assert_eq!(own_rows(&ledger).len(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_maintenance_churn_keeps_depth() {
        let ledger = funded_ledger();
        let mut engine = engine(ledger.clone());
        engine.tick().await;
        let before: Vec<u64> = own_rows(&ledger).iter().map(|r| r["identifier"].as_u64().unwrap()).collect();

        assert_eq!(engine.tick().await, EngineState::Maintaining);
        let after: Vec<u64> = own_rows(&ledger).iter().map(|r| r["identifier"].as_u64().unwrap()).collect();

        let replaced = before.iter().filter(|id| !after.contains(id)).count();
        assert!((1..=4).contains(&replaced), "replaced {replaced}");
        assert_eq!(engine.stats().cancels as usize, replaced);
        assert!(after.len() >= before.len() - replaced);
        assert!(after.len() <= before.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_oracle_outage_in_maintenance_keeps_orders() {
        let ledger = funded_ledger();
        let rows: Vec<Value> = (1..=24)
            .map(|i| {
                if i % 2 == 0 {
                    resting(i, "buy", &format!("{}", 49_000 - i))
                } else {
                    resting(i, "sell", &format!("{}", 51_000 + i))
                }
            })
            .collect();
        ledger.set_rows("btcusdt", rows);

        let mut engine = engine_with(ledger.clone(), Arc::new(DownOracle), params());
        engine.state = EngineState::Maintaining;
        assert_eq!(engine.tick().await, EngineState::Maintaining);
        assert_eq!(own_rows(&ledger).len(), 24);
        assert!(ledger.actions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_book_aborts_tick() {
        let ledger = funded_ledger();
        let mut engine = engine(ledger.clone());
        engine.state = EngineState::Maintaining;
        ledger.fail_next_reads(10);
        assert_eq!(engine.tick().await, EngineState::Maintaining);
        assert_eq!(engine.stats().resets, 0);
        assert!(ledger.actions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejections_are_counted_not_fatal() {
        let ledger = funded_ledger();
        ledger.reject_next("symbol precision mismatch");
        ledger.reject_next("overdrawn balance");
        let mut engine = engine(ledger.clone());
        assert_eq!(engine.tick().await, EngineState::Maintaining);
        assert_eq!(engine.stats().orders_rejected, 2);
        assert_eq!(engine.stats().orders_placed, 28);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_prices_are_skipped() {
        // a single-value spread range puts every rung on one price
        let params = StrategyParameters {
            signal: SignalConfig::MarketRate { spread: d("0.02") },
            ..params()
        };
        let ledger = funded_ledger();
        let mut engine = engine_with(ledger.clone(), Arc::new(FixedPriceOracle::new(d("50000"))), params);
        engine.tick().await;
        let rows = own_rows(&ledger);
        assert_eq!(rows.len(), 2);
        assert_eq!(engine.stats().orders_placed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_cleans_up_on_shutdown() {
        let ledger = funded_ledger();
        let params = StrategyParameters {
            placement_delay_ms: DelayRange::zero(),
            cancel_delay_ms: DelayRange::zero(),
            ..params()
        };
        let engine = engine_with(ledger.clone(), Arc::new(FixedPriceOracle::new(d("50000"))), params);
        let (trigger, shutdown) = shutdown::channel();
        let handle = tokio::spawn(engine.run(shutdown));

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert!(!own_rows(&ledger).is_empty());
        trigger.trigger();

        let stats = handle.await.unwrap();
        assert!(stats.ticks >= 2);
        assert!(own_rows(&ledger).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_oracle_outage_never_resets_thin_book() {
        let ledger = funded_ledger();
        let rows = (1..=5)
            .map(|i| resting(i, "buy", &format!("{}", 49_000 - i)))
            .chain((6..=10).map(|i| resting(i, "sell", &format!("{}", 51_000 + i))))
            .collect();
        ledger.set_rows("btcusdt", rows);

        let mut engine = engine_with(ledger.clone(), Arc::new(DownOracle), params());
        engine.state = EngineState::Maintaining;
        assert_eq!(engine.tick().await, EngineState::Maintaining);
        assert_eq!(engine.tick().await, EngineState::Maintaining);
        assert_eq!(own_rows(&ledger).len(), 10);
        assert_eq!(engine.stats().resets, 0);
        assert!(ledger.actions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_aborts_fill() {
        let ledger = funded_ledger();
        ledger.fail_next_submits(1_000);
        let mut engine = engine(ledger.clone());

        let started = tokio::time::Instant::now();
        assert_eq!(engine.tick().await, EngineState::Filling);
        assert!(started.elapsed() < Duration::from_secs(2), "tick took {:?}", started.elapsed());
        assert_eq!(engine.stats().placement_failures, 1);
        assert!(ledger.transfers().is_empty());

        ledger.fail_next_submits(0);
        assert_eq!(engine.tick().await, EngineState::Maintaining);
        assert_eq!(own_rows(&ledger).len(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_fill_clears_partial_ladder() {
        let ledger = funded_ledger();
        ledger.fail_submits_after(10, 1_000);
        let mut engine = engine(ledger.clone());
        assert_eq!(engine.tick().await, EngineState::Filling);
        assert_eq!(own_rows(&ledger).len(), 10);

        ledger.fail_next_submits(0);
        assert_eq!(engine.tick().await, EngineState::Maintaining);
        assert_eq!(engine.stats().cancels, 10);
        assert_eq!(own_rows(&ledger).len(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_balance_outage_places_neither_side() {
        let ledger = funded_ledger();
        ledger.fail_next_reads(3);
        let mut engine = engine(ledger.clone());
        assert_eq!(engine.tick().await, EngineState::Filling);
        assert!(ledger.transfers().is_empty());

        assert_eq!(engine.tick().await, EngineState::Maintaining);
        assert_eq!(own_rows(&ledger).len(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_aborts_churn() {
        let ledger = funded_ledger();
        let mut engine = engine(ledger.clone());
        engine.tick().await;

        ledger.fail_next_submits(1_000);
        assert_eq!(engine.tick().await, EngineState::Maintaining);
        assert_eq!(engine.stats().cancel_failures, 1);
        assert_eq!(engine.stats().cancels, 0);
        assert_eq!(ledger.transfers().len(), 30);
        assert_eq!(own_rows(&ledger).len(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_price_ladder_is_not_depleted() {
        let params = StrategyParameters {
            signal: SignalConfig::MarketRate { spread: d("0.02") },
            ..params()
        };
        let ledger = funded_ledger();
        let mut engine = engine_with(ledger.clone(), Arc::new(FixedPriceOracle::new(d("50000"))), params);

        for _ in 0..6 {
            assert_eq!(engine.tick().await, EngineState::Maintaining);
            let rows = own_rows(&ledger);
            assert_eq!(rows.len(), 2);
            assert_eq!(rows.iter().filter(|r| r["type"] == "buy").count(), 1);
        }
        assert_eq!(engine.stats().resets, 0);
        // churned orders come back at the price they freed
        assert!(engine.stats().cancels >= 5);
        assert_eq!(engine.stats().orders_placed, 2 + engine.stats().cancels);
    }
}
