//! Paper trading run of one market maker
//!
//! Usage: `paper-maker <config.json>`
//!
//! The config is the market maker's own JSON config plus an optional
//! `paper` section describing starting balances, the price walk and taker
//! flow. Runs until Ctrl-C, then cancels the maker's orders and prints the
//! engine statistics.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use market_maker::config::AppConfig;
use market_maker::oracle::WatchPriceOracle;
use market_maker::{logging, shutdown, EngineDeps, MarketMakerEngine};
use rust_decimal::Decimal;
use serde::Deserialize;
use simulation::bots::taker::{Taker, TakerConfig};
use simulation::price_feed::{RandomWalkFeed, WalkConfig};
use simulation::venue::PaperVenue;

#[derive(Debug, Deserialize)]
struct PaperFile {
    #[serde(default)]
    paper: Option<PaperSection>,
}

#[derive(Debug, Deserialize)]
struct PaperSection {
    /// Starting balances of the maker account by symbol
    #[serde(default)]
    balances: HashMap<String, Decimal>,
    walk: WalkConfig,
    #[serde(default)]
    taker: Option<TakerConfig>,
    #[serde(default = "default_taker_interval_ms")]
    taker_interval_ms: u64,
    #[serde(default)]
    seed: u64,
}

fn default_taker_interval_ms() -> u64 {
    5_000
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let path = match std::env::args().nth(1) {
        Some(path) => path,
        None => bail!("usage: paper-maker <config.json>"),
    };
    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let config = AppConfig::from_json(&text)?;
    let paper = serde_json::from_str::<PaperFile>(&text)?
        .paper
        .context("config has no `paper` section")?;

    logging::init_with_default(&config.log_level);
    tracing::info!(pair = %config.pair, account = %config.account, "Starting paper market maker");

    let venue = Arc::new(PaperVenue::with_venue(config.tokens.clone(), &config.venue));
    for (symbol, amount) in &paper.balances {
        venue.deposit(&config.account, &symbol.to_ascii_uppercase(), *amount)?;
    }

    let max_age = Duration::from_millis(paper.walk.interval_ms.saturating_mul(3).max(1_000));
    let (feed, oracle) = WatchPriceOracle::channel(max_age);
    let (trigger, stop) = shutdown::channel();

    let walk = tokio::spawn(RandomWalkFeed::new(paper.walk, paper.seed).run(feed, stop.clone()));

    let taker = paper.taker.map(|taker_config| {
        let venue = venue.clone();
        let scope = config.pair.scope();
        let mut stop = stop.clone();
        let interval = Duration::from_millis(paper.taker_interval_ms);
        let mut taker = Taker::new(taker_config, paper.seed.wrapping_add(1)).targeting(config.account.clone());
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.wait() => break,
                    _ = tokio::time::sleep(interval) => {
                        let fills = taker.tick(&venue, &scope);
                        if !fills.is_empty() {
                            tracing::info!(count = fills.len(), "Taker filled maker orders");
                        }
                    }
                }
            }
        })
    });

    let deps = EngineDeps {
        ledger: venue.clone(),
        oracle: Arc::new(oracle),
        tokens: config.tokens.clone(),
        venue: config.venue.clone(),
    };
    let engine = MarketMakerEngine::new(config.pair.clone(), config.account.clone(), config.strategy, deps)?;
    let maker = tokio::spawn(engine.run(stop));

    shutdown::listen_for_shutdown(trigger).await;

    let stats = maker.await?;
    walk.await?;
    if let Some(taker) = taker {
        taker.await?;
    }

    println!("{}", serde_json::to_string_pretty(&stats)?);
    for symbol in [&config.pair.base, &config.pair.quote] {
        tracing::info!(symbol = %symbol, balance = %venue.balance(&config.account, symbol), "Final balance");
    }
    Ok(())
}
