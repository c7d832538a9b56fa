//! Market maker for a memo-order DEX
//!
//! Orders are token transfers to the DEX contract whose memo carries side,
//! quantity and price. The engine keeps a ladder of such orders alive around
//! a base price, refilling when the book runs thin and churning a few orders
//! each tick otherwise.
//!
//! # Modules
//! - `codec`: Transfer and memo encoding, order-row decoding
//! - `allocator`: Balance split into per-order quantities
//! - `ladder`: Spread rungs and prices
//! - `ledger`: Chain collaborator trait
//! - `book`: Sorted order book fetch
//! - `lifecycle`: Place, cancel and balance reads
//! - `oracle` / `signal`: Base price and spread range per tick
//! - `engine`: Idle / Filling / Maintaining state machine
//! - `config`, `retry`, `shutdown`, `logging`, `error`: Process plumbing

pub mod allocator;
pub mod book;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod ladder;
pub mod ledger;
pub mod lifecycle;
pub mod logging;
pub mod oracle;
pub mod retry;
pub mod shutdown;
pub mod signal;

#[cfg(test)]
mod testing;

pub use engine::{run, EngineDeps, EngineState, EngineStats, MarketMakerEngine};
pub use error::{MakerError, MakerResult};
