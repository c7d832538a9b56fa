//! Paper trading harness for the memo-order market maker
//!
//! Runs market maker engines against an in-memory venue that follows the
//! DEX contract's placement and cancel rules, with simulated takers and a
//! random-walk price feed.
//!
//! # Modules
//! - `venue`: In-memory `Ledger` with escrow, fills and fault injection
//! - `bots`: Taker bot that drains resting orders
//! - `price_feed`: Random-walk price publisher

pub mod venue;
pub mod bots;
pub mod price_feed;

/// Crate version constant
pub const VERSION: &str = "1.0.0";
