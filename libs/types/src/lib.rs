//! Types library for the memo-order DEX market maker
//!
//! This library provides the core type definitions shared by the market maker
//! service and the paper venue, keeping precision rules and order identity in
//! one place.
//!
//! # Modules
//! - `ids`: Identifiers (OrderId, AccountName, TradingPair)
//! - `numeric`: Fixed-point helpers and `Asset` amount strings
//! - `token`: Token precision table (TokenSpec, TokenRegistry)
//! - `order`: Side, Order, OrderIntent and the sorted OrderBook
//! - `errors`: Error taxonomy

// Public modules
pub mod ids;
pub mod numeric;
pub mod token;
pub mod order;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::token::*;
    pub use crate::order::*;
    pub use crate::errors::*;
}
