//! Error types for the shared data model
//!
//! Comprehensive error taxonomy using thiserror

use thiserror::Error;

/// Errors raised while constructing or parsing core types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("Unknown token: {symbol}")]
    UnknownToken { symbol: String },

    #[error("Malformed asset string: {input}")]
    MalformedAsset { input: String },

    #[error("Asset precision mismatch for {symbol}: expected {expected} decimals, got {actual}")]
    PrecisionMismatch {
        symbol: String,
        expected: u32,
        actual: u32,
    },

    #[error("Invalid account name: {name}")]
    InvalidAccountName { name: String },

    #[error("Invalid trading pair: {reason}")]
    InvalidPair { reason: String },

    #[error("Invalid decimal: {input}")]
    InvalidDecimal { input: String },
}
