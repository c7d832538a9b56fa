//! Error taxonomy for the market maker
//!
//! Only `InvalidSpreadRange` and `Config` are fatal, and only at startup.
//! Every other kind degrades to "skip this step" inside the tick loop.

use rust_decimal::Decimal;
use thiserror::Error;
use types::errors::TypesError;

/// Top-level market maker error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MakerError {
    /// A quantity, price or transfer amount rounds to a non-positive value
    #[error("Precision error: {field} {value} rounds to {rounded} at {precision} decimals")]
    Precision {
        field: &'static str,
        value: Decimal,
        rounded: Decimal,
        precision: u32,
    },

    #[error("Insufficient balance: {balance} cannot fund one order of {min_order}")]
    InsufficientBalance { balance: Decimal, min_order: Decimal },

    #[error("Invalid spread range: min {min} max {max}")]
    InvalidSpreadRange { min: Decimal, max: Decimal },

    /// Venue-level business rejection; not retried within the same tick
    #[error("Order rejected: {reason}")]
    OrderRejected { reason: String },

    /// Transport-level failure; the next tick starts from scratch
    #[error("Venue unavailable: {reason}")]
    VenueUnavailable { reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Row decode error: {0}")]
    Row(#[from] RowError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Types error: {0}")]
    Types(#[from] TypesError),
}

impl MakerError {
    /// Whether the same call may succeed if repeated
    pub fn is_retryable(&self) -> bool {
        matches!(self, MakerError::VenueUnavailable { .. })
    }

    /// Short label used in structured log fields
    pub fn kind(&self) -> &'static str {
        match self {
            MakerError::Precision { .. } => "precision",
            MakerError::InsufficientBalance { .. } => "insufficient_balance",
            MakerError::InvalidSpreadRange { .. } => "invalid_spread_range",
            MakerError::OrderRejected { .. } => "order_rejected",
            MakerError::VenueUnavailable { .. } => "venue_unavailable",
            MakerError::Config(_) => "config",
            MakerError::Row(_) => "row",
            MakerError::Oracle(_) => "oracle",
            MakerError::Types(_) => "types",
        }
    }
}

/// Errors decoding a single order-table row
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("missing field `{field}`")]
    MissingField { field: &'static str },

    #[error("invalid field `{field}`: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Price oracle failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("price unavailable for {pair}: {reason}")]
    Unavailable { pair: String, reason: String },

    #[error("price for {pair} is stale ({age_ms} ms old)")]
    Stale { pair: String, age_ms: u128 },
}

pub type MakerResult<T> = Result<T, MakerError>;
