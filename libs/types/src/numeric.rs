//! Fixed-point decimal helpers and asset amount strings
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! Quantities are always rounded toward zero so an encoded order can never
//! spend more than was allocated; prices round half away from zero.

use crate::errors::TypesError;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Round toward zero and pin the scale to exactly `dp` fractional digits.
pub fn round_down(value: Decimal, dp: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(dp, RoundingStrategy::ToZero);
    rounded.rescale(dp);
    rounded
}

/// Round half away from zero and pin the scale to exactly `dp` fractional digits.
pub fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(dp);
    rounded
}

/// Format a value with exactly `dp` fractional digits, truncating extra digits.
pub fn format_fixed(value: Decimal, dp: u32) -> String {
    round_down(value, dp).to_string()
}

/// Parse a decimal from a venue string such as `"0.0000000100"`.
pub fn parse_decimal(input: &str) -> Result<Decimal, TypesError> {
    Decimal::from_str(input.trim()).map_err(|_| TypesError::InvalidDecimal {
        input: input.to_string(),
    })
}

/// Smallest representable step at `dp` decimals (e.g. 0.0001 for dp = 4).
pub fn unit(dp: u32) -> Decimal {
    Decimal::new(1, dp)
}

/// Token amount with its symbol, as written by the ledger: `"1.00000000 BTC"`.
///
/// The amount's scale carries the precision it was written with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asset {
    pub amount: Decimal,
    pub symbol: String,
}

impl Asset {
    /// Build an asset rounded down to `precision` decimals.
    pub fn new(amount: Decimal, symbol: impl Into<String>, precision: u32) -> Self {
        Self {
            amount: round_down(amount, precision),
            symbol: symbol.into(),
        }
    }

    /// Number of fractional digits the amount was written with
    pub fn precision(&self) -> u32 {
        self.amount.scale()
    }

    /// Parse `"<amount> <SYMBOL>"`
    pub fn parse(input: &str) -> Result<Self, TypesError> {
        let malformed = || TypesError::MalformedAsset {
            input: input.to_string(),
        };
        let mut parts = input.split_whitespace();
        let amount = parts.next().ok_or_else(malformed)?;
        let symbol = parts.next().ok_or_else(malformed)?;
        if parts.next().is_some() || !symbol.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(malformed());
        }
        let amount = Decimal::from_str(amount).map_err(|_| malformed())?;
        Ok(Self {
            amount,
            symbol: symbol.to_string(),
        })
    }

    /// Leading numeric token of an asset-like field, ignoring the symbol.
    pub fn leading_amount(input: &str) -> Result<Decimal, TypesError> {
        let token = input
            .split_whitespace()
            .next()
            .ok_or_else(|| TypesError::MalformedAsset {
                input: input.to_string(),
            })?;
        parse_decimal(token)
    }
}

impl TryFrom<String> for Asset {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.to_string()
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.symbol)
    }
}
