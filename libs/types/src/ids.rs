//! Identifier types for venue entities
//!
//! Order identifiers are assigned by the venue contract and are only unique
//! within a trading pair's table scope. Account names follow the chain's
//! name rules (1-12 characters from `a-z`, `1-5` and `.`).

use crate::errors::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Venue-assigned order identifier, scoped to a trading pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(u64);

impl OrderId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for OrderId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// On-chain account name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountName(String);

impl AccountName {
    /// Maximum length of an account name
    pub const MAX_LEN: usize = 12;

    /// Validate and wrap an account name
    pub fn new(name: impl Into<String>) -> Result<Self, TypesError> {
        let name = name.into();
        let valid_chars = name
            .chars()
            .all(|c| c.is_ascii_lowercase() || ('1'..='5').contains(&c) || c == '.');
        if name.is_empty() || name.len() > Self::MAX_LEN || !valid_chars || name.ends_with('.') {
            return Err(TypesError::InvalidAccountName { name });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccountName {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountName> for String {
    fn from(name: AccountName) -> Self {
        name.0
    }
}

impl FromStr for AccountName {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trading pair (base traded against quote)
///
/// Text format: "BASE/QUOTE" (e.g., "LIBRE/BTC", "BTC/USDT")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradingPair {
    pub base: String,
    pub quote: String,
}

impl TradingPair {
    /// Create a pair from two token symbols; symbols are upper-cased
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Result<Self, TypesError> {
        let base = base.into().trim().to_ascii_uppercase();
        let quote = quote.into().trim().to_ascii_uppercase();
        if base.is_empty() || quote.is_empty() {
            return Err(TypesError::InvalidPair {
                reason: "empty symbol".to_string(),
            });
        }
        if base == quote {
            return Err(TypesError::InvalidPair {
                reason: format!("base and quote are both {base}"),
            });
        }
        Ok(Self { base, quote })
    }

    /// Table scope for the pair: lowercase(base) + lowercase(quote)
    pub fn scope(&self) -> String {
        format!(
            "{}{}",
            self.base.to_ascii_lowercase(),
            self.quote.to_ascii_lowercase()
        )
    }
}

impl FromStr for TradingPair {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((base, quote)) => Self::new(base, quote),
            None => Err(TypesError::InvalidPair {
                reason: format!("{s} is not in BASE/QUOTE format"),
            }),
        }
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}
