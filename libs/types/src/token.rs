//! Token precision table
//!
//! Every token on the venue has a fixed number of fractional digits, and a
//! transfer written with any other precision is rejected by the token
//! contract. Prices quoted in BTC always carry 10 decimals regardless of the
//! BTC token's own precision.

use crate::errors::TypesError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Symbol whose quotes use the fixed high-precision price format
pub const BTC_SYMBOL: &str = "BTC";

/// Price precision for any pair quoted in BTC
pub const BTC_PRICE_PRECISION: u32 = 10;

/// Static description of a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpec {
    pub symbol: String,
    /// Account of the contract that issues the token
    pub contract_id: String,
    pub decimal_precision: u32,
}

impl TokenSpec {
    pub fn new(symbol: impl Into<String>, contract_id: impl Into<String>, decimal_precision: u32) -> Self {
        Self {
            symbol: symbol.into(),
            contract_id: contract_id.into(),
            decimal_precision,
        }
    }
}

/// Lookup table of known tokens keyed by symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRegistry {
    tokens: HashMap<String, TokenSpec>,
}

impl TokenRegistry {
    /// Empty registry
    pub fn empty() -> Self {
        Self {
            tokens: HashMap::new(),
        }
    }

    /// Add or replace a token
    pub fn insert(&mut self, spec: TokenSpec) {
        self.tokens.insert(spec.symbol.clone(), spec);
    }

    /// Builder-style insert
    pub fn with_token(mut self, spec: TokenSpec) -> Self {
        self.insert(spec);
        self
    }

    pub fn get(&self, symbol: &str) -> Result<&TokenSpec, TypesError> {
        self.tokens
            .get(symbol)
            .ok_or_else(|| TypesError::UnknownToken {
                symbol: symbol.to_string(),
            })
    }

    /// Fractional digits for quantities of `symbol`
    pub fn precision(&self, symbol: &str) -> Result<u32, TypesError> {
        self.get(symbol).map(|t| t.decimal_precision)
    }

    /// Fractional digits for prices quoted in `quote_symbol`
    pub fn price_precision(&self, quote_symbol: &str) -> Result<u32, TypesError> {
        if quote_symbol == BTC_SYMBOL {
            return Ok(BTC_PRICE_PRECISION);
        }
        self.precision(quote_symbol)
    }

    /// Find a token by issuing contract and symbol
    pub fn by_contract(&self, contract_id: &str, symbol: &str) -> Option<&TokenSpec> {
        self.tokens
            .get(symbol)
            .filter(|t| t.contract_id == contract_id)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Default for TokenRegistry {
    /// The venue's native token table
    fn default() -> Self {
        Self::empty()
            .with_token(TokenSpec::new("LIBRE", "eosio.token", 4))
            .with_token(TokenSpec::new("BTC", "btc.libre", 8))
            .with_token(TokenSpec::new("USDT", "usdt.libre", 8))
    }
}
