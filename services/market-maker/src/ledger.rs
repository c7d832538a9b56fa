//! Ledger collaborator
//!
//! The chain node is reached through this trait only. Implementations own
//! transport, pagination and transaction signing; the core never sees keys.
//! Transport failures (`Err(LedgerError)`) must stay distinct from venue
//! rejections (`Ok(TxResult)` carrying a reason).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use types::ids::AccountName;
use types::numeric::Asset;

use crate::error::MakerError;

/// Page size hint for table reads; implementations must still return every row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page_size: 1000 }
    }
}

/// Token transfer submitted to the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Contract that issues the token
    pub token_contract: String,
    pub from: AccountName,
    pub to: AccountName,
    pub quantity: Asset,
    pub memo: String,
}

/// Contract action submitted to the chain
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub contract: AccountName,
    pub name: String,
    pub data: Value,
    pub actor: AccountName,
}

/// Outcome of a submitted transaction that reached the venue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    pub transaction_id: Option<String>,
    pub rejected_reason: Option<String>,
}

impl TxResult {
    pub fn committed(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: Some(transaction_id.into()),
            rejected_reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            transaction_id: None,
            rejected_reason: Some(reason.into()),
        }
    }

    /// Transaction id, if one was returned and is non-empty
    pub fn committed_id(&self) -> Option<&str> {
        self.transaction_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Failure to talk to the venue at all
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<LedgerError> for MakerError {
    fn from(err: LedgerError) -> Self {
        MakerError::VenueUnavailable {
            reason: err.to_string(),
        }
    }
}

/// Chain access used by the market maker
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Every row of `contract`'s `table` under `scope`, across all pages.
    async fn get_rows(
        &self,
        contract: &str,
        table: &str,
        scope: &str,
        pagination: Pagination,
    ) -> Result<Vec<Value>, LedgerError>;

    async fn submit_transfer(&self, transfer: &Transfer) -> Result<TxResult, LedgerError>;

    async fn submit_action(&self, action: &Action) -> Result<TxResult, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_committed_id_ignores_blank() {
        assert_eq!(TxResult::committed("abc").committed_id(), Some("abc"));
        assert_eq!(TxResult::committed("  ").committed_id(), None);
        assert_eq!(TxResult::default().committed_id(), None);
        assert_eq!(TxResult::rejected("overdrawn balance").committed_id(), None);
    }

    #[test]
    fn test_ledger_error_maps_to_venue_unavailable() {
        let err: MakerError = LedgerError::Transport("connection reset".into()).into();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("connection reset"));
    }
}
