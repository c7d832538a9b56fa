//! In-memory ledger for unit tests
//!
//! Accepts placement transfers by appending a row built from the memo and
//! answers cancels by removing the row. No escrow or balance bookkeeping.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::codec::parse_memo;
use crate::ledger::{Action, Ledger, LedgerError, Pagination, TxResult, Transfer};

#[derive(Default)]
struct MockState {
    rows: HashMap<String, Vec<Value>>,
    balances: HashMap<(String, String), Vec<Value>>,
    next_id: u64,
    next_tx: u64,
    read_failures: u32,
    submit_failures: u32,
    submits_before_failure: u32,
    rejections: VecDeque<String>,
    blank_tx_ids: u32,
    transfers: Vec<Transfer>,
    actions: Vec<Action>,
}

impl MockState {
    fn injected_submit_failure(&mut self) -> Result<(), LedgerError> {
        if self.submit_failures == 0 {
            return Ok(());
        }
        if self.submits_before_failure > 0 {
            self.submits_before_failure -= 1;
            return Ok(());
        }
        self.submit_failures -= 1;
        Err(LedgerError::Transport("timeout".into()))
    }
}

#[derive(Default)]
pub struct MockLedger {
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rows(&self, scope: &str, rows: Vec<Value>) {
        let mut state = self.state.lock().unwrap();
        let max_id = rows
            .iter()
            .filter_map(|r| r.get("identifier").and_then(Value::as_u64))
            .max()
            .unwrap_or(0);
        state.next_id = state.next_id.max(max_id);
        state.rows.insert(scope.to_string(), rows);
    }

    pub fn set_balance(&self, token_contract: &str, account: &str, balance: &str) {
        let mut state = self.state.lock().unwrap();
        state.balances.insert(
            (token_contract.to_string(), account.to_string()),
            vec![json!({ "balance": balance })],
        );
    }

    pub fn fail_next_reads(&self, n: u32) {
        self.state.lock().unwrap().read_failures = n;
    }

    pub fn fail_next_submits(&self, n: u32) {
        let mut state = self.state.lock().unwrap();
        state.submit_failures = n;
        state.submits_before_failure = 0;
    }

    /// Let `ok` submissions through, then fail the next `n`.
    pub fn fail_submits_after(&self, ok: u32, n: u32) {
        let mut state = self.state.lock().unwrap();
        state.submit_failures = n;
        state.submits_before_failure = ok;
    }

    pub fn reject_next(&self, reason: &str) {
        self.state.lock().unwrap().rejections.push_back(reason.to_string());
    }

    pub fn blank_next_tx_ids(&self, n: u32) {
        self.state.lock().unwrap().blank_tx_ids = n;
    }

    /// Remove a resting order as if a third party filled it
    pub fn take_order(&self, scope: &str, id: u64) {
        let mut state = self.state.lock().unwrap();
        if let Some(rows) = state.rows.get_mut(scope) {
            rows.retain(|r| r.get("identifier").and_then(Value::as_u64) != Some(id));
        }
    }

    pub fn rows(&self, scope: &str) -> Vec<Value> {
        self.state.lock().unwrap().rows.get(scope).cloned().unwrap_or_default()
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.state.lock().unwrap().transfers.clone()
    }

    pub fn actions(&self) -> Vec<Action> {
        self.state.lock().unwrap().actions.clone()
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn get_rows(
        &self,
        contract: &str,
        table: &str,
        scope: &str,
        _pagination: Pagination,
    ) -> Result<Vec<Value>, LedgerError> {
        let mut state = self.state.lock().unwrap();
        if state.read_failures > 0 {
            state.read_failures -= 1;
            return Err(LedgerError::Transport("connection refused".into()));
        }
        if table == "accounts" {
            return Ok(state
                .balances
                .get(&(contract.to_string(), scope.to_string()))
                .cloned()
                .unwrap_or_default());
        }
        Ok(state.rows.get(scope).cloned().unwrap_or_default())
    }

    async fn submit_transfer(&self, transfer: &Transfer) -> Result<TxResult, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.injected_submit_failure()?;
        state.transfers.push(transfer.clone());
        if let Some(reason) = state.rejections.pop_front() {
            return Ok(TxResult::rejected(reason));
        }
        if state.blank_tx_ids > 0 {
            state.blank_tx_ids -= 1;
            return Ok(TxResult::committed(""));
        }
        let Some(memo) = parse_memo(&transfer.memo) else {
            return Ok(TxResult::rejected("invalid memo"));
        };
        state.next_id += 1;
        state.next_tx += 1;
        let scope = format!(
            "{}{}",
            memo.quantity.symbol.to_ascii_lowercase(),
            memo.price.symbol.to_ascii_lowercase()
        );
        let row = json!({
            "identifier": state.next_id,
            "account": transfer.from.as_str(),
            "type": memo.side.as_str(),
            "price": memo.price.amount.to_string(),
            "baseAsset": memo.quantity.to_string(),
        });
        state.rows.entry(scope).or_default().push(row);
        Ok(TxResult::committed(format!("tx{}", state.next_tx)))
    }

    async fn submit_action(&self, action: &Action) -> Result<TxResult, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.injected_submit_failure()?;
        state.actions.push(action.clone());
        if let Some(reason) = state.rejections.pop_front() {
            return Ok(TxResult::rejected(reason));
        }
        let scope = action.data["pair"].as_str().unwrap_or_default().to_string();
        let id = action.data["order_id"].as_u64();
        let rows = state.rows.entry(scope).or_default();
        let before = rows.len();
        rows.retain(|r| r.get("identifier").and_then(Value::as_u64) != id);
        if rows.len() == before {
            return Ok(TxResult::rejected("order not found"));
        }
        state.next_tx += 1;
        Ok(TxResult::committed(format!("tx{}", state.next_tx)))
    }
}
