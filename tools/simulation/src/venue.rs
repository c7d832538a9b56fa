//! In-memory paper venue
//!
//! Implements the [`Ledger`] collaborator with the DEX contract's rules:
//! placement transfers must match the token's precision, fit in the sender's
//! balance and carry a memo whose escrow covers the order. Resting orders
//! live in one table per pair scope with venue-wide increasing identifiers.
//! Cancels refund escrow. There is no matching; third-party fills are
//! simulated with [`PaperVenue::fill_order`].

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use market_maker::codec::parse_memo;
use market_maker::config::VenueConfig;
use market_maker::ledger::{Action, Ledger, LedgerError, Pagination, TxResult, Transfer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};
use types::ids::{AccountName, OrderId};
use types::numeric::{round_down, round_half_up, Asset};
use types::order::Side;
use types::token::TokenRegistry;

/// Venue-side failures of the direct (non-ledger) API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VenueError {
    #[error("unknown token {0}")]
    UnknownToken(String),

    #[error("amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    #[error("order {id} not found in {scope}")]
    OrderNotFound { scope: String, id: u64 },
}

/// A resting order and the funds it holds in escrow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestingOrder {
    pub identifier: OrderId,
    pub account: AccountName,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Asset,
    pub quote_symbol: String,
    pub escrow: Asset,
    pub timestamp: i64,
}

impl RestingOrder {
    fn to_row(&self, quote_precision: u32) -> Value {
        let quote_amount = match self.side {
            Side::Buy => self.escrow.amount,
            Side::Sell => round_down(self.quantity.amount * self.price, quote_precision),
        };
        json!({
            "identifier": self.identifier.value(),
            "account": self.account.as_str(),
            "type": self.side.as_str(),
            "price": self.price.to_string(),
            "baseAsset": self.quantity.to_string(),
            "quoteAsset": format!("{} {}", quote_amount, self.quote_symbol),
            "timestamp": self.timestamp,
        })
    }
}

/// Events emitted by the venue, in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VenueEvent {
    OrderPlaced {
        scope: String,
        order_id: OrderId,
        account: AccountName,
        side: Side,
        price: Decimal,
        quantity: Decimal,
    },
    OrderCanceled {
        scope: String,
        order_id: OrderId,
        refund: Asset,
    },
    OrderFilled {
        scope: String,
        order_id: OrderId,
        maker: AccountName,
        proceeds: Asset,
    },
    Rejected {
        reason: String,
    },
}

/// Proceeds of a simulated fill, credited to the maker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fill {
    pub order_id: OrderId,
    pub maker: AccountName,
    pub proceeds: Asset,
}

#[derive(Debug, Default)]
struct Faults {
    transport_failures: u32,
    rejections: VecDeque<String>,
    blank_tx_ids: u32,
}

#[derive(Debug, Default)]
struct VenueState {
    balances: HashMap<(String, String), Decimal>,
    books: BTreeMap<String, Vec<RestingOrder>>,
    next_order_id: u64,
    next_tx: u64,
    faults: Faults,
    events: Vec<VenueEvent>,
}

impl VenueState {
    fn balance(&self, account: &str, symbol: &str) -> Decimal {
        self.balances
            .get(&(account.to_string(), symbol.to_string()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn credit(&mut self, account: &str, asset: &Asset) {
        *self
            .balances
            .entry((account.to_string(), asset.symbol.clone()))
            .or_insert(Decimal::ZERO) += asset.amount;
    }

    fn debit(&mut self, account: &str, asset: &Asset) {
        *self
            .balances
            .entry((account.to_string(), asset.symbol.clone()))
            .or_insert(Decimal::ZERO) -= asset.amount;
    }

    fn tx_id(&mut self) -> String {
        self.next_tx += 1;
        format!("{:064x}", self.next_tx)
    }

    fn reject(&mut self, reason: impl Into<String>) -> TxResult {
        let reason = reason.into();
        debug!(reason = %reason, "Venue rejected transaction");
        self.events.push(VenueEvent::Rejected {
            reason: reason.clone(),
        });
        TxResult::rejected(reason)
    }

    /// Fault injected ahead of normal processing, if any
    fn take_fault(&mut self) -> Result<Option<TxResult>, LedgerError> {
        if self.faults.transport_failures > 0 {
            self.faults.transport_failures -= 1;
            return Err(LedgerError::Transport("injected transport failure".to_string()));
        }
        if let Some(reason) = self.faults.rejections.pop_front() {
            return Ok(Some(self.reject(reason)));
        }
        if self.faults.blank_tx_ids > 0 {
            self.faults.blank_tx_ids -= 1;
            return Ok(Some(TxResult {
                transaction_id: Some(String::new()),
                rejected_reason: None,
            }));
        }
        Ok(None)
    }
}

/// Paper trading venue shared by every engine in a simulation
pub struct PaperVenue {
    tokens: TokenRegistry,
    dex: String,
    order_table: String,
    cancel_action: String,
    balance_table: String,
    state: Mutex<VenueState>,
}

impl PaperVenue {
    /// Venue with the default contract and table names
    pub fn new(tokens: TokenRegistry) -> Self {
        Self::with_venue(tokens, &VenueConfig::default())
    }

    pub fn with_venue(tokens: TokenRegistry, venue: &VenueConfig) -> Self {
        Self {
            tokens,
            dex: venue.dex_contract.clone(),
            order_table: venue.order_table.clone(),
            cancel_action: venue.cancel_action.clone(),
            balance_table: venue.balance_table.clone(),
            state: Mutex::new(VenueState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, VenueState> {
        // a panic while holding the lock leaves plain data behind; keep going
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    /// Credit `amount` of `symbol` to `account`.
    pub fn deposit(&self, account: &AccountName, symbol: &str, amount: Decimal) -> Result<(), VenueError> {
        let precision = self
            .tokens
            .precision(symbol)
            .map_err(|_| VenueError::UnknownToken(symbol.to_string()))?;
        if amount <= Decimal::ZERO {
            return Err(VenueError::InvalidAmount(amount));
        }
        let asset = Asset::new(amount, symbol, precision);
        self.state().credit(account.as_str(), &asset);
        info!(account = %account, amount = %asset, "Deposit");
        Ok(())
    }

    pub fn balance(&self, account: &AccountName, symbol: &str) -> Decimal {
        self.state().balance(account.as_str(), symbol)
    }

    /// Resting orders in `scope`, oldest first
    pub fn orders(&self, scope: &str) -> Vec<RestingOrder> {
        self.state().books.get(scope).cloned().unwrap_or_default()
    }

    pub fn order_count(&self, scope: &str) -> usize {
        self.state().books.get(scope).map_or(0, Vec::len)
    }

    pub fn orders_of(&self, scope: &str, account: &AccountName) -> Vec<RestingOrder> {
        self.orders(scope)
            .into_iter()
            .filter(|o| &o.account == account)
            .collect()
    }

    pub fn events(&self) -> Vec<VenueEvent> {
        self.state().events.clone()
    }

    /// Make the next `n` ledger calls fail at the transport level.
    pub fn fail_next_calls(&self, n: u32) {
        self.state().faults.transport_failures = n;
    }

    /// Reject the next submitted transaction with `reason`.
    pub fn reject_next(&self, reason: impl Into<String>) {
        self.state().faults.rejections.push_back(reason.into());
    }

    /// Answer the next `n` submissions with an empty transaction id.
    pub fn blank_next_tx_ids(&self, n: u32) {
        self.state().faults.blank_tx_ids = n;
    }

    /// Simulate a third party taking order `id` in full.
    pub fn fill_order(&self, scope: &str, id: OrderId) -> Result<Fill, VenueError> {
        let mut state = self.state();
        let not_found = || VenueError::OrderNotFound {
            scope: scope.to_string(),
            id: id.value(),
        };
        let book = state.books.get_mut(scope).ok_or_else(not_found)?;
        let index = book.iter().position(|o| o.identifier == id).ok_or_else(not_found)?;
        let order = book.remove(index);

        let proceeds = match order.side {
            Side::Buy => order.quantity.clone(),
            Side::Sell => {
                let precision = self
                    .tokens
                    .precision(&order.quote_symbol)
                    .map_err(|_| VenueError::UnknownToken(order.quote_symbol.clone()))?;
                Asset::new(order.quantity.amount * order.price, order.quote_symbol.clone(), precision)
            }
        };
        state.credit(order.account.as_str(), &proceeds);
        state.events.push(VenueEvent::OrderFilled {
            scope: scope.to_string(),
            order_id: id,
            maker: order.account.clone(),
            proceeds: proceeds.clone(),
        });
        debug!(scope, order_id = %id, maker = %order.account, proceeds = %proceeds, "Order filled");
        Ok(Fill {
            order_id: id,
            maker: order.account,
            proceeds,
        })
    }

    fn place(&self, state: &mut VenueState, transfer: &Transfer) -> TxResult {
        if transfer.to.as_str() != self.dex {
            return state.reject(format!("transfers must go to {}", self.dex));
        }
        let Some(token) = self
            .tokens
            .by_contract(&transfer.token_contract, &transfer.quantity.symbol)
        else {
            return state.reject("unable to find key");
        };
        if transfer.quantity.precision() != token.decimal_precision {
            return state.reject("symbol precision mismatch");
        }
        if transfer.quantity.amount <= Decimal::ZERO {
            return state.reject("must transfer positive quantity");
        }
        if state.balance(transfer.from.as_str(), &transfer.quantity.symbol) < transfer.quantity.amount {
            return state.reject("overdrawn balance");
        }

        let Some(memo) = parse_memo(&transfer.memo) else {
            return state.reject("invalid memo");
        };
        let (Ok(base_precision), Ok(price_precision), Ok(quote_precision)) = (
            self.tokens.precision(&memo.quantity.symbol),
            self.tokens.price_precision(&memo.price.symbol),
            self.tokens.precision(&memo.price.symbol),
        ) else {
            return state.reject("unknown pair");
        };
        if memo.quantity.precision() != base_precision || memo.price.precision() != price_precision {
            return state.reject("symbol precision mismatch");
        }
        if memo.quantity.amount <= Decimal::ZERO || memo.price.amount <= Decimal::ZERO {
            return state.reject("invalid order size");
        }
        match memo.side {
            Side::Buy => {
                if transfer.quantity.symbol != memo.price.symbol {
                    return state.reject("buy orders must transfer the quote token");
                }
                let cost = round_half_up(memo.quantity.amount * memo.price.amount, quote_precision);
                if transfer.quantity.amount < cost {
                    return state.reject("insufficient quote for order");
                }
            }
            Side::Sell => {
                if transfer.quantity.symbol != memo.quantity.symbol {
                    return state.reject("sell orders must transfer the base token");
                }
                if transfer.quantity.amount != memo.quantity.amount {
                    return state.reject("quantity mismatch");
                }
            }
        }

        state.debit(transfer.from.as_str(), &transfer.quantity);
        state.next_order_id += 1;
        let identifier = OrderId::new(state.next_order_id);
        let scope = format!(
            "{}{}",
            memo.quantity.symbol.to_ascii_lowercase(),
            memo.price.symbol.to_ascii_lowercase()
        );
        let order = RestingOrder {
            identifier,
            account: transfer.from.clone(),
            side: memo.side,
            price: memo.price.amount,
            quantity: memo.quantity.clone(),
            quote_symbol: memo.price.symbol.clone(),
            escrow: transfer.quantity.clone(),
            timestamp: Utc::now().timestamp_millis(),
        };
        state.events.push(VenueEvent::OrderPlaced {
            scope: scope.clone(),
            order_id: identifier,
            account: order.account.clone(),
            side: order.side,
            price: order.price,
            quantity: order.quantity.amount,
        });
        state.books.entry(scope).or_default().push(order);
        TxResult::committed(state.tx_id())
    }

    fn cancel(&self, state: &mut VenueState, action: &Action) -> TxResult {
        if action.contract.as_str() != self.dex || action.name != self.cancel_action {
            return state.reject(format!("unknown action {}::{}", action.contract, action.name));
        }
        let owner = action.data.get("owner").and_then(Value::as_str);
        let order_id = action.data.get("order_id").and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        });
        let scope = action.data.get("pair").and_then(Value::as_str);
        let (Some(owner), Some(order_id), Some(scope)) = (owner, order_id, scope) else {
            return state.reject("malformed cancel data");
        };
        if owner != action.actor.as_str() {
            return state.reject(format!("missing authority of {owner}"));
        }

        let Some(book) = state.books.get_mut(scope) else {
            return state.reject("order not found");
        };
        let Some(index) = book.iter().position(|o| o.identifier.value() == order_id) else {
            return state.reject("order not found");
        };
        if book[index].account.as_str() != owner {
            return state.reject("not the order owner");
        }
        let order = book.remove(index);
        state.credit(order.account.as_str(), &order.escrow);
        state.events.push(VenueEvent::OrderCanceled {
            scope: scope.to_string(),
            order_id: order.identifier,
            refund: order.escrow.clone(),
        });
        TxResult::committed(state.tx_id())
    }

    fn order_rows(&self, state: &VenueState, scope: &str) -> Vec<Value> {
        state
            .books
            .get(scope)
            .map(|book| {
                book.iter()
                    .map(|o| {
                        let precision = self.tokens.precision(&o.quote_symbol).unwrap_or(8);
                        o.to_row(precision)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn balance_rows(&self, state: &VenueState, contract: &str, account: &str) -> Vec<Value> {
        let mut rows: Vec<(&String, Decimal)> = state
            .balances
            .iter()
            .filter(|((holder, symbol), _)| {
                holder == account && self.tokens.by_contract(contract, symbol).is_some()
            })
            .map(|((_, symbol), amount)| (symbol, *amount))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        rows.into_iter()
            .map(|(symbol, amount)| {
                let precision = self.tokens.precision(symbol).unwrap_or(0);
                json!({ "balance": Asset::new(amount, symbol.clone(), precision).to_string() })
            })
            .collect()
    }
}

#[async_trait]
impl Ledger for PaperVenue {
    async fn get_rows(
        &self,
        contract: &str,
        table: &str,
        scope: &str,
        pagination: Pagination,
    ) -> Result<Vec<Value>, LedgerError> {
        let mut state = self.state();
        if state.faults.transport_failures > 0 {
            state.faults.transport_failures -= 1;
            return Err(LedgerError::Transport("injected transport failure".to_string()));
        }
        let all = if contract == self.dex && table == self.order_table {
            self.order_rows(&state, scope)
        } else if table == self.balance_table {
            self.balance_rows(&state, contract, scope)
        } else {
            return Err(LedgerError::Malformed(format!("no table {contract}::{table}")));
        };
        // serve in pages the way a node would, then stitch them back together
        let page_size = pagination.page_size.max(1) as usize;
        Ok(all.chunks(page_size).flat_map(|page| page.iter().cloned()).collect())
    }

    async fn submit_transfer(&self, transfer: &Transfer) -> Result<TxResult, LedgerError> {
        let mut state = self.state();
        if let Some(result) = state.take_fault()? {
            return Ok(result);
        }
        Ok(self.place(&mut state, transfer))
    }

    async fn submit_action(&self, action: &Action) -> Result<TxResult, LedgerError> {
        let mut state = self.state();
        if let Some(result) = state.take_fault()? {
            return Ok(result);
        }
        Ok(self.cancel(&mut state, action))
    }
}
