//! Order lifecycle
//!
//! Places and cancels single orders and classifies what the venue says
//! back. Transport failures are retried under the [`RetryPolicy`]; business
//! rejections are returned immediately for the caller to count.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, info, warn};
use types::ids::{AccountName, OrderId, TradingPair};
use types::numeric::Asset;
use types::order::{Order, OrderIntent, Side};

use crate::book::OrderBookView;
use crate::codec::OrderCodec;
use crate::error::{MakerError, MakerResult, RowError};
use crate::ladder::price_at;
use crate::ledger::{Action, Ledger, Pagination, Transfer};
use crate::retry::RetryPolicy;
use crate::signal::Signal;

/// Venue rejection text meaning the order is already gone
const NOT_FOUND: &str = "not found";

/// Acknowledgement of a cancel request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelAck {
    Cancelled { transaction_id: String },
    /// Filled or cancelled by someone else before we got there
    AlreadyGone,
}

/// Outcome of a bulk cancel pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CancelSummary {
    pub cancelled: usize,
    pub failed: usize,
}

impl CancelSummary {
    pub fn attempted(&self) -> usize {
        self.cancelled + self.failed
    }
}

pub struct OrderLifecycleManager {
    ledger: Arc<dyn Ledger>,
    book: Arc<OrderBookView>,
    account: AccountName,
    dex: AccountName,
    retry: RetryPolicy,
}

impl OrderLifecycleManager {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        book: Arc<OrderBookView>,
        account: AccountName,
        retry: RetryPolicy,
    ) -> MakerResult<Self> {
        let dex = book.venue().dex_account()?;
        Ok(Self {
            ledger,
            book,
            account,
            dex,
            retry,
        })
    }

    pub fn account(&self) -> &AccountName {
        &self.account
    }

    fn codec(&self) -> &OrderCodec {
        self.book.codec()
    }

    /// Place one order. Returns the transaction id.
    pub async fn place(&self, intent: &OrderIntent, pair: &TradingPair) -> MakerResult<String> {
        let encoded = self.codec().encode(intent, pair).map_err(|err| {
            warn!(
                pair = %pair,
                side = %intent.side,
                price = %intent.price,
                quantity = %intent.base_quantity,
                error = %err,
                "Order intent discarded"
            );
            err
        })?;
        let transfer = Transfer {
            token_contract: encoded.token_contract,
            from: self.account.clone(),
            to: self.dex.clone(),
            quantity: encoded.transfer,
            memo: encoded.memo,
        };

        let result = self
            .retry
            .run("place", || self.submit_transfer(&transfer))
            .await;
        match &result {
            Ok(tx_id) => info!(
                pair = %pair,
                side = %intent.side,
                memo = %transfer.memo,
                amount = %transfer.quantity,
                tx_id = %tx_id,
                "Order placed"
            ),
            Err(err) => warn!(
                pair = %pair,
                side = %intent.side,
                memo = %transfer.memo,
                amount = %transfer.quantity,
                kind = err.kind(),
                error = %err,
                "Order placement failed"
            ),
        }
        result
    }

    async fn submit_transfer(&self, transfer: &Transfer) -> MakerResult<String> {
        let result = self.ledger.submit_transfer(transfer).await?;
        if let Some(reason) = result.rejected_reason {
            return Err(MakerError::OrderRejected { reason });
        }
        match result.committed_id() {
            Some(id) => Ok(id.to_string()),
            None => Err(MakerError::OrderRejected {
                reason: "venue returned no transaction id".to_string(),
            }),
        }
    }

    /// Cancel one order; an order the venue no longer knows counts as cancelled.
    pub async fn cancel(&self, order_id: OrderId, pair: &TradingPair) -> MakerResult<CancelAck> {
        let action = Action {
            contract: self.dex.clone(),
            name: self.book.venue().cancel_action.clone(),
            data: json!({
                "owner": self.account.as_str(),
                "order_id": order_id.value(),
                "pair": pair.scope(),
            }),
            actor: self.account.clone(),
        };

        let result = self.retry.run("cancel", || self.submit_cancel(&action)).await;
        match &result {
            Ok(CancelAck::Cancelled { transaction_id }) => {
                debug!(pair = %pair, order_id = %order_id, tx_id = %transaction_id, "Order cancelled")
            }
            Ok(CancelAck::AlreadyGone) => {
                debug!(pair = %pair, order_id = %order_id, "Order already gone")
            }
            Err(err) => warn!(
                pair = %pair,
                order_id = %order_id,
                kind = err.kind(),
                error = %err,
                "Cancel failed"
            ),
        }
        result
    }

    async fn submit_cancel(&self, action: &Action) -> MakerResult<CancelAck> {
        let result = self.ledger.submit_action(action).await?;
        if let Some(reason) = result.rejected_reason {
            if reason.to_ascii_lowercase().contains(NOT_FOUND) {
                return Ok(CancelAck::AlreadyGone);
            }
            return Err(MakerError::OrderRejected { reason });
        }
        Ok(CancelAck::Cancelled {
            transaction_id: result.committed_id().unwrap_or_default().to_string(),
        })
    }

    /// Cancel each of `orders` once, counting outcomes.
    pub async fn cancel_orders<'a>(
        &self,
        orders: impl IntoIterator<Item = &'a Order>,
        pair: &TradingPair,
    ) -> CancelSummary {
        let mut summary = CancelSummary::default();
        for order in orders {
            match self.cancel(order.identifier, pair).await {
                Ok(_) => summary.cancelled += 1,
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }

    /// One pass over this account's orders from a fresh book.
    pub async fn cancel_all(&self, pair: &TradingPair) -> MakerResult<CancelSummary> {
        let book = self.book.fetch(pair).await?;
        let own: Vec<&Order> = book.owned_by(&self.account).collect();
        let summary = self.cancel_orders(own, pair).await;
        info!(
            pair = %pair,
            attempted = summary.attempted(),
            cancelled = summary.cancelled,
            failed = summary.failed,
            "Cancelled own orders"
        );
        Ok(summary)
    }

    /// Cancel own orders priced outside the signal's spread band.
    pub async fn cancel_out_of_range(&self, pair: &TradingPair, signal: &Signal) -> MakerResult<CancelSummary> {
        let book = self.book.fetch(pair).await?;
        let codec = self.codec();
        let band = |side: Side| -> MakerResult<(Decimal, Decimal)> {
            let near = codec.normalize_price(price_at(signal.base_price, signal.min_spread, side), pair)?;
            let far = codec.normalize_price(price_at(signal.base_price, signal.max_spread, side), pair)?;
            Ok((near.min(far), near.max(far)))
        };
        let (bid_lo, bid_hi) = band(Side::Buy)?;
        let (ask_lo, ask_hi) = band(Side::Sell)?;

        let stale: Vec<&Order> = book
            .owned_by(&self.account)
            .filter(|o| match o.side {
                Side::Buy => o.price < bid_lo || o.price > bid_hi,
                Side::Sell => o.price < ask_lo || o.price > ask_hi,
            })
            .collect();
        if stale.is_empty() {
            return Ok(CancelSummary::default());
        }
        info!(pair = %pair, count = stale.len(), base_price = %signal.base_price, "Cancelling out-of-range orders");
        Ok(self.cancel_orders(stale, pair).await)
    }

    /// Spendable balance of `symbol`; an account without a row holds zero.
    pub async fn available_balance(&self, symbol: &str) -> MakerResult<Decimal> {
        let token = self.codec().tokens().get(symbol)?;
        let venue = self.book.venue();
        let rows = self
            .retry
            .run("balance", || async {
                self.ledger
                    .get_rows(
                        &token.contract_id,
                        &venue.balance_table,
                        self.account.as_str(),
                        Pagination {
                            page_size: venue.page_size,
                        },
                    )
                    .await
                    .map_err(MakerError::from)
            })
            .await?;

        for row in &rows {
            let Some(raw) = row.get("balance").and_then(|v| v.as_str()) else {
                continue;
            };
            let asset = Asset::parse(raw).map_err(|_| RowError::InvalidField {
                field: "balance",
                value: raw.to_string(),
            })?;
            if asset.symbol == token.symbol {
                return Ok(asset.amount);
            }
        }
        Ok(Decimal::ZERO)
    }
}
