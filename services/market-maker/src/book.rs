//! Order book view
//!
//! Fetches every row of a pair's order table and rebuilds a sorted
//! [`OrderBook`]. A transport failure yields no book at all: callers must
//! read that as "state unknown", never as "book empty".

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};
use types::ids::TradingPair;
use types::order::OrderBook;

use crate::codec::OrderCodec;
use crate::config::VenueConfig;
use crate::error::{MakerError, MakerResult};
use crate::ledger::{Ledger, Pagination};

pub struct OrderBookView {
    ledger: Arc<dyn Ledger>,
    codec: OrderCodec,
    venue: VenueConfig,
    /// Undecodable rows skipped across all fetches
    skipped_rows: AtomicU64,
}

impl OrderBookView {
    pub fn new(ledger: Arc<dyn Ledger>, codec: OrderCodec, venue: VenueConfig) -> Self {
        Self {
            ledger,
            codec,
            venue,
            skipped_rows: AtomicU64::new(0),
        }
    }

    pub fn codec(&self) -> &OrderCodec {
        &self.codec
    }

    pub fn venue(&self) -> &VenueConfig {
        &self.venue
    }

    pub fn skipped_rows(&self) -> u64 {
        self.skipped_rows.load(Ordering::Relaxed)
    }

    /// Fresh book for `pair`.
    pub async fn fetch(&self, pair: &TradingPair) -> MakerResult<OrderBook> {
        let scope = pair.scope();
        let rows = self
            .ledger
            .get_rows(
                &self.venue.dex_contract,
                &self.venue.order_table,
                &scope,
                Pagination {
                    page_size: self.venue.page_size,
                },
            )
            .await
            .map_err(|err| {
                warn!(pair = %pair, scope = %scope, error = %err, "Order book fetch failed");
                MakerError::from(err)
            })?;

        let (orders, skipped) = self.codec.decode_rows(&rows, pair);
        if skipped > 0 {
            self.skipped_rows.fetch_add(skipped as u64, Ordering::Relaxed);
        }
        let book = OrderBook::from_orders(orders);
        debug!(
            pair = %pair,
            rows = rows.len(),
            bids = book.bids().len(),
            asks = book.asks().len(),
            skipped,
            "Fetched order book"
        );
        Ok(book)
    }
}
