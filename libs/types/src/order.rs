//! Order types
//!
//! Orders are read-only snapshots decoded from the venue's order table. The
//! book is rebuilt from scratch on every fetch and never patched in place.

use crate::ids::{AccountName, OrderId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy order (bid)
    Buy,
    /// Sell order (ask)
    Sell,
}

impl Side {
    /// Memo keyword for the side
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    /// Venue `type` field: "buy" is a bid, anything else is an ask
    pub fn from_venue(kind: &str) -> Self {
        if kind == "buy" {
            Side::Buy
        } else {
            Side::Sell
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resting order as read from the venue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub identifier: OrderId,
    pub owner: AccountName,
    pub side: Side,
    pub price: Decimal,
    /// Quantity in base-token units
    pub quantity: Decimal,
}

impl Order {
    /// Relative distance of the order's price from `base_price`
    pub fn spread_from(&self, base_price: Decimal) -> Option<Decimal> {
        if base_price <= Decimal::ZERO {
            return None;
        }
        Some(((self.price - base_price) / base_price).abs())
    }
}

/// An order the engine intends to place; never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderIntent {
    pub side: Side,
    /// Always denominated in the base token
    pub base_quantity: Decimal,
    pub price: Decimal,
}

impl OrderIntent {
    pub fn new(side: Side, base_quantity: Decimal, price: Decimal) -> Self {
        Self {
            side,
            base_quantity,
            price,
        }
    }

    /// Quote-token value of the order
    pub fn notional(&self) -> Decimal {
        self.base_quantity * self.price
    }
}

/// Per-side order counts for one account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Depth {
    pub bids: usize,
    pub asks: usize,
}

impl Depth {
    pub fn total(&self) -> usize {
        self.bids + self.asks
    }
}

/// Sorted view of a pair's resting orders
///
/// Invariant: bids are sorted by price descending, asks ascending; equal
/// prices keep the order the venue returned them in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBook {
    bids: Vec<Order>,
    asks: Vec<Order>,
}

impl OrderBook {
    /// Partition and sort orders in venue arrival order
    pub fn from_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let (mut bids, mut asks): (Vec<Order>, Vec<Order>) =
            orders.into_iter().partition(|o| o.side == Side::Buy);
        // sort_by is stable: ties stay in arrival order
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        Self { bids, asks }
    }

    pub fn bids(&self) -> &[Order] {
        &self.bids
    }

    pub fn asks(&self) -> &[Order] {
        &self.asks
    }

    pub fn best_bid(&self) -> Option<&Order> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&Order> {
        self.asks.first()
    }

    pub fn len(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// All orders, bids first
    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.bids.iter().chain(self.asks.iter())
    }

    /// Orders owned by `account`, bids first
    ///
    /// The orders borrow from the book only, not from `account`.
    pub fn owned_by<'a, 'b>(&'a self, account: &'b AccountName) -> impl Iterator<Item = &'a Order> + 'b
    where
        'a: 'b,
    {
        self.iter().filter(move |o| &o.owner == account)
    }

    /// Live order counts for `account`
    pub fn depth_of(&self, account: &AccountName) -> Depth {
        Depth {
            bids: self.bids.iter().filter(|o| &o.owner == account).count(),
            asks: self.asks.iter().filter(|o| &o.owner == account).count(),
        }
    }

    pub fn find(&self, id: OrderId) -> Option<&Order> {
        self.iter().find(|o| o.identifier == id)
    }

    /// Check the sort invariant
    pub fn check_invariant(&self) -> bool {
        self.bids.windows(2).all(|w| w[0].price >= w[1].price)
            && self.asks.windows(2).all(|w| w[0].price <= w[1].price)
            && self.bids.iter().all(|o| o.side == Side::Buy)
            && self.asks.iter().all(|o| o.side == Side::Sell)
    }
}
