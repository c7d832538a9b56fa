//! Order codec
//!
//! Orders reach the venue as token transfers to the DEX contract. The
//! transferred asset escrows the order's cost and the memo carries the
//! intent:
//!
//! ```text
//! buy:100.0000 LIBRE:0.0000000100 BTC
//! └┬┘ └─────┬──────┘ └──────┬──────┘
//! side  base quantity   price in quote
//! ```
//!
//! A buy transfers `quantity × price` of the quote token, a sell transfers
//! the base quantity itself. Quantities round toward zero at the base
//! token's precision; prices quoted in BTC always carry 10 decimals.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::warn;
use types::ids::{AccountName, OrderId, TradingPair};
use types::numeric::{parse_decimal, round_down, round_half_up, Asset};
use types::order::{Order, OrderIntent, Side};
use types::token::TokenRegistry;

use crate::error::{MakerError, MakerResult, RowError};

/// Transfer that places one order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedOrder {
    /// Amount and symbol moved into escrow
    pub transfer: Asset,
    /// Contract that issues the transferred token
    pub token_contract: String,
    pub memo: String,
}

/// Decoded memo of a placement transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoOrder {
    pub side: Side,
    pub quantity: Asset,
    pub price: Asset,
}

/// Encodes intents into transfers and decodes order-table rows
#[derive(Debug, Clone)]
pub struct OrderCodec {
    tokens: TokenRegistry,
}

impl OrderCodec {
    pub fn new(tokens: TokenRegistry) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    /// Fractional digits of base quantities for `pair`
    pub fn base_precision(&self, pair: &TradingPair) -> MakerResult<u32> {
        Ok(self.tokens.precision(&pair.base)?)
    }

    /// Fractional digits of prices for `pair`
    pub fn price_precision(&self, pair: &TradingPair) -> MakerResult<u32> {
        Ok(self.tokens.price_precision(&pair.quote)?)
    }

    /// Round a price the way `encode` will write it
    pub fn normalize_price(&self, price: Decimal, pair: &TradingPair) -> MakerResult<Decimal> {
        Ok(round_half_up(price, self.price_precision(pair)?))
    }

    /// Encode an intent as a transfer amount, issuing contract and memo.
    pub fn encode(&self, intent: &OrderIntent, pair: &TradingPair) -> MakerResult<EncodedOrder> {
        let base = self.tokens.get(&pair.base)?;
        let quote = self.tokens.get(&pair.quote)?;
        let price_precision = self.tokens.price_precision(&pair.quote)?;

        let quantity = positive(
            "quantity",
            intent.base_quantity,
            round_down(intent.base_quantity, base.decimal_precision),
            base.decimal_precision,
        )?;
        let price = positive(
            "price",
            intent.price,
            round_half_up(intent.price, price_precision),
            price_precision,
        )?;

        let memo = format!(
            "{}:{} {}:{} {}",
            intent.side, quantity, pair.base, price, pair.quote
        );

        let (transfer, token_contract) = match intent.side {
            Side::Buy => {
                let cost = quantity * price;
                let amount = positive(
                    "transfer",
                    cost,
                    round_half_up(cost, quote.decimal_precision),
                    quote.decimal_precision,
                )?;
                (
                    Asset {
                        amount,
                        symbol: quote.symbol.clone(),
                    },
                    quote.contract_id.clone(),
                )
            }
            Side::Sell => (
                Asset {
                    amount: quantity,
                    symbol: base.symbol.clone(),
                },
                base.contract_id.clone(),
            ),
        };

        Ok(EncodedOrder {
            transfer,
            token_contract,
            memo,
        })
    }

    /// Decode one order-table row.
    pub fn decode(&self, row: &Value, pair: &TradingPair) -> Result<Order, RowError> {
        let identifier = match row.get("identifier") {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
            Some(_) => None,
            None => return Err(RowError::MissingField { field: "identifier" }),
        }
        .ok_or_else(|| invalid("identifier", row.get("identifier")))?;

        let account = str_field(row, "account")?;
        let owner = AccountName::new(account).map_err(|_| RowError::InvalidField {
            field: "account",
            value: account.to_string(),
        })?;

        let side = Side::from_venue(str_field(row, "type")?);

        let price = match row.get("price") {
            Some(Value::String(s)) => parse_decimal(s).ok(),
            Some(Value::Number(n)) => Decimal::from_str(&n.to_string()).ok(),
            Some(_) => None,
            None => return Err(RowError::MissingField { field: "price" }),
        }
        .filter(|p| *p > Decimal::ZERO)
        .ok_or_else(|| invalid("price", row.get("price")))?;

        let base_asset = str_field(row, "baseAsset")?;
        let quantity = Asset::leading_amount(base_asset)
            .ok()
            .filter(|q| *q > Decimal::ZERO)
            .ok_or_else(|| RowError::InvalidField {
                field: "baseAsset",
                value: base_asset.to_string(),
            })?;
        if let Some(symbol) = base_asset.split_whitespace().nth(1) {
            if symbol != pair.base {
                return Err(RowError::InvalidField {
                    field: "baseAsset",
                    value: base_asset.to_string(),
                });
            }
        }

        Ok(Order {
            identifier: OrderId::new(identifier),
            owner,
            side,
            price,
            quantity,
        })
    }

    /// Decode every row, skipping (and logging) malformed ones.
    ///
    /// Returns the decoded orders and the number of rows skipped.
    pub fn decode_rows(&self, rows: &[Value], pair: &TradingPair) -> (Vec<Order>, usize) {
        let mut orders = Vec::with_capacity(rows.len());
        let mut skipped = 0;
        for row in rows {
            match self.decode(row, pair) {
                Ok(order) => orders.push(order),
                Err(err) => {
                    skipped += 1;
                    warn!(pair = %pair, error = %err, row = %row, "Skipping undecodable order row");
                }
            }
        }
        (orders, skipped)
    }
}

/// Parse a placement memo `"{side}:{qty} {BASE}:{price} {QUOTE}"`.
pub fn parse_memo(memo: &str) -> Option<MemoOrder> {
    let mut parts = memo.splitn(3, ':');
    let side = match parts.next()? {
        "buy" => Side::Buy,
        "sell" => Side::Sell,
        _ => return None,
    };
    let quantity = Asset::parse(parts.next()?).ok()?;
    let price = Asset::parse(parts.next()?).ok()?;
    Some(MemoOrder {
        side,
        quantity,
        price,
    })
}

fn positive(field: &'static str, value: Decimal, rounded: Decimal, precision: u32) -> MakerResult<Decimal> {
    if rounded <= Decimal::ZERO {
        return Err(MakerError::Precision {
            field,
            value,
            rounded,
            precision,
        });
    }
    Ok(rounded)
}

fn str_field<'a>(row: &'a Value, field: &'static str) -> Result<&'a str, RowError> {
    match row.get(field) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(RowError::InvalidField {
            field,
            value: other.to_string(),
        }),
        None => Err(RowError::MissingField { field }),
    }
}

fn invalid(field: &'static str, value: Option<&Value>) -> RowError {
    RowError::InvalidField {
        field,
        value: value.map(|v| v.to_string()).unwrap_or_default(),
    }
}
