//! Domain models: Market, OrderBook, Order, Trade
//!
//! Validation collects every field failure of an entity before surfacing
//! them together; the bucket layer runs it on every write.

use serde::{Deserialize, Serialize};
use store::Model;
use types::amount::Amount;
use types::coin::{is_currency_code, Coin};
use types::errors::{ErrorKind, FieldErrors, Result};
use types::ids::validate_id;
use types::prelude::Address;
use types::time::UnixTime;

/// Check a market name: 4-32 characters of letters, digits, `_`, `.`, `-`.
pub fn valid_market_name(name: &str) -> bool {
    let len = name.chars().count();
    (4..=32).contains(&len)
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Which currency of the pair an order offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Offers the first ticker of the book for the second
    Ask,
    /// Offers the second ticker of the book for the first
    Bid,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Ask => Side::Bid,
            Side::Bid => Side::Ask,
        }
    }

    /// Wire encoding used inside composite index keys.
    pub fn as_byte(&self) -> u8 {
        match self {
            Side::Ask => 0,
            Side::Bid => 1,
        }
    }
}

/// Order lifecycle state. `Done` and `Cancel` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderState {
    Open,
    Done,
    Cancel,
}

/// A market groups order books under one owner, who alone may create them.
///
/// Markets are created by an external admin path, never mutated, never
/// deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    #[serde(skip)]
    pub id: Vec<u8>,
    pub owner: Address,
    pub name: String,
}

impl Model for Market {
    fn id(&self) -> &[u8] {
        &self.id
    }

    fn set_id(&mut self, id: Vec<u8>) {
        self.id = id;
    }

    fn validate(&self) -> Result<()> {
        let mut errs = FieldErrors::new();
        errs.append("ID", validate_id(&self.id, true));
        if !valid_market_name(&self.name) {
            errs.push("Name", ErrorKind::Model, "invalid market name");
        }
        errs.finish()
    }
}

/// One order book per canonically ordered currency pair within a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    #[serde(skip)]
    pub id: Vec<u8>,
    pub market_id: Vec<u8>,
    pub ask_ticker: String,
    pub bid_ticker: String,
    pub total_ask_count: i64,
    pub total_bid_count: i64,
}

impl Model for OrderBook {
    fn id(&self) -> &[u8] {
        &self.id
    }

    fn set_id(&mut self, id: Vec<u8>) {
        self.id = id;
    }

    fn validate(&self) -> Result<()> {
        let mut errs = FieldErrors::new();
        errs.append("ID", validate_id(&self.id, true));
        errs.append("MarketID", validate_id(&self.market_id, false));
        if !is_currency_code(&self.ask_ticker) {
            errs.push(
                "AskTicker",
                ErrorKind::Currency,
                format!("invalid ask ticker: {}", self.ask_ticker),
            );
        }
        if !is_currency_code(&self.bid_ticker) {
            errs.push(
                "BidTicker",
                ErrorKind::Currency,
                format!("invalid bid ticker: {}", self.bid_ticker),
            );
        }
        // canonical pair order keeps one book per pair possible
        if self.bid_ticker <= self.ask_ticker {
            errs.push(
                "BidTicker",
                ErrorKind::Currency,
                "ask ticker must sort before bid ticker",
            );
        }
        if self.total_ask_count < 0 {
            errs.push("TotalAskCount", ErrorKind::Model, "negative total ask count");
        }
        if self.total_bid_count < 0 {
            errs.push("TotalBidCount", ErrorKind::Model, "negative total bid count");
        }
        errs.finish()
    }
}

/// A limit order resting in, or arriving at, one order book.
///
/// The offer ticker is the book's ask ticker for an ask order and the bid
/// ticker for a bid order; the handler enforces that against the book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(skip)]
    pub id: Vec<u8>,
    pub order_book_id: Vec<u8>,
    pub trader: Address,
    pub side: Side,
    pub order_state: OrderState,
    pub original_offer: Coin,
    pub remaining_offer: Coin,
    pub price: Amount,
    pub created_at: UnixTime,
    pub updated_at: UnixTime,
}

impl Model for Order {
    fn id(&self) -> &[u8] {
        &self.id
    }

    fn set_id(&mut self, id: Vec<u8>) {
        self.id = id;
    }

    fn validate(&self) -> Result<()> {
        let mut errs = FieldErrors::new();
        errs.append("ID", validate_id(&self.id, true));
        errs.append("OrderBookID", validate_id(&self.order_book_id, false));
        errs.append("OriginalOffer", self.original_offer.validate());
        errs.append("RemainingOffer", self.remaining_offer.validate());

        match self.remaining_offer.compare(&self.original_offer) {
            Err(_) => errs.push(
                "RemainingOffer",
                ErrorKind::Currency,
                "remaining and original offer tickers differ",
            ),
            Ok(order) => {
                if order == std::cmp::Ordering::Greater {
                    errs.push(
                        "RemainingOffer",
                        ErrorKind::Model,
                        "remaining offer exceeds original offer",
                    );
                }
                if self.remaining_offer.is_negative() {
                    errs.push("RemainingOffer", ErrorKind::Model, "negative remaining offer");
                }
            }
        }

        errs.append("Price", self.price.validate());
        if !self.price.is_positive() {
            errs.push("Price", ErrorKind::State, "price must be positive");
        }

        errs.append("CreatedAt", self.created_at.validate());
        if self.created_at.is_zero() {
            errs.push("CreatedAt", ErrorKind::Empty, "missing created at");
        }
        errs.append("UpdatedAt", self.updated_at.validate());
        if self.updated_at.is_zero() {
            errs.push("UpdatedAt", ErrorKind::Empty, "missing updated at");
        }
        errs.finish()
    }
}

/// Immutable record of one settlement between a maker and a taker order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(skip)]
    pub id: Vec<u8>,
    pub order_book_id: Vec<u8>,
    pub maker_id: Vec<u8>,
    pub taker_id: Vec<u8>,
    pub maker: Address,
    pub taker: Address,
    pub maker_paid: Coin,
    pub taker_paid: Coin,
    pub executed_at: UnixTime,
}

impl Model for Trade {
    fn id(&self) -> &[u8] {
        &self.id
    }

    fn set_id(&mut self, id: Vec<u8>) {
        self.id = id;
    }

    fn validate(&self) -> Result<()> {
        let mut errs = FieldErrors::new();
        errs.append("ID", validate_id(&self.id, true));
        errs.append("OrderBookID", validate_id(&self.order_book_id, false));
        errs.append("MakerID", validate_id(&self.maker_id, false));
        errs.append("TakerID", validate_id(&self.taker_id, false));
        errs.append("MakerPaid", self.maker_paid.validate());
        errs.append("TakerPaid", self.taker_paid.validate());
        errs.append("ExecutedAt", self.executed_at.validate());
        if self.executed_at.is_zero() {
            errs.push("ExecutedAt", ErrorKind::Empty, "missing executed at");
        }
        errs.finish()
    }
}
