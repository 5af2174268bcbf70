//! Bucket wiring and composite index builders
//!
//! The byte layouts here are what settlement depends on: range scans over
//! these keys return entities in the order the controller needs, so the
//! exact encodings are part of the engine's contract.

use crate::model::{Market, Order, OrderBook, OrderState, Side, Trade};
use store::Bucket;
use types::amount::Amount;
use types::errors::{Error, ErrorKind, Result};
use types::ids::ID_LENGTH;

/// Tickers are right-padded with zero bytes to this width inside index keys.
const TICKER_BYTE_SIZE: usize = 5;

pub fn market_bucket() -> Bucket<Market> {
    Bucket::new("market")
}

/// Order books are indexed by market (to list a market's books) and uniquely
/// by the full `(market, ask, bid)` triple, which makes a duplicate pair
/// impossible to create.
pub fn order_book_bucket() -> Bucket<OrderBook> {
    Bucket::new("orderbook")
        .with_index(
            "market",
            |book: &OrderBook| Ok(Some(book.market_id.clone())),
            false,
        )
        .with_index(
            "market_tickers",
            |book: &OrderBook| Ok(Some(build_market_tickers_index(book))),
            true,
        )
}

/// 18 bytes: `8B market id || 5B ask ticker || 5B bid ticker`, tickers
/// right-padded with 0x00.
pub fn build_market_tickers_index(book: &OrderBook) -> Vec<u8> {
    let mut key = vec![0u8; ID_LENGTH + 2 * TICKER_BYTE_SIZE];
    key[..book.market_id.len().min(ID_LENGTH)]
        .copy_from_slice(&book.market_id[..book.market_id.len().min(ID_LENGTH)]);
    let ask = book.ask_ticker.as_bytes();
    key[ID_LENGTH..ID_LENGTH + ask.len().min(TICKER_BYTE_SIZE)]
        .copy_from_slice(&ask[..ask.len().min(TICKER_BYTE_SIZE)]);
    let bid = book.bid_ticker.as_bytes();
    key[ID_LENGTH + TICKER_BYTE_SIZE..ID_LENGTH + TICKER_BYTE_SIZE + bid.len().min(TICKER_BYTE_SIZE)]
        .copy_from_slice(&bid[..bid.len().min(TICKER_BYTE_SIZE)]);
    key
}

/// Orders carry a single conditional index over `(book, side, price)` that
/// exists only while the order is open, so closed orders drop out of match
/// scans on their own.
pub fn order_bucket() -> Bucket<Order> {
    Bucket::new("order").with_index(
        "open",
        |order: &Order| {
            if order.order_state != OrderState::Open {
                return Ok(None);
            }
            let mut key = open_order_scan_prefix(&order.order_book_id, order.side);
            key.extend_from_slice(&order.price.lexicographic()?);
            Ok(Some(key))
        },
        false,
    )
}

/// 9 bytes: `8B order book id || 1B side`. This is the open-order index key
/// without its price suffix, which is exactly the prefix a match scan needs.
pub fn open_order_scan_prefix(order_book_id: &[u8], side: Side) -> Vec<u8> {
    let mut key = vec![0u8; ID_LENGTH + 1];
    key[..order_book_id.len().min(ID_LENGTH)]
        .copy_from_slice(&order_book_id[..order_book_id.len().min(ID_LENGTH)]);
    key[ID_LENGTH] = side.as_byte();
    key
}

/// 25 bytes: the scan prefix plus `16B lexicographic(price)`. Byte order over
/// these keys equals price order, which is the whole trick behind matching
/// through range scans.
pub fn build_open_order_index(
    order_book_id: &[u8],
    side: Side,
    price: &Amount,
) -> Result<Vec<u8>> {
    let mut key = open_order_scan_prefix(order_book_id, side);
    key.extend_from_slice(&price.lexicographic()?);
    Ok(key)
}

/// Trades are indexed under both of their orders (one lookup finds every
/// fill of an order) and by `(book, time)` for recency queries.
pub fn trade_bucket() -> Bucket<Trade> {
    Bucket::new("trade")
        .with_multi_key_index(
            "order",
            |trade: &Trade| Ok(vec![trade.maker_id.clone(), trade.taker_id.clone()]),
            false,
        )
        .with_index(
            "orderbook",
            |trade: &Trade| build_order_book_time_index(trade).map(Some),
            false,
        )
}

/// 16 bytes: `8B order book id || 8B big-endian executed-at`. Negative times
/// would sort above all positive ones in two's complement, so they are
/// rejected instead of indexed.
pub fn build_order_book_time_index(trade: &Trade) -> Result<Vec<u8>> {
    if trade.executed_at.as_secs() < 0 {
        return Err(Error::new(
            ErrorKind::State,
            "cannot index negative execution times",
        ));
    }
    let mut key = vec![0u8; 2 * ID_LENGTH];
    key[..trade.order_book_id.len().min(ID_LENGTH)]
        .copy_from_slice(&trade.order_book_id[..trade.order_book_id.len().min(ID_LENGTH)]);
    key[ID_LENGTH..].copy_from_slice(&(trade.executed_at.as_secs() as u64).to_be_bytes());
    Ok(key)
}
