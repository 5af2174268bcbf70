//! Commands accepted by the engine
//!
//! Three messages, each with a serialized routing path and structural
//! validation. Validation here is stateless; the handlers add the stateful
//! checks (does the market exist, who signed, and so on).

use crate::migration::Metadata;
use serde::{Deserialize, Serialize};
use types::amount::Amount;
use types::coin::{is_currency_code, Coin};
use types::errors::{ErrorKind, FieldErrors, Result};
use types::ids::validate_id;
use types::prelude::Address;

/// Create an order book for a currency pair inside an existing market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderBookMsg {
    pub metadata: Option<Metadata>,
    pub market_id: Vec<u8>,
    pub ask_ticker: String,
    pub bid_ticker: String,
}

impl CreateOrderBookMsg {
    pub const PATH: &'static str = "order/create_book";

    pub fn validate(&self) -> Result<()> {
        let mut errs = FieldErrors::new();
        validate_metadata(&mut errs, &self.metadata);
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
        if self.bid_ticker <= self.ask_ticker {
            errs.push(
                "BidTicker",
                ErrorKind::Currency,
                format!(
                    "ask ({}) must sort before bid ({})",
                    self.ask_ticker, self.bid_ticker
                ),
            );
        }
        errs.finish()
    }
}

/// Place a limit order on an order book. The offer ticker decides the side;
/// a missing trader defaults to the main signer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderMsg {
    pub metadata: Option<Metadata>,
    pub order_book_id: Vec<u8>,
    pub trader: Option<Address>,
    pub offer: Coin,
    pub price: Amount,
}

impl CreateOrderMsg {
    pub const PATH: &'static str = "order/create";

    pub fn validate(&self) -> Result<()> {
        let mut errs = FieldErrors::new();
        validate_metadata(&mut errs, &self.metadata);
        errs.append("OrderBookID", validate_id(&self.order_book_id, false));

        errs.append("Offer", self.offer.validate());
        if !self.offer.is_positive() {
            errs.push("Offer", ErrorKind::Input, "offer must be positive");
        }

        errs.append("Price", self.price.validate());
        if !self.price.is_positive() {
            errs.push("Price", ErrorKind::Input, "price must be positive");
        }
        errs.finish()
    }
}

/// Cancel an open order, returning its escrowed funds to the trader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelOrderMsg {
    pub metadata: Option<Metadata>,
    pub order_id: Vec<u8>,
}

impl CancelOrderMsg {
    pub const PATH: &'static str = "order/cancel";

    pub fn validate(&self) -> Result<()> {
        let mut errs = FieldErrors::new();
        validate_metadata(&mut errs, &self.metadata);
        errs.append("OrderID", validate_id(&self.order_id, false));
        errs.finish()
    }
}

fn validate_metadata(errs: &mut FieldErrors, metadata: &Option<Metadata>) {
    match metadata {
        None => errs.push("Metadata", ErrorKind::Metadata, "missing metadata"),
        Some(meta) => errs.append("Metadata", meta.validate()),
    }
}

/// All commands the engine dispatches on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderMsg {
    CreateBook(CreateOrderBookMsg),
    Create(CreateOrderMsg),
    Cancel(CancelOrderMsg),
}

impl OrderMsg {
    /// The serialized routing path of the wrapped command.
    pub fn path(&self) -> &'static str {
        match self {
            OrderMsg::CreateBook(_) => CreateOrderBookMsg::PATH,
            OrderMsg::Create(_) => CreateOrderMsg::PATH,
            OrderMsg::Cancel(_) => CancelOrderMsg::PATH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::seq_id;

    fn valid_create_book() -> CreateOrderBookMsg {
        CreateOrderBookMsg {
            metadata: Some(Metadata::new(1)),
            market_id: seq_id(1),
            ask_ticker: "BAR".to_string(),
            bid_ticker: "FOO".to_string(),
        }
    }

    fn valid_create_order() -> CreateOrderMsg {
        CreateOrderMsg {
            metadata: Some(Metadata::new(1)),
            order_book_id: seq_id(2),
            trader: None,
            offer: Coin::new(100, 0, "BAR"),
            price: Amount::new(3, 0),
        }
    }

    #[test]
    fn test_create_order_book_msg() {
        assert_eq!(CreateOrderBookMsg::PATH, "order/create_book");
        assert!(valid_create_book().validate().is_ok());

        let missing_meta = CreateOrderBookMsg {
            metadata: None,
            ..valid_create_book()
        };
        assert!(missing_meta.validate().unwrap_err().is(ErrorKind::Metadata));

        let short_id = CreateOrderBookMsg {
            market_id: vec![1, 2, 3],
            ..valid_create_book()
        };
        assert!(short_id.validate().unwrap_err().is(ErrorKind::Input));

        let swapped = CreateOrderBookMsg {
            ask_ticker: "FOO".to_string(),
            bid_ticker: "BAR".to_string(),
            ..valid_create_book()
        };
        assert!(swapped.validate().unwrap_err().is(ErrorKind::Currency));

        let same = CreateOrderBookMsg {
            bid_ticker: "BAR".to_string(),
            ..valid_create_book()
        };
        assert!(same.validate().unwrap_err().is(ErrorKind::Currency));

        let lowercase = CreateOrderBookMsg {
            ask_ticker: "bar".to_string(),
            ..valid_create_book()
        };
        assert!(lowercase.validate().unwrap_err().is(ErrorKind::Currency));
    }

    #[test]
    fn test_create_order_msg() {
        assert_eq!(CreateOrderMsg::PATH, "order/create");
        assert!(valid_create_order().validate().is_ok());

        let missing_meta = CreateOrderMsg {
            metadata: None,
            ..valid_create_order()
        };
        assert!(missing_meta.validate().unwrap_err().is(ErrorKind::Metadata));

        let empty_offer = CreateOrderMsg {
            offer: Coin::new(0, 0, "BAR"),
            ..valid_create_order()
        };
        assert!(empty_offer.validate().unwrap_err().is(ErrorKind::Input));

        let negative_offer = CreateOrderMsg {
            offer: Coin::new(-1, 0, "BAR"),
            ..valid_create_order()
        };
        assert!(negative_offer.validate().unwrap_err().is(ErrorKind::Input));

        let free = CreateOrderMsg {
            price: Amount::ZERO,
            ..valid_create_order()
        };
        assert!(free.validate().unwrap_err().is(ErrorKind::Input));

        let bad_id = CreateOrderMsg {
            order_book_id: Vec::new(),
            ..valid_create_order()
        };
        assert!(bad_id.validate().unwrap_err().is(ErrorKind::Empty));
    }

    #[test]
    fn test_cancel_order_msg() {
        assert_eq!(CancelOrderMsg::PATH, "order/cancel");

        let msg = CancelOrderMsg {
            metadata: Some(Metadata::new(1)),
            order_id: seq_id(7),
        };
        assert!(msg.validate().is_ok());

        let missing_meta = CancelOrderMsg {
            metadata: None,
            ..msg.clone()
        };
        assert!(missing_meta.validate().unwrap_err().is(ErrorKind::Metadata));

        let bad_id = CancelOrderMsg {
            order_id: vec![9; 9],
            ..msg
        };
        assert!(bad_id.validate().unwrap_err().is(ErrorKind::Input));
    }

    #[test]
    fn test_msg_paths() {
        assert_eq!(
            OrderMsg::CreateBook(valid_create_book()).path(),
            "order/create_book"
        );
        assert_eq!(OrderMsg::Create(valid_create_order()).path(), "order/create");
        assert_eq!(
            OrderMsg::Cancel(CancelOrderMsg {
                metadata: Some(Metadata::new(1)),
                order_id: seq_id(1)
            })
            .path(),
            "order/cancel"
        );
    }

    #[test]
    fn test_msg_serialization_roundtrip() {
        let msg = OrderMsg::Create(valid_create_order());
        let json = serde_json::to_string(&msg).unwrap();
        let back: OrderMsg = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }
}
