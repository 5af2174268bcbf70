//! Per-order escrow addresses
//!
//! Every order holds its offered funds on an address derived from its id
//! through a structured condition. The derivation is pure, so the address is
//! computed on demand and never stored on the order.

use crate::model::Order;
use types::address::{Address, Condition};

fn order_condition(id: &[u8]) -> Condition {
    assert!(
        !id.is_empty(),
        "developer error: must save before taking address"
    );
    Condition::new("orderbook", "order", id.to_vec())
}

impl Order {
    /// The escrow address holding this order's remaining offer.
    pub fn address(&self) -> Address {
        order_condition(&self.id).address()
    }
}
