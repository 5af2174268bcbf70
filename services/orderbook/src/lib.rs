//! Deterministic on-chain order-book matching engine
//!
//! Maintains markets, per-market order books over currency pairs, and
//! executes limit orders against resting counter-orders with atomic fund
//! custody. Persistence is key-value only: hand-crafted binary composite
//! indices give price/time priority through plain range scans, and every
//! order escrows its offer on its own derived address until it is done or
//! cancelled.
//!
//! # Modules
//! - `model`: Market, OrderBook, Order, Trade and their validation
//! - `msg`: the three accepted commands
//! - `bucket`: bucket wiring and composite index builders
//! - `condition`: per-order escrow addresses
//! - `migration`: schema metadata and the migration registry
//! - `auth`: command context and authorization ports
//! - `controller`: price-priority settlement and cancellation
//! - `handler`: check/deliver glue per command

pub mod auth;
pub mod bucket;
pub mod condition;
pub mod controller;
pub mod handler;
pub mod migration;
pub mod model;
pub mod msg;

pub use auth::{Authenticator, Context, SignerAuth};
pub use controller::Controller;
pub use handler::{register_query, CheckResult, DeliverResult, Router};
pub use model::{Market, Order, OrderBook, OrderState, Side, Trade};
pub use msg::{CancelOrderMsg, CreateOrderBookMsg, CreateOrderMsg, OrderMsg};
