//! Command handlers
//!
//! Every command runs in two phases: `check` validates and reports a gas
//! hint, `deliver` re-validates, mutates state and returns the created
//! primary id. The host takes a savepoint before deliver and rolls back on
//! error, so handlers never clean up after themselves.

use crate::auth::{Authenticator, Context};
use crate::bucket::{market_bucket, order_book_bucket, order_bucket, trade_bucket};
use crate::controller::Controller;
use crate::migration::{self, PACKAGE_NAME};
use crate::model::{Market, Order, OrderBook, OrderState, Side};
use crate::msg::{CancelOrderMsg, CreateOrderBookMsg, CreateOrderMsg, OrderMsg};
use cash::CoinMover;
use store::kv::KvWrite;
use store::{Bucket, QueryRouter};
use tracing::info;
use types::errors::{Error, ErrorKind, Result};

const NEW_ORDER_BOOK_COST: i64 = 100;
const NEW_ORDER_COST: i64 = 10;
const CANCEL_ORDER_COST: i64 = 10;

/// Outcome of the check phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub gas_allocated: i64,
}

/// Outcome of the deliver phase; `data` carries the created primary id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeliverResult {
    pub data: Vec<u8>,
}

/// Expose all four buckets for external read access.
pub fn register_query(router: &mut QueryRouter) {
    market_bucket().register("markets", router);
    order_book_bucket().register("orderbooks", router);
    order_bucket().register("orders", router);
    trade_bucket().register("trades", router);
}

/// Creates order books. Only the market owner may.
pub struct OrderBookHandler<A: Authenticator> {
    auth: A,
    order_books: Bucket<OrderBook>,
    markets: Bucket<Market>,
}

impl<A: Authenticator> OrderBookHandler<A> {
    pub fn new(auth: A) -> Self {
        migration::register_default_migrations();
        Self {
            auth,
            order_books: order_book_bucket(),
            markets: market_bucket(),
        }
    }

    fn validate<K: KvWrite>(
        &self,
        ctx: &Context,
        db: &K,
        msg: &CreateOrderBookMsg,
    ) -> Result<()> {
        msg.validate()?;
        migration::verify_schema(db, PACKAGE_NAME, msg.metadata.as_ref(), CreateOrderBookMsg::PATH)?;

        let market = self
            .markets
            .one(db, &msg.market_id)
            .map_err(|err| err.context("load market"))?;
        if !self.auth.has_address(ctx, &market.owner) {
            return Err(Error::unauthorized("only market owner can create orderbook"));
        }
        Ok(())
    }

    pub fn check<K: KvWrite>(
        &self,
        ctx: &Context,
        db: &mut K,
        msg: &CreateOrderBookMsg,
    ) -> Result<CheckResult> {
        self.validate(ctx, db, msg)?;
        Ok(CheckResult {
            gas_allocated: NEW_ORDER_BOOK_COST,
        })
    }

    pub fn deliver<K: KvWrite>(
        &self,
        ctx: &Context,
        db: &mut K,
        msg: &CreateOrderBookMsg,
    ) -> Result<DeliverResult> {
        self.validate(ctx, db, msg)?;

        let mut book = OrderBook {
            id: Vec::new(),
            market_id: msg.market_id.clone(),
            ask_ticker: msg.ask_ticker.clone(),
            bid_ticker: msg.bid_ticker.clone(),
            total_ask_count: 0,
            total_bid_count: 0,
        };
        // the unique market_tickers index rejects a duplicate pair here
        self.order_books.put(db, &mut book)?;
        info!(book = ?book.id, ask = %book.ask_ticker, bid = %book.bid_ticker, "created orderbook");

        Ok(DeliverResult {
            data: book.id.clone(),
        })
    }
}

/// Places limit orders: persists the order, escrows the offer, then settles
/// against the book.
pub struct CreateOrderHandler<A: Authenticator, M: CoinMover + Clone> {
    auth: A,
    mover: M,
    orders: Bucket<Order>,
    order_books: Bucket<OrderBook>,
    controller: Controller<M>,
}

impl<A: Authenticator, M: CoinMover + Clone> CreateOrderHandler<A, M> {
    pub fn new(auth: A, mover: M) -> Self {
        migration::register_default_migrations();
        Self {
            auth,
            mover: mover.clone(),
            orders: order_bucket(),
            order_books: order_book_bucket(),
            controller: Controller::new(mover),
        }
    }

    fn validate<K: KvWrite>(
        &self,
        ctx: &Context,
        db: &K,
        msg: &CreateOrderMsg,
    ) -> Result<OrderBook> {
        msg.validate()?;
        migration::verify_schema(db, PACKAGE_NAME, msg.metadata.as_ref(), CreateOrderMsg::PATH)?;

        let book = self
            .order_books
            .one(db, &msg.order_book_id)
            .map_err(|err| err.context("load orderbook"))?;

        let ticker = &msg.offer.ticker;
        if *ticker != book.ask_ticker && *ticker != book.bid_ticker {
            return Err(Error::new(
                ErrorKind::Currency,
                "offer ticker not in this orderbook",
            ));
        }

        if let Some(trader) = &msg.trader {
            if !self.auth.has_address(ctx, trader) {
                return Err(Error::unauthorized("must be authorized by the trader"));
            }
        }
        Ok(book)
    }

    pub fn check<K: KvWrite>(
        &self,
        ctx: &Context,
        db: &mut K,
        msg: &CreateOrderMsg,
    ) -> Result<CheckResult> {
        self.validate(ctx, db, msg)?;
        Ok(CheckResult {
            gas_allocated: NEW_ORDER_COST,
        })
    }

    pub fn deliver<K: KvWrite>(
        &self,
        ctx: &Context,
        db: &mut K,
        msg: &CreateOrderMsg,
    ) -> Result<DeliverResult> {
        let mut book = self.validate(ctx, db, msg)?;
        let now = ctx.block_time().map_err(|err| err.context("deliver order"))?;

        let trader = match msg.trader {
            Some(trader) => trader,
            None => self
                .auth
                .main_signer(ctx)
                .ok_or_else(|| Error::unauthorized("no signer to act as trader"))?,
        };

        let side = if msg.offer.ticker == book.bid_ticker {
            Side::Bid
        } else {
            Side::Ask
        };

        let mut order = Order {
            id: Vec::new(),
            order_book_id: msg.order_book_id.clone(),
            trader,
            side,
            order_state: OrderState::Open,
            original_offer: msg.offer.clone(),
            remaining_offer: msg.offer.clone(),
            price: msg.price,
            created_at: now,
            updated_at: now,
        };
        self.orders.put(db, &mut order)?;

        // escrow funding needs the generated id for the derived address
        self.mover
            .move_coins(db, &trader, &order.address(), &msg.offer)
            .map_err(|err| err.context("cannot cover order"))?;

        match side {
            Side::Ask => book.total_ask_count += 1,
            Side::Bid => book.total_bid_count += 1,
        }
        self.order_books.put(db, &mut book)?;

        info!(order = ?order.id, side = ?side, "created order");
        self.controller.settle(db, &mut order, now)?;

        Ok(DeliverResult {
            data: order.id.clone(),
        })
    }
}

/// Cancels open orders on the trader's authority.
pub struct CancelOrderHandler<A: Authenticator, M: CoinMover> {
    auth: A,
    orders: Bucket<Order>,
    controller: Controller<M>,
}

impl<A: Authenticator, M: CoinMover> CancelOrderHandler<A, M> {
    pub fn new(auth: A, mover: M) -> Self {
        migration::register_default_migrations();
        Self {
            auth,
            orders: order_bucket(),
            controller: Controller::new(mover),
        }
    }

    fn validate<K: KvWrite>(&self, ctx: &Context, db: &K, msg: &CancelOrderMsg) -> Result<Order> {
        msg.validate()?;
        migration::verify_schema(db, PACKAGE_NAME, msg.metadata.as_ref(), CancelOrderMsg::PATH)?;

        let order = self
            .orders
            .one(db, &msg.order_id)
            .map_err(|err| err.context("load order"))?;
        if order.order_state != OrderState::Open {
            return Err(Error::state("can only cancel open orders"));
        }
        if !self.auth.has_address(ctx, &order.trader) {
            return Err(Error::unauthorized("must be authorized by the trader"));
        }
        Ok(order)
    }

    pub fn check<K: KvWrite>(
        &self,
        ctx: &Context,
        db: &mut K,
        msg: &CancelOrderMsg,
    ) -> Result<CheckResult> {
        self.validate(ctx, db, msg)?;
        Ok(CheckResult {
            gas_allocated: CANCEL_ORDER_COST,
        })
    }

    pub fn deliver<K: KvWrite>(
        &self,
        ctx: &Context,
        db: &mut K,
        msg: &CancelOrderMsg,
    ) -> Result<DeliverResult> {
        let mut order = self.validate(ctx, db, msg)?;
        let now = ctx.block_time().map_err(|err| err.context("deliver cancel"))?;

        self.controller.cancel(db, &mut order, now)?;
        Ok(DeliverResult::default())
    }
}

/// Routes each command to its handler.
pub struct Router<A: Authenticator + Clone, M: CoinMover + Clone> {
    book_handler: OrderBookHandler<A>,
    order_handler: CreateOrderHandler<A, M>,
    cancel_handler: CancelOrderHandler<A, M>,
}

impl<A: Authenticator + Clone, M: CoinMover + Clone> Router<A, M> {
    pub fn new(auth: A, mover: M) -> Self {
        Self {
            book_handler: OrderBookHandler::new(auth.clone()),
            order_handler: CreateOrderHandler::new(auth.clone(), mover.clone()),
            cancel_handler: CancelOrderHandler::new(auth, mover),
        }
    }

    pub fn check<K: KvWrite>(
        &self,
        ctx: &Context,
        db: &mut K,
        msg: &OrderMsg,
    ) -> Result<CheckResult> {
        match msg {
            OrderMsg::CreateBook(msg) => self.book_handler.check(ctx, db, msg),
            OrderMsg::Create(msg) => self.order_handler.check(ctx, db, msg),
            OrderMsg::Cancel(msg) => self.cancel_handler.check(ctx, db, msg),
        }
    }

    pub fn deliver<K: KvWrite>(
        &self,
        ctx: &Context,
        db: &mut K,
        msg: &OrderMsg,
    ) -> Result<DeliverResult> {
        match msg {
            OrderMsg::CreateBook(msg) => self.book_handler.deliver(ctx, db, msg),
            OrderMsg::Create(msg) => self.order_handler.deliver(ctx, db, msg),
            OrderMsg::Cancel(msg) => self.cancel_handler.deliver(ctx, db, msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SignerAuth;
    use crate::migration::Metadata;
    use cash::Ledger;
    use store::kv::KvRead;
    use store::MemStore;
    use types::address::Condition;
    use types::amount::Amount;
    use types::coin::Coin;
    use types::ids::seq_id;
    use types::prelude::Address;
    use types::time::UnixTime;

    fn addr(tag: u8) -> Address {
        Condition::new("test", "signer", vec![tag]).address()
    }

    /// Store with the schema seeded and one market owned by `owner`.
    fn store_with_market(owner: Address) -> MemStore {
        let mut db = MemStore::new();
        migration::init_package(&mut db, PACKAGE_NAME).unwrap();
        let mut market = Market {
            id: Vec::new(),
            owner,
            name: "main_market".to_string(),
        };
        market_bucket().put(&mut db, &mut market).unwrap();
        db
    }

    fn ctx_for(signer: Address) -> Context {
        Context::new()
            .with_block_time(UnixTime::new(1_560_000_000))
            .with_signer(signer)
    }

    fn create_book_msg() -> CreateOrderBookMsg {
        CreateOrderBookMsg {
            metadata: Some(Metadata::new(1)),
            market_id: seq_id(1),
            ask_ticker: "BAR".to_string(),
            bid_ticker: "FOO".to_string(),
        }
    }

    #[test]
    fn test_create_order_book() {
        let owner = addr(1);
        let mut db = store_with_market(owner);
        let handler = OrderBookHandler::new(SignerAuth);
        let ctx = ctx_for(owner);

        let check = handler.check(&ctx, &mut db, &create_book_msg()).unwrap();
        assert_eq!(check.gas_allocated, 100);

        let res = handler.deliver(&ctx, &mut db, &create_book_msg()).unwrap();
        assert_eq!(res.data, seq_id(1));

        let book = order_book_bucket().one(&db, &res.data).unwrap();
        assert_eq!(book.ask_ticker, "BAR");
        assert_eq!(book.bid_ticker, "FOO");
        assert_eq!(book.total_ask_count, 0);
        assert_eq!(book.total_bid_count, 0);
    }

    #[test]
    fn test_create_order_book_requires_owner() {
        let owner = addr(1);
        let mut db = store_with_market(owner);
        let handler = OrderBookHandler::new(SignerAuth);

        // signed by someone who is not the market owner
        let ctx = ctx_for(addr(2));
        let before = db.clone();
        let err = handler.deliver(&ctx, &mut db, &create_book_msg()).unwrap_err();
        assert!(err.is(ErrorKind::Unauthorized));

        // nothing was written
        assert!(order_book_bucket().one(&db, &seq_id(1)).unwrap_err().is(ErrorKind::NotFound));
        assert_eq!(
            before.iterator(None, None).count(),
            db.iterator(None, None).count()
        );
    }

    #[test]
    fn test_create_order_book_unknown_market() {
        let mut db = MemStore::new();
        migration::init_package(&mut db, PACKAGE_NAME).unwrap();
        let handler = OrderBookHandler::new(SignerAuth);

        let err = handler
            .deliver(&ctx_for(addr(1)), &mut db, &create_book_msg())
            .unwrap_err();
        assert!(err.is(ErrorKind::NotFound));
    }

    #[test]
    fn test_create_order_book_duplicate_pair() {
        let owner = addr(1);
        let mut db = store_with_market(owner);
        let handler = OrderBookHandler::new(SignerAuth);
        let ctx = ctx_for(owner);

        handler.deliver(&ctx, &mut db, &create_book_msg()).unwrap();
        let err = handler.deliver(&ctx, &mut db, &create_book_msg()).unwrap_err();
        assert!(err.is(ErrorKind::Duplicate));

        // the same pair in another market is fine
        let mut market2 = Market {
            id: Vec::new(),
            owner,
            name: "second_market".to_string(),
        };
        market_bucket().put(&mut db, &mut market2).unwrap();
        let msg = CreateOrderBookMsg {
            market_id: market2.id.clone(),
            ..create_book_msg()
        };
        handler.deliver(&ctx, &mut db, &msg).unwrap();
    }

    #[test]
    fn test_create_order_book_missing_metadata() {
        let owner = addr(1);
        let mut db = store_with_market(owner);
        let handler = OrderBookHandler::new(SignerAuth);

        let msg = CreateOrderBookMsg {
            metadata: None,
            ..create_book_msg()
        };
        let err = handler.deliver(&ctx_for(owner), &mut db, &msg).unwrap_err();
        assert!(err.is(ErrorKind::Metadata));
    }

    /// Store with market, book, and a funded trader wallet.
    fn store_with_book(owner: Address, trader: Address, funds: Coin) -> (MemStore, Vec<u8>) {
        let mut db = store_with_market(owner);
        let handler = OrderBookHandler::new(SignerAuth);
        let res = handler
            .deliver(&ctx_for(owner), &mut db, &create_book_msg())
            .unwrap();
        Ledger::new().mint(&mut db, &trader, &funds).unwrap();
        (db, res.data)
    }

    fn create_order_msg(book_id: &[u8], offer: Coin, price: Amount) -> CreateOrderMsg {
        CreateOrderMsg {
            metadata: Some(Metadata::new(1)),
            order_book_id: book_id.to_vec(),
            trader: None,
            offer,
            price,
        }
    }

    #[test]
    fn test_create_order_escrows_offer() {
        let (owner, trader) = (addr(1), addr(2));
        let (mut db, book_id) = store_with_book(owner, trader, Coin::new(50, 0, "BAR"));
        let handler = CreateOrderHandler::new(SignerAuth, Ledger::new());
        let ctx = ctx_for(trader);

        let msg = create_order_msg(&book_id, Coin::new(50, 0, "BAR"), Amount::new(3, 0));
        let check = handler.check(&ctx, &mut db, &msg).unwrap();
        assert_eq!(check.gas_allocated, 10);

        let res = handler.deliver(&ctx, &mut db, &msg).unwrap();

        let order = order_bucket().one(&db, &res.data).unwrap();
        assert_eq!(order.side, Side::Ask);
        assert_eq!(order.order_state, OrderState::Open);
        assert_eq!(order.trader, trader);
        assert_eq!(order.created_at, UnixTime::new(1_560_000_000));

        // the full offer moved from the trader into escrow
        let ledger = Ledger::new();
        assert!(ledger.balance(&db, &trader).unwrap().is_empty());
        assert_eq!(
            ledger.balance(&db, &order.address()).unwrap(),
            vec![Coin::new(50, 0, "BAR")]
        );

        // ask side count bumped
        let book = order_book_bucket().one(&db, &book_id).unwrap();
        assert_eq!(book.total_ask_count, 1);
        assert_eq!(book.total_bid_count, 0);
    }

    #[test]
    fn test_create_order_derives_bid_side() {
        let (owner, trader) = (addr(1), addr(2));
        let (mut db, book_id) = store_with_book(owner, trader, Coin::new(30, 0, "FOO"));
        let handler = CreateOrderHandler::new(SignerAuth, Ledger::new());

        let msg = create_order_msg(&book_id, Coin::new(30, 0, "FOO"), Amount::new(2, 0));
        let res = handler.deliver(&ctx_for(trader), &mut db, &msg).unwrap();

        let order = order_bucket().one(&db, &res.data).unwrap();
        assert_eq!(order.side, Side::Bid);

        let book = order_book_bucket().one(&db, &book_id).unwrap();
        assert_eq!(book.total_bid_count, 1);
    }

    #[test]
    fn test_create_order_foreign_ticker() {
        let (owner, trader) = (addr(1), addr(2));
        let (mut db, book_id) = store_with_book(owner, trader, Coin::new(10, 0, "BAR"));
        let handler = CreateOrderHandler::new(SignerAuth, Ledger::new());

        let msg = create_order_msg(&book_id, Coin::new(10, 0, "XYZ"), Amount::new(1, 0));
        let err = handler.deliver(&ctx_for(trader), &mut db, &msg).unwrap_err();
        assert!(err.is(ErrorKind::Currency));
    }

    #[test]
    fn test_create_order_unfunded_trader() {
        let (owner, trader) = (addr(1), addr(2));
        let (mut db, book_id) = store_with_book(owner, trader, Coin::new(10, 0, "BAR"));
        let handler = CreateOrderHandler::new(SignerAuth, Ledger::new());

        let msg = create_order_msg(&book_id, Coin::new(20, 0, "BAR"), Amount::new(1, 0));
        let err = handler.deliver(&ctx_for(trader), &mut db, &msg).unwrap_err();
        assert!(err.is(ErrorKind::Amount));
    }

    #[test]
    fn test_create_order_trader_must_authorize() {
        let (owner, trader) = (addr(1), addr(2));
        let (mut db, book_id) = store_with_book(owner, trader, Coin::new(10, 0, "BAR"));
        let handler = CreateOrderHandler::new(SignerAuth, Ledger::new());

        let msg = CreateOrderMsg {
            trader: Some(addr(3)),
            ..create_order_msg(&book_id, Coin::new(10, 0, "BAR"), Amount::new(1, 0))
        };
        let err = handler.deliver(&ctx_for(trader), &mut db, &msg).unwrap_err();
        assert!(err.is(ErrorKind::Unauthorized));
    }

    #[test]
    fn test_create_order_requires_block_time() {
        let (owner, trader) = (addr(1), addr(2));
        let (mut db, book_id) = store_with_book(owner, trader, Coin::new(10, 0, "BAR"));
        let handler = CreateOrderHandler::new(SignerAuth, Ledger::new());

        let ctx = Context::new().with_signer(trader);
        let msg = create_order_msg(&book_id, Coin::new(10, 0, "BAR"), Amount::new(1, 0));
        let err = handler.deliver(&ctx, &mut db, &msg).unwrap_err();
        assert!(err.is(ErrorKind::State));
    }

    #[test]
    fn test_cancel_order() {
        let (owner, trader) = (addr(1), addr(2));
        let (mut db, book_id) = store_with_book(owner, trader, Coin::new(50, 0, "BAR"));
        let router = Router::new(SignerAuth, Ledger::new());
        let ctx = ctx_for(trader);

        let msg = OrderMsg::Create(create_order_msg(
            &book_id,
            Coin::new(50, 0, "BAR"),
            Amount::new(3, 0),
        ));
        let res = router.deliver(&ctx, &mut db, &msg).unwrap();

        let cancel = OrderMsg::Cancel(CancelOrderMsg {
            metadata: Some(Metadata::new(1)),
            order_id: res.data.clone(),
        });
        let check = router.check(&ctx, &mut db, &cancel).unwrap();
        assert_eq!(check.gas_allocated, 10);
        router.deliver(&ctx, &mut db, &cancel).unwrap();

        let order = order_bucket().one(&db, &res.data).unwrap();
        assert_eq!(order.order_state, OrderState::Cancel);
        assert!(order.remaining_offer.is_zero());

        // escrow refunded in full
        let ledger = Ledger::new();
        assert!(ledger.balance(&db, &order.address()).unwrap().is_empty());
        assert_eq!(
            ledger.balance(&db, &trader).unwrap(),
            vec![Coin::new(50, 0, "BAR")]
        );

        // cancelling again is a state error and leaves the store unchanged
        let before = db.clone();
        let err = router.deliver(&ctx, &mut db, &cancel).unwrap_err();
        assert!(err.is(ErrorKind::State));
        let after: Vec<_> = db.iterator(None, None).collect();
        let expected: Vec<_> = before.iterator(None, None).collect();
        assert_eq!(after, expected);
    }

    #[test]
    fn test_cancel_order_requires_trader() {
        let (owner, trader) = (addr(1), addr(2));
        let (mut db, book_id) = store_with_book(owner, trader, Coin::new(50, 0, "BAR"));
        let router = Router::new(SignerAuth, Ledger::new());

        let msg = OrderMsg::Create(create_order_msg(
            &book_id,
            Coin::new(50, 0, "BAR"),
            Amount::new(3, 0),
        ));
        let res = router.deliver(&ctx_for(trader), &mut db, &msg).unwrap();

        let cancel = OrderMsg::Cancel(CancelOrderMsg {
            metadata: Some(Metadata::new(1)),
            order_id: res.data,
        });
        let err = router
            .deliver(&ctx_for(addr(3)), &mut db, &cancel)
            .unwrap_err();
        assert!(err.is(ErrorKind::Unauthorized));
    }

    #[test]
    fn test_cancel_unknown_order() {
        let mut db = MemStore::new();
        migration::init_package(&mut db, PACKAGE_NAME).unwrap();
        let router = Router::new(SignerAuth, Ledger::new());

        let cancel = OrderMsg::Cancel(CancelOrderMsg {
            metadata: Some(Metadata::new(1)),
            order_id: seq_id(42),
        });
        let err = router.deliver(&ctx_for(addr(1)), &mut db, &cancel).unwrap_err();
        assert!(err.is(ErrorKind::NotFound));
    }

    #[test]
    fn test_query_registration() {
        let owner = addr(1);
        let mut db = store_with_market(owner);
        let handler = OrderBookHandler::new(SignerAuth);
        handler
            .deliver(&ctx_for(owner), &mut db, &create_book_msg())
            .unwrap();

        let mut router = QueryRouter::new();
        register_query(&mut router);
        assert!(router.paths().contains(&"markets"));
        assert!(router.paths().contains(&"orderbooks"));
        assert!(router.paths().contains(&"orders"));
        assert!(router.paths().contains(&"trades"));

        let hits = router.query(&db, "markets", &seq_id(1)).unwrap();
        assert_eq!(hits.len(), 1);

        let hits = router.query(&db, "orderbooks/market", &seq_id(1)).unwrap();
        assert_eq!(hits.len(), 1);
    }
}
