//! Settlement and cancellation
//!
//! The controller walks open counter-orders in price priority and settles
//! greedily at the maker's price. Funds only ever move between escrow
//! addresses and trader addresses; any failure propagates up and the host
//! rolls the whole command back.

use crate::bucket::{open_order_scan_prefix, order_bucket, trade_bucket};
use crate::model::{Order, OrderState, Side, Trade};
use cash::CoinMover;
use store::kv::KvWrite;
use store::Bucket;
use tracing::debug;
use types::amount::Amount;
use types::coin::Coin;
use types::errors::Result;
use types::prelude::Address;
use types::time::UnixTime;

/// Drives matching against the persisted book state.
pub struct Controller<M: CoinMover> {
    orders: Bucket<Order>,
    trades: Bucket<Trade>,
    mover: M,
}

impl<M: CoinMover> Controller<M> {
    pub fn new(mover: M) -> Self {
        Self {
            orders: order_bucket(),
            trades: trade_bucket(),
            mover,
        }
    }

    /// Settle a freshly persisted taker order against the book.
    ///
    /// Asks scan bids from the highest price down; bids scan asks from the
    /// lowest price up. The scan stops at the first counter-order whose
    /// price the taker does not accept, or when the taker is out of offer.
    pub fn settle<K: KvWrite>(&self, db: &mut K, order: &mut Order, now: UnixTime) -> Result<()> {
        let (other, descending) = match order.side {
            Side::Ask => (Side::Bid, true),
            Side::Bid => (Side::Ask, false),
        };

        let prefix = open_order_scan_prefix(&order.order_book_id, other);
        let matches: Vec<Order> = self
            .orders
            .index_scan(&*db, "open", &prefix, descending)?
            .collect::<Result<_>>()?;

        for mut counter in matches {
            if !order.remaining_offer.is_positive() {
                break;
            }
            if !acceptable(order.side, &order.price, &counter.price) {
                break;
            }
            if !self.execute_trade(db, order, &mut counter, now)? {
                break;
            }
        }
        Ok(())
    }

    /// Execute one trade between a taker and an acceptable maker, settling
    /// at the maker's price. Returns false when nothing could settle (the
    /// bound side cannot buy a single fractional unit), which ends the scan
    /// since every further maker prices worse.
    fn execute_trade<K: KvWrite>(
        &self,
        db: &mut K,
        taker: &mut Order,
        maker: &mut Order,
        now: UnixTime,
    ) -> Result<bool> {
        let maker_price = maker.price;
        let maker_id = maker.id.clone();
        let taker_id = taker.id.clone();
        let maker_trader = maker.trader;
        let taker_trader = taker.trader;
        let order_book_id = taker.order_book_id.clone();
        let taker_is_bid = taker.side == Side::Bid;

        let (ask, bid) = if taker_is_bid {
            (&mut *maker, &mut *taker)
        } else {
            (&mut *taker, &mut *maker)
        };

        let (ask_val, bid_val) = amounts_to_settle(ask, bid, &maker_price)?;
        if !ask_val.is_positive() {
            return Ok(false);
        }

        let (taker_paid, maker_paid) = if taker_is_bid {
            (bid_val.clone(), ask_val.clone())
        } else {
            (ask_val.clone(), bid_val.clone())
        };

        let mut trade = Trade {
            id: Vec::new(),
            order_book_id,
            maker_id,
            taker_id,
            maker: maker_trader,
            taker: taker_trader,
            maker_paid,
            taker_paid,
            executed_at: now,
        };
        self.trades.put(db, &mut trade)?;
        debug!(
            trade = ?trade.id,
            ask = %ask_val,
            bid = %bid_val,
            "executed trade"
        );

        let ask_recipient = bid.trader;
        let bid_recipient = ask.trader;
        self.payout(db, ask, &ask_recipient, &ask_val, now)?;
        self.payout(db, bid, &bid_recipient, &bid_val, now)?;
        Ok(true)
    }

    /// Pay one leg of a trade out of the order's escrow and update the
    /// order's bookkeeping, closing it out when only dust remains.
    fn payout<K: KvWrite>(
        &self,
        db: &mut K,
        from: &mut Order,
        to: &Address,
        value: &Coin,
        now: UnixTime,
    ) -> Result<()> {
        self.mover.move_coins(db, &from.address(), to, value)?;
        from.remaining_offer = from.remaining_offer.subtract(value)?;
        from.updated_at = now;

        // An offer below one whole unit cannot take part in any further
        // match priced at one or above: return the residue instead of
        // leaving it dangling in escrow.
        if from.remaining_offer.whole < 1 {
            if from.remaining_offer.is_positive() {
                self.mover
                    .move_coins(db, &from.address(), &from.trader, &from.remaining_offer)?;
            }
            from.remaining_offer = from.remaining_offer.zeroed();
            from.order_state = OrderState::Done;
        }
        self.orders.put(db, from)?;
        Ok(())
    }

    /// Return an open order's escrowed funds and close it as cancelled.
    pub fn cancel<K: KvWrite>(&self, db: &mut K, order: &mut Order, now: UnixTime) -> Result<()> {
        self.mover
            .move_coins(db, &order.address(), &order.trader, &order.remaining_offer)?;
        order.remaining_offer = order.remaining_offer.zeroed();
        order.order_state = OrderState::Cancel;
        order.updated_at = now;
        self.orders.put(db, order)?;
        debug!(order = ?order.id, "cancelled order");
        Ok(())
    }
}

/// Is the counter-order's price acceptable to the taker? Asks take any bid
/// at or above their price, bids take any ask at or below theirs.
fn acceptable(taker_side: Side, ours: &Amount, theirs: &Amount) -> bool {
    match taker_side {
        Side::Ask => ours <= theirs,
        Side::Bid => theirs <= ours,
    }
}

/// Settled amounts for one trade at the maker's price.
///
/// The ask side's remaining offer binds unless the bid side cannot cover
/// it; then the ask value is recomputed from what the bid can pay, and the
/// bid value from that, so the bid never overpays for the truncated ask.
fn amounts_to_settle(ask: &Order, bid: &Order, price: &Amount) -> Result<(Coin, Coin)> {
    let mut ask_val = ask.remaining_offer.clone();
    let mut bid_val = price.multiply(&ask_val)?;

    if bid.remaining_offer.compare(&bid_val)? == std::cmp::Ordering::Less {
        let quotient = price.divide(&bid.remaining_offer)?;
        ask_val = Coin::new(
            quotient.whole,
            quotient.fractional,
            &ask.remaining_offer.ticker,
        );
        bid_val = price.multiply(&ask_val)?;
    }
    Ok((ask_val, bid_val))
}
