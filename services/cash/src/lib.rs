//! Fund custody ledger
//!
//! Holds one wallet per address in the key-value store and moves coins
//! between them atomically from the caller's point of view: a failed move
//! touches neither wallet. The engine uses it to fund and drain per-order
//! escrow addresses; tests and bootstrap additionally mint.

use store::index::{deserialize, serialize};
use store::kv::{KvRead, KvWrite};
use tracing::trace;
use types::coin::Coin;
use types::errors::{Error, ErrorKind, Result};
use types::prelude::Address;

/// Moves funds between addresses.
pub trait CoinMover {
    /// Transfer `amount` from one wallet to another. Fails without mutating
    /// anything when the source cannot cover it.
    fn move_coins(
        &self,
        db: &mut dyn KvWrite,
        from: &Address,
        to: &Address,
        amount: &Coin,
    ) -> Result<()>;

    /// All holdings of an address, sorted by ticker. Empty wallets yield an
    /// empty list.
    fn balance(&self, db: &dyn KvRead, addr: &Address) -> Result<Vec<Coin>>;

    /// Create coins out of thin air. Test and bootstrap use only.
    fn mint(&self, db: &mut dyn KvWrite, addr: &Address, amount: &Coin) -> Result<()>;
}

/// Key-value backed `CoinMover`.
#[derive(Debug, Default, Clone)]
pub struct Ledger;

impl Ledger {
    pub fn new() -> Self {
        Self
    }

    fn wallet_key(addr: &Address) -> Vec<u8> {
        let mut key = b"cash:".to_vec();
        key.extend_from_slice(addr.as_bytes());
        key
    }

    fn load_wallet(db: &dyn KvRead, addr: &Address) -> Result<Vec<Coin>> {
        match db.get(&Self::wallet_key(addr)) {
            Some(raw) => deserialize(&raw),
            None => Ok(Vec::new()),
        }
    }

    fn store_wallet(db: &mut dyn KvWrite, addr: &Address, mut coins: Vec<Coin>) -> Result<()> {
        coins.retain(|c| !c.is_zero());
        coins.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        let key = Self::wallet_key(addr);
        if coins.is_empty() {
            db.delete(&key);
        } else {
            let raw = serialize(&coins)?;
            db.set(key, raw);
        }
        Ok(())
    }

    /// Add `amount` to the wallet coin of the matching ticker.
    fn credit(wallet: &mut Vec<Coin>, amount: &Coin) -> Result<()> {
        match wallet.iter_mut().find(|c| c.ticker == amount.ticker) {
            Some(held) => *held = held.add(amount)?,
            None => wallet.push(amount.clone()),
        }
        Ok(())
    }

    /// Remove `amount` from the wallet coin of the matching ticker.
    fn debit(wallet: &mut Vec<Coin>, amount: &Coin) -> Result<()> {
        let held = wallet
            .iter_mut()
            .find(|c| c.ticker == amount.ticker)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::Amount,
                    format!("insufficient funds: no {} held", amount.ticker),
                )
            })?;
        let rest = held.subtract(amount)?;
        if rest.is_negative() {
            return Err(Error::new(
                ErrorKind::Amount,
                format!("insufficient funds: {} short", amount.ticker),
            ));
        }
        *held = rest;
        Ok(())
    }
}

impl CoinMover for Ledger {
    fn move_coins(
        &self,
        db: &mut dyn KvWrite,
        from: &Address,
        to: &Address,
        amount: &Coin,
    ) -> Result<()> {
        amount.validate()?;
        if amount.is_negative() {
            return Err(Error::new(ErrorKind::Amount, "cannot move a negative coin"));
        }
        if amount.is_zero() {
            return Ok(());
        }
        // a self-move would load the wallet twice and persist only the
        // credited copy, minting the moved amount
        if from == to {
            let mut wallet = Self::load_wallet(db, from)?;
            Self::debit(&mut wallet, amount)?;
            return Ok(());
        }

        let mut source = Self::load_wallet(db, from)?;
        Self::debit(&mut source, amount)?;

        let mut target = Self::load_wallet(db, to)?;
        Self::credit(&mut target, amount)?;

        Self::store_wallet(db, from, source)?;
        Self::store_wallet(db, to, target)?;
        trace!(%from, %to, %amount, "moved coins");
        Ok(())
    }

    fn balance(&self, db: &dyn KvRead, addr: &Address) -> Result<Vec<Coin>> {
        Self::load_wallet(db, addr)
    }

    fn mint(&self, db: &mut dyn KvWrite, addr: &Address, amount: &Coin) -> Result<()> {
        amount.validate()?;
        if !amount.is_positive() {
            return Err(Error::new(ErrorKind::Amount, "can only mint positive coins"));
        }
        let mut wallet = Self::load_wallet(db, addr)?;
        Self::credit(&mut wallet, amount)?;
        Self::store_wallet(db, addr, wallet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::kv::MemStore;
    use types::address::Condition;

    fn addr(tag: u8) -> Address {
        Condition::new("test", "wallet", vec![tag]).address()
    }

    #[test]
    fn test_mint_and_balance() {
        let mut db = MemStore::new();
        let ledger = Ledger::new();
        let alice = addr(1);

        ledger.mint(&mut db, &alice, &Coin::new(5, 0, "ETH")).unwrap();
        ledger.mint(&mut db, &alice, &Coin::new(2, 500, "ETH")).unwrap();
        ledger.mint(&mut db, &alice, &Coin::new(1, 0, "BTC")).unwrap();

        let wallet = ledger.balance(&db, &alice).unwrap();
        assert_eq!(
            wallet,
            vec![Coin::new(1, 0, "BTC"), Coin::new(7, 500, "ETH")]
        );
    }

    #[test]
    fn test_mint_rejects_non_positive() {
        let mut db = MemStore::new();
        let ledger = Ledger::new();
        let err = ledger.mint(&mut db, &addr(1), &Coin::new(0, 0, "ETH")).unwrap_err();
        assert!(err.is(ErrorKind::Amount));
    }

    #[test]
    fn test_move_coins() {
        let mut db = MemStore::new();
        let ledger = Ledger::new();
        let (alice, bob) = (addr(1), addr(2));

        ledger.mint(&mut db, &alice, &Coin::new(10, 0, "ETH")).unwrap();
        ledger
            .move_coins(&mut db, &alice, &bob, &Coin::new(4, 0, "ETH"))
            .unwrap();

        assert_eq!(ledger.balance(&db, &alice).unwrap(), vec![Coin::new(6, 0, "ETH")]);
        assert_eq!(ledger.balance(&db, &bob).unwrap(), vec![Coin::new(4, 0, "ETH")]);
    }

    #[test]
    fn test_move_entire_balance_empties_wallet() {
        let mut db = MemStore::new();
        let ledger = Ledger::new();
        let (alice, bob) = (addr(1), addr(2));

        ledger.mint(&mut db, &alice, &Coin::new(10, 0, "ETH")).unwrap();
        ledger
            .move_coins(&mut db, &alice, &bob, &Coin::new(10, 0, "ETH"))
            .unwrap();

        assert!(ledger.balance(&db, &alice).unwrap().is_empty());
    }

    #[test]
    fn test_move_insufficient_funds() {
        let mut db = MemStore::new();
        let ledger = Ledger::new();
        let (alice, bob) = (addr(1), addr(2));

        ledger.mint(&mut db, &alice, &Coin::new(1, 0, "ETH")).unwrap();

        let err = ledger
            .move_coins(&mut db, &alice, &bob, &Coin::new(2, 0, "ETH"))
            .unwrap_err();
        assert!(err.is(ErrorKind::Amount));

        // a failed move touches neither wallet
        assert_eq!(ledger.balance(&db, &alice).unwrap(), vec![Coin::new(1, 0, "ETH")]);
        assert!(ledger.balance(&db, &bob).unwrap().is_empty());

        let err = ledger
            .move_coins(&mut db, &alice, &bob, &Coin::new(1, 0, "BTC"))
            .unwrap_err();
        assert!(err.is(ErrorKind::Amount));
    }

    #[test]
    fn test_move_to_self_is_noop() {
        let mut db = MemStore::new();
        let ledger = Ledger::new();
        let alice = addr(1);

        ledger.mint(&mut db, &alice, &Coin::new(10, 0, "ETH")).unwrap();
        ledger
            .move_coins(&mut db, &alice, &alice, &Coin::new(4, 0, "ETH"))
            .unwrap();
        assert_eq!(ledger.balance(&db, &alice).unwrap(), vec![Coin::new(10, 0, "ETH")]);

        // still needs the funds to cover it
        let err = ledger
            .move_coins(&mut db, &alice, &alice, &Coin::new(20, 0, "ETH"))
            .unwrap_err();
        assert!(err.is(ErrorKind::Amount));
        assert_eq!(ledger.balance(&db, &alice).unwrap(), vec![Coin::new(10, 0, "ETH")]);
    }

    #[test]
    fn test_move_zero_is_noop() {
        let mut db = MemStore::new();
        let ledger = Ledger::new();
        let (alice, bob) = (addr(1), addr(2));

        ledger
            .move_coins(&mut db, &alice, &bob, &Coin::new(0, 0, "ETH"))
            .unwrap();
        assert!(ledger.balance(&db, &alice).unwrap().is_empty());
        assert!(ledger.balance(&db, &bob).unwrap().is_empty());
    }

    #[test]
    fn test_conservation_across_moves() {
        let mut db = MemStore::new();
        let ledger = Ledger::new();
        let (alice, bob, carol) = (addr(1), addr(2), addr(3));

        ledger.mint(&mut db, &alice, &Coin::new(100, 0, "ETH")).unwrap();
        ledger
            .move_coins(&mut db, &alice, &bob, &Coin::new(33, 300_000_000, "ETH"))
            .unwrap();
        ledger
            .move_coins(&mut db, &bob, &carol, &Coin::new(3, 300_000_000, "ETH"))
            .unwrap();

        let mut total = Coin::new(0, 0, "ETH");
        for who in [&alice, &bob, &carol] {
            for coin in ledger.balance(&db, who).unwrap() {
                total = total.add(&coin).unwrap();
            }
        }
        assert_eq!(total, Coin::new(100, 0, "ETH"));
    }
}
