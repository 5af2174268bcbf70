//! Currency amounts bound to a ticker
//!
//! A `Coin` is an `Amount`-shaped value plus an ASCII currency symbol.
//! Arithmetic preserves the ticker and fails across tickers.

use crate::amount::{FRAC_UNIT, MAX_WHOLE, MIN_WHOLE};
use crate::errors::{Error, ErrorKind, FieldErrors, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Check a currency symbol: 3-5 uppercase ASCII characters, a digit allowed
/// only in the final position of a 4- or 5-character symbol.
pub fn is_currency_code(ticker: &str) -> bool {
    let bytes = ticker.as_bytes();
    if bytes.len() < 3 || bytes.len() > 5 {
        return false;
    }
    bytes.iter().enumerate().all(|(i, c)| {
        c.is_ascii_uppercase() || (c.is_ascii_digit() && bytes.len() >= 4 && i + 1 == bytes.len())
    })
}

/// A monetary value in one currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Coin {
    pub whole: i64,
    pub fractional: i64,
    pub ticker: String,
}

impl Coin {
    pub fn new(whole: i64, fractional: i64, ticker: impl Into<String>) -> Self {
        Self {
            whole,
            fractional,
            ticker: ticker.into(),
        }
    }

    /// A zero-magnitude coin of the same ticker.
    pub fn zeroed(&self) -> Self {
        Coin::new(0, 0, &self.ticker)
    }

    pub fn is_zero(&self) -> bool {
        self.whole == 0 && self.fractional == 0
    }

    pub fn is_positive(&self) -> bool {
        self.whole > 0 || (self.whole == 0 && self.fractional > 0)
    }

    pub fn is_negative(&self) -> bool {
        self.whole < 0 || (self.whole == 0 && self.fractional < 0)
    }

    /// Check component ranges, the sign-match rule, and the ticker grammar.
    pub fn validate(&self) -> Result<()> {
        let mut errs = FieldErrors::new();
        if self.whole < MIN_WHOLE || self.whole > MAX_WHOLE {
            errs.push("Whole", ErrorKind::Overflow, "whole out of range");
        }
        if self.fractional <= -FRAC_UNIT || self.fractional >= FRAC_UNIT {
            errs.push("Fractional", ErrorKind::Overflow, "fractional out of range");
        }
        if (self.whole > 0 && self.fractional < 0) || (self.whole < 0 && self.fractional > 0) {
            errs.push("Fractional", ErrorKind::Amount, "mismatched sign");
        }
        if !is_currency_code(&self.ticker) {
            errs.push(
                "Ticker",
                ErrorKind::Currency,
                format!("invalid currency: {}", self.ticker),
            );
        }
        errs.finish()
    }

    fn same_ticker(&self, other: &Coin) -> Result<()> {
        if self.ticker != other.ticker {
            return Err(Error::new(
                ErrorKind::Currency,
                format!("cannot combine {} with {}", self.ticker, other.ticker),
            ));
        }
        Ok(())
    }

    pub fn add(&self, other: &Coin) -> Result<Coin> {
        self.same_ticker(other)?;
        let (whole, fractional) = normalize(
            self.whole as i128 + other.whole as i128,
            self.fractional as i128 + other.fractional as i128,
        )?;
        Ok(Coin::new(whole, fractional, &self.ticker))
    }

    pub fn subtract(&self, other: &Coin) -> Result<Coin> {
        self.same_ticker(other)?;
        let (whole, fractional) = normalize(
            self.whole as i128 - other.whole as i128,
            self.fractional as i128 - other.fractional as i128,
        )?;
        Ok(Coin::new(whole, fractional, &self.ticker))
    }

    /// Numeric comparison; both coins must carry the same ticker.
    pub fn compare(&self, other: &Coin) -> Result<Ordering> {
        self.same_ticker(other)?;
        Ok((self.whole, self.fractional).cmp(&(other.whole, other.fractional)))
    }
}

/// Carry fractional overflow into whole units and align the field signs.
fn normalize(mut whole: i128, mut fractional: i128) -> Result<(i64, i64)> {
    let frac = FRAC_UNIT as i128;
    whole += fractional / frac;
    fractional %= frac;
    if whole > 0 && fractional < 0 {
        whole -= 1;
        fractional += frac;
    } else if whole < 0 && fractional > 0 {
        whole += 1;
        fractional -= frac;
    }
    if whole > MAX_WHOLE as i128 || whole < MIN_WHOLE as i128 {
        return Err(Error::overflow("coin value out of range"));
    }
    Ok((whole as i64, fractional as i64))
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(
                f,
                "-{}.{:09} {}",
                self.whole.abs(),
                self.fractional.abs(),
                self.ticker
            )
        } else {
            write!(f, "{}.{:09} {}", self.whole, self.fractional, self.ticker)
        }
    }
}
