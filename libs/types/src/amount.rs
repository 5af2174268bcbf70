//! Fixed-point decimal amounts with a sortable binary encoding
//!
//! An `Amount` is two signed 64-bit fields: whole units and fractional units
//! of 1e-9. All arithmetic is exact integer math over i128 intermediates,
//! never floating point. Non-negative amounts encode to 16 big-endian bytes
//! whose unsigned byte order reproduces numeric order, which is what lets a
//! key-value range scan walk prices in order.

use crate::coin::Coin;
use crate::errors::{Error, ErrorKind, FieldErrors, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of fractional units in one whole unit (one unit = 1e-9).
pub const FRAC_UNIT: i64 = 1_000_000_000;

/// Largest storable whole value.
pub const MAX_WHOLE: i64 = 999_999_999_999_999;

/// Smallest storable whole value.
pub const MIN_WHOLE: i64 = -MAX_WHOLE;

/// Fixed-point decimal value.
///
/// Stored values are kept normalized: `|fractional| < FRAC_UNIT` and the
/// signs of both fields match. The derived ordering is numeric order under
/// that invariant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Amount {
    pub whole: i64,
    pub fractional: i64,
}

impl Amount {
    pub const ZERO: Amount = Amount {
        whole: 0,
        fractional: 0,
    };

    pub fn new(whole: i64, fractional: i64) -> Self {
        Self { whole, fractional }
    }

    /// Check component ranges and the sign-match rule.
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
        errs.finish()
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

    /// Encode as 16 big-endian bytes: `whole || fractional`.
    ///
    /// Only defined for non-negative values; two's-complement big-endian
    /// reverses order across zero, so negatives are rejected.
    pub fn lexicographic(&self) -> Result<[u8; 16]> {
        if self.is_negative() {
            return Err(Error::new(
                ErrorKind::Amount,
                "lexicographic order undefined for negative amounts",
            ));
        }
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.whole.to_be_bytes());
        out[8..].copy_from_slice(&self.fractional.to_be_bytes());
        Ok(out)
    }

    /// Multiply a coin by this amount, preserving the ticker.
    ///
    /// The sub-1e-9 residue of the fractional cross term is truncated toward
    /// zero; fractional carries roll into whole units.
    pub fn multiply(&self, c: &Coin) -> Result<Coin> {
        let negative = self.is_negative() != c.is_negative();
        let frac = FRAC_UNIT as i128;

        let aw = (self.whole as i128).abs();
        let af = (self.fractional as i128).abs();
        let cw = (c.whole as i128).abs();
        let cf = (c.fractional as i128).abs();

        let mut whole = aw * cw;
        let mut fractional = aw * cf + af * cw + (af * cf) / frac;
        whole += fractional / frac;
        fractional %= frac;

        if whole > MAX_WHOLE as i128 {
            return Err(Error::overflow("coin multiplication out of range"));
        }
        let (w, f) = if negative {
            (-(whole as i64), -(fractional as i64))
        } else {
            (whole as i64, fractional as i64)
        };
        Ok(Coin::new(w, f, &c.ticker))
    }

    /// Divide a coin by this amount, preserving the ticker.
    ///
    /// Inverse of `multiply`, used when the bid side is the binding
    /// constraint of a trade: both operands are taken to integral 1e-9
    /// units and the quotient truncates toward zero. The caller decides what
    /// happens to the residue.
    pub fn divide(&self, c: &Coin) -> Result<Coin> {
        if self.is_zero() {
            return Err(Error::new(ErrorKind::Amount, "division by zero amount"));
        }
        let negative = self.is_negative() != c.is_negative();
        let frac = FRAC_UNIT as i128;

        let price = (self.whole as i128).abs() * frac + (self.fractional as i128).abs();
        let value = (c.whole as i128).abs() * frac + (c.fractional as i128).abs();

        let units = value * frac / price;
        let whole = units / frac;
        let fractional = units % frac;

        if whole > MAX_WHOLE as i128 {
            return Err(Error::overflow("coin division out of range"));
        }
        let (w, f) = if negative {
            (-(whole as i64), -(fractional as i64))
        } else {
            (whole as i64, fractional as i64)
        };
        Ok(Coin::new(w, f, &c.ticker))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "-{}.{:09}", self.whole.abs(), self.fractional.abs())
        } else {
            write!(f, "{}.{:09}", self.whole, self.fractional)
        }
    }
}
