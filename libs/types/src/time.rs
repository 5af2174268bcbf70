//! Unix timestamps
//!
//! Seconds since epoch, signed. The block header supplies the only clock the
//! engine ever sees.

use crate::errors::{Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

// Bounds keep timestamps inside the representable calendar (year 1 to 9999).
const MIN_UNIX_TIME: i64 = -62_135_596_800;
const MAX_UNIX_TIME: i64 = 253_402_300_799;

/// A point in time as seconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UnixTime(pub i64);

impl UnixTime {
    pub fn new(secs: i64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    /// Zero means "never set".
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn validate(&self) -> Result<()> {
        if self.0 < MIN_UNIX_TIME || self.0 > MAX_UNIX_TIME {
            return Err(Error::new(ErrorKind::Input, "time outside calendar range"));
        }
        Ok(())
    }
}

impl fmt::Display for UnixTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
