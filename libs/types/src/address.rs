//! Opaque addresses and derived conditions
//!
//! An `Address` is a fixed-length opaque value. A `Condition` is a
//! structured `(extension, kind, data)` triple whose SHA-256 digest yields a
//! deterministic address; the engine uses it to give every order its own
//! escrow address without storing one.

use crate::errors::{Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Byte length of every address.
pub const ADDRESS_LENGTH: usize = 20;

/// Fixed-length opaque address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    pub fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ADDRESS_LENGTH {
            return Err(Error::new(
                ErrorKind::Input,
                format!("address must be {} bytes", ADDRESS_LENGTH),
            ));
        }
        let mut out = [0u8; ADDRESS_LENGTH];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

/// Structured condition deriving an address from `(extension, kind, data)`.
///
/// The derivation is a pure function: the same triple always yields the same
/// address, so derived addresses never need to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    extension: String,
    kind: String,
    data: Vec<u8>,
}

impl Condition {
    pub fn new(extension: impl Into<String>, kind: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            extension: extension.into(),
            kind: kind.into(),
            data,
        }
    }

    /// Derive the address: first 20 bytes of SHA-256 over
    /// `extension/kind/data`.
    pub fn address(&self) -> Address {
        let mut hasher = Sha256::new();
        hasher.update(self.extension.as_bytes());
        hasher.update(b"/");
        hasher.update(self.kind.as_bytes());
        hasher.update(b"/");
        hasher.update(&self.data);
        let digest = hasher.finalize();

        let mut out = [0u8; ADDRESS_LENGTH];
        out.copy_from_slice(&digest[..ADDRESS_LENGTH]);
        Address(out)
    }
}
