//! Persisted monotone counters
//!
//! Each bucket owns a sequence that allocates its 8-byte big-endian primary
//! ids, starting at 1. The counter lives in its own sub-namespace so entity
//! scans never see it.

use crate::kv::KvWrite;
use types::errors::Result;

/// A named, persisted u64 counter.
#[derive(Debug, Clone)]
pub struct Sequence {
    key: Vec<u8>,
}

impl Sequence {
    pub fn new(bucket: &str, name: &str) -> Self {
        Self {
            key: format!("_s.{}:{}", bucket, name).into_bytes(),
        }
    }

    /// Increment the counter and return its new value as an 8-byte
    /// big-endian id.
    pub fn next_val(&self, db: &mut dyn KvWrite) -> Result<Vec<u8>> {
        let next = self.curr(db) + 1;
        db.set(self.key.clone(), next.to_be_bytes().to_vec());
        Ok(next.to_be_bytes().to_vec())
    }

    fn curr(&self, db: &dyn KvWrite) -> u64 {
        match db.get(&self.key) {
            Some(raw) if raw.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&raw);
                u64::from_be_bytes(buf)
            }
            _ => 0,
        }
    }
}
