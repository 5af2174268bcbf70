//! 8-byte big-endian sequence identifiers
//!
//! Every persisted entity is keyed by an 8-byte big-endian sequence number
//! allocated by its bucket. On models the id travels as raw bytes; an empty
//! id means "not yet persisted".

use crate::errors::{Error, ErrorKind, Result};

/// Byte length of a generated id.
pub const ID_LENGTH: usize = 8;

/// Check that `id` is exactly 8 bytes. With `allow_empty`, an empty id is
/// accepted (an entity that has not been assigned a key yet).
pub fn validate_id(id: &[u8], allow_empty: bool) -> Result<()> {
    if id.is_empty() {
        if allow_empty {
            return Ok(());
        }
        return Err(Error::new(ErrorKind::Empty, "missing id"));
    }
    if id.len() != ID_LENGTH {
        return Err(Error::new(ErrorKind::Input, "id must be 8 bytes"));
    }
    Ok(())
}

/// Encode a sequence number as an 8-byte big-endian id.
pub fn seq_id(n: u64) -> Vec<u8> {
    n.to_be_bytes().to_vec()
}
