//! Secondary index descriptors and the stored-reference codec
//!
//! An index is a pure function from entity to key bytes. Returning no key
//! elides the entry, which is how conditional indices (only index open
//! orders) are modeled; returning several keys indexes one entity under each
//! of them. Unique indices store the referenced primary key directly;
//! non-unique indices store an append-ordered list of primary keys.

use serde::de::DeserializeOwned;
use serde::Serialize;
use types::errors::{Error, ErrorKind, Result};

/// Pure indexer: entity to zero or more index keys.
pub type Indexer<M> = Box<dyn Fn(&M) -> Result<Vec<Vec<u8>>>>;

/// Configuration of one secondary index.
pub struct Index<M> {
    pub name: &'static str,
    pub unique: bool,
    indexer: Indexer<M>,
}

impl<M> Index<M> {
    pub fn new(name: &'static str, indexer: Indexer<M>, unique: bool) -> Self {
        Self {
            name,
            unique,
            indexer,
        }
    }

    /// Compute the index keys for `m`.
    pub fn keys(&self, m: &M) -> Result<Vec<Vec<u8>>> {
        (self.indexer)(m)
    }
}

/// Wrap a single-key indexer; `None` elides the entry.
pub fn single_key<M, F>(f: F) -> Indexer<M>
where
    F: Fn(&M) -> Result<Option<Vec<u8>>> + 'static,
{
    Box::new(move |m| Ok(f(m)?.into_iter().collect()))
}

/// Wrap a multi-key indexer.
pub fn multi_key<M, F>(f: F) -> Indexer<M>
where
    F: Fn(&M) -> Result<Vec<Vec<u8>>> + 'static,
{
    Box::new(f)
}

/// Decode the primary keys referenced by a stored index value.
pub fn decode_refs(unique: bool, raw: &[u8]) -> Result<Vec<Vec<u8>>> {
    if unique {
        return Ok(vec![raw.to_vec()]);
    }
    decode_ref_list(raw)
}

fn decode_ref_list(raw: &[u8]) -> Result<Vec<Vec<u8>>> {
    deserialize(raw)
}

fn encode_ref_list(refs: &[Vec<u8>]) -> Result<Vec<u8>> {
    serialize(&refs)
}

/// Append `id` to a non-unique index value, preserving insertion order.
pub fn add_ref(existing: Option<Vec<u8>>, id: &[u8]) -> Result<Vec<u8>> {
    let mut refs = match existing {
        Some(raw) => decode_ref_list(&raw)?,
        None => Vec::new(),
    };
    if !refs.iter().any(|r| r == id) {
        refs.push(id.to_vec());
    }
    encode_ref_list(&refs)
}

/// Remove `id` from a non-unique index value. Returns `None` when the entry
/// becomes empty and should be deleted.
pub fn remove_ref(existing: Option<Vec<u8>>, id: &[u8]) -> Result<Option<Vec<u8>>> {
    let mut refs = match existing {
        Some(raw) => decode_ref_list(&raw)?,
        None => return Ok(None),
    };
    refs.retain(|r| r != id);
    if refs.is_empty() {
        return Ok(None);
    }
    encode_ref_list(&refs).map(Some)
}

/// Serialize a value for storage.
pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value)
        .map_err(|err| Error::new(ErrorKind::Database, format!("serialize: {}", err)))
}

/// Deserialize a stored value.
pub fn deserialize<T: DeserializeOwned>(raw: &[u8]) -> Result<T> {
    bincode::deserialize(raw)
        .map_err(|err| Error::new(ErrorKind::TypeMismatch, format!("deserialize: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_ref_preserves_order() {
        let raw = add_ref(None, b"11111111").unwrap();
        let raw = add_ref(Some(raw), b"22222222").unwrap();
        let raw = add_ref(Some(raw), b"33333333").unwrap();

        let refs = decode_refs(false, &raw).unwrap();
        assert_eq!(
            refs,
            vec![
                b"11111111".to_vec(),
                b"22222222".to_vec(),
                b"33333333".to_vec()
            ]
        );
    }

    #[test]
    fn test_add_ref_is_idempotent() {
        let raw = add_ref(None, b"11111111").unwrap();
        let raw = add_ref(Some(raw), b"11111111").unwrap();
        assert_eq!(decode_refs(false, &raw).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_ref() {
        let raw = add_ref(None, b"11111111").unwrap();
        let raw = add_ref(Some(raw), b"22222222").unwrap();

        let raw = remove_ref(Some(raw), b"11111111").unwrap().unwrap();
        assert_eq!(decode_refs(false, &raw).unwrap(), vec![b"22222222".to_vec()]);

        assert!(remove_ref(Some(raw), b"22222222").unwrap().is_none());
        assert!(remove_ref(None, b"22222222").unwrap().is_none());
    }

    #[test]
    fn test_unique_refs_are_direct() {
        let refs = decode_refs(true, b"12345678").unwrap();
        assert_eq!(refs, vec![b"12345678".to_vec()]);
    }
}
