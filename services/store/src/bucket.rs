//! Typed buckets over the raw key-value store
//!
//! A `Bucket<M>` owns three sub-namespaces: the entity store under
//! `<name>:`, one index store per secondary index under `_i.<name>_<index>:`,
//! and an id sequence under `_s.<name>:`. The model type is fixed at
//! construction, so a bucket can never hand back the wrong entity type.
//!
//! The primary id is the entity key, not part of the stored value: `put`
//! strips it before serializing and every read path restores it from the key.

use crate::index::{self, Index};
use crate::kv::{prefix_range, KvPair, KvRead, KvWrite};
use crate::query::QueryRouter;
use crate::sequence::Sequence;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::VecDeque;
use std::marker::PhantomData;
use tracing::trace;
use types::errors::{Error, ErrorKind, Result};

/// Implemented by any entity that can be stored in a `Bucket`.
///
/// The id is the bucket-local primary key; it is empty until `put` assigns
/// one from the bucket sequence.
pub trait Model: Serialize + DeserializeOwned + Clone {
    fn id(&self) -> &[u8];
    fn set_id(&mut self, id: Vec<u8>);
    fn validate(&self) -> Result<()>;
}

/// Model-oriented view over the key-value store: primary storage, secondary
/// indices, and id allocation.
pub struct Bucket<M: Model> {
    name: &'static str,
    indexes: Vec<Index<M>>,
    seq: Sequence,
    _model: PhantomData<M>,
}

impl<M: Model> Bucket<M> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            indexes: Vec::new(),
            seq: Sequence::new(name, "id"),
            _model: PhantomData,
        }
    }

    /// Add a single-key index. The indexer returning `None` elides the
    /// entry, which keeps e.g. closed orders out of the scan entirely.
    pub fn with_index<F>(mut self, name: &'static str, indexer: F, unique: bool) -> Self
    where
        F: Fn(&M) -> Result<Option<Vec<u8>>> + 'static,
    {
        self.indexes
            .push(Index::new(name, index::single_key(indexer), unique));
        self
    }

    /// Add a multi-key index: one entity stored under several keys.
    pub fn with_multi_key_index<F>(mut self, name: &'static str, indexer: F, unique: bool) -> Self
    where
        F: Fn(&M) -> Result<Vec<Vec<u8>>> + 'static,
    {
        self.indexes
            .push(Index::new(name, index::multi_key(indexer), unique));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn db_key(&self, id: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.name.len() + 1 + id.len());
        key.extend_from_slice(self.name.as_bytes());
        key.push(b':');
        key.extend_from_slice(id);
        key
    }

    fn index_db_key(&self, index: &str, key: &[u8]) -> Vec<u8> {
        let mut out = format!("_i.{}_{}:", self.name, index).into_bytes();
        out.extend_from_slice(key);
        out
    }

    fn find_index(&self, name: &str) -> Result<&Index<M>> {
        self.indexes
            .iter()
            .find(|idx| idx.name == name)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::Input,
                    format!("bucket {} has no index {}", self.name, name),
                )
            })
    }

    /// Load the entity stored under the primary key.
    pub fn one(&self, db: &dyn KvRead, key: &[u8]) -> Result<M> {
        let raw = db
            .get(&self.db_key(key))
            .ok_or_else(|| Error::not_found(format!("{} not in the store", self.name)))?;
        let mut m: M = index::deserialize(&raw)?;
        m.set_id(key.to_vec());
        Ok(m)
    }

    /// Existence check that never reads the value.
    pub fn has(&self, db: &dyn KvRead, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::not_found("empty key"));
        }
        if !db.has(&self.db_key(key)) {
            return Err(Error::not_found(format!("{} not in the store", self.name)));
        }
        Ok(())
    }

    /// Validate and persist the model, allocating a sequence id when none is
    /// set. Secondary indices are moved idempotently; a unique violation
    /// fails with `Duplicate` before the primary write.
    pub fn put(&self, db: &mut dyn KvWrite, m: &mut M) -> Result<()> {
        m.validate()?;

        let id = if m.id().is_empty() {
            let id = self.seq.next_val(db)?;
            trace!(bucket = self.name, id = ?id, "allocated id");
            id
        } else {
            m.id().to_vec()
        };

        // previous version, if any, so stale index entries can be unlinked
        let old: Option<M> = match db.get(&self.db_key(&id)) {
            Some(raw) => {
                let mut o: M = index::deserialize(&raw)?;
                o.set_id(id.clone());
                Some(o)
            }
            None => None,
        };

        m.set_id(id.clone());

        let mut moves: Vec<(&Index<M>, Vec<Vec<u8>>, Vec<Vec<u8>>)> = Vec::new();
        for idx in &self.indexes {
            let old_keys = match &old {
                Some(o) => idx.keys(o)?,
                None => Vec::new(),
            };
            let new_keys = idx.keys(m)?;
            if idx.unique {
                for key in new_keys.iter().filter(|k| !old_keys.contains(k)) {
                    if db.has(&self.index_db_key(idx.name, key)) {
                        return Err(Error::duplicate(format!(
                            "{} already indexed under {}",
                            self.name, idx.name
                        )));
                    }
                }
            }
            moves.push((idx, old_keys, new_keys));
        }

        // the id is the key, never part of the value
        let mut stored = m.clone();
        stored.set_id(Vec::new());
        let raw = index::serialize(&stored)?;
        db.set(self.db_key(&id), raw);

        for (idx, old_keys, new_keys) in moves {
            for key in old_keys.iter().filter(|k| !new_keys.contains(k)) {
                self.unlink(db, idx, key, &id)?;
            }
            for key in new_keys.iter().filter(|k| !old_keys.contains(k)) {
                self.link(db, idx, key, &id)?;
            }
        }
        Ok(())
    }

    /// Remove the entity and all its index entries.
    pub fn delete(&self, db: &mut dyn KvWrite, key: &[u8]) -> Result<()> {
        let m = self.one(db, key)?;
        for idx in &self.indexes {
            for index_key in idx.keys(&m)? {
                self.unlink(db, idx, &index_key, key)?;
            }
        }
        db.delete(&self.db_key(key));
        Ok(())
    }

    fn link(&self, db: &mut dyn KvWrite, idx: &Index<M>, key: &[u8], id: &[u8]) -> Result<()> {
        let db_key = self.index_db_key(idx.name, key);
        if idx.unique {
            db.set(db_key, id.to_vec());
        } else {
            let raw = index::add_ref(db.get(&db_key), id)?;
            db.set(db_key, raw);
        }
        Ok(())
    }

    fn unlink(&self, db: &mut dyn KvWrite, idx: &Index<M>, key: &[u8], id: &[u8]) -> Result<()> {
        let db_key = self.index_db_key(idx.name, key);
        if idx.unique {
            db.delete(&db_key);
        } else {
            match index::remove_ref(db.get(&db_key), id)? {
                Some(raw) => db.set(db_key, raw),
                None => db.delete(&db_key),
            }
        }
        Ok(())
    }

    /// Range scan over all entities whose primary id begins with `prefix`.
    pub fn prefix_scan<'a>(
        &self,
        db: &'a dyn KvRead,
        prefix: &[u8],
        reverse: bool,
    ) -> ModelIter<'a, M> {
        let (start, end) = prefix_range(&self.db_key(prefix));
        let inner = if reverse {
            db.reverse_iterator(Some(&start), end.as_deref())
        } else {
            db.iterator(Some(&start), end.as_deref())
        };
        ModelIter {
            inner,
            strip: self.name.len() + 1,
            _marker: PhantomData,
        }
    }

    /// Range scan over a secondary index keyspace. Entities resolve in index
    /// key order (reversed when `reverse`); references stored under one key
    /// keep their append order either way.
    pub fn index_scan<'a>(
        &self,
        db: &'a dyn KvRead,
        index: &str,
        prefix: &[u8],
        reverse: bool,
    ) -> Result<IndexIter<'a, M>> {
        let idx = self.find_index(index)?;
        let (start, end) = prefix_range(&self.index_db_key(index, prefix));
        let entries = if reverse {
            db.reverse_iterator(Some(&start), end.as_deref())
        } else {
            db.iterator(Some(&start), end.as_deref())
        };
        Ok(IndexIter {
            db,
            entries,
            pending: VecDeque::new(),
            unique: idx.unique,
            entity_prefix: self.db_key(&[]),
            _marker: PhantomData,
        })
    }

    /// All entities whose indexer produced `key`, in stored order.
    pub fn by_index(&self, db: &dyn KvRead, index: &str, key: &[u8]) -> Result<Vec<M>> {
        let idx = self.find_index(index)?;
        let raw = match db.get(&self.index_db_key(index, key)) {
            Some(raw) => raw,
            None => return Ok(Vec::new()),
        };
        index::decode_refs(idx.unique, &raw)?
            .iter()
            .map(|id| self.one(db, id))
            .collect()
    }

    /// Expose this bucket for external read access: `<path>` serves lookups
    /// by primary key, `<path>/<index>` by index key.
    pub fn register(&self, path: &'static str, router: &mut QueryRouter) {
        let name = self.name;
        router.register(path, move |db, data| {
            let mut key = Vec::with_capacity(name.len() + 1 + data.len());
            key.extend_from_slice(name.as_bytes());
            key.push(b':');
            key.extend_from_slice(data);
            Ok(match db.get(&key) {
                Some(value) => vec![(key, value)],
                None => Vec::new(),
            })
        });

        for idx in &self.indexes {
            let index_name = idx.name;
            let unique = idx.unique;
            router.register(format!("{}/{}", path, index_name), move |db, data| {
                let mut index_key = format!("_i.{}_{}:", name, index_name).into_bytes();
                index_key.extend_from_slice(data);
                let raw = match db.get(&index_key) {
                    Some(raw) => raw,
                    None => return Ok(Vec::new()),
                };
                let mut hits = Vec::new();
                for id in index::decode_refs(unique, &raw)? {
                    let mut key = Vec::with_capacity(name.len() + 1 + id.len());
                    key.extend_from_slice(name.as_bytes());
                    key.push(b':');
                    key.extend_from_slice(&id);
                    if let Some(value) = db.get(&key) {
                        hits.push((key, value));
                    }
                }
                Ok(hits)
            });
        }
    }
}

/// Iterator over primary-key range scans.
pub struct ModelIter<'a, M> {
    inner: Box<dyn Iterator<Item = KvPair> + 'a>,
    strip: usize,
    _marker: PhantomData<M>,
}

impl<M: Model> Iterator for ModelIter<'_, M> {
    type Item = Result<M>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = self.inner.next()?;
        let id = key[self.strip..].to_vec();
        Some(index::deserialize::<M>(&value).map(|mut m| {
            m.set_id(id);
            m
        }))
    }
}

/// Iterator over secondary-index range scans, resolving stored references to
/// their entities as it goes.
pub struct IndexIter<'a, M> {
    db: &'a dyn KvRead,
    entries: Box<dyn Iterator<Item = KvPair> + 'a>,
    pending: VecDeque<Vec<u8>>,
    unique: bool,
    entity_prefix: Vec<u8>,
    _marker: PhantomData<M>,
}

impl<M: Model> Iterator for IndexIter<'_, M> {
    type Item = Result<M>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(id) = self.pending.pop_front() {
                let mut key = self.entity_prefix.clone();
                key.extend_from_slice(&id);
                let raw = match self.db.get(&key) {
                    Some(raw) => raw,
                    None => {
                        return Some(Err(Error::new(
                            ErrorKind::Database,
                            "index references a missing entity",
                        )))
                    }
                };
                return Some(index::deserialize::<M>(&raw).map(|mut m| {
                    m.set_id(id);
                    m
                }));
            }
            let (_, value) = self.entries.next()?;
            match index::decode_refs(self.unique, &value) {
                Ok(refs) => self.pending.extend(refs),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
