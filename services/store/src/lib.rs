//! Key-value abstraction and typed bucket layer
//!
//! Presents a model-oriented view over a raw byte-ordered key-value store:
//! primary storage plus secondary indices, sequence-allocated ids, and range
//! scans, without leaking the byte layout to callers.
//!
//! # Modules
//! - `kv`: read/write store ports, in-memory store, prefix ranges
//! - `sequence`: persisted monotone id counters
//! - `index`: secondary index descriptors and the stored-reference codec
//! - `bucket`: the typed `Bucket<M>` over all of the above
//! - `query`: read-only query routing

pub mod bucket;
pub mod index;
pub mod kv;
pub mod query;
pub mod sequence;

pub use bucket::{Bucket, Model};
pub use kv::{KvRead, KvWrite, MemStore};
pub use query::QueryRouter;
