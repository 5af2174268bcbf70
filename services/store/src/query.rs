//! Read-only query routing
//!
//! Maps string paths to handlers serving raw `(key, value)` hits against the
//! store. Buckets register themselves under a path plus one sub-path per
//! index; the host exposes the router however it likes.

use crate::kv::{KvPair, KvRead};
use std::collections::BTreeMap;
use types::errors::{Error, Result};

type Handler = Box<dyn Fn(&dyn KvRead, &[u8]) -> Result<Vec<KvPair>>>;

/// Registry of read-only query paths.
#[derive(Default)]
pub struct QueryRouter {
    routes: BTreeMap<String, Handler>,
}

impl QueryRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler to a path. A later registration under the same path
    /// replaces the earlier one.
    pub fn register<F>(&mut self, path: impl Into<String>, handler: F)
    where
        F: Fn(&dyn KvRead, &[u8]) -> Result<Vec<KvPair>> + 'static,
    {
        self.routes.insert(path.into(), Box::new(handler));
    }

    /// Serve one query. Unknown paths fail with `NotFound`.
    pub fn query(&self, db: &dyn KvRead, path: &str, data: &[u8]) -> Result<Vec<KvPair>> {
        let handler = self
            .routes
            .get(path)
            .ok_or_else(|| Error::not_found(format!("no query handler for {}", path)))?;
        handler(db, data)
    }

    /// Registered paths, sorted.
    pub fn paths(&self) -> Vec<&str> {
        self.routes.keys().map(String::as_str).collect()
    }
}
