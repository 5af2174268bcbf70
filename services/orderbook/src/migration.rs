//! Schema metadata and the migration registry
//!
//! Every command carries a metadata header with its schema version. A
//! process-wide registry, seeded once at startup, records which versions of
//! which message paths this binary understands; the current version of each
//! package lives in the store so upgrades can move it forward.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Mutex, OnceLock};
use store::kv::{KvRead, KvWrite};
use types::errors::{Error, ErrorKind, Result};

/// The package every command of this engine belongs to.
pub const PACKAGE_NAME: &str = "orderbook";

/// Schema header attached to every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub schema: u32,
}

impl Metadata {
    pub fn new(schema: u32) -> Self {
        Self { schema }
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema < 1 {
            return Err(Error::new(ErrorKind::Metadata, "schema version must be >= 1"));
        }
        Ok(())
    }
}

fn registry() -> &'static Mutex<BTreeSet<(String, u32)>> {
    static REGISTRY: OnceLock<Mutex<BTreeSet<(String, u32)>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(BTreeSet::new()))
}

/// Record that this binary understands `path` at `version` without any
/// payload modification.
///
/// # Panics
/// Panics when the same pair is registered twice; registration is a
/// startup-time, once-only affair.
pub fn must_register(version: u32, path: &str) {
    let mut reg = registry().lock().expect("migration registry poisoned");
    if !reg.insert((path.to_string(), version)) {
        panic!("migration for {} version {} registered twice", path, version);
    }
}

fn is_registered(path: &str, version: u32) -> bool {
    registry()
        .lock()
        .expect("migration registry poisoned")
        .contains(&(path.to_string(), version))
}

/// Seed the registry with every command of this package. Safe to call more
/// than once.
pub fn register_default_migrations() {
    static SEEDED: OnceLock<()> = OnceLock::new();
    SEEDED.get_or_init(|| {
        must_register(1, crate::msg::CreateOrderBookMsg::PATH);
        must_register(1, crate::msg::CreateOrderMsg::PATH);
        must_register(1, crate::msg::CancelOrderMsg::PATH);
    });
}

fn schema_key(package: &str) -> Vec<u8> {
    format!("_schema:{}", package).into_bytes()
}

/// Initialize `package` at schema version 1. Used by tests and bootstrap;
/// initializing twice fails with `Duplicate`.
pub fn init_package(db: &mut dyn KvWrite, package: &str) -> Result<()> {
    let key = schema_key(package);
    if db.has(&key) {
        return Err(Error::duplicate(format!(
            "package {} already initialized",
            package
        )));
    }
    db.set(key, 1u32.to_be_bytes().to_vec());
    Ok(())
}

/// The current schema version of `package` in this store.
pub fn current_schema(db: &dyn KvRead, package: &str) -> Result<u32> {
    let raw = db.get(&schema_key(package)).ok_or_else(|| {
        Error::new(
            ErrorKind::Metadata,
            format!("schema for package {} not initialized", package),
        )
    })?;
    if raw.len() != 4 {
        return Err(Error::new(ErrorKind::Database, "malformed schema version"));
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&raw);
    Ok(u32::from_be_bytes(buf))
}

/// Check a command's metadata against the registry and the package schema.
pub fn verify_schema(
    db: &dyn KvRead,
    package: &str,
    metadata: Option<&Metadata>,
    path: &str,
) -> Result<()> {
    let metadata =
        metadata.ok_or_else(|| Error::new(ErrorKind::Metadata, "missing metadata"))?;
    metadata.validate()?;
    let current = current_schema(db, package)?;
    if metadata.schema > current {
        return Err(Error::new(
            ErrorKind::Metadata,
            format!(
                "message schema {} ahead of package schema {}",
                metadata.schema, current
            ),
        ));
    }
    if !is_registered(path, metadata.schema) {
        return Err(Error::new(
            ErrorKind::Metadata,
            format!("no migration registered for {} version {}", path, metadata.schema),
        ));
    }
    Ok(())
}
