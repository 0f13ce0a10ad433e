//! Cache-key derivation.
//!
//! Two key families exist per entity prefix:
//!
//! - `{prefix}:id:{id}` - a single record snapshot;
//! - `{prefix}:list:{hash}` - one page of a filtered/sorted query, where
//!   the hash is computed over the *normalized* query shape so logically
//!   identical queries always land on the same key.
//!
//! The hash function is injected as a plain function pointer rather than
//! called through a global utility, so tests can pin keys with a
//! deterministic stand-in.

use serde::Serialize;
use sha2::{Digest, Sha256};

use plaza_core::{CursorToken, Filter, RecordId, SortOrder};

/// The normalized parameters of a list query. Hashing this (not the raw
/// caller payload) keys the list cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryShape {
    pub entity: String,
    pub filter: Option<Filter>,
    pub sort_by: String,
    pub order: SortOrder,
    pub window: QueryWindow,
    pub with_deleted: bool,
    pub relations: Vec<String>,
    pub select: Vec<String>,
}

/// The pagination window half of a query shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QueryWindow {
    Offset { page: u32, limit: u32 },
    Cursor { anchor: Option<CursorToken>, limit: u32 },
}

/// Pure query-shape hash function, injected into the coordinator.
pub type KeyHasher = fn(&QueryShape) -> String;

/// Default hasher: hex SHA-256 over the shape's canonical JSON. Struct
/// field order is fixed, so serialization is deterministic.
pub fn default_key_hasher(shape: &QueryShape) -> String {
    let canonical = serde_json::to_vec(shape).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    hex::encode(hasher.finalize())
}

/// Key for a single record snapshot.
pub fn id_key(prefix: &str, id: RecordId) -> String {
    format!("{prefix}:id:{id}")
}

/// Key for one cached page.
pub fn list_key(prefix: &str, hash: &str) -> String {
    format!("{prefix}:list:{hash}")
}

/// Glob covering every list key under a prefix, for bulk invalidation.
pub fn list_pattern(prefix: &str) -> String {
    format!("{prefix}:list:*")
}
