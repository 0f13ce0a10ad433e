//! Cache store contract.
//!
//! This trait abstracts over key-value cache backends (in-memory, LMDB, or
//! an external store). Pattern deletion is part of the contract, not an
//! optional extra: write-invalidation drops a whole list-key namespace with
//! one call.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Error type for cache operations. The coordinator logs and swallows
/// these; they must never fail a primary read or write.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache serialization error: {0}")]
    Serialization(String),
}

/// Key-value cache backend with TTL and glob deletion.
///
/// Keys are flat strings in two families, `{prefix}:id:{id}` and
/// `{prefix}:list:{hash}` (see [`super::keys`]). Values are opaque bytes;
/// serialization belongs to the caller.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a value, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store a value. `Duration::ZERO` means no expiry.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Delete a single key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Delete every key matching a glob pattern (`*` matches any run of
    /// characters). Returns the number of keys removed.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError>;
}

/// Match a key against a glob pattern where `*` matches any (possibly
/// empty) run of characters. Shared by the bundled backends.
pub(crate) fn glob_match(pattern: &str, key: &str) -> bool {
    fn inner(p: &[u8], k: &[u8]) -> bool {
        match (p.first(), k.first()) {
            (None, None) => true,
            (Some(b'*'), _) => inner(&p[1..], k) || (!k.is_empty() && inner(p, &k[1..])),
            (Some(pc), Some(kc)) if pc == kc => inner(&p[1..], &k[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), key.as_bytes())
}
