//! LMDB-backed cache store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a memory-mapped,
//! persistent key-value store for cached snapshots. Keys are the flat
//! strings of [`super::keys`]; because LMDB keeps keys sorted, the
//! prefix-shaped globs used by list invalidation resolve to a range scan.
//!
//! # Entry Format
//!
//! `[expires_at_millis: 8 bytes LE][json payload]` - zero millis means no
//! expiry. Expired entries read as misses and are removed lazily.

use async_trait::async_trait;
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use std::path::Path;
use std::time::Duration;

use super::store::{glob_match, CacheError, CacheStore};

/// LMDB cache store.
pub struct LmdbCacheStore {
    env: Env,
    db: Database<Str, Bytes>,
}

impl LmdbCacheStore {
    /// Open (or create) an LMDB environment at `path` with the given map
    /// size in megabytes.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&path).map_err(|e| CacheError::Backend(e.to_string()))?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| CacheError::Backend(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(|e| CacheError::Backend(e.to_string()))?;
        let db: Database<Str, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        wtxn.commit().map_err(|e| CacheError::Backend(e.to_string()))?;

        Ok(Self { env, db })
    }

    fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn frame(value: &[u8], ttl: Duration) -> Vec<u8> {
        let expires_at = if ttl > Duration::ZERO {
            Self::now_millis().saturating_add(ttl.as_millis() as i64)
        } else {
            0
        };
        let mut framed = Vec::with_capacity(8 + value.len());
        framed.extend_from_slice(&expires_at.to_le_bytes());
        framed.extend_from_slice(value);
        framed
    }

    /// Split an entry into (expired, payload). Truncated entries count as
    /// expired.
    fn unframe(bytes: &[u8]) -> Option<Vec<u8>> {
        if bytes.len() < 8 {
            return None;
        }
        let expiry_bytes: [u8; 8] = bytes[0..8].try_into().ok()?;
        let expires_at = i64::from_le_bytes(expiry_bytes);
        if expires_at != 0 && expires_at <= Self::now_millis() {
            return None;
        }
        Some(bytes[8..].to_vec())
    }

    /// Collect keys matching a glob. Pure-prefix patterns (a single
    /// trailing `*`) walk the sorted key space with a prefix iterator.
    fn collect_matching_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        let mut keys = Vec::new();
        let prefix = pattern
            .strip_suffix('*')
            .filter(|head| !head.contains('*'));

        if let Some(prefix) = prefix {
            let iter = self
                .db
                .prefix_iter(&rtxn, prefix)
                .map_err(|e| CacheError::Backend(e.to_string()))?;
            for result in iter {
                let (key, _) = result.map_err(|e| CacheError::Backend(e.to_string()))?;
                keys.push(key.to_string());
            }
        } else {
            let iter = self
                .db
                .iter(&rtxn)
                .map_err(|e| CacheError::Backend(e.to_string()))?;
            for result in iter {
                let (key, _) = result.map_err(|e| CacheError::Backend(e.to_string()))?;
                if glob_match(pattern, key) {
                    keys.push(key.to_string());
                }
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl CacheStore for LmdbCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let payload = {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| CacheError::Backend(e.to_string()))?;
            match self
                .db
                .get(&rtxn, key)
                .map_err(|e| CacheError::Backend(e.to_string()))?
            {
                Some(bytes) => Self::unframe(bytes),
                None => return Ok(None),
            }
        };

        if payload.is_none() {
            // Expired: purge lazily.
            self.delete(key).await?;
        }
        Ok(payload)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let framed = Self::frame(&value, ttl);

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        self.db
            .put(&mut wtxn, key, &framed)
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        wtxn.commit().map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        self.db
            .delete(&mut wtxn, key)
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        wtxn.commit().map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let keys = self.collect_matching_keys(pattern)?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        let mut removed = 0u64;
        for key in &keys {
            if self
                .db
                .delete(&mut wtxn, key)
                .map_err(|e| CacheError::Backend(e.to_string()))?
            {
                removed += 1;
            }
        }
        wtxn.commit().map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store() -> (tempfile::TempDir, LmdbCacheStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LmdbCacheStore::new(dir.path(), 16).expect("open lmdb");
        (dir, store)
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let (_dir, store) = open_store();
        store
            .set("article:id:1", b"payload".to_vec(), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(
            store.get("article:id:1").await.unwrap(),
            Some(b"payload".to_vec())
        );
        assert_eq!(store.get("article:id:2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_miss() {
        let (_dir, store) = open_store();
        store
            .set("k", b"v".to_vec(), Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_pattern_prefix_scan() {
        let (_dir, store) = open_store();
        for hash in ["aa", "bb"] {
            store
                .set(&format!("article:list:{hash}"), b"page".to_vec(), Duration::ZERO)
                .await
                .unwrap();
        }
        store
            .set("article:id:1", b"row".to_vec(), Duration::ZERO)
            .await
            .unwrap();

        let removed = store.delete_pattern("article:list:*").await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.get("article:id:1").await.unwrap().is_some());
    }
}
