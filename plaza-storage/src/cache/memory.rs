//! In-memory cache store.
//!
//! The default backend for tests and single-process deployments. Entries
//! carry their expiry instant; expired entries are dropped lazily on read.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use super::store::{glob_match, CacheError, CacheStore};

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Thread-safe in-memory cache with per-entry TTL and glob deletion.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|map| map.values().filter(|e| !e.is_expired(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        {
            let map = self
                .entries
                .read()
                .map_err(|_| CacheError::Backend("lock poisoned".into()))?;
            match map.get(key) {
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {} // expired, purge below
                None => return Ok(None),
            }
        }
        let mut map = self
            .entries
            .write()
            .map_err(|_| CacheError::Backend("lock poisoned".into()))?;
        if map.get(key).is_some_and(|e| e.is_expired(now)) {
            map.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = (ttl > Duration::ZERO).then(|| Instant::now() + ttl);
        let mut map = self
            .entries
            .write()
            .map_err(|_| CacheError::Backend("lock poisoned".into()))?;
        map.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut map = self
            .entries
            .write()
            .map_err(|_| CacheError::Backend("lock poisoned".into()))?;
        map.remove(key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut map = self
            .entries
            .write()
            .map_err(|_| CacheError::Backend("lock poisoned".into()))?;
        let before = map.len();
        map.retain(|key, _| !glob_match(pattern, key));
        Ok((before - map.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let cache = MemoryCacheStore::new();
        cache
            .set("article:id:1", b"payload".to_vec(), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(
            cache.get("article:id:1").await.unwrap(),
            Some(b"payload".to_vec())
        );
        assert_eq!(cache.get("article:id:2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = MemoryCacheStore::new();
        cache
            .set("k", b"v".to_vec(), Duration::from_nanos(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_delete_pattern_counts_removals() {
        let cache = MemoryCacheStore::new();
        for hash in ["aa", "bb", "cc"] {
            cache
                .set(&format!("article:list:{hash}"), b"page".to_vec(), Duration::ZERO)
                .await
                .unwrap();
        }
        cache
            .set("article:id:1", b"row".to_vec(), Duration::ZERO)
            .await
            .unwrap();

        let removed = cache.delete_pattern("article:list:*").await.unwrap();
        assert_eq!(removed, 3);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("article:id:1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_absent_key_is_ok() {
        let cache = MemoryCacheStore::new();
        cache.delete("missing").await.unwrap();
    }
}
