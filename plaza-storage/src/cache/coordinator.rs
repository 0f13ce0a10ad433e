//! Cache-aside coordinator.
//!
//! Read path: point lookups and list pages are served from the cache when
//! present (TTL is the only freshness bound), otherwise read through the
//! supplied fetch and populated. Mutation path: after the primary write
//! succeeds, the record's id-key is deleted, then every list-key under the
//! entity prefix. Re-evaluating cached filters against a changed row is not
//! tractable in general, so the whole list namespace is dropped instead.
//!
//! Cache faults are logged and swallowed on every path. The relational
//! store is the source of truth; a cache outage degrades latency, never
//! correctness.

use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use plaza_core::RecordId;

use super::keys::{default_key_hasher, id_key, list_key, list_pattern, KeyHasher, QueryShape};
use super::store::CacheStore;

/// Coordinates cache-aside reads and write-invalidation over a
/// [`CacheStore`].
pub struct CacheAside<C: CacheStore> {
    store: Arc<C>,
    hasher: KeyHasher,
}

impl<C: CacheStore> CacheAside<C> {
    pub fn new(store: Arc<C>) -> Self {
        Self {
            store,
            hasher: default_key_hasher,
        }
    }

    /// Replace the query-shape hasher (tests inject a deterministic one).
    pub fn with_hasher(store: Arc<C>, hasher: KeyHasher) -> Self {
        Self { store, hasher }
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    /// Derive the list-cache key for a normalized query shape.
    pub fn list_key_for(&self, prefix: &str, shape: &QueryShape) -> String {
        list_key(prefix, &(self.hasher)(shape))
    }

    /// Get and decode a cached snapshot. Any fault (backend or decode) is
    /// logged and reported as a miss; undecodable entries are dropped.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "dropping undecodable cache entry");
                    let _ = self.store.delete(key).await;
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache read failed");
                None
            }
        }
    }

    /// Encode and store a snapshot. Faults are logged and swallowed.
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache encode failed");
                return;
            }
        };
        if let Err(e) = self.store.set(key, bytes, ttl).await {
            tracing::warn!(key = %key, error = %e, "cache write failed");
        }
    }

    /// Cache-aside read: cached snapshot if present, otherwise run `fetch`
    /// and populate on a hit. `fetch` returning `Ok(None)` is not cached;
    /// absence stays a store-level answer.
    pub async fn read_through<T, F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<Option<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        if let Some(cached) = self.get_json::<T>(key).await {
            return Ok(Some(cached));
        }
        match fetch().await? {
            Some(value) => {
                self.put_json(key, &value, ttl).await;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Write-invalidation: drop the id-key, then the entity's whole
    /// list-key namespace.
    pub async fn invalidate(&self, prefix: &str, id: RecordId) {
        if let Err(e) = self.store.delete(&id_key(prefix, id)).await {
            tracing::warn!(prefix = %prefix, id = %id, error = %e, "id-key invalidation failed");
        }
        match self.store.delete_pattern(&list_pattern(prefix)).await {
            Ok(removed) => {
                tracing::debug!(prefix = %prefix, removed, "list cache invalidated");
            }
            Err(e) => {
                tracing::warn!(prefix = %prefix, error = %e, "list-key invalidation failed");
            }
        }
    }
}

impl<C: CacheStore> Clone for CacheAside<C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            hasher: self.hasher,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryCacheStore;
    use crate::cache::store::CacheError;
    use async_trait::async_trait;

    #[tokio::test]
    async fn test_read_through_populates_on_miss() {
        let coord = CacheAside::new(Arc::new(MemoryCacheStore::new()));
        let value: Option<String> = coord
            .read_through("article:id:1", Duration::ZERO, || async {
                Ok::<_, ()>(Some("row".to_string()))
            })
            .await
            .unwrap();
        assert_eq!(value.as_deref(), Some("row"));

        // Second read is served from cache: a failing fetch is never run.
        let cached: Option<String> = coord
            .read_through("article:id:1", Duration::ZERO, || async {
                Err::<Option<String>, ()>(())
            })
            .await
            .unwrap();
        assert_eq!(cached.as_deref(), Some("row"));
    }

    #[tokio::test]
    async fn test_absent_rows_are_not_cached() {
        let coord = CacheAside::new(Arc::new(MemoryCacheStore::new()));
        let value: Option<String> = coord
            .read_through("article:id:2", Duration::ZERO, || async {
                Ok::<_, ()>(None)
            })
            .await
            .unwrap();
        assert!(value.is_none());
        assert!(coord.store().is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_drops_id_and_list_namespace() {
        let store = Arc::new(MemoryCacheStore::new());
        let coord = CacheAside::new(Arc::clone(&store));
        let id = plaza_core::new_record_id();

        coord.put_json(&id_key("article", id), &"row", Duration::ZERO).await;
        coord.put_json(&list_key("article", "h1"), &"page", Duration::ZERO).await;
        coord.put_json(&list_key("article", "h2"), &"page", Duration::ZERO).await;
        coord.put_json(&list_key("bookmark", "h1"), &"page", Duration::ZERO).await;

        coord.invalidate("article", id).await;

        assert!(coord.get_json::<String>(&id_key("article", id)).await.is_none());
        assert!(coord.get_json::<String>(&list_key("article", "h1")).await.is_none());
        assert!(coord.get_json::<String>(&list_key("article", "h2")).await.is_none());
        // Other prefixes are untouched.
        assert!(coord.get_json::<String>(&list_key("bookmark", "h1")).await.is_some());
    }

    /// Backend that fails every call, to prove faults never propagate.
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::Backend("down".into()))
        }
        async fn set(&self, _: &str, _: Vec<u8>, _: Duration) -> Result<(), CacheError> {
            Err(CacheError::Backend("down".into()))
        }
        async fn delete(&self, _: &str) -> Result<(), CacheError> {
            Err(CacheError::Backend("down".into()))
        }
        async fn delete_pattern(&self, _: &str) -> Result<u64, CacheError> {
            Err(CacheError::Backend("down".into()))
        }
    }

    #[tokio::test]
    async fn test_cache_faults_never_fail_the_primary_path() {
        let coord = CacheAside::new(Arc::new(BrokenStore));
        let value: Option<String> = coord
            .read_through("k", Duration::from_secs(60), || async {
                Ok::<_, ()>(Some("primary".to_string()))
            })
            .await
            .unwrap();
        assert_eq!(value.as_deref(), Some("primary"));

        // Invalidation against a dead cache is a logged no-op.
        coord.invalidate("article", plaza_core::new_record_id()).await;
    }
}
