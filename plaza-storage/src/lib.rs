//! Plaza Storage - cache and persistence contracts.
//!
//! This crate holds the storage-facing half of the entity-access layer:
//!
//! - the key-value [`cache`] contract with in-memory and LMDB backends,
//!   cache-key derivation, and the cache-aside coordinator;
//! - the persistence [`port`] trait that hides the concrete relational
//!   backend from the facade;
//! - an in-[`memory`] port implementation used by tests and single-process
//!   tooling.

pub mod cache;
pub mod memory;
pub mod port;

pub use cache::{
    default_key_hasher, id_key, list_key, list_pattern, CacheAside, CacheError, CacheStore,
    KeyHasher, LmdbCacheStore, MemoryCacheStore, QueryShape, QueryWindow,
};
pub use memory::MemoryRecordStore;
pub use port::{FindOpts, ListQuery, RecordStore, StoreError, StoreResult, TxToken};
