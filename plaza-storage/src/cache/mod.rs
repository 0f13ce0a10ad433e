//! Key-value cache contract, backends, key derivation and the cache-aside
//! coordinator.

pub mod coordinator;
pub mod keys;
pub mod lmdb;
pub mod memory;
pub mod store;

pub use coordinator::CacheAside;
pub use keys::{default_key_hasher, id_key, list_key, list_pattern, KeyHasher, QueryShape, QueryWindow};
pub use lmdb::LmdbCacheStore;
pub use memory::MemoryCacheStore;
pub use store::{CacheError, CacheStore};
