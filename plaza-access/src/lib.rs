//! Plaza Access - the generic entity-access facade.
//!
//! Feature services talk to one type, [`EntityAccess`], which composes:
//!
//! - the cache-aside coordinator from `plaza-storage` (read-through point
//!   lookups and page caching, write-invalidate on every mutation);
//! - the pagination engine (offset metadata and keyset windows with id
//!   tie-breaking);
//! - cursor codecs, plain or HMAC-signed;
//! - the per-entity access whitelist;
//! - feature-supplied lifecycle hooks;
//! - a single error-translation boundary onto the `plaza-core` taxonomy.
//!
//! The PostgreSQL port adapter lives in [`pg`]; tests run the same facade
//! against the in-memory port.

pub mod config;
pub mod ctx;
pub mod cursor;
pub mod facade;
pub mod hooks;
pub mod paginate;
pub mod pg;
pub mod whitelist;

pub use config::{AccessConfig, CursorMode, SigningKey};
pub use ctx::OpCtx;
pub use facade::EntityAccess;
pub use hooks::{LifecycleHooks, NoHooks};
pub use pg::{PgConfig, PgMapping, PgRecordStore};
pub use whitelist::AccessWhitelist;
