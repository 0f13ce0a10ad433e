//! Persistence port: the narrow contract between the access facade and the
//! relational backend.
//!
//! The port hides everything backend-specific - connection pooling, SQL,
//! transaction plumbing - behind a handful of operations. Implementations
//! live in `plaza-access::pg` (PostgreSQL) and [`crate::memory`] (in-memory,
//! for tests).
//!
//! Transactions are threaded as opaque [`TxToken`] handles: `begin` opens
//! one, mutating calls optionally carry it, and `commit`/`rollback` release
//! it. Calls without a token auto-commit independently.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use plaza_core::{new_record_id, Filter, Record, RecordId, SortOrder};

// ============================================================================
// TRANSACTION HANDLE
// ============================================================================

/// Opaque transaction handle, valid between `begin` and `commit`/`rollback`
/// on the store that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxToken(Uuid);

impl TxToken {
    pub fn new() -> Self {
        Self(new_record_id())
    }
}

impl Default for TxToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TxToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// QUERY OPTIONS
// ============================================================================

/// Options for point lookups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOpts {
    /// Relations to hydrate. Must pass the access whitelist first.
    pub relations: Vec<String>,
    /// Fields to project. Empty means the full row.
    pub select: Vec<String>,
    /// Include soft-deleted rows.
    pub with_deleted: bool,
}

impl FindOpts {
    pub fn with_deleted() -> Self {
        Self {
            with_deleted: true,
            ..Self::default()
        }
    }
}

/// A fully-normalized list query: filter, explicit sort (the adapter always
/// appends the primary key as final tie-breaker), window, and projection.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filter: Option<Filter>,
    pub sort: Vec<(String, SortOrder)>,
    pub skip: u64,
    pub take: u32,
    pub with_deleted: bool,
    pub relations: Vec<String>,
    pub select: Vec<String>,
    /// Run the separate total-count query. Keyset pagination turns this
    /// off; adapters may then report the window length instead.
    pub count: bool,
}

// ============================================================================
// ERRORS
// ============================================================================

/// Failures surfaced by persistence adapters. The facade translates these
/// into the access-layer taxonomy at its boundary.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// Unique or foreign-key violation.
    #[error("conflict on constraint {constraint}")]
    Conflict { constraint: String },

    /// Connectivity or pool failure; the store could not be reached.
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },

    /// The query was malformed at the adapter level (unknown column,
    /// unusable patch payload).
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    /// Any other backend failure.
    #[error("backend failure: {reason}")]
    Backend { reason: String },

    /// The transaction handle is not (or no longer) registered.
    #[error("unknown transaction handle {0}")]
    UnknownTransaction(TxToken),

    #[error("store lock poisoned")]
    LockPoisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// PORT TRAIT
// ============================================================================

/// The persistence port. One implementation per backend, generic over the
/// record type.
#[async_trait]
pub trait RecordStore<R: Record>: Send + Sync {
    /// Build a transient record from a draft. No I/O; the id and creation
    /// timestamp are generated here and never change afterwards.
    fn build(&self, draft: R::Draft) -> R {
        R::from_draft(draft, new_record_id(), chrono::Utc::now())
    }

    /// Persist a transient record and return it with any store-generated
    /// state.
    async fn save(&self, record: R, tx: Option<TxToken>) -> StoreResult<R>;

    /// Point lookup by id. Soft-deleted rows are excluded unless
    /// `opts.with_deleted` is set.
    async fn find_by_id(
        &self,
        id: RecordId,
        opts: &FindOpts,
        tx: Option<TxToken>,
    ) -> StoreResult<Option<R>>;

    /// First row matching the filter, or `None`.
    async fn find_one(
        &self,
        filter: &Filter,
        opts: &FindOpts,
        tx: Option<TxToken>,
    ) -> StoreResult<Option<R>>;

    /// One window of rows plus the total count over the same filter.
    async fn find_page(&self, query: &ListQuery, tx: Option<TxToken>)
        -> StoreResult<(Vec<R>, u64)>;

    /// Apply a partial update. Returns the updated row, or `None` if the id
    /// does not match a visible row.
    async fn update_by_id(
        &self,
        id: RecordId,
        patch: &R::Patch,
        tx: Option<TxToken>,
    ) -> StoreResult<Option<R>>;

    /// Hard delete. Returns whether a row was removed.
    async fn delete_by_id(&self, id: RecordId, tx: Option<TxToken>) -> StoreResult<bool>;

    /// Set the soft-delete marker. Returns whether a visible row was marked.
    async fn soft_delete_by_id(&self, id: RecordId, tx: Option<TxToken>) -> StoreResult<bool>;

    /// Clear the soft-delete marker. Returns whether a deleted row was
    /// restored.
    async fn restore_by_id(&self, id: RecordId, tx: Option<TxToken>) -> StoreResult<bool>;

    /// Open a transaction and return its handle.
    async fn begin(&self) -> StoreResult<TxToken>;

    /// Commit and release the handle.
    async fn commit(&self, tx: TxToken) -> StoreResult<()>;

    /// Roll back and release the handle.
    async fn rollback(&self, tx: TxToken) -> StoreResult<()>;
}
