//! Record contract for types that flow through the generic access layer.
//!
//! Each persistable entity implements [`Record`], which gives the facade and
//! the persistence port everything they need for generic CRUD: the entity
//! name, the creation/patch payload types, and accessors for the identity
//! and lifecycle timestamps. Feature crates implement this once per entity
//! instead of hand-writing a repository each.

use serde::{de::DeserializeOwned, Serialize};

use crate::{RecordId, Timestamp};

/// Trait for entities persisted and cached through the generic access layer.
///
/// # Implementation Requirements
///
/// - `id()` must be stable for the lifetime of the record; it doubles as the
///   pagination tie-breaker, so it must be unique and sortable.
/// - `deleted_at()` returns the soft-delete marker. Entity types without
///   soft-delete columns keep the default (`None` always); whether the
///   access layer treats deletion as soft is decided once, by configuration,
///   not by inspecting this method.
/// - Implementations must be `Clone`, `Serialize`, and `DeserializeOwned`
///   so rows can travel as JSON through the cache and the relational store.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Entity name used in error reporting and cache key prefixes
    /// (e.g. "article").
    const NAME: &'static str;

    /// Name of the identifier field as it appears in the record's
    /// serialized form (e.g. "article_id"). Pagination tie-breaking and
    /// keyset window predicates reference the id by this name.
    const ID_FIELD: &'static str = "id";

    /// Payload type for creating new records.
    type Draft: Serialize + Send + Sync + 'static;

    /// Payload type for partial updates. Serialized as a JSON object whose
    /// keys name the fields being changed.
    type Patch: Serialize + Send + Sync + 'static;

    /// Build a transient instance from a draft. No I/O happens here; the
    /// caller supplies the generated id and the creation timestamp.
    fn from_draft(draft: Self::Draft, id: RecordId, now: Timestamp) -> Self;

    /// The unique identifier for this record. Immutable once assigned.
    fn id(&self) -> RecordId;

    /// Creation timestamp.
    fn created_at(&self) -> Timestamp;

    /// Last-update timestamp.
    fn updated_at(&self) -> Timestamp;

    /// Soft-delete marker. `Some` means the record is excluded from default
    /// queries unless the caller opts into seeing deleted rows.
    fn deleted_at(&self) -> Option<Timestamp> {
        None
    }
}
