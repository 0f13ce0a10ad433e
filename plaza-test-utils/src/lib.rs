//! Plaza Test Utilities
//!
//! Centralized test infrastructure for the Plaza workspace:
//! - Fixture record types, one with soft-delete support and one without
//! - Deterministic builders for seeded datasets
//!
//! Fixture ids are built from small integers (`Uuid::from_u128`), so tests
//! control tie-break ordering exactly.

// Re-export the in-memory port for convenience
pub use plaza_storage::MemoryRecordStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use plaza_core::{Record, RecordId, Timestamp};

// ============================================================================
// ARTICLE - A SOFT-DELETING FIXTURE ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub article_id: RecordId,
    pub title: String,
    pub slug: String,
    pub status: String,
    pub views: i64,
    pub author_id: Option<RecordId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArticleDraft {
    pub title: String,
    pub slug: String,
    pub status: String,
    pub views: i64,
    pub author_id: Option<RecordId>,
}

impl ArticleDraft {
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        let slug = title.to_lowercase().replace(' ', "-");
        Self {
            title,
            slug,
            status: "published".to_string(),
            views: 0,
            author_id: None,
        }
    }
}

/// Partial update; only the fields present serialize.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArticlePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views: Option<i64>,
}

impl Record for Article {
    const NAME: &'static str = "article";
    const ID_FIELD: &'static str = "article_id";
    type Draft = ArticleDraft;
    type Patch = ArticlePatch;

    fn from_draft(draft: ArticleDraft, id: RecordId, now: Timestamp) -> Self {
        Self {
            article_id: id,
            title: draft.title,
            slug: draft.slug,
            status: draft.status,
            views: draft.views,
            author_id: draft.author_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn id(&self) -> RecordId {
        self.article_id
    }
    fn created_at(&self) -> Timestamp {
        self.created_at
    }
    fn updated_at(&self) -> Timestamp {
        self.updated_at
    }
    fn deleted_at(&self) -> Option<Timestamp> {
        self.deleted_at
    }
}

// ============================================================================
// REACTION - A FIXTURE ENTITY WITHOUT SOFT DELETE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub reaction_id: RecordId,
    pub article_id: RecordId,
    pub kind: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReactionDraft {
    pub article_id: RecordId,
    pub kind: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReactionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Record for Reaction {
    const NAME: &'static str = "reaction";
    const ID_FIELD: &'static str = "reaction_id";
    type Draft = ReactionDraft;
    type Patch = ReactionPatch;

    fn from_draft(draft: ReactionDraft, id: RecordId, now: Timestamp) -> Self {
        Self {
            reaction_id: id,
            article_id: draft.article_id,
            kind: draft.kind,
            created_at: now,
            updated_at: now,
        }
    }

    fn id(&self) -> RecordId {
        self.reaction_id
    }
    fn created_at(&self) -> Timestamp {
        self.created_at
    }
    fn updated_at(&self) -> Timestamp {
        self.updated_at
    }
}

// ============================================================================
// DETERMINISTIC BUILDERS
// ============================================================================

/// Fixed dataset epoch: 2026-01-01T00:00:00Z.
pub fn base_time() -> Timestamp {
    DateTime::<Utc>::from_timestamp(1_767_225_600, 0).unwrap_or_default()
}

/// Id built from a small integer, so ordering by id is ordering by `n`.
pub fn numbered_id(n: u128) -> RecordId {
    Uuid::from_u128(n)
}

/// Article `n` with `created_at = base_time() + n seconds`. Distinct
/// timestamps make `created_at` ordering unambiguous; pass the same
/// `created_at` to several articles to exercise tie-breaking.
pub fn numbered_article(n: u128) -> Article {
    article_at(n, base_time() + chrono::Duration::seconds(n as i64))
}

/// Article `n` with an explicit creation timestamp.
pub fn article_at(n: u128, created_at: Timestamp) -> Article {
    Article {
        article_id: numbered_id(n),
        title: format!("Article {n}"),
        slug: format!("article-{n}"),
        status: "published".to_string(),
        views: n as i64,
        author_id: None,
        created_at,
        updated_at: created_at,
        deleted_at: None,
    }
}
