//! Pagination request and result shapes.
//!
//! Two modes are supported: offset pagination (page/limit with a total
//! count) and keyset pagination (cursor anchored on the last-seen sort
//! value plus id tie-breaker). Both result shapes serialize cleanly so a
//! whole page can be cached as one entry.

use serde::{Deserialize, Serialize};

use crate::filter::SortOrder;

// ============================================================================
// QUERIES
// ============================================================================

/// Offset-mode list parameters. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetQuery {
    pub page: u32,
    pub limit: u32,
    pub sort_by: String,
    pub order: SortOrder,
}

impl OffsetQuery {
    /// Rows to skip for this page.
    pub fn skip(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// Cursor-mode list parameters. An absent cursor means the first page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorQuery {
    pub limit: u32,
    pub sort_by: String,
    pub order: SortOrder,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

// ============================================================================
// RESULTS
// ============================================================================

/// Metadata accompanying an offset-mode page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    pub current_page: u32,
    pub page_size: u32,
    pub total_records: u64,
    pub total_pages: u64,
    pub has_next_page: bool,
}

impl PageMeta {
    /// Derive page metadata from the request window and the total count.
    pub fn compute(page: u32, limit: u32, total_records: u64) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total_records.div_ceil(u64::from(limit))
        };
        Self {
            current_page: page,
            page_size: limit,
            total_records,
            total_pages,
            has_next_page: u64::from(page) < total_pages,
        }
    }
}

/// One offset-mode page of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetPage<T> {
    pub rows: Vec<T>,
    pub meta: PageMeta,
}

/// Metadata accompanying a cursor-mode page. Absent cursors signal the end
/// of the stream in that direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_cursor: Option<String>,
    pub take: u32,
    pub sort_by: String,
    pub order: SortOrder,
}

/// One cursor-mode page of rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorPage<T> {
    pub rows: Vec<T>,
    pub meta: CursorMeta,
}
