//! Plaza Core - Entity-Access Data Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! This crate contains ONLY data types - no I/O, no async, no backends.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod cursor;
pub mod error;
pub mod filter;
pub mod page;
pub mod record;

pub use cursor::CursorToken;
pub use error::{AccessError, AccessResult, Localizer, ValidationFault};
pub use filter::{Filter, ScalarValue, SortOrder};
pub use page::{CursorMeta, CursorPage, CursorQuery, OffsetPage, OffsetQuery, PageMeta};
pub use record::Record;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Record identifier using UUIDv7 for timestamp-sortable IDs.
/// UUIDv7 embeds a Unix timestamp, making IDs naturally sortable by creation
/// time, which is what makes them usable as pagination tie-breakers.
pub type RecordId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 RecordId (timestamp-sortable).
pub fn new_record_id() -> RecordId {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_ids_are_sortable_by_creation() {
        let a = new_record_id();
        let b = new_record_id();
        assert!(a <= b);
    }
}
