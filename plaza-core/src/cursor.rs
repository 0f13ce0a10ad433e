//! Cursor token: the client-carried keyset pagination anchor.
//!
//! A token names the sort field and direction it was issued for, the sort
//! value of the boundary row, and that row's id as tie-breaker. The server
//! holds no cursor state; each response mints fresh tokens and the next
//! request carries one back. Encoding/signing lives in the access crate.

use serde::{Deserialize, Serialize};

use crate::filter::{ScalarValue, SortOrder};
use crate::RecordId;

/// Keyset pagination anchor.
///
/// Unknown fields are rejected on decode so a token minted by a different
/// shape of the layer does not silently half-parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CursorToken {
    /// Field the page was sorted by when this token was minted.
    pub sort_field: String,
    /// Direction the page was sorted in.
    pub order: SortOrder,
    /// Sort-field value of the boundary row.
    pub sort_value: ScalarValue,
    /// Id of the boundary row; breaks ties between equal sort values.
    pub tie: RecordId,
}

impl CursorToken {
    /// True if this token was minted for the given sort specification.
    /// A cursor from a differently-sorted listing must not be applied.
    pub fn matches(&self, sort_by: &str, order: SortOrder) -> bool {
        self.sort_field == sort_by && self.order == order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::new_record_id;

    #[test]
    fn test_matches_checks_field_and_order() {
        let token = CursorToken {
            sort_field: "created_at".to_string(),
            order: SortOrder::Desc,
            sort_value: ScalarValue::Int(5),
            tie: new_record_id(),
        };
        assert!(token.matches("created_at", SortOrder::Desc));
        assert!(!token.matches("created_at", SortOrder::Asc));
        assert!(!token.matches("title", SortOrder::Desc));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let json = r#"{"sort_field":"x","order":"ASC","sort_value":{"t":"int","v":1},"tie":"0191f9b2-0000-7000-8000-000000000000","extra":1}"#;
        assert!(serde_json::from_str::<CursorToken>(json).is_err());
    }
}
