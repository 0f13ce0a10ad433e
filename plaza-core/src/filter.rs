//! Typed filter predicates and sort order.
//!
//! Filters are a small tagged tree rather than loose key-value maps, so they
//! can be validated once at the facade boundary and then compiled by each
//! persistence adapter (SQL parameters for PostgreSQL, JSON-image evaluation
//! for the in-memory store). The external condition builder is expected to
//! emit this type; the access layer itself never interprets filter semantics
//! beyond compiling them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Timestamp;

// ============================================================================
// SCALAR VALUES
// ============================================================================

/// A typed scalar usable in filter comparisons and cursor anchors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
pub enum ScalarValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Uuid(Uuid),
    Timestamp(Timestamp),
    Null,
}

impl ScalarValue {
    /// Convert a JSON value into a scalar, if it has a scalar shape.
    ///
    /// Strings that parse as RFC 3339 timestamps or UUIDs keep their
    /// stronger type so cursor anchors extracted from row JSON compare the
    /// same way the originating column does.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(ScalarValue::Null),
            serde_json::Value::Bool(b) => Some(ScalarValue::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(ScalarValue::Int(i))
                } else {
                    n.as_f64().map(ScalarValue::Float)
                }
            }
            serde_json::Value::String(s) => {
                if let Ok(ts) = s.parse::<Timestamp>() {
                    Some(ScalarValue::Timestamp(ts))
                } else if let Ok(id) = s.parse::<Uuid>() {
                    Some(ScalarValue::Uuid(id))
                } else {
                    Some(ScalarValue::Text(s.clone()))
                }
            }
            _ => None,
        }
    }

    /// Render this scalar as a JSON value (the inverse of `from_json`).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ScalarValue::Text(s) => serde_json::Value::String(s.clone()),
            ScalarValue::Int(i) => serde_json::Value::from(*i),
            ScalarValue::Float(f) => {
                serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number)
            }
            ScalarValue::Bool(b) => serde_json::Value::Bool(*b),
            ScalarValue::Uuid(id) => serde_json::Value::String(id.to_string()),
            ScalarValue::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
            ScalarValue::Null => serde_json::Value::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Order two scalars of compatible types. Integers and floats compare
    /// numerically across variants; anything else compares only within its
    /// own variant. `None` means the pair is not comparable (including any
    /// comparison against `Null`).
    pub fn compare(&self, other: &ScalarValue) -> Option<std::cmp::Ordering> {
        use ScalarValue::*;
        match (self, other) {
            (Text(a), Text(b)) => Some(a.cmp(b)),
            (Int(a), Int(b)) => Some(a.cmp(b)),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (Uuid(a), Uuid(b)) => Some(a.cmp(b)),
            (Timestamp(a), Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::Text(s.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        ScalarValue::Text(s)
    }
}

impl From<i64> for ScalarValue {
    fn from(i: i64) -> Self {
        ScalarValue::Int(i)
    }
}

impl From<bool> for ScalarValue {
    fn from(b: bool) -> Self {
        ScalarValue::Bool(b)
    }
}

impl From<Uuid> for ScalarValue {
    fn from(id: Uuid) -> Self {
        ScalarValue::Uuid(id)
    }
}

impl From<Timestamp> for ScalarValue {
    fn from(ts: Timestamp) -> Self {
        ScalarValue::Timestamp(ts)
    }
}

// ============================================================================
// FILTER TREE
// ============================================================================

/// A composable filter predicate over record fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    Eq { field: String, value: ScalarValue },
    Ne { field: String, value: ScalarValue },
    Gt { field: String, value: ScalarValue },
    Gte { field: String, value: ScalarValue },
    Lt { field: String, value: ScalarValue },
    Lte { field: String, value: ScalarValue },
    In { field: String, values: Vec<ScalarValue> },
    Like { field: String, pattern: String },
    IsNull { field: String },
    NotNull { field: String },
    And { filters: Vec<Filter> },
    Or { filters: Vec<Filter> },
}

impl Filter {
    /// Conjoin two optional filters, dropping absent sides.
    pub fn merge(a: Option<Filter>, b: Option<Filter>) -> Option<Filter> {
        match (a, b) {
            (None, None) => None,
            (Some(f), None) | (None, Some(f)) => Some(f),
            (Some(a), Some(b)) => Some(Filter::And { filters: vec![a, b] }),
        }
    }

    /// Collect every field name referenced anywhere in the tree, for
    /// whitelist validation before a query executes.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Filter::Eq { field, .. }
            | Filter::Ne { field, .. }
            | Filter::Gt { field, .. }
            | Filter::Gte { field, .. }
            | Filter::Lt { field, .. }
            | Filter::Lte { field, .. }
            | Filter::In { field, .. }
            | Filter::Like { field, .. }
            | Filter::IsNull { field }
            | Filter::NotNull { field } => out.push(field),
            Filter::And { filters } | Filter::Or { filters } => {
                for f in filters {
                    f.collect_fields(out);
                }
            }
        }
    }
}

// ============================================================================
// SORT ORDER
// ============================================================================

/// Sort direction for list queries and cursor windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// SQL keyword for this direction.
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub fn is_descending(&self) -> bool {
        matches!(self, SortOrder::Desc)
    }
}
