//! Error taxonomy for entity-access operations.
//!
//! Four categories cover everything the access layer can surface:
//! - `NotFound` - id absent, or excluded by the soft-delete filter
//! - `Conflict` - unique/foreign-key violation from the store
//! - `Validation` - disallowed relation/field/sort, rejected cursor,
//!   malformed pagination input
//! - `Internal` - unexpected store or infrastructure fault
//!
//! Every variant carries a localization key plus structured arguments. The
//! boundary (HTTP/WS layer) renders the localized message via a
//! [`Localizer`]; this crate never formats user-facing text. `Internal`
//! deliberately exposes no arguments - the underlying reason is for logs
//! only.

use thiserror::Error;

use crate::RecordId;

/// Validation failures raised before any query executes.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationFault {
    #[error("relation '{relation}' is not allowed for {entity}")]
    RelationNotAllowed {
        entity: &'static str,
        relation: String,
    },

    #[error("field '{field}' is not allowed for {entity}")]
    FieldNotAllowed {
        entity: &'static str,
        field: String,
    },

    #[error("field '{field}' is not sortable for {entity}")]
    SortNotAllowed {
        entity: &'static str,
        field: String,
    },

    #[error("cursor rejected: signature mismatch")]
    CursorRejected,

    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}

impl ValidationFault {
    /// Localization key for this fault.
    pub fn message_key(&self) -> &'static str {
        match self {
            ValidationFault::RelationNotAllowed { .. } => "error.validation.relation_not_allowed",
            ValidationFault::FieldNotAllowed { .. } => "error.validation.field_not_allowed",
            ValidationFault::SortNotAllowed { .. } => "error.validation.sort_not_allowed",
            ValidationFault::CursorRejected => "error.validation.cursor_rejected",
            ValidationFault::InvalidValue { .. } => "error.validation.invalid_value",
        }
    }

    /// Structured message arguments for the localizer.
    pub fn args(&self) -> Vec<(&'static str, String)> {
        match self {
            ValidationFault::RelationNotAllowed { entity, relation } => vec![
                ("entity", entity.to_string()),
                ("relation", relation.clone()),
            ],
            ValidationFault::FieldNotAllowed { entity, field }
            | ValidationFault::SortNotAllowed { entity, field } => {
                vec![("entity", entity.to_string()), ("field", field.clone())]
            }
            ValidationFault::CursorRejected => vec![],
            ValidationFault::InvalidValue { field, reason } => {
                vec![("field", field.to_string()), ("reason", reason.clone())]
            }
        }
    }
}

/// The access-layer error taxonomy.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AccessError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: RecordId },

    #[error("{entity} conflicts on {constraint}")]
    Conflict {
        entity: &'static str,
        constraint: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationFault),

    /// The reason is logged at the point of translation and is never part
    /// of the rendered message.
    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl AccessError {
    pub fn internal(reason: impl Into<String>) -> Self {
        AccessError::Internal {
            reason: reason.into(),
        }
    }

    /// Localization key for this error.
    pub fn message_key(&self) -> &'static str {
        match self {
            AccessError::NotFound { .. } => "error.record.not_found",
            AccessError::Conflict { .. } => "error.record.conflict",
            AccessError::Validation(fault) => fault.message_key(),
            AccessError::Internal { .. } => "error.internal",
        }
    }

    /// Structured message arguments for the localizer. `Internal` exposes
    /// nothing - no stack traces, no raw store error text.
    pub fn args(&self) -> Vec<(&'static str, String)> {
        match self {
            AccessError::NotFound { entity, id } => {
                vec![("entity", entity.to_string()), ("id", id.to_string())]
            }
            AccessError::Conflict { entity, constraint } => vec![
                ("entity", entity.to_string()),
                ("constraint", constraint.clone()),
            ],
            AccessError::Validation(fault) => fault.args(),
            AccessError::Internal { .. } => vec![],
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AccessError::NotFound { .. })
    }
}

/// Result type alias used throughout the access layer.
pub type AccessResult<T> = Result<T, AccessError>;

// ============================================================================
// LOCALIZER CONTRACT
// ============================================================================

/// Message rendering contract, implemented by the boundary layer.
///
/// The access layer produces `(key, args)` pairs; rendering them into a
/// user-facing string in the request's language is the boundary's job.
pub trait Localizer: Send + Sync {
    fn translate(&self, key: &str, args: &[(&'static str, String)]) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::new_record_id;

    #[test]
    fn test_not_found_carries_entity_and_id() {
        let id = new_record_id();
        let err = AccessError::NotFound {
            entity: "article",
            id,
        };
        assert_eq!(err.message_key(), "error.record.not_found");
        let args = err.args();
        assert_eq!(args[0], ("entity", "article".to_string()));
        assert_eq!(args[1], ("id", id.to_string()));
    }

    #[test]
    fn test_internal_exposes_no_args() {
        let err = AccessError::internal("connection reset by peer");
        assert_eq!(err.message_key(), "error.internal");
        assert!(err.args().is_empty());
    }

    #[test]
    fn test_validation_fault_converts() {
        let err: AccessError = ValidationFault::CursorRejected.into();
        assert_eq!(err.message_key(), "error.validation.cursor_rejected");
    }
}
