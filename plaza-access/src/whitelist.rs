//! Per-entity access whitelist.
//!
//! Caller-requested relations, projected fields, filter fields and sort
//! keys are checked against sets the owning feature configures up front.
//! Anything outside the whitelist is a validation error raised before any
//! query executes, so client-controlled input can never pull in sensitive
//! relations or fan out across unbounded relation graphs.
//!
//! The default is empty, which rejects every caller-supplied relation,
//! projection and filter. Internal predicates built by the facade itself
//! (soft-delete exclusion, keyset windows) do not pass through here.

use std::collections::HashSet;

use plaza_core::{AccessResult, Filter, ValidationFault};

/// Allowed relations, fields and sort keys for one entity.
#[derive(Debug, Clone, Default)]
pub struct AccessWhitelist {
    relations: HashSet<String>,
    fields: HashSet<String>,
    sortable: HashSet<String>,
}

impl AccessWhitelist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_relations<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relations.extend(relations.into_iter().map(Into::into));
        self
    }

    pub fn allow_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn allow_sortable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sortable.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn validate_relations(&self, entity: &'static str, requested: &[String]) -> AccessResult<()> {
        for relation in requested {
            if !self.relations.contains(relation) {
                return Err(ValidationFault::RelationNotAllowed {
                    entity,
                    relation: relation.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    pub fn validate_select(&self, entity: &'static str, requested: &[String]) -> AccessResult<()> {
        for field in requested {
            if !self.fields.contains(field) {
                return Err(ValidationFault::FieldNotAllowed {
                    entity,
                    field: field.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    pub fn validate_sort(&self, entity: &'static str, field: &str) -> AccessResult<()> {
        if !self.sortable.contains(field) {
            return Err(ValidationFault::SortNotAllowed {
                entity,
                field: field.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Every field referenced by a caller-supplied filter must be allowed.
    pub fn validate_filter(&self, entity: &'static str, filter: &Filter) -> AccessResult<()> {
        for field in filter.fields() {
            if !self.fields.contains(field) {
                return Err(ValidationFault::FieldNotAllowed {
                    entity,
                    field: field.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}
