//! In-memory persistence port.
//!
//! Backs the access layer in tests and single-process tooling. Rows live in
//! a `BTreeMap` keyed by id; filters are evaluated against each row's JSON
//! image, so the same [`Filter`] tree the PostgreSQL adapter compiles to
//! SQL runs here unchanged. Ordering always ends on the id, in the
//! direction of the primary sort, so page boundaries are stable even when
//! the sort field has duplicate values.
//!
//! Transactions are snapshot-based: `begin` captures the whole map,
//! `rollback` restores it. One transaction at a time; interleaved handles
//! are not supported (this is a test store, mirroring the scope of the
//! mock storage it is modeled on).

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, RwLock};

use plaza_core::{Filter, Record, RecordId, ScalarValue, SortOrder};

use crate::port::{FindOpts, ListQuery, RecordStore, StoreError, StoreResult, TxToken};

/// In-memory record store.
pub struct MemoryRecordStore<R: Record> {
    rows: Arc<RwLock<BTreeMap<RecordId, R>>>,
    snapshots: Arc<Mutex<HashMap<TxToken, BTreeMap<RecordId, R>>>>,
    query_count: Arc<AtomicU64>,
}

impl<R: Record> Default for MemoryRecordStore<R> {
    fn default() -> Self {
        Self {
            rows: Arc::new(RwLock::new(BTreeMap::new())),
            snapshots: Arc::new(Mutex::new(HashMap::new())),
            query_count: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<R: Record> Clone for MemoryRecordStore<R> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            snapshots: Arc::clone(&self.snapshots),
            query_count: Arc::clone(&self.query_count),
        }
    }
}

impl<R: Record> MemoryRecordStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows, soft-deleted included.
    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many port operations have reached the backing map. Lets tests
    /// prove that a rejected request never executed a query.
    pub fn query_count(&self) -> u64 {
        self.query_count.load(AtomicOrdering::Relaxed)
    }

    fn touch(&self) {
        self.query_count.fetch_add(1, AtomicOrdering::Relaxed);
    }

    fn read_rows(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, BTreeMap<RecordId, R>>> {
        self.rows.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write_rows(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, BTreeMap<RecordId, R>>> {
        self.rows.write().map_err(|_| StoreError::LockPoisoned)
    }

    fn image(record: &R) -> StoreResult<JsonValue> {
        serde_json::to_value(record).map_err(|e| StoreError::Backend {
            reason: format!("row image: {e}"),
        })
    }

    /// Rewrite one row through its JSON image.
    fn mutate_image(
        &self,
        id: RecordId,
        visible_only: bool,
        apply: impl FnOnce(&mut serde_json::Map<String, JsonValue>),
    ) -> StoreResult<Option<R>> {
        let mut rows = self.write_rows()?;
        let Some(existing) = rows.get(&id) else {
            return Ok(None);
        };
        if visible_only && existing.deleted_at().is_some() {
            return Ok(None);
        }

        let mut image = Self::image(existing)?;
        let Some(obj) = image.as_object_mut() else {
            return Err(StoreError::Backend {
                reason: "record image is not an object".to_string(),
            });
        };
        apply(obj);

        let updated: R = serde_json::from_value(image).map_err(|e| StoreError::InvalidQuery {
            reason: format!("patch produced an undecodable row: {e}"),
        })?;
        rows.insert(id, updated.clone());
        Ok(Some(updated))
    }

    fn visible(record: &R, with_deleted: bool) -> bool {
        with_deleted || record.deleted_at().is_none()
    }

    /// Filter, sort and window in one pass over the row images.
    fn select_rows(&self, query: &ListQuery) -> StoreResult<(Vec<R>, u64)> {
        let rows = self.read_rows()?;
        let mut matched: Vec<(JsonValue, R)> = Vec::new();
        for record in rows.values() {
            if !Self::visible(record, query.with_deleted) {
                continue;
            }
            let image = Self::image(record)?;
            let keep = match &query.filter {
                Some(filter) => eval_filter(filter, &image),
                None => true,
            };
            if keep {
                matched.push((image, record.clone()));
            }
        }
        drop(rows);

        let tie_order = query
            .sort
            .first()
            .map(|(_, order)| *order)
            .unwrap_or(SortOrder::Asc);
        matched.sort_by(|(a, ra), (b, rb)| {
            for (field, order) in &query.sort {
                let ord = cmp_field(a, b, field);
                let ord = match order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            let ids = ra.id().cmp(&rb.id());
            match tie_order {
                SortOrder::Asc => ids,
                SortOrder::Desc => ids.reverse(),
            }
        });

        let total = matched.len() as u64;
        let windowed = matched
            .into_iter()
            .map(|(_, record)| record)
            .skip(query.skip as usize)
            .take(query.take as usize)
            .collect();
        Ok((windowed, total))
    }
}

#[async_trait]
impl<R: Record> RecordStore<R> for MemoryRecordStore<R> {
    async fn save(&self, record: R, _tx: Option<TxToken>) -> StoreResult<R> {
        self.touch();
        let mut rows = self.write_rows()?;
        if rows.contains_key(&record.id()) {
            return Err(StoreError::Conflict {
                constraint: format!("{}_pkey", R::NAME),
            });
        }
        rows.insert(record.id(), record.clone());
        Ok(record)
    }

    async fn find_by_id(
        &self,
        id: RecordId,
        opts: &FindOpts,
        _tx: Option<TxToken>,
    ) -> StoreResult<Option<R>> {
        self.touch();
        let rows = self.read_rows()?;
        Ok(rows
            .get(&id)
            .filter(|record| Self::visible(record, opts.with_deleted))
            .cloned())
    }

    async fn find_one(
        &self,
        filter: &Filter,
        opts: &FindOpts,
        _tx: Option<TxToken>,
    ) -> StoreResult<Option<R>> {
        self.touch();
        let rows = self.read_rows()?;
        for record in rows.values() {
            if !Self::visible(record, opts.with_deleted) {
                continue;
            }
            if eval_filter(filter, &Self::image(record)?) {
                return Ok(Some(record.clone()));
            }
        }
        Ok(None)
    }

    async fn find_page(
        &self,
        query: &ListQuery,
        _tx: Option<TxToken>,
    ) -> StoreResult<(Vec<R>, u64)> {
        self.touch();
        self.select_rows(query)
    }

    async fn update_by_id(
        &self,
        id: RecordId,
        patch: &R::Patch,
        _tx: Option<TxToken>,
    ) -> StoreResult<Option<R>> {
        self.touch();
        let patch_json = serde_json::to_value(patch).map_err(|e| StoreError::InvalidQuery {
            reason: format!("patch payload: {e}"),
        })?;
        let Some(patch_obj) = patch_json.as_object().cloned() else {
            return Err(StoreError::InvalidQuery {
                reason: "patch payload is not an object".to_string(),
            });
        };
        let now = chrono::Utc::now();
        self.mutate_image(id, true, move |obj| {
            for (key, value) in patch_obj {
                // The id never changes, and absent optionals are not wipes.
                if key == R::ID_FIELD || value.is_null() {
                    continue;
                }
                obj.insert(key, value);
            }
            obj.insert(
                "updated_at".to_string(),
                JsonValue::String(now.to_rfc3339()),
            );
        })
    }

    async fn delete_by_id(&self, id: RecordId, _tx: Option<TxToken>) -> StoreResult<bool> {
        self.touch();
        let mut rows = self.write_rows()?;
        Ok(rows.remove(&id).is_some())
    }

    async fn soft_delete_by_id(&self, id: RecordId, _tx: Option<TxToken>) -> StoreResult<bool> {
        self.touch();
        let now = chrono::Utc::now();
        let marked = self.mutate_image(id, true, move |obj| {
            obj.insert(
                "deleted_at".to_string(),
                JsonValue::String(now.to_rfc3339()),
            );
        })?;
        // A record type without the field deserializes unchanged; that is
        // the no-op case, not a successful mark.
        Ok(marked.is_some_and(|r| r.deleted_at().is_some()))
    }

    async fn restore_by_id(&self, id: RecordId, _tx: Option<TxToken>) -> StoreResult<bool> {
        self.touch();
        let was_deleted = {
            let rows = self.read_rows()?;
            rows.get(&id).map(|r| r.deleted_at().is_some())
        };
        if was_deleted != Some(true) {
            return Ok(false);
        }
        let restored = self.mutate_image(id, false, |obj| {
            obj.insert("deleted_at".to_string(), JsonValue::Null);
        })?;
        Ok(restored.is_some())
    }

    async fn begin(&self) -> StoreResult<TxToken> {
        let token = TxToken::new();
        let snapshot = self.read_rows()?.clone();
        self.snapshots
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?
            .insert(token, snapshot);
        Ok(token)
    }

    async fn commit(&self, tx: TxToken) -> StoreResult<()> {
        self.snapshots
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?
            .remove(&tx)
            .map(|_| ())
            .ok_or(StoreError::UnknownTransaction(tx))
    }

    async fn rollback(&self, tx: TxToken) -> StoreResult<()> {
        let snapshot = self
            .snapshots
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?
            .remove(&tx)
            .ok_or(StoreError::UnknownTransaction(tx))?;
        *self.write_rows()? = snapshot;
        Ok(())
    }
}

// ============================================================================
// FILTER EVALUATION OVER JSON IMAGES
// ============================================================================

fn field_scalar(row: &JsonValue, field: &str) -> ScalarValue {
    row.get(field)
        .and_then(ScalarValue::from_json)
        .unwrap_or(ScalarValue::Null)
}

fn cmp_field(a: &JsonValue, b: &JsonValue, field: &str) -> Ordering {
    let (fa, fb) = (field_scalar(a, field), field_scalar(b, field));
    match (fa.is_null(), fb.is_null()) {
        // Nulls sort last in ascending order.
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => fa.compare(&fb).unwrap_or(Ordering::Equal),
    }
}

fn scalar_eq(actual: &ScalarValue, expected: &ScalarValue) -> bool {
    if expected.is_null() {
        return actual.is_null();
    }
    actual.compare(expected) == Some(Ordering::Equal)
}

/// Evaluate a filter tree against one row image.
pub(crate) fn eval_filter(filter: &Filter, row: &JsonValue) -> bool {
    match filter {
        Filter::Eq { field, value } => scalar_eq(&field_scalar(row, field), value),
        Filter::Ne { field, value } => !scalar_eq(&field_scalar(row, field), value),
        Filter::Gt { field, value } => {
            field_scalar(row, field).compare(value) == Some(Ordering::Greater)
        }
        Filter::Gte { field, value } => matches!(
            field_scalar(row, field).compare(value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Filter::Lt { field, value } => {
            field_scalar(row, field).compare(value) == Some(Ordering::Less)
        }
        Filter::Lte { field, value } => matches!(
            field_scalar(row, field).compare(value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Filter::In { field, values } => {
            let actual = field_scalar(row, field);
            values.iter().any(|v| scalar_eq(&actual, v))
        }
        Filter::Like { field, pattern } => match field_scalar(row, field) {
            ScalarValue::Text(text) => like_match(pattern, &text),
            _ => false,
        },
        Filter::IsNull { field } => field_scalar(row, field).is_null(),
        Filter::NotNull { field } => !field_scalar(row, field).is_null(),
        Filter::And { filters } => filters.iter().all(|f| eval_filter(f, row)),
        Filter::Or { filters } => filters.iter().any(|f| eval_filter(f, row)),
    }
}

/// SQL LIKE semantics: `%` matches any run, `_` matches one character.
fn like_match(pattern: &str, text: &str) -> bool {
    fn inner(p: &[u8], t: &[u8]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some(b'%'), _) => inner(&p[1..], t) || (!t.is_empty() && inner(p, &t[1..])),
            (Some(b'_'), Some(_)) => inner(&p[1..], &t[1..]),
            (Some(pc), Some(tc)) if pc == tc => inner(&p[1..], &t[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_like_match() {
        assert!(like_match("%rust%", "idiomatic rust code"));
        assert!(like_match("r_st", "rust"));
        assert!(!like_match("rust", "trust"));
        assert!(like_match("%", ""));
    }

    #[test]
    fn test_eval_comparisons() {
        let row = json!({ "views": 12, "title": "hello", "archived_at": null });
        let gt = Filter::Gt {
            field: "views".to_string(),
            value: ScalarValue::Int(10),
        };
        assert!(eval_filter(&gt, &row));

        let is_null = Filter::IsNull {
            field: "archived_at".to_string(),
        };
        assert!(eval_filter(&is_null, &row));

        let and = Filter::And {
            filters: vec![
                gt,
                Filter::Like {
                    field: "title".to_string(),
                    pattern: "hel%".to_string(),
                },
            ],
        };
        assert!(eval_filter(&and, &row));
    }

    #[test]
    fn test_missing_field_is_null() {
        let row = json!({ "a": 1 });
        assert!(eval_filter(
            &Filter::IsNull {
                field: "missing".to_string()
            },
            &row
        ));
    }
}
