//! PostgreSQL persistence port.
//!
//! Rows travel as `jsonb`: reads select `to_jsonb(t.*)` and deserialize
//! through serde, inserts go through `jsonb_populate_record`, and patches
//! assign only the columns present in the patch object. Every identifier
//! that reaches SQL text comes either from the entity's compile-time
//! mapping or is validated against its column list; values always bind as
//! parameters.
//!
//! Transactions are dedicated pooled connections parked in a registry
//! keyed by [`TxToken`]: `begin` issues `BEGIN` and parks the connection,
//! `commit`/`rollback` issue the terminator and return it to the pool.

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use serde_json::Value as JsonValue;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;

use plaza_core::{Filter, Record, RecordId, ScalarValue, SortOrder};
use plaza_storage::{FindOpts, ListQuery, RecordStore, StoreError, StoreResult, TxToken};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct PgConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub max_size: usize,
    pub timeout: Duration,
}

impl Default for PgConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "plaza".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl PgConfig {
    /// Create a configuration from `PLAZA_DB_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("PLAZA_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("PLAZA_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("PLAZA_DB_NAME").unwrap_or_else(|_| "plaza".to_string()),
            user: std::env::var("PLAZA_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("PLAZA_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("PLAZA_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("PLAZA_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> StoreResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Unavailable {
                reason: format!("failed to create pool: {e}"),
            })
    }
}

// ============================================================================
// ENTITY MAPPING
// ============================================================================

/// Relational mapping for a record type: table, primary key, columns, and
/// optional relation join fragments.
pub trait PgMapping: Record {
    /// Table name.
    const TABLE: &'static str;

    /// Primary key column. Defaults to the record's serialized id field.
    const PK: &'static str = Self::ID_FIELD;

    /// Every column the table has. Patch keys, filter fields and sort
    /// fields must appear here before they reach SQL text.
    const COLUMNS: &'static [&'static str];

    /// Soft-delete marker column, when the table has one.
    const SOFT_DELETE_COLUMN: Option<&'static str> = None;

    /// SQL fragment producing the jsonb for a named relation, e.g.
    /// `(SELECT jsonb_agg(to_jsonb(c.*)) FROM comments c WHERE
    /// c.article_id = t.article_id)`. A whitelisted relation without a
    /// fragment is a misconfiguration.
    fn relation_clause(_name: &str) -> Option<&'static str> {
        None
    }
}

// ============================================================================
// STORE
// ============================================================================

type SqlParam = Box<dyn ToSql + Sync + Send>;

/// PostgreSQL-backed record store.
pub struct PgRecordStore<M: PgMapping> {
    pool: Pool,
    transactions: DashMap<TxToken, Arc<deadpool_postgres::Object>>,
    _record: PhantomData<fn() -> M>,
}

enum PgConn {
    Pooled(deadpool_postgres::Object),
    Tx(Arc<deadpool_postgres::Object>),
}

impl PgConn {
    fn client(&self) -> &tokio_postgres::Client {
        match self {
            PgConn::Pooled(conn) => conn,
            PgConn::Tx(conn) => conn,
        }
    }
}

impl<M: PgMapping> PgRecordStore<M> {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            transactions: DashMap::new(),
            _record: PhantomData,
        }
    }

    pub fn from_config(config: &PgConfig) -> StoreResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    async fn conn(&self, tx: Option<TxToken>) -> StoreResult<PgConn> {
        match tx {
            Some(token) => self
                .transactions
                .get(&token)
                .map(|entry| PgConn::Tx(Arc::clone(entry.value())))
                .ok_or(StoreError::UnknownTransaction(token)),
            None => Ok(PgConn::Pooled(
                self.pool.get().await.map_err(map_pool_err)?,
            )),
        }
    }

    // ========================================================================
    // SQL CONSTRUCTION
    // ========================================================================

    /// A field may reach SQL text only if the mapping declares it.
    fn check_column(field: &str) -> StoreResult<&str> {
        if field == M::PK || M::COLUMNS.contains(&field) {
            Ok(field)
        } else {
            Err(StoreError::InvalidQuery {
                reason: format!("unknown column '{field}' for table {}", M::TABLE),
            })
        }
    }

    fn push_param(params: &mut Vec<SqlParam>, value: &ScalarValue) -> String {
        params.push(boxed_scalar(value));
        format!("${}", params.len())
    }

    /// Compile a filter tree into a parenthesized SQL predicate, binding
    /// every value as a parameter.
    fn compile_filter(filter: &Filter, params: &mut Vec<SqlParam>) -> StoreResult<String> {
        let clause = match filter {
            Filter::Eq { field, value } => {
                let field = Self::check_column(field)?;
                if value.is_null() {
                    format!("t.{field} IS NULL")
                } else {
                    let ph = Self::push_param(params, value);
                    format!("t.{field} = {ph}")
                }
            }
            Filter::Ne { field, value } => {
                let field = Self::check_column(field)?;
                if value.is_null() {
                    format!("t.{field} IS NOT NULL")
                } else {
                    let ph = Self::push_param(params, value);
                    format!("t.{field} IS DISTINCT FROM {ph}")
                }
            }
            Filter::Gt { field, value }
            | Filter::Gte { field, value }
            | Filter::Lt { field, value }
            | Filter::Lte { field, value } => {
                let field = Self::check_column(field)?;
                if value.is_null() {
                    return Err(StoreError::InvalidQuery {
                        reason: format!("range comparison on '{field}' against null"),
                    });
                }
                let op = match filter {
                    Filter::Gt { .. } => ">",
                    Filter::Gte { .. } => ">=",
                    Filter::Lt { .. } => "<",
                    _ => "<=",
                };
                let ph = Self::push_param(params, value);
                format!("t.{field} {op} {ph}")
            }
            Filter::In { field, values } => {
                let field = Self::check_column(field)?;
                let placeholders: Vec<String> = values
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(|v| Self::push_param(params, v))
                    .collect();
                if placeholders.is_empty() {
                    "FALSE".to_string()
                } else {
                    format!("t.{field} IN ({})", placeholders.join(", "))
                }
            }
            Filter::Like { field, pattern } => {
                let field = Self::check_column(field)?;
                let ph = Self::push_param(params, &ScalarValue::Text(pattern.clone()));
                format!("t.{field} LIKE {ph}")
            }
            Filter::IsNull { field } => format!("t.{} IS NULL", Self::check_column(field)?),
            Filter::NotNull { field } => format!("t.{} IS NOT NULL", Self::check_column(field)?),
            Filter::And { filters } => return Self::compile_group(filters, " AND ", "TRUE", params),
            Filter::Or { filters } => return Self::compile_group(filters, " OR ", "FALSE", params),
        };
        Ok(format!("({clause})"))
    }

    fn compile_group(
        filters: &[Filter],
        joiner: &str,
        empty: &str,
        params: &mut Vec<SqlParam>,
    ) -> StoreResult<String> {
        if filters.is_empty() {
            return Ok(empty.to_string());
        }
        let parts = filters
            .iter()
            .map(|f| Self::compile_filter(f, params))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(format!("({})", parts.join(joiner)))
    }

    fn where_clause(
        filter: Option<&Filter>,
        with_deleted: bool,
        params: &mut Vec<SqlParam>,
    ) -> StoreResult<String> {
        let mut parts = Vec::new();
        if !with_deleted {
            if let Some(col) = M::SOFT_DELETE_COLUMN {
                parts.push(format!("t.{col} IS NULL"));
            }
        }
        if let Some(filter) = filter {
            parts.push(Self::compile_filter(filter, params)?);
        }
        Ok(if parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", parts.join(" AND "))
        })
    }

    /// Order-by clause. The primary key is always the final sort key, in
    /// the direction of the primary sort, so pagination order is total.
    fn order_clause(sort: &[(String, SortOrder)]) -> StoreResult<String> {
        let mut keys = Vec::new();
        let mut saw_pk = false;
        for (field, order) in sort {
            let field = Self::check_column(field)?;
            saw_pk |= field == M::PK;
            keys.push(format!("t.{field} {}", order.as_sql()));
        }
        if !saw_pk {
            let tie_order = sort.first().map(|(_, o)| *o).unwrap_or(SortOrder::Asc);
            keys.push(format!("t.{} {}", M::PK, tie_order.as_sql()));
        }
        Ok(format!(" ORDER BY {}", keys.join(", ")))
    }

    /// Expression producing the jsonb returned for each row: the full row
    /// or a projection, extended with any requested relations.
    fn row_expr(select: &[String], relations: &[String]) -> StoreResult<String> {
        let mut expr = if select.is_empty() {
            "to_jsonb(t.*)".to_string()
        } else {
            let mut pairs = vec![format!("'{pk}', t.{pk}", pk = M::PK)];
            for field in select {
                let field = Self::check_column(field)?;
                if field != M::PK {
                    pairs.push(format!("'{field}', t.{field}"));
                }
            }
            format!("jsonb_build_object({})", pairs.join(", "))
        };

        for relation in relations {
            if !relation
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            {
                return Err(StoreError::InvalidQuery {
                    reason: format!("invalid relation name '{relation}'"),
                });
            }
            let clause = M::relation_clause(relation).ok_or_else(|| StoreError::Backend {
                reason: format!(
                    "relation '{relation}' whitelisted for {} but has no join fragment",
                    M::TABLE
                ),
            })?;
            expr = format!("{expr} || jsonb_build_object('{relation}', ({clause}))");
        }
        Ok(expr)
    }

    fn decode_row(row: &tokio_postgres::Row) -> StoreResult<M> {
        let json: JsonValue = row.try_get(0).map_err(map_pg_err)?;
        serde_json::from_value(json).map_err(|e| StoreError::Backend {
            reason: format!("row decode for {}: {e}", M::TABLE),
        })
    }

    fn param_refs(params: &[SqlParam]) -> Vec<&(dyn ToSql + Sync)> {
        params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect()
    }
}

#[async_trait]
impl<M: PgMapping> RecordStore<M> for PgRecordStore<M> {
    async fn save(&self, record: M, tx: Option<TxToken>) -> StoreResult<M> {
        let image = serde_json::to_value(&record).map_err(|e| StoreError::InvalidQuery {
            reason: format!("record image: {e}"),
        })?;
        let sql = format!(
            "INSERT INTO {table} SELECT * FROM jsonb_populate_record(NULL::{table}, $1) \
             RETURNING to_jsonb({table}.*)",
            table = M::TABLE
        );

        let conn = self.conn(tx).await?;
        let row = conn
            .client()
            .query_one(sql.as_str(), &[&image])
            .await
            .map_err(map_pg_err)?;
        Self::decode_row(&row)
    }

    async fn find_by_id(
        &self,
        id: RecordId,
        opts: &FindOpts,
        tx: Option<TxToken>,
    ) -> StoreResult<Option<M>> {
        let soft_clause = match (opts.with_deleted, M::SOFT_DELETE_COLUMN) {
            (false, Some(col)) => format!(" AND t.{col} IS NULL"),
            _ => String::new(),
        };
        let sql = format!(
            "SELECT {expr} FROM {table} t WHERE t.{pk} = $1{soft_clause}",
            expr = Self::row_expr(&opts.select, &opts.relations)?,
            table = M::TABLE,
            pk = M::PK,
        );

        let conn = self.conn(tx).await?;
        let row = conn
            .client()
            .query_opt(sql.as_str(), &[&id])
            .await
            .map_err(map_pg_err)?;
        row.as_ref().map(Self::decode_row).transpose()
    }

    async fn find_one(
        &self,
        filter: &Filter,
        opts: &FindOpts,
        tx: Option<TxToken>,
    ) -> StoreResult<Option<M>> {
        let mut params: Vec<SqlParam> = Vec::new();
        let sql = format!(
            "SELECT {expr} FROM {table} t{where_clause} ORDER BY t.{pk} ASC LIMIT 1",
            expr = Self::row_expr(&opts.select, &opts.relations)?,
            table = M::TABLE,
            where_clause = Self::where_clause(Some(filter), opts.with_deleted, &mut params)?,
            pk = M::PK,
        );

        let conn = self.conn(tx).await?;
        let row = conn
            .client()
            .query_opt(sql.as_str(), &Self::param_refs(&params))
            .await
            .map_err(map_pg_err)?;
        row.as_ref().map(Self::decode_row).transpose()
    }

    async fn find_page(
        &self,
        query: &ListQuery,
        tx: Option<TxToken>,
    ) -> StoreResult<(Vec<M>, u64)> {
        let conn = self.conn(tx).await?;

        let mut params: Vec<SqlParam> = Vec::new();
        let where_clause =
            Self::where_clause(query.filter.as_ref(), query.with_deleted, &mut params)?;
        let offset_ph = {
            params.push(Box::new(query.skip as i64));
            format!("${}", params.len())
        };
        let limit_ph = {
            params.push(Box::new(i64::from(query.take)));
            format!("${}", params.len())
        };
        let sql = format!(
            "SELECT {expr} FROM {table} t{where_clause}{order} OFFSET {offset_ph} LIMIT {limit_ph}",
            expr = Self::row_expr(&query.select, &query.relations)?,
            table = M::TABLE,
            order = Self::order_clause(&query.sort)?,
        );

        let rows = conn
            .client()
            .query(sql.as_str(), &Self::param_refs(&params))
            .await
            .map_err(map_pg_err)?;
        let records = rows
            .iter()
            .map(Self::decode_row)
            .collect::<StoreResult<Vec<_>>>()?;

        let total = if query.count {
            let mut count_params: Vec<SqlParam> = Vec::new();
            let count_where =
                Self::where_clause(query.filter.as_ref(), query.with_deleted, &mut count_params)?;
            let count_sql = format!("SELECT COUNT(*) FROM {} t{count_where}", M::TABLE);
            let row = conn
                .client()
                .query_one(&count_sql, &Self::param_refs(&count_params))
                .await
                .map_err(map_pg_err)?;
            let count: i64 = row.try_get(0).map_err(map_pg_err)?;
            count as u64
        } else {
            records.len() as u64
        };

        Ok((records, total))
    }

    async fn update_by_id(
        &self,
        id: RecordId,
        patch: &M::Patch,
        tx: Option<TxToken>,
    ) -> StoreResult<Option<M>> {
        let patch_json = serde_json::to_value(patch).map_err(|e| StoreError::InvalidQuery {
            reason: format!("patch payload: {e}"),
        })?;
        let Some(patch_obj) = patch_json.as_object() else {
            return Err(StoreError::InvalidQuery {
                reason: "patch payload is not an object".to_string(),
            });
        };

        let mut columns = Vec::new();
        for (key, value) in patch_obj {
            // The id never changes; absent optionals are not wipes; the
            // update timestamp is stamped below regardless.
            if key == M::PK || key == "updated_at" || value.is_null() {
                continue;
            }
            columns.push(Self::check_column(key)?.to_string());
        }

        let soft_clause = match M::SOFT_DELETE_COLUMN {
            Some(col) => format!(" AND t.{col} IS NULL"),
            None => String::new(),
        };
        let sql = if columns.is_empty() {
            format!(
                "UPDATE {table} t SET updated_at = NOW() WHERE t.{pk} = $1{soft_clause} \
                 RETURNING to_jsonb(t.*)",
                table = M::TABLE,
                pk = M::PK,
            )
        } else {
            let targets = columns.join(", ");
            let sources = columns
                .iter()
                .map(|c| format!("p.{c}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "UPDATE {table} t SET ({targets}) = \
                 (SELECT {sources} FROM jsonb_populate_record(NULL::{table}, $2) p), \
                 updated_at = NOW() WHERE t.{pk} = $1{soft_clause} RETURNING to_jsonb(t.*)",
                table = M::TABLE,
                pk = M::PK,
            )
        };

        let conn = self.conn(tx).await?;
        let row = if columns.is_empty() {
            conn.client().query_opt(sql.as_str(), &[&id]).await
        } else {
            conn.client().query_opt(sql.as_str(), &[&id, &patch_json]).await
        }
        .map_err(map_pg_err)?;
        row.as_ref().map(Self::decode_row).transpose()
    }

    async fn delete_by_id(&self, id: RecordId, tx: Option<TxToken>) -> StoreResult<bool> {
        let sql = format!("DELETE FROM {} WHERE {} = $1", M::TABLE, M::PK);
        let conn = self.conn(tx).await?;
        let affected = conn
            .client()
            .execute(sql.as_str(), &[&id])
            .await
            .map_err(map_pg_err)?;
        Ok(affected > 0)
    }

    async fn soft_delete_by_id(&self, id: RecordId, tx: Option<TxToken>) -> StoreResult<bool> {
        let Some(col) = M::SOFT_DELETE_COLUMN else {
            return Ok(false);
        };
        let sql = format!(
            "UPDATE {table} SET {col} = NOW(), updated_at = NOW() \
             WHERE {pk} = $1 AND {col} IS NULL",
            table = M::TABLE,
            pk = M::PK,
        );
        let conn = self.conn(tx).await?;
        let affected = conn
            .client()
            .execute(sql.as_str(), &[&id])
            .await
            .map_err(map_pg_err)?;
        Ok(affected > 0)
    }

    async fn restore_by_id(&self, id: RecordId, tx: Option<TxToken>) -> StoreResult<bool> {
        let Some(col) = M::SOFT_DELETE_COLUMN else {
            return Ok(false);
        };
        let sql = format!(
            "UPDATE {table} SET {col} = NULL, updated_at = NOW() \
             WHERE {pk} = $1 AND {col} IS NOT NULL",
            table = M::TABLE,
            pk = M::PK,
        );
        let conn = self.conn(tx).await?;
        let affected = conn
            .client()
            .execute(sql.as_str(), &[&id])
            .await
            .map_err(map_pg_err)?;
        Ok(affected > 0)
    }

    async fn begin(&self) -> StoreResult<TxToken> {
        let conn = self.pool.get().await.map_err(map_pool_err)?;
        conn.batch_execute("BEGIN").await.map_err(map_pg_err)?;

        let token = TxToken::new();
        self.transactions.insert(token, Arc::new(conn));
        tracing::debug!(table = M::TABLE, tx = %token, "transaction opened");
        Ok(token)
    }

    async fn commit(&self, tx: TxToken) -> StoreResult<()> {
        let (_, conn) = self
            .transactions
            .remove(&tx)
            .ok_or(StoreError::UnknownTransaction(tx))?;
        conn.batch_execute("COMMIT").await.map_err(map_pg_err)?;
        tracing::debug!(table = M::TABLE, tx = %tx, "transaction committed");
        Ok(())
    }

    async fn rollback(&self, tx: TxToken) -> StoreResult<()> {
        let (_, conn) = self
            .transactions
            .remove(&tx)
            .ok_or(StoreError::UnknownTransaction(tx))?;
        conn.batch_execute("ROLLBACK").await.map_err(map_pg_err)?;
        tracing::debug!(table = M::TABLE, tx = %tx, "transaction rolled back");
        Ok(())
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn boxed_scalar(value: &ScalarValue) -> SqlParam {
    match value {
        ScalarValue::Text(s) => Box::new(s.clone()),
        ScalarValue::Int(i) => Box::new(*i),
        ScalarValue::Float(f) => Box::new(*f),
        ScalarValue::Bool(b) => Box::new(*b),
        ScalarValue::Uuid(id) => Box::new(*id),
        ScalarValue::Timestamp(ts) => Box::new(*ts),
        ScalarValue::Null => Box::new(Option::<String>::None),
    }
}

/// Map a driver error. Constraint violations become typed conflicts; the
/// raw error text stays in the logs, never in the returned reason.
fn map_pg_err(err: tokio_postgres::Error) -> StoreError {
    if let Some(db) = err.as_db_error() {
        if db.code() == &SqlState::UNIQUE_VIOLATION
            || db.code() == &SqlState::FOREIGN_KEY_VIOLATION
        {
            return StoreError::Conflict {
                constraint: db.constraint().unwrap_or("unknown").to_string(),
            };
        }
        if db.code() == &SqlState::UNDEFINED_COLUMN || db.code() == &SqlState::UNDEFINED_TABLE {
            return StoreError::InvalidQuery {
                reason: db.message().to_string(),
            };
        }
    }
    if err.is_closed() {
        return StoreError::Unavailable {
            reason: "connection closed".to_string(),
        };
    }
    tracing::error!(error = %err, "database error");
    StoreError::Backend {
        reason: "database operation failed".to_string(),
    }
}

fn map_pool_err(err: deadpool_postgres::PoolError) -> StoreError {
    tracing::error!(error = %err, "connection pool error");
    match err {
        deadpool_postgres::PoolError::Timeout(_) => StoreError::Unavailable {
            reason: "connection pool exhausted".to_string(),
        },
        deadpool_postgres::PoolError::Closed => StoreError::Unavailable {
            reason: "connection pool is closed".to_string(),
        },
        _ => StoreError::Unavailable {
            reason: "failed to acquire database connection".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Post {
        post_id: RecordId,
        title: String,
        views: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        deleted_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize)]
    struct PostDraft {
        title: String,
    }

    #[derive(Debug, Serialize)]
    struct PostPatch {
        title: Option<String>,
    }

    impl Record for Post {
        const NAME: &'static str = "post";
        const ID_FIELD: &'static str = "post_id";
        type Draft = PostDraft;
        type Patch = PostPatch;

        fn from_draft(draft: PostDraft, id: RecordId, now: DateTime<Utc>) -> Self {
            Self {
                post_id: id,
                title: draft.title,
                views: 0,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            }
        }

        fn id(&self) -> RecordId {
            self.post_id
        }
        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }
        fn updated_at(&self) -> DateTime<Utc> {
            self.updated_at
        }
        fn deleted_at(&self) -> Option<DateTime<Utc>> {
            self.deleted_at
        }
    }

    impl PgMapping for Post {
        const TABLE: &'static str = "posts";
        const COLUMNS: &'static [&'static str] =
            &["post_id", "title", "views", "created_at", "updated_at", "deleted_at"];
        const SOFT_DELETE_COLUMN: Option<&'static str> = Some("deleted_at");
    }

    type Store = PgRecordStore<Post>;

    #[test]
    fn test_compile_filter_binds_values() {
        let filter = Filter::And {
            filters: vec![
                Filter::Eq {
                    field: "title".to_string(),
                    value: ScalarValue::Text("hello".to_string()),
                },
                Filter::Gt {
                    field: "views".to_string(),
                    value: ScalarValue::Int(10),
                },
            ],
        };
        let mut params = Vec::new();
        let sql = Store::compile_filter(&filter, &mut params).unwrap();
        assert_eq!(sql, "((t.title = $1) AND (t.views > $2))");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_compile_filter_rejects_unknown_column() {
        let filter = Filter::Eq {
            field: "password; DROP TABLE posts".to_string(),
            value: ScalarValue::Text("x".to_string()),
        };
        let mut params = Vec::new();
        assert!(matches!(
            Store::compile_filter(&filter, &mut params),
            Err(StoreError::InvalidQuery { .. })
        ));
    }

    #[test]
    fn test_null_eq_compiles_to_is_null() {
        let filter = Filter::Eq {
            field: "deleted_at".to_string(),
            value: ScalarValue::Null,
        };
        let mut params = Vec::new();
        let sql = Store::compile_filter(&filter, &mut params).unwrap();
        assert_eq!(sql, "(t.deleted_at IS NULL)");
        assert!(params.is_empty());
    }

    #[test]
    fn test_empty_in_is_false() {
        let filter = Filter::In {
            field: "views".to_string(),
            values: vec![],
        };
        let mut params = Vec::new();
        assert_eq!(Store::compile_filter(&filter, &mut params).unwrap(), "(FALSE)");
    }

    #[test]
    fn test_order_clause_appends_pk_tiebreak() {
        let sort = vec![("created_at".to_string(), SortOrder::Desc)];
        let clause = Store::order_clause(&sort).unwrap();
        assert_eq!(clause, " ORDER BY t.created_at DESC, t.post_id DESC");
    }

    #[test]
    fn test_order_clause_skips_tiebreak_when_sorting_by_pk() {
        let sort = vec![("post_id".to_string(), SortOrder::Asc)];
        let clause = Store::order_clause(&sort).unwrap();
        assert_eq!(clause, " ORDER BY t.post_id ASC");
    }

    #[test]
    fn test_where_clause_excludes_soft_deleted_by_default() {
        let mut params = Vec::new();
        let clause = Store::where_clause(None, false, &mut params).unwrap();
        assert_eq!(clause, " WHERE t.deleted_at IS NULL");

        let with_deleted = Store::where_clause(None, true, &mut params).unwrap();
        assert_eq!(with_deleted, "");
    }

    #[test]
    fn test_row_expr_projection_always_includes_pk() {
        let expr = Store::row_expr(&["title".to_string()], &[]).unwrap();
        assert_eq!(expr, "jsonb_build_object('post_id', t.post_id, 'title', t.title)");
    }

    #[test]
    fn test_row_expr_unconfigured_relation_is_backend_error() {
        let err = Store::row_expr(&[], &["comments".to_string()]).unwrap_err();
        assert!(matches!(err, StoreError::Backend { .. }));
    }
}
