//! The generic entity-access facade.
//!
//! One `EntityAccess` instance serves one entity type. Reads go through
//! the cache-aside coordinator; every successful mutation invalidates the
//! record's id-key and the entity's whole list-cache namespace, then runs
//! the feature's lifecycle hooks. Persistence failures are translated into
//! the access-layer taxonomy exactly once, here.

use std::marker::PhantomData;
use std::sync::Arc;

use plaza_core::{
    AccessError, AccessResult, CursorMeta, CursorPage, CursorQuery, CursorToken, Filter,
    OffsetPage, OffsetQuery, PageMeta, Record, RecordId, ValidationFault,
};
use plaza_storage::{
    id_key, CacheAside, CacheStore, FindOpts, ListQuery, QueryShape, QueryWindow, RecordStore,
    StoreError,
};

use crate::config::{AccessConfig, CursorMode};
use crate::ctx::OpCtx;
use crate::cursor::{decode_plain, decode_signed, encode_plain, encode_signed};
use crate::hooks::{LifecycleHooks, NoHooks};
use crate::paginate::{clamp_page_inputs, token_from_row, window_filter};

/// Cache-aside CRUD facade over one record type.
pub struct EntityAccess<R, S, C>
where
    R: Record,
    S: RecordStore<R>,
    C: CacheStore,
{
    store: Arc<S>,
    cache: CacheAside<C>,
    hooks: Arc<dyn LifecycleHooks<R>>,
    config: AccessConfig,
    _record: PhantomData<fn() -> R>,
}

impl<R, S, C> Clone for EntityAccess<R, S, C>
where
    R: Record,
    S: RecordStore<R>,
    C: CacheStore,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: self.cache.clone(),
            hooks: Arc::clone(&self.hooks),
            config: self.config.clone(),
            _record: PhantomData,
        }
    }
}

impl<R, S, C> EntityAccess<R, S, C>
where
    R: Record,
    S: RecordStore<R>,
    C: CacheStore,
{
    pub fn new(store: Arc<S>, cache: Arc<C>, config: AccessConfig) -> Self {
        Self {
            store,
            cache: CacheAside::new(cache),
            hooks: Arc::new(NoHooks),
            config,
            _record: PhantomData,
        }
    }

    /// Install feature-supplied lifecycle hooks.
    pub fn with_hooks(mut self, hooks: Arc<dyn LifecycleHooks<R>>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Translate a port failure. The single boundary where `StoreError`
    /// becomes part of the access taxonomy.
    fn translate(&self, err: StoreError) -> AccessError {
        match err {
            StoreError::Conflict { constraint } => AccessError::Conflict {
                entity: R::NAME,
                constraint,
            },
            StoreError::InvalidQuery { reason } => ValidationFault::InvalidValue {
                field: "query",
                reason,
            }
            .into(),
            other => {
                tracing::error!(entity = R::NAME, error = %other, "persistence failure");
                AccessError::internal(other.to_string())
            }
        }
    }

    fn not_found(&self, id: RecordId) -> AccessError {
        AccessError::NotFound {
            entity: R::NAME,
            id,
        }
    }

    /// Point lookups are cached only in their default shape; projections,
    /// relation hydration and deleted-row peeks go straight to the store.
    fn point_cacheable(&self, opts: &FindOpts, ctx: &OpCtx) -> bool {
        ctx.tx.is_none()
            && opts.relations.is_empty()
            && opts.select.is_empty()
            && !opts.with_deleted
    }

    fn validate_opts(&self, opts: &FindOpts) -> AccessResult<()> {
        let whitelist = &self.config.whitelist;
        whitelist.validate_relations(R::NAME, &opts.relations)?;
        whitelist.validate_select(R::NAME, &opts.select)?;
        Ok(())
    }

    // ========================================================================
    // CREATE
    // ========================================================================

    pub async fn create(&self, draft: R::Draft, ctx: &OpCtx) -> AccessResult<R> {
        let mut draft = draft;
        self.hooks.before_create(&mut draft, ctx).await?;

        let record = self.store.build(draft);
        let saved = self
            .store
            .save(record, ctx.tx)
            .await
            .map_err(|e| self.translate(e))?;

        self.cache.invalidate(&self.config.cache_prefix, saved.id()).await;
        self.hooks.after_create(&saved, ctx).await?;
        Ok(saved)
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Fetch one record, failing `NotFound` when it is absent or excluded
    /// by the soft-delete filter.
    pub async fn find_by_id(&self, id: RecordId, opts: &FindOpts, ctx: &OpCtx) -> AccessResult<R> {
        self.validate_opts(opts)?;

        let found = if self.point_cacheable(opts, ctx) {
            let key = id_key(&self.config.cache_prefix, id);
            self.cache
                .read_through(&key, self.config.cache_ttl, || async {
                    self.store.find_by_id(id, opts, None).await
                })
                .await
                .map_err(|e| self.translate(e))?
        } else {
            self.store
                .find_by_id(id, opts, ctx.tx)
                .await
                .map_err(|e| self.translate(e))?
        };

        found.ok_or_else(|| self.not_found(id))
    }

    /// First record matching a filter, or `None`. Not cached: arbitrary
    /// predicates have no stable point key.
    pub async fn find_one(
        &self,
        filter: &Filter,
        opts: &FindOpts,
        ctx: &OpCtx,
    ) -> AccessResult<Option<R>> {
        self.config.whitelist.validate_filter(R::NAME, filter)?;
        self.validate_opts(opts)?;

        self.store
            .find_one(filter, opts, ctx.tx)
            .await
            .map_err(|e| self.translate(e))
    }

    // ========================================================================
    // OFFSET PAGINATION
    // ========================================================================

    pub async fn list_offset(
        &self,
        query: &OffsetQuery,
        extra_filter: Option<Filter>,
        opts: &FindOpts,
        ctx: &OpCtx,
    ) -> AccessResult<OffsetPage<R>> {
        self.config.whitelist.validate_sort(R::NAME, &query.sort_by)?;
        if let Some(filter) = &extra_filter {
            self.config.whitelist.validate_filter(R::NAME, filter)?;
        }
        self.validate_opts(opts)?;
        let (page, limit) = clamp_page_inputs(query.page, query.limit, &self.config)?;

        let mut list_query = ListQuery {
            filter: extra_filter,
            sort: vec![(query.sort_by.clone(), query.order)],
            skip: u64::from(page - 1) * u64::from(limit),
            take: limit,
            with_deleted: opts.with_deleted,
            relations: opts.relations.clone(),
            select: opts.select.clone(),
            count: true,
        };
        self.hooks.on_list_query(&mut list_query, ctx).await?;

        let shape = self.shape_of(&list_query, QueryWindow::Offset { page, limit });
        let cache_key = self
            .cache
            .list_key_for(&self.config.cache_prefix, &shape);

        if ctx.tx.is_none() {
            if let Some(cached) = self.cache.get_json::<OffsetPage<R>>(&cache_key).await {
                return Ok(cached);
            }
        }

        let (rows, total) = self
            .store
            .find_page(&list_query, ctx.tx)
            .await
            .map_err(|e| self.translate(e))?;
        let result = OffsetPage {
            rows,
            meta: PageMeta::compute(page, limit, total),
        };

        if ctx.tx.is_none() {
            self.cache
                .put_json(&cache_key, &result, self.config.cache_ttl)
                .await;
        }
        Ok(result)
    }

    // ========================================================================
    // KEYSET PAGINATION
    // ========================================================================

    pub async fn list_cursor(
        &self,
        query: &CursorQuery,
        extra_filter: Option<Filter>,
        opts: &FindOpts,
        ctx: &OpCtx,
    ) -> AccessResult<CursorPage<R>> {
        self.config.whitelist.validate_sort(R::NAME, &query.sort_by)?;
        if let Some(filter) = &extra_filter {
            self.config.whitelist.validate_filter(R::NAME, filter)?;
        }
        self.validate_opts(opts)?;
        let (_, limit) = clamp_page_inputs(1, query.limit, &self.config)?;

        let anchor = self.decode_cursor(query)?;
        let window = anchor
            .as_ref()
            .map(|token| window_filter(token, R::ID_FIELD));

        let mut list_query = ListQuery {
            filter: Filter::merge(extra_filter, window),
            sort: vec![(query.sort_by.clone(), query.order)],
            skip: 0,
            take: limit,
            with_deleted: opts.with_deleted,
            relations: opts.relations.clone(),
            select: opts.select.clone(),
            count: false,
        };
        self.hooks.on_list_query(&mut list_query, ctx).await?;

        let shape = self.shape_of(
            &list_query,
            QueryWindow::Cursor {
                anchor: anchor.clone(),
                limit,
            },
        );
        let cache_key = self
            .cache
            .list_key_for(&self.config.cache_prefix, &shape);

        if ctx.tx.is_none() {
            if let Some(cached) = self.cache.get_json::<CursorPage<R>>(&cache_key).await {
                return Ok(cached);
            }
        }

        let (rows, _) = self
            .store
            .find_page(&list_query, ctx.tx)
            .await
            .map_err(|e| self.translate(e))?;

        let next_cursor = match rows.last() {
            Some(last) if rows.len() == limit as usize => {
                Some(self.encode_cursor(&token_from_row(last, &query.sort_by, query.order)?)?)
            }
            _ => None,
        };
        let prev_cursor = match rows.first() {
            Some(first) => {
                Some(self.encode_cursor(&token_from_row(first, &query.sort_by, query.order)?)?)
            }
            None => None,
        };

        let result = CursorPage {
            rows,
            meta: CursorMeta {
                next_cursor,
                prev_cursor,
                take: limit,
                sort_by: query.sort_by.clone(),
                order: query.order,
            },
        };

        if ctx.tx.is_none() {
            self.cache
                .put_json(&cache_key, &result, self.config.cache_ttl)
                .await;
        }
        Ok(result)
    }

    /// Decode the incoming cursor per the configured mode. Plain cursors
    /// degrade to "first page" on any malformation or sort mismatch;
    /// signed cursors are rejected.
    fn decode_cursor(&self, query: &CursorQuery) -> AccessResult<Option<CursorToken>> {
        let Some(encoded) = query.cursor.as_deref() else {
            return Ok(None);
        };
        match &self.config.cursor_mode {
            CursorMode::Plain => Ok(decode_plain(encoded)
                .filter(|token| token.matches(&query.sort_by, query.order))),
            CursorMode::Signed(key) => {
                let token = decode_signed(encoded, key)?;
                if !token.matches(&query.sort_by, query.order) {
                    return Err(ValidationFault::InvalidValue {
                        field: "cursor",
                        reason: "cursor was issued for a different sort".to_string(),
                    }
                    .into());
                }
                Ok(Some(token))
            }
        }
    }

    fn encode_cursor(&self, token: &CursorToken) -> AccessResult<String> {
        match &self.config.cursor_mode {
            CursorMode::Plain => encode_plain(token),
            CursorMode::Signed(key) => encode_signed(token, key),
        }
    }

    fn shape_of(&self, query: &ListQuery, window: QueryWindow) -> QueryShape {
        let (sort_by, order) = query
            .sort
            .first()
            .cloned()
            .unwrap_or_else(|| self.config.default_sort.clone());
        QueryShape {
            entity: R::NAME.to_string(),
            filter: query.filter.clone(),
            sort_by,
            order,
            window,
            with_deleted: query.with_deleted,
            relations: query.relations.clone(),
            select: query.select.clone(),
        }
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    pub async fn update(&self, id: RecordId, patch: R::Patch, ctx: &OpCtx) -> AccessResult<R> {
        let mut patch = patch;
        self.hooks.before_update(id, &mut patch, ctx).await?;

        let updated = self
            .store
            .update_by_id(id, &patch, ctx.tx)
            .await
            .map_err(|e| self.translate(e))?
            .ok_or_else(|| self.not_found(id))?;

        self.cache.invalidate(&self.config.cache_prefix, id).await;
        self.hooks.after_update(&updated, ctx).await?;
        Ok(updated)
    }

    /// Hard delete.
    pub async fn remove(&self, id: RecordId, ctx: &OpCtx) -> AccessResult<()> {
        self.hooks.before_delete(id, ctx).await?;

        let removed = self
            .store
            .delete_by_id(id, ctx.tx)
            .await
            .map_err(|e| self.translate(e))?;
        if !removed {
            return Err(self.not_found(id));
        }

        self.cache.invalidate(&self.config.cache_prefix, id).await;
        self.hooks.after_delete(id, ctx).await?;
        Ok(())
    }

    /// Soft delete. On an entity type configured without soft-delete
    /// support this is exactly a hard delete.
    pub async fn soft_delete(&self, id: RecordId, ctx: &OpCtx) -> AccessResult<()> {
        if !self.config.soft_delete {
            return self.remove(id, ctx).await;
        }

        self.hooks.before_delete(id, ctx).await?;

        let marked = self
            .store
            .soft_delete_by_id(id, ctx.tx)
            .await
            .map_err(|e| self.translate(e))?;
        if !marked {
            return Err(self.not_found(id));
        }

        self.cache.invalidate(&self.config.cache_prefix, id).await;
        self.hooks.after_delete(id, ctx).await?;
        Ok(())
    }

    /// Clear the soft-delete marker. A no-op for entity types configured
    /// without soft-delete support.
    pub async fn restore(&self, id: RecordId, ctx: &OpCtx) -> AccessResult<()> {
        if !self.config.soft_delete {
            tracing::debug!(entity = R::NAME, id = %id, "restore ignored: entity does not soft-delete");
            return Ok(());
        }

        let restored = self
            .store
            .restore_by_id(id, ctx.tx)
            .await
            .map_err(|e| self.translate(e))?;
        if !restored {
            return Err(self.not_found(id));
        }

        self.cache.invalidate(&self.config.cache_prefix, id).await;
        Ok(())
    }

    // ========================================================================
    // TRANSACTIONS
    // ========================================================================

    /// Open a transaction, run `f` with a context carrying its handle,
    /// commit on success, roll back and propagate on failure. The handle
    /// is always released.
    pub async fn run_in_transaction<F, Fut, T>(&self, f: F) -> AccessResult<T>
    where
        F: FnOnce(OpCtx) -> Fut,
        Fut: std::future::Future<Output = AccessResult<T>>,
    {
        let tx = self.store.begin().await.map_err(|e| self.translate(e))?;

        match f(OpCtx::in_tx(tx)).await {
            Ok(value) => {
                self.store.commit(tx).await.map_err(|e| self.translate(e))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rb) = self.store.rollback(tx).await {
                    tracing::warn!(entity = R::NAME, tx = %tx, error = %rb, "rollback failed");
                }
                Err(err)
            }
        }
    }
}
