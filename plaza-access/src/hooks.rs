//! Lifecycle hooks.
//!
//! Feature services customize entity behavior - duplicate checks, default
//! values, slug generation - by overriding these methods instead of
//! touching the generic engine. Every method defaults to a no-op; a hook
//! returning an error aborts the operation before (or surfaces it after)
//! the store call it brackets.

use async_trait::async_trait;

use plaza_core::{AccessResult, Record, RecordId};
use plaza_storage::ListQuery;

use crate::ctx::OpCtx;

#[async_trait]
pub trait LifecycleHooks<R: Record>: Send + Sync {
    /// Runs before the draft is built and saved. May rewrite the draft.
    async fn before_create(&self, _draft: &mut R::Draft, _ctx: &OpCtx) -> AccessResult<()> {
        Ok(())
    }

    /// Runs after a successful save and cache invalidation.
    async fn after_create(&self, _record: &R, _ctx: &OpCtx) -> AccessResult<()> {
        Ok(())
    }

    /// Runs before the patch is applied. May rewrite the patch.
    async fn before_update(
        &self,
        _id: RecordId,
        _patch: &mut R::Patch,
        _ctx: &OpCtx,
    ) -> AccessResult<()> {
        Ok(())
    }

    /// Runs after a successful update and cache invalidation.
    async fn after_update(&self, _record: &R, _ctx: &OpCtx) -> AccessResult<()> {
        Ok(())
    }

    /// Runs before a hard or soft delete.
    async fn before_delete(&self, _id: RecordId, _ctx: &OpCtx) -> AccessResult<()> {
        Ok(())
    }

    /// Runs after a successful hard or soft delete.
    async fn after_delete(&self, _id: RecordId, _ctx: &OpCtx) -> AccessResult<()> {
        Ok(())
    }

    /// Runs once the facade has normalized a list query, before execution.
    /// May tighten the filter or rewrite the window.
    async fn on_list_query(&self, _query: &mut ListQuery, _ctx: &OpCtx) -> AccessResult<()> {
        Ok(())
    }
}

/// The default hook set: every method is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

#[async_trait]
impl<R: Record> LifecycleHooks<R> for NoHooks {}
