//! Behavioral tests for the entity-access facade, run against the
//! in-memory port and cache.

use std::sync::Arc;

use async_trait::async_trait;

use plaza_access::{
    AccessConfig, AccessWhitelist, EntityAccess, LifecycleHooks, OpCtx, SigningKey,
};
use plaza_core::{AccessResult, Filter, OffsetQuery, CursorQuery, ScalarValue, SortOrder};
use plaza_storage::{FindOpts, ListQuery, MemoryCacheStore, MemoryRecordStore, RecordStore};
use plaza_test_utils::{
    article_at, base_time, numbered_article, numbered_id, Article, ArticleDraft, ArticlePatch,
    Reaction, ReactionDraft,
};

type ArticleAccess = EntityAccess<Article, MemoryRecordStore<Article>, MemoryCacheStore>;
type ReactionAccess = EntityAccess<Reaction, MemoryRecordStore<Reaction>, MemoryCacheStore>;

fn article_config() -> AccessConfig {
    AccessConfig::new("article")
        .with_soft_delete(true)
        .with_whitelist(
            AccessWhitelist::new()
                .allow_fields(["title", "status", "views", "created_at"])
                .allow_sortable(["created_at", "title", "views"]),
        )
}

fn article_access() -> (Arc<MemoryRecordStore<Article>>, Arc<MemoryCacheStore>, ArticleAccess) {
    let store = Arc::new(MemoryRecordStore::new());
    let cache = Arc::new(MemoryCacheStore::new());
    let access = EntityAccess::new(Arc::clone(&store), Arc::clone(&cache), article_config());
    (store, cache, access)
}

async fn seed(store: &MemoryRecordStore<Article>, range: std::ops::RangeInclusive<u128>) {
    for n in range {
        store
            .save(numbered_article(n), None)
            .await
            .expect("seed article");
    }
}

fn created_desc(page: u32, limit: u32) -> OffsetQuery {
    OffsetQuery {
        page,
        limit,
        sort_by: "created_at".to_string(),
        order: SortOrder::Desc,
    }
}

fn cursor_desc(limit: u32, cursor: Option<String>) -> CursorQuery {
    CursorQuery {
        limit,
        sort_by: "created_at".to_string(),
        order: SortOrder::Desc,
        cursor,
    }
}

fn ids(rows: &[Article]) -> Vec<u128> {
    rows.iter().map(|a| a.article_id.as_u128()).collect()
}

// ============================================================================
// OFFSET PAGINATION
// ============================================================================

#[tokio::test]
async fn test_offset_scenario_25_rows() {
    let (store, _, access) = article_access();
    seed(&store, 1..=25).await;
    let ctx = OpCtx::new();

    let page = access
        .list_offset(&created_desc(1, 10), None, &FindOpts::default(), &ctx)
        .await
        .expect("page 1");

    assert_eq!(ids(&page.rows), (16..=25).rev().collect::<Vec<_>>());
    assert_eq!(page.meta.total_records, 25);
    assert_eq!(page.meta.total_pages, 3);
    assert!(page.meta.has_next_page);

    let last = access
        .list_offset(&created_desc(3, 10), None, &FindOpts::default(), &ctx)
        .await
        .expect("page 3");
    assert_eq!(ids(&last.rows), (1..=5).rev().collect::<Vec<_>>());
    assert!(!last.meta.has_next_page);
}

#[tokio::test]
async fn test_offset_bounds_hold_for_every_page() {
    let (store, _, access) = article_access();
    seed(&store, 1..=25).await;
    let ctx = OpCtx::new();

    for page in 1..=4u32 {
        let result = access
            .list_offset(&created_desc(page, 10), None, &FindOpts::default(), &ctx)
            .await
            .expect("page");
        assert!(result.rows.len() <= 10);
        let skip = u64::from(page - 1) * 10;
        assert!(skip + result.rows.len() as u64 <= result.meta.total_records);
    }
}

#[tokio::test]
async fn test_offset_rejects_invalid_inputs_and_clamps_limit() {
    let (store, _, access) = article_access();
    seed(&store, 1..=5).await;
    let ctx = OpCtx::new();

    let err = access
        .list_offset(&created_desc(0, 10), None, &FindOpts::default(), &ctx)
        .await
        .unwrap_err();
    assert_eq!(err.message_key(), "error.validation.invalid_value");

    // A limit above the maximum is clamped, not rejected.
    let clamped = access
        .list_offset(&created_desc(1, 10_000), None, &FindOpts::default(), &ctx)
        .await
        .expect("clamped page");
    assert_eq!(clamped.meta.page_size, 100);
}

#[tokio::test]
async fn test_offset_pages_are_stable_under_duplicate_sort_values() {
    let (store, _, access) = article_access();
    // Five articles sharing one timestamp: only the id tie-break orders them.
    for n in 1..=5u128 {
        store
            .save(article_at(n, base_time()), None)
            .await
            .expect("seed");
    }
    let ctx = OpCtx::new();

    let p1 = access
        .list_offset(&created_desc(1, 2), None, &FindOpts::default(), &ctx)
        .await
        .expect("page 1");
    let p2 = access
        .list_offset(&created_desc(2, 2), None, &FindOpts::default(), &ctx)
        .await
        .expect("page 2");
    let p3 = access
        .list_offset(&created_desc(3, 2), None, &FindOpts::default(), &ctx)
        .await
        .expect("page 3");

    assert_eq!(ids(&p1.rows), vec![5, 4]);
    assert_eq!(ids(&p2.rows), vec![3, 2]);
    assert_eq!(ids(&p3.rows), vec![1]);
}

// ============================================================================
// KEYSET PAGINATION
// ============================================================================

#[tokio::test]
async fn test_cursor_scenario_with_concurrent_insert() {
    let (store, _, access) = article_access();
    seed(&store, 1..=25).await;
    let ctx = OpCtx::new();

    let first = access
        .list_cursor(&cursor_desc(10, None), None, &FindOpts::default(), &ctx)
        .await
        .expect("first page");
    assert_eq!(ids(&first.rows), (16..=25).rev().collect::<Vec<_>>());
    let k1 = first.meta.next_cursor.clone().expect("next cursor");

    // A new row lands between the two calls.
    store
        .save(numbered_article(26), None)
        .await
        .expect("insert 26");

    let second = access
        .list_cursor(&cursor_desc(10, Some(k1)), None, &FindOpts::default(), &ctx)
        .await
        .expect("second page");
    assert_eq!(ids(&second.rows), (6..=15).rev().collect::<Vec<_>>());
}

#[tokio::test]
async fn test_cursor_chain_visits_every_row_once_and_terminates() {
    let (store, _, access) = article_access();
    seed(&store, 1..=25).await;
    let ctx = OpCtx::new();

    let mut seen = Vec::new();
    let mut cursor = None;
    let mut hops = 0;
    loop {
        let page = access
            .list_cursor(&cursor_desc(10, cursor), None, &FindOpts::default(), &ctx)
            .await
            .expect("page");
        seen.extend(ids(&page.rows));
        match page.meta.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
        hops += 1;
        assert!(hops < 10, "cursor chain must terminate");
    }

    let expected: Vec<u128> = (1..=25).rev().collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_cursor_ties_resolved_by_id() {
    let (store, _, access) = article_access();
    for n in 1..=5u128 {
        store
            .save(article_at(n, base_time()), None)
            .await
            .expect("seed");
    }
    let ctx = OpCtx::new();

    let p1 = access
        .list_cursor(&cursor_desc(2, None), None, &FindOpts::default(), &ctx)
        .await
        .expect("page 1");
    assert_eq!(ids(&p1.rows), vec![5, 4]);

    let p2 = access
        .list_cursor(&cursor_desc(2, p1.meta.next_cursor), None, &FindOpts::default(), &ctx)
        .await
        .expect("page 2");
    assert_eq!(ids(&p2.rows), vec![3, 2]);

    let p3 = access
        .list_cursor(&cursor_desc(2, p2.meta.next_cursor), None, &FindOpts::default(), &ctx)
        .await
        .expect("page 3");
    assert_eq!(ids(&p3.rows), vec![1]);
    assert!(p3.meta.next_cursor.is_none());
}

#[tokio::test]
async fn test_plain_cursor_garbage_degrades_to_first_page() {
    let (store, _, access) = article_access();
    seed(&store, 1..=25).await;
    let ctx = OpCtx::new();

    let page = access
        .list_cursor(
            &cursor_desc(10, Some("!!definitely-not-a-cursor!!".to_string())),
            None,
            &FindOpts::default(),
            &ctx,
        )
        .await
        .expect("page");
    assert_eq!(ids(&page.rows), (16..=25).rev().collect::<Vec<_>>());
}

#[tokio::test]
async fn test_signed_cursor_tamper_is_rejected() {
    let store = Arc::new(MemoryRecordStore::new());
    let cache = Arc::new(MemoryCacheStore::new());
    let config = article_config().with_signed_cursors(SigningKey::new(b"cursor-key".to_vec()));
    let access: ArticleAccess = EntityAccess::new(Arc::clone(&store), cache, config);
    seed(&store, 1..=25).await;
    let ctx = OpCtx::new();

    let first = access
        .list_cursor(&cursor_desc(10, None), None, &FindOpts::default(), &ctx)
        .await
        .expect("first page");
    let token = first.meta.next_cursor.expect("next cursor");

    // The untampered token works.
    let second = access
        .list_cursor(&cursor_desc(10, Some(token.clone())), None, &FindOpts::default(), &ctx)
        .await
        .expect("second page");
    assert_eq!(second.rows.len(), 10);

    // Flip one character: rejected, not degraded.
    let mut tampered: Vec<char> = token.chars().collect();
    let at = tampered.len() / 2;
    tampered[at] = if tampered[at] == 'a' { 'b' } else { 'a' };
    let tampered: String = tampered.into_iter().collect();

    let err = access
        .list_cursor(&cursor_desc(10, Some(tampered)), None, &FindOpts::default(), &ctx)
        .await
        .unwrap_err();
    assert_eq!(err.message_key(), "error.validation.cursor_rejected");
}

// ============================================================================
// CACHE BEHAVIOR
// ============================================================================

#[tokio::test]
async fn test_point_reads_are_served_from_cache() {
    let (store, _, access) = article_access();
    seed(&store, 1..=1).await;
    let ctx = OpCtx::new();
    let id = numbered_id(1);

    let first = access
        .find_by_id(id, &FindOpts::default(), &ctx)
        .await
        .expect("first read");
    assert_eq!(first.title, "Article 1");

    // Mutating the store behind the facade's back leaves the cached
    // snapshot in place, proving the second read never hit the port.
    store
        .update_by_id(
            id,
            &ArticlePatch {
                title: Some("Changed directly".to_string()),
                ..ArticlePatch::default()
            },
            None,
        )
        .await
        .expect("direct update");

    let second = access
        .find_by_id(id, &FindOpts::default(), &ctx)
        .await
        .expect("second read");
    assert_eq!(second.title, "Article 1");
}

#[tokio::test]
async fn test_update_invalidates_cached_snapshot() {
    let (store, _, access) = article_access();
    seed(&store, 1..=1).await;
    let ctx = OpCtx::new();
    let id = numbered_id(1);

    // Warm the cache.
    access
        .find_by_id(id, &FindOpts::default(), &ctx)
        .await
        .expect("warm");

    let updated = access
        .update(
            id,
            ArticlePatch {
                title: Some("Fresh title".to_string()),
                ..ArticlePatch::default()
            },
            &ctx,
        )
        .await
        .expect("update");
    assert_eq!(updated.title, "Fresh title");

    // The pre-update snapshot must never come back.
    let read = access
        .find_by_id(id, &FindOpts::default(), &ctx)
        .await
        .expect("read after update");
    assert_eq!(read.title, "Fresh title");
    assert!(store.query_count() > 0);
}

#[tokio::test]
async fn test_mutation_invalidates_list_pages() {
    let (store, _, access) = article_access();
    seed(&store, 1..=12).await;
    let ctx = OpCtx::new();

    let before = access
        .list_offset(&created_desc(1, 10), None, &FindOpts::default(), &ctx)
        .await
        .expect("list before");
    assert_eq!(before.meta.total_records, 12);

    access
        .create(ArticleDraft::new("Thirteenth"), &ctx)
        .await
        .expect("create");

    let after = access
        .list_offset(&created_desc(1, 10), None, &FindOpts::default(), &ctx)
        .await
        .expect("list after");
    assert_eq!(after.meta.total_records, 13);
}

// ============================================================================
// SOFT DELETE
// ============================================================================

#[tokio::test]
async fn test_soft_delete_hides_then_restore_reveals() {
    let (store, _, access) = article_access();
    seed(&store, 1..=1).await;
    let ctx = OpCtx::new();
    let id = numbered_id(1);

    access.soft_delete(id, &ctx).await.expect("soft delete");

    let err = access
        .find_by_id(id, &FindOpts::default(), &ctx)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    // Still visible when explicitly opting into deleted rows.
    let peeked = access
        .find_by_id(id, &FindOpts::with_deleted(), &ctx)
        .await
        .expect("peek deleted");
    assert!(peeked.deleted_at.is_some());

    access.restore(id, &ctx).await.expect("restore");
    let back = access
        .find_by_id(id, &FindOpts::default(), &ctx)
        .await
        .expect("restored");
    assert!(back.deleted_at.is_none());
}

#[tokio::test]
async fn test_soft_delete_excludes_from_lists_and_counts() {
    let (store, _, access) = article_access();
    seed(&store, 1..=10).await;
    let ctx = OpCtx::new();

    access
        .soft_delete(numbered_id(10), &ctx)
        .await
        .expect("soft delete");

    let page = access
        .list_offset(&created_desc(1, 10), None, &FindOpts::default(), &ctx)
        .await
        .expect("list");
    assert_eq!(page.meta.total_records, 9);
    assert!(!ids(&page.rows).contains(&10));

    let with_deleted = access
        .list_offset(&created_desc(1, 10), None, &FindOpts::with_deleted(), &ctx)
        .await
        .expect("list with deleted");
    assert_eq!(with_deleted.meta.total_records, 10);
}

#[tokio::test]
async fn test_soft_delete_without_support_is_a_hard_delete() {
    let store = Arc::new(MemoryRecordStore::new());
    let cache = Arc::new(MemoryCacheStore::new());
    // Reactions are configured without soft-delete support.
    let access: ReactionAccess =
        EntityAccess::new(Arc::clone(&store), cache, AccessConfig::new("reaction"));
    let ctx = OpCtx::new();

    let reaction = access
        .create(
            ReactionDraft {
                article_id: numbered_id(1),
                kind: "clap".to_string(),
            },
            &ctx,
        )
        .await
        .expect("create");
    let rid = reaction.reaction_id;

    access.soft_delete(rid, &ctx).await.expect("fallback delete");
    assert!(store.is_empty(), "row must be hard-deleted");

    // Restore on a non-supporting entity is a no-op, not an error.
    access.restore(rid, &ctx).await.expect("restore no-op");
}

// ============================================================================
// WHITELIST
// ============================================================================

#[tokio::test]
async fn test_whitelist_rejections_never_execute_a_query() {
    let (store, _, access) = article_access();
    seed(&store, 1..=3).await;
    let ctx = OpCtx::new();
    let baseline = store.query_count();

    let sort_err = access
        .list_offset(
            &OffsetQuery {
                page: 1,
                limit: 10,
                sort_by: "password_hash".to_string(),
                order: SortOrder::Desc,
            },
            None,
            &FindOpts::default(),
            &ctx,
        )
        .await
        .unwrap_err();
    assert_eq!(sort_err.message_key(), "error.validation.sort_not_allowed");

    let filter_err = access
        .list_offset(
            &created_desc(1, 10),
            Some(Filter::Eq {
                field: "secret".to_string(),
                value: ScalarValue::Text("x".to_string()),
            }),
            &FindOpts::default(),
            &ctx,
        )
        .await
        .unwrap_err();
    assert_eq!(filter_err.message_key(), "error.validation.field_not_allowed");

    let relation_err = access
        .find_by_id(
            numbered_id(1),
            &FindOpts {
                relations: vec!["billing_profile".to_string()],
                ..FindOpts::default()
            },
            &ctx,
        )
        .await
        .unwrap_err();
    assert_eq!(
        relation_err.message_key(),
        "error.validation.relation_not_allowed"
    );

    assert_eq!(store.query_count(), baseline);
}

// ============================================================================
// FILTERS AND FIND_ONE
// ============================================================================

#[tokio::test]
async fn test_extra_filter_narrows_lists() {
    let (store, _, access) = article_access();
    seed(&store, 1..=10).await;
    let ctx = OpCtx::new();

    let popular = access
        .list_offset(
            &created_desc(1, 10),
            Some(Filter::Gte {
                field: "views".to_string(),
                value: ScalarValue::Int(8),
            }),
            &FindOpts::default(),
            &ctx,
        )
        .await
        .expect("filtered list");
    assert_eq!(ids(&popular.rows), vec![10, 9, 8]);
    assert_eq!(popular.meta.total_records, 3);
}

#[tokio::test]
async fn test_find_one_returns_first_match_or_none() {
    let (store, _, access) = article_access();
    seed(&store, 1..=5).await;
    let ctx = OpCtx::new();

    let found = access
        .find_one(
            &Filter::Eq {
                field: "title".to_string(),
                value: ScalarValue::Text("Article 3".to_string()),
            },
            &FindOpts::default(),
            &ctx,
        )
        .await
        .expect("find_one");
    assert_eq!(found.map(|a| a.article_id), Some(numbered_id(3)));

    let missing = access
        .find_one(
            &Filter::Eq {
                field: "title".to_string(),
                value: ScalarValue::Text("No such".to_string()),
            },
            &FindOpts::default(),
            &ctx,
        )
        .await
        .expect("find_one none");
    assert!(missing.is_none());
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

#[tokio::test]
async fn test_transaction_commits_on_success() {
    let (store, _, access) = article_access();
    let access2 = access.clone();

    access
        .run_in_transaction(|ctx| {
            let access = access2.clone();
            async move {
                access.create(ArticleDraft::new("First"), &ctx).await?;
                access.create(ArticleDraft::new("Second"), &ctx).await?;
                Ok(())
            }
        })
        .await
        .expect("transaction");

    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_transaction_rolls_back_on_error() {
    let (store, _, access) = article_access();
    let access2 = access.clone();

    let result: AccessResult<()> = access
        .run_in_transaction(|ctx| {
            let access = access2.clone();
            async move {
                access.create(ArticleDraft::new("Doomed"), &ctx).await?;
                Err(plaza_core::AccessError::internal("abort"))
            }
        })
        .await;

    assert!(result.is_err());
    assert!(store.is_empty(), "rollback must undo the create");
}

// ============================================================================
// LIFECYCLE HOOKS
// ============================================================================

struct ArticleHooks;

#[async_trait]
impl LifecycleHooks<Article> for ArticleHooks {
    async fn before_create(&self, draft: &mut ArticleDraft, _ctx: &OpCtx) -> AccessResult<()> {
        // Features use this hook for defaults and slugs.
        draft.status = "draft".to_string();
        draft.slug = format!("{}-reviewed", draft.slug);
        Ok(())
    }

    async fn on_list_query(&self, query: &mut ListQuery, _ctx: &OpCtx) -> AccessResult<()> {
        let published = Filter::Eq {
            field: "status".to_string(),
            value: ScalarValue::Text("published".to_string()),
        };
        query.filter = Filter::merge(query.filter.take(), Some(published));
        Ok(())
    }
}

#[tokio::test]
async fn test_hooks_rewrite_drafts_and_tighten_lists() {
    let store = Arc::new(MemoryRecordStore::new());
    let cache = Arc::new(MemoryCacheStore::new());
    let access: ArticleAccess =
        EntityAccess::new(Arc::clone(&store), cache, article_config())
            .with_hooks(Arc::new(ArticleHooks));
    seed(&store, 1..=3).await;
    let ctx = OpCtx::new();

    let created = access
        .create(ArticleDraft::new("Hooked"), &ctx)
        .await
        .expect("create");
    assert_eq!(created.status, "draft");
    assert_eq!(created.slug, "hooked-reviewed");

    // The list hook filters drafts out, so only the seeded rows show.
    let page = access
        .list_offset(&created_desc(1, 10), None, &FindOpts::default(), &ctx)
        .await
        .expect("list");
    assert_eq!(page.meta.total_records, 3);
}

// ============================================================================
// CONFLICTS
// ============================================================================

#[tokio::test]
async fn test_duplicate_save_surfaces_as_conflict() {
    let (store, _, access) = article_access();
    let article = numbered_article(1);
    store.save(article.clone(), None).await.expect("first save");

    let err = store.save(article, None).await.unwrap_err();
    let translated = match err {
        plaza_storage::StoreError::Conflict { constraint } => {
            plaza_core::AccessError::Conflict {
                entity: "article",
                constraint,
            }
        }
        other => panic!("expected conflict, got {other:?}"),
    };
    assert_eq!(translated.message_key(), "error.record.conflict");

    // And through the facade: NotFound carries the taxonomy too.
    let ctx = OpCtx::new();
    let missing = access
        .find_by_id(numbered_id(99), &FindOpts::default(), &ctx)
        .await
        .unwrap_err();
    assert_eq!(missing.message_key(), "error.record.not_found");
}
