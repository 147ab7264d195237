//! Integration tests for the `snapfeed-db` local store.
//!
//! Every test runs against a private in-memory `SQLite` database with the
//! migrations applied, so no external services are needed.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::too_many_lines,
    clippy::indexing_slicing,
    clippy::panic
)]

use snapfeed_db::{
    DbError, DedupReconciler, FieldValue, LocalStore, POSTS, Patch, PostPatch, Predicate,
    ROW_KEY_COLUMN, SqliteConfig, UpsertOutcome, sample_content, seed,
};
use snapfeed_types::{ContentType, Post, PostId, User, UserId};
use sqlx::Row;

// =============================================================================
// Helpers
// =============================================================================

async fn setup_store() -> LocalStore {
    let store = LocalStore::connect(&SqliteConfig::in_memory())
        .await
        .expect("Failed to open in-memory SQLite");
    store
        .run_migrations()
        .await
        .expect("Failed to run migrations");
    store
}

fn user(id: &str, username: &str) -> User {
    User {
        id: UserId::from(id),
        username: username.to_owned(),
        avatar_uri: format!("https://i.pravatar.cc/150?u={id}"),
    }
}

fn post(id: &str, user_id: &str, kind: ContentType) -> Post {
    Post::new(
        PostId::from(id),
        UserId::from(user_id),
        format!("https://example.com/{id}.{}", kind.file_extension()),
        kind,
        format!("caption {id}"),
    )
}

async fn post_ids(store: &LocalStore) -> Vec<String> {
    store
        .query::<Post>(None)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.record.id.into_inner())
        .collect()
}

// =============================================================================
// Generic record operations
// =============================================================================

#[tokio::test]
async fn create_query_update_destroy() {
    let store = setup_store().await;

    let key = store.create(&post("p1", "u1", ContentType::Video)).await.unwrap();
    store.create(&post("p2", "u1", ContentType::Image)).await.unwrap();

    let all = store.query::<Post>(None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].key, key);
    assert_eq!(all[0].record.content_type, ContentType::Video);

    store
        .update::<Post>(key, Patch::new().set("likes", 7_u32).set("liked", true))
        .await
        .unwrap();
    let filter = Predicate::eq("id", "p1");
    let updated = store.query::<Post>(Some(&filter)).await.unwrap();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].record.likes, 7);
    assert!(updated[0].record.liked);

    store.destroy::<Post>(key).await.unwrap();
    assert_eq!(post_ids(&store).await, vec!["p2".to_owned()]);

    let again = store.destroy::<Post>(key).await;
    assert!(matches!(again, Err(DbError::RecordNotFound { .. })));
}

#[tokio::test]
async fn query_returns_insertion_order() {
    let store = setup_store().await;
    for id in ["c", "a", "b"] {
        store.create(&post(id, "u1", ContentType::Image)).await.unwrap();
    }
    assert_eq!(post_ids(&store).await, vec!["c", "a", "b"]);
}

#[tokio::test]
async fn conjunctive_predicate_filters() {
    let store = setup_store().await;
    store.create(&post("p1", "u1", ContentType::Image)).await.unwrap();
    store.create(&post("p2", "u2", ContentType::Image)).await.unwrap();
    store.create(&post("p3", "u1", ContentType::Pdf)).await.unwrap();

    let filter =
        Predicate::eq("user_id", "u1").and(Predicate::eq("content_type", ContentType::Pdf.as_str()));
    let found = store.query::<Post>(Some(&filter)).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].record.id.as_str(), "p3");
    assert_eq!(store.count::<Post>(Some(&Predicate::eq("user_id", "u1"))).await.unwrap(), 2);
}

#[tokio::test]
async fn unknown_columns_are_rejected_before_sql() {
    let store = setup_store().await;
    let key = store.create(&post("p1", "u1", ContentType::Image)).await.unwrap();

    let bad_filter = Predicate::eq("views", 3_i64);
    let err = store.query::<Post>(Some(&bad_filter)).await;
    assert!(matches!(err, Err(DbError::InvalidColumn { .. })));

    let bad_patch = Patch::new().set("likes; DROP TABLE posts", 1_i64);
    let err = store.update::<Post>(key, bad_patch).await;
    assert!(matches!(err, Err(DbError::InvalidColumn { .. })));
    assert_eq!(store.count::<Post>(None).await.unwrap(), 1);
}

// =============================================================================
// Write scopes
// =============================================================================

#[tokio::test]
async fn dropped_scope_rolls_back_and_releases_the_lock() {
    let store = setup_store().await;

    {
        let mut scope = store.write().await.unwrap();
        scope.create(&post("p1", "u1", ContentType::Image)).await.unwrap();
        let inside = scope.query::<Post>(None).await.unwrap();
        assert_eq!(inside.len(), 1);
    }

    assert_eq!(store.count::<Post>(None).await.unwrap(), 0);

    // A new scope can be opened, so the writer lock was released.
    let mut scope = store.write().await.unwrap();
    scope.create(&post("p2", "u1", ContentType::Image)).await.unwrap();
    scope.commit().await.unwrap();
    assert_eq!(post_ids(&store).await, vec!["p2"]);
}

#[tokio::test]
async fn failing_statement_leaves_no_partial_write() {
    let store = setup_store().await;
    store.create(&user("u1", "jane_doe")).await.unwrap();

    let attempt = async {
        let mut scope = store.write().await?;
        scope.create(&post("p1", "u1", ContentType::Image)).await?;
        // users.id is unique, so this insert fails.
        scope.create(&user("u1", "someone_else")).await?;
        scope.commit().await
    };
    assert!(matches!(attempt.await, Err(DbError::Sqlite(_))));

    assert_eq!(store.count::<Post>(None).await.unwrap(), 0);
    assert_eq!(store.count::<User>(None).await.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_writers_are_serialized() {
    let store = setup_store().await;

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                let id = format!("p{i}");
                store.create(&post(&id, "u1", ContentType::Image)).await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(store.count::<Post>(None).await.unwrap(), 8);
}

// =============================================================================
// Users and relations
// =============================================================================

#[tokio::test]
async fn resolve_user_reports_missing_relation() {
    let store = setup_store().await;
    store.create(&user("u1", "john_doe")).await.unwrap();

    let found = store.resolve_user(&UserId::from("u1")).await.unwrap();
    assert_eq!(found.username, "john_doe");

    let missing = store.resolve_user(&UserId::from("ghost")).await;
    let err = missing.unwrap_err();
    assert!(err.is_relation_not_found());
}

#[tokio::test]
async fn find_or_create_user_is_stable() {
    let store = setup_store().await;

    let first = store
        .find_or_create_user("Jeevith", "https://example.com/a.jpg")
        .await
        .unwrap();
    let second = store
        .find_or_create_user("Jeevith", "https://example.com/other.jpg")
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(second.avatar_uri, "https://example.com/a.jpg");
    assert_eq!(store.count::<User>(None).await.unwrap(), 1);
    assert_eq!(
        store.find_user_by_username("Jeevith").await.unwrap(),
        Some(first)
    );
    assert!(store.find_user_by_username("nobody").await.unwrap().is_none());
}

// =============================================================================
// Posts
// =============================================================================

#[tokio::test]
async fn upsert_inserts_then_overwrites() {
    let store = setup_store().await;
    let author = user("u9", "Jeevith");
    let mut p = post("p1", "u9", ContentType::Image);

    let outcome = store.upsert_post(&p, Some(&author)).await.unwrap();
    assert!(matches!(outcome, UpsertOutcome::Inserted(_)));
    assert_eq!(store.resolve_user(&UserId::from("u9")).await.unwrap(), author);

    p.likes = 3;
    p.saved = true;
    let outcome = store.upsert_post(&p, Some(&author)).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated(1));

    let rows = store.query::<Post>(None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].record, p);
    assert_eq!(store.count::<User>(None).await.unwrap(), 1);
}

#[tokio::test]
async fn post_patch_touches_only_its_fields() {
    let store = setup_store().await;
    let mut p = post("p1", "u1", ContentType::Video);
    p.comments = 4;
    store.create(&p).await.unwrap();

    let rows = store
        .apply_post_patch(&PostId::from("p1"), &PostPatch::like(true, 1))
        .await
        .unwrap();
    assert_eq!(rows, 1);

    let stored = store.query::<Post>(None).await.unwrap();
    let record = &stored[0].record;
    assert!(record.liked);
    assert_eq!(record.likes, 1);
    assert_eq!(record.comments, 4);
    assert!(!record.saved);

    let missing = store
        .apply_post_patch(&PostId::from("nope"), &PostPatch::save(true))
        .await;
    assert!(matches!(missing, Err(DbError::RecordNotFound { .. })));
}

#[tokio::test]
async fn null_counters_read_as_zero() {
    let store = setup_store().await;
    sqlx::query(
        "INSERT INTO posts (id, content_uri, content_type, user_id, likes, comments, shares) \
         VALUES ('p1', 'https://example.com/p1.jpg', 'image', 'u1', 5, NULL, NULL)",
    )
    .execute(store.pool())
    .await
    .unwrap();

    let rows = store.query::<Post>(None).await.unwrap();
    assert_eq!(rows[0].record.likes, 5);
    assert_eq!(rows[0].record.comments, 0);
    assert_eq!(rows[0].record.shares, 0);

    let nulls = Predicate::eq("comments", FieldValue::Null);
    assert_eq!(store.count::<Post>(Some(&nulls)).await.unwrap(), 1);
}

#[tokio::test]
async fn negative_counter_is_a_decode_error() {
    let store = setup_store().await;
    sqlx::query(
        "INSERT INTO posts (id, content_uri, content_type, user_id, likes) \
         VALUES ('p1', 'https://example.com/p1.jpg', 'image', 'u1', -3)",
    )
    .execute(store.pool())
    .await
    .unwrap();

    let err = store.query::<Post>(None).await.unwrap_err();
    match err {
        DbError::Decode { column, reason, .. } => {
            assert_eq!(column, "likes");
            assert!(reason.starts_with("counter out of range: -3 ("), "reason was {reason}");
        }
        other => panic!("expected a decode error, got {other:?}"),
    }
}

#[tokio::test]
async fn clear_all_empties_both_tables() {
    let store = setup_store().await;
    let report = seed(&store, &sample_content()).await.unwrap();
    assert_eq!((report.users, report.posts), (3, 3));

    let cleared = store.clear_all().await.unwrap();
    assert_eq!((cleared.posts, cleared.users), (3, 3));
    assert_eq!(store.count::<Post>(None).await.unwrap(), 0);
    assert_eq!(store.count::<User>(None).await.unwrap(), 0);
}

#[tokio::test]
async fn seeded_posts_resolve_their_authors() {
    let store = setup_store().await;
    seed(&store, &sample_content()).await.unwrap();

    for stored in store.query::<Post>(None).await.unwrap() {
        let author = store.resolve_user(&stored.record.user_id).await.unwrap();
        assert!(!author.is_fallback());
    }
}

// =============================================================================
// Dedup reconciliation
// =============================================================================

#[tokio::test]
async fn reconcile_keeps_first_row_per_id() {
    let store = setup_store().await;
    for (id, caption) in [("a", "first"), ("b", "only"), ("a", "second"), ("a", "third")] {
        let mut p = post(id, "u1", ContentType::Image);
        p.caption = caption.to_owned();
        store.create(&p).await.unwrap();
    }

    let reconciler = DedupReconciler::new(store.clone());
    let report = reconciler.reconcile().await.unwrap();
    assert_eq!(report.scanned, 4);
    assert_eq!(report.removed, 2);
    assert!(!report.skipped);

    let rows = store.query::<Post>(None).await.unwrap();
    let captions: Vec<_> = rows.iter().map(|s| s.record.caption.as_str()).collect();
    assert_eq!(captions, vec!["first", "only"]);

    // Latched: the second call is a no-op.
    let again = reconciler.reconcile().await.unwrap();
    assert!(again.skipped);
    assert_eq!(again.removed, 0);

    // An unguarded pass over clean data removes nothing.
    let pass = reconciler.run_pass().await.unwrap();
    assert_eq!(pass.removed, 0);
}

#[tokio::test]
async fn concurrent_reconcile_runs_once() {
    let store = setup_store().await;
    store.create(&post("a", "u1", ContentType::Image)).await.unwrap();
    store.create(&post("a", "u1", ContentType::Image)).await.unwrap();

    let reconciler = DedupReconciler::new(store.clone());
    let (first, second) = tokio::join!(reconciler.reconcile(), reconciler.reconcile());
    let reports = [first.unwrap(), second.unwrap()];

    assert_eq!(reports.iter().filter(|r| !r.skipped).count(), 1);
    assert_eq!(reports.iter().map(|r| r.removed).sum::<usize>(), 1);
    assert_eq!(store.count::<Post>(None).await.unwrap(), 1);
}

// =============================================================================
// Schema descriptors
// =============================================================================

#[tokio::test]
async fn posts_descriptor_matches_migrated_table() {
    let store = setup_store().await;

    let rows = sqlx::query("SELECT name, type FROM pragma_table_info('posts') ORDER BY cid")
        .fetch_all(store.pool())
        .await
        .unwrap();
    let columns: Vec<(String, String)> = rows
        .iter()
        .map(|r| (r.get::<String, _>("name"), r.get::<String, _>("type")))
        .filter(|(name, _)| name != ROW_KEY_COLUMN)
        .collect();
    let described: Vec<(String, String)> = POSTS
        .columns
        .iter()
        .map(|c| (c.name.to_owned(), c.column_type.sql_name().to_owned()))
        .collect();
    assert_eq!(columns, described);

    let index_sql: Vec<String> = sqlx::query_scalar(
        "SELECT sql FROM sqlite_master WHERE type = 'index' AND tbl_name = 'posts' AND sql IS NOT NULL",
    )
    .fetch_all(store.pool())
    .await
    .unwrap();
    for column in POSTS.columns.iter().filter(|c| c.indexed) {
        let needle = format!("({})", column.name);
        assert!(
            index_sql.iter().any(|sql| sql.contains(&needle)),
            "missing index on posts.{}",
            column.name
        );
    }
}
