//! Contract tests for the SQLite-backed item store.

use chrono::{TimeZone, Utc};
use sqlx::SqlitePool;
use tempfile::TempDir;

use jotbox::config::DbConfig;
use jotbox::migrate;
use jotbox::sqlite_store::open_pool;
use jotbox::SqliteItemStore;
use jotbox_core::models::{Bucket, Item, Kind, Suggestion, TriageState, TriageStatus};
use jotbox_core::store::ItemStore;
use jotbox_core::Error;

async fn test_pool(dir: &TempDir) -> SqlitePool {
    let config = DbConfig {
        path: dir.path().join("jot.sqlite"),
        max_connections: 1,
    };
    open_pool(&config).await.unwrap()
}

async fn test_store() -> (TempDir, SqliteItemStore) {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir).await;
    migrate::apply(&pool).await.unwrap();
    (dir, SqliteItemStore::new(pool))
}

#[tokio::test]
async fn open_pool_creates_file_and_parent_directories() {
    let dir = TempDir::new().unwrap();
    let config = DbConfig {
        path: dir.path().join("nested/data/jot.sqlite"),
        max_connections: 2,
    };
    let pool = open_pool(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    assert!(config.path.exists());
}

fn suggestion() -> Suggestion {
    Suggestion {
        bucket: Some(Bucket::Life),
        category: Some("shopping".to_string()),
        kind: Some(Kind::Task),
        summary: Some("buy headphones".to_string()),
        tags: vec!["headphones".to_string()],
        confidence: Some(0.9),
        title: None,
        refined_body: None,
        reference_urls: Vec::new(),
    }
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let dir = TempDir::new().unwrap();
    let pool = test_pool(&dir).await;
    migrate::apply(&pool).await.unwrap();
    migrate::apply(&pool).await.unwrap();
}

#[tokio::test]
async fn insert_and_get_roundtrip() {
    let (_dir, store) = test_store().await;

    let mut item = Item::new("local", "Compare noise-cancelling headphones");
    item.bucket = Some(Bucket::Life);
    item.tags = vec!["audio".to_string()];
    store.insert(&item).await.unwrap();

    let loaded = store.get(&item.id).await.unwrap();
    assert_eq!(loaded.id, item.id);
    assert_eq!(loaded.owner, "local");
    assert_eq!(loaded.body, "Compare noise-cancelling headphones");
    assert_eq!(loaded.bucket, Some(Bucket::Life));
    assert_eq!(loaded.tags, vec!["audio".to_string()]);
    assert_eq!(loaded.status(), TriageStatus::Pending);
    assert_eq!(loaded.created_at.timestamp(), item.created_at.timestamp());
}

#[tokio::test]
async fn get_unknown_id_is_not_found() {
    let (_dir, store) = test_store().await;
    let err = store.get("no-such-id").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn awaiting_state_roundtrips_with_suggestion() {
    let (_dir, store) = test_store().await;

    let mut item = Item::new("local", "Buy headphones");
    store.insert(&item).await.unwrap();

    item.record_suggestion(suggestion()).unwrap();
    let updated = store.update(&item, TriageStatus::Pending).await.unwrap();

    assert_eq!(updated.status(), TriageStatus::AwaitingApproval);
    let stored = updated.suggestion().unwrap();
    assert_eq!(stored.bucket, Some(Bucket::Life));
    assert_eq!(stored.summary.as_deref(), Some("buy headphones"));
}

#[tokio::test]
async fn done_state_roundtrips_with_triaged_at() {
    let (_dir, store) = test_store().await;

    let mut item = Item::new("local", "Sprint retro notes");
    let triaged_at = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
    item.state = TriageState::Done { triaged_at };
    store.insert(&item).await.unwrap();

    let loaded = store.get(&item.id).await.unwrap();
    assert_eq!(loaded.status(), TriageStatus::Done);
    assert_eq!(loaded.triaged_at(), Some(triaged_at));
}

#[tokio::test]
async fn stale_expected_state_is_a_conflict() {
    let (_dir, store) = test_store().await;

    let mut item = Item::new("local", "Buy headphones");
    store.insert(&item).await.unwrap();

    item.record_suggestion(suggestion()).unwrap();
    store.update(&item, TriageStatus::Pending).await.unwrap();

    // Second writer still believes the item is pending.
    let err = store
        .update(&item, TriageStatus::Pending)
        .await
        .unwrap_err();
    match err {
        Error::Conflict { found, .. } => assert_eq!(found, TriageStatus::AwaitingApproval),
        other => panic!("expected Conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn update_of_missing_row_is_not_found() {
    let (_dir, store) = test_store().await;
    let item = Item::new("local", "never inserted");
    let err = store
        .update(&item, TriageStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn list_pending_honors_id_filter() {
    let (_dir, store) = test_store().await;

    let a = Item::new("local", "first");
    let b = Item::new("local", "second");
    let mut c = Item::new("local", "already failed");
    c.mark_failed().unwrap();
    store.insert(&a).await.unwrap();
    store.insert(&b).await.unwrap();
    store.insert(&c).await.unwrap();

    let ids = vec![a.id.clone(), c.id.clone()];
    let items = store.list_pending(10, Some(&ids)).await.unwrap();
    // Only the pending member of the filter survives.
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, a.id);

    let all = store.list_pending(10, None).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn recent_done_orders_by_triage_time_and_filters_owner() {
    let (_dir, store) = test_store().await;

    let mut older = Item::new("alice", "older note");
    older.bucket = Some(Bucket::Work);
    older.category = Some("planning".to_string());
    older.kind = Some(Kind::Note);
    older.state = TriageState::Done {
        triaged_at: Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap(),
    };

    let mut newer = Item::new("alice", "newer note");
    newer.bucket = Some(Bucket::Life);
    newer.kind = Some(Kind::Task);
    newer.state = TriageState::Done {
        triaged_at: Utc.with_ymd_and_hms(2026, 8, 2, 9, 0, 0).unwrap(),
    };

    let mut other_owner = Item::new("bob", "bob's note");
    other_owner.state = TriageState::Done {
        triaged_at: Utc.with_ymd_and_hms(2026, 8, 3, 9, 0, 0).unwrap(),
    };

    store.insert(&older).await.unwrap();
    store.insert(&newer).await.unwrap();
    store.insert(&other_owner).await.unwrap();

    let examples = store.recent_done(Some("alice"), 10).await.unwrap();
    assert_eq!(examples.len(), 2);
    assert_eq!(examples[0].body, "newer note");
    assert_eq!(examples[1].body, "older note");
    assert_eq!(examples[1].category.as_deref(), Some("planning"));

    let capped = store.recent_done(None, 1).await.unwrap();
    assert_eq!(capped.len(), 1);
    assert_eq!(capped[0].body, "bob's note");
}

#[tokio::test]
async fn list_filters_by_status() {
    let (_dir, store) = test_store().await;

    let pending = Item::new("local", "pending note");
    let mut failed = Item::new("local", "failed note");
    failed.mark_failed().unwrap();
    store.insert(&pending).await.unwrap();
    store.insert(&failed).await.unwrap();

    let only_failed = store.list(Some(TriageStatus::Failed), 10).await.unwrap();
    assert_eq!(only_failed.len(), 1);
    assert_eq!(only_failed[0].id, failed.id);

    let everything = store.list(None, 10).await.unwrap();
    assert_eq!(everything.len(), 2);
}
