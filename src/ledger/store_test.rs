use super::*;

const WINDOW: u64 = 86_400;

#[tokio::test]
async fn get_missing_key_is_none() {
    let store = InMemoryStore::new();
    assert_eq!(store.get("nope").await.unwrap(), None);
}

#[tokio::test]
async fn increment_creates_entry_with_fresh_window() {
    let store = InMemoryStore::new();
    let entry = store.increment("k", 1_000, WINDOW).await.unwrap();
    assert_eq!(entry, UsageEntry { count: 1, window_start: 1_000, reset_at: 1_000 + WINDOW });
}

#[tokio::test]
async fn increment_counts_within_window() {
    let store = InMemoryStore::new();
    for _ in 0..3 {
        store.increment("k", 1_000, WINDOW).await.unwrap();
    }
    let entry = store.get("k").await.unwrap().unwrap();
    assert_eq!(entry.count, 3);
    assert_eq!(entry.window_start, 1_000);
}

#[tokio::test]
async fn increment_rolls_expired_window() {
    let store = InMemoryStore::new();
    store.increment("k", 1_000, WINDOW).await.unwrap();
    store.increment("k", 1_000, WINDOW).await.unwrap();

    // One second past reset: count restarts at 1 in a new window.
    let later = 1_000 + WINDOW + 1;
    let entry = store.increment("k", later, WINDOW).await.unwrap();
    assert_eq!(entry, UsageEntry { count: 1, window_start: later, reset_at: later + WINDOW });
}

#[tokio::test]
async fn upsert_overwrites() {
    let store = InMemoryStore::new();
    let entry = UsageEntry { count: 7, window_start: 5, reset_at: 5 + WINDOW };
    store.upsert("k", entry).await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), Some(entry));
}

#[tokio::test]
async fn delete_expired_prunes_only_past_entries() {
    let store = InMemoryStore::new();
    store
        .upsert("old", UsageEntry { count: 1, window_start: 0, reset_at: 100 })
        .await
        .unwrap();
    store
        .upsert("live", UsageEntry { count: 1, window_start: 0, reset_at: 10_000 })
        .await
        .unwrap();

    let removed = store.delete_expired(500).await.unwrap();
    assert_eq!(removed, 1);
    assert!(store.get("old").await.unwrap().is_none());
    assert!(store.get("live").await.unwrap().is_some());
}

#[tokio::test]
async fn concurrent_increments_lose_no_updates() {
    use std::sync::Arc;

    let store = Arc::new(InMemoryStore::new());
    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.increment("shared", 1_000, WINDOW).await.unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
    assert_eq!(store.get("shared").await.unwrap().unwrap().count, 16);
}

#[test]
fn entry_expiry_boundary_is_inclusive() {
    let entry = UsageEntry { count: 1, window_start: 0, reset_at: 100 };
    assert!(!entry.is_expired(99));
    assert!(entry.is_expired(100));
    assert!(entry.is_expired(101));
}
