use std::sync::Arc;

use super::store::InMemoryStore;
use super::*;

const WINDOW: u64 = 86_400;
const T0: u64 = 1_000_000;

fn ledger() -> UsageLedger {
    UsageLedger::new(Arc::new(InMemoryStore::new()), WINDOW)
}

#[tokio::test]
async fn check_unseen_key_reads_zero() {
    let l = ledger();
    let snap = l.check("fresh", T0).await.unwrap();
    assert_eq!(snap.used, 0);
    assert_eq!(snap.reset_at, T0 + WINDOW);
    assert!(snap.expired_count.is_none());
}

#[tokio::test]
async fn check_never_mutates() {
    let l = ledger();
    l.check("fresh", T0).await.unwrap();
    l.check("fresh", T0).await.unwrap();
    // Still no entry in the store.
    assert!(l.store.get("fresh").await.unwrap().is_none());
}

#[tokio::test]
async fn increments_are_monotonic() {
    let l = ledger();
    for i in 1..=3 {
        let entry = l.record_conversation("k", None, T0).await.unwrap();
        assert_eq!(entry.count, i);
    }
    assert_eq!(l.check("k", T0).await.unwrap().used, 3);
}

#[tokio::test]
async fn lazy_window_reset_reads_zero_with_fresh_reset_time() {
    let l = ledger();
    for _ in 0..3 {
        l.record_conversation("k", None, T0).await.unwrap();
    }

    let later = T0 + WINDOW + 1;
    let snap = l.check("k", later).await.unwrap();
    assert_eq!(snap.used, 0);
    assert_eq!(snap.reset_at, later + WINDOW);
    // The expired window's state is surfaced for the abuse heuristic.
    assert_eq!(snap.expired_count, Some(3));
    assert_eq!(snap.expired_reset_at, Some(T0 + WINDOW));
}

#[tokio::test]
async fn duplicate_conversation_ids_do_not_double_charge() {
    let l = ledger();
    let id = Uuid::new_v4();

    assert!(l.record_conversation("k", Some(id), T0).await.is_some());
    assert!(l.record_conversation("k", Some(id), T0).await.is_none());
    assert_eq!(l.check("k", T0).await.unwrap().used, 1);
}

#[tokio::test]
async fn distinct_conversation_ids_each_count() {
    let l = ledger();
    l.record_conversation("k", Some(Uuid::new_v4()), T0).await;
    l.record_conversation("k", Some(Uuid::new_v4()), T0).await;
    assert_eq!(l.check("k", T0).await.unwrap().used, 2);
}

#[tokio::test]
async fn concurrent_increments_lose_no_updates() {
    let l = ledger();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let l = l.clone();
        handles.push(tokio::spawn(async move {
            l.record_conversation("shared", None, T0).await;
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
    assert_eq!(l.check("shared", T0).await.unwrap().used, 8);
}

#[tokio::test]
async fn sweep_removes_expired_entries() {
    let l = ledger();
    l.record_conversation("k", None, T0).await.unwrap();
    assert_eq!(l.sweep(T0 + WINDOW + 1).await.unwrap(), 1);
    assert!(l.store.get("k").await.unwrap().is_none());
}

#[tokio::test]
async fn distinct_keys_do_not_interfere() {
    let l = ledger();
    l.record_conversation("a", None, T0).await.unwrap();
    assert_eq!(l.check("b", T0).await.unwrap().used, 0);
}

#[test]
fn recent_conversations_evict_oldest_at_cap() {
    let mut recent = RecentConversations::new();
    let first = Uuid::new_v4();
    assert!(recent.insert(first));
    for _ in 0..RECENT_CONVERSATIONS_CAP {
        assert!(recent.insert(Uuid::new_v4()));
    }
    // First id has been evicted, so a replay of it is no longer caught.
    assert!(recent.insert(first));
    assert!(recent.order.len() <= RECENT_CONVERSATIONS_CAP);
}
