//! Usage store contract and the in-memory reference implementation.
//!
//! DESIGN
//! ======
//! The ledger talks to its backing store through a narrow async trait so the
//! in-memory map (single-instance reference, used in tests and by default)
//! and the Postgres store are interchangeable. Entries carry their own reset
//! time; expiry is lazy — a lookup past `reset_at` is treated as absent, no
//! background sweep is needed for correctness.
//!
//! Increments happen entirely inside the store: the in-memory impl holds one
//! lock across the read-modify-write, the Postgres impl uses an atomic SQL
//! upsert. Lost updates under concurrent increment are a correctness bug,
//! not an acceptable race.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;

/// One usage counter with its window bounds (unix seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageEntry {
    pub count: u32,
    pub window_start: u64,
    pub reset_at: u64,
}

impl UsageEntry {
    /// Entry is past its window and must read as absent.
    #[must_use]
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.reset_at
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Abstract usage-entry store.
///
/// `increment` must be atomic per key and roll the window itself when the
/// stored entry has expired (count restarts at 1 in a fresh window).
#[async_trait]
pub trait UsageStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<UsageEntry>, StoreError>;

    async fn upsert(&self, key: &str, entry: UsageEntry) -> Result<(), StoreError>;

    /// Atomically add one use, returning the resulting entry.
    async fn increment(&self, key: &str, now: u64, window_secs: u64)
    -> Result<UsageEntry, StoreError>;

    /// Delete entries whose window has passed. Returns how many were removed.
    async fn delete_expired(&self, now: u64) -> Result<u64, StoreError>;
}

/// Single-process reference store: a mutex-guarded map.
#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, UsageEntry>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, UsageEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl UsageStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<UsageEntry>, StoreError> {
        Ok(self.lock().get(key).copied())
    }

    async fn upsert(&self, key: &str, entry: UsageEntry) -> Result<(), StoreError> {
        self.lock().insert(key.to_owned(), entry);
        Ok(())
    }

    async fn increment(
        &self,
        key: &str,
        now: u64,
        window_secs: u64,
    ) -> Result<UsageEntry, StoreError> {
        let mut entries = self.lock();
        let entry = entries
            .entry(key.to_owned())
            .and_modify(|e| {
                if e.is_expired(now) {
                    *e = UsageEntry { count: 1, window_start: now, reset_at: now + window_secs };
                } else {
                    e.count = e.count.saturating_add(1);
                }
            })
            .or_insert(UsageEntry { count: 1, window_start: now, reset_at: now + window_secs });
        Ok(*entry)
    }

    async fn delete_expired(&self, now: u64) -> Result<u64, StoreError> {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
