//! Usage ledger — per-identity conversation counters.
//!
//! DESIGN
//! ======
//! One counter per composite identity, one increment per *completed*
//! conversation (never per message or streamed chunk). Counters live behind
//! the [`store::UsageStore`] contract with lazy fixed-window expiry, so
//! `check` never mutates and a stale entry simply reads as empty.
//!
//! ERROR HANDLING
//! ==============
//! The check path fails open at the caller (availability over enforcement
//! for a marketing demo). The increment path retries a bounded number of
//! times and then logs and drops: a silently-failed increment erodes the
//! quota, so it must at least be loud.

pub mod pg;
pub mod store;

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{error, warn};
use uuid::Uuid;

use store::{StoreError, UsageEntry, UsageStore};

const INCREMENT_RETRIES: usize = 2;
const INCREMENT_RETRY_BASE_MS: u64 = 20;

/// How many recent conversation ids are remembered for dedup.
const RECENT_CONVERSATIONS_CAP: usize = 1024;

/// Read-only view of an identity's usage in the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub used: u32,
    pub reset_at: u64,
    /// Set when the lookup found an expired entry — the previous window's
    /// final count, used by the abuse tracker's rapid-reset heuristic.
    pub expired_count: Option<u32>,
    /// Reset time of the expired entry, when present.
    pub expired_reset_at: Option<u64>,
}

struct RecentConversations {
    seen: HashSet<Uuid>,
    order: VecDeque<Uuid>,
}

impl RecentConversations {
    fn new() -> Self {
        Self { seen: HashSet::new(), order: VecDeque::new() }
    }

    /// Returns false if the id was already recorded.
    fn insert(&mut self, id: Uuid) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > RECENT_CONVERSATIONS_CAP {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }
}

/// Keyed usage counter store. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct UsageLedger {
    store: Arc<dyn UsageStore>,
    recent: Arc<Mutex<RecentConversations>>,
    window_secs: u64,
}

impl UsageLedger {
    #[must_use]
    pub fn new(store: Arc<dyn UsageStore>, window_secs: u64) -> Self {
        Self {
            store,
            recent: Arc::new(Mutex::new(RecentConversations::new())),
            window_secs,
        }
    }

    #[must_use]
    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    /// Look up current usage for a key. Read-only: no entry is created and
    /// nothing is mutated. An expired entry reads as zero usage with a
    /// freshly computed reset time.
    ///
    /// # Errors
    ///
    /// Returns the store error; the caller decides the fail-open posture.
    pub async fn check(&self, key: &str, now: u64) -> Result<UsageSnapshot, StoreError> {
        let entry = self.store.get(key).await?;
        Ok(match entry {
            Some(e) if !e.is_expired(now) => UsageSnapshot {
                used: e.count,
                reset_at: e.reset_at,
                expired_count: None,
                expired_reset_at: None,
            },
            Some(e) => UsageSnapshot {
                used: 0,
                reset_at: now + self.window_secs,
                expired_count: Some(e.count),
                expired_reset_at: Some(e.reset_at),
            },
            None => UsageSnapshot {
                used: 0,
                reset_at: now + self.window_secs,
                expired_count: None,
                expired_reset_at: None,
            },
        })
    }

    /// Record one completed conversation against a key.
    ///
    /// Callers on the completion path should pass a `conversation_id`;
    /// duplicate ids within the recent window are dropped so a retried
    /// completion call cannot double-charge. Without an id, at-most-once
    /// delivery is the caller's responsibility.
    ///
    /// Store failures are retried with backoff, then logged and dropped —
    /// the user-visible response must not block on a failed increment.
    pub async fn record_conversation(
        &self,
        key: &str,
        conversation_id: Option<Uuid>,
        now: u64,
    ) -> Option<UsageEntry> {
        if let Some(id) = conversation_id {
            let fresh = self
                .recent
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(id);
            if !fresh {
                warn!(%id, key, "duplicate conversation completion ignored");
                return None;
            }
        }

        let mut delay = Duration::from_millis(INCREMENT_RETRY_BASE_MS);
        for attempt in 0..=INCREMENT_RETRIES {
            match self.store.increment(key, now, self.window_secs).await {
                Ok(entry) => return Some(entry),
                Err(e) if attempt < INCREMENT_RETRIES => {
                    warn!(key, attempt, error = %e, "usage increment failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    error!(key, error = %e, "usage increment dropped after retries");
                }
            }
        }
        None
    }

    /// Prune entries past their reset time. Lazy expiry already keeps reads
    /// correct; this only bounds memory.
    pub async fn sweep(&self, now: u64) -> Result<u64, StoreError> {
        self.store.delete_expired(now).await
    }

    /// Direct store access for seeding entries in tests.
    #[cfg(test)]
    pub async fn seed(&self, key: &str, entry: UsageEntry) -> Result<(), StoreError> {
        self.store.upsert(key, entry).await
    }
}

/// Current unix time in seconds.
#[must_use]
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
