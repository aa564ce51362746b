//! Coarse attempt gate — the first-pass limit before a conversation starts.
//!
//! DESIGN
//! ======
//! Fixed-window counters backed by `HashMap<String, AttemptEntry>` keyed by
//! IP + truncated user agent + truncated accept-language. Much coarser and
//! cheaper than full identity resolution; it sits in front of the per-
//! conversation ledger check and the two stack.
//!
//! Fixed policy: 3 attempts per 24-hour window per coarse identity. Windows
//! reset lazily on the first check after expiry, same semantics as the
//! usage ledger. Entries are pruned by the hourly sweep to bound memory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_ATTEMPT_WINDOW_SECS: u64 = 86_400;

const UA_KEY_LEN: usize = 32;
const LANG_KEY_LEN: usize = 16;

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[derive(Clone, Copy)]
struct GateConfig {
    max_attempts: u32,
    window: Duration,
}

impl GateConfig {
    fn from_env() -> Self {
        Self {
            max_attempts: env_parse("ATTEMPT_LIMIT", DEFAULT_MAX_ATTEMPTS),
            window: Duration::from_secs(env_parse(
                "ATTEMPT_WINDOW_SECS",
                DEFAULT_ATTEMPT_WINDOW_SECS,
            )),
        }
    }
}

/// Build the coarse identity key from transport-level signals.
#[must_use]
pub fn coarse_key(ip: &str, user_agent: &str, accept_language: &str) -> String {
    let ua: String = user_agent.chars().take(UA_KEY_LEN).collect();
    let lang: String = accept_language.chars().take(LANG_KEY_LEN).collect();
    format!("{ip}|{ua}|{lang}")
}

#[derive(Debug, Clone, Copy)]
struct AttemptEntry {
    attempts: u32,
    reset_at: u64,
}

/// Gate status returned by every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateStatus {
    pub allowed: bool,
    pub attempts: u32,
    pub remaining: u32,
    pub reset_at: u64,
}

#[derive(Clone)]
pub struct AttemptGate {
    inner: Arc<Mutex<HashMap<String, AttemptEntry>>>,
    config: GateConfig,
}

impl AttemptGate {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            config: GateConfig::from_env(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, AttemptEntry>> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn status_of(&self, entry: Option<AttemptEntry>, now: u64) -> GateStatus {
        let window_secs = self.config.window.as_secs();
        match entry {
            Some(e) if now < e.reset_at => GateStatus {
                allowed: e.attempts < self.config.max_attempts,
                attempts: e.attempts,
                remaining: self.config.max_attempts.saturating_sub(e.attempts),
                reset_at: e.reset_at,
            },
            // Expired or unseen: lazy reset, full quota.
            _ => GateStatus {
                allowed: self.config.max_attempts > 0,
                attempts: 0,
                remaining: self.config.max_attempts,
                reset_at: now + window_secs,
            },
        }
    }

    /// Read-only check: would an attempt be allowed right now?
    #[must_use]
    pub fn can_attempt(&self, key: &str) -> GateStatus {
        self.can_attempt_at(key, crate::ledger::unix_now())
    }

    fn can_attempt_at(&self, key: &str, now: u64) -> GateStatus {
        let entry = self.lock().get(key).copied();
        self.status_of(entry, now)
    }

    /// Check and record one attempt under a single lock. Denied attempts are
    /// not recorded.
    pub fn record_attempt(&self, key: &str) -> GateStatus {
        self.record_attempt_at(key, crate::ledger::unix_now())
    }

    fn record_attempt_at(&self, key: &str, now: u64) -> GateStatus {
        let window_secs = self.config.window.as_secs();
        let mut map = self.lock();

        let entry = map.get(key).copied().filter(|e| now < e.reset_at);
        let status = self.status_of(entry, now);
        if !status.allowed {
            return status;
        }

        let updated = match entry {
            Some(e) => AttemptEntry { attempts: e.attempts + 1, reset_at: e.reset_at },
            None => AttemptEntry { attempts: 1, reset_at: now + window_secs },
        };
        map.insert(key.to_owned(), updated);

        GateStatus {
            allowed: true,
            attempts: updated.attempts,
            remaining: self.config.max_attempts.saturating_sub(updated.attempts),
            reset_at: updated.reset_at,
        }
    }

    /// Current standing for a key without mutating anything.
    #[must_use]
    pub fn status(&self, key: &str) -> GateStatus {
        self.can_attempt(key)
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn sweep(&self, now: u64) -> usize {
        let mut map = self.lock();
        let before = map.len();
        map.retain(|_, e| now < e.reset_at);
        before - map.len()
    }
}

impl Default for AttemptGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
