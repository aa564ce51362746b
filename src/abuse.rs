//! Abuse signal tracking — observability, never enforcement.
//!
//! DESIGN
//! ======
//! Two heuristics are recorded to an append-only, capped log read by the
//! admin surface:
//!
//! - identifier collision: the same device composite reappearing under N or
//!   more distinct IPs within one window (IP cycling);
//! - rapid reset: a key that exhausted its quota showing up again shortly
//!   after the window expired (reset gaming).
//!
//! Records never influence a limit decision. Detection stays decoupled from
//! enforcement so a false positive cannot lock a real user out of the demo;
//! tightening that is a product decision, not a code path here.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::info;

const MAX_RECORDS: usize = 10_000;

/// Cap on identities listed in a summary, to keep the admin payload small.
const SUMMARY_DISPLAY_CAP: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbuseKind {
    IdentifierCollision,
    RapidResetAttempt,
}

/// One appended observation. Keys are already digested/derived identifiers,
/// never raw emails or full user agents.
#[derive(Debug, Clone, Serialize)]
pub struct AbuseRecord {
    pub kind: AbuseKind,
    pub key: String,
    pub observed_at: u64,
    pub detail: String,
}

/// Read-only aggregate for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct AbuseSummary {
    pub identifier_collisions: u64,
    pub rapid_resets: u64,
    /// Distinct suspicious identities, capped for display.
    pub suspicious_identities: Vec<String>,
}

struct DeviceIps {
    ips: HashSet<String>,
    window_start: u64,
    flagged: bool,
}

struct TrackerInner {
    device_ips: HashMap<String, DeviceIps>,
    /// Keys already flagged for a rapid reset, by the expired window's reset
    /// time. One record per key per expired window, mirroring the collision
    /// path, so a denied client polling the check endpoint cannot flood the
    /// record log.
    rapid_reset_flags: HashMap<String, u64>,
    records: Vec<AbuseRecord>,
    identifier_collisions: u64,
    rapid_resets: u64,
}

#[derive(Clone)]
pub struct AbuseTracker {
    inner: Arc<Mutex<TrackerInner>>,
    ip_threshold: usize,
    window_secs: u64,
    /// Grace period after window expiry within which a return counts as a
    /// rapid reset.
    rapid_reset_grace_secs: u64,
}

impl AbuseTracker {
    #[must_use]
    pub fn new(ip_threshold: usize, window_secs: u64, rapid_reset_grace_secs: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TrackerInner {
                device_ips: HashMap::new(),
                rapid_reset_flags: HashMap::new(),
                records: Vec::new(),
                identifier_collisions: 0,
                rapid_resets: 0,
            })),
            ip_threshold,
            window_secs,
            rapid_reset_grace_secs,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Record a device/IP pairing seen on a check. Appends a collision
    /// record the first time the device crosses the IP threshold within the
    /// current observation window.
    pub fn record_observation(&self, device_key: &str, ip: &str, now: u64) {
        if device_key.is_empty() || ip.is_empty() || ip == "unknown" {
            return;
        }
        let mut inner = self.lock();
        let crossed_threshold = {
            let entry = inner.device_ips.entry(device_key.to_owned()).or_insert_with(|| {
                DeviceIps { ips: HashSet::new(), window_start: now, flagged: false }
            });

            if now.saturating_sub(entry.window_start) >= self.window_secs {
                entry.ips.clear();
                entry.window_start = now;
                entry.flagged = false;
            }
            entry.ips.insert(ip.to_owned());

            if entry.ips.len() >= self.ip_threshold && !entry.flagged {
                entry.flagged = true;
                Some(entry.ips.len())
            } else {
                None
            }
        };

        if let Some(distinct) = crossed_threshold {
            info!(device = device_key, distinct_ips = distinct, "identifier collision observed");
            push_record(
                &mut inner,
                AbuseRecord {
                    kind: AbuseKind::IdentifierCollision,
                    key: device_key.to_owned(),
                    observed_at: now,
                    detail: format!("{distinct} distinct IPs within window"),
                },
            );
            inner.identifier_collisions += 1;
        }
    }

    /// Record a rapid-reset attempt: a key whose quota-exhausted window
    /// expired at `expired_reset_at` with `expired_count` uses, re-seen at
    /// `now`. Only counts when the key comes back within the grace period,
    /// and at most once per expired window.
    pub fn record_rapid_reset(&self, key: &str, expired_count: u32, expired_reset_at: u64, limit: u32, now: u64) {
        if expired_count < limit {
            return;
        }
        if now.saturating_sub(expired_reset_at) > self.rapid_reset_grace_secs {
            return;
        }
        let mut inner = self.lock();
        if inner.rapid_reset_flags.get(key) == Some(&expired_reset_at) {
            return;
        }
        inner.rapid_reset_flags.insert(key.to_owned(), expired_reset_at);
        info!(key, expired_count, "rapid reset attempt observed");
        push_record(
            &mut inner,
            AbuseRecord {
                kind: AbuseKind::RapidResetAttempt,
                key: key.to_owned(),
                observed_at: now,
                detail: format!(
                    "returned {}s after exhausting {expired_count} uses",
                    now.saturating_sub(expired_reset_at)
                ),
            },
        );
        inner.rapid_resets += 1;
    }

    /// Aggregate view for the admin surface.
    #[must_use]
    pub fn summary(&self) -> AbuseSummary {
        let inner = self.lock();
        let mut identities: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        // Most recent records first.
        for record in inner.records.iter().rev() {
            if identities.len() >= SUMMARY_DISPLAY_CAP {
                break;
            }
            if seen.insert(record.key.clone()) {
                identities.push(record.key.clone());
            }
        }
        AbuseSummary {
            identifier_collisions: inner.identifier_collisions,
            rapid_resets: inner.rapid_resets,
            suspicious_identities: identities,
        }
    }

    /// Recent raw records, newest last, capped at `limit`.
    #[must_use]
    pub fn recent_records(&self, limit: usize) -> Vec<AbuseRecord> {
        let inner = self.lock();
        let skip = inner.records.len().saturating_sub(limit);
        inner.records[skip..].to_vec()
    }

    /// Drop device observation windows and rapid-reset flags that have gone
    /// stale. The record log is capped, not pruned: it is the audit trail.
    pub fn prune(&self, now: u64) {
        let window = self.window_secs;
        let grace = self.rapid_reset_grace_secs;
        let mut inner = self.lock();
        inner
            .device_ips
            .retain(|_, entry| now.saturating_sub(entry.window_start) < window);
        // A flag only suppresses duplicates while the window is still within
        // grace; past that the time check rejects the key anyway.
        inner
            .rapid_reset_flags
            .retain(|_, reset_at| now.saturating_sub(*reset_at) <= grace);
    }
}

fn push_record(inner: &mut TrackerInner, record: AbuseRecord) {
    if inner.records.len() >= MAX_RECORDS {
        inner.records.remove(0);
    }
    inner.records.push(record);
}

#[cfg(test)]
#[path = "abuse_test.rs"]
mod tests;
