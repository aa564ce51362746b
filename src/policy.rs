//! Limit policy — the allow/deny decision over a ledger snapshot.
//!
//! DESIGN
//! ======
//! Pure function of (snapshot, overrides, limit); no I/O, no clocks, no
//! state. Override precedence, strongest first:
//!
//! 1. caller brought their own API keys — the quota exists only to ration
//!    the operator's LLM spend, so their own credentials are unmetered;
//! 2. admin email;
//! 3. developer bypass (a fixed literal identity honored outside production);
//! 4. otherwise allow iff `used < limit`.
//!
//! Even a request with no resolvable identifier gets a decision on the
//! fallback key: the product fails open rather than locking out the demo.

use serde::Serialize;

use crate::ledger::UsageSnapshot;

/// Sentinel limit reported when no quota applies.
pub const UNLIMITED: u32 = u32::MAX;

/// Why the decision came out the way it did. Machine-readable, stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionReason {
    OwnApiKeys,
    AdminBypass,
    DeveloperBypass,
    WithinLimit,
    LimitExceeded,
}

/// Bypass flags resolved by the caller before deciding.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub has_own_api_keys: bool,
    pub is_admin: bool,
    pub is_developer_bypass: bool,
}

/// The decision handed back to the HTTP layer. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimitDecision {
    pub allowed: bool,
    pub used: u32,
    pub limit: u32,
    pub reset_at: u64,
    pub reason: DecisionReason,
}

/// Decide whether another conversation is allowed.
#[must_use]
pub fn decide(snapshot: UsageSnapshot, overrides: Overrides, limit: u32) -> LimitDecision {
    if overrides.has_own_api_keys {
        return LimitDecision {
            allowed: true,
            used: snapshot.used,
            limit: UNLIMITED,
            reset_at: snapshot.reset_at,
            reason: DecisionReason::OwnApiKeys,
        };
    }
    if overrides.is_admin {
        return LimitDecision {
            allowed: true,
            used: snapshot.used,
            limit: UNLIMITED,
            reset_at: snapshot.reset_at,
            reason: DecisionReason::AdminBypass,
        };
    }
    if overrides.is_developer_bypass {
        return LimitDecision {
            allowed: true,
            used: snapshot.used,
            limit: UNLIMITED,
            reset_at: snapshot.reset_at,
            reason: DecisionReason::DeveloperBypass,
        };
    }

    let allowed = snapshot.used < limit;
    LimitDecision {
        allowed,
        used: snapshot.used,
        limit,
        reset_at: snapshot.reset_at,
        reason: if allowed { DecisionReason::WithinLimit } else { DecisionReason::LimitExceeded },
    }
}

#[cfg(test)]
#[path = "policy_test.rs"]
mod tests;
