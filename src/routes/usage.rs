//! Usage check / increment / status handlers.
//!
//! DESIGN
//! ======
//! The check endpoint is strictly read-only and must answer even when every
//! optional identifier is missing or the store is down (fail open). The
//! increment endpoint is called once by the conversation-completion
//! collaborator, never from the check path, to keep per-conversation
//! counting honest.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::HeaderMap;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::identity::{self, RawIdentity};
use crate::ledger::{UsageSnapshot, unix_now};
use crate::policy::{self, DecisionReason, Overrides};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CheckRequest {
    #[serde(flatten)]
    pub identity: RawIdentity,
    /// Caller supplied their own LLM API keys; their usage is unmetered.
    #[serde(default)]
    pub has_own_keys: bool,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
    pub used: u32,
    pub limit: u32,
    pub reset_at: u64,
    pub has_own_keys: bool,
    pub reason: DecisionReason,
}

#[derive(Debug, Deserialize)]
pub struct IncrementRequest {
    #[serde(flatten)]
    pub identity: RawIdentity,
    /// Unique id of the completed conversation; duplicates are dropped.
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub used: u32,
    pub limit: u32,
    pub reset_at: u64,
}

/// Identifiers as query parameters for the read-only status endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub email: Option<String>,
    pub fingerprint: Option<String>,
    pub persistent_id: Option<String>,
    pub session_id: Option<String>,
}

impl StatusQuery {
    fn into_raw(self) -> RawIdentity {
        RawIdentity {
            email: self.email,
            fingerprint: self.fingerprint,
            signals: None,
            persistent_id: self.persistent_id,
            session_id: self.session_id,
        }
    }
}

fn resolve_overrides(state: &AppState, raw: &RawIdentity, email: Option<&str>, has_own_keys: bool) -> Overrides {
    Overrides {
        has_own_api_keys: has_own_keys,
        is_admin: email.is_some_and(|e| state.config.is_admin_email(e)),
        // The bypass literal is matched on the raw session id: it is not a
        // valid session id by the normal rules and never reaches the ledger.
        is_developer_bypass: raw
            .session_id
            .as_deref()
            .is_some_and(|sid| state.config.is_dev_bypass(sid.trim())),
    }
}

/// Look up current usage, failing open when the store is unavailable.
async fn snapshot_or_open(state: &AppState, key: &str, now: u64) -> UsageSnapshot {
    match state.ledger.check(key, now).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(key, error = %e, "usage lookup failed, failing open");
            UsageSnapshot {
                used: 0,
                reset_at: now + state.ledger.window_secs(),
                expired_count: None,
                expired_reset_at: None,
            }
        }
    }
}

fn observe(state: &AppState, ids: &identity::Identifiers, key: &str, snapshot: UsageSnapshot, now: u64) {
    if let Some(device) = ids.device_key() {
        state.abuse.record_observation(&device, &ids.ip, now);
    }
    if let (Some(count), Some(reset_at)) = (snapshot.expired_count, snapshot.expired_reset_at) {
        state
            .abuse
            .record_rapid_reset(key, count, reset_at, state.config.free_limit, now);
    }
}

/// `POST /api/usage/check` — read-only limit decision.
pub async fn check(
    State(state): State<AppState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<CheckRequest>,
) -> Json<CheckResponse> {
    let now = unix_now();
    let ids = identity::resolve(&headers, Some(remote_addr.ip()), &body.identity, state.config.production);
    if ids.is_anonymous_fallback() {
        warn!("usage check with no resolvable identifier, using fallback key");
    }
    let key = identity::ledger_key(&ids);

    let snapshot = snapshot_or_open(&state, &key, now).await;
    observe(&state, &ids, &key, snapshot, now);

    let overrides = resolve_overrides(&state, &body.identity, ids.email.as_deref(), body.has_own_keys);
    let decision = policy::decide(snapshot, overrides, state.config.free_limit);

    Json(CheckResponse {
        allowed: decision.allowed,
        used: decision.used,
        limit: decision.limit,
        reset_at: decision.reset_at,
        has_own_keys: body.has_own_keys,
        reason: decision.reason,
    })
}

/// `POST /api/usage/increment` — record one completed conversation.
///
/// Invoked by the completion handler only. Duplicate `conversation_id`s and
/// store failures both degrade to reporting current usage rather than
/// erroring: the user-visible response never blocks on the increment.
pub async fn increment(
    State(state): State<AppState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<IncrementRequest>,
) -> Json<UsageResponse> {
    let now = unix_now();
    let ids = identity::resolve(&headers, Some(remote_addr.ip()), &body.identity, state.config.production);
    let key = identity::ledger_key(&ids);

    let response = match state
        .ledger
        .record_conversation(&key, body.conversation_id, now)
        .await
    {
        Some(entry) => UsageResponse {
            used: entry.count,
            limit: state.config.free_limit,
            reset_at: entry.reset_at,
        },
        None => {
            let snapshot = snapshot_or_open(&state, &key, now).await;
            UsageResponse {
                used: snapshot.used,
                limit: state.config.free_limit,
                reset_at: snapshot.reset_at,
            }
        }
    };

    Json(response)
}

/// `GET /api/usage/status` — current usage without a decision.
pub async fn status(
    State(state): State<AppState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<StatusQuery>,
) -> Json<UsageResponse> {
    let now = unix_now();
    let ids = identity::resolve(&headers, Some(remote_addr.ip()), &query.into_raw(), state.config.production);
    let key = identity::ledger_key(&ids);
    let snapshot = snapshot_or_open(&state, &key, now).await;

    Json(UsageResponse {
        used: snapshot.used,
        limit: state.config.free_limit,
        reset_at: snapshot.reset_at,
    })
}

#[derive(Debug, Serialize)]
pub struct PersistentIdResponse {
    pub persistent_id: String,
}

/// `POST /api/identity/persistent-id` — issue a fresh persistent-id token
/// for the client to cache in durable storage. Clients that cannot reach
/// storage just request a new one next visit.
pub async fn issue_persistent_id() -> Json<PersistentIdResponse> {
    Json(PersistentIdResponse {
        persistent_id: identity::fingerprint::generate_persistent_id(),
    })
}

#[cfg(test)]
#[path = "usage_test.rs"]
mod tests;
