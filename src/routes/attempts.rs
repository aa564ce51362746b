//! Coarse attempt-gate handlers.
//!
//! The gate keys on transport-level signals only (IP, truncated user agent,
//! truncated accept-language) so it can run before any body parsing or
//! identity resolution. Denials come back as 429 with the same status body
//! the allow path uses, so clients render the wait time uniformly.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};

use crate::identity::ip::client_ip;
use crate::rate_limit::coarse_key;
use crate::state::AppState;

fn gate_key(state: &AppState, headers: &HeaderMap, remote_addr: SocketAddr) -> String {
    let ip = client_ip(headers, Some(remote_addr.ip()), state.config.production);
    let ua = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let lang = headers
        .get("accept-language")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    coarse_key(&ip, ua, lang)
}

/// `GET /api/attempts` — read-only gate standing for this client.
pub async fn status(
    State(state): State<AppState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let status = state.gate.status(&gate_key(&state, &headers, remote_addr));
    Json(status).into_response()
}

/// `POST /api/attempts` — record one attempt; 429 with the same body shape
/// when the window is exhausted.
pub async fn record(
    State(state): State<AppState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let status = state.gate.record_attempt(&gate_key(&state, &headers, remote_addr));
    if status.allowed {
        Json(status).into_response()
    } else {
        (StatusCode::TOO_MANY_REQUESTS, Json(status)).into_response()
    }
}

#[cfg(test)]
#[path = "attempts_test.rs"]
mod tests;
