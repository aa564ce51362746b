//! Admin abuse surface.
//!
//! Read-only aggregate consumed by the admin dashboard's analytics renderer.
//! Guarded by a shared token: without `ADMIN_TOKEN` configured the endpoint
//! does not exist (404), a wrong token is 401.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use serde::Serialize;

use crate::abuse::{AbuseRecord, AbuseSummary};
use crate::state::AppState;

const RECENT_RECORDS_LIMIT: usize = 50;

#[derive(Debug, Serialize)]
pub struct AbuseReport {
    #[serde(flatten)]
    pub summary: AbuseSummary,
    pub recent: Vec<AbuseRecord>,
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), StatusCode> {
    let Some(expected) = state.config.admin_token.as_deref() else {
        return Err(StatusCode::NOT_FOUND);
    };
    let supplied = headers
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if supplied == expected {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

/// `GET /api/admin/abuse` — aggregate counts plus recent records.
pub async fn abuse_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AbuseReport>, StatusCode> {
    authorize(&state, &headers)?;
    Ok(Json(AbuseReport {
        summary: state.abuse.summary(),
        recent: state.abuse.recent_records(RECENT_RECORDS_LIMIT),
    }))
}

#[cfg(test)]
#[path = "admin_test.rs"]
mod tests;
