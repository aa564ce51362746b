//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The service fronts the chat demo's conversation flow: clients call the
//! usage-check endpoint before starting a conversation, the completion
//! handler (an external collaborator) calls the increment endpoint exactly
//! once per finished conversation, and the admin dashboard reads the abuse
//! aggregate. The attempt gate has its own pair of endpoints stacked in
//! front of the conversation flow.

pub mod admin;
pub mod attempts;
pub mod usage;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

#[must_use]
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/usage/check", post(usage::check))
        .route("/api/usage/increment", post(usage::increment))
        .route("/api/usage/status", get(usage::status))
        .route("/api/identity/persistent-id", post(usage::issue_persistent_id))
        .route(
            "/api/attempts",
            get(attempts::status).post(attempts::record),
        )
        .route("/api/admin/abuse", get(admin::abuse_summary))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
