mod abuse;
mod config;
mod db;
mod identity;
mod ledger;
mod policy;
mod rate_limit;
mod routes;
mod state;
mod sweep;

use std::sync::Arc;

use ledger::pg::PgUsageStore;
use ledger::store::{InMemoryStore, UsageStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");

    let limit_config = config::LimitConfig::from_env();
    tracing::info!(
        free_limit = limit_config.free_limit,
        window_secs = limit_config.window_secs,
        production = limit_config.production,
        "limit policy configured"
    );

    // Shared Postgres store when configured; per-process in-memory otherwise.
    // The in-memory store is correct for a single instance only.
    let store: Arc<dyn UsageStore> = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = db::init_pool(&url).await.expect("database init failed");
            tracing::info!("usage store backed by Postgres");
            Arc::new(PgUsageStore::new(pool))
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set — using in-memory usage store (single instance only)");
            Arc::new(InMemoryStore::new())
        }
    };

    let state = state::AppState::new(limit_config, store);

    let _sweeper = sweep::spawn_sweep_task(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "quotagate listening");
    // Connect info feeds the transport-address fallback when no proxy
    // headers are present.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .expect("server failed");
}
