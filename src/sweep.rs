//! Background sweep — hourly pruning of expired state.
//!
//! DESIGN
//! ======
//! Lazy expiry keeps every read correct without this task; the sweep only
//! bounds memory (and table size on Postgres) by deleting entries past
//! their reset time and dropping stale abuse-observation windows.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::ledger::unix_now;
use crate::state::AppState;

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3_600;

/// Spawn the hourly sweep task. Returns a handle for shutdown.
pub fn spawn_sweep_task(state: AppState) -> JoinHandle<()> {
    let interval_secs = crate::config::env_parse("SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS);
    info!(interval_secs, "usage sweep configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately; skip it so startup stays quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            run_sweep(&state).await;
        }
    })
}

async fn run_sweep(state: &AppState) {
    let now = unix_now();
    match state.ledger.sweep(now).await {
        Ok(removed) if removed > 0 => info!(removed, "swept expired usage entries"),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "usage sweep failed"),
    }
    let gate_removed = state.gate.sweep(now);
    if gate_removed > 0 {
        info!(removed = gate_removed, "swept expired attempt entries");
    }
    state.abuse.prune(now);
}
