//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the immutable policy config plus the three shared subsystems: the
//! usage ledger, the coarse attempt gate, and the abuse tracker. All members
//! are Arc-backed so the state clones cheaply per request.

use std::sync::Arc;

use crate::abuse::AbuseTracker;
use crate::config::LimitConfig;
use crate::ledger::UsageLedger;
use crate::ledger::store::UsageStore;
use crate::rate_limit::AttemptGate;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<LimitConfig>,
    pub ledger: UsageLedger,
    pub gate: AttemptGate,
    pub abuse: AbuseTracker,
}

impl AppState {
    #[must_use]
    pub fn new(config: LimitConfig, store: Arc<dyn UsageStore>) -> Self {
        let ledger = UsageLedger::new(store, config.window_secs);
        let abuse = AbuseTracker::new(
            config.abuse_ip_threshold,
            config.window_secs,
            config.rapid_reset_grace_secs,
        );
        Self {
            config: Arc::new(config),
            ledger,
            gate: AttemptGate::new(),
            abuse,
        }
    }
}


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
