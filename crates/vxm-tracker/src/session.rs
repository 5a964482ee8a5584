//! Process-scoped tracking session.
//!
//! At most one run is active per process. Starting a session when one is
//! already active reuses it, unless the new session is a sweep session, in
//! which case the sweep agent's run replaces it.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, info};

use crate::config::TrackerConfig;
use crate::http::HttpTracker;
use crate::Result;

static ACTIVE: Mutex<Option<Arc<HttpTracker>>> = Mutex::new(None);

fn slot() -> std::sync::MutexGuard<'static, Option<Arc<HttpTracker>>> {
    ACTIVE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Start (or reuse) the process's tracking session.
pub async fn start(config: &TrackerConfig, run_config: &Value) -> Result<Arc<HttpTracker>> {
    if !config.sweep {
        if let Some(existing) = active() {
            debug!(event = "tracker.session_reused", run_id = %existing.run().run_id);
            return Ok(existing);
        }
    }

    let tracker = Arc::new(HttpTracker::start(config, run_config).await?);
    info!(
        event = "tracker.session_started",
        run_id = %tracker.run().run_id,
        sweep = config.sweep,
    );
    *slot() = Some(Arc::clone(&tracker));
    Ok(tracker)
}

/// The active session, if any.
pub fn active() -> Option<Arc<HttpTracker>> {
    slot().clone()
}

/// End the active session and return it.
pub fn finish() -> Option<Arc<HttpTracker>> {
    slot().take()
}
