//! Process-wide registration statistics.
//!
//! [`RunReport`](crate::RunReport) only exists for a run that finished. These
//! counters also cover the run that aborted on a failing subject, and they
//! keep per-subject wall time, which the report does not. The CLI logs them
//! once on exit with [`RegistrationStats::flush`].

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: RegistrationStats = RegistrationStats::new();

pub struct RegistrationStats {
    registered: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    rounds: AtomicU64,
    total_ms: AtomicU64,
    slowest_ms: AtomicU64,
}

/// Point-in-time copy of [`RegistrationStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub registered: u64,
    pub skipped: u64,
    pub failed: u64,
    pub rounds: u64,
    pub total_ms: u64,
    pub slowest_ms: u64,
}

impl StatsSnapshot {
    /// Mean wall time of a successful registration, 0 when there were none.
    pub fn mean_ms(&self) -> u64 {
        self.total_ms.checked_div(self.registered).unwrap_or(0)
    }
}

impl RegistrationStats {
    pub const fn new() -> Self {
        Self {
            registered: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            rounds: AtomicU64::new(0),
            total_ms: AtomicU64::new(0),
            slowest_ms: AtomicU64::new(0),
        }
    }

    pub fn record_registered(&self, duration_ms: u64) {
        self.registered.fetch_add(1, Ordering::Relaxed);
        self.total_ms.fetch_add(duration_ms, Ordering::Relaxed);
        self.slowest_ms.fetch_max(duration_ms, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_round(&self) {
        self.rounds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            registered: self.registered.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rounds: self.rounds.load(Ordering::Relaxed),
            total_ms: self.total_ms.load(Ordering::Relaxed),
            slowest_ms: self.slowest_ms.load(Ordering::Relaxed),
        }
    }

    /// Log the current values as one `run.stats` event.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            event = "run.stats",
            subjects_registered = s.registered,
            subjects_skipped = s.skipped,
            subjects_failed = s.failed,
            rounds_completed = s.rounds,
            mean_registration_ms = s.mean_ms(),
            slowest_registration_ms = s.slowest_ms,
        );
    }
}

impl Default for RegistrationStats {
    fn default() -> Self {
        Self::new()
    }
}
