//! Structured observability hooks for the inference round lifecycle.
//!
//! This module provides:
//! - A round-scoped tracing span via `round_span`
//! - Emission functions for round start/finish, subject outcomes and summaries
//!
//! Events are emitted at `info!` level unless noted. For JSON output, pass
//! `--json` to the CLI.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::domain::Round;

/// Round-scoped span; attach it to the round's future with
/// [`tracing::Instrument`].
///
/// ```ignore
/// run_round(..).instrument(round_span(round)).await
/// // every event inside carries round = N
/// ```
pub fn round_span(round: Round) -> tracing::Span {
    tracing::info_span!("vxm.round", round = round.get())
}

/// Emit event: a run is about to start, with detected and granted cores.
pub fn emit_cores_resolved(available: usize, using: usize) {
    info!(
        event = "run.cores",
        available = available,
        using = using,
        "Existing {available}, Using {using} cores"
    );
}

/// Emit event: round started reading from `moving`.
pub fn emit_round_started(round: Round, moving: &Path, subjects: usize) {
    info!(
        event = "round.started",
        round = round.get(),
        moving = %moving.display(),
        subjects = subjects,
    );
}

/// Emit event: round finished.
pub fn emit_round_finished(round: Round, registered: usize, skipped: usize, duration_ms: u64) {
    info!(
        event = "round.finished",
        round = round.get(),
        registered = registered,
        skipped = skipped,
        duration_ms = duration_ms,
    );
}

/// Emit event: one subject registered.
pub fn emit_subject_registered(round: Round, subject: &str, duration_ms: u64) {
    info!(
        event = "subject.registered",
        round = round.get(),
        subject = %subject,
        duration_ms = duration_ms,
    );
}

/// Emit event: subject skipped because its output already exists (debug level).
pub fn emit_subject_skipped(round: Round, subject: &str) {
    debug!(event = "subject.skipped", round = round.get(), subject = %subject);
}

/// Emit event: results table written, with its summary statistics.
pub fn emit_summary_written(round: Round, path: &Path, summary: &dyn std::fmt::Display) {
    info!(
        event = "summary.written",
        round = round.get(),
        path = %path.display(),
        "\n{summary}"
    );
}

/// Emit event: config snapshot could not be written (warning level).
pub fn emit_config_snapshot_failed(path: &Path, error: &dyn std::fmt::Display) {
    warn!(event = "config.snapshot_failed", path = %path.display(), error = %error);
}
