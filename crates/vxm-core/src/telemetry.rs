//! Tracing initialisation for `vxm-infer`.
//!
//! Logs always go to stderr so stdout carries only the run report (or the
//! resolved config with `--print-config`).
//!
//! Safe to call more than once; subsequent calls are silently ignored.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable with filter directives, checked before `RUST_LOG`.
pub const LOG_ENV: &str = "VXM_LOG";

/// Filter from `VXM_LOG`, then `RUST_LOG`, then `level`.
pub fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Initialise the global tracing subscriber.
///
/// With `json` every event is one JSON object per line, which keeps the
/// `event = "..."` fields of [`crate::obs`] machine readable.
pub fn init_tracing(json: bool, level: Level) {
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    if json {
        tracing_subscriber::registry()
            .with(env_filter(level))
            .with(layer.json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter(level))
            .with(layer)
            .try_init()
            .ok();
    }
}
