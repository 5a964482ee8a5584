//! vxm-tracker: experiment tracking for registration runs
//!
//! This crate provides the observability edge of vxm-infer. Metrics, result
//! tables and media produced while registering subjects are pushed to an
//! external experiment-tracking service through the [`MetricsSink`]
//! capability.
//!
//! Delivery is best effort: a sink never returns an error to its caller.

pub mod config;
pub mod error;
pub mod fakes;
pub mod http;
pub mod session;
pub mod sink;

pub use config::{TrackerConfig, DEFAULT_PROJECT};
pub use error::TrackerError;
pub use http::{dropped_events, HttpTracker, RunHandle};
pub use sink::{
    EpochMetrics, MediaRef, MetricsSink, NoopSink, ScalarMap, StepMetrics, TablePayload,
    WatchTarget, DEFAULT_VIDEO_FPS,
};

/// Result type for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;
