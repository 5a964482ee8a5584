//! Error types for vxm-tracker

use thiserror::Error;

/// Errors that can occur while talking to the tracking service.
///
/// These never leave the crate through [`crate::MetricsSink`]; they are
/// logged at debug level and counted as dropped events.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Tracking is configured but no endpoint was given
    #[error("Tracker endpoint is not configured")]
    NotConfigured,

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// The service answered with a non-success status
    #[error("Tracker responded with status {status}: {body}")]
    Status { status: u16, body: String },

    /// IO error while reading a media artifact
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        TrackerError::Http(err.to_string())
    }
}
