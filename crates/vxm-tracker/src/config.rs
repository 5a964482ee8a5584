//! Tracker configuration

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Project name runs are filed under unless configured otherwise.
pub const DEFAULT_PROJECT: &str = "Voxel Morph";

/// Tracking-service configuration, as found under `tracker:` in the run config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Whether a tracking session should be started at all
    pub enabled: bool,
    /// Base URL of the tracking service
    pub endpoint: Option<String>,
    /// Project the run is filed under
    pub project: String,
    /// Display name of the run
    #[serde(deserialize_with = "optional_scalar_string")]
    pub run_name: Option<String>,
    /// API key (falls back to `VXM_TRACKER_API_KEY`); never written back out
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Sweep mode: the sweep agent owns project, name and config
    pub sweep: bool,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            enabled: false,
            endpoint: std::env::var("VXM_TRACKER_ENDPOINT").ok(),
            project: DEFAULT_PROJECT.to_string(),
            run_name: None,
            api_key: std::env::var("VXM_TRACKER_API_KEY").ok(),
            sweep: false,
            timeout_secs: 10,
        }
    }
}

/// Any scalar reads as a string, so `run_name: 7` names the run `"7"`.
fn optional_scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "run_name must be a scalar, found {other}"
        ))),
    }
}

impl TrackerConfig {
    /// Create an enabled config for a specific endpoint
    pub fn new(endpoint: &str) -> Self {
        TrackerConfig {
            enabled: true,
            endpoint: Some(endpoint.trim_end_matches('/').to_string()),
            ..Self::default()
        }
    }

    /// Set the run name
    pub fn with_run_name(mut self, name: &str) -> Self {
        self.run_name = Some(name.to_string());
        self
    }

    /// Switch to sweep mode
    pub fn in_sweep(mut self) -> Self {
        self.sweep = true;
        self
    }
}
