//! Run configuration.
//!
//! A run is described by one YAML document plus `key=value` overrides from
//! the command line. The resolved [`RunConfig`] is never mutated: each round
//! works on a [`RoundConfig`] derived from it by [`RunConfig::for_round`].

use std::path::{Path, PathBuf};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yml::{Mapping, Value};
use vxm_tracker::TrackerConfig;

use crate::domain::{Device, InferenceError, Result, Round, Transformation};
use crate::layout::{resolve_moving_source, RoundLayout};

/// File name of the reproducibility snapshot inside the model directory.
pub const SNAPSHOT_FILE: &str = "config.yaml";

/// Parallelism limit advertised to registrars regardless of hardware.
pub const DEFAULT_MAX_CORES: usize = 64;

fn default_backend() -> String {
    "pytorch".to_string()
}

fn default_max_cores() -> usize {
    DEFAULT_MAX_CORES
}

/// Accept any YAML scalar for a string field, so `dataset: 2023` reads as
/// `"2023"`.
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a scalar, found {other:?}"
        ))),
    }
}

/// How the per-subject registration process is launched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrarSettings {
    /// Command line prefix; per-subject arguments are appended.
    pub command: Vec<String>,
    /// Per-subject timeout, 0 for none.
    pub timeout_secs: u64,
}

impl Default for RegistrarSettings {
    fn default() -> Self {
        Self {
            command: vec![
                "python".to_string(),
                "scripts/register_single.py".to_string(),
            ],
            timeout_secs: 0,
        }
    }
}

/// Resolved configuration of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Model root; receives the snapshot and per-round checkpoint dirs.
    pub model_dir: PathBuf,
    /// Trained checkpoint to load.
    pub model_path: PathBuf,
    /// `dense` or `bspline`; validated when the run starts.
    #[serde(deserialize_with = "scalar_string")]
    pub transformation: String,
    #[serde(deserialize_with = "scalar_string")]
    pub dataset: String,
    /// Inference root.
    pub inference: PathBuf,
    /// Moving images of round 1.
    pub moving: PathBuf,
    #[serde(default)]
    pub epochs: u32,
    /// Number of GPUs; 0 runs on CPU.
    #[serde(default)]
    pub gpu: u32,
    /// Optional per-subject metadata CSV (inversion times).
    #[serde(rename = "TI_csv", default)]
    pub ti_csv: Option<PathBuf>,
    /// Numeric backend handed to the registrar.
    #[serde(default = "default_backend", deserialize_with = "scalar_string")]
    pub backend: String,
    #[serde(default = "default_max_cores")]
    pub max_cores: usize,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub registrar: RegistrarSettings,
    /// Top-level keys the driver does not interpret (optimiser settings and
    /// the like). Carried through so the snapshot is the whole document.
    #[serde(flatten)]
    pub extra: Mapping,
}

impl RunConfig {
    /// Load a YAML config file and apply `key=value` overrides.
    pub fn load<S: AsRef<str>>(path: &Path, overrides: &[S]) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_with_overrides(&raw, overrides)
    }

    pub fn from_yaml_with_overrides<S: AsRef<str>>(yaml: &str, overrides: &[S]) -> Result<Self> {
        let mut doc: Value = serde_yml::from_str(yaml)?;
        if doc.is_null() {
            doc = Value::Mapping(Mapping::new());
        }
        for assignment in overrides {
            apply_override(&mut doc, assignment.as_ref())?;
        }
        serde_yml::from_value(doc).map_err(|e| InferenceError::configuration(e.to_string()))
    }

    /// Parsed transformation kind.
    pub fn transformation_kind(&self) -> Result<Transformation> {
        self.transformation.parse()
    }

    pub fn device(&self) -> Device {
        Device::from_gpu_count(self.gpu)
    }

    /// Parallelism limit for `available` detected cores.
    pub fn parallelism(&self, available: usize) -> usize {
        available.min(self.max_cores).max(1)
    }

    /// Round-scoped view of this configuration.
    pub fn for_round(&self, round: Round, available_cores: usize) -> RoundConfig {
        RoundConfig {
            round,
            device: self.device(),
            backend: self.backend.clone(),
            num_cores: self.parallelism(available_cores),
            moving: resolve_moving_source(
                &self.moving,
                &self.inference,
                &self.dataset,
                &self.model_dir,
                round,
            ),
            layout: RoundLayout::derive(&self.inference, &self.dataset, &self.model_dir, round),
            base: self.clone(),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yml::to_string(self)?)
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.model_dir.join(SNAPSHOT_FILE)
    }

    /// Write the resolved config to `{model_dir}/config.yaml`.
    ///
    /// Uninterpreted keys are kept; the tracker API key is not.
    pub fn save_snapshot(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.model_dir)?;
        let path = self.snapshot_path();
        std::fs::write(&path, self.to_yaml()?)?;
        Ok(path)
    }
}

/// Configuration as seen by one round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundConfig {
    pub base: RunConfig,
    pub round: Round,
    pub device: Device,
    pub backend: String,
    /// Parallelism limit advertised to the registrar.
    pub num_cores: usize,
    /// Directory the round reads moving images from.
    pub moving: PathBuf,
    pub layout: RoundLayout,
}

/// Apply one `key=value` override to a YAML document.
///
/// Dotted keys descend into nested mappings, creating them as needed. A
/// leading `+` or `++` is accepted and ignored. The value is parsed as a
/// YAML scalar, so `gpu=1` is a number and `TI_csv=null` clears the field.
pub fn apply_override(doc: &mut Value, assignment: &str) -> Result<()> {
    let assignment = assignment.trim_start_matches('+');
    let (key, raw) = assignment.split_once('=').ok_or_else(|| {
        InferenceError::configuration(format!("override {assignment:?} is not key=value"))
    })?;
    if key.is_empty() {
        return Err(InferenceError::configuration(format!(
            "override {assignment:?} has an empty key"
        )));
    }

    let value: Value = if raw.is_empty() {
        Value::Null
    } else {
        serde_yml::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
    };

    let mut parts: Vec<&str> = key.split('.').collect();
    let last = parts.pop().unwrap_or(key);
    let mut node = doc;
    for part in parts {
        let map = node.as_mapping_mut().ok_or_else(|| {
            InferenceError::configuration(format!("override {key:?}: {part:?} is not a mapping"))
        })?;
        node = map
            .entry(Value::String(part.to_string()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
    }

    let map = node.as_mapping_mut().ok_or_else(|| {
        InferenceError::configuration(format!("override {key:?}: parent is not a mapping"))
    })?;
    map.insert(Value::String(last.to_string()), value);
    Ok(())
}
