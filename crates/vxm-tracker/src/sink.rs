//! The `MetricsSink` capability and the payloads it carries.
//!
//! Every method is fire-and-forget: nothing is returned to the caller and an
//! implementation must never let a delivery failure escape. Registration
//! correctness never depends on a sink.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::TrackerError;

/// Named scalar values logged together under one step or epoch.
pub type ScalarMap = BTreeMap<String, f64>;

/// Frame rate used for registration GIFs unless the caller picks another.
pub const DEFAULT_VIDEO_FPS: u32 = 4;

/// A media artifact on disk, referenced by content digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub path: PathBuf,
    /// Lowercase hex SHA-256 of the file content.
    pub sha256: String,
}

impl MediaRef {
    /// Hash an in-memory rendering that lives (or will live) at `path`.
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self {
            path: path.into(),
            sha256: hex::encode(hasher.finalize()),
        }
    }

    /// Read and hash a file.
    pub fn from_file(path: &Path) -> Result<Self, TrackerError> {
        let bytes = std::fs::read(path)?;
        Ok(Self::from_bytes(path, &bytes))
    }
}

/// Tabular data in column-major header + row-major cells form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TablePayload {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// A model to be watched by the tracking service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchTarget {
    pub name: String,
    pub details: serde_json::Value,
}

/// Per-step training metrics, keyed the way dashboards expect them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMetrics {
    pub step: u64,
    pub loss: f64,
    pub nmi: f64,
    pub mse: f64,
    pub ncc: f64,
    pub folding_ratio_pos: f64,
    pub mag_det_jac_det_pos: f64,
}

impl StepMetrics {
    pub fn to_scalars(&self) -> ScalarMap {
        BTreeMap::from([
            ("Step".to_string(), self.step as f64),
            ("Step Loss".to_string(), self.loss),
            ("Step NMI".to_string(), self.nmi),
            ("Step MSE".to_string(), self.mse),
            ("Step NCC".to_string(), self.ncc),
            ("Step Folding Ratio pos".to_string(), self.folding_ratio_pos),
            ("Step Mag Det Jac Det pos".to_string(), self.mag_det_jac_det_pos),
        ])
    }
}

/// Per-epoch training metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    pub epoch: u64,
    pub loss: f64,
    pub similarity: f64,
    pub regularization: f64,
    pub mse: f64,
    pub ncc: f64,
    pub nmi: f64,
    pub folding_ratio_pos: f64,
    pub mag_det_jac_det_pos: f64,
}

impl EpochMetrics {
    pub fn to_scalars(&self) -> ScalarMap {
        BTreeMap::from([
            ("Epoch".to_string(), self.epoch as f64),
            ("Epoch Loss".to_string(), self.loss),
            ("Epoch Similarity".to_string(), self.similarity),
            ("Epoch Regularization".to_string(), self.regularization),
            ("Epoch MSE".to_string(), self.mse),
            ("Epoch NCC".to_string(), self.ncc),
            ("Epoch NMI".to_string(), self.nmi),
            ("Epoch Folding Ratio pos".to_string(), self.folding_ratio_pos),
            (
                "Epoch Mag Det Jac Det pos".to_string(),
                self.mag_det_jac_det_pos,
            ),
        ])
    }
}

/// Receiver for observability events emitted during a run.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Log scalars for a single step.
    async fn log_step(&self, step: u64, scalars: &ScalarMap);

    /// Log scalars for a completed epoch.
    async fn log_epoch(&self, epoch: u64, scalars: &ScalarMap);

    /// Log a rendered figure (e.g. moved/fixed/warp overlay) for a step.
    async fn log_image(&self, step: u64, image: &MediaRef, label: &str);

    /// Log an animation from disk.
    async fn log_video(&self, path: &Path, label: &str, fps: u32);

    /// Log a table of results.
    async fn log_table(&self, table: &TablePayload, label: &str);

    /// Ask the service to track a model.
    async fn watch(&self, target: &WatchTarget);

    /// Merge values into the run's recorded configuration.
    async fn log_config(&self, config: &serde_json::Value);
}

/// A sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl MetricsSink for NoopSink {
    async fn log_step(&self, _step: u64, _scalars: &ScalarMap) {}
    async fn log_epoch(&self, _epoch: u64, _scalars: &ScalarMap) {}
    async fn log_image(&self, _step: u64, _image: &MediaRef, _label: &str) {}
    async fn log_video(&self, _path: &Path, _label: &str, _fps: u32) {}
    async fn log_table(&self, _table: &TablePayload, _label: &str) {}
    async fn watch(&self, _target: &WatchTarget) {}
    async fn log_config(&self, _config: &serde_json::Value) {}
}
