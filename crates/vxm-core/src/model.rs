//! Registration model capability.
//!
//! The network itself lives outside this crate. A [`ModelLoader`] resolves a
//! [`Transformation`] tag to a concrete model; everything downstream talks to
//! it through [`RegistrationModel`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use vxm_tracker::WatchTarget;

use crate::domain::{Device, Result, Round, SubjectOutcome, Transformation};

/// Everything a forward pass needs to register one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectJob {
    /// Position of the subject in the round's listing.
    pub index: usize,
    pub round: Round,
    /// File name of the subject in the moving directory.
    pub subject: String,
    pub moving_path: PathBuf,
    pub moved_path: PathBuf,
    pub warp_path: PathBuf,
    pub val_dir: PathBuf,
    /// Scalar metadata looked up for the subject (e.g. inversion time).
    pub metadata: Option<f64>,
    pub device: Device,
    pub backend: String,
    pub num_cores: usize,
}

/// A loaded registration network.
#[async_trait]
pub trait RegistrationModel: Send + Sync {
    fn transformation(&self) -> Transformation;

    fn checkpoint(&self) -> &Path;

    fn device(&self) -> Device;

    /// Move the model to `device`.
    fn to_device(&mut self, device: Device);

    /// Switch to inference mode.
    fn eval(&mut self);

    fn is_training(&self) -> bool;

    /// Description handed to a metrics sink's `watch`.
    fn watch_target(&self) -> WatchTarget {
        WatchTarget {
            name: format!("vxm_{}", self.transformation()),
            details: serde_json::json!({
                "transformation": self.transformation().as_str(),
                "checkpoint": self.checkpoint().display().to_string(),
                "device": self.device().as_str(),
            }),
        }
    }

    /// Register one subject: write the moved image and warp field named in
    /// `job`, and report error metrics before and after.
    async fn predict(&self, job: &SubjectJob) -> Result<SubjectOutcome>;
}

/// Factory for models of a given transformation kind.
pub trait ModelLoader: Send + Sync {
    fn load(
        &self,
        transformation: Transformation,
        checkpoint: &Path,
        device: Device,
    ) -> Result<Box<dyn RegistrationModel>>;
}
