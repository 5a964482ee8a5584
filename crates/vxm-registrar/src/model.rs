//! Checkpoint-backed models whose forward pass is an external process.
//!
//! For every subject the configured command is run with the job appended as
//! flags:
//!
//! ```text
//! <command> --index N --round R --subject FILE --moving PATH --moved PATH
//!           --warp PATH --val-dir PATH --checkpoint PATH --network NAME
//!           --device cpu|cuda --backend NAME --num-cores N [--metadata V]
//! ```
//!
//! The process writes the moved image and warp field itself and prints the
//! subject's metrics as a JSON object on its last non-empty stdout line.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use vxm_core::{
    Device, InferenceError, ModelLoader, RegistrarSettings, RegistrationModel, Result, SubjectJob,
    SubjectOutcome, Transformation,
};

use crate::runner;

/// Network the registration script should instantiate for a transformation.
pub fn network_name(transformation: Transformation) -> &'static str {
    match transformation {
        Transformation::Dense => "vxm_dense",
        Transformation::BSpline => "group_vxm_dense_bspline",
    }
}

/// Resolves a transformation kind to a [`ProcessModel`].
#[derive(Debug, Clone)]
pub struct ProcessModelLoader {
    command: Vec<String>,
    timeout_secs: u64,
}

impl ProcessModelLoader {
    pub fn new(command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            command,
            timeout_secs,
        }
    }

    pub fn from_settings(settings: &RegistrarSettings) -> Self {
        Self::new(settings.command.clone(), settings.timeout_secs)
    }
}

impl ModelLoader for ProcessModelLoader {
    fn load(
        &self,
        transformation: Transformation,
        checkpoint: &Path,
        device: Device,
    ) -> Result<Box<dyn RegistrationModel>> {
        if self.command.is_empty() {
            return Err(InferenceError::model("registrar command is empty"));
        }
        if !checkpoint.is_file() {
            return Err(InferenceError::model(format!(
                "checkpoint {} not found",
                checkpoint.display()
            )));
        }

        tracing::info!(
            network = network_name(transformation),
            checkpoint = %checkpoint.display(),
            device = device.as_str(),
            "model loaded"
        );

        Ok(Box::new(ProcessModel {
            transformation,
            checkpoint: checkpoint.to_path_buf(),
            device,
            training: true,
            command: self.command.clone(),
            timeout_secs: self.timeout_secs,
        }))
    }
}

/// A loaded checkpoint. Starts in training mode; call `eval` before `predict`.
#[derive(Debug, Clone)]
pub struct ProcessModel {
    transformation: Transformation,
    checkpoint: PathBuf,
    device: Device,
    training: bool,
    command: Vec<String>,
    timeout_secs: u64,
}

impl ProcessModel {
    /// Full command line for one job.
    pub fn command_for(&self, job: &SubjectJob) -> Vec<String> {
        let mut cmd = self.command.clone();
        let mut flag = |name: &str, value: String| {
            cmd.push(format!("--{name}"));
            cmd.push(value);
        };

        flag("index", job.index.to_string());
        flag("round", job.round.to_string());
        flag("subject", job.subject.clone());
        flag("moving", job.moving_path.display().to_string());
        flag("moved", job.moved_path.display().to_string());
        flag("warp", job.warp_path.display().to_string());
        flag("val-dir", job.val_dir.display().to_string());
        flag("checkpoint", self.checkpoint.display().to_string());
        flag("network", network_name(self.transformation).to_string());
        flag("device", job.device.as_str().to_string());
        flag("backend", job.backend.clone());
        flag("num-cores", job.num_cores.to_string());
        if let Some(value) = job.metadata {
            flag("metadata", value.to_string());
        }
        cmd
    }
}

#[async_trait]
impl RegistrationModel for ProcessModel {
    fn transformation(&self) -> Transformation {
        self.transformation
    }

    fn checkpoint(&self) -> &Path {
        &self.checkpoint
    }

    fn device(&self) -> Device {
        self.device
    }

    fn to_device(&mut self, device: Device) {
        self.device = device;
    }

    fn eval(&mut self) {
        self.training = false;
    }

    fn is_training(&self) -> bool {
        self.training
    }

    async fn predict(&self, job: &SubjectJob) -> Result<SubjectOutcome> {
        if self.training {
            return Err(InferenceError::model("predict called before eval()"));
        }

        let output = runner::execute(&self.command_for(job), self.timeout_secs)
            .await
            .map_err(|e| InferenceError::registration(&job.subject, format!("{e:#}")))?;

        if !output.passed() {
            return Err(InferenceError::registration(
                &job.subject,
                format!(
                    "registrar exited with code {}: {}",
                    output.exit_code,
                    output.stderr.trim()
                ),
            ));
        }

        let line = output.last_line().ok_or_else(|| {
            InferenceError::registration(&job.subject, "registrar printed no result")
        })?;
        serde_json::from_str(line).map_err(|e| {
            InferenceError::registration(&job.subject, format!("unreadable result {line:?}: {e}"))
        })
    }
}
