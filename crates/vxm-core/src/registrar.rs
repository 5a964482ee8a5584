//! Single-subject registration.

use async_trait::async_trait;
use vxm_tracker::{MetricsSink, ScalarMap};

use crate::config::RoundConfig;
use crate::domain::{Device, Result, SubjectOutcome};
use crate::model::{RegistrationModel, SubjectJob};

/// Arguments of one registration call.
pub struct RegisterRequest<'a> {
    /// Position of the subject in the round's listing.
    pub index: usize,
    pub round: &'a RoundConfig,
    /// File name inside `round.moving`.
    pub subject: &'a str,
    pub metadata: Option<f64>,
    pub device: Device,
    pub model: &'a dyn RegistrationModel,
    pub sink: Option<&'a dyn MetricsSink>,
}

impl RegisterRequest<'_> {
    /// Paths and settings for the model's forward pass.
    pub fn job(&self) -> SubjectJob {
        let layout = &self.round.layout;
        SubjectJob {
            index: self.index,
            round: self.round.round,
            subject: self.subject.to_string(),
            moving_path: self.round.moving.join(self.subject),
            moved_path: layout.moved_output_for(self.subject),
            warp_path: layout.warp_output_for(self.subject),
            val_dir: layout.val.clone(),
            metadata: self.metadata,
            device: self.device,
            backend: self.round.backend.clone(),
            num_cores: self.round.num_cores,
        }
    }
}

/// Registers one subject and reports its error metrics.
#[async_trait]
pub trait SubjectRegistrar: Send + Sync {
    async fn register(&self, request: RegisterRequest<'_>) -> Result<SubjectOutcome>;
}

/// Registrar that runs the loaded model's forward pass directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModelRegistrar;

impl ModelRegistrar {
    fn scalars(round: u32, outcome: &SubjectOutcome) -> ScalarMap {
        ScalarMap::from([
            ("Round".to_string(), round as f64),
            ("Subject raw MSE".to_string(), outcome.raw_mse),
            ("Subject registered MSE".to_string(), outcome.registered_mse),
            ("Subject raw PCA".to_string(), outcome.raw_pca),
            ("Subject registered PCA".to_string(), outcome.registered_pca),
            ("Subject raw T1err".to_string(), outcome.raw_t1err),
            ("Subject registered T1err".to_string(), outcome.registered_t1err),
        ])
    }
}

#[async_trait]
impl SubjectRegistrar for ModelRegistrar {
    async fn register(&self, request: RegisterRequest<'_>) -> Result<SubjectOutcome> {
        let job = request.job();
        let outcome = request.model.predict(&job).await?;

        if let Some(sink) = request.sink {
            sink.log_step(
                request.index as u64,
                &Self::scalars(request.round.round.get(), &outcome),
            )
            .await;
        }

        Ok(outcome)
    }
}
