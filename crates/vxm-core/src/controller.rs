//! Multi-round orchestration.
//!
//! [`RoundController::run`] walks rounds 1 to 3. Each round reads moving
//! images from the previous round's moved directory (round 1 reads the
//! configured input), registers every subject that has no moved output yet,
//! and writes `summary/results.csv`. Subjects are processed one at a time;
//! the first failing subject aborts the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::Instrument;
use vxm_tracker::MetricsSink;

use crate::config::{RoundConfig, RunConfig};
use crate::domain::{subject_stem, InferenceError, Result, Round, Transformation};
use crate::metadata::MetadataTable;
use crate::metrics::METRICS;
use crate::model::ModelLoader;
use crate::obs;
use crate::registrar::{RegisterRequest, SubjectRegistrar};
use crate::table::{FinalizedTable, ResultTable};

/// Outcome of one round.
#[derive(Debug, Clone)]
pub struct RoundReport {
    pub round: Round,
    pub registered: usize,
    pub skipped: usize,
    pub table: FinalizedTable,
    pub results_csv: PathBuf,
}

/// Outcome of a full run, one entry per round in order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub rounds: Vec<RoundReport>,
}

impl RunReport {
    pub fn round(&self, round: Round) -> Option<&RoundReport> {
        self.rounds.iter().find(|r| r.round == round)
    }

    /// Subjects registered across all rounds.
    pub fn registered(&self) -> usize {
        self.rounds.iter().map(|r| r.registered).sum()
    }

    pub fn skipped(&self) -> usize {
        self.rounds.iter().map(|r| r.skipped).sum()
    }
}

/// Drives the registration rounds.
pub struct RoundController {
    loader: Arc<dyn ModelLoader>,
    registrar: Arc<dyn SubjectRegistrar>,
    sink: Option<Arc<dyn MetricsSink>>,
    available_cores: usize,
    show_progress: bool,
}

impl RoundController {
    pub fn new(loader: Arc<dyn ModelLoader>, registrar: Arc<dyn SubjectRegistrar>) -> Self {
        Self {
            loader,
            registrar,
            sink: None,
            available_cores: num_cpus::get(),
            show_progress: true,
        }
    }

    /// Forward subject metrics, model watch and result tables to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Override the detected core count.
    pub fn with_available_cores(mut self, cores: usize) -> Self {
        self.available_cores = cores;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Run all rounds.
    ///
    /// An unrecognized transformation fails before anything touches the
    /// filesystem. A snapshot that cannot be written is only logged.
    pub async fn run(&self, config: &RunConfig) -> Result<RunReport> {
        let transformation = config.transformation_kind()?;

        let metadata = match &config.ti_csv {
            Some(path) => Some(MetadataTable::from_csv(path)?),
            None => None,
        };

        if let Err(e) = config.save_snapshot() {
            obs::emit_config_snapshot_failed(&config.snapshot_path(), &e);
        }

        let mut report = RunReport::default();
        for round in Round::ALL {
            let round_report = self
                .run_round(config, round, transformation, metadata.as_ref())
                .instrument(obs::round_span(round))
                .await?;
            METRICS.record_round();
            report.rounds.push(round_report);
        }
        Ok(report)
    }

    async fn run_round(
        &self,
        config: &RunConfig,
        round: Round,
        transformation: Transformation,
        metadata: Option<&MetadataTable>,
    ) -> Result<RoundReport> {
        let started = Instant::now();
        let round_config = config.for_round(round, self.available_cores);
        round_config.layout.create_dirs()?;
        obs::emit_cores_resolved(self.available_cores, round_config.num_cores);

        let mut model = self
            .loader
            .load(transformation, &config.model_path, round_config.device)?;
        model.to_device(round_config.device);
        model.eval();
        if let Some(sink) = &self.sink {
            sink.watch(&model.watch_target()).await;
        }

        let subjects = list_subjects(&round_config.moving)?;
        obs::emit_round_started(round, &round_config.moving, subjects.len());

        let progress = self.progress_bar(subjects.len() as u64);
        let mut table = ResultTable::new();
        let mut skipped = 0;

        for (index, subject) in subjects.iter().enumerate() {
            if round_config.layout.moved_output_for(subject).exists() {
                obs::emit_subject_skipped(round, subject);
                METRICS.record_skipped();
                skipped += 1;
                progress.inc(1);
                continue;
            }

            let subject_started = Instant::now();
            let outcome = self
                .registrar
                .register(RegisterRequest {
                    index,
                    round: &round_config,
                    subject,
                    metadata: lookup_metadata(metadata, subject)?,
                    device: round_config.device,
                    model: &*model,
                    sink: self.sink.as_deref(),
                })
                .await
                .inspect_err(|_| METRICS.record_failed())?;

            let duration_ms = elapsed_ms(subject_started);
            obs::emit_subject_registered(round, subject, duration_ms);
            METRICS.record_registered(duration_ms);
            table.append(outcome);
            progress.inc(1);
        }
        progress.finish_and_clear();

        self.finish_round(&round_config, &table, skipped, started).await
    }

    async fn finish_round(
        &self,
        round_config: &RoundConfig,
        table: &ResultTable,
        skipped: usize,
        started: Instant,
    ) -> Result<RoundReport> {
        let round = round_config.round;
        let finalized = table.finalize();
        let results_csv = round_config.layout.results_csv();
        finalized.write_csv(&results_csv)?;
        obs::emit_summary_written(round, &results_csv, &finalized.describe());

        if let Some(sink) = &self.sink {
            let label = format!("{}/results", round.dir_name());
            sink.log_table(&finalized.to_payload(), &label).await;
        }

        obs::emit_round_finished(round, finalized.len(), skipped, elapsed_ms(started));
        Ok(RoundReport {
            round,
            registered: finalized.len(),
            skipped,
            table: finalized,
            results_csv,
        })
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        let style = ProgressStyle::default_bar()
            .template("Registering Samples: [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }
}

/// Regular files of `dir` (symlinks followed), sorted by name.
fn list_subjects(dir: &Path) -> Result<Vec<String>> {
    let mut subjects = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
            InferenceError::data_consistency(
                path.display().to_string(),
                "subject file name is not valid UTF-8",
            )
        })?;
        subjects.push(name.to_string());
    }
    subjects.sort();
    Ok(subjects)
}

/// Metadata value for a subject; a configured table must contain it.
fn lookup_metadata(table: Option<&MetadataTable>, subject: &str) -> Result<Option<f64>> {
    table
        .map(|t| t.require(&subject_stem(subject)))
        .transpose()
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
