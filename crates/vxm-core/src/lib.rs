//! vxm-infer core library
//!
//! Multi-round registration inference: configuration, round layout,
//! per-subject registration, result tables and the round controller.

pub mod config;
pub mod controller;
pub mod domain;
pub mod layout;
pub mod metadata;
pub mod metrics;
pub mod model;
pub mod obs;
pub mod registrar;
pub mod table;
pub mod telemetry;

pub use config::{apply_override, RegistrarSettings, RoundConfig, RunConfig, SNAPSHOT_FILE};
pub use controller::{RoundController, RoundReport, RunReport};
pub use domain::{
    subject_stem, Device, InferenceError, Result, Round, SubjectOutcome, SubjectRecord,
    Transformation,
};
pub use layout::{resolve_moving_source, RoundLayout, RESULTS_FILE};
pub use metadata::MetadataTable;
pub use metrics::{RegistrationStats, StatsSnapshot, METRICS};
pub use model::{ModelLoader, RegistrationModel, SubjectJob};
pub use obs::{
    emit_config_snapshot_failed, emit_cores_resolved, emit_round_finished, emit_round_started,
    emit_subject_registered, emit_subject_skipped, emit_summary_written, round_span,
};
pub use registrar::{ModelRegistrar, RegisterRequest, SubjectRegistrar};
pub use table::{
    percentage_change, ColumnStats, FinalizedRow, FinalizedTable, MetricFamily, ResultTable,
    Summary, COLUMNS,
};
pub use telemetry::init_tracing;
