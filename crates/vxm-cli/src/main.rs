//! vxm-infer - multi-round registration inference
//!
//! Loads a run configuration, applies `key=value` overrides and registers
//! every subject through three refinement rounds. Each round's moved images
//! feed the next; per-round results land in
//! `{inference}/test_{dataset}/round{r}/summary/results.csv`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};

use vxm_core::{ModelRegistrar, RoundController, RunConfig, RunReport, METRICS};
use vxm_registrar::ProcessModelLoader;
use vxm_tracker::{session, MetricsSink};

#[derive(Parser, Debug)]
#[command(name = "vxm-infer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-round deformable registration inference", long_about = None)]
struct Cli {
    /// Run configuration (YAML)
    #[arg(short, long, env = "VXM_CONFIG", default_value = "conf/config.yaml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Print the resolved configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Configuration overrides, e.g. `gpu=1 tracker.enabled=true`
    #[arg(value_name = "KEY=VALUE")]
    overrides: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    vxm_core::init_tracing(cli.json, level);

    let config = RunConfig::load(&cli.config, &cli.overrides)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;

    if cli.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    let report = cmd_run(&config).await?;
    print_report(&report);
    Ok(())
}

/// Run every round with the process-backed model and an optional tracker.
async fn cmd_run(config: &RunConfig) -> Result<RunReport> {
    info!(
        dataset = %config.dataset,
        transformation = %config.transformation,
        "Starting inference"
    );

    let loader = Arc::new(ProcessModelLoader::from_settings(&config.registrar));
    let mut controller = RoundController::new(loader, Arc::new(ModelRegistrar));
    if let Some(sink) = start_tracker(config).await {
        controller = controller.with_sink(sink);
    }

    let result = controller.run(config).await;

    METRICS.flush();
    session::finish();

    result.context("Inference run failed")
}

/// Open (or reuse) the tracking session; a tracker that cannot start only
/// costs us the remote metrics.
async fn start_tracker(config: &RunConfig) -> Option<Arc<dyn MetricsSink>> {
    if !config.tracker.enabled {
        return None;
    }

    let run_config = match config.to_json() {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Tracking disabled: config is not serializable");
            return None;
        }
    };

    match session::start(&config.tracker, &run_config).await {
        Ok(tracker) => {
            info!(run_id = %tracker.run().run_id, "Tracking session started");
            Some(tracker as Arc<dyn MetricsSink>)
        }
        Err(e) => {
            warn!(error = %e, "Tracking disabled");
            None
        }
    }
}

fn print_report(report: &RunReport) {
    for round in &report.rounds {
        println!(
            "round {}: {} registered, {} skipped -> {}",
            round.round,
            round.registered,
            round.skipped,
            round.results_csv.display()
        );
    }
}
