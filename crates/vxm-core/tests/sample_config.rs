//! The shipped `conf/config.yaml` must stay loadable.

use std::path::Path;

use vxm_core::{Device, RunConfig, Transformation};

fn sample_path() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("conf")
        .join("config.yaml")
}

#[test]
fn sample_config_parses() {
    let config = RunConfig::load::<&str>(&sample_path(), &[]).unwrap();
    assert_eq!(config.transformation_kind().unwrap(), Transformation::BSpline);
    assert_eq!(config.device(), Device::Cpu);
    assert_eq!(config.max_cores, 64);
    assert!(!config.tracker.enabled);
    assert_eq!(
        config.registrar.command,
        vec!["python".to_string(), "scripts/register_single.py".to_string()]
    );
}

#[test]
fn sample_config_accepts_cli_overrides() {
    let config = RunConfig::load(&sample_path(), &["gpu=2", "transformation=Dense"]).unwrap();
    assert_eq!(config.device(), Device::Cuda);
    assert_eq!(config.transformation_kind().unwrap(), Transformation::Dense);
}
