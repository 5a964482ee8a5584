//! Process-backed models driven through the round controller.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::tempdir;
use vxm_core::{
    Device, InferenceError, ModelLoader, ModelRegistrar, RegistrationModel, Round,
    RoundController, RunConfig, SubjectJob, Transformation,
};
use vxm_registrar::ProcessModelLoader;

/// Writes the moved and warp files it is pointed at, then prints a result.
const REGISTER_SCRIPT: &str = r#"
while [ $# -gt 0 ]; do
  case "$1" in
    --subject) subject="$2" ;;
    --moved) moved="$2" ;;
    --warp) warp="$2" ;;
  esac
  shift 2
done
: > "$moved"
: > "$warp"
echo "registering $subject"
echo "{\"name\":\"$subject\",\"raw_mse\":10,\"registered_mse\":8,\"raw_pca\":2,\"registered_pca\":1,\"raw_t1err\":4,\"registered_t1err\":3}"
"#;

fn sh(script: &str) -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        script.to_string(),
        "register".to_string(),
    ]
}

fn job(dir: &Path) -> SubjectJob {
    SubjectJob {
        index: 0,
        round: Round::FIRST,
        subject: "case01.nii".to_string(),
        moving_path: dir.join("case01.nii"),
        moved_path: dir.join("moved.nii"),
        warp_path: dir.join("warp.nii"),
        val_dir: dir.to_path_buf(),
        metadata: None,
        device: Device::Cpu,
        backend: "pytorch".to_string(),
        num_cores: 1,
    }
}

fn checkpoint(dir: &Path) -> PathBuf {
    let path = dir.join("0100.pt");
    std::fs::write(&path, b"weights").unwrap();
    path
}

#[tokio::test]
async fn test_predict_parses_last_stdout_line() {
    let dir = tempdir().unwrap();
    let loader = ProcessModelLoader::new(sh(REGISTER_SCRIPT), 30);
    let mut model = loader
        .load(Transformation::Dense, &checkpoint(dir.path()), Device::Cpu)
        .unwrap_or_else(|e| panic!("load failed: {e}"));
    model.eval();

    let outcome = model.predict(&job(dir.path())).await.unwrap();

    assert_eq!(outcome.name, "case01.nii");
    assert_eq!(outcome.raw_mse, 10.0);
    assert_eq!(outcome.registered_t1err, 3.0);
    assert!(dir.path().join("moved.nii").is_file());
    assert!(dir.path().join("warp.nii").is_file());
}

#[tokio::test]
async fn test_nonzero_exit_is_registration_error() {
    let dir = tempdir().unwrap();
    let loader = ProcessModelLoader::new(sh("echo 'CUDA out of memory' >&2; exit 1"), 0);
    let mut model = loader
        .load(Transformation::BSpline, &checkpoint(dir.path()), Device::Cpu)
        .unwrap_or_else(|e| panic!("load failed: {e}"));
    model.eval();

    let err = model.predict(&job(dir.path())).await.unwrap_err();
    match err {
        InferenceError::Registration { subject, reason } => {
            assert_eq!(subject, "case01.nii");
            assert!(reason.contains("out of memory"));
        }
        other => panic!("expected registration error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_garbage_output_is_registration_error() {
    let dir = tempdir().unwrap();
    let loader = ProcessModelLoader::new(sh("echo done"), 0);
    let mut model = loader
        .load(Transformation::Dense, &checkpoint(dir.path()), Device::Cpu)
        .unwrap_or_else(|e| panic!("load failed: {e}"));
    model.eval();

    let err = model.predict(&job(dir.path())).await.unwrap_err();
    assert!(matches!(err, InferenceError::Registration { .. }));
}

#[tokio::test]
async fn test_timeout_is_registration_error() {
    let dir = tempdir().unwrap();
    let loader = ProcessModelLoader::new(sh("sleep 5"), 1);
    let mut model = loader
        .load(Transformation::Dense, &checkpoint(dir.path()), Device::Cpu)
        .unwrap_or_else(|e| panic!("load failed: {e}"));
    model.eval();

    let err = model.predict(&job(dir.path())).await.unwrap_err();
    assert!(matches!(err, InferenceError::Registration { .. }));
}

#[tokio::test]
async fn test_three_rounds_through_process_model() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("moving")).unwrap();
    std::fs::write(root.join("moving").join("case01.nii"), b"volume").unwrap();
    std::fs::write(root.join("moving").join("case02.nii"), b"volume").unwrap();
    std::fs::create_dir_all(root.join("models")).unwrap();
    checkpoint(&root.join("models"));

    let yaml = format!(
        "model_dir: {root}/models\n\
         model_path: {root}/models/0100.pt\n\
         transformation: Dense\n\
         dataset: mold\n\
         inference: {root}/inference\n\
         moving: {root}/moving\n",
        root = root.display(),
    );
    let config = RunConfig::from_yaml_with_overrides::<&str>(&yaml, &[]).unwrap();
    let loader = Arc::new(ProcessModelLoader::new(sh(REGISTER_SCRIPT), 30));

    let report = RoundController::new(loader, Arc::new(ModelRegistrar))
        .with_progress(false)
        .run(&config)
        .await
        .unwrap();

    assert_eq!(report.registered(), 6);
    let round3 = report.round(Round::LAST).unwrap();
    assert!(round3.results_csv.is_file());
    assert!(root
        .join("inference/test_mold/round3/moved/case02.nii")
        .is_file());

    let csv = std::fs::read_to_string(&round3.results_csv).unwrap();
    assert!(csv.contains("case01.nii,10.0,8.0,2.0,1.0,4.0,3.0,-20.0,-50.0,-25.0"));
}
