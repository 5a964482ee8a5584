//! Round-scoped directory layout.
//!
//! Every path here is a pure function of (inference root, dataset, model
//! root, round). For inference root `I`, dataset `d`, model root `M` and
//! round `r`:
//!
//! ```text
//! I/test_{d}/round{r}/moved/     registered images, {stem}.nii
//! I/test_{d}/round{r}/warp/      displacement fields
//! I/test_{d}/round{r}/summary/   results.csv
//! I/test_{d}/round{r}/val/       validation artifacts
//! M/round{r}/                    per-round checkpoints
//! ```

use std::path::{Path, PathBuf};

use crate::domain::{subject_stem, Result, Round};

/// File name of the finalized per-round table.
pub const RESULTS_FILE: &str = "results.csv";

/// Extension of moved images and warp fields.
pub const OUTPUT_EXTENSION: &str = "nii";

/// Derived directories for one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundLayout {
    pub round: Round,
    pub moved: PathBuf,
    pub warp: PathBuf,
    pub summary: PathBuf,
    pub val: PathBuf,
    pub model_round: PathBuf,
}

/// `I/test_{d}`.
pub fn test_root(inference_root: &Path, dataset: &str) -> PathBuf {
    inference_root.join(format!("test_{dataset}"))
}

impl RoundLayout {
    pub fn derive(inference_root: &Path, dataset: &str, model_dir: &Path, round: Round) -> Self {
        let round_root = test_root(inference_root, dataset).join(round.dir_name());
        RoundLayout {
            round,
            moved: round_root.join("moved"),
            warp: round_root.join("warp"),
            summary: round_root.join("summary"),
            val: round_root.join("val"),
            model_round: model_dir.join(round.dir_name()),
        }
    }

    /// All directories owned by the round.
    pub fn dirs(&self) -> [&Path; 5] {
        [
            self.moved.as_path(),
            self.warp.as_path(),
            self.summary.as_path(),
            self.val.as_path(),
            self.model_round.as_path(),
        ]
    }

    /// Create every directory of the round; existing ones are left alone.
    pub fn create_dirs(&self) -> Result<()> {
        for dir in self.dirs() {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn results_csv(&self) -> PathBuf {
        self.summary.join(RESULTS_FILE)
    }

    /// Moved image written for a subject file, e.g. `moved/case01.nii`.
    pub fn moved_output_for(&self, subject_file: &str) -> PathBuf {
        self.moved
            .join(format!("{}.{OUTPUT_EXTENSION}", subject_stem(subject_file)))
    }

    /// Warp field written for a subject file.
    pub fn warp_output_for(&self, subject_file: &str) -> PathBuf {
        self.warp
            .join(format!("{}.{OUTPUT_EXTENSION}", subject_stem(subject_file)))
    }
}

/// Directory the moving images of `round` are read from.
///
/// Round 1 reads the configured input directory; every later round reads
/// the previous round's moved images.
pub fn resolve_moving_source(
    base_moving: &Path,
    inference_root: &Path,
    dataset: &str,
    model_dir: &Path,
    round: Round,
) -> PathBuf {
    match round.previous() {
        None => base_moving.to_path_buf(),
        Some(prev) => RoundLayout::derive(inference_root, dataset, model_dir, prev).moved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn round(n: u32) -> Round {
        Round::new(n).unwrap()
    }

    #[test]
    fn test_layout_paths() {
        let layout = RoundLayout::derive(Path::new("/inf"), "mold", Path::new("/models"), round(2));
        assert_eq!(layout.moved, PathBuf::from("/inf/test_mold/round2/moved"));
        assert_eq!(layout.warp, PathBuf::from("/inf/test_mold/round2/warp"));
        assert_eq!(layout.summary, PathBuf::from("/inf/test_mold/round2/summary"));
        assert_eq!(layout.val, PathBuf::from("/inf/test_mold/round2/val"));
        assert_eq!(layout.model_round, PathBuf::from("/models/round2"));
        assert_eq!(
            layout.results_csv(),
            PathBuf::from("/inf/test_mold/round2/summary/results.csv")
        );
    }

    #[test]
    fn test_moved_output_named_by_stem() {
        let layout = RoundLayout::derive(Path::new("/inf"), "d", Path::new("/m"), round(1));
        assert_eq!(
            layout.moved_output_for("case01.mat"),
            PathBuf::from("/inf/test_d/round1/moved/case01.nii")
        );
        assert_eq!(
            layout.warp_output_for("case01.mat"),
            PathBuf::from("/inf/test_d/round1/warp/case01.nii")
        );
    }

    #[test]
    fn test_moving_source_chains_rounds() {
        let inf = Path::new("/inf");
        let models = Path::new("/m");
        let base = Path::new("/data/raw");

        assert_eq!(resolve_moving_source(base, inf, "d", models, round(1)), base);
        for n in 2..=3 {
            let source = resolve_moving_source(base, inf, "d", models, round(n));
            let prev = RoundLayout::derive(inf, "d", models, round(n - 1));
            assert_eq!(source, prev.moved);
        }
    }

    #[test]
    fn test_create_dirs_idempotent() {
        let dir = tempdir().unwrap();
        let layout = RoundLayout::derive(
            &dir.path().join("inf"),
            "d",
            &dir.path().join("models"),
            round(1),
        );

        layout.create_dirs().unwrap();
        layout.create_dirs().unwrap();

        for d in layout.dirs() {
            assert!(d.is_dir(), "{} should exist", d.display());
        }
    }
}
