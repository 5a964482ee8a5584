//! Per-subject registration outcomes.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Error metrics for one subject before and after registration.
///
/// This is what a registrar hands back; it becomes a [`SubjectRecord`] once
/// appended to a round's result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectOutcome {
    /// Case name reported in the `Cases` column.
    pub name: String,
    pub raw_mse: f64,
    pub registered_mse: f64,
    pub raw_pca: f64,
    pub registered_pca: f64,
    pub raw_t1err: f64,
    pub registered_t1err: f64,
}

/// One immutable row of a round's result table.
pub type SubjectRecord = SubjectOutcome;

/// Subject id of a file name: the name without its last extension.
///
/// `case01.nii.gz` has id `case01.nii`, matching how moved outputs are named.
pub fn subject_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_stem_strips_last_extension() {
        assert_eq!(subject_stem("case01.nii"), "case01");
        assert_eq!(subject_stem("case01.nii.gz"), "case01.nii");
        assert_eq!(subject_stem("case01.mat"), "case01");
        assert_eq!(subject_stem("case01"), "case01");
    }

    #[test]
    fn test_outcome_json_field_names() {
        let outcome: SubjectOutcome = serde_json::from_str(
            r#"{"name":"s1","raw_mse":10,"registered_mse":8,"raw_pca":1,
                "registered_pca":0.5,"raw_t1err":3,"registered_t1err":2}"#,
        )
        .unwrap();
        assert_eq!(outcome.name, "s1");
        assert_eq!(outcome.registered_mse, 8.0);
    }
}
