//! Per-subject scalar metadata (e.g. inversion times) loaded from CSV.

use std::collections::HashMap;
use std::path::Path;

use crate::domain::{InferenceError, Result};

/// Subject id → scalar lookup table, fully loaded in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataTable {
    values: HashMap<String, f64>,
}

impl MetadataTable {
    /// Load a two-column CSV with a header row: subject id, value.
    ///
    /// Later rows override earlier ones with the same id.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)?;
        Self::from_reader(reader)
    }

    fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let mut values = HashMap::new();
        for record in reader.records() {
            let record = record?;
            let Some(id) = record.get(0).filter(|id| !id.is_empty()) else {
                continue;
            };
            let raw = record.get(1).unwrap_or_default();
            let value: f64 = raw.parse().map_err(|_| {
                InferenceError::data_consistency(id, format!("metadata value {raw:?} is not a number"))
            })?;
            values.insert(id.to_string(), value);
        }
        Ok(Self { values })
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn lookup(&self, subject_id: &str) -> Option<f64> {
        self.values.get(subject_id).copied()
    }

    /// Lookup that treats a miss as a data consistency error.
    pub fn require(&self, subject_id: &str) -> Result<f64> {
        self.lookup(subject_id).ok_or_else(|| {
            InferenceError::data_consistency(subject_id, "no metadata entry for subject")
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_from_csv_reads_pairs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ti.csv");
        std::fs::write(&path, "subject,TI\ncase01, 120.5\ncase02,300\n\ncase01,130\n").unwrap();

        let table = MetadataTable::from_csv(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup("case01"), Some(130.0));
        assert_eq!(table.lookup("case02"), Some(300.0));
        assert_eq!(table.lookup("case03"), None);
    }

    #[test]
    fn test_require_miss_is_data_consistency() {
        let table = MetadataTable::from_pairs([("case01", 1.0)]);
        let err = table.require("case09").unwrap_err();
        assert!(matches!(err, InferenceError::DataConsistency { ref subject, .. } if subject == "case09"));
    }

    #[test]
    fn test_unparseable_value_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ti.csv");
        std::fs::write(&path, "subject,TI\ncase01,n/a\n").unwrap();

        let err = MetadataTable::from_csv(&path).unwrap_err();
        assert!(matches!(err, InferenceError::DataConsistency { .. }));
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempdir().unwrap();
        assert!(MetadataTable::from_csv(&dir.path().join("absent.csv")).is_err());
    }
}
