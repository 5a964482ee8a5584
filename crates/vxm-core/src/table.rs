//! Per-round result table.
//!
//! Records are appended while a round runs; the three percentage-change
//! columns are only computed by [`ResultTable::finalize`], once every subject
//! of the round has been processed.

use std::fmt;
use std::path::Path;

use serde_json::Value;
use vxm_tracker::TablePayload;

use crate::domain::{Result, SubjectRecord};

/// Column headers of `results.csv`, in order.
pub const COLUMNS: [&str; 10] = [
    "Cases",
    "raw MSE",
    "registered MSE",
    "raw PCA",
    "registered PCA",
    "raw T1err",
    "registered T1err",
    "MSE changes percentage",
    "PCA changes percentage",
    "T1err changes percentage",
];

/// Metric families that get a derived change column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricFamily {
    Mse,
    Pca,
    T1err,
}

impl MetricFamily {
    pub const ALL: [MetricFamily; 3] = [MetricFamily::Mse, MetricFamily::Pca, MetricFamily::T1err];

    pub fn change_column(self) -> &'static str {
        match self {
            MetricFamily::Mse => "MSE changes percentage",
            MetricFamily::Pca => "PCA changes percentage",
            MetricFamily::T1err => "T1err changes percentage",
        }
    }

    fn pair(self, record: &SubjectRecord) -> (f64, f64) {
        match self {
            MetricFamily::Mse => (record.raw_mse, record.registered_mse),
            MetricFamily::Pca => (record.raw_pca, record.registered_pca),
            MetricFamily::T1err => (record.raw_t1err, record.registered_t1err),
        }
    }
}

/// Relative change from `raw` to `registered`, in percent.
///
/// A zero `raw` yields NaN or an infinity; that is reported as-is.
pub fn percentage_change(raw: f64, registered: f64) -> f64 {
    (registered - raw) / raw * 100.0
}

/// Accumulating table of subject records for one round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    records: Vec<SubjectRecord>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: SubjectRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[SubjectRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.iter().any(|r| r.name == name)
    }

    /// Compute the derived change columns over every record.
    ///
    /// Pure: calling it again without appending yields an identical table.
    pub fn finalize(&self) -> FinalizedTable {
        let rows = self
            .records
            .iter()
            .map(|record| {
                let [mse_change, pca_change, t1err_change] = MetricFamily::ALL.map(|family| {
                    let (raw, registered) = family.pair(record);
                    percentage_change(raw, registered)
                });
                FinalizedRow {
                    record: record.clone(),
                    mse_change,
                    pca_change,
                    t1err_change,
                }
            })
            .collect();
        FinalizedTable { rows }
    }
}

/// A record plus its derived change columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedRow {
    pub record: SubjectRecord,
    pub mse_change: f64,
    pub pca_change: f64,
    pub t1err_change: f64,
}

impl FinalizedRow {
    pub fn change(&self, family: MetricFamily) -> f64 {
        match family {
            MetricFamily::Mse => self.mse_change,
            MetricFamily::Pca => self.pca_change,
            MetricFamily::T1err => self.t1err_change,
        }
    }

    fn numeric_cells(&self) -> [f64; 9] {
        let r = &self.record;
        [
            r.raw_mse,
            r.registered_mse,
            r.raw_pca,
            r.registered_pca,
            r.raw_t1err,
            r.registered_t1err,
            self.mse_change,
            self.pca_change,
            self.t1err_change,
        ]
    }
}

/// Result table with derived columns, ready for export.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedTable {
    rows: Vec<FinalizedRow>,
}

impl FinalizedTable {
    pub fn rows(&self) -> &[FinalizedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn change_values(&self, family: MetricFamily) -> Vec<f64> {
        self.rows.iter().map(|row| row.change(family)).collect()
    }

    /// Serialize as CSV with the fixed header.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(COLUMNS)?;
        for row in &self.rows {
            let mut fields = Vec::with_capacity(COLUMNS.len());
            fields.push(row.record.name.clone());
            fields.extend(row.numeric_cells().into_iter().map(format_cell));
            writer.write_record(&fields)?;
        }
        writer
            .into_inner()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()).into())
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let bytes = self.to_csv_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Descriptive statistics of the three change columns.
    pub fn describe(&self) -> Summary {
        Summary {
            columns: MetricFamily::ALL
                .map(|family| (family.change_column(), ColumnStats::of(&self.change_values(family)))),
        }
    }

    /// Table in the shape the tracking service expects.
    pub fn to_payload(&self) -> TablePayload {
        TablePayload {
            columns: COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| {
                    std::iter::once(Value::from(row.record.name.clone()))
                        .chain(row.numeric_cells().into_iter().map(Value::from))
                        .collect()
                })
                .collect(),
        }
    }
}

/// CSV cell for a float: shortest round-trip form, NaN left empty.
///
/// Exponents are signed and at least two digits wide (`1e+16`, `1.5e-07`),
/// the way pandas writes them.
fn format_cell(value: f64) -> String {
    if value.is_nan() {
        return String::new();
    }
    if value.is_infinite() {
        let sign = if value > 0.0 { "" } else { "-" };
        return format!("{sign}inf");
    }

    let shortest = format!("{value:?}");
    match shortest.split_once('e') {
        Some((mantissa, exp)) => match exp.parse::<i32>() {
            Ok(exp) => {
                let sign = if exp < 0 { '-' } else { '+' };
                format!("{mantissa}e{sign}{:02}", exp.unsigned_abs())
            }
            Err(_) => shortest,
        },
        None => shortest,
    }
}

/// count / mean / std / min / quartiles / max of one column, NaN excluded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1); NaN below two values.
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub max: f64,
}

impl ColumnStats {
    pub fn of(values: &[f64]) -> Self {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        sorted.sort_by(f64::total_cmp);
        let count = sorted.len();

        if count == 0 {
            return ColumnStats {
                count,
                mean: f64::NAN,
                std: f64::NAN,
                min: f64::NAN,
                q25: f64::NAN,
                q50: f64::NAN,
                q75: f64::NAN,
                max: f64::NAN,
            };
        }

        let n = count as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let std = if count < 2 {
            f64::NAN
        } else {
            (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        };

        ColumnStats {
            count,
            mean,
            std,
            min: sorted[0],
            q25: quantile(&sorted, 0.25),
            q50: quantile(&sorted, 0.5),
            q75: quantile(&sorted, 0.75),
            max: sorted[count - 1],
        }
    }

    fn rows(&self) -> [(&'static str, f64); 8] {
        [
            ("count", self.count as f64),
            ("mean", self.mean),
            ("std", self.std),
            ("min", self.min),
            ("25%", self.q25),
            ("50%", self.q50),
            ("75%", self.q75),
            ("max", self.max),
        ]
    }
}

/// Linear-interpolated quantile of a sorted, non-empty slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Descriptive statistics of the change columns of a finalized table.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub columns: [(&'static str, ColumnStats); 3],
}

impl Summary {
    pub fn get(&self, family: MetricFamily) -> &ColumnStats {
        let idx = match family {
            MetricFamily::Mse => 0,
            MetricFamily::Pca => 1,
            MetricFamily::T1err => 2,
        };
        &self.columns[idx].1
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<6}", "")?;
        for (name, _) in &self.columns {
            write!(f, "  {name:>26}")?;
        }
        for (i, (label, _)) in self.columns[0].1.rows().iter().enumerate() {
            write!(f, "\n{label:<6}")?;
            for (_, stats) in &self.columns {
                write!(f, "  {:>26.6}", stats.rows()[i].1)?;
            }
        }
        Ok(())
    }
}
