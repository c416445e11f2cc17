//! Trip records and the sources they are read from
//!
//! A [`RecordSource`] hands the pipeline a validated, read-only
//! [`RecordTable`]. Two sources ship with the crate: [`CsvRecordSource`]
//! reads a headered CSV export, [`MemoryRecordSource`] wraps records built in
//! code (tests, benchmarks, embedding callers).

use crate::error::{EvalError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

/// One observed vehicle-stop event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub vehicle: String,
    pub timestamp: String,
    pub stop_sequence: u32,
    /// Historical cumulative travel time (seconds)
    pub hist_cum: f64,
    /// Recent cumulative travel time (seconds)
    pub rece_cum: f64,
    /// Scheduled cumulative travel time (seconds)
    pub sche_cum: f64,
    /// Baseline prediction (seconds)
    pub t_predicted: f64,
    /// Ground truth (seconds)
    pub t_measured: f64,
    pub route: String,
    pub depot: String,
    #[serde(deserialize_with = "deserialize_flag")]
    pub is_express: bool,
}

impl TripRecord {
    /// Record with only the numeric fields set; identifiers are left empty
    pub fn from_times(
        hist_cum: f64,
        rece_cum: f64,
        sche_cum: f64,
        t_predicted: f64,
        t_measured: f64,
    ) -> Self {
        Self {
            vehicle: String::new(),
            timestamp: String::new(),
            stop_sequence: 0,
            hist_cum,
            rece_cum,
            sche_cum,
            t_predicted,
            t_measured,
            route: String::new(),
            depot: String::new(),
            is_express: false,
        }
    }

    fn check(&self) -> std::result::Result<(), String> {
        let fields = [
            ("hist_cum", self.hist_cum),
            ("rece_cum", self.rece_cum),
            ("sche_cum", self.sche_cum),
            ("t_predicted", self.t_predicted),
            ("t_measured", self.t_measured),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(format!("{} must be finite, got {}", name, value));
        }
        if self.t_predicted < 0.0 {
            return Err(format!(
                "t_predicted must be >= 0, got {}",
                self.t_predicted
            ));
        }
        Ok(())
    }
}

/// Accepts `true`/`false`, `1`/`0`, `t`/`f`, and `yes`/`no` in any case
fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "invalid express flag '{}'",
            other
        ))),
    }
}

/// Ordered, validated, read-only collection of trip records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordTable {
    records: Vec<TripRecord>,
}

impl RecordTable {
    /// Validate and wrap records
    ///
    /// Every numeric field must be finite and `t_predicted` non-negative.
    pub fn new(records: Vec<TripRecord>) -> Result<Self> {
        for (index, record) in records.iter().enumerate() {
            record
                .check()
                .map_err(|reason| EvalError::InvalidRecord { index, reason })?;
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TripRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TripRecord> {
        self.records.iter()
    }

    pub fn get(&self, index: usize) -> Option<&TripRecord> {
        self.records.get(index)
    }
}

impl<'a> IntoIterator for &'a RecordTable {
    type Item = &'a TripRecord;
    type IntoIter = std::slice::Iter<'a, TripRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Optional restriction applied by a record source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// `Some(true)` keeps express trips only, `Some(false)` local trips only
    pub express: Option<bool>,
    pub route: Option<String>,
}

impl RecordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, record: &TripRecord) -> bool {
        if let Some(express) = self.express {
            if record.is_express != express {
                return false;
            }
        }
        if let Some(route) = &self.route {
            if &record.route != route {
                return false;
            }
        }
        true
    }
}

/// Anything that can produce trip records for an evaluation run
pub trait RecordSource {
    fn fetch(&self, filter: &RecordFilter) -> Result<RecordTable>;
}

/// In-memory record source
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordSource {
    records: Vec<TripRecord>,
}

impl MemoryRecordSource {
    pub fn new(records: Vec<TripRecord>) -> Self {
        Self { records }
    }
}

impl RecordSource for MemoryRecordSource {
    fn fetch(&self, filter: &RecordFilter) -> Result<RecordTable> {
        let selected = self
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        RecordTable::new(selected)
    }
}

/// Headered CSV file with one [`TripRecord`] per row
#[derive(Debug, Clone)]
pub struct CsvRecordSource {
    path: PathBuf,
}

impl CsvRecordSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for CsvRecordSource {
    fn fetch(&self, filter: &RecordFilter) -> Result<RecordTable> {
        let file = File::open(&self.path).map_err(|e| {
            EvalError::Source(format!("cannot open {}: {}", self.path.display(), e))
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut selected = Vec::new();
        for (row, result) in reader.deserialize::<TripRecord>().enumerate() {
            let record = result.map_err(|e| {
                EvalError::Source(format!(
                    "{}: row {}: {}",
                    self.path.display(),
                    row + 1,
                    e
                ))
            })?;
            if filter.matches(&record) {
                selected.push(record);
            }
        }

        tracing::debug!(
            path = %self.path.display(),
            records = selected.len(),
            "loaded trip records"
        );
        RecordTable::new(selected)
    }
}
