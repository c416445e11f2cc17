//! JSON output format for evaluation reports
//!
//! Undefined values (NaN) are written as `null`.

use crate::coefficients::{CoefficientSet, ModelKind};
use crate::config::{FitFallback, FitScope};
use crate::evaluate::MetricRow;
use crate::pipeline::{BinReport, Evaluation};
use crate::summary::SummaryRow;
use serde::{Deserialize, Serialize};

fn defined(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// A coefficient triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonCoefficients {
    pub historical: Option<f64>,
    pub recent: Option<f64>,
    pub schedule: Option<f64>,
}

impl From<CoefficientSet> for JsonCoefficients {
    fn from(set: CoefficientSet) -> Self {
        Self {
            historical: defined(set.historical),
            recent: defined(set.recent),
            schedule: defined(set.schedule),
        }
    }
}

/// Accuracy metrics of one model in one bin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonMetrics {
    pub count: usize,
    pub r2: Option<f64>,
    pub sd: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
}

impl From<MetricRow> for JsonMetrics {
    fn from(row: MetricRow) -> Self {
        Self {
            count: row.count,
            r2: defined(row.r2),
            sd: defined(row.sd),
            mean: defined(row.mean),
            median: defined(row.median),
        }
    }
}

/// One model's results inside a bin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonModelResult {
    pub model: ModelKind,
    pub coefficients: JsonCoefficients,
    pub metrics: JsonMetrics,
    /// Counts per residual bucket, in bucket order
    pub histogram: Vec<u64>,
    pub total: u64,
    /// Per-bin problems recorded for this model
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failures: Vec<String>,
}

/// All results for one predicted-time bin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonBin {
    pub index: usize,
    pub label: String,
    pub models: Vec<JsonModelResult>,
}

impl From<&BinReport> for JsonBin {
    fn from(report: &BinReport) -> Self {
        let models = ModelKind::ALL
            .iter()
            .map(|&model| {
                let histogram = report.histogram_for(model);
                JsonModelResult {
                    model,
                    coefficients: report.coefficients_for(model).into(),
                    metrics: report.metrics_for(model).into(),
                    histogram: histogram.counts.clone(),
                    total: histogram.total,
                    failures: report.failures_for(model).map(|e| e.to_string()).collect(),
                }
            })
            .collect();

        Self {
            index: report.label.index,
            label: report.label.label.clone(),
            models,
        }
    }
}

/// One summary table row with its cells keyed by meaning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSummaryRow {
    pub bin: String,
    pub model: ModelKind,
    pub historical: Option<f64>,
    pub recent: Option<f64>,
    pub schedule: Option<f64>,
    pub histogram: Vec<u64>,
    pub total: u64,
    pub r2: Option<f64>,
    pub sd: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
}

impl From<&SummaryRow> for JsonSummaryRow {
    fn from(row: &SummaryRow) -> Self {
        Self {
            bin: row.bin.clone(),
            model: row.model,
            historical: defined(row.coefficients.historical),
            recent: defined(row.coefficients.recent),
            schedule: defined(row.coefficients.schedule),
            histogram: row.histogram.counts.clone(),
            total: row.histogram.total,
            r2: defined(row.metrics.r2),
            sd: defined(row.metrics.sd),
            mean: defined(row.metrics.mean),
            median: defined(row.metrics.median),
        }
    }
}

/// Flattened summary: column names plus one row per (bin, model)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSummaryTable {
    pub columns: Vec<String>,
    pub rows: Vec<JsonSummaryRow>,
}

/// Whole-table coefficients of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonModelCoefficients {
    pub model: ModelKind,
    #[serde(flatten)]
    pub coefficients: JsonCoefficients,
}

/// Complete JSON report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonOutput {
    /// Crate version that produced the report
    pub version: String,
    /// Format identifier
    pub format: String,
    pub records: usize,
    pub scope: FitScope,
    pub fallback: FitFallback,
    pub global_coefficients: Vec<JsonModelCoefficients>,
    pub bins: Vec<JsonBin>,
    pub summary: JsonSummaryTable,
}

impl JsonOutput {
    pub fn from_evaluation(evaluation: &Evaluation) -> Self {
        let summary = evaluation.summary_table();
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "arrival-eval-json-v1".to_string(),
            records: evaluation.record_count(),
            scope: evaluation.scope(),
            fallback: evaluation.fallback(),
            global_coefficients: ModelKind::ALL
                .iter()
                .map(|&model| JsonModelCoefficients {
                    model,
                    coefficients: evaluation.model_coefficients(model).into(),
                })
                .collect(),
            bins: evaluation.bin_reports().iter().map(JsonBin::from).collect(),
            summary: JsonSummaryTable {
                columns: summary.columns.clone(),
                rows: summary.rows.iter().map(JsonSummaryRow::from).collect(),
            },
        }
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
