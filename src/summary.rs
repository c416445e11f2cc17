//! Flattened per-bin, per-model report table

use crate::binning::ResidualCutoffs;
use crate::coefficients::{CoefficientSet, ModelKind};
use crate::evaluate::MetricRow;
use crate::histogram::HistogramRow;
use crate::pipeline::BinReport;
use serde::Serialize;

/// Column headers before the residual bucket columns
pub const LEADING_COLUMNS: [&str; 4] = ["Bin", "Historical", "Recent", "Schedule"];

/// Column headers after the residual bucket columns
pub const TRAILING_COLUMNS: [&str; 4] = ["R2", "SD", "Mean", "Median"];

/// One (bin, model) row of the summary
///
/// The model is not a column; within a bin, rows follow [`ModelKind::ALL`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub bin: String,
    pub model: ModelKind,
    pub coefficients: CoefficientSet,
    pub histogram: HistogramRow,
    pub metrics: MetricRow,
}

fn format_float(value: f64, precision: Option<usize>) -> String {
    match precision {
        Some(p) if value.is_finite() => format!("{:.*}", p, value),
        _ => format!("{}", value),
    }
}

impl SummaryRow {
    /// Cell strings in column order
    ///
    /// `precision` fixes the number of decimals for float cells; `None`
    /// prints the shortest representation that round-trips.
    pub fn cells(&self, precision: Option<usize>) -> Vec<String> {
        let mut cells = Vec::with_capacity(LEADING_COLUMNS.len() + self.histogram.counts.len() + 5);
        cells.push(self.bin.clone());
        for weight in self.coefficients.to_array() {
            cells.push(format_float(weight, precision));
        }
        cells.extend(self.histogram.counts.iter().map(|c| c.to_string()));
        cells.push(self.histogram.total.to_string());
        for metric in [
            self.metrics.r2,
            self.metrics.sd,
            self.metrics.mean,
            self.metrics.median,
        ] {
            cells.push(format_float(metric, precision));
        }
        cells
    }

    /// Bitwise comparison, treating NaN cells as equal to NaN
    pub fn same_bits(&self, other: &SummaryRow) -> bool {
        let coefficients_match = self
            .coefficients
            .to_array()
            .iter()
            .zip(other.coefficients.to_array().iter())
            .all(|(a, b)| a.to_bits() == b.to_bits());

        self.bin == other.bin
            && self.model == other.model
            && coefficients_match
            && self.histogram == other.histogram
            && self.metrics.same_bits(&other.metrics)
    }
}

/// The terminal report: `N_bins × 3` rows with a fixed column set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryTable {
    pub columns: Vec<String>,
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    /// Column headers for a given residual bucket set
    pub fn column_names(residual_cutoffs: &ResidualCutoffs) -> Vec<String> {
        LEADING_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(residual_cutoffs.column_labels())
            .chain(TRAILING_COLUMNS.iter().map(|c| c.to_string()))
            .collect()
    }

    /// Flatten bin reports into rows, bins in report order, models in
    /// [`ModelKind::ALL`] order
    pub fn assemble(reports: &[BinReport], residual_cutoffs: &ResidualCutoffs) -> Self {
        let rows = reports
            .iter()
            .flat_map(|report| {
                ModelKind::ALL.iter().map(move |&model| SummaryRow {
                    bin: report.label.label.clone(),
                    model,
                    coefficients: report.coefficients_for(model),
                    histogram: report.histogram_for(model).clone(),
                    metrics: report.metrics_for(model),
                })
            })
            .collect();

        Self {
            columns: Self::column_names(residual_cutoffs),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows belonging to one model, in bin order
    pub fn rows_for(&self, model: ModelKind) -> impl Iterator<Item = &SummaryRow> {
        self.rows.iter().filter(move |row| row.model == model)
    }

    pub fn same_bits(&self, other: &SummaryTable) -> bool {
        self.columns == other.columns
            && self.rows.len() == other.rows.len()
            && self
                .rows
                .iter()
                .zip(&other.rows)
                .all(|(a, b)| a.same_bits(b))
    }
}
