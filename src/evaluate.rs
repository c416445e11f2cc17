// Residual evaluation of one model over one group of records
//
// Accuracy of a model within a bin is summarized by:
// - R2: squared Pearson correlation between measured and predicted time
// - SD, Mean, Median of the absolute residuals |measured - predicted|
//
// R2 is computed in f64. Descriptive statistics use trueno::Vector (SIMD
// mean/stddev) and aprender's DescriptiveStats (median via quantile(0.5)),
// both of which work in f32: SD, Mean and Median carry about 1e-6 relative
// error against an f64 computation. SD is the population standard deviation
// (divide by n), which is what trueno computes; every model uses the same
// convention so rows stay comparable.

use crate::coefficients::CoefficientSet;
use crate::error::EvalError;
use crate::record::TripRecord;
use aprender::stats::DescriptiveStats;
use serde::Serialize;
use trueno::Vector;

/// A model's output for one record
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelPrediction {
    /// Position of the record in the [`crate::record::RecordTable`]
    pub record_index: usize,
    pub predicted_time: f64,
    pub abs_residual: f64,
    /// Bin of `predicted_time`, `None` when the prediction is undefined
    pub bin: Option<usize>,
}

impl ModelPrediction {
    pub fn new(record_index: usize, record: &TripRecord, coefficients: &CoefficientSet) -> Self {
        let predicted_time =
            coefficients.predict(record.hist_cum, record.rece_cum, record.sche_cum);
        Self {
            record_index,
            predicted_time,
            abs_residual: (record.t_measured - predicted_time).abs(),
            bin: None,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.predicted_time.is_finite()
    }
}

/// Accuracy metrics of one model over one bin
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricRow {
    /// Records evaluated
    pub count: usize,
    pub r2: f64,
    pub sd: f64,
    pub mean: f64,
    pub median: f64,
}

impl MetricRow {
    /// Metrics of an empty group: every value undefined
    pub fn empty() -> Self {
        Self {
            count: 0,
            r2: f64::NAN,
            sd: f64::NAN,
            mean: f64::NAN,
            median: f64::NAN,
        }
    }

    /// Bitwise comparison, treating NaN cells as equal to NaN
    pub fn same_bits(&self, other: &MetricRow) -> bool {
        self.count == other.count
            && self.r2.to_bits() == other.r2.to_bits()
            && self.sd.to_bits() == other.sd.to_bits()
            && self.mean.to_bits() == other.mean.to_bits()
            && self.median.to_bits() == other.median.to_bits()
    }
}

// Compared directly: after subtracting a rounded mean a constant series
// leaves noise, not an exact zero.
fn is_constant(series: &[f64]) -> bool {
    series.iter().all(|&v| v == series[0])
}

fn zero_variance(series: &str) -> EvalError {
    EvalError::ZeroVariance {
        series: series.to_string(),
    }
}

/// Squared Pearson correlation between `measured` and `predicted`
///
/// Fails with [`EvalError::ZeroVariance`] when either series is constant
/// (which includes groups of fewer than two points).
pub fn pearson_r2(measured: &[f64], predicted: &[f64]) -> Result<f64, EvalError> {
    let n = measured.len().min(predicted.len());
    if n == 0 || is_constant(&measured[..n]) {
        return Err(zero_variance("measured"));
    }
    if is_constant(&predicted[..n]) {
        return Err(zero_variance("predicted"));
    }
    let nf = n as f64;
    let mean_m = measured[..n].iter().sum::<f64>() / nf;
    let mean_p = predicted[..n].iter().sum::<f64>() / nf;

    let (mut cov, mut var_m, mut var_p) = (0.0, 0.0, 0.0);
    for (m, p) in measured[..n].iter().zip(&predicted[..n]) {
        let dm = m - mean_m;
        let dp = p - mean_p;
        cov += dm * dp;
        var_m += dm * dm;
        var_p += dp * dp;
    }

    if var_m == 0.0 {
        return Err(zero_variance("measured"));
    }
    if var_p == 0.0 {
        return Err(zero_variance("predicted"));
    }

    let r = cov / (var_m.sqrt() * var_p.sqrt());
    Ok(r * r)
}

/// SD, mean, and median of absolute residuals; NaN for an empty slice
pub fn describe_residuals(abs_residuals: &[f64]) -> (f64, f64, f64) {
    if abs_residuals.is_empty() {
        return (f64::NAN, f64::NAN, f64::NAN);
    }

    let samples: Vec<f32> = abs_residuals.iter().map(|&r| r as f32).collect();
    let vec = Vector::from_slice(&samples);

    let sd = vec.stddev().map(f64::from).unwrap_or(f64::NAN);
    let mean = vec.mean().map(f64::from).unwrap_or(f64::NAN);
    let median = DescriptiveStats::new(&vec)
        .quantile(0.5)
        .map(f64::from)
        .unwrap_or(f64::NAN);

    (sd, mean, median)
}

/// Evaluate one model over one group of records
///
/// `predictions` must all be defined and belong to the same group. The
/// returned error, if any, explains an undefined R2; the other metrics are
/// still filled in.
pub fn evaluate_group(
    records: &[TripRecord],
    predictions: &[ModelPrediction],
) -> (MetricRow, Option<EvalError>) {
    if predictions.is_empty() {
        return (MetricRow::empty(), None);
    }

    let measured: Vec<f64> = predictions
        .iter()
        .map(|p| records[p.record_index].t_measured)
        .collect();
    let predicted: Vec<f64> = predictions.iter().map(|p| p.predicted_time).collect();
    let abs_residuals: Vec<f64> = predictions.iter().map(|p| p.abs_residual).collect();

    let (r2, error) = match pearson_r2(&measured, &predicted) {
        Ok(r2) => (r2, None),
        Err(e) => (f64::NAN, Some(e)),
    };
    let (sd, mean, median) = describe_residuals(&abs_residuals);

    (
        MetricRow {
            count: predictions.len(),
            r2,
            sd,
            mean,
            median,
        },
        error,
    )
}
