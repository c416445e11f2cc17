//! No-intercept least-squares fitting of measured travel time
//!
//! Fits `t_measured ≈ h·hist_cum + r·rece_cum + s·sche_cum` in `f64` with an
//! SVD solve from `nalgebra`. The design matrix is equilibrated first: every
//! predictor column and the target are divided by their root-mean-square,
//! which keeps the problem well scaled for travel times in the thousands of
//! seconds. The fitted weights are mapped back to the original units
//! afterwards.
//!
//! Degenerate inputs are rejected before the solver runs:
//! - fewer than 3 records
//! - a predictor column that is all zero
//! - collinear predictors (near-singular normalized Gram matrix)

use crate::coefficients::{CoefficientSet, ModelKind};
use crate::error::{EvalError, Result};
use crate::record::TripRecord;
use crossbeam::channel::{self, RecvTimeoutError};
use nalgebra::{DMatrix, DVector};
use std::thread;
use std::time::{Duration, Instant};

/// Number of predictors (historical, recent, schedule)
pub const N_PREDICTORS: usize = 3;

/// Determinant threshold of the RMS-normalized Gram matrix below which the
/// predictors are treated as collinear
pub const COLLINEARITY_THRESHOLD: f64 = 1e-10;

/// Singular values below this (relative to the equilibrated columns) are
/// treated as zero by the SVD solve
const SVD_EPSILON: f64 = 1e-12;

const PREDICTOR_NAMES: [&str; N_PREDICTORS] = ["hist_cum", "rece_cum", "sche_cum"];

/// Predictor triple and measured time of one record
type Row = ([f64; N_PREDICTORS], f64);

fn degenerate(reason: impl Into<String>) -> EvalError {
    EvalError::DegenerateFit {
        reason: reason.into(),
    }
}

fn rms(values: impl Iterator<Item = f64>) -> f64 {
    let (sum_sq, n) = values.fold((0.0, 0usize), |(acc, n), v| (acc + v * v, n + 1));
    if n == 0 {
        0.0
    } else {
        (sum_sq / n as f64).sqrt()
    }
}

fn det3(m: &[[f64; N_PREDICTORS]; N_PREDICTORS]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

fn collect_rows<'a, I>(records: I) -> Vec<Row>
where
    I: IntoIterator<Item = &'a TripRecord>,
{
    records
        .into_iter()
        .map(|r| ([r.hist_cum, r.rece_cum, r.sche_cum], r.t_measured))
        .collect()
}

/// Fit the three predictor weights by ordinary least squares, no intercept
///
/// # Example
/// ```
/// use arrival_eval::fit::fit_least_squares;
/// use arrival_eval::record::TripRecord;
///
/// let records: Vec<TripRecord> = [(100.0, 40.0, 10.0), (50.0, 90.0, 30.0), (20.0, 30.0, 120.0), (80.0, 80.0, 80.0)]
///     .iter()
///     .map(|&(h, r, s)| TripRecord::from_times(h, r, s, h, 0.5 * h + 0.3 * r + 0.2 * s))
///     .collect();
///
/// let coefficients = fit_least_squares(&records).unwrap();
/// assert!((coefficients.historical - 0.5).abs() < 1e-9);
/// ```
pub fn fit_least_squares<'a, I>(records: I) -> Result<CoefficientSet>
where
    I: IntoIterator<Item = &'a TripRecord>,
{
    solve_rows(&collect_rows(records))
}

fn solve_rows(rows: &[Row]) -> Result<CoefficientSet> {
    let n = rows.len();
    if n < N_PREDICTORS {
        return Err(degenerate(format!(
            "need at least {} records, got {}",
            N_PREDICTORS, n
        )));
    }

    let mut scales = [0.0; N_PREDICTORS];
    for (j, scale) in scales.iter_mut().enumerate() {
        *scale = rms(rows.iter().map(|(x, _)| x[j]));
        if *scale == 0.0 {
            return Err(degenerate(format!(
                "predictor {} is zero for every record",
                PREDICTOR_NAMES[j]
            )));
        }
        if !scale.is_finite() {
            return Err(degenerate(format!(
                "predictor {} is not finite",
                PREDICTOR_NAMES[j]
            )));
        }
    }
    let target_scale = match rms(rows.iter().map(|(_, y)| *y)) {
        s if s > 0.0 && s.is_finite() => s,
        _ => 1.0,
    };

    // Gram matrix of the equilibrated columns; its diagonal is exactly 1.
    let mut gram = [[0.0; N_PREDICTORS]; N_PREDICTORS];
    for (x, _) in rows {
        for j in 0..N_PREDICTORS {
            for k in 0..N_PREDICTORS {
                gram[j][k] += (x[j] / scales[j]) * (x[k] / scales[k]);
            }
        }
    }
    for row in gram.iter_mut() {
        for cell in row.iter_mut() {
            *cell /= n as f64;
        }
    }
    let det = det3(&gram);
    if det.abs() < COLLINEARITY_THRESHOLD {
        return Err(degenerate(format!(
            "predictors are collinear (normalized Gram determinant {:.3e})",
            det
        )));
    }

    let mut design = Vec::with_capacity(n * N_PREDICTORS);
    let mut target = Vec::with_capacity(n);
    for (x, y) in rows {
        for j in 0..N_PREDICTORS {
            design.push(x[j] / scales[j]);
        }
        target.push(y / target_scale);
    }

    let x = DMatrix::from_row_slice(n, N_PREDICTORS, &design);
    let y = DVector::from_vec(target);
    let scaled = x
        .svd(true, true)
        .solve(&y, SVD_EPSILON)
        .map_err(|e| degenerate(format!("least-squares solve failed: {}", e)))?;

    let mut weights = [0.0; N_PREDICTORS];
    for (j, weight) in weights.iter_mut().enumerate() {
        *weight = scaled[j] * target_scale / scales[j];
    }

    let coefficients = CoefficientSet::from_array(weights);
    if !coefficients.is_defined() {
        return Err(degenerate("solver produced non-finite coefficients"));
    }
    Ok(coefficients)
}

/// Wait at most `deadline` for `solve` to finish on its own thread
///
/// On timeout the worker is left to finish in the background and its result
/// is discarded.
fn solve_within<F>(rows: Vec<Row>, deadline: Duration, solve: F) -> Result<CoefficientSet>
where
    F: FnOnce(&[Row]) -> Result<CoefficientSet> + Send + 'static,
{
    let start = Instant::now();
    let (tx, rx) = channel::bounded(1);
    thread::Builder::new()
        .name("fit-solver".to_string())
        .spawn(move || {
            // Receiver is gone once the deadline has passed
            let _ = tx.send(solve(rows.as_slice()));
        })
        .map_err(|e| degenerate(format!("cannot start solver thread: {}", e)))?;

    match rx.recv_timeout(deadline) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(EvalError::FitDeadlineExceeded {
            elapsed_ms: start.elapsed().as_millis() as u64,
            deadline_ms: deadline.as_millis() as u64,
        }),
        Err(RecvTimeoutError::Disconnected) => {
            Err(degenerate("least-squares solver terminated abnormally"))
        }
    }
}

/// Produces the Original, Optimized, and Normalized coefficient sets
#[derive(Debug, Clone)]
pub struct ModelFitter {
    original: CoefficientSet,
    deadline: Option<Duration>,
}

impl ModelFitter {
    pub fn new(original: CoefficientSet, deadline: Option<Duration>) -> Self {
        Self { original, deadline }
    }

    pub fn original(&self) -> CoefficientSet {
        self.original
    }

    /// Least-squares fit, abandoned when it runs past the deadline
    pub fn fit<'a, I>(&self, records: I) -> Result<CoefficientSet>
    where
        I: IntoIterator<Item = &'a TripRecord>,
    {
        let rows = collect_rows(records);
        match self.deadline {
            Some(deadline) => solve_within(rows, deadline, solve_rows),
            None => solve_rows(&rows),
        }
    }

    /// Coefficient sets in [`ModelKind::ALL`] order for a given Optimized fit
    ///
    /// An undefined Optimized set yields an undefined Normalized set. A
    /// normalization failure is returned alongside the sets so the caller can
    /// record it.
    pub fn coefficient_sets(
        &self,
        optimized: CoefficientSet,
    ) -> ([CoefficientSet; 3], Option<EvalError>) {
        let (normalized, error) = if optimized.is_defined() {
            match optimized.normalized() {
                Ok(set) => (set, None),
                Err(e) => (CoefficientSet::undefined(), Some(e)),
            }
        } else {
            (CoefficientSet::undefined(), None)
        };

        let mut sets = [CoefficientSet::undefined(); 3];
        sets[ModelKind::Original.index()] = self.original;
        sets[ModelKind::Optimized.index()] = optimized;
        sets[ModelKind::Normalized.index()] = normalized;
        (sets, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Predictors with independent variation and an exact linear target
    fn linear_fixture(weights: [f64; 3]) -> Vec<TripRecord> {
        let predictors = [
            (100.0, 40.0, 10.0),
            (50.0, 90.0, 30.0),
            (20.0, 30.0, 120.0),
            (80.0, 80.0, 80.0),
            (150.0, 20.0, 60.0),
            (60.0, 140.0, 100.0),
            (200.0, 180.0, 40.0),
            (10.0, 70.0, 160.0),
        ];
        predictors
            .iter()
            .map(|&(h, r, s)| {
                let measured = weights[0] * h + weights[1] * r + weights[2] * s;
                TripRecord::from_times(h, r, s, h, measured)
            })
            .collect()
    }

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_fit_recovers_exact_weights() {
        let records = linear_fixture([0.5, 0.3, 0.2]);
        let fit = fit_least_squares(&records).unwrap();
        assert_close(fit.historical, 0.5, 1e-9);
        assert_close(fit.recent, 0.3, 1e-9);
        assert_close(fit.schedule, 0.2, 1e-9);
    }

    #[test]
    fn test_fit_recovers_weights_at_travel_time_scale() {
        // Same shape scaled into the thousands of seconds
        let records: Vec<TripRecord> = linear_fixture([1.1, 0.4, -0.3])
            .into_iter()
            .map(|r| {
                TripRecord::from_times(
                    r.hist_cum * 12.0,
                    r.rece_cum * 12.0,
                    r.sche_cum * 12.0,
                    r.t_predicted * 12.0,
                    r.t_measured * 12.0,
                )
            })
            .collect();
        let fit = fit_least_squares(&records).unwrap();
        assert_close(fit.historical, 1.1, 1e-9);
        assert_close(fit.recent, 0.4, 1e-9);
        assert_close(fit.schedule, -0.3, 1e-9);
    }

    #[test]
    fn test_fit_proportional_history_zeroes_other_weights() {
        // Measured equals history exactly; recent and schedule vary independently.
        let records: Vec<TripRecord> = [
            (100.0, 12.0, 40.0),
            (200.0, 35.0, 18.0),
            (300.0, 20.0, 55.0),
            (400.0, 48.0, 25.0),
            (250.0, 30.0, 33.0),
        ]
        .iter()
        .map(|&(h, r, s)| TripRecord::from_times(h, r, s, h, h))
        .collect();
        let fit = fit_least_squares(&records).unwrap();
        assert_close(fit.historical, 1.0, 1e-9);
        assert_close(fit.recent, 0.0, 1e-9);
        assert_close(fit.schedule, 0.0, 1e-9);
    }

    #[test]
    fn test_fit_rejects_too_few_records() {
        let records = linear_fixture([0.5, 0.3, 0.2]);
        let err = fit_least_squares(&records[..2]).unwrap_err();
        assert!(matches!(err, EvalError::DegenerateFit { .. }));
    }

    #[test]
    fn test_fit_rejects_empty_group() {
        let err = fit_least_squares(std::iter::empty()).unwrap_err();
        assert!(matches!(err, EvalError::DegenerateFit { .. }));
    }

    #[test]
    fn test_fit_rejects_zero_predictor_column() {
        // hist only, recent and schedule all zero
        let records = vec![
            TripRecord::from_times(100.0, 0.0, 0.0, 100.0, 105.0),
            TripRecord::from_times(200.0, 0.0, 0.0, 200.0, 210.0),
            TripRecord::from_times(300.0, 0.0, 0.0, 300.0, 290.0),
        ];
        match fit_least_squares(&records).unwrap_err() {
            EvalError::DegenerateFit { reason } => assert!(reason.contains("rece_cum")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_fit_rejects_collinear_predictors() {
        let records: Vec<TripRecord> = (1..=6)
            .map(|i| {
                let h = 100.0 * i as f64;
                TripRecord::from_times(h, 2.0 * h, 0.5 * h, h, h)
            })
            .collect();
        match fit_least_squares(&records).unwrap_err() {
            EvalError::DegenerateFit { reason } => assert!(reason.contains("collinear")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_fit_recovers_weights_with_correlated_predictors() {
        // All three predictors track the same travel time to within a minute,
        // as real cumulative times do.
        let records: Vec<TripRecord> = (0..2000)
            .map(|i| {
                let t = 300.0 + i as f64 * 0.75;
                let h = t + ((i * 7) % 81) as f64 - 40.0;
                let r = t + ((i * 11) % 79) as f64 - 39.0;
                let s = t + ((i * 5) % 83) as f64 - 41.0;
                TripRecord::from_times(h, r, s, t, 0.5 * h + 0.3 * r + 0.2 * s)
            })
            .collect();
        let fit = fit_least_squares(&records).unwrap();
        assert_close(fit.historical, 0.5, 1e-8);
        assert_close(fit.recent, 0.3, 1e-8);
        assert_close(fit.schedule, 0.2, 1e-8);
    }

    #[test]
    fn test_slow_solve_is_abandoned_at_deadline() {
        let rows = collect_rows(&linear_fixture([0.5, 0.3, 0.2]));
        let start = Instant::now();
        let err = solve_within(rows, Duration::from_millis(20), |rows| {
            thread::sleep(Duration::from_secs(2));
            solve_rows(rows)
        })
        .unwrap_err();

        assert!(start.elapsed() < Duration::from_secs(1));
        match err {
            EvalError::FitDeadlineExceeded {
                elapsed_ms,
                deadline_ms,
            } => {
                assert_eq!(deadline_ms, 20);
                assert!(elapsed_ms >= 20);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_solve_within_deadline_returns_fit() {
        let records = linear_fixture([0.5, 0.3, 0.2]);
        let fit = solve_within(collect_rows(&records), Duration::from_secs(10), solve_rows).unwrap();
        assert_eq!(fit, fit_least_squares(&records).unwrap());
    }

    #[test]
    fn test_solve_within_passes_solver_error_through() {
        let records = linear_fixture([0.5, 0.3, 0.2]);
        let err = solve_within(
            collect_rows(&records[..2]),
            Duration::from_secs(10),
            solve_rows,
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::DegenerateFit { .. }));
    }

    #[test]
    fn test_fitter_with_generous_deadline_matches_plain_fit() {
        let fitter = ModelFitter::new(CoefficientSet::original(), Some(Duration::from_secs(10)));
        let records = linear_fixture([0.5, 0.3, 0.2]);
        assert_eq!(fitter.fit(&records).unwrap(), fit_least_squares(&records).unwrap());
    }

    #[test]
    fn test_fitter_without_deadline_matches_plain_fit() {
        let fitter = ModelFitter::new(CoefficientSet::original(), None);
        let records = linear_fixture([0.5, 0.3, 0.2]);
        assert_eq!(fitter.fit(&records).unwrap(), fit_least_squares(&records).unwrap());
    }

    #[test]
    fn test_coefficient_sets_order_and_normalization() {
        let fitter = ModelFitter::new(CoefficientSet::original(), None);
        let (sets, error) = fitter.coefficient_sets(CoefficientSet::new(0.8, 0.6, 0.6));
        assert!(error.is_none());
        assert_eq!(sets[0], CoefficientSet::original());
        assert_eq!(sets[1], CoefficientSet::new(0.8, 0.6, 0.6));
        assert_close(sets[2].sum(), 1.0, 1e-9);
        assert_close(sets[2].historical, 0.4, 1e-12);
    }

    #[test]
    fn test_coefficient_sets_zero_sum_is_reported() {
        let fitter = ModelFitter::new(CoefficientSet::original(), None);
        let (sets, error) = fitter.coefficient_sets(CoefficientSet::new(0.5, -0.5, 0.0));
        assert_eq!(error, Some(EvalError::ZeroSumCoefficient));
        assert!(!sets[2].is_defined());
    }

    #[test]
    fn test_coefficient_sets_undefined_optimized() {
        let fitter = ModelFitter::new(CoefficientSet::original(), None);
        let (sets, error) = fitter.coefficient_sets(CoefficientSet::undefined());
        assert!(error.is_none());
        assert!(sets[0].is_defined());
        assert!(!sets[1].is_defined());
        assert!(!sets[2].is_defined());
    }
}
