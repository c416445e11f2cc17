//! Evaluation pipeline
//!
//! Ingest → Validate → Global fit → Bin by `t_predicted` → per-bin Fit →
//! Predict per model → Bin by model prediction → per-bin Evaluate and
//! Histogram → Assemble.
//!
//! Per-bin work runs on the [`crate::worker_pool`]. Each job reads its own
//! slice of the shared, read-only record table and returns a value that the
//! pool places by bin index, so results never depend on scheduling.

use crate::binning::{BinCutoffs, BinLabel};
use crate::coefficients::{CoefficientSet, ModelKind};
use crate::config::{EvalConfig, FitFallback, FitScope};
use crate::error::{EvalError, Result};
use crate::evaluate::{evaluate_group, MetricRow, ModelPrediction};
use crate::fit::{fit_least_squares, ModelFitter};
use crate::histogram::HistogramRow;
use crate::record::{RecordFilter, RecordSource, RecordTable, TripRecord};
use crate::summary::SummaryTable;
use crate::worker_pool::run_jobs;
use serde::Serialize;
use tracing::{debug, info, warn};

/// A problem recorded against one model in one bin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinFailure {
    pub model: ModelKind,
    pub error: EvalError,
}

/// Everything computed for one bin, indexed by [`ModelKind`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinReport {
    pub label: BinLabel,
    pub coefficients: [CoefficientSet; 3],
    pub metrics: [MetricRow; 3],
    pub histograms: [HistogramRow; 3],
    pub failures: Vec<BinFailure>,
}

impl BinReport {
    /// A bin with no records and undefined coefficients
    pub fn empty(label: BinLabel, buckets: usize) -> Self {
        Self {
            label,
            coefficients: [CoefficientSet::undefined(); 3],
            metrics: [MetricRow::empty(); 3],
            histograms: [
                HistogramRow::empty(buckets),
                HistogramRow::empty(buckets),
                HistogramRow::empty(buckets),
            ],
            failures: Vec::new(),
        }
    }

    pub fn coefficients_for(&self, model: ModelKind) -> CoefficientSet {
        self.coefficients[model.index()]
    }

    pub fn metrics_for(&self, model: ModelKind) -> MetricRow {
        self.metrics[model.index()]
    }

    pub fn histogram_for(&self, model: ModelKind) -> &HistogramRow {
        &self.histograms[model.index()]
    }

    pub fn failures_for(&self, model: ModelKind) -> impl Iterator<Item = &EvalError> {
        self.failures
            .iter()
            .filter(move |f| f.model == model)
            .map(|f| &f.error)
    }
}

/// Output of the per-bin fitting stage
struct BinFit {
    sets: [CoefficientSet; 3],
    failures: Vec<BinFailure>,
}

/// Output of the per-bin evaluation stage
struct BinEvaluation {
    metrics: [MetricRow; 3],
    histograms: [HistogramRow; 3],
    failures: Vec<BinFailure>,
}

/// Result of one pipeline run; read-only once built
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    record_count: usize,
    scope: FitScope,
    fallback: FitFallback,
    global: [CoefficientSet; 3],
    reports: Vec<BinReport>,
    summary: SummaryTable,
}

impl Evaluation {
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn scope(&self) -> FitScope {
        self.scope
    }

    pub fn fallback(&self) -> FitFallback {
        self.fallback
    }

    pub fn bin_reports(&self) -> &[BinReport] {
        &self.reports
    }

    pub fn summary_table(&self) -> &SummaryTable {
        &self.summary
    }

    /// Whole-table coefficients of a model
    pub fn model_coefficients(&self, model: ModelKind) -> CoefficientSet {
        self.global[model.index()]
    }

    /// Whole-table coefficients of a model looked up by name
    pub fn model_coefficients_by_name(&self, name: &str) -> Result<CoefficientSet> {
        let model: ModelKind = name.parse()?;
        Ok(self.model_coefficients(model))
    }

    /// Coefficients a model used in one bin
    pub fn bin_coefficients(&self, model: ModelKind, bin: usize) -> Result<CoefficientSet> {
        self.reports
            .get(bin)
            .map(|report| report.coefficients_for(model))
            .ok_or(EvalError::UnknownBin(bin))
    }

    /// Every recorded per-bin failure, in bin order
    pub fn failures(&self) -> impl Iterator<Item = (&BinLabel, &BinFailure)> {
        self.reports
            .iter()
            .flat_map(|report| report.failures.iter().map(move |f| (&report.label, f)))
    }
}

/// Runs evaluations under one validated configuration
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: EvalConfig,
    fitter: ModelFitter,
}

impl Pipeline {
    pub fn new(config: EvalConfig) -> Result<Self> {
        config.validate()?;
        let fitter = ModelFitter::new(config.original_coefficients, config.fit_deadline());
        Ok(Self { config, fitter })
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Fetch records from `source` and evaluate them
    pub fn run_source(
        &self,
        source: &dyn RecordSource,
        filter: &RecordFilter,
    ) -> Result<Evaluation> {
        let table = source.fetch(filter)?;
        self.run(&table)
    }

    /// Evaluate a record table
    pub fn run(&self, table: &RecordTable) -> Result<Evaluation> {
        if table.is_empty() {
            return Err(EvalError::EmptyInput);
        }

        let bins = &self.config.bin_cutoffs;
        let workers = self.config.effective_workers();
        info!(
            records = table.len(),
            bins = bins.len(),
            workers,
            scope = ?self.config.scope,
            "Starting evaluation"
        );

        let global_fit = fit_least_squares(table.iter())?;
        let (global, global_error) = self.fitter.coefficient_sets(global_fit);
        if let Some(e) = global_error {
            return Err(e);
        }
        info!(
            historical = global_fit.historical,
            recent = global_fit.recent,
            schedule = global_fit.schedule,
            "Whole-table fit complete"
        );

        let records = table.records();
        let fit_groups = bins.partition(records.iter().map(|r| r.t_predicted));

        let fits = run_jobs(bins.len(), workers, |bin| {
            self.fit_bin(bin, records, &fit_groups[bin], &global)
        });

        let eval_groups = predictions_by_bin(bins, records, &fit_groups, &fits);

        let residual_cutoffs = &self.config.residual_cutoffs;
        let evaluations = run_jobs(bins.len(), workers, |bin| {
            let mut metrics = [MetricRow::empty(); 3];
            let mut histograms = [
                HistogramRow::empty(residual_cutoffs.len()),
                HistogramRow::empty(residual_cutoffs.len()),
                HistogramRow::empty(residual_cutoffs.len()),
            ];
            let mut failures = Vec::new();

            for model in ModelKind::ALL {
                let group = &eval_groups[model.index()][bin];
                let (row, error) = evaluate_group(records, group);
                metrics[model.index()] = row;
                histograms[model.index()] =
                    residual_cutoffs.histogram(group.iter().map(|p| p.abs_residual));
                if let Some(error) = error {
                    failures.push(BinFailure { model, error });
                }
            }

            BinEvaluation {
                metrics,
                histograms,
                failures,
            }
        });

        let reports: Vec<BinReport> = bins
            .labels()
            .into_iter()
            .zip(fits)
            .zip(evaluations)
            .map(|((label, fit), evaluation)| {
                let mut failures = fit.failures;
                failures.extend(evaluation.failures);
                for failure in &failures {
                    warn!(
                        bin = %label,
                        model = %failure.model,
                        error = %failure.error,
                        "Per-bin failure recorded"
                    );
                }
                BinReport {
                    label,
                    coefficients: fit.sets,
                    metrics: evaluation.metrics,
                    histograms: evaluation.histograms,
                    failures,
                }
            })
            .collect();

        let summary = SummaryTable::assemble(&reports, residual_cutoffs);
        info!(rows = summary.len(), "Evaluation complete");

        Ok(Evaluation {
            record_count: table.len(),
            scope: self.config.scope,
            fallback: self.config.fallback,
            global,
            reports,
            summary,
        })
    }

    fn fit_bin(
        &self,
        bin: usize,
        records: &[TripRecord],
        members: &[usize],
        global: &[CoefficientSet; 3],
    ) -> BinFit {
        if self.config.scope == FitScope::Global {
            return BinFit {
                sets: *global,
                failures: Vec::new(),
            };
        }

        let mut failures = Vec::new();
        let optimized = match self.fitter.fit(members.iter().map(|&i| &records[i])) {
            Ok(fitted) => {
                debug!(
                    bin,
                    records = members.len(),
                    historical = fitted.historical,
                    recent = fitted.recent,
                    schedule = fitted.schedule,
                    "Bin fit complete"
                );
                fitted
            }
            Err(error) => {
                debug!(bin, records = members.len(), %error, "Bin fit failed");
                failures.push(BinFailure {
                    model: ModelKind::Optimized,
                    error,
                });
                match self.config.fallback {
                    FitFallback::Undefined => CoefficientSet::undefined(),
                    FitFallback::Global => global[ModelKind::Optimized.index()],
                }
            }
        };

        let (sets, normalize_error) = self.fitter.coefficient_sets(optimized);
        if let Some(error) = normalize_error {
            failures.push(BinFailure {
                model: ModelKind::Normalized,
                error,
            });
        }
        BinFit { sets, failures }
    }
}

/// Predictions of every model, grouped by the bin of their own predicted time
///
/// Indexed `[model][bin]`. Each record is predicted with the coefficients of
/// the bin its `t_predicted` fell in. Negative predictions go to bin 0;
/// undefined predictions are dropped.
fn predictions_by_bin(
    bins: &BinCutoffs,
    records: &[TripRecord],
    fit_groups: &[Vec<usize>],
    fits: &[BinFit],
) -> [Vec<Vec<ModelPrediction>>; 3] {
    let mut predictions: [Vec<Option<ModelPrediction>>; 3] = [
        vec![None; records.len()],
        vec![None; records.len()],
        vec![None; records.len()],
    ];

    for (members, fit) in fit_groups.iter().zip(fits) {
        for &index in members {
            for model in ModelKind::ALL {
                let mut prediction =
                    ModelPrediction::new(index, &records[index], &fit.sets[model.index()]);
                if prediction.is_defined() {
                    prediction.bin = bins.assign(prediction.predicted_time.max(0.0));
                }
                predictions[model.index()][index] = Some(prediction);
            }
        }
    }

    predictions.map(|per_record| {
        let mut grouped: Vec<Vec<ModelPrediction>> = vec![Vec::new(); bins.len()];
        for prediction in per_record.into_iter().flatten() {
            if let Some(bin) = prediction.bin {
                grouped[bin].push(prediction);
            }
        }
        grouped
    })
}
