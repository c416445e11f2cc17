//! arrival-eval - evaluation of bus arrival-time prediction models
//!
//! Fits an Optimized no-intercept least-squares model of measured travel
//! time on historical, recent, and scheduled cumulative times for every
//! predicted-time bin, derives a Normalized variant whose weights sum to 1,
//! and compares both against the fixed Original weights. For each bin and
//! model the pipeline reports R², SD, mean, and median of absolute
//! residuals plus a residual-magnitude histogram, flattened into a
//! [`summary::SummaryTable`].
//!
//! ```no_run
//! use arrival_eval::config::EvalConfig;
//! use arrival_eval::pipeline::Pipeline;
//! use arrival_eval::record::{CsvRecordSource, RecordFilter};
//!
//! let pipeline = Pipeline::new(EvalConfig::default())?;
//! let source = CsvRecordSource::new("trips.csv");
//! let evaluation = pipeline.run_source(&source, &RecordFilter::all())?;
//! println!("{} summary rows", evaluation.summary_table().len());
//! # Ok::<(), arrival_eval::error::EvalError>(())
//! ```

pub mod binning;
pub mod cli;
pub mod coefficients;
pub mod config;
pub mod csv_output;
pub mod error;
pub mod evaluate;
pub mod fit;
pub mod histogram;
pub mod json_output;
pub mod pipeline;
pub mod record;
pub mod summary;
pub mod text_output;
pub mod worker_pool;
