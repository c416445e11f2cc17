//! CLI argument parsing for arrival-eval

use crate::config::{EvalConfig, FitFallback, FitScope};
use crate::record::RecordFilter;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the evaluation report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
    /// CSV format for spreadsheet analysis
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "arrival-eval")]
#[command(version)]
#[command(
    about = "Fit and compare bus arrival-time prediction models per travel-time bin",
    long_about = None
)]
pub struct Cli {
    /// Trip records CSV (vehicle, timestamp, stop_sequence, hist_cum, rece_cum,
    /// sche_cum, t_predicted, t_measured, route, depot, is_express)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// TOML configuration file (cutoffs, original coefficients, fit options)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Only evaluate express trips
    #[arg(long, conflicts_with = "local")]
    pub express: bool,

    /// Only evaluate non-express trips
    #[arg(long)]
    pub local: bool,

    /// Only evaluate trips on this route
    #[arg(short, long, value_name = "ROUTE")]
    pub route: Option<String>,

    /// Fit one Optimized model per bin or one over the whole table
    #[arg(long, value_enum)]
    pub scope: Option<FitScope>,

    /// Coefficients used when a bin's own fit fails
    #[arg(long, value_enum)]
    pub fallback: Option<FitFallback>,

    /// Worker threads for per-bin work (default: available cores minus one)
    #[arg(short = 'j', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Discard per-bin fits that take longer than this many milliseconds
    #[arg(long = "fit-deadline-ms", value_name = "MS")]
    pub fit_deadline_ms: Option<u64>,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Write the report to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Enable debug tracing output to stderr
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Record filter built from `--express`, `--local` and `--route`
    pub fn record_filter(&self) -> RecordFilter {
        let express = match (self.express, self.local) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        };
        RecordFilter {
            express,
            route: self.route.clone(),
        }
    }

    /// Apply command-line overrides on top of a file or default config
    pub fn apply_overrides(&self, config: &mut EvalConfig) {
        if let Some(scope) = self.scope {
            config.scope = scope;
        }
        if let Some(fallback) = self.fallback {
            config.fallback = fallback;
        }
        if let Some(workers) = self.workers {
            config.workers = Some(workers);
        }
        if let Some(deadline) = self.fit_deadline_ms {
            config.fit_deadline_ms = Some(deadline);
        }
    }
}
