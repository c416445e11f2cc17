// Configuration for an evaluation run
//
// Every fixed constant of the pipeline lives here and is passed explicitly
// to the components that need it: bin cutoffs, residual cutoffs, the
// Original model's prior weights, how per-bin fits are scoped and what a
// failed fit falls back to, the worker pool size, and the per-bin fit
// deadline.

use crate::binning::{BinCutoffs, ResidualCutoffs};
use crate::coefficients::CoefficientSet;
use crate::error::{EvalError, Result};
use anyhow::{bail, Context};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Which records each Optimized model is fitted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FitScope {
    /// One fit per predicted-time bin
    #[default]
    PerBin,
    /// One fit over the whole table, shared by every bin
    Global,
}

/// What a bin gets when its own fit fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FitFallback {
    /// Leave the bin's Optimized/Normalized coefficients undefined (NaN)
    #[default]
    Undefined,
    /// Substitute the whole-table coefficients
    Global,
}

/// Configuration for an evaluation run
///
/// # Example
/// ```
/// use arrival_eval::config::EvalConfig;
///
/// let config = EvalConfig::default();
/// assert_eq!(config.bin_cutoffs.len(), 7);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvalConfig {
    /// Lower boundaries of the predicted-time bins (seconds)
    pub bin_cutoffs: BinCutoffs,

    /// Lower boundaries of the absolute-residual histogram buckets (seconds)
    pub residual_cutoffs: ResidualCutoffs,

    /// Fixed weights of the Original model
    pub original_coefficients: CoefficientSet,

    pub scope: FitScope,

    pub fallback: FitFallback,

    /// Worker threads for per-bin work (default: available cores minus one)
    pub workers: Option<usize>,

    /// Per-bin fit deadline in milliseconds
    pub fit_deadline_ms: Option<u64>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            bin_cutoffs: BinCutoffs::default_bins(),
            residual_cutoffs: ResidualCutoffs::default_residuals(),
            original_coefficients: CoefficientSet::original(),
            scope: FitScope::PerBin,
            fallback: FitFallback::Undefined,
            workers: None,
            fit_deadline_ms: None,
        }
    }
}

fn prefixed(field: &str, error: EvalError) -> EvalError {
    match error {
        EvalError::InvalidConfig(msg) => EvalError::InvalidConfig(format!("{}: {}", field, msg)),
        other => other,
    }
}

impl EvalConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: EvalConfig =
            toml::from_str(contents).map_err(|e| EvalError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            bail!("Config file not found: {}", path_ref.display());
        }

        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("Failed to read config file {}", path_ref.display()))?;

        let config = Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid config file {}", path_ref.display()))?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.bin_cutoffs
            .validate()
            .map_err(|e| prefixed("bin_cutoffs", e))?;
        self.residual_cutoffs
            .validate()
            .map_err(|e| prefixed("residual_cutoffs", e))?;

        if !self.original_coefficients.is_defined() {
            return Err(EvalError::InvalidConfig(format!(
                "original_coefficients must be finite, got {:?}",
                self.original_coefficients
            )));
        }

        if self.workers == Some(0) {
            return Err(EvalError::InvalidConfig(
                "workers must be >= 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Worker pool size: the configured value, else available cores minus one
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
                .max(1)
        })
    }

    pub fn fit_deadline(&self) -> Option<Duration> {
        self.fit_deadline_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EvalConfig::default();
        assert_eq!(config.bin_cutoffs.boundaries()[6], 1200.0);
        assert_eq!(config.residual_cutoffs.len(), 5);
        assert_eq!(config.original_coefficients, CoefficientSet::new(0.4, 0.4, 0.2));
        assert_eq!(config.scope, FitScope::PerBin);
        assert_eq!(config.fallback, FitFallback::Undefined);
        assert!(config.validate().is_ok());
        assert!(config.effective_workers() >= 1);
        assert!(config.fit_deadline().is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EvalConfig::from_toml_str(
            r#"
            bin_cutoffs = [0, 300, 900]
            scope = "global"
            fit_deadline_ms = 250

            [original_coefficients]
            historical = 0.5
            recent = 0.3
            schedule = 0.2
            "#,
        )
        .unwrap();
        assert_eq!(config.bin_cutoffs.boundaries(), &[0.0, 300.0, 900.0]);
        assert_eq!(config.residual_cutoffs, ResidualCutoffs::default_residuals());
        assert_eq!(config.scope, FitScope::Global);
        assert_eq!(config.original_coefficients.historical, 0.5);
        assert_eq!(config.fit_deadline(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_toml_rejects_unsorted_cutoffs() {
        let err = EvalConfig::from_toml_str("residual_cutoffs = [0, 60, 30]").unwrap_err();
        assert!(err.to_string().contains("residual_cutoffs"));
    }

    #[test]
    fn test_toml_rejects_unknown_key() {
        assert!(EvalConfig::from_toml_str("bins = [0, 1]").is_err());
    }

    #[test]
    fn test_toml_fallback_value() {
        let config = EvalConfig::from_toml_str(r#"fallback = "global""#).unwrap();
        assert_eq!(config.fallback, FitFallback::Global);
        let config = EvalConfig::from_toml_str(r#"scope = "per-bin""#).unwrap();
        assert_eq!(config.scope, FitScope::PerBin);
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_workers() {
        let mut config = EvalConfig::default();
        config.workers = Some(0);
        assert!(config.validate().is_err());
        config.workers = Some(3);
        assert_eq!(config.effective_workers(), 3);
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_original_coefficients() {
        let mut config = EvalConfig::default();
        config.original_coefficients = CoefficientSet::undefined();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_missing() {
        assert!(EvalConfig::from_file("/nonexistent/arrival-eval.toml").is_err());
    }

    #[test]
    fn test_from_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eval.toml");
        fs::write(&path, "workers = 2\nfallback = \"global\"\n").unwrap();
        let config = EvalConfig::from_file(&path).unwrap();
        assert_eq!(config.workers, Some(2));
        assert_eq!(config.fallback, FitFallback::Global);
    }
}
