//! Error types for the evaluation pipeline

use serde::Serialize;
use thiserror::Error;

/// Errors raised while loading records, fitting models, or computing metrics
///
/// Ingestion, validation, and whole-table fit errors abort a run. Per-bin
/// fit and metric errors are recorded against the bin (see
/// [`crate::pipeline::BinFailure`]) and the run continues.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum EvalError {
    #[error("Empty input: record source returned no rows")]
    EmptyInput,

    #[error("Degenerate fit: {reason}")]
    DegenerateFit { reason: String },

    #[error("Zero variance: R2 undefined because the {series} series is constant")]
    ZeroVariance { series: String },

    #[error("Coefficients sum to zero, cannot normalize")]
    ZeroSumCoefficient,

    #[error("Fit exceeded deadline: {elapsed_ms}ms > {deadline_ms}ms")]
    FitDeadlineExceeded { elapsed_ms: u64, deadline_ms: u64 },

    #[error("Invalid record at row {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown model '{0}' (expected original, optimized or normalized)")]
    UnknownModel(String),

    #[error("Unknown bin index {0}")]
    UnknownBin(usize),

    #[error("Record source failed: {0}")]
    Source(String),
}

pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            EvalError::EmptyInput.to_string(),
            "Empty input: record source returned no rows"
        );
        assert_eq!(
            EvalError::DegenerateFit {
                reason: "need at least 3 records, got 2".to_string()
            }
            .to_string(),
            "Degenerate fit: need at least 3 records, got 2"
        );
        assert!(EvalError::UnknownModel("ridge".to_string())
            .to_string()
            .contains("'ridge'"));
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let json = serde_json::to_value(EvalError::ZeroVariance {
            series: "measured".to_string(),
        })
        .unwrap();
        assert_eq!(json["kind"], "zero_variance");
        assert_eq!(json["detail"]["series"], "measured");
    }
}
