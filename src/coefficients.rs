//! Coefficient sets for the three compared prediction models

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tolerance used when checking that normalized coefficients sum to 1
pub const NORMALIZED_SUM_TOLERANCE: f64 = 1e-9;

/// The compared models, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Fixed prior weights
    Original,
    /// Least-squares fit
    Optimized,
    /// Least-squares fit rescaled to sum to 1
    Normalized,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::Original, ModelKind::Optimized, ModelKind::Normalized];

    /// Position in [`ModelKind::ALL`]
    pub fn index(self) -> usize {
        match self {
            ModelKind::Original => 0,
            ModelKind::Optimized => 1,
            ModelKind::Normalized => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Original => "Original",
            ModelKind::Optimized => "Optimized",
            ModelKind::Normalized => "Normalized",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "original" => Ok(ModelKind::Original),
            "optimized" => Ok(ModelKind::Optimized),
            "normalized" => Ok(ModelKind::Normalized),
            _ => Err(EvalError::UnknownModel(s.to_string())),
        }
    }
}

/// Weights applied to the historical, recent, and scheduled predictors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSet {
    pub historical: f64,
    pub recent: f64,
    pub schedule: f64,
}

impl CoefficientSet {
    pub fn new(historical: f64, recent: f64, schedule: f64) -> Self {
        Self {
            historical,
            recent,
            schedule,
        }
    }

    /// The fixed prior `(0.4, 0.4, 0.2)` of the original weighted model
    pub fn original() -> Self {
        Self::new(0.4, 0.4, 0.2)
    }

    /// Marker for a bin whose coefficients could not be computed
    pub fn undefined() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN)
    }

    pub fn from_array(values: [f64; 3]) -> Self {
        Self::new(values[0], values[1], values[2])
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.historical, self.recent, self.schedule]
    }

    pub fn sum(&self) -> f64 {
        self.historical + self.recent + self.schedule
    }

    pub fn is_defined(&self) -> bool {
        self.to_array().iter().all(|c| c.is_finite())
    }

    /// Predicted travel time for one set of cumulative predictors
    pub fn predict(&self, hist_cum: f64, rece_cum: f64, sche_cum: f64) -> f64 {
        self.historical * hist_cum + self.recent * rece_cum + self.schedule * sche_cum
    }

    /// Rescale so the three weights sum to 1, keeping their ratios
    ///
    /// Fails with [`EvalError::ZeroSumCoefficient`] when the sum is zero or
    /// not finite.
    pub fn normalized(&self) -> Result<Self> {
        let sum = self.sum();
        if sum == 0.0 || !sum.is_finite() {
            return Err(EvalError::ZeroSumCoefficient);
        }
        Ok(Self::new(
            self.historical / sum,
            self.recent / sum,
            self.schedule / sum,
        ))
    }
}

impl Default for CoefficientSet {
    fn default() -> Self {
        Self::original()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_sums_to_one() {
        let set = CoefficientSet::new(0.6, 0.3, 0.3).normalized().unwrap();
        assert!((set.sum() - 1.0).abs() < NORMALIZED_SUM_TOLERANCE);
        assert!((set.historical - 0.5).abs() < 1e-12);
        assert!((set.recent - 0.25).abs() < 1e-12);
        assert!((set.schedule - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_keeps_signs_with_negative_weight() {
        let set = CoefficientSet::new(1.5, -0.25, -0.25).normalized().unwrap();
        assert!((set.sum() - 1.0).abs() < NORMALIZED_SUM_TOLERANCE);
        assert!(set.historical > 0.0);
        assert!(set.recent < 0.0);
    }

    #[test]
    fn test_normalize_zero_sum_fails() {
        let err = CoefficientSet::new(1.0, -1.0, 0.0).normalized().unwrap_err();
        assert_eq!(err, EvalError::ZeroSumCoefficient);
    }

    #[test]
    fn test_normalize_undefined_fails() {
        assert!(CoefficientSet::undefined().normalized().is_err());
    }

    #[test]
    fn test_original_is_already_normalized() {
        let original = CoefficientSet::original();
        assert!((original.sum() - 1.0).abs() < NORMALIZED_SUM_TOLERANCE);
        assert!(original.is_defined());
        assert!(!CoefficientSet::undefined().is_defined());
    }

    #[test]
    fn test_predict_weights_predictors() {
        let set = CoefficientSet::original();
        assert!((set.predict(100.0, 200.0, 300.0) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_model_kind_parse_and_order() {
        assert_eq!("Optimized".parse::<ModelKind>().unwrap(), ModelKind::Optimized);
        assert_eq!(" normalized ".parse::<ModelKind>().unwrap(), ModelKind::Normalized);
        assert!("ridge".parse::<ModelKind>().is_err());
        for (i, model) in ModelKind::ALL.iter().enumerate() {
            assert_eq!(model.index(), i);
        }
    }
}
