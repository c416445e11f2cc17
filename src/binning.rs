//! Half-open interval binning over travel times and residual magnitudes
//!
//! A [`Cutoffs`] value holds the finite, strictly increasing lower boundaries
//! of a set of intervals `[c[i], c[i+1])`. The last interval is unbounded
//! above, so `k` boundaries define `k` intervals. The same type backs the
//! travel-time bins ([`BinCutoffs`]) and the residual histogram buckets
//! ([`ResidualCutoffs`]).

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default travel-time bin boundaries in seconds: `[0, 120, 240, 360, 600, 900, 1200, inf)`
pub const DEFAULT_BIN_CUTOFFS: [f64; 7] = [0.0, 120.0, 240.0, 360.0, 600.0, 900.0, 1200.0];

/// Default absolute-residual bucket boundaries in seconds: `[0, 60, 120, 240, 360, inf)`
pub const DEFAULT_RESIDUAL_CUTOFFS: [f64; 5] = [0.0, 60.0, 120.0, 240.0, 360.0];

/// Ordered lower boundaries of half-open intervals, last one unbounded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cutoffs {
    boundaries: Vec<f64>,
}

/// Travel-time bins keyed on predicted time
pub type BinCutoffs = Cutoffs;

/// Residual-magnitude histogram buckets
pub type ResidualCutoffs = Cutoffs;

/// A bin's position and its display label, e.g. `[120, 240)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BinLabel {
    pub index: usize,
    pub label: String,
}

impl fmt::Display for BinLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl Cutoffs {
    /// Build from finite lower boundaries, validating the ordering
    pub fn new(boundaries: Vec<f64>) -> Result<Self> {
        let cutoffs = Self { boundaries };
        cutoffs.validate()?;
        Ok(cutoffs)
    }

    pub fn default_bins() -> Self {
        Self {
            boundaries: DEFAULT_BIN_CUTOFFS.to_vec(),
        }
    }

    pub fn default_residuals() -> Self {
        Self {
            boundaries: DEFAULT_RESIDUAL_CUTOFFS.to_vec(),
        }
    }

    /// Check that boundaries start at 0, are finite, and strictly increase
    pub fn validate(&self) -> Result<()> {
        let Some(&first) = self.boundaries.first() else {
            return Err(EvalError::InvalidConfig(
                "cutoffs need at least one boundary".to_string(),
            ));
        };
        if first != 0.0 {
            return Err(EvalError::InvalidConfig(format!(
                "first cutoff must be 0, got {}",
                first
            )));
        }
        if let Some(bad) = self.boundaries.iter().find(|b| !b.is_finite()) {
            return Err(EvalError::InvalidConfig(format!(
                "cutoffs must be finite (the last interval is already unbounded), got {}",
                bad
            )));
        }
        if let Some(pair) = self.boundaries.windows(2).find(|w| w[0] >= w[1]) {
            return Err(EvalError::InvalidConfig(format!(
                "cutoffs must be strictly increasing, got {} then {}",
                pair[0], pair[1]
            )));
        }
        Ok(())
    }

    /// Number of intervals (equal to the number of finite boundaries)
    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    /// Interval index holding `value`, or `None` for NaN and negative values
    ///
    /// A value equal to a boundary belongs to the interval starting there.
    pub fn assign(&self, value: f64) -> Option<usize> {
        if value.is_nan() || value < 0.0 {
            return None;
        }
        // Number of boundaries <= value; boundaries[0] == 0 so this is >= 1.
        let upper = self.boundaries.partition_point(|&b| b <= value);
        upper.checked_sub(1)
    }

    /// Display label of interval `index`
    pub fn label(&self, index: usize) -> Option<BinLabel> {
        let lower = *self.boundaries.get(index)?;
        let label = match self.boundaries.get(index + 1) {
            Some(upper) => format!("[{}, {})", lower, upper),
            None => format!("[{}, inf)", lower),
        };
        Some(BinLabel { index, label })
    }

    /// Labels of every interval in boundary order
    pub fn labels(&self) -> Vec<BinLabel> {
        (0..self.len()).filter_map(|i| self.label(i)).collect()
    }

    /// Group positions of `values` by interval
    ///
    /// Returns one index list per interval, in boundary order, including
    /// empty intervals. Input order is preserved within each list. Values
    /// that [`assign`](Self::assign) rejects are left out.
    pub fn partition<I>(&self, values: I) -> Vec<Vec<usize>>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut groups = vec![Vec::new(); self.len()];
        for (position, value) in values.into_iter().enumerate() {
            if let Some(bin) = self.assign(value) {
                groups[bin].push(position);
            }
        }
        groups
    }
}

impl Default for Cutoffs {
    fn default() -> Self {
        Self::default_bins()
    }
}
