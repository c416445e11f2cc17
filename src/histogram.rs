//! Residual-magnitude histograms

use crate::binning::ResidualCutoffs;
use serde::Serialize;

/// Label of the synthetic bucket holding the sum of all counts
pub const TOTAL_LABEL: &str = "Total";

/// Counts of absolute residuals per bucket, plus their total
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistogramRow {
    pub counts: Vec<u64>,
    pub total: u64,
}

impl HistogramRow {
    /// All-zero row for `buckets` buckets
    pub fn empty(buckets: usize) -> Self {
        Self {
            counts: vec![0; buckets],
            total: 0,
        }
    }
}

impl ResidualCutoffs {
    /// Count `abs_residuals` into the half-open buckets
    ///
    /// A residual of exactly 0 lands in the first bucket; NaN is skipped.
    /// `total` is the sum of the bucket counts.
    pub fn histogram<I>(&self, abs_residuals: I) -> HistogramRow
    where
        I: IntoIterator<Item = f64>,
    {
        let mut counts = vec![0u64; self.len()];
        for residual in abs_residuals {
            if let Some(bucket) = self.assign(residual) {
                counts[bucket] += 1;
            }
        }
        let total = counts.iter().sum();
        HistogramRow { counts, total }
    }

    /// Bucket column labels followed by `Total`
    pub fn column_labels(&self) -> Vec<String> {
        self.labels()
            .into_iter()
            .map(|l| l.label)
            .chain(std::iter::once(TOTAL_LABEL.to_string()))
            .collect()
    }
}
