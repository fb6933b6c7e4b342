//! Rank-weighted smoothing kernel.
//!
//! Each value in a window is weighted by the Beta density of its percentile
//! rank. With `alpha = N * ratio` and `beta = N * (1 - ratio)` the density
//! grows with rank, so the smoothed value tracks the ceiling of the window
//! rather than its mean.

use statrs::distribution::{Beta, Continuous};

use crate::config::ParamsError;

/// Pseudo-count of the Beta kernel.
pub const SMOOTHER_N: f64 = 3.0;
/// Where the kernel puts its mass along the percentile axis.
pub const SMOOTHER_RATIO: f64 = 0.9;

#[derive(Debug, Clone)]
pub struct RankWeightedSmoother {
    kernel: Beta,
}

impl RankWeightedSmoother {
    pub fn new() -> Result<Self, ParamsError> {
        let alpha = SMOOTHER_N * SMOOTHER_RATIO;
        let beta = SMOOTHER_N * (1.0 - SMOOTHER_RATIO);
        let kernel = Beta::new(alpha + 1.0, beta + 1.0).map_err(|e| ParamsError::Kernel(e.to_string()))?;
        Ok(RankWeightedSmoother { kernel })
    }

    /// Weighted mean of `window` using rank-derived Beta weights.
    ///
    /// Returns `None` for an empty window or when every weight vanishes
    /// (a single-value window sits at percentile 1, where the density is 0).
    pub fn smooth(&self, window: &[f64]) -> Option<f64> {
        if window.is_empty() {
            return None;
        }

        let weights: Vec<f64> = percent_rank(window).into_iter().map(|p| self.kernel.pdf(p)).collect();
        let total: f64 = weights.iter().sum();
        if !(total.is_finite() && total > 0.0) {
            return None;
        }

        Some(window.iter().zip(&weights).map(|(value, w)| value * (w / total)).sum())
    }
}

/// Percentile rank of each value, `rank / n`, with ties sharing their average rank.
pub fn percent_rank(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start;
        while end + 1 < n && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        // 1-based ranks start+1 ..= end+1
        let average = (start + end + 2) as f64 / 2.0;
        for &idx in &order[start..=end] {
            ranks[idx] = average / n as f64;
        }
        start = end + 1;
    }
    ranks
}
