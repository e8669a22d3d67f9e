// src/core/dsp/threshold.rs
//
// Coefficient thresholding for wavelet and DCT output.

use serde::{Deserialize, Serialize};

use super::matrix::Matrix;

/// Zero every value with `|x| <= t`
pub fn hard(values: &mut [f64], t: f64) {
    for v in values.iter_mut() {
        if v.abs() <= t {
            *v = 0.0;
        }
    }
}

/// Shrink every value towards zero by `t`
pub fn soft(values: &mut [f64], t: f64) {
    for v in values.iter_mut() {
        let magnitude = v.abs() - t;
        *v = if magnitude > 0.0 { v.signum() * magnitude } else { 0.0 };
    }
}

/// Zero below `lower`, keep above `upper`, linear ramp in between.
///
/// Reversed bounds are swapped.
pub fn semisoft(values: &mut [f64], lower: f64, upper: f64) {
    let (lower, upper) = if lower > upper { (upper, lower) } else { (lower, upper) };
    for v in values.iter_mut() {
        let magnitude = v.abs();
        if magnitude < lower {
            *v = 0.0;
        } else if magnitude < upper {
            *v = v.signum() * upper / (upper - lower) * (magnitude - lower);
        }
    }
}

/// Keep the `keep` largest-magnitude values of every row, zero the rest
pub fn keep_top_per_row(m: &mut Matrix, keep: usize) {
    for r in 0..m.rows() {
        let row = m.row_mut(r);
        if keep >= row.len() {
            continue;
        }
        let mut order: Vec<usize> = (0..row.len()).collect();
        order.sort_by(|&a, &b| {
            row[b]
                .abs()
                .partial_cmp(&row[a].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        for &i in &order[keep..] {
            row[i] = 0.0;
        }
    }
}

/// Hard-threshold so that `percentage` (0-100) of the values become zero.
///
/// The threshold is found by bisection between 0 and the largest magnitude;
/// returns the threshold used.
pub fn throw_away(values: &mut [f64], percentage: f64) -> f64 {
    if values.is_empty() || percentage <= 0.0 {
        return 0.0;
    }
    let max = values.iter().map(|v| v.abs()).fold(0.0, f64::max);
    if percentage >= 100.0 {
        values.iter_mut().for_each(|v| *v = 0.0);
        return max;
    }

    let target = (values.len() as f64 * percentage / 100.0).round() as usize;
    let zeroed = |t: f64| values.iter().filter(|v| v.abs() <= t).count();

    let (mut low, mut high) = (0.0, max);
    for _ in 0..64 {
        let mid = 0.5 * (low + high);
        if zeroed(mid) < target {
            low = mid;
        } else {
            high = mid;
        }
    }
    hard(values, high);
    high
}

/// Thresholding strategy selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPolicy {
    Hard(f64),
    Soft(f64),
    Semisoft { lower: f64, upper: f64 },
    KeepTopPerRow(usize),
    ThrowAway(f64),
}

impl ThresholdPolicy {
    pub fn apply(&self, m: &mut Matrix) {
        match *self {
            ThresholdPolicy::Hard(t) => hard(m.as_mut_slice(), t),
            ThresholdPolicy::Soft(t) => soft(m.as_mut_slice(), t),
            ThresholdPolicy::Semisoft { lower, upper } => semisoft(m.as_mut_slice(), lower, upper),
            ThresholdPolicy::KeepTopPerRow(keep) => keep_top_per_row(m, keep),
            ThresholdPolicy::ThrowAway(percentage) => {
                throw_away(m.as_mut_slice(), percentage);
            }
        }
    }
}
