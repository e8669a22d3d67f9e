// src/core/dsp/wavelet.rs
//
// Orthonormal Haar wavelet decomposition in one and two dimensions.

use serde::{Deserialize, Serialize};
use std::f64::consts::SQRT_2;

use super::matrix::Matrix;
use crate::error::{FindSimilarError, Result};

/// Layout of the 2-D decomposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HaarVariant {
    /// Full 1-D decomposition of every row, then of every column (separable FWT)
    Tensor,
    /// One row step and one column step per level on a shrinking corner (JPEG2000 style)
    #[default]
    Interleaved,
}

/// One averaging/differencing step over the first `len` entries
pub fn haar_step(data: &mut [f64], len: usize) {
    let half = len / 2;
    let mut tmp = vec![0.0; len];
    for i in 0..half {
        let (a, b) = (data[2 * i], data[2 * i + 1]);
        tmp[i] = (a + b) / SQRT_2;
        tmp[half + i] = (a - b) / SQRT_2;
    }
    data[..len].copy_from_slice(&tmp);
}

/// Inverse of [`haar_step`]
pub fn haar_inverse_step(data: &mut [f64], len: usize) {
    let half = len / 2;
    let mut tmp = vec![0.0; len];
    for i in 0..half {
        let (s, d) = (data[i], data[half + i]);
        tmp[2 * i] = (s + d) / SQRT_2;
        tmp[2 * i + 1] = (s - d) / SQRT_2;
    }
    data[..len].copy_from_slice(&tmp);
}

/// Full multi-level decomposition; `data.len()` must be a power of two
pub fn haar_1d(data: &mut [f64]) {
    let mut len = data.len();
    while len > 1 {
        haar_step(data, len);
        len /= 2;
    }
}

/// Inverse of [`haar_1d`]
pub fn haar_1d_inverse(data: &mut [f64]) {
    let mut len = 2;
    while len <= data.len() {
        haar_inverse_step(data, len);
        len *= 2;
    }
}

fn check_dimensions(m: &Matrix) -> Result<()> {
    if !m.rows().is_power_of_two() || !m.cols().is_power_of_two() {
        return Err(FindSimilarError::InvalidMatrix(format!(
            "haar decomposition needs power-of-two sides, got {}x{}",
            m.rows(),
            m.cols()
        )));
    }
    Ok(())
}

fn column_op(m: &mut Matrix, col: usize, len: usize, op: fn(&mut [f64], usize)) {
    let mut column: Vec<f64> = (0..len).map(|r| m[(r, col)]).collect();
    op(&mut column, len);
    for (r, v) in column.into_iter().enumerate() {
        m[(r, col)] = v;
    }
}

impl HaarVariant {
    /// Decompose `m` in place
    pub fn decompose(self, m: &mut Matrix) -> Result<()> {
        check_dimensions(m)?;
        match self {
            HaarVariant::Tensor => {
                for r in 0..m.rows() {
                    haar_1d(m.row_mut(r));
                }
                for c in 0..m.cols() {
                    let mut column = m.column(c);
                    haar_1d(&mut column);
                    m.set_column(c, &column);
                }
            }
            HaarVariant::Interleaved => {
                let (mut w, mut h) = (m.cols(), m.rows());
                while w > 1 || h > 1 {
                    if w > 1 {
                        for r in 0..h {
                            haar_step(m.row_mut(r), w);
                        }
                    }
                    if h > 1 {
                        for c in 0..w {
                            column_op(m, c, h, haar_step);
                        }
                    }
                    w = (w / 2).max(1);
                    h = (h / 2).max(1);
                }
            }
        }
        Ok(())
    }

    /// Undo [`HaarVariant::decompose`] in place
    pub fn reconstruct(self, m: &mut Matrix) -> Result<()> {
        check_dimensions(m)?;
        match self {
            HaarVariant::Tensor => {
                for c in 0..m.cols() {
                    let mut column = m.column(c);
                    haar_1d_inverse(&mut column);
                    m.set_column(c, &column);
                }
                for r in 0..m.rows() {
                    haar_1d_inverse(m.row_mut(r));
                }
            }
            HaarVariant::Interleaved => {
                let mut levels = Vec::new();
                let (mut w, mut h) = (m.cols(), m.rows());
                while w > 1 || h > 1 {
                    levels.push((w, h));
                    w = (w / 2).max(1);
                    h = (h / 2).max(1);
                }
                for &(w, h) in levels.iter().rev() {
                    if h > 1 {
                        for c in 0..w {
                            column_op(m, c, h, haar_inverse_step);
                        }
                    }
                    if w > 1 {
                        for r in 0..h {
                            haar_inverse_step(m.row_mut(r), w);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
