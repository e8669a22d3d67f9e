//! Two-dimensional DCT-II / DCT-III with interchangeable implementations
//!
//! Every variant uses the orthonormal scaling: coefficient 0 of a dimension of
//! length `n` is scaled by `sqrt(1/n)`, the others by `sqrt(2/n)`, so the
//! inverse is the exact transpose of the forward transform.
//!
//! | Variant     | Cost per block        | Notes                                  |
//! |-------------|-----------------------|----------------------------------------|
//! | `Direct`    | O(M²N²)               | textbook double sum, reference only    |
//! | `Separable` | O(MN(M+N))            | 1-D transform over rows then columns   |
//! | `Matrix`    | O(MN(M+N))            | precomputed orthogonal matrices        |
//! | `Fft`       | O(MN log MN)          | rustfft-backed, Makhoul reordering     |

use std::f64::consts::PI;

use num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};

use super::matrix::Matrix;
use crate::error::{FindSimilarError, Result};

/// Forward/inverse 2-D DCT capability
pub trait DctTransform: Send + Sync {
    fn name(&self) -> &'static str;

    /// DCT-II of the whole block
    fn forward(&self, input: &Matrix) -> Result<Matrix>;

    /// DCT-III of the whole block, undoing [`DctTransform::forward`]
    fn inverse(&self, input: &Matrix) -> Result<Matrix>;

    /// 1-D DCT-II applied down every column independently
    fn forward_columns(&self, input: &Matrix) -> Result<Matrix> {
        let mut out = Matrix::new(input.rows(), input.cols());
        for c in 0..input.cols() {
            let column = Matrix::from_vec(input.rows(), 1, input.column(c))?;
            out.set_column(c, self.forward(&column)?.as_slice());
        }
        Ok(out)
    }
}

/// Selects a [`DctTransform`] implementation at construction time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DctVariant {
    Direct,
    Separable,
    #[default]
    Matrix,
    Fft,
}

impl DctVariant {
    /// Build a transform for `rows x cols` blocks
    pub fn build(self, rows: usize, cols: usize) -> Box<dyn DctTransform> {
        match self {
            DctVariant::Direct => Box::new(DirectDct),
            DctVariant::Separable => Box::new(SeparableDct),
            DctVariant::Matrix => Box::new(MatrixDct::new(rows, cols)),
            DctVariant::Fft => Box::new(FftDct),
        }
    }
}

fn alpha(k: usize, n: usize) -> f64 {
    if k == 0 {
        (1.0 / n as f64).sqrt()
    } else {
        (2.0 / n as f64).sqrt()
    }
}

fn basis(k: usize, x: usize, n: usize) -> f64 {
    ((2 * x + 1) as f64 * k as f64 * PI / (2 * n) as f64).cos()
}

fn ensure_non_empty(input: &Matrix) -> Result<()> {
    if input.is_empty() {
        return Err(FindSimilarError::InvalidMatrix("empty DCT block".into()));
    }
    Ok(())
}

/// Orthonormal 1-D DCT-II
pub fn dct_1d(input: &[f64]) -> Vec<f64> {
    let n = input.len();
    (0..n)
        .map(|k| alpha(k, n) * input.iter().enumerate().map(|(x, &v)| v * basis(k, x, n)).sum::<f64>())
        .collect()
}

/// Orthonormal 1-D DCT-III, the inverse of [`dct_1d`]
pub fn idct_1d(input: &[f64]) -> Vec<f64> {
    let n = input.len();
    (0..n)
        .map(|x| {
            input
                .iter()
                .enumerate()
                .map(|(k, &v)| alpha(k, n) * v * basis(k, x, n))
                .sum::<f64>()
        })
        .collect()
}

/// Textbook four-fold sum
pub struct DirectDct;

impl DctTransform for DirectDct {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn forward(&self, input: &Matrix) -> Result<Matrix> {
        ensure_non_empty(input)?;
        let (m, n) = (input.rows(), input.cols());
        let mut out = Matrix::new(m, n);
        for u in 0..m {
            for v in 0..n {
                let mut sum = 0.0;
                for x in 0..m {
                    for y in 0..n {
                        sum += input[(x, y)] * basis(u, x, m) * basis(v, y, n);
                    }
                }
                out[(u, v)] = alpha(u, m) * alpha(v, n) * sum;
            }
        }
        Ok(out)
    }

    fn inverse(&self, input: &Matrix) -> Result<Matrix> {
        ensure_non_empty(input)?;
        let (m, n) = (input.rows(), input.cols());
        let mut out = Matrix::new(m, n);
        for x in 0..m {
            for y in 0..n {
                let mut sum = 0.0;
                for u in 0..m {
                    for v in 0..n {
                        sum += alpha(u, m) * alpha(v, n) * input[(u, v)] * basis(u, x, m) * basis(v, y, n);
                    }
                }
                out[(x, y)] = sum;
            }
        }
        Ok(out)
    }
}

/// Row pass followed by a column pass of the 1-D transform
pub struct SeparableDct;

impl SeparableDct {
    fn apply(input: &Matrix, f: fn(&[f64]) -> Vec<f64>) -> Result<Matrix> {
        ensure_non_empty(input)?;
        let mut out = input.clone();
        for r in 0..out.rows() {
            let row = f(out.row(r));
            out.row_mut(r).copy_from_slice(&row);
        }
        for c in 0..out.cols() {
            let column = f(&out.column(c));
            out.set_column(c, &column);
        }
        Ok(out)
    }
}

impl DctTransform for SeparableDct {
    fn name(&self) -> &'static str {
        "separable"
    }

    fn forward(&self, input: &Matrix) -> Result<Matrix> {
        Self::apply(input, dct_1d)
    }

    fn inverse(&self, input: &Matrix) -> Result<Matrix> {
        Self::apply(input, idct_1d)
    }
}

/// Orthogonal DCT-II matrix `C` with `C[k][x] = alpha(k) cos((2x+1) k pi / 2n)`
#[derive(Debug, Clone)]
pub struct DctMatrix {
    coefficients: Matrix,
}

impl DctMatrix {
    pub fn new(n: usize) -> Self {
        let mut coefficients = Matrix::new(n, n);
        for k in 0..n {
            for x in 0..n {
                coefficients[(k, x)] = alpha(k, n) * basis(k, x, n);
            }
        }
        Self { coefficients }
    }

    pub fn size(&self) -> usize {
        self.coefficients.rows()
    }

    pub fn as_matrix(&self) -> &Matrix {
        &self.coefficients
    }
}

/// `C_r * X * C_c^T` with both matrices precomputed; the hot-path variant
pub struct MatrixDct {
    rows: DctMatrix,
    rows_t: Matrix,
    cols: DctMatrix,
    cols_t: Matrix,
}

impl MatrixDct {
    pub fn new(rows: usize, cols: usize) -> Self {
        let row_matrix = DctMatrix::new(rows);
        let col_matrix = DctMatrix::new(cols);
        Self {
            rows_t: row_matrix.as_matrix().transpose(),
            cols_t: col_matrix.as_matrix().transpose(),
            rows: row_matrix,
            cols: col_matrix,
        }
    }

    fn check(&self, input: &Matrix) -> Result<()> {
        if input.rows() != self.rows.size() {
            return Err(FindSimilarError::DimensionMismatch {
                expected: self.rows.size(),
                found: input.rows(),
            });
        }
        if input.cols() != self.cols.size() {
            return Err(FindSimilarError::DimensionMismatch {
                expected: self.cols.size(),
                found: input.cols(),
            });
        }
        Ok(())
    }
}

impl DctTransform for MatrixDct {
    fn name(&self) -> &'static str {
        "matrix"
    }

    fn forward(&self, input: &Matrix) -> Result<Matrix> {
        self.check(input)?;
        self.rows.as_matrix().multiply(input)?.multiply(&self.cols_t)
    }

    fn inverse(&self, input: &Matrix) -> Result<Matrix> {
        self.check(input)?;
        self.rows_t.multiply(input)?.multiply(self.cols.as_matrix())
    }

    /// One product `C_r * X`; only the row count has to match
    fn forward_columns(&self, input: &Matrix) -> Result<Matrix> {
        if input.rows() != self.rows.size() {
            return Err(FindSimilarError::DimensionMismatch {
                expected: self.rows.size(),
                found: input.rows(),
            });
        }
        self.rows.as_matrix().multiply(input)
    }
}

/// DCT computed through a complex FFT of the even/odd reordered sequence
pub struct FftDct;

impl FftDct {
    fn forward_1d(planner: &mut FftPlanner<f64>, input: &[f64]) -> Vec<f64> {
        let n = input.len();
        let mut buffer: Vec<Complex<f64>> = vec![Complex::new(0.0, 0.0); n];
        for i in 0..(n + 1) / 2 {
            buffer[i] = Complex::new(input[2 * i], 0.0);
        }
        for i in 0..n / 2 {
            buffer[n - 1 - i] = Complex::new(input[2 * i + 1], 0.0);
        }
        planner.plan_fft_forward(n).process(&mut buffer);

        (0..n)
            .map(|k| {
                let twiddle = Complex::from_polar(1.0, -PI * k as f64 / (2 * n) as f64);
                alpha(k, n) * (buffer[k] * twiddle).re
            })
            .collect()
    }

    fn inverse_1d(planner: &mut FftPlanner<f64>, input: &[f64]) -> Vec<f64> {
        let n = input.len();
        // Undo the orthonormal scaling, then rebuild the reordered sequence's spectrum
        let unscaled: Vec<f64> = input.iter().enumerate().map(|(k, &v)| v / alpha(k, n)).collect();
        let mut buffer: Vec<Complex<f64>> = (0..n)
            .map(|k| {
                let mirror = if k == 0 { 0.0 } else { unscaled[n - k] };
                let twiddle = Complex::from_polar(1.0, PI * k as f64 / (2 * n) as f64);
                twiddle * Complex::new(unscaled[k], -mirror)
            })
            .collect();
        planner.plan_fft_inverse(n).process(&mut buffer);

        let mut out = vec![0.0; n];
        for i in 0..(n + 1) / 2 {
            out[2 * i] = buffer[i].re / n as f64;
        }
        for i in 0..n / 2 {
            out[2 * i + 1] = buffer[n - 1 - i].re / n as f64;
        }
        out
    }

    fn apply(input: &Matrix, f: fn(&mut FftPlanner<f64>, &[f64]) -> Vec<f64>) -> Result<Matrix> {
        ensure_non_empty(input)?;
        let mut planner = FftPlanner::new();
        let mut out = input.clone();
        for r in 0..out.rows() {
            let row = f(&mut planner, out.row(r));
            out.row_mut(r).copy_from_slice(&row);
        }
        for c in 0..out.cols() {
            let column = f(&mut planner, &out.column(c));
            out.set_column(c, &column);
        }
        Ok(out)
    }
}

impl DctTransform for FftDct {
    fn name(&self) -> &'static str {
        "fft"
    }

    fn forward(&self, input: &Matrix) -> Result<Matrix> {
        Self::apply(input, Self::forward_1d)
    }

    fn inverse(&self, input: &Matrix) -> Result<Matrix> {
        Self::apply(input, Self::inverse_1d)
    }
}
