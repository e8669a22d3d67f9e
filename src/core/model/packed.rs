// src/core/model/packed.rs
//
// Symmetric matrices stored as their upper triangle.

use serde::{Deserialize, Serialize};

use crate::core::dsp::Matrix;
use crate::error::{FindSimilarError, Result};

/// Upper triangle of a symmetric `dim x dim` matrix, row by row.
///
/// Off-diagonal entries are stored doubled. With that layout a full trace
/// product or quadratic form is a single pass over the packed slice, so
/// the distance never has to mirror the lower triangle. [`get`] and
/// [`set`] hide the doubling.
///
/// [`get`]: PackedSymmetricMatrix::get
/// [`set`]: PackedSymmetricMatrix::set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackedSymmetricMatrix {
    dim: usize,
    data: Vec<f32>,
}

/// Number of packed entries for dimension `dim`
pub fn packed_len(dim: usize) -> usize {
    (dim * dim + dim) / 2
}

impl PackedSymmetricMatrix {
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            data: vec![0.0; packed_len(dim)],
        }
    }

    /// Pack a full matrix; only the upper triangle is read
    pub fn from_matrix(m: &Matrix) -> Result<Self> {
        if m.rows() != m.cols() {
            return Err(FindSimilarError::InvalidMatrix(format!(
                "cannot pack non-square {}x{} matrix",
                m.rows(),
                m.cols()
            )));
        }
        let mut packed = Self::zeros(m.rows());
        for i in 0..m.rows() {
            for j in i..m.cols() {
                packed.set(i, j, m[(i, j)]);
            }
        }
        Ok(packed)
    }

    /// Wrap already-packed (doubled) data
    pub fn from_raw(dim: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != packed_len(dim) {
            return Err(FindSimilarError::InvalidMatrix(format!(
                "packed matrix of dimension {} needs {} values, got {}",
                dim,
                packed_len(dim),
                data.len()
            )));
        }
        Ok(Self { dim, data })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Packed values, off-diagonals doubled
    pub fn raw(&self) -> &[f32] {
        &self.data
    }

    fn index(&self, i: usize, j: usize) -> usize {
        let (i, j) = if i <= j { (i, j) } else { (j, i) };
        assert!(j < self.dim, "index ({}, {}) out of bounds for dimension {}", i, j, self.dim);
        i * self.dim - i * i.saturating_sub(1) / 2 + (j - i)
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        let v = self.data[self.index(i, j)] as f64;
        if i == j {
            v
        } else {
            v / 2.0
        }
    }

    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        let idx = self.index(i, j);
        self.data[idx] = if i == j { value as f32 } else { (2.0 * value) as f32 };
    }

    /// Expand back to a full symmetric matrix
    pub fn to_matrix(&self) -> Matrix {
        let mut m = Matrix::new(self.dim, self.dim);
        for i in 0..self.dim {
            for j in i..self.dim {
                let v = self.get(i, j);
                m[(i, j)] = v;
                m[(j, i)] = v;
            }
        }
        m
    }

    /// Element-wise sum; both operands must share a dimension
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.check_dim(other)?;
        Ok(Self {
            dim: self.dim,
            data: self.data.iter().zip(&other.data).map(|(a, b)| a + b).collect(),
        })
    }

    /// `tr(A * B)` of the two full symmetric matrices
    pub fn trace_product(&self, other: &Self) -> Result<f64> {
        self.check_dim(other)?;
        let mut sum = 0.0;
        let mut l = 0;
        for i in 0..self.dim {
            sum += self.data[l] as f64 * other.data[l] as f64;
            l += 1;
            for _ in i + 1..self.dim {
                sum += self.data[l] as f64 * other.data[l] as f64 / 2.0;
                l += 1;
            }
        }
        Ok(sum)
    }

    /// `x^T A x`
    pub fn quadratic_form(&self, x: &[f64]) -> Result<f64> {
        if x.len() != self.dim {
            return Err(FindSimilarError::DimensionMismatch {
                expected: self.dim,
                found: x.len(),
            });
        }
        let mut sum = 0.0;
        let mut l = 0;
        for i in 0..self.dim {
            for j in i..self.dim {
                sum += self.data[l] as f64 * x[i] * x[j];
                l += 1;
            }
        }
        Ok(sum)
    }

    fn check_dim(&self, other: &Self) -> Result<()> {
        if self.dim != other.dim {
            return Err(FindSimilarError::DimensionMismatch {
                expected: self.dim,
                found: other.dim,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Matrix {
        Matrix::from_rows(&[[4.0, 1.0, 0.5], [1.0, 3.0, -2.0], [0.5, -2.0, 5.0]]).unwrap()
    }

    #[test]
    fn test_layout_doubles_off_diagonal() {
        let packed = PackedSymmetricMatrix::from_matrix(&sample()).unwrap();
        assert_eq!(packed.raw(), &[4.0, 2.0, 1.0, 3.0, -4.0, 5.0]);
        assert_eq!(packed.get(2, 1), -2.0);
        assert_eq!(packed.get(1, 2), -2.0);
        assert_eq!(packed.to_matrix(), sample());
    }

    #[test]
    fn test_trace_product() {
        let a = sample();
        let b = Matrix::from_rows(&[[1.0, 2.0, 0.0], [2.0, -1.0, 1.0], [0.0, 1.0, 2.0]]).unwrap();
        let expected: f64 = (0..3).map(|i| a.multiply(&b).unwrap()[(i, i)]).sum();

        let pa = PackedSymmetricMatrix::from_matrix(&a).unwrap();
        let pb = PackedSymmetricMatrix::from_matrix(&b).unwrap();
        assert!((pa.trace_product(&pb).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_quadratic_form() {
        let m = sample();
        let x = [1.0, -2.0, 0.5];
        let mut expected = 0.0;
        for i in 0..3 {
            for j in 0..3 {
                expected += x[i] * m[(i, j)] * x[j];
            }
        }
        let packed = PackedSymmetricMatrix::from_matrix(&m).unwrap();
        assert!((packed.quadratic_form(&x).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_dimension_checks() {
        let a = PackedSymmetricMatrix::zeros(3);
        let b = PackedSymmetricMatrix::zeros(2);
        assert!(a.add(&b).is_err());
        assert!(a.trace_product(&b).is_err());
        assert!(a.quadratic_form(&[1.0]).is_err());
        assert!(PackedSymmetricMatrix::from_raw(3, vec![0.0; 5]).is_err());
    }
}
