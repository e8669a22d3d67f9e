// src/core/model/mandel_ellis.rs
//
// Full-covariance Gaussian with the Mandel/Ellis KL divergence.

use log::trace;

use crate::core::dsp::Matrix;
use crate::error::{FindSimilarError, Result};

/// Mean and full covariance of a feature matrix.
///
/// Only the mean and covariance are stored; the inverse is rebuilt on load.
#[derive(Debug, Clone, PartialEq)]
pub struct MandelEllisModel {
    mean: Vec<f32>,
    covariance: Matrix,
    inverse_covariance: Matrix,
}

impl MandelEllisModel {
    /// Fit a model to a `dimension x frames` feature matrix
    pub fn fit(features: &Matrix) -> Result<Self> {
        if features.rows() == 0 || features.cols() == 0 {
            return Err(FindSimilarError::InvalidMatrix("feature matrix is empty".into()));
        }
        if !features.is_finite() {
            return Err(FindSimilarError::InvalidMatrix(
                "feature matrix contains non-finite values".into(),
            ));
        }

        let mean = features.row_means();
        let covariance = features.row_covariance(&mean)?.map(|v| v as f32 as f64);
        trace!(
            "mandel-ellis fit: {} dims over {} frames",
            features.rows(),
            features.cols()
        );
        Self::from_parts(mean.iter().map(|&m| m as f32).collect(), covariance)
    }

    pub fn from_parts(mean: Vec<f32>, covariance: Matrix) -> Result<Self> {
        let dim = mean.len();
        if covariance.rows() != dim || covariance.cols() != dim {
            return Err(FindSimilarError::DimensionMismatch {
                expected: dim,
                found: covariance.rows(),
            });
        }
        let inverse_covariance = covariance.inverse()?;
        Ok(Self {
            mean,
            covariance,
            inverse_covariance,
        })
    }

    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f32] {
        &self.mean
    }

    pub fn covariance(&self) -> &Matrix {
        &self.covariance
    }

    /// One-sided divergence from `self` to `other`.
    ///
    /// `0.5 * (tr(I2 C1 + I1 C2) - 2d + (m1 - m2)^T (I1 + I2) (m1 - m2))`
    pub fn kullback_leibler(&self, other: &MandelEllisModel) -> Result<f64> {
        let dim = self.dimension();
        if dim != other.dimension() {
            return Err(FindSimilarError::DimensionMismatch {
                expected: dim,
                found: other.dimension(),
            });
        }

        let trace = trace_of_product(&other.inverse_covariance, &self.covariance)
            + trace_of_product(&self.inverse_covariance, &other.covariance);
        let diff: Vec<f64> = self
            .mean
            .iter()
            .zip(&other.mean)
            .map(|(a, b)| *a as f64 - *b as f64)
            .collect();
        let mut quadratic = 0.0;
        for i in 0..dim {
            for j in 0..dim {
                let inv = self.inverse_covariance[(i, j)] + other.inverse_covariance[(i, j)];
                quadratic += diff[i] * inv * diff[j];
            }
        }

        Ok(0.5 * (trace - 2.0 * dim as f64 + quadratic))
    }

    /// `KL(a, b) + KL(b, a)`; zero for identical models
    pub fn distance(&self, other: &MandelEllisModel) -> Result<f64> {
        Ok(self.kullback_leibler(other)? + other.kullback_leibler(self)?)
    }

    /// Little-endian layout: `i32` dimension, mean, full row-major covariance
    pub fn to_bytes(&self) -> Vec<u8> {
        let dim = self.dimension();
        let mut out = Vec::with_capacity(Self::encoded_len(dim));
        out.extend_from_slice(&(dim as i32).to_le_bytes());
        for &m in &self.mean {
            out.extend_from_slice(&m.to_le_bytes());
        }
        for &c in self.covariance.as_slice() {
            out.extend_from_slice(&(c as f32).to_le_bytes());
        }
        out
    }

    /// Decode [`MandelEllisModel::to_bytes`] output and rebuild the inverse
    pub fn from_bytes(bytes: &[u8], expected_dimension: Option<usize>) -> Result<Self> {
        let header: [u8; 4] = bytes
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| FindSimilarError::InvalidMatrix("model blob shorter than its header".into()))?;
        let dim = i32::from_le_bytes(header);
        if dim <= 0 {
            return Err(FindSimilarError::InvalidMatrix(format!("model dimension {} is not positive", dim)));
        }
        let dim = dim as usize;
        if let Some(expected) = expected_dimension {
            if expected != dim {
                return Err(FindSimilarError::DimensionMismatch { expected, found: dim });
            }
        }
        if bytes.len() != Self::encoded_len(dim) {
            return Err(FindSimilarError::InvalidMatrix(format!(
                "model blob of dimension {} must be {} bytes, got {}",
                dim,
                Self::encoded_len(dim),
                bytes.len()
            )));
        }

        let mut values = bytes[4..]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]));
        let mean: Vec<f32> = values.by_ref().take(dim).collect();
        let covariance = Matrix::from_vec(dim, dim, values.map(f64::from).collect())?;
        Self::from_parts(mean, covariance)
    }

    fn encoded_len(dim: usize) -> usize {
        4 * (1 + dim + dim * dim)
    }
}

/// `tr(A B)` without forming the product
fn trace_of_product(a: &Matrix, b: &Matrix) -> f64 {
    let n = a.rows();
    let mut total = 0.0;
    for i in 0..n {
        for k in 0..n {
            total += a[(i, k)] * b[(k, i)];
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::ScmsModel;

    fn features(dim: usize, frames: usize, seed: u64) -> Matrix {
        let mut state = seed.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5
        };
        let mut m = Matrix::new(dim, frames);
        for c in 0..frames {
            let shared = next();
            for r in 0..dim {
                m[(r, c)] = next() + 0.4 * shared + r as f64 * 0.2;
            }
        }
        m
    }

    #[test]
    fn test_self_distance_is_zero() {
        let model = MandelEllisModel::fit(&features(6, 250, 1)).unwrap();
        assert!(model.distance(&model).unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_distance_is_symmetric_and_positive() {
        let a = MandelEllisModel::fit(&features(6, 250, 1)).unwrap();
        let b = MandelEllisModel::fit(&features(6, 180, 2)).unwrap();
        let ab = a.distance(&b).unwrap();
        assert!(ab > 0.0);
        assert!((ab - b.distance(&a).unwrap()).abs() < 1e-9 * ab.max(1.0));
    }

    #[test]
    fn test_divergence_sum_is_four_times_scms_distance() {
        let fa = features(5, 300, 3);
        let fb = features(5, 300, 4).map(|v| v + 0.25);
        let me = MandelEllisModel::fit(&fa).unwrap().distance(&MandelEllisModel::fit(&fb).unwrap()).unwrap();
        let scms = ScmsModel::fit(&fa).unwrap().distance(&ScmsModel::fit(&fb).unwrap()).unwrap();
        assert!((me - 4.0 * scms).abs() < 1e-3 * me.abs().max(1.0), "{} vs {}", me, scms);
    }

    #[test]
    fn test_bytes_round_trip_rebuilds_inverse() {
        let model = MandelEllisModel::fit(&features(4, 100, 7)).unwrap();
        let bytes = model.to_bytes();
        assert_eq!(bytes.len(), 4 * (1 + 4 + 16));
        assert_eq!(&bytes[..4], &4i32.to_le_bytes());
        assert_eq!(MandelEllisModel::from_bytes(&bytes, Some(4)).unwrap(), model);
        assert!(matches!(
            MandelEllisModel::from_bytes(&bytes, Some(20)),
            Err(FindSimilarError::DimensionMismatch { expected: 20, found: 4 })
        ));
        assert!(MandelEllisModel::from_bytes(&bytes[..bytes.len() - 4], None).is_err());
    }

    #[test]
    fn test_empty_and_singular_input_rejected() {
        assert!(matches!(
            MandelEllisModel::fit(&Matrix::new(3, 0)),
            Err(FindSimilarError::InvalidMatrix(_))
        ));
        let mut m = features(3, 50, 5);
        for c in 0..50 {
            m[(2, c)] = m[(0, c)];
        }
        assert!(matches!(
            MandelEllisModel::fit(&m),
            Err(FindSimilarError::SingularCovariance { .. })
        ));
    }
}
