// src/core/model/scms.rs
//
// Single Gaussian model of a track's feature frames and the symmetrised
// Kullback-Leibler distance between two such models.

use log::trace;
use serde::{Deserialize, Serialize};

use super::packed::{packed_len, PackedSymmetricMatrix};
use crate::core::dsp::Matrix;
use crate::error::{FindSimilarError, Result};

/// Mean, covariance and inverse covariance of a feature matrix.
///
/// Fitting runs in `f64`; the stored model keeps `f32` values, which is
/// what the binary layout carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScmsModel {
    mean: Vec<f32>,
    covariance: PackedSymmetricMatrix,
    inverse_covariance: PackedSymmetricMatrix,
}

impl ScmsModel {
    /// Fit a model to a `dimension x frames` feature matrix
    pub fn fit(features: &Matrix) -> Result<Self> {
        if features.rows() == 0 {
            return Err(FindSimilarError::InvalidMatrix("feature matrix has no rows".into()));
        }
        if !features.is_finite() {
            return Err(FindSimilarError::InvalidMatrix(
                "feature matrix contains non-finite values".into(),
            ));
        }

        let mean = features.row_means();
        // Invert the covariance as it will be stored so the pair stays consistent
        let covariance = features.row_covariance(&mean)?.map(|v| v as f32 as f64);
        let inverse = covariance.inverse()?;
        trace!(
            "scms fit: {} dims over {} frames",
            features.rows(),
            features.cols()
        );

        Ok(Self {
            mean: mean.iter().map(|&m| m as f32).collect(),
            covariance: PackedSymmetricMatrix::from_matrix(&covariance)?,
            inverse_covariance: PackedSymmetricMatrix::from_matrix(&inverse)?,
        })
    }

    pub fn from_parts(
        mean: Vec<f32>,
        covariance: PackedSymmetricMatrix,
        inverse_covariance: PackedSymmetricMatrix,
    ) -> Result<Self> {
        let dim = mean.len();
        for found in [covariance.dim(), inverse_covariance.dim()] {
            if found != dim {
                return Err(FindSimilarError::DimensionMismatch { expected: dim, found });
            }
        }
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

    pub fn covariance(&self) -> &PackedSymmetricMatrix {
        &self.covariance
    }

    pub fn inverse_covariance(&self) -> &PackedSymmetricMatrix {
        &self.inverse_covariance
    }

    /// Symmetrised KL divergence approximation.
    ///
    /// `[tr(C1 I2) + tr(C2 I1) + (m1 - m2)^T (I1 + I2) (m1 - m2)] / 4 - d / 2`,
    /// zero for identical models. Rounding can make it slightly negative.
    pub fn distance(&self, other: &ScmsModel) -> Result<f64> {
        if self.dimension() != other.dimension() {
            return Err(FindSimilarError::DimensionMismatch {
                expected: self.dimension(),
                found: other.dimension(),
            });
        }

        let traces = self.covariance.trace_product(&other.inverse_covariance)?
            + other.covariance.trace_product(&self.inverse_covariance)?;
        let inverse_sum = self.inverse_covariance.add(&other.inverse_covariance)?;
        let diff: Vec<f64> = self
            .mean
            .iter()
            .zip(&other.mean)
            .map(|(a, b)| *a as f64 - *b as f64)
            .collect();
        let mahalanobis = inverse_sum.quadratic_form(&diff)?;

        Ok((traces + mahalanobis) / 4.0 - self.dimension() as f64 / 2.0)
    }

    /// Little-endian layout: `i32` dimension, mean, packed covariance, packed inverse
    pub fn to_bytes(&self) -> Vec<u8> {
        let dim = self.dimension();
        let mut out = Vec::with_capacity(Self::encoded_len(dim));
        out.extend_from_slice(&(dim as i32).to_le_bytes());
        for v in self
            .mean
            .iter()
            .chain(self.covariance.raw())
            .chain(self.inverse_covariance.raw())
        {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    /// Decode [`ScmsModel::to_bytes`] output.
    ///
    /// With `expected_dimension` set, a model of any other size is rejected
    /// rather than truncated or padded.
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
        let covariance: Vec<f32> = values.by_ref().take(packed_len(dim)).collect();
        let inverse: Vec<f32> = values.collect();

        Self::from_parts(
            mean,
            PackedSymmetricMatrix::from_raw(dim, covariance)?,
            PackedSymmetricMatrix::from_raw(dim, inverse)?,
        )
    }

    fn encoded_len(dim: usize) -> usize {
        4 * (1 + dim + 2 * packed_len(dim))
    }
}
