// src/core/model/track.rs
//
// Per-track model tagged with the analysis method that produced it.

use super::mandel_ellis::MandelEllisModel;
use super::scms::ScmsModel;
use crate::config::AnalysisMethod;
use crate::core::dsp::Matrix;
use crate::error::{FindSimilarError, Result};

/// A model that can be ranked by [`nearest_neighbors`](super::nearest_neighbors)
pub trait SimilarityModel: Sync {
    fn distance(&self, other: &Self) -> Result<f64>;
}

impl SimilarityModel for ScmsModel {
    fn distance(&self, other: &Self) -> Result<f64> {
        ScmsModel::distance(self, other)
    }
}

impl SimilarityModel for MandelEllisModel {
    fn distance(&self, other: &Self) -> Result<f64> {
        MandelEllisModel::distance(self, other)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackModel {
    Scms(ScmsModel),
    MandelEllis(MandelEllisModel),
}

impl TrackModel {
    pub fn fit(method: AnalysisMethod, features: &Matrix) -> Result<Self> {
        Ok(match method {
            AnalysisMethod::Scms => Self::Scms(ScmsModel::fit(features)?),
            AnalysisMethod::MandelEllis => Self::MandelEllis(MandelEllisModel::fit(features)?),
        })
    }

    pub fn method(&self) -> AnalysisMethod {
        match self {
            Self::Scms(_) => AnalysisMethod::Scms,
            Self::MandelEllis(_) => AnalysisMethod::MandelEllis,
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            Self::Scms(m) => m.dimension(),
            Self::MandelEllis(m) => m.dimension(),
        }
    }

    /// Models built by different methods are not comparable
    pub fn distance(&self, other: &TrackModel) -> Result<f64> {
        match (self, other) {
            (Self::Scms(a), Self::Scms(b)) => a.distance(b),
            (Self::MandelEllis(a), Self::MandelEllis(b)) => a.distance(b),
            _ => Err(FindSimilarError::InvalidConfig(format!(
                "cannot compare a {} model with a {} model",
                self.method().name(),
                other.method().name()
            ))),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Scms(m) => m.to_bytes(),
            Self::MandelEllis(m) => m.to_bytes(),
        }
    }

    /// Decode a blob written by [`TrackModel::to_bytes`] for `method`
    pub fn from_bytes(method: AnalysisMethod, bytes: &[u8], expected_dimension: Option<usize>) -> Result<Self> {
        Ok(match method {
            AnalysisMethod::Scms => Self::Scms(ScmsModel::from_bytes(bytes, expected_dimension)?),
            AnalysisMethod::MandelEllis => {
                Self::MandelEllis(MandelEllisModel::from_bytes(bytes, expected_dimension)?)
            }
        })
    }
}

impl SimilarityModel for TrackModel {
    fn distance(&self, other: &Self) -> Result<f64> {
        TrackModel::distance(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(shift: f64) -> Matrix {
        let mut m = Matrix::new(3, 60);
        for c in 0..60 {
            let t = c as f64;
            m[(0, c)] = (t * 0.37).sin() + shift;
            m[(1, c)] = (t * 1.1).cos() * 0.6 + 0.3 * (t * 0.37).sin();
            m[(2, c)] = (t * 2.3).sin() * 0.4 - shift;
        }
        m
    }

    #[test]
    fn test_fit_follows_method() {
        for method in [AnalysisMethod::Scms, AnalysisMethod::MandelEllis] {
            let model = TrackModel::fit(method, &features(0.0)).unwrap();
            assert_eq!(model.method(), method);
            assert_eq!(model.dimension(), 3);
            let decoded = TrackModel::from_bytes(method, &model.to_bytes(), Some(3)).unwrap();
            assert_eq!(decoded, model);
        }
    }

    #[test]
    fn test_mixed_methods_do_not_compare() {
        let a = TrackModel::fit(AnalysisMethod::Scms, &features(0.0)).unwrap();
        let b = TrackModel::fit(AnalysisMethod::MandelEllis, &features(0.0)).unwrap();
        assert!(a.distance(&b).is_err());
        assert!(a.distance(&a).unwrap().abs() < 1e-3);
    }

    #[test]
    fn test_blob_decodes_only_as_its_own_method() {
        let scms = TrackModel::fit(AnalysisMethod::Scms, &features(0.2)).unwrap();
        // Two packed triangles and one full 3x3 matrix differ in length
        assert!(TrackModel::from_bytes(AnalysisMethod::MandelEllis, &scms.to_bytes(), Some(3)).is_err());
    }
}
