// src/core/fingerprint/stride.rs
//
// Spacing between consecutive spectral images.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{FindSimilarError, Result};

/// How far apart consecutive fingerprint images start, in samples.
///
/// `Static` and `Random` strides are gaps measured from the end of the
/// previous image. Incremental strides are measured from its start, so an
/// increment smaller than the image length produces overlapping images.
/// Random variants draw from `min..max` with a fixed seed, so the same
/// configuration always cuts the same images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StridePolicy {
    Static { stride: usize, first: usize },
    Random { min: usize, max: usize, seed: u64 },
    IncrementalStatic { increment: usize, first: usize },
    IncrementalRandom { min: usize, max: usize, seed: u64 },
}

impl StridePolicy {
    pub fn validate(&self) -> Result<()> {
        match *self {
            StridePolicy::Random { min, max, .. } | StridePolicy::IncrementalRandom { min, max, .. }
                if min >= max =>
            {
                Err(FindSimilarError::InvalidConfig(format!(
                    "random stride needs min < max, got {}..{}",
                    min, max
                )))
            }
            StridePolicy::IncrementalStatic { increment: 0, .. } => Err(FindSimilarError::InvalidConfig(
                "incremental stride must advance by at least one sample".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Start a fresh, deterministic sequence of strides
    pub fn cursor(&self, samples_per_fingerprint: usize) -> StrideCursor {
        let rng = match *self {
            StridePolicy::Random { seed, .. } | StridePolicy::IncrementalRandom { seed, .. } => {
                Some(StdRng::seed_from_u64(seed))
            }
            _ => None,
        };
        StrideCursor {
            policy: *self,
            samples_per_fingerprint: samples_per_fingerprint as i64,
            rng,
        }
    }
}

/// Iterator-like source of stride sizes for one spectrum
pub struct StrideCursor {
    policy: StridePolicy,
    samples_per_fingerprint: i64,
    rng: Option<StdRng>,
}

impl StrideCursor {
    fn draw(&mut self, min: usize, max: usize) -> i64 {
        match self.rng.as_mut() {
            Some(rng) => rng.random_range(min..max) as i64,
            None => min as i64,
        }
    }

    /// Offset of the first image, in samples
    pub fn first_stride(&mut self) -> i64 {
        match self.policy {
            StridePolicy::Static { first, .. } | StridePolicy::IncrementalStatic { first, .. } => first as i64,
            StridePolicy::Random { min, max, .. } | StridePolicy::IncrementalRandom { min, max, .. } => {
                self.draw(min, max)
            }
        }
    }

    /// Gap after the end of the previous image, in samples; negative values overlap
    pub fn next_stride(&mut self) -> i64 {
        match self.policy {
            StridePolicy::Static { stride, .. } => stride as i64,
            StridePolicy::Random { min, max, .. } => self.draw(min, max),
            StridePolicy::IncrementalStatic { increment, .. } => increment as i64 - self.samples_per_fingerprint,
            StridePolicy::IncrementalRandom { min, max, .. } => self.draw(min, max) - self.samples_per_fingerprint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_stride() {
        let mut cursor = StridePolicy::Static { stride: 5115, first: 0 }.cursor(128 * 64);
        assert_eq!(cursor.first_stride(), 0);
        assert_eq!(cursor.next_stride(), 5115);
        assert_eq!(cursor.next_stride(), 5115);
    }

    #[test]
    fn test_incremental_stride_overlaps() {
        let mut cursor = StridePolicy::IncrementalStatic { increment: 29695, first: 0 }.cursor(128 * 256);
        assert_eq!(cursor.next_stride(), 29695 - 32768);
    }

    #[test]
    fn test_random_stride_is_seeded() {
        let policy = StridePolicy::Random { min: 1, max: 4096, seed: 7 };
        let a: Vec<i64> = {
            let mut c = policy.cursor(1024);
            (0..10).map(|_| c.next_stride()).collect()
        };
        let b: Vec<i64> = {
            let mut c = policy.cursor(1024);
            (0..10).map(|_| c.next_stride()).collect()
        };
        assert_eq!(a, b);
        assert!(a.iter().all(|&s| (1..4096).contains(&s)));
    }

    #[test]
    fn test_validate() {
        assert!(StridePolicy::Random { min: 10, max: 10, seed: 0 }.validate().is_err());
        assert!(StridePolicy::IncrementalStatic { increment: 0, first: 0 }.validate().is_err());
        assert!(StridePolicy::Static { stride: 0, first: 0 }.validate().is_ok());
    }
}
