// tests/fingerprint_test.rs
//
// Fingerprint generation: determinism, identical-track distance and stride effects.
//
// Usage:
//   cargo test --test fingerprint_test

mod test_utils;

use findsimilar::config::{ConfigPreset, EngineConfig};
use findsimilar::core::{Fingerprint, FingerprintGenerator, StridePolicy};
use test_utils::music_like;

fn generator() -> FingerprintGenerator {
    FingerprintGenerator::new(&EngineConfig::from_preset(ConfigPreset::FullFrequency).fingerprint).unwrap()
}

fn fingerprints(seed: u64, stride: &StridePolicy) -> Vec<Fingerprint> {
    generator()
        .fingerprints_from_samples(&music_like(seed, 32000, 6.0), stride)
        .unwrap()
}

#[test]
fn test_identical_tracks_have_zero_hamming() {
    let stride = StridePolicy::IncrementalStatic { increment: 29695, first: 0 };
    let a = fingerprints(21, &stride);
    let b = fingerprints(21, &stride);

    assert!(a.len() >= 2, "expected several images, got {}", a.len());
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.hamming_distance(y), 0);
        assert_eq!(x.jaccard(y), 1.0);
    }
}

#[test]
fn test_different_tracks_are_far_apart() {
    let stride = StridePolicy::Static { stride: 0, first: 0 };
    let a = fingerprints(1, &stride);
    let b = fingerprints(2, &stride);

    let closest = a
        .iter()
        .zip(&b)
        .map(|(x, y)| x.hamming_distance(y))
        .min()
        .unwrap();
    // 200 bits per fingerprint; unrelated music shares few of them
    assert!(closest > 100, "unrelated fingerprints too close: {}", closest);
}

#[test]
fn test_fingerprint_layout() {
    let config = EngineConfig::from_preset(ConfigPreset::FullFrequency).fingerprint;
    for fp in fingerprints(5, &config.stride) {
        assert_eq!(fp.len(), config.fingerprint_bits());
        assert!(fp.count_ones() <= config.top_wavelets);
        assert!(!fp.is_silent());
        // A coefficient is either positive or negative, never both
        let ones: Vec<usize> = fp.iter_ones().collect();
        assert!(ones.windows(2).all(|w| !(w[0] % 2 == 0 && w[1] == w[0] + 1)));
    }
}

#[test]
fn test_overlapping_stride_yields_more_images() {
    let gapless = fingerprints(8, &StridePolicy::Static { stride: 0, first: 0 });
    let overlapping = fingerprints(8, &StridePolicy::IncrementalStatic { increment: 8192, first: 0 });
    let spaced = fingerprints(8, &StridePolicy::Static { stride: 32768, first: 0 });

    assert!(overlapping.len() > gapless.len());
    assert!(spaced.len() < gapless.len());
    // Both grids start at frame 0
    assert_eq!(overlapping[0], gapless[0]);
}

#[test]
fn test_random_stride_is_reproducible() {
    let stride = StridePolicy::Random { min: 1, max: 16384, seed: 42 };
    assert_eq!(fingerprints(13, &stride), fingerprints(13, &stride));
}
