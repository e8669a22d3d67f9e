// tests/transform_test.rs
//
// Round-trip laws of the transform primitives.
//
// Usage:
//   cargo test --test transform_test

mod test_utils;

use findsimilar::core::dsp::threshold::{keep_top_per_row, throw_away};
use findsimilar::core::dsp::{DctVariant, HaarVariant, Matrix, ThresholdPolicy};
use test_utils::random_features;

const VARIANTS: [DctVariant; 4] = [DctVariant::Direct, DctVariant::Separable, DctVariant::Matrix, DctVariant::Fft];

/// JPEG reference luminance block
const JPEG_BLOCK: [[f64; 8]; 8] = [
    [139.0, 144.0, 149.0, 153.0, 155.0, 155.0, 155.0, 155.0],
    [144.0, 151.0, 153.0, 156.0, 159.0, 156.0, 156.0, 156.0],
    [150.0, 155.0, 160.0, 163.0, 158.0, 156.0, 156.0, 156.0],
    [159.0, 161.0, 162.0, 160.0, 160.0, 159.0, 159.0, 159.0],
    [159.0, 160.0, 161.0, 162.0, 162.0, 155.0, 155.0, 155.0],
    [161.0, 161.0, 161.0, 161.0, 160.0, 157.0, 157.0, 157.0],
    [162.0, 162.0, 161.0, 163.0, 162.0, 157.0, 157.0, 157.0],
    [162.0, 162.0, 161.0, 161.0, 163.0, 158.0, 158.0, 158.0],
];

#[test]
fn test_dct_round_trip_all_variants() {
    for (rows, cols) in [(2, 2), (8, 8), (4, 6)] {
        let block = random_features(rows as u64 * 31 + cols as u64, rows, cols);
        for variant in VARIANTS {
            let dct = variant.build(rows, cols);
            let back = dct.inverse(&dct.forward(&block).unwrap()).unwrap();
            assert!(
                back.max_abs_diff(&block) < 1e-9,
                "{} round trip failed for {}x{}",
                dct.name(),
                rows,
                cols
            );
        }
    }
}

#[test]
fn test_jpeg_block_recovered_after_rounding() {
    let shifted: Vec<Vec<f64>> = JPEG_BLOCK
        .iter()
        .map(|row| row.iter().map(|v| v - 128.0).collect())
        .collect();
    let block = Matrix::from_rows(&shifted).unwrap();

    for variant in VARIANTS {
        let dct = variant.build(8, 8);
        let coefficients = dct.forward(&block).unwrap();
        // DC term is the mean times 8 for an orthonormal 8x8 transform
        let mean = block.as_slice().iter().sum::<f64>() / 64.0;
        assert!((coefficients[(0, 0)] - 8.0 * mean).abs() < 1e-9);

        let back = dct.inverse(&coefficients).unwrap();
        for r in 0..8 {
            for c in 0..8 {
                assert_eq!(back[(r, c)].round(), shifted[r][c], "{} at ({}, {})", dct.name(), r, c);
            }
        }
    }
}

#[test]
fn test_haar_round_trip_both_variants() {
    for size in [4, 16] {
        let original = random_features(size as u64, size, size);
        for variant in [HaarVariant::Tensor, HaarVariant::Interleaved] {
            let mut m = original.clone();
            variant.decompose(&mut m).unwrap();
            assert!(m.max_abs_diff(&original) > 1e-6, "{:?} left {}x{} unchanged", variant, size, size);
            variant.reconstruct(&mut m).unwrap();
            assert!(m.max_abs_diff(&original) < 1e-9, "{:?} round trip failed at {}", variant, size);
        }
    }
}

#[test]
fn test_haar_rejects_non_power_of_two() {
    let mut m = Matrix::new(6, 6);
    assert!(HaarVariant::Tensor.decompose(&mut m).is_err());
}

#[test]
fn test_dct_compression_keeps_energy_in_low_coefficients() {
    let shifted: Vec<Vec<f64>> = JPEG_BLOCK
        .iter()
        .map(|row| row.iter().map(|v| v - 128.0).collect())
        .collect();
    let block = Matrix::from_rows(&shifted).unwrap();
    let dct = DctVariant::Matrix.build(8, 8);
    let mut coefficients = dct.forward(&block).unwrap();

    // Dropping the smallest 75% of coefficients still approximates the block closely
    throw_away(coefficients.as_mut_slice(), 75.0);
    let zeros = coefficients.as_slice().iter().filter(|v| **v == 0.0).count();
    assert!(zeros >= 48);
    let approx = dct.inverse(&coefficients).unwrap();
    assert!(approx.max_abs_diff(&block) < 8.0);
}

#[test]
fn test_threshold_policies_on_matrix() {
    let mut m = Matrix::from_rows(&[vec![0.1, -4.0, 2.0, -0.5], vec![3.0, 0.2, -0.1, 1.0]]).unwrap();
    let mut top = m.clone();
    keep_top_per_row(&mut top, 1);
    assert_eq!(top.row(0), &[0.0, -4.0, 0.0, 0.0]);
    assert_eq!(top.row(1), &[3.0, 0.0, 0.0, 0.0]);

    ThresholdPolicy::Hard(0.5).apply(&mut m);
    assert_eq!(m.as_slice().iter().filter(|v| **v != 0.0).count(), 4);
}
