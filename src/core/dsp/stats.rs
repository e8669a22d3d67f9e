//! Signal level statistics

/// Lower/upper clamp of the normalisation divisor (`10 * rms`)
pub const MIN_NORMALIZATION_RMS: f64 = 0.1;
pub const MAX_NORMALIZATION_RMS: f64 = 3.0;

/// Compute RMS (Root Mean Square)
pub fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

/// Normalise loudness in place.
///
/// Divides by `10 * rms` clamped to `[0.1, 3.0]` and clips the result to
/// `[-1, 1]`. Returns the divisor that was applied.
pub fn normalize_in_place(samples: &mut [f32]) -> f64 {
    let divisor = (rms(samples) * 10.0).clamp(MIN_NORMALIZATION_RMS, MAX_NORMALIZATION_RMS);
    for s in samples.iter_mut() {
        *s = ((*s as f64 / divisor) as f32).clamp(-1.0, 1.0);
    }
    divisor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms() {
        assert!((rms(&[1.0, -1.0, 1.0, -1.0]) - 1.0).abs() < 1e-12);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_normalize_clamps_divisor() {
        // rms 0.001 -> 10 * rms = 0.01, clamped up to 0.1
        let mut quiet = vec![0.001f32, -0.001];
        let divisor = normalize_in_place(&mut quiet);
        assert!((divisor - 0.1).abs() < 1e-12);
        assert!((quiet[0] - 0.01).abs() < 1e-6);

        // rms 1.0 -> 10, clamped down to 3
        let mut loud = vec![1.0f32, -1.0];
        let divisor = normalize_in_place(&mut loud);
        assert!((divisor - 3.0).abs() < 1e-12);
        assert!((loud[0] - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_clips() {
        let mut samples = vec![0.0f32; 99];
        samples.push(1.0);
        // rms = 0.1 -> divisor 1.0, nothing to clip
        normalize_in_place(&mut samples);
        assert_eq!(samples[99], 1.0);

        // rms 0.14 -> divisor 1.41 would leave 3.5, clipped to 1
        let mut spiky = vec![5.0f32, -5.0];
        spiky.extend(std::iter::repeat(0.0).take(2498));
        normalize_in_place(&mut spiky);
        assert_eq!(&spiky[..2], &[1.0, -1.0]);
    }
}
