//! Window function implementations

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Window function types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    Rectangular,
    #[default]
    Hann,
    Hamming,
}

/// Create window coefficients for a frame of `size` samples
pub fn create_window(size: usize, window_type: WindowType) -> Vec<f64> {
    if size <= 1 {
        return vec![1.0; size];
    }
    let n = size as f64;
    (0..size)
        .map(|i| {
            let x = i as f64;
            match window_type {
                WindowType::Rectangular => 1.0,
                // Symmetric: zero at both ends
                WindowType::Hann => 0.5 * (1.0 - (2.0 * PI * x / (n - 1.0)).cos()),
                // Periodic form
                WindowType::Hamming => 0.54 - 0.46 * (2.0 * PI * x / n).cos(),
            }
        })
        .collect()
}

/// Multiply `frame` by `window` into `out`, zero-filling whatever the frame does not cover
pub fn apply_window(frame: &[f32], window: &[f64], out: &mut [f64]) {
    for (i, o) in out.iter_mut().enumerate() {
        *o = match (frame.get(i), window.get(i)) {
            (Some(&s), Some(&w)) => s as f64 * w,
            _ => 0.0,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window() {
        let window = create_window(5, WindowType::Hann);
        assert!(window[0].abs() < 1e-12);
        assert!((window[2] - 1.0).abs() < 1e-12);
        assert!(window[4].abs() < 1e-12);
    }

    #[test]
    fn test_hamming_window() {
        let window = create_window(4, WindowType::Hamming);
        assert!((window[0] - 0.08).abs() < 1e-12);
        assert!((window[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_apply_window_zero_pads() {
        let window = create_window(4, WindowType::Rectangular);
        let mut out = vec![9.0; 4];
        apply_window(&[1.0, 2.0], &window, &mut out);
        assert_eq!(out, vec![1.0, 2.0, 0.0, 0.0]);
    }
}
