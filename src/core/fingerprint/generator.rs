// src/core/fingerprint/generator.rs
//
// Log spectrogram -> spectral images -> Haar wavelets -> binary fingerprints.

use std::cmp::Ordering;

use log::debug;

use super::bits::Fingerprint;
use super::stride::StridePolicy;
use crate::config::FingerprintConfig;
use crate::core::analysis::LogSpectrogramBuilder;
use crate::core::dsp::filters::truncate_seconds;
use crate::core::dsp::{HaarVariant, Matrix};
use crate::error::Result;

/// Indexes of the `top` largest-magnitude values; ties keep the lower index first
pub fn top_wavelet_indexes(values: &[f64], top: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[b]
            .abs()
            .partial_cmp(&values[a].abs())
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
    order.truncate(top);
    order
}

/// Sign-encode the strongest wavelets of a decomposed image
pub fn encode_top_wavelets(image: &Matrix, top: usize) -> Fingerprint {
    let values = image.as_slice();
    let mut fingerprint = Fingerprint::new(2 * values.len());
    for i in top_wavelet_indexes(values, top) {
        let v = values[i];
        if v > 0.0 {
            fingerprint.set(2 * i, true);
        } else if v < 0.0 {
            fingerprint.set(2 * i + 1, true);
        }
    }
    fingerprint
}

/// Produces fingerprints for a fixed configuration
pub struct FingerprintGenerator {
    config: FingerprintConfig,
    spectrogram: LogSpectrogramBuilder,
}

impl FingerprintGenerator {
    pub fn new(config: &FingerprintConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            spectrogram: LogSpectrogramBuilder::new(config)?,
        })
    }

    pub fn config(&self) -> &FingerprintConfig {
        &self.config
    }

    /// Frames x log-bands spectrogram of mono samples
    pub fn log_spectrogram(&self, samples: &[f32]) -> Result<Matrix> {
        let mut samples = samples.to_vec();
        truncate_seconds(&mut samples, self.config.sample_rate, self.config.seconds_to_analyze);
        self.spectrogram.build(&samples)
    }

    /// Cut consecutive `fingerprint_length`-frame images out of a log spectrogram.
    ///
    /// If no full image fits, the available frames are zero-padded into a
    /// single image so short inputs still yield one fingerprint.
    pub fn cut_spectrum(&self, spectrum: &Matrix, stride: &StridePolicy) -> Vec<Matrix> {
        let length = self.config.fingerprint_length;
        let overlap = self.config.overlap as i64;
        let width = spectrum.rows() as i64;
        if width == 0 {
            return Vec::new();
        }

        let mut cursor = stride.cursor(self.config.samples_per_fingerprint());
        let mut start = (cursor.first_stride() / overlap).max(0);
        let mut images = Vec::new();
        while start + (length as i64) < width {
            images.push(spectrum.row_range(start as usize, length));
            let advance = length as i64 + cursor.next_stride() / overlap;
            start += advance.max(1);
        }

        if images.is_empty() {
            let mut image = Matrix::new(length, spectrum.cols());
            for r in 0..spectrum.rows().min(length) {
                image.row_mut(r).copy_from_slice(spectrum.row(r));
            }
            images.push(image);
        }
        images
    }

    /// Wavelet-decompose one image and keep its strongest coefficients as bits
    pub fn fingerprint_image(&self, mut image: Matrix) -> Result<Fingerprint> {
        self.config.haar.decompose(&mut image)?;
        Ok(encode_top_wavelets(&image, self.config.top_wavelets))
    }

    /// Fingerprints of a log spectrogram, in time order
    pub fn fingerprints_from_spectrum(&self, spectrum: &Matrix, stride: &StridePolicy) -> Result<Vec<Fingerprint>> {
        self.cut_spectrum(spectrum, stride)
            .into_iter()
            .map(|image| self.fingerprint_image(image))
            .collect()
    }

    /// Fingerprints of mono samples at the configured sample rate
    pub fn fingerprints_from_samples(&self, samples: &[f32], stride: &StridePolicy) -> Result<Vec<Fingerprint>> {
        let spectrum = self.log_spectrogram(samples)?;
        let fingerprints = self.fingerprints_from_spectrum(&spectrum, stride)?;
        debug!(
            "fingerprints: {} frames -> {} images ({} silent)",
            spectrum.rows(),
            fingerprints.len(),
            fingerprints.iter().filter(|f| f.is_silent()).count()
        );
        Ok(fingerprints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigPreset, EngineConfig};

    fn small_config() -> FingerprintConfig {
        FingerprintConfig {
            fingerprint_length: 4,
            log_bins: 4,
            overlap: 10,
            top_wavelets: 3,
            ..EngineConfig::from_preset(ConfigPreset::FullFrequency).fingerprint
        }
    }

    fn ramp(rows: usize, cols: usize) -> Matrix {
        let data = (0..rows * cols).map(|i| i as f64).collect();
        Matrix::from_vec(rows, cols, data).unwrap()
    }

    #[test]
    fn test_top_wavelet_tie_break() {
        let values = [1.0, -3.0, 3.0, 0.5, -1.0];
        assert_eq!(top_wavelet_indexes(&values, 3), vec![1, 2, 0]);
    }

    #[test]
    fn test_encode_signs() {
        let image = Matrix::from_vec(1, 4, vec![0.0, 5.0, -4.0, 1.0]).unwrap();
        let fp = encode_top_wavelets(&image, 2);
        assert_eq!(fp.len(), 8);
        assert_eq!(fp.iter_ones().collect::<Vec<_>>(), vec![2, 5]);
    }

    #[test]
    fn test_cut_static_stride() {
        let generator = FingerprintGenerator::new(&small_config()).unwrap();
        let spectrum = ramp(20, 4);
        // gap of 20 samples = 2 frames: starts 0, 6, 12 (12 + 4 < 20), 18 stops
        let images = generator.cut_spectrum(&spectrum, &StridePolicy::Static { stride: 20, first: 0 });
        assert_eq!(images.len(), 3);
        assert_eq!(images[1][(0, 0)], spectrum[(6, 0)]);
        assert_eq!(images[2][(3, 3)], spectrum[(15, 3)]);
    }

    #[test]
    fn test_cut_overlapping_stride() {
        let generator = FingerprintGenerator::new(&small_config()).unwrap();
        let spectrum = ramp(10, 4);
        // increment of 10 samples = one frame between image starts
        let images = generator.cut_spectrum(
            &spectrum,
            &StridePolicy::IncrementalStatic { increment: 10, first: 0 },
        );
        assert_eq!(images.len(), 6);
        assert_eq!(images[5][(0, 0)], spectrum[(5, 0)]);
    }

    #[test]
    fn test_short_spectrum_is_padded() {
        let generator = FingerprintGenerator::new(&small_config()).unwrap();
        let spectrum = ramp(2, 4);
        let images = generator.cut_spectrum(&spectrum, &StridePolicy::Static { stride: 0, first: 0 });
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].rows(), 4);
        assert_eq!(images[0][(1, 2)], spectrum[(1, 2)]);
        assert_eq!(images[0][(3, 2)], 0.0);
    }

    #[test]
    fn test_fingerprint_image_bit_count() {
        let generator = FingerprintGenerator::new(&small_config()).unwrap();
        let fp = generator.fingerprint_image(ramp(4, 4)).unwrap();
        assert_eq!(fp.len(), 32);
        assert_eq!(fp.count_ones(), 3);
    }

    #[test]
    fn test_fingerprints_from_samples_deterministic() {
        let config = EngineConfig::from_preset(ConfigPreset::FullFrequency).fingerprint;
        let generator = FingerprintGenerator::new(&config).unwrap();
        let samples: Vec<f32> = (0..32000 * 3)
            .map(|i| {
                let t = i as f32 / 32000.0;
                0.4 * (2.0 * std::f32::consts::PI * 523.0 * t).sin() * (1.0 + (t * 3.0).sin())
            })
            .collect();
        let stride = config.stride;
        let a = generator.fingerprints_from_samples(&samples, &stride).unwrap();
        let b = generator.fingerprints_from_samples(&samples, &stride).unwrap();
        assert!(!a.is_empty());
        assert_eq!(a, b);
        assert!(a.iter().all(|f| f.len() == config.fingerprint_bits()));
        assert!(a.iter().all(|f| f.count_ones() <= config.top_wavelets));
    }
}
