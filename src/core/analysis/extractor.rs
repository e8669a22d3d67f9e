// src/core/analysis/extractor.rs
//
// Decoded samples -> feature matrix for the statistical model.

use log::debug;

use super::mfcc::MfccReducer;
use super::spectrum::{static_log_indexes, LogBands};
use crate::config::{AnalysisMethod, FeatureReduction, ScmsConfig};
use crate::core::dsp::filters::{pre_emphasis, truncate_seconds, zero_pad};
use crate::core::dsp::wavelet::haar_1d;
use crate::core::dsp::{Matrix, Spectrogram, Stft, ThresholdPolicy};
use crate::error::{FindSimilarError, Result};

/// `coefficients x frames` matrix; each column describes one frame
pub type FeatureMatrix = Matrix;

enum Reducer {
    Mfcc(MfccReducer),
    Wavelet {
        bands: LogBands,
        threshold: Option<ThresholdPolicy>,
        coefficients: usize,
    },
}

impl Reducer {
    fn apply(&self, spectrogram: &Spectrogram) -> Result<FeatureMatrix> {
        match self {
            Reducer::Mfcc(mfcc) => mfcc.apply(spectrogram),
            Reducer::Wavelet {
                bands,
                threshold,
                coefficients,
            } => {
                let spec = spectrogram.as_matrix();
                let mut reduced = Matrix::new(bands.len(), spec.cols());
                for frame in 0..spec.cols() {
                    let mut column: Vec<f64> = bands
                        .reduce(&spec.column(frame))
                        .into_iter()
                        .map(|e| if e < 1.0 { 0.0 } else { 10.0 * e.log10() })
                        .collect();
                    haar_1d(&mut column);
                    reduced.set_column(frame, &column);
                }
                if let Some(policy) = threshold {
                    policy.apply(&mut reduced);
                }
                Ok(reduced.top_rows(*coefficients))
            }
        }
    }
}

/// Computes feature matrices with a fixed configuration.
///
/// Built once per engine; all tables are read-only afterwards so the
/// extractor is shared across scan workers.
pub struct FeatureExtractor {
    config: ScmsConfig,
    stft: Stft,
    reducer: Reducer,
}

impl FeatureExtractor {
    pub fn new(config: &ScmsConfig) -> Result<Self> {
        let reducer = match config.reduction {
            FeatureReduction::MelDct => Reducer::Mfcc(MfccReducer::new(
                config.window_size,
                config.sample_rate,
                config.mel_filters,
                config.coefficients,
                config.min_frequency,
                config.dct,
            )?),
            FeatureReduction::Wavelet => {
                if !config.wavelet_bands.is_power_of_two() || config.coefficients > config.wavelet_bands {
                    return Err(FindSimilarError::InvalidConfig(format!(
                        "{} wavelet bands cannot hold {} coefficients",
                        config.wavelet_bands, config.coefficients
                    )));
                }
                let indexes = static_log_indexes(
                    config.min_frequency as f64,
                    (config.sample_rate / 2) as f64,
                    std::f64::consts::E,
                    config.wavelet_bands,
                    config.sample_rate,
                    config.window_size,
                );
                Reducer::Wavelet {
                    bands: LogBands::new(indexes)?,
                    threshold: config.wavelet_threshold,
                    coefficients: config.coefficients,
                }
            }
        };

        Ok(Self {
            config: config.clone(),
            stft: Stft::new(config.window_size, config.hop_size, config.window),
            reducer,
        })
    }

    pub fn config(&self) -> &ScmsConfig {
        &self.config
    }

    /// Feature dimension of the produced matrices
    pub fn dimension(&self) -> usize {
        self.config.coefficients
    }

    /// Length short inputs are zero-padded to; the Mandel/Ellis model analyses
    /// the audio as it is
    pub fn padded_len(&self) -> usize {
        match self.config.method {
            AnalysisMethod::Scms => (self.config.window_size * self.config.pad_windows).max(self.stft.min_samples()),
            AnalysisMethod::MandelEllis => 0,
        }
    }

    /// Truncate, filter and pad samples ahead of the STFT.
    ///
    /// Empty input and input shorter than one window are rejected; anything
    /// else shorter than [`FeatureExtractor::padded_len`] is zero-padded.
    pub fn prepare(&self, samples: &[f32]) -> Result<Vec<f32>> {
        if samples.len() < self.config.window_size {
            return Err(FindSimilarError::InsufficientAudio {
                samples: samples.len(),
                required: self.config.window_size,
            });
        }

        let mut prepared = samples.to_vec();
        truncate_seconds(
            &mut prepared,
            self.config.sample_rate,
            Some(self.config.seconds_to_analyze),
        );
        if let Some(alpha) = self.config.pre_emphasis {
            prepared = pre_emphasis(&prepared, alpha);
        }
        zero_pad(&mut prepared, self.padded_len());
        Ok(prepared)
    }

    pub fn spectrogram(&self, samples: &[f32]) -> Result<Spectrogram> {
        self.stft.apply(&self.prepare(samples)?)
    }

    /// Feature matrix of mono samples at the configured rate
    pub fn extract(&self, samples: &[f32]) -> Result<FeatureMatrix> {
        let spectrogram = self.spectrogram(samples)?;
        let features = self.reducer.apply(&spectrogram)?;
        if !features.is_finite() {
            return Err(FindSimilarError::InvalidMatrix(
                "feature matrix contains non-finite values".into(),
            ));
        }
        debug!(
            "features: {} samples -> {}x{}",
            samples.len(),
            features.rows(),
            features.cols()
        );
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / 22050.0;
                0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
                    + 0.2 * (2.0 * std::f32::consts::PI * 2500.0 * t).sin()
            })
            .collect()
    }

    #[test]
    fn test_mfcc_extract_shape() {
        let extractor = FeatureExtractor::new(&ScmsConfig::default()).unwrap();
        let features = extractor.extract(&tone(22050 * 3)).unwrap();
        assert_eq!(features.rows(), 20);
        assert_eq!(features.cols(), (22050 * 3 - 1024) / 1024);
    }

    #[test]
    fn test_short_audio_is_padded() {
        let extractor = FeatureExtractor::new(&ScmsConfig::default()).unwrap();
        let features = extractor.extract(&tone(1500)).unwrap();
        // padded to 8 windows -> (8192 - 1024) / 1024 frames
        assert_eq!(features.cols(), 7);
    }

    #[test]
    fn test_rejects_empty_and_sub_window_audio() {
        let extractor = FeatureExtractor::new(&ScmsConfig::default()).unwrap();
        assert!(matches!(
            extractor.extract(&[]),
            Err(FindSimilarError::InsufficientAudio { samples: 0, .. })
        ));
        assert!(extractor.extract(&tone(1000)).is_err());
    }

    #[test]
    fn test_mandel_ellis_skips_padding() {
        let config = ScmsConfig {
            method: AnalysisMethod::MandelEllis,
            ..ScmsConfig::default()
        };
        let extractor = FeatureExtractor::new(&config).unwrap();
        assert_eq!(extractor.padded_len(), 0);
        assert!(matches!(
            extractor.extract(&tone(1500)),
            Err(FindSimilarError::InsufficientAudio { samples: 1500, required: 2048 })
        ));
        let features = extractor.extract(&tone(22050)).unwrap();
        assert_eq!(features.cols(), (22050 - 1024) / 1024);
    }

    #[test]
    fn test_truncates_to_seconds() {
        let config = ScmsConfig {
            seconds_to_analyze: 1,
            ..ScmsConfig::default()
        };
        let extractor = FeatureExtractor::new(&config).unwrap();
        let features = extractor.extract(&tone(22050 * 4)).unwrap();
        assert_eq!(features.cols(), (22050 - 1024) / 1024);
    }

    #[test]
    fn test_wavelet_reduction() {
        let config = ScmsConfig {
            reduction: FeatureReduction::Wavelet,
            wavelet_threshold: Some(ThresholdPolicy::KeepTopPerRow(10)),
            ..ScmsConfig::default()
        };
        let extractor = FeatureExtractor::new(&config).unwrap();
        let features = extractor.extract(&tone(22050 * 2)).unwrap();
        assert_eq!(features.rows(), 20);
        assert!(features.is_finite());
    }
}
