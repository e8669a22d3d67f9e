// src/core/analysis/spectrum.rs
//
// Logarithmically spaced frequency bands and the log spectrogram built from them.

use log::debug;

use crate::config::FingerprintConfig;
use crate::core::dsp::{stats, FftProcessor, Matrix};
use crate::error::{FindSimilarError, Result};

/// Spectrum index of `freq`: `round((N/2 + 1) * freq / (sr/2))`
pub fn freq_to_index(freq: f64, sample_rate: u32, fft_size: usize) -> usize {
    let fraction = freq / (sample_rate as f64 / 2.0);
    ((fft_size / 2 + 1) as f64 * fraction).round().max(0.0) as usize
}

/// `bands + 1` boundaries spaced evenly on a `log_base` scale between the two frequencies
pub fn static_log_indexes(
    min_freq: f64,
    max_freq: f64,
    log_base: f64,
    bands: usize,
    sample_rate: u32,
    fft_size: usize,
) -> Vec<usize> {
    let log_min = min_freq.ln() / log_base.ln();
    let log_max = max_freq.ln() / log_base.ln();
    let delta = (log_max - log_min) / bands as f64;

    (0..=bands)
        .map(|i| {
            let freq = log_base.powf(log_min + delta * i as f64);
            freq_to_index(freq, sample_rate, fft_size)
        })
        .collect()
}

/// Boundaries whose base is chosen so `bands` steps span `min_freq..max_freq`
pub fn dynamic_log_indexes(
    min_freq: f64,
    max_freq: f64,
    bands: usize,
    sample_rate: u32,
    fft_size: usize,
) -> Vec<usize> {
    let log_base = ((max_freq / min_freq).ln() / bands as f64).exp();
    let min_coef = fft_size as f64 / sample_rate as f64 * min_freq;

    (0..=bands)
        .map(|j| ((log_base.powi(j as i32) - 1.0) * min_coef) as usize + min_coef as usize)
        .collect()
}

/// Averages a magnitude spectrum over contiguous bands
#[derive(Debug, Clone, PartialEq)]
pub struct LogBands {
    indexes: Vec<usize>,
}

impl LogBands {
    /// Bands from `indexes.len() - 1` consecutive boundaries
    pub fn new(indexes: Vec<usize>) -> Result<Self> {
        if indexes.len() < 2 {
            return Err(FindSimilarError::InvalidConfig(
                "log bands need at least two boundaries".into(),
            ));
        }
        Ok(Self { indexes })
    }

    pub fn for_fingerprints(config: &FingerprintConfig) -> Result<Self> {
        let (min, max) = (config.min_frequency as f64, config.max_frequency as f64);
        let indexes = if config.use_dynamic_log_base {
            dynamic_log_indexes(min, max, config.log_bins, config.sample_rate, config.wdft_size)
        } else {
            static_log_indexes(min, max, config.log_base, config.log_bins, config.sample_rate, config.wdft_size)
        };
        Self::new(indexes)
    }

    pub fn len(&self) -> usize {
        self.indexes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn boundaries(&self) -> &[usize] {
        &self.indexes
    }

    /// Mean magnitude of each band.
    ///
    /// Boundaries are clamped to the spectrum; a band that collapses to an
    /// empty range takes the value of its lower bin.
    pub fn reduce(&self, magnitudes: &[f64]) -> Vec<f64> {
        if magnitudes.is_empty() {
            return vec![0.0; self.len()];
        }
        let last = magnitudes.len();
        self.indexes
            .windows(2)
            .map(|bounds| {
                let low = bounds[0].min(last);
                let high = bounds[1].min(last);
                if high > low {
                    magnitudes[low..high].iter().sum::<f64>() / (high - low) as f64
                } else {
                    magnitudes[low.min(last - 1)]
                }
            })
            .collect()
    }
}

/// Frames x log-bands magnitude image of a signal
pub struct LogSpectrogramBuilder {
    processor: FftProcessor,
    bands: LogBands,
    overlap: usize,
    normalize: bool,
}

impl LogSpectrogramBuilder {
    pub fn new(config: &FingerprintConfig) -> Result<Self> {
        Ok(Self {
            processor: FftProcessor::new(config.wdft_size, config.window),
            bands: LogBands::for_fingerprints(config)?,
            overlap: config.overlap,
            normalize: config.normalize_signal,
        })
    }

    pub fn bands(&self) -> &LogBands {
        &self.bands
    }

    /// Rows are frames `(len - wdft) / overlap`, columns are log bands
    pub fn build(&self, samples: &[f32]) -> Result<Matrix> {
        let wdft = self.processor.fft_size();
        if samples.len() < wdft {
            return Err(FindSimilarError::InsufficientAudio {
                samples: samples.len(),
                required: wdft,
            });
        }

        let mut signal = samples.to_vec();
        if self.normalize {
            let divisor = stats::normalize_in_place(&mut signal);
            debug!("log spectrogram: normalized by {:.3}", divisor);
        }

        let frames = (signal.len() - wdft) / self.overlap;
        let mut image = Matrix::new(frames, self.bands.len());
        for frame in 0..frames {
            let start = frame * self.overlap;
            let magnitudes = self.processor.magnitude_spectrum(&signal[start..start + wdft])?;
            image.row_mut(frame).copy_from_slice(&self.bands.reduce(&magnitudes));
        }
        Ok(image)
    }
}
