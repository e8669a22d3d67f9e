//! FFT processing with windowing, and the short-time Fourier transform

use std::sync::Arc;

use log::debug;
use num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use super::matrix::Matrix;
use super::windows::{apply_window, create_window, WindowType};
use crate::error::{FindSimilarError, Result};

/// Windowed real-input FFT of a fixed size.
///
/// The plan and the window are built once and only read afterwards, so one
/// processor can be shared by every worker thread.
pub struct FftProcessor {
    fft: Arc<dyn RealToComplex<f64>>,
    window: Vec<f64>,
    fft_size: usize,
}

impl FftProcessor {
    pub fn new(fft_size: usize, window_type: WindowType) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        Self {
            fft: planner.plan_fft_forward(fft_size),
            window: create_window(fft_size, window_type),
            fft_size,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of bins produced per frame (`fft_size / 2 + 1`)
    pub fn bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Complex spectrum of one windowed frame; short frames are zero-padded
    pub fn complex_spectrum(&self, frame: &[f32]) -> Result<Vec<Complex<f64>>> {
        let mut input = self.fft.make_input_vec();
        let mut output = self.fft.make_output_vec();
        apply_window(frame, &self.window, &mut input);
        self.fft
            .process(&mut input, &mut output)
            .map_err(|e| FindSimilarError::InvalidMatrix(format!("fft failed: {}", e)))?;
        Ok(output)
    }

    /// Magnitude spectrum `sqrt((re^2 + im^2) * N)` of one frame
    pub fn magnitude_spectrum(&self, frame: &[f32]) -> Result<Vec<f64>> {
        let scale = self.fft_size as f64;
        Ok(self
            .complex_spectrum(frame)?
            .iter()
            .map(|c| (c.norm_sqr() * scale).sqrt())
            .collect())
    }
}

/// Time x frequency magnitudes: rows are frequency bins, columns are frames
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    magnitudes: Matrix,
}

impl Spectrogram {
    pub fn bins(&self) -> usize {
        self.magnitudes.rows()
    }

    pub fn frames(&self) -> usize {
        self.magnitudes.cols()
    }

    pub fn as_matrix(&self) -> &Matrix {
        &self.magnitudes
    }
}

/// Short-time Fourier transform with a fixed window and hop size
pub struct Stft {
    window_size: usize,
    hop_size: usize,
    processor: FftProcessor,
}

impl Stft {
    pub fn new(window_size: usize, hop_size: usize, window_type: WindowType) -> Self {
        Self {
            window_size,
            hop_size,
            processor: FftProcessor::new(window_size, window_type),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Frames produced for `len` samples: `(len - window) / hop`
    pub fn frame_count(&self, len: usize) -> usize {
        if len < self.window_size || self.hop_size == 0 {
            return 0;
        }
        (len - self.window_size) / self.hop_size
    }

    /// Smallest input accepted by [`Stft::apply`]
    pub fn min_samples(&self) -> usize {
        self.window_size + self.hop_size
    }

    /// Spectrogram of `samples`.
    ///
    /// Inputs shorter than `window + hop` must be zero-padded by the caller.
    pub fn apply(&self, samples: &[f32]) -> Result<Spectrogram> {
        if samples.len() < self.min_samples() {
            return Err(FindSimilarError::InsufficientAudio {
                samples: samples.len(),
                required: self.min_samples(),
            });
        }

        let frames = self.frame_count(samples.len());
        let mut magnitudes = Matrix::new(self.processor.bins(), frames);
        for frame in 0..frames {
            let start = frame * self.hop_size;
            let column = self
                .processor
                .magnitude_spectrum(&samples[start..start + self.window_size])?;
            magnitudes.set_column(frame, &column);
        }

        debug!(
            "stft: {} samples -> {} bins x {} frames",
            samples.len(),
            magnitudes.rows(),
            frames
        );
        Ok(Spectrogram { magnitudes })
    }
}
