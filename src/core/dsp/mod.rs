//! Digital Signal Processing utilities
//!
//! Transform primitives shared by the feature extractor and the fingerprint
//! generator. Coefficient tables (windows, FFT plans, DCT matrices) are built
//! once and only read afterwards.

pub mod dct;
pub mod fft;
pub mod filters;
pub mod matrix;
pub mod stats;
pub mod threshold;
pub mod wavelet;
pub mod windows;

pub use dct::{DctMatrix, DctTransform, DctVariant};
pub use fft::{FftProcessor, Spectrogram, Stft};
pub use matrix::Matrix;
pub use threshold::ThresholdPolicy;
pub use wavelet::HaarVariant;
pub use windows::{create_window, WindowType};
