//! Audio feature analysis
//!
//! Turns decoded samples into the matrices consumed by the two retrieval
//! paths:
//! - Feature matrices (MFCC or log-band wavelet) for the SCMS model
//! - Log-frequency spectrograms for spectral-image fingerprints

mod extractor;
mod mfcc;
mod spectrum;

pub use extractor::{FeatureExtractor, FeatureMatrix};
pub use mfcc::{MelFilterBank, MfccReducer};
pub use spectrum::{
    dynamic_log_indexes, freq_to_index, static_log_indexes, LogBands, LogSpectrogramBuilder,
};
