//! Spectral-image fingerprints
//!
//! A log spectrogram is cut into fixed-length images, each image is Haar
//! decomposed and its strongest coefficients are sign-encoded into a
//! sparse bit vector.

mod bits;
mod generator;
mod stride;

pub use bits::Fingerprint;
pub use generator::{encode_top_wavelets, top_wavelet_indexes, FingerprintGenerator};
pub use stride::{StrideCursor, StridePolicy};
