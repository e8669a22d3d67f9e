//! Visualization tools for spectrograms and fingerprints
//!
//! Renders the log spectrogram the fingerprinter sees and the sign pattern
//! of each fingerprint as PNG images.

mod spectrogram;

pub use spectrogram::{
    render_fingerprint,
    render_log_spectrogram,
    write_fingerprints,
    write_spectrogram,
    ImageConfig,
};
