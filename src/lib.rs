//! findsimilar - Content-based audio similarity and duplicate detection
//!
//! Builds two compact signatures per track and answers "which tracks sound
//! like this one" without looking at metadata.
//!
//! ## Features
//!
//! - **SCMS models**: a Gaussian summary (mean + covariance) of MFCC-like
//!   features, compared with a closed-form symmetric KL-style divergence
//!   (or, selectable per configuration, the full-covariance Mandel/Ellis form)
//! - **Spectral fingerprints**: Haar-wavelet sign patterns of log-spectrogram
//!   images, robust to resampling and lossy re-encoding
//! - **MinHash/LSH index**: sub-linear candidate retrieval with a tunable
//!   table-vote threshold
//! - **Parallel scanning**: bounded worker pool with cancellation and
//!   progress events
//!
//! ## Module Structure
//!
//! - `core` - transforms, feature extraction, models, fingerprints, LSH, engine
//! - `config` - engine configuration and presets
//! - `storage` - persistence contracts and the in-memory store
//! - `cli` - command-line interface
//! - `error` - error taxonomy
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use findsimilar::{ConfigPreset, Engine};
//!
//! let engine = Engine::builder().preset(ConfigPreset::FullFrequency).build()?;
//! engine.index_file(Path::new("a.flac"), None)?;
//!
//! let response = engine.match_file(Path::new("a_copy.mp3"));
//! for stats in &response.matches {
//!     println!("track {} score {:.1}", stats.track_id, stats.score());
//! }
//! ```
//!
//! ## Presets
//!
//! | Preset        | Rate     | Bands          | Log base | Stride  |
//! |---------------|----------|----------------|----------|---------|
//! | Default       | 44.1 kHz | 20 - 22050 Hz  | e        | 40924   |
//! | FullFrequency | 32 kHz   | 40 - 16000 Hz  | 2        | 29695   |
//!
//! Both cut 128-frame x 32-band images and keep the 200 strongest wavelets,
//! hashed into 25 tables of 4 min-hash keys.

// Core engine functionality
pub mod core;

// Command-line interface
pub mod cli;

// Configuration and presets
pub mod config;

pub mod error;

// Persistence contracts
pub mod storage;

// Re-export commonly used types at crate root for convenience
pub use config::{AnalysisMethod, ConfigBuilder, ConfigPreset, EngineConfig};
pub use core::{
    AudioDecoder, CorpusScanner, DecodedAudio, Engine, EngineBuilder, Fingerprint, Neighbor,
    QueryResponse, QueryStats, ScanEvent, ScanSummary, ScmsModel, SymphoniaDecoder, TrackModel,
};
pub use error::{FindSimilarError, Result};
pub use storage::{MemoryStore, Store, Track, TrackId};
