//! Core similarity engine modules

pub mod analysis;
pub mod decoder;
pub mod dsp;
pub mod engine;
pub mod fingerprint;
pub mod lsh;
pub mod model;
pub mod scanner;
pub mod visualization;

pub use analysis::{FeatureExtractor, FeatureMatrix};
pub use decoder::{AudioDecoder, DecodedAudio, SymphoniaDecoder};
pub use engine::{Comparison, Engine, EngineBuilder, EngineContext, IndexOutcome, TrackAnalysis};
pub use fingerprint::{Fingerprint, FingerprintGenerator, StridePolicy};
pub use lsh::{FailureReason, LshQueryEngine, MinHasher, QueryResponse, QueryStats};
pub use model::{MandelEllisModel, Neighbor, PackedSymmetricMatrix, ScmsModel, TrackModel};
pub use scanner::{file_digest, CorpusScanner, ScanEvent, ScanSummary};
