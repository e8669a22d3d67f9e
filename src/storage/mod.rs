//! Persistence contracts for tracks, models, fingerprints and hash buckets
//!
//! The engine only talks to these traits. [`MemoryStore`] is the bundled
//! implementation; it can snapshot itself to a JSON file between runs.
//!
//! ## Consistency
//!
//! Every call is atomic on its own, but nothing spans calls. Ingesting a
//! track is a sequence of writes (track, model, fingerprints, buckets), so
//! a reader running at the same time may see a track without its model or
//! buckets that point at fingerprints of a track still being written.
//! Reads are best-effort snapshots, not linearizable with concurrent
//! ingestion; callers treat missing pieces as "not indexed yet".

mod memory;

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::fingerprint::Fingerprint;
use crate::config::AnalysisMethod;
use crate::core::model::TrackModel;
use crate::error::Result;

pub use memory::MemoryStore;

pub type TrackId = u32;
pub type FingerprintId = u64;

/// A scanned audio file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub path: PathBuf,
    pub duration_ms: u64,
    /// Free-form metadata (artist, title, album...) read from the container
    pub tags: BTreeMap<String, String>,
    /// Hex MD5 of the file contents, used to skip unchanged files on rescan
    pub digest: Option<String>,
    pub indexed_at: DateTime<Utc>,
}

impl Track {
    /// `artist - title` when both tags exist, else the file name
    pub fn display_name(&self) -> String {
        match (self.tags.get("artist"), self.tags.get("title")) {
            (Some(artist), Some(title)) => format!("{} - {}", artist, title),
            _ => self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.display().to_string()),
        }
    }
}

/// Track fields supplied by the caller; the store assigns the id
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrack {
    pub path: PathBuf,
    pub duration_ms: u64,
    pub tags: BTreeMap<String, String>,
    pub digest: Option<String>,
}

/// One fingerprint of a track, in time order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFingerprint {
    pub id: FingerprintId,
    pub track_id: TrackId,
    pub order: u32,
    pub fingerprint: Fingerprint,
}

/// A fingerprint's membership in one LSH table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashBucket {
    pub bucket: u64,
    pub table: u32,
    pub track_id: TrackId,
    pub fingerprint_id: FingerprintId,
}

pub trait TrackStore {
    fn add_track(&self, track: NewTrack) -> Result<Track>;
    fn track(&self, id: TrackId) -> Result<Option<Track>>;
    fn tracks(&self) -> Result<Vec<Track>>;
    fn find_by_digest(&self, digest: &str) -> Result<Option<Track>>;
}

/// Models are kept per analysis method; a track may carry one of each
pub trait ModelStore {
    /// Store under the model's own method, replacing any earlier one
    fn put_model(&self, track_id: TrackId, model: &TrackModel) -> Result<()>;
    fn model(&self, track_id: TrackId, method: AnalysisMethod) -> Result<Option<TrackModel>>;
    /// Every stored model of `method` at the time of the call
    fn models(&self, method: AnalysisMethod) -> Result<Vec<(TrackId, TrackModel)>>;
}

pub trait FingerprintStore {
    /// Store fingerprints in order and return them with their assigned ids
    fn add_fingerprints(&self, track_id: TrackId, fingerprints: &[Fingerprint]) -> Result<Vec<StoredFingerprint>>;
    fn fingerprints_by_ids(&self, ids: &[FingerprintId]) -> Result<Vec<StoredFingerprint>>;
    fn fingerprints_for_track(&self, track_id: TrackId) -> Result<Vec<StoredFingerprint>>;
}

pub trait HashBinStore {
    fn add_buckets(&self, buckets: &[HashBucket]) -> Result<()>;
    /// All rows whose bucket value is in `buckets`, any table
    fn buckets_matching(&self, buckets: &[u64]) -> Result<Vec<HashBucket>>;
}

/// Everything the engine needs from persistence
pub trait Store: TrackStore + ModelStore + FingerprintStore + HashBinStore + Send + Sync {}

impl<T> Store for T where T: TrackStore + ModelStore + FingerprintStore + HashBinStore + Send + Sync {}
