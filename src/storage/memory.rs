// src/storage/memory.rs
//
// In-process store guarded by a read/write lock, with JSON snapshots.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{
    FingerprintId, FingerprintStore, HashBinStore, HashBucket, ModelStore, NewTrack, StoredFingerprint,
    Track, TrackId, TrackStore,
};
use crate::core::fingerprint::Fingerprint;
use crate::config::AnalysisMethod;
use crate::core::model::TrackModel;
use crate::error::{FindSimilarError, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Inner {
    next_track_id: TrackId,
    next_fingerprint_id: FingerprintId,
    tracks: BTreeMap<TrackId, Track>,
    /// Models in their binary layout, per analysis method
    models: BTreeMap<AnalysisMethod, BTreeMap<TrackId, Vec<u8>>>,
    fingerprints: BTreeMap<FingerprintId, StoredFingerprint>,
    track_fingerprints: BTreeMap<TrackId, Vec<FingerprintId>>,
    buckets: HashMap<u64, Vec<HashBucket>>,
}

/// Thread-safe in-memory implementation of every store trait
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot written by [`MemoryStore::save`]; a missing file yields an empty store
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("no store at {}, starting empty", path.display());
            return Ok(Self::new());
        }
        let text = fs::read_to_string(path)?;
        let inner: Inner = serde_json::from_str(&text)?;
        info!(
            "loaded store {}: {} tracks, {} fingerprints",
            path.display(),
            inner.tracks.len(),
            inner.fingerprints.len()
        );
        Ok(Self {
            inner: RwLock::new(inner),
        })
    }

    /// Write a JSON snapshot, replacing `path` only once the write succeeded
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&*self.read()?)?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, path)?;
        debug!("saved store to {}", path.display());
        Ok(())
    }

    pub fn track_count(&self) -> Result<usize> {
        Ok(self.read()?.tracks.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| FindSimilarError::Storage("store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| FindSimilarError::Storage("store lock poisoned".into()))
    }
}

impl TrackStore for MemoryStore {
    fn add_track(&self, track: NewTrack) -> Result<Track> {
        let mut inner = self.write()?;
        let id = inner.next_track_id;
        inner.next_track_id = id
            .checked_add(1)
            .ok_or_else(|| FindSimilarError::Storage("track ids exhausted".into()))?;
        let track = Track {
            id,
            path: track.path,
            duration_ms: track.duration_ms,
            tags: track.tags,
            digest: track.digest,
            indexed_at: Utc::now(),
        };
        inner.tracks.insert(id, track.clone());
        Ok(track)
    }

    fn track(&self, id: TrackId) -> Result<Option<Track>> {
        Ok(self.read()?.tracks.get(&id).cloned())
    }

    fn tracks(&self) -> Result<Vec<Track>> {
        Ok(self.read()?.tracks.values().cloned().collect())
    }

    fn find_by_digest(&self, digest: &str) -> Result<Option<Track>> {
        Ok(self
            .read()?
            .tracks
            .values()
            .find(|t| t.digest.as_deref() == Some(digest))
            .cloned())
    }
}

impl ModelStore for MemoryStore {
    fn put_model(&self, track_id: TrackId, model: &TrackModel) -> Result<()> {
        let mut inner = self.write()?;
        if !inner.tracks.contains_key(&track_id) {
            return Err(FindSimilarError::Storage(format!("unknown track {}", track_id)));
        }
        inner
            .models
            .entry(model.method())
            .or_default()
            .insert(track_id, model.to_bytes());
        Ok(())
    }

    fn model(&self, track_id: TrackId, method: AnalysisMethod) -> Result<Option<TrackModel>> {
        self.read()?
            .models
            .get(&method)
            .and_then(|table| table.get(&track_id))
            .map(|bytes| TrackModel::from_bytes(method, bytes, None))
            .transpose()
    }

    fn models(&self, method: AnalysisMethod) -> Result<Vec<(TrackId, TrackModel)>> {
        let inner = self.read()?;
        let Some(table) = inner.models.get(&method) else {
            return Ok(Vec::new());
        };
        table
            .iter()
            .map(|(&id, bytes)| Ok((id, TrackModel::from_bytes(method, bytes, None)?)))
            .collect()
    }
}

impl FingerprintStore for MemoryStore {
    fn add_fingerprints(&self, track_id: TrackId, fingerprints: &[Fingerprint]) -> Result<Vec<StoredFingerprint>> {
        let mut inner = self.write()?;
        if !inner.tracks.contains_key(&track_id) {
            return Err(FindSimilarError::Storage(format!("unknown track {}", track_id)));
        }
        let first_order = inner.track_fingerprints.get(&track_id).map_or(0, Vec::len) as u32;

        let mut stored = Vec::with_capacity(fingerprints.len());
        for (i, fingerprint) in fingerprints.iter().enumerate() {
            let id = inner.next_fingerprint_id;
            inner.next_fingerprint_id += 1;
            let entry = StoredFingerprint {
                id,
                track_id,
                order: first_order + i as u32,
                fingerprint: fingerprint.clone(),
            };
            inner.fingerprints.insert(id, entry.clone());
            inner.track_fingerprints.entry(track_id).or_default().push(id);
            stored.push(entry);
        }
        Ok(stored)
    }

    fn fingerprints_by_ids(&self, ids: &[FingerprintId]) -> Result<Vec<StoredFingerprint>> {
        let inner = self.read()?;
        Ok(ids.iter().filter_map(|id| inner.fingerprints.get(id).cloned()).collect())
    }

    fn fingerprints_for_track(&self, track_id: TrackId) -> Result<Vec<StoredFingerprint>> {
        let inner = self.read()?;
        Ok(inner
            .track_fingerprints
            .get(&track_id)
            .map(|ids| ids.iter().filter_map(|id| inner.fingerprints.get(id).cloned()).collect())
            .unwrap_or_default())
    }
}

impl HashBinStore for MemoryStore {
    fn add_buckets(&self, buckets: &[HashBucket]) -> Result<()> {
        let mut inner = self.write()?;
        for bucket in buckets {
            inner.buckets.entry(bucket.bucket).or_default().push(*bucket);
        }
        Ok(())
    }

    fn buckets_matching(&self, buckets: &[u64]) -> Result<Vec<HashBucket>> {
        let inner = self.read()?;
        let mut wanted = buckets.to_vec();
        wanted.sort_unstable();
        wanted.dedup();
        Ok(wanted
            .iter()
            .filter_map(|b| inner.buckets.get(b))
            .flatten()
            .copied()
            .collect())
    }
}
