// src/core/engine.rs
//
// High-level similarity API: ingest tracks, query neighbours and duplicates.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::analysis::FeatureExtractor;
use super::decoder::{resample, AudioDecoder, DecodedAudio, SymphoniaDecoder};
use super::fingerprint::{Fingerprint, FingerprintGenerator, StridePolicy};
use super::lsh::{FailureReason, LshQueryEngine, MinHasher, QueryResponse};
use super::model::{nearest_neighbors, Candidate, Neighbor, Seed, TrackModel};
use crate::config::{ConfigPreset, EngineConfig};
use crate::error::{FindSimilarError, Result};
use crate::storage::{HashBucket, MemoryStore, NewTrack, Store, Track, TrackId};

/// Immutable tables derived from one configuration, shared by every worker
pub struct EngineContext {
    config: EngineConfig,
    extractor: FeatureExtractor,
    generator: FingerprintGenerator,
    hasher: MinHasher,
}

impl EngineContext {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let extractor = FeatureExtractor::new(&config.scms)?;
        let generator = FingerprintGenerator::new(&config.fingerprint)?;
        let hasher = MinHasher::new(&config.lsh, config.fingerprint.fingerprint_bits())?;
        Ok(Self {
            config,
            extractor,
            generator,
            hasher,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn generator(&self) -> &FingerprintGenerator {
        &self.generator
    }

    pub fn hasher(&self) -> &MinHasher {
        &self.hasher
    }
}

/// Builder for Engine configuration
pub struct EngineBuilder {
    config: EngineConfig,
    store: Option<Arc<dyn Store>>,
    decoder: Option<Arc<dyn AudioDecoder>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            store: None,
            decoder: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn preset(mut self, preset: ConfigPreset) -> Self {
        self.config = EngineConfig::from_preset(preset);
        self
    }

    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn AudioDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn build(self) -> Result<Engine> {
        Ok(Engine {
            ctx: Arc::new(EngineContext::new(self.config)?),
            store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
            decoder: self.decoder.unwrap_or_else(|| Arc::new(SymphoniaDecoder::new())),
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Model and fingerprints computed for one track
#[derive(Debug, Clone)]
pub struct TrackAnalysis {
    /// `None` when the covariance could not be fitted
    pub model: Option<TrackModel>,
    pub fingerprints: Vec<Fingerprint>,
    pub duration_ms: u64,
}

/// Result of ingesting one track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexOutcome {
    pub track: Track,
    pub has_model: bool,
    /// Non-silent fingerprints written to the store
    pub fingerprints: usize,
}

/// Side-by-side comparison of two tracks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Distance between the two models, of the configured analysis method
    pub model_distance: Option<f64>,
    pub fingerprints: (usize, usize),
    /// Hamming distance of fingerprints taken at the same offset
    pub aligned_hamming: Vec<usize>,
    /// Best Jaccard similarity over aligned fingerprint pairs
    pub best_jaccard: f64,
}

impl Comparison {
    pub fn min_hamming(&self) -> Option<usize> {
        self.aligned_hamming.iter().copied().min()
    }
}

/// Audio similarity engine over a shared store
#[derive(Clone)]
pub struct Engine {
    ctx: Arc<EngineContext>,
    store: Arc<dyn Store>,
    decoder: Arc<dyn AudioDecoder>,
}

/// Take at most `max_seconds` of `audio` and bring it to `rate`
fn samples_at(audio: &DecodedAudio, rate: u32, max_seconds: Option<u32>) -> Result<Cow<'_, [f32]>> {
    let limit = max_seconds
        .filter(|&s| s > 0)
        .map_or(usize::MAX, |s| s as usize * audio.sample_rate as usize);
    let head = &audio.samples[..audio.samples.len().min(limit)];
    if audio.sample_rate == rate {
        Ok(Cow::Borrowed(head))
    } else {
        Ok(Cow::Owned(resample(head, audio.sample_rate, rate)?))
    }
}

impl Engine {
    /// Engine with the default preset, an empty in-memory store and the Symphonia decoder
    pub fn new() -> Result<Self> {
        EngineBuilder::new().build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    pub fn store(&self) -> &dyn Store {
        &*self.store
    }

    /// Decode a file at the fingerprint rate, long enough for both retrieval paths
    pub fn decode(&self, path: &Path) -> Result<DecodedAudio> {
        let fp = &self.ctx.config.fingerprint;
        let max_seconds = fp
            .seconds_to_analyze
            .map(|s| s.max(self.ctx.config.scms.seconds_to_analyze));
        self.decoder.decode(path, fp.sample_rate, max_seconds)
    }

    /// Statistical model of decoded audio, built by the configured analysis method
    pub fn track_model(&self, audio: &DecodedAudio) -> Result<TrackModel> {
        let scms = &self.ctx.config.scms;
        let samples = samples_at(audio, scms.sample_rate, Some(scms.seconds_to_analyze))?;
        let features = self.ctx.extractor.extract(&samples)?;
        TrackModel::fit(scms.method, &features)
    }

    /// Fingerprints of decoded audio cut with `stride`
    pub fn fingerprints(&self, audio: &DecodedAudio, stride: &StridePolicy) -> Result<Vec<Fingerprint>> {
        let fp = &self.ctx.config.fingerprint;
        let samples = samples_at(audio, fp.sample_rate, fp.seconds_to_analyze)?;
        self.ctx.generator.fingerprints_from_samples(&samples, stride)
    }

    /// Compute both signatures of a track.
    ///
    /// A recoverable failure on one path leaves that path empty; the track
    /// is rejected only when neither path produced anything usable.
    pub fn analyze(&self, audio: &DecodedAudio) -> Result<TrackAnalysis> {
        let model = match self.track_model(audio) {
            Err(e) if !e.is_recoverable() => return Err(e),
            other => other,
        };
        let fingerprints = match self.fingerprints(audio, &self.ctx.config.fingerprint.stride) {
            Ok(fps) => fps,
            Err(e) if e.is_recoverable() && model.is_ok() => {
                warn!("fingerprinting failed, keeping the model only: {}", e);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let audible = fingerprints.iter().any(|f| !f.is_silent());
        let model = match model {
            Ok(model) => Some(model),
            Err(e) if !audible => return Err(e),
            Err(e) => {
                warn!("no model, indexing fingerprints only: {}", e);
                None
            }
        };

        Ok(TrackAnalysis {
            model,
            fingerprints,
            duration_ms: audio.duration_ms,
        })
    }

    /// Ingest decoded audio as a new track
    pub fn index_audio(&self, path: PathBuf, digest: Option<String>, audio: &DecodedAudio) -> Result<IndexOutcome> {
        let analysis = self.analyze(audio)?;
        let track = self.store.add_track(NewTrack {
            path,
            duration_ms: analysis.duration_ms,
            tags: audio.tags.clone(),
            digest,
        })?;

        if let Some(model) = &analysis.model {
            self.store.put_model(track.id, model)?;
        }

        let audible: Vec<Fingerprint> = analysis
            .fingerprints
            .into_iter()
            .filter(|f| !f.is_silent())
            .collect();
        let stored = self.store.add_fingerprints(track.id, &audible)?;
        let rows: Vec<HashBucket> = stored
            .iter()
            .flat_map(|s| {
                self.ctx
                    .hasher
                    .hash(&s.fingerprint)
                    .into_iter()
                    .enumerate()
                    .map(move |(table, bucket)| HashBucket {
                        bucket,
                        table: table as u32,
                        track_id: s.track_id,
                        fingerprint_id: s.id,
                    })
            })
            .collect();
        self.store.add_buckets(&rows)?;

        info!(
            "indexed {} as track {} ({} fingerprints{})",
            track.path.display(),
            track.id,
            stored.len(),
            if analysis.model.is_some() { ", model" } else { "" }
        );
        Ok(IndexOutcome {
            has_model: analysis.model.is_some(),
            fingerprints: stored.len(),
            track,
        })
    }

    /// Decode and ingest one file
    pub fn index_file(&self, path: &Path, digest: Option<String>) -> Result<IndexOutcome> {
        let audio = self.decode(path)?;
        self.index_audio(path.to_path_buf(), digest, &audio)
    }

    /// Stored model of a track for the configured method, checked against the configured dimension
    pub fn stored_model(&self, track_id: TrackId) -> Result<Option<TrackModel>> {
        let model = self.store.model(track_id, self.ctx.config.scms.method)?;
        if let Some(model) = &model {
            self.check_dimension(model)?;
        }
        Ok(model)
    }

    fn check_dimension(&self, model: &TrackModel) -> Result<()> {
        let expected = self.ctx.config.scms.coefficients;
        if model.dimension() != expected {
            return Err(FindSimilarError::DimensionMismatch {
                expected,
                found: model.dimension(),
            });
        }
        Ok(())
    }

    /// Rank every stored model against already-indexed seeds.
    ///
    /// Reads are best-effort, not linearizable with concurrent ingestion: a
    /// seed indexed a moment ago may not have its model yet and fails with
    /// [`FindSimilarError::MissingModel`], and candidates stored while the
    /// ranking runs are not considered.
    pub fn similar_tracks(&self, seed_ids: &[TrackId]) -> Result<Vec<Neighbor>> {
        let mut seed_models = Vec::with_capacity(seed_ids.len());
        for &id in seed_ids {
            let track = self
                .store
                .track(id)?
                .ok_or_else(|| FindSimilarError::Storage(format!("unknown track {}", id)))?;
            let model = self.stored_model(id)?.ok_or(FindSimilarError::MissingModel(id))?;
            seed_models.push((id, track.duration_ms, model));
        }
        let seeds: Vec<Seed<'_, TrackModel>> = seed_models
            .iter()
            .map(|(id, duration_ms, model)| Seed {
                model,
                track_id: Some(*id),
                duration_ms: Some(*duration_ms),
            })
            .collect();
        self.rank_against_store(&seeds)
    }

    /// Rank stored models against a track that is not in the store
    pub fn similar_to_audio(&self, audio: &DecodedAudio) -> Result<Vec<Neighbor>> {
        let model = self.track_model(audio)?;
        let seed = Seed {
            model: &model,
            track_id: None,
            duration_ms: Some(audio.duration_ms),
        };
        self.rank_against_store(&[seed])
    }

    pub fn similar_to_file(&self, path: &Path) -> Result<Vec<Neighbor>> {
        self.similar_to_audio(&self.decode(path)?)
    }

    fn rank_against_store(&self, seeds: &[Seed<'_, TrackModel>]) -> Result<Vec<Neighbor>> {
        let durations: HashMap<TrackId, u64> = self
            .store
            .tracks()?
            .into_iter()
            .map(|t| (t.id, t.duration_ms))
            .collect();
        let method = self.ctx.config.scms.method;
        let models = self.store.models(method)?;
        for (_, model) in &models {
            self.check_dimension(model)?;
        }
        let candidates: Vec<Candidate<'_, TrackModel>> = models
            .iter()
            .map(|(id, model)| Candidate {
                track_id: *id,
                model,
                duration_ms: durations.get(id).copied().unwrap_or(0),
            })
            .collect();

        let query = &self.ctx.config.query;
        let neighbors = nearest_neighbors(seeds, &candidates, query.duration_filter, query.top_k)?;
        debug!(
            "{} query: {} seeds against {} models -> {} neighbours",
            method.name(),
            seeds.len(),
            candidates.len(),
            neighbors.len()
        );
        Ok(neighbors)
    }

    /// LSH lookup of decoded audio with the configured table threshold
    pub fn match_audio(&self, audio: &DecodedAudio) -> QueryResponse {
        self.match_audio_with(audio, self.ctx.config.query.threshold_tables)
    }

    /// LSH lookup of decoded audio, keeping candidates hit in `threshold_tables` tables.
    ///
    /// The store is read without a snapshot, so results are best-effort and
    /// not linearizable with concurrent ingestion: a track being indexed may
    /// be missing or match on only the fingerprints written so far.
    pub fn match_audio_with(&self, audio: &DecodedAudio, threshold_tables: usize) -> QueryResponse {
        let config = &self.ctx.config;
        let stride = config.query.query_stride.as_ref().unwrap_or(&config.fingerprint.stride);
        let fingerprints = match self.fingerprints(audio, stride) {
            Ok(fps) => fps,
            Err(e) => return QueryResponse::from_error(&e),
        };
        if fingerprints.iter().all(|f| f.is_silent()) {
            return QueryResponse::failed(FailureReason::NoFingerprints, "query audio is silent");
        }

        let engine = LshQueryEngine::new(&*self.store, &self.ctx.hasher);
        match engine.query(&fingerprints, threshold_tables, config.query.top_k) {
            Ok(matches) => QueryResponse::found(matches),
            Err(e) => QueryResponse::from_error(&e),
        }
    }

    pub fn match_file(&self, path: &Path) -> QueryResponse {
        match self.decode(path) {
            Ok(audio) => self.match_audio(&audio),
            Err(e) => QueryResponse::from_error(&e),
        }
    }

    /// Model distance and aligned fingerprint overlap of two tracks
    pub fn compare(&self, a: &DecodedAudio, b: &DecodedAudio) -> Result<Comparison> {
        let a = self.analyze(a)?;
        let b = self.analyze(b)?;
        let model_distance = match (&a.model, &b.model) {
            (Some(x), Some(y)) => Some(x.distance(y)?.abs()),
            _ => None,
        };

        let pairs: Vec<(&Fingerprint, &Fingerprint)> = a.fingerprints.iter().zip(&b.fingerprints).collect();
        let aligned_hamming = pairs.iter().map(|(x, y)| x.hamming_distance(y)).collect();
        let best_jaccard = pairs.iter().map(|(x, y)| x.jaccard(y)).fold(0.0, f64::max);

        Ok(Comparison {
            model_distance,
            fingerprints: (a.fingerprints.len(), b.fingerprints.len()),
            aligned_hamming,
            best_jaccard,
        })
    }

    pub fn compare_files(&self, a: &Path, b: &Path) -> Result<Comparison> {
        self.compare(&self.decode(a)?, &self.decode(b)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisMethod, ConfigBuilder};
    use crate::storage::{FingerprintStore, ModelStore, TrackStore};
    use std::collections::BTreeMap;

    fn test_engine() -> Engine {
        let config = ConfigBuilder::from_preset(ConfigPreset::Default)
            .query_stride(None)
            .seconds_to_analyze(30)
            .build()
            .unwrap();
        EngineBuilder::new().config(config).build().unwrap()
    }

    /// Deterministic tone cluster with a slow amplitude envelope
    fn signal(seed: u32, seconds: usize) -> DecodedAudio {
        let rate = 44100;
        let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
        let mut partials = Vec::new();
        for _ in 0..6 {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            partials.push(150.0 + (state % 4000) as f32);
        }
        let samples = (0..rate * seconds)
            .map(|i| {
                let t = i as f32 / rate as f32;
                let envelope = 0.6 + 0.4 * (2.0 * std::f32::consts::PI * 0.7 * t + seed as f32).sin();
                partials
                    .iter()
                    .enumerate()
                    .map(|(k, f)| {
                        let gate = ((t * (k as f32 + 1.3)) as usize % 2) as f32;
                        0.08 * envelope * gate * (2.0 * std::f32::consts::PI * f * t).sin()
                    })
                    .sum()
            })
            .collect();
        DecodedAudio {
            samples,
            sample_rate: rate as u32,
            duration_ms: seconds as u64 * 1000,
            tags: BTreeMap::new(),
        }
    }

    #[test]
    fn test_index_and_match_same_audio() {
        let engine = test_engine();
        let a = signal(1, 10);
        let b = signal(2, 10);
        let ta = engine.index_audio("a.wav".into(), None, &a).unwrap();
        engine.index_audio("b.wav".into(), None, &b).unwrap();
        assert!(ta.has_model);
        assert!(ta.fingerprints > 0);

        let response = engine.match_audio(&a);
        assert!(response.is_success());
        assert_eq!(response.matches[0].track_id, ta.track.id);
        assert_eq!(response.matches[0].min_hamming, 0);
    }

    #[test]
    fn test_similar_tracks_excludes_seed() {
        let engine = test_engine();
        let ids: Vec<TrackId> = (1..=3)
            .map(|s| engine.index_audio(format!("{}.wav", s).into(), None, &signal(s, 6)).unwrap().track.id)
            .collect();
        let neighbors = engine.similar_tracks(&ids[..1]).unwrap();
        assert_eq!(neighbors.len(), 2);
        assert!(neighbors.iter().all(|n| n.track_id != ids[0]));
        assert!(neighbors[0].distance <= neighbors[1].distance);
    }

    #[test]
    fn test_silence_is_rejected_without_writes() {
        let engine = test_engine();
        let silence = DecodedAudio {
            samples: vec![0.0; 44100 * 5],
            sample_rate: 44100,
            duration_ms: 5000,
            tags: BTreeMap::new(),
        };
        let err = engine.index_audio("silence.wav".into(), None, &silence).unwrap_err();
        assert!(err.is_recoverable());
        assert!(engine.store().tracks().unwrap().is_empty());

        let response = engine.match_audio(&silence);
        assert_eq!(response.failure.unwrap().reason, FailureReason::NoFingerprints);
    }

    #[test]
    fn test_stored_dimension_mismatch_fails() {
        let engine = test_engine();
        let track = engine
            .store()
            .add_track(NewTrack {
                path: "odd.wav".into(),
                duration_ms: 1000,
                tags: BTreeMap::new(),
                digest: None,
            })
            .unwrap();
        let mut features = crate::core::dsp::Matrix::new(2, 10);
        for c in 0..10 {
            features[(0, c)] = c as f64;
            features[(1, c)] = ((c * 3) % 4) as f64;
        }
        engine
            .store()
            .put_model(track.id, &TrackModel::fit(AnalysisMethod::Scms, &features).unwrap())
            .unwrap();

        let err = engine.similar_to_audio(&signal(4, 4)).unwrap_err();
        assert!(matches!(err, FindSimilarError::DimensionMismatch { expected: 20, found: 2 }));
    }

    #[test]
    fn test_seed_without_model_is_a_typed_error() {
        let engine = test_engine();
        let bare = engine
            .store()
            .add_track(NewTrack {
                path: "bare.wav".into(),
                duration_ms: 6000,
                tags: BTreeMap::new(),
                digest: None,
            })
            .unwrap();
        let err = engine.similar_tracks(&[bare.id]).unwrap_err();
        assert!(matches!(err, FindSimilarError::MissingModel(id) if id == bare.id));
        assert!(!err.is_recoverable());

        let err = engine.similar_tracks(&[bare.id + 100]).unwrap_err();
        assert!(matches!(err, FindSimilarError::Storage(_)));
    }

    #[test]
    fn test_half_written_track_is_skipped_by_queries() {
        let engine = test_engine();
        let a = engine.index_audio("a.wav".into(), None, &signal(1, 6)).unwrap().track.id;

        // Track row and fingerprints written, model and buckets not yet
        let audio = signal(2, 6);
        let pending = engine
            .store()
            .add_track(NewTrack {
                path: "b.wav".into(),
                duration_ms: audio.duration_ms,
                tags: BTreeMap::new(),
                digest: None,
            })
            .unwrap();
        let fps = engine.fingerprints(&audio, &engine.config().fingerprint.stride).unwrap();
        engine.store().add_fingerprints(pending.id, &fps).unwrap();

        assert!(engine.similar_tracks(&[a]).unwrap().is_empty());
        assert!(matches!(
            engine.similar_tracks(&[pending.id]),
            Err(FindSimilarError::MissingModel(id)) if id == pending.id
        ));
        let response = engine.match_audio(&audio);
        assert!(response.matches.iter().all(|m| m.track_id != pending.id));
    }

    #[test]
    fn test_models_are_looked_up_by_method() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let config = |method| {
            ConfigBuilder::from_preset(ConfigPreset::Default)
                .analysis_method(method)
                .query_stride(None)
                .seconds_to_analyze(30)
                .build()
                .unwrap()
        };
        let scms = EngineBuilder::new()
            .config(config(AnalysisMethod::Scms))
            .store(store.clone())
            .build()
            .unwrap();
        let mandel = EngineBuilder::new()
            .config(config(AnalysisMethod::MandelEllis))
            .store(store.clone())
            .build()
            .unwrap();

        let first = scms.index_audio("1.wav".into(), None, &signal(1, 6)).unwrap().track.id;
        scms.index_audio("2.wav".into(), None, &signal(2, 6)).unwrap();
        assert_eq!(store.models(AnalysisMethod::Scms).unwrap().len(), 2);
        assert!(store.models(AnalysisMethod::MandelEllis).unwrap().is_empty());
        assert!(matches!(
            mandel.similar_tracks(&[first]),
            Err(FindSimilarError::MissingModel(id)) if id == first
        ));

        let third = mandel.index_audio("3.wav".into(), None, &signal(3, 6)).unwrap();
        assert!(third.has_model);
        assert_eq!(
            mandel.stored_model(third.track.id).unwrap().map(|m| m.method()),
            Some(AnalysisMethod::MandelEllis)
        );
        // Each engine only ranks models of its own method
        assert!(mandel.similar_tracks(&[third.track.id]).unwrap().is_empty());
        assert_eq!(scms.similar_tracks(&[first]).unwrap().len(), 1);

        let a = signal(5, 8);
        let comparison = mandel.compare(&a, &a.clone()).unwrap();
        assert!(comparison.model_distance.unwrap() < 1e-3);
    }

    #[test]
    fn test_compare_identical_audio() {
        let engine = test_engine();
        let a = signal(7, 8);
        let comparison = engine.compare(&a, &a.clone()).unwrap();
        assert!(comparison.model_distance.unwrap() < 1e-2);
        assert_eq!(comparison.min_hamming(), Some(0));
        assert!(comparison.aligned_hamming.iter().all(|&h| h == 0));
    }

    #[test]
    fn test_short_audio_reports_insufficient() {
        let engine = test_engine();
        let tiny = DecodedAudio {
            samples: vec![0.1; 100],
            sample_rate: 44100,
            duration_ms: 2,
            tags: BTreeMap::new(),
        };
        let response = engine.match_audio(&tiny);
        assert_eq!(response.failure.unwrap().reason, FailureReason::InsufficientAudio);
    }
}
