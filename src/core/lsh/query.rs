// src/core/lsh/query.rs
//
// Candidate retrieval through LSH buckets and per-track match statistics.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use log::debug;
use serde::{Deserialize, Serialize};

use super::minhash::MinHasher;
use crate::core::fingerprint::Fingerprint;
use crate::error::{FindSimilarError, Result};
use crate::storage::{FingerprintId, FingerprintStore, HashBinStore, HashBucket, TrackId};

/// Weight of the best single-fingerprint Hamming distance in the ranking score
const MIN_HAMMING_WEIGHT: f64 = 0.4;

/// A stored fingerprint that shares buckets with the query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PotentialMatch {
    pub fingerprint_id: FingerprintId,
    pub track_id: TrackId,
    /// Distinct tables in which the bucket matched
    pub votes: usize,
}

/// Group bucket rows by fingerprint and keep those hit in at least `threshold_tables` distinct tables.
///
/// `query_buckets[t]` is the query's bucket in table `t`; rows from another
/// table that happen to carry the same value do not count. A threshold of
/// 0 or 1 keeps every fingerprint that shares any bucket.
pub fn select_potential_matches(
    rows: &[HashBucket],
    query_buckets: &[u64],
    threshold_tables: usize,
) -> Vec<PotentialMatch> {
    let mut grouped: HashMap<FingerprintId, (TrackId, BTreeSet<u32>)> = HashMap::new();
    for row in rows {
        let matches_table = query_buckets
            .get(row.table as usize)
            .is_some_and(|&b| b == row.bucket);
        if !matches_table {
            continue;
        }
        grouped
            .entry(row.fingerprint_id)
            .or_insert_with(|| (row.track_id, BTreeSet::new()))
            .1
            .insert(row.table);
    }

    let mut matches: Vec<PotentialMatch> = grouped
        .into_iter()
        .filter(|(_, (_, tables))| tables.len() >= threshold_tables)
        .map(|(fingerprint_id, (track_id, tables))| PotentialMatch {
            fingerprint_id,
            track_id,
            votes: tables.len(),
        })
        .collect();
    matches.sort_by_key(|m| m.fingerprint_id);
    matches
}

/// Accumulated evidence that a stored track matches the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStats {
    pub track_id: TrackId,
    /// Sum of Hamming distances, each weighted by its table votes
    pub hamming_sum: usize,
    /// Sum of unweighted Hamming distances
    pub hamming_by_track: usize,
    pub occurrences: usize,
    pub total_votes: usize,
    pub min_hamming: usize,
    pub max_votes: usize,
    /// Best Jaccard similarity of any matched fingerprint
    pub similarity: f64,
}

impl QueryStats {
    fn new(track_id: TrackId) -> Self {
        Self {
            track_id,
            hamming_sum: 0,
            hamming_by_track: 0,
            occurrences: 0,
            total_votes: 0,
            min_hamming: usize::MAX,
            max_votes: 0,
            similarity: 0.0,
        }
    }

    fn record(&mut self, hamming: usize, votes: usize, jaccard: f64) {
        self.hamming_sum += hamming * votes;
        self.hamming_by_track += hamming;
        self.occurrences += 1;
        self.total_votes += votes;
        self.min_hamming = self.min_hamming.min(hamming);
        self.max_votes = self.max_votes.max(votes);
        self.similarity = self.similarity.max(jaccard);
    }

    /// Lower is better
    pub fn score(&self) -> f64 {
        if self.total_votes == 0 {
            return f64::INFINITY;
        }
        self.hamming_sum as f64 / self.total_votes as f64 + MIN_HAMMING_WEIGHT * self.min_hamming as f64
    }
}

/// Order by ascending score, then more table votes, then track id
pub fn rank_matches(mut stats: Vec<QueryStats>) -> Vec<QueryStats> {
    stats.sort_by(|a, b| {
        a.score()
            .partial_cmp(&b.score())
            .unwrap_or(Ordering::Equal)
            .then(b.max_votes.cmp(&a.max_votes))
            .then(a.track_id.cmp(&b.track_id))
    });
    stats
}

/// Why a query produced no matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InsufficientAudio,
    Decode,
    NoFingerprints,
    NoCandidates,
    MissingModel,
    DimensionMismatch,
    Storage,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFailure {
    pub reason: FailureReason,
    pub message: String,
}

impl From<&FindSimilarError> for QueryFailure {
    fn from(err: &FindSimilarError) -> Self {
        let reason = match err {
            FindSimilarError::InsufficientAudio { .. } => FailureReason::InsufficientAudio,
            FindSimilarError::Decode(_) | FindSimilarError::Io(_) => FailureReason::Decode,
            FindSimilarError::DimensionMismatch { .. } => FailureReason::DimensionMismatch,
            FindSimilarError::MissingModel(_) => FailureReason::MissingModel,
            FindSimilarError::Storage(_) | FindSimilarError::Json(_) => FailureReason::Storage,
            _ => FailureReason::Invalid,
        };
        Self {
            reason,
            message: err.to_string(),
        }
    }
}

/// Outcome of a single query: ranked matches, or an empty list and a reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub matches: Vec<QueryStats>,
    pub failure: Option<QueryFailure>,
}

impl QueryResponse {
    pub fn found(matches: Vec<QueryStats>) -> Self {
        if matches.is_empty() {
            return Self::failed(FailureReason::NoCandidates, "no stored fingerprint shares enough hash tables");
        }
        Self { matches, failure: None }
    }

    pub fn failed(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            matches: Vec::new(),
            failure: Some(QueryFailure {
                reason,
                message: message.into(),
            }),
        }
    }

    pub fn from_error(err: &FindSimilarError) -> Self {
        Self {
            matches: Vec::new(),
            failure: Some(err.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Looks up query fingerprints in a bucket store
pub struct LshQueryEngine<'a, S: ?Sized> {
    store: &'a S,
    hasher: &'a MinHasher,
}

impl<'a, S> LshQueryEngine<'a, S>
where
    S: HashBinStore + FingerprintStore + ?Sized,
{
    pub fn new(store: &'a S, hasher: &'a MinHasher) -> Self {
        Self { store, hasher }
    }

    /// Stored fingerprints sharing at least `threshold_tables` tables with `query`
    pub fn candidates(&self, query: &Fingerprint, threshold_tables: usize) -> Result<Vec<PotentialMatch>> {
        let buckets = self.hasher.hash(query);
        let rows = self.store.buckets_matching(&buckets)?;
        Ok(select_potential_matches(&rows, &buckets, threshold_tables))
    }

    /// Per-track statistics over all query fingerprints, best match first.
    ///
    /// Silent fingerprints carry no information and are skipped.
    pub fn query(&self, fingerprints: &[Fingerprint], threshold_tables: usize, top_k: usize) -> Result<Vec<QueryStats>> {
        let mut stats: HashMap<TrackId, QueryStats> = HashMap::new();
        let mut candidate_count = 0;

        for query in fingerprints.iter().filter(|f| !f.is_silent()) {
            let candidates = self.candidates(query, threshold_tables)?;
            if candidates.is_empty() {
                continue;
            }
            candidate_count += candidates.len();
            let ids: Vec<FingerprintId> = candidates.iter().map(|c| c.fingerprint_id).collect();
            let votes: HashMap<FingerprintId, usize> =
                candidates.iter().map(|c| (c.fingerprint_id, c.votes)).collect();

            for stored in self.store.fingerprints_by_ids(&ids)? {
                let v = votes.get(&stored.id).copied().unwrap_or(0);
                stats
                    .entry(stored.track_id)
                    .or_insert_with(|| QueryStats::new(stored.track_id))
                    .record(
                        query.hamming_distance(&stored.fingerprint),
                        v,
                        query.jaccard(&stored.fingerprint),
                    );
            }
        }

        debug!(
            "lsh query: {} fingerprints, {} candidates across {} tracks",
            fingerprints.len(),
            candidate_count,
            stats.len()
        );
        let mut ranked = rank_matches(stats.into_values().collect());
        ranked.truncate(top_k);
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(bucket: u64, table: u32, fingerprint_id: FingerprintId) -> HashBucket {
        HashBucket {
            bucket,
            table,
            track_id: (fingerprint_id / 10) as TrackId,
            fingerprint_id,
        }
    }

    #[test]
    fn test_select_counts_distinct_tables() {
        let query = [5, 6, 7];
        let rows = [row(5, 0, 1), row(6, 1, 1), row(7, 2, 1), row(5, 0, 2), row(6, 1, 20)];
        let all = select_potential_matches(&rows, &query, 0);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], PotentialMatch { fingerprint_id: 1, track_id: 0, votes: 3 });

        let strict = select_potential_matches(&rows, &query, 2);
        assert_eq!(strict.iter().map(|m| m.fingerprint_id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_select_ignores_other_tables() {
        // bucket value 5 stored under table 1 does not match the query's table-0 bucket
        let rows = [row(5, 1, 1)];
        assert!(select_potential_matches(&rows, &[5, 9], 1).is_empty());
    }

    #[test]
    fn test_threshold_zero_and_one_agree() {
        let query = [1, 2];
        let rows = [row(1, 0, 1), row(2, 1, 2), row(2, 1, 1)];
        assert_eq!(
            select_potential_matches(&rows, &query, 0),
            select_potential_matches(&rows, &query, 1)
        );
    }

    #[test]
    fn test_stats_and_ranking() {
        let mut a = QueryStats::new(1);
        a.record(10, 4, 0.5);
        a.record(20, 2, 0.7);
        assert_eq!(a.hamming_sum, 80);
        assert_eq!(a.hamming_by_track, 30);
        assert_eq!(a.total_votes, 6);
        assert_eq!(a.min_hamming, 10);
        assert_eq!(a.max_votes, 4);
        assert!((a.similarity - 0.7).abs() < 1e-12);

        let mut b = QueryStats::new(2);
        b.record(2, 1, 0.9);
        let ranked = rank_matches(vec![a, b]);
        assert_eq!(ranked[0].track_id, 2);
    }

    #[test]
    fn test_ranking_tie_breaks() {
        let mut a = QueryStats::new(7);
        a.record(4, 1, 0.1);
        let mut b = QueryStats::new(3);
        b.record(4, 1, 0.1);
        let mut c = QueryStats::new(9);
        c.record(4, 2, 0.1);
        let ranked = rank_matches(vec![a, b, c]);
        assert_eq!(ranked.iter().map(|s| s.track_id).collect::<Vec<_>>(), vec![9, 3, 7]);
    }

    #[test]
    fn test_response_reasons() {
        assert_eq!(
            QueryResponse::found(Vec::new()).failure.map(|f| f.reason),
            Some(FailureReason::NoCandidates)
        );
        let err = FindSimilarError::InsufficientAudio { samples: 0, required: 4096 };
        let response = QueryResponse::from_error(&err);
        assert!(!response.is_success());
        assert_eq!(response.failure.unwrap().reason, FailureReason::InsufficientAudio);

        let response = QueryResponse::from_error(&FindSimilarError::MissingModel(4));
        assert_eq!(response.failure.unwrap().reason, FailureReason::MissingModel);
    }
}
