// src/core/model/neighbors.rs
//
// Nearest-neighbour ranking of stored models against one or more seeds.

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::track::SimilarityModel;
use crate::error::{FindSimilarError, Result};
use crate::storage::TrackId;

/// A model to search from; indexed seeds are excluded from the results
#[derive(Debug)]
pub struct Seed<'a, M> {
    pub model: &'a M,
    pub track_id: Option<TrackId>,
    pub duration_ms: Option<u64>,
}

/// A stored model that may be returned
#[derive(Debug)]
pub struct Candidate<'a, M> {
    pub track_id: TrackId,
    pub model: &'a M,
    pub duration_ms: u64,
}

impl<M> Clone for Seed<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for Seed<'_, M> {}

impl<M> Clone for Candidate<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for Candidate<'_, M> {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub track_id: TrackId,
    /// Mean absolute distance to the seeds
    pub distance: f64,
}

/// `true` when `duration` lies strictly within `band` (a fraction) of any seed duration
fn within_duration_band<M>(seeds: &[Seed<'_, M>], duration_ms: u64, band: f64) -> bool {
    let mut known = seeds.iter().filter_map(|s| s.duration_ms).peekable();
    if known.peek().is_none() {
        return true;
    }
    let d = duration_ms as f64;
    known.any(|seed| {
        let seed = seed as f64;
        seed * (1.0 - band) < d && d < seed * (1.0 + band)
    })
}

/// Rank `candidates` by mean absolute distance to `seeds`, closest first.
///
/// Ties are broken by track id. Candidates outside the duration band are
/// skipped before any distance is computed.
///
/// Candidates are a snapshot taken by the caller; tracks stored after it was
/// taken are not considered.
pub fn nearest_neighbors<M: SimilarityModel>(
    seeds: &[Seed<'_, M>],
    candidates: &[Candidate<'_, M>],
    duration_filter: Option<f64>,
    top_k: usize,
) -> Result<Vec<Neighbor>> {
    if seeds.is_empty() {
        return Err(FindSimilarError::InvalidConfig("nearest neighbours need at least one seed".into()));
    }

    let mut neighbors = candidates
        .par_iter()
        .filter(|c| !seeds.iter().any(|s| s.track_id == Some(c.track_id)))
        .filter(|c| duration_filter.map_or(true, |band| within_duration_band(seeds, c.duration_ms, band)))
        .map(|c| -> Result<Neighbor> {
            let mut total = 0.0;
            for seed in seeds {
                total += seed.model.distance(c.model)?.abs();
            }
            Ok(Neighbor {
                track_id: c.track_id,
                distance: total / seeds.len() as f64,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    neighbors.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(Ordering::Equal)
            .then(a.track_id.cmp(&b.track_id))
    });
    neighbors.truncate(top_k);
    Ok(neighbors)
}
