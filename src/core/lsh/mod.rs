//! MinHash locality-sensitive hashing over fingerprints
//!
//! Indexing turns each fingerprint into `hash_tables` bucket values; a query
//! fetches every stored fingerprint sharing a bucket and ranks the owning
//! tracks by Hamming distance and table votes.

mod minhash;
mod query;

pub use minhash::{estimate_jaccard, MinHashSignature, MinHasher};
pub use query::{
    rank_matches, select_potential_matches, FailureReason, LshQueryEngine, PotentialMatch, QueryFailure,
    QueryResponse, QueryStats,
};
