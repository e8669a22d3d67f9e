// src/core/lsh/minhash.rs
//
// Min-hash signatures of sparse fingerprints and their banding into LSH tables.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

use crate::config::LshConfig;
use crate::core::fingerprint::Fingerprint;
use crate::error::{FindSimilarError, Result};

/// One min-hash value per permutation
pub type MinHashSignature = Vec<u8>;

/// Min-hashing with a fixed, seeded permutation set.
///
/// Permutation `p` visits a random subset of bit positions in random order;
/// the hash is the step at which the first set bit is met, or the
/// permutation length when none is. Equal signature slots are therefore
/// an unbiased estimate of Jaccard similarity.
pub struct MinHasher {
    permutations: Vec<Vec<u32>>,
    permutation_length: usize,
    hash_tables: usize,
    keys_per_table: usize,
}

impl MinHasher {
    /// Generate `hash_tables * keys_per_table` permutations over `fingerprint_bits` positions
    pub fn new(config: &LshConfig, fingerprint_bits: usize) -> Result<Self> {
        if config.keys_per_table == 0 || config.keys_per_table > 8 || config.hash_tables == 0 {
            return Err(FindSimilarError::InvalidConfig(format!(
                "cannot band {} tables of {} keys into 64-bit buckets",
                config.hash_tables, config.keys_per_table
            )));
        }
        if config.permutation_length == 0
            || config.permutation_length > u8::MAX as usize
            || config.permutation_length > fingerprint_bits
        {
            return Err(FindSimilarError::InvalidConfig(format!(
                "permutation length {} invalid for {}-bit fingerprints",
                config.permutation_length, fingerprint_bits
            )));
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let permutations = (0..config.hash_tables * config.keys_per_table)
            .map(|_| {
                index::sample(&mut rng, fingerprint_bits, config.permutation_length)
                    .into_iter()
                    .map(|i| i as u32)
                    .collect()
            })
            .collect();

        Ok(Self {
            permutations,
            permutation_length: config.permutation_length,
            hash_tables: config.hash_tables,
            keys_per_table: config.keys_per_table,
        })
    }

    pub fn permutation_count(&self) -> usize {
        self.permutations.len()
    }

    pub fn hash_tables(&self) -> usize {
        self.hash_tables
    }

    pub fn permutations(&self) -> &[Vec<u32>] {
        &self.permutations
    }

    pub fn signature(&self, fingerprint: &Fingerprint) -> MinHashSignature {
        self.permutations
            .iter()
            .map(|perm| {
                perm.iter()
                    .position(|&bit| (bit as usize) < fingerprint.len() && fingerprint.get(bit as usize))
                    .unwrap_or(self.permutation_length) as u8
            })
            .collect()
    }

    /// Pack each table's consecutive keys into one bucket value (little-endian bytes)
    pub fn buckets(&self, signature: &[u8]) -> Vec<u64> {
        signature
            .chunks_exact(self.keys_per_table)
            .take(self.hash_tables)
            .map(|keys| {
                keys.iter()
                    .enumerate()
                    .fold(0u64, |acc, (k, &v)| acc | (v as u64) << (8 * k))
            })
            .collect()
    }

    /// Buckets of a fingerprint, one per table
    pub fn hash(&self, fingerprint: &Fingerprint) -> Vec<u64> {
        self.buckets(&self.signature(fingerprint))
    }
}

/// Fraction of equal signature slots
pub fn estimate_jaccard(a: &[u8], b: &[u8]) -> f64 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }
    a.iter().zip(b).filter(|(x, y)| x == y).count() as f64 / len as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(tables: usize, keys: usize) -> LshConfig {
        LshConfig {
            hash_tables: tables,
            keys_per_table: keys,
            ..LshConfig::default()
        }
    }

    #[test]
    fn test_permutations_are_seeded() {
        let a = MinHasher::new(&config(25, 4), 8192).unwrap();
        let b = MinHasher::new(&config(25, 4), 8192).unwrap();
        assert_eq!(a.permutation_count(), 100);
        assert_eq!(a.permutations(), b.permutations());
        assert!(a.permutations().iter().all(|p| p.len() == 255));
    }

    #[test]
    fn test_signature_of_empty_fingerprint() {
        let hasher = MinHasher::new(&config(2, 2), 512).unwrap();
        let sig = hasher.signature(&Fingerprint::new(512));
        assert_eq!(sig, vec![255; 4]);
    }

    #[test]
    fn test_signature_finds_first_set_bit() {
        let hasher = MinHasher::new(&config(1, 1), 512).unwrap();
        let perm = hasher.permutations()[0].clone();
        let mut fp = Fingerprint::new(512);
        fp.set(perm[10] as usize, true);
        fp.set(perm[40] as usize, true);
        assert_eq!(hasher.signature(&fp), vec![10]);
    }

    #[test]
    fn test_bucket_packing() {
        let hasher = MinHasher::new(&config(2, 3), 512).unwrap();
        let buckets = hasher.buckets(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(buckets, vec![0x030201, 0x060504]);
    }

    #[test]
    fn test_estimate_jaccard() {
        assert_eq!(estimate_jaccard(&[1, 2, 3, 4], &[1, 2, 0, 4]), 0.75);
        assert_eq!(estimate_jaccard(&[], &[]), 0.0);
    }

    #[test]
    fn test_rejects_wide_tables() {
        assert!(MinHasher::new(&config(4, 9), 8192).is_err());
        assert!(MinHasher::new(&config(4, 4), 100).is_err());
    }
}
