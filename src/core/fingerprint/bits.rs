// src/core/fingerprint/bits.rs
//
// Fixed-length bit vectors used as fingerprints.

use serde::{Deserialize, Serialize};

use crate::error::FindSimilarError;

/// Binary fingerprint of one spectral image.
///
/// Each kept wavelet coefficient `i` sets bit `2i` when positive and bit
/// `2i + 1` when negative; everything else stays zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawFingerprint")]
pub struct Fingerprint {
    len: usize,
    words: Vec<u64>,
}

/// Unchecked serialized form of [`Fingerprint`]
#[derive(Deserialize)]
struct RawFingerprint {
    len: usize,
    words: Vec<u64>,
}

impl TryFrom<RawFingerprint> for Fingerprint {
    type Error = FindSimilarError;

    /// Word count must match `len` and no bit may be set past `len`
    fn try_from(raw: RawFingerprint) -> Result<Self, Self::Error> {
        let expected = raw.len.div_ceil(64);
        if raw.words.len() != expected {
            return Err(FindSimilarError::InvalidMatrix(format!(
                "fingerprint of {} bits needs {} words, got {}",
                raw.len,
                expected,
                raw.words.len()
            )));
        }
        let rest = raw.len % 64;
        if rest > 0 && raw.words[expected - 1] >> rest != 0 {
            return Err(FindSimilarError::InvalidMatrix(format!(
                "fingerprint sets bits beyond its length of {}",
                raw.len
            )));
        }
        Ok(Self {
            len: raw.len,
            words: raw.words,
        })
    }
}

impl Fingerprint {
    /// All-zero fingerprint of `len` bits
    pub fn new(len: usize) -> Self {
        Self {
            len,
            words: vec![0; len.div_ceil(64)],
        }
    }

    pub fn from_bools(bits: &[bool]) -> Self {
        let mut fp = Self::new(bits.len());
        for (i, _) in bits.iter().enumerate().filter(|(_, &b)| b) {
            fp.set(i, true);
        }
        fp
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `true` when no bit is set (silence yields such images)
    pub fn is_silent(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.len, "bit {} out of range for {} bits", index, self.len);
        (self.words[index / 64] >> (index % 64)) & 1 == 1
    }

    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < self.len, "bit {} out of range for {} bits", index, self.len);
        let mask = 1u64 << (index % 64);
        if value {
            self.words[index / 64] |= mask;
        } else {
            self.words[index / 64] &= !mask;
        }
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Indexes of set bits in ascending order
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(w, &word)| {
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(w * 64 + bit)
            })
        })
    }

    /// Number of differing bits; fingerprints of unequal length compare over the shorter one
    pub fn hamming_distance(&self, other: &Fingerprint) -> usize {
        let len = self.len.min(other.len);
        let full = len / 64;
        let mut distance: usize = self.words[..full]
            .iter()
            .zip(&other.words[..full])
            .map(|(a, b)| (a ^ b).count_ones() as usize)
            .sum();
        let rest = len % 64;
        if rest > 0 {
            let mask = (1u64 << rest) - 1;
            distance += ((self.words[full] ^ other.words[full]) & mask).count_ones() as usize;
        }
        distance
    }

    /// Jaccard similarity of the set bits; two empty sets compare as 0.0
    pub fn jaccard(&self, other: &Fingerprint) -> f64 {
        let (mut intersection, mut union) = (0usize, 0usize);
        for (a, b) in self.words.iter().zip(&other.words) {
            intersection += (a & b).count_ones() as usize;
            union += (a | b).count_ones() as usize;
        }
        let (short, long) = if self.words.len() < other.words.len() {
            (self, other)
        } else {
            (other, self)
        };
        union += long.words[short.words.len()..]
            .iter()
            .map(|w| w.count_ones() as usize)
            .sum::<usize>();

        if union == 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    }
}
