//! Sign-random-projection signatures and Hamming ranking.
//!
//! Each of `K` Gaussian hyperplanes contributes one bit: `1` iff the vector
//! lies on its non-negative side. For two vectors at angle θ,
//!
//! ```text
//! P[bit_i(a) = bit_i(b)] = 1 - θ(a,b)/π
//! ```
//!
//! so the number of matching bits is an unbiased proxy for angular
//! similarity. Bits are packed 64 per word, most significant bit first, and
//! the trailing word is zero-padded. Comparison is XOR plus a population count
//! through a shared 16-bit lookup table.
//!
//! The index never computes inner products against the data at query time; it
//! only produces a candidate list for a caller to re-rank.
//!
//! # References
//!
//! - Charikar (2002). "Similarity estimation techniques from rounding algorithms."

use std::sync::LazyLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MipsError, Result};
use crate::simd;
use crate::topk::TopK;

/// Extra candidates returned beyond `top_k` to absorb hashing error.
pub const CANDIDATE_MARGIN: usize = 100;

/// Population count of every `u16`, built on first use and shared.
static POPCOUNT16: LazyLock<Box<[u8]>> =
    LazyLock::new(|| (0..=u16::MAX).map(|x| x.count_ones() as u8).collect());

/// Number of set bits in `x`, four table lookups.
#[inline]
pub fn popcount64(x: u64) -> u32 {
    let table = &*POPCOUNT16;
    table[(x & 0xffff) as usize] as u32
        + table[((x >> 16) & 0xffff) as usize] as u32
        + table[((x >> 32) & 0xffff) as usize] as u32
        + table[((x >> 48) & 0xffff) as usize] as u32
}

#[inline]
fn words_for(bits: usize) -> usize {
    bits.div_ceil(64)
}

/// A packed `K`-bit hash code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    words: Vec<u64>,
    bits: usize,
}

impl Signature {
    /// Pack booleans, bit `i` of the code landing at position `63 - i % 64` of
    /// word `i / 64`.
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut words = vec![0u64; words_for(bits.len())];
        for (i, _) in bits.iter().enumerate().filter(|(_, b)| **b) {
            words[i / 64] |= 1u64 << (63 - i % 64);
        }
        Self {
            words,
            bits: bits.len(),
        }
    }

    /// Bit `i` of the code.
    #[inline]
    pub fn bit(&self, i: usize) -> bool {
        (self.words[i / 64] >> (63 - i % 64)) & 1 == 1
    }

    /// Unpack back into booleans.
    pub fn to_bits(&self) -> Vec<bool> {
        (0..self.bits).map(|i| self.bit(i)).collect()
    }

    pub fn num_bits(&self) -> usize {
        self.bits
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Count of equal bits against a packed code of the same length.
    #[inline]
    pub fn hamming_similarity(&self, other: &[u64]) -> u32 {
        hamming_similarity(self.bits, &self.words, other)
    }
}

/// Bits past `bits` in the trailing word are masked off on both sides, so a
/// foreign code with a dirty tail cannot push the count below zero.
#[inline]
fn hamming_similarity(bits: usize, a: &[u64], b: &[u64]) -> u32 {
    let tail = bits % 64;
    let last = a.len().saturating_sub(1);
    let differing: u32 = a
        .iter()
        .zip(b.iter())
        .enumerate()
        .map(|(i, (x, y))| {
            let diff = x ^ y;
            if i == last && tail != 0 {
                popcount64(diff & (u64::MAX << (64 - tail)))
            } else {
                popcount64(diff)
            }
        })
        .sum();
    (bits as u32).saturating_sub(differing)
}

/// Signature index parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureParams {
    /// Number of hyperplanes `K` (signature length in bits).
    pub num_bits: usize,
    /// Oversampling beyond `top_k` when ranking.
    pub candidate_margin: usize,
    /// RNG seed for the projection basis; `None` draws one from entropy.
    pub seed: Option<u64>,
}

impl Default for SignatureParams {
    fn default() -> Self {
        Self {
            num_bits: 64,
            candidate_margin: CANDIDATE_MARGIN,
            seed: None,
        }
    }
}

/// Random-hyperplane signature index.
#[derive(Debug, Clone)]
pub struct SignatureHashIndex {
    dimension: usize,
    num_points: usize,
    num_bits: usize,
    words_per_code: usize,
    candidate_margin: usize,
    /// `K` Gaussian vectors, row-major `K × d`.
    projections: Vec<f32>,
    /// One packed code per point, row-major `n × words_per_code`.
    signatures: Vec<u64>,
}

impl SignatureHashIndex {
    /// Hash every row of `data` (flat, `n × dimension`).
    pub fn new(dimension: usize, data: &[f32], params: SignatureParams) -> Result<Self> {
        if params.num_bits == 0 {
            return Err(MipsError::invalid("num_bits must be greater than 0"));
        }
        if dimension == 0 {
            return Err(MipsError::invalid("dimension must be greater than 0"));
        }
        let seed = params.seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = StdRng::seed_from_u64(seed);
        let projections: Vec<f32> = (0..params.num_bits * dimension)
            .map(|_| rng.sample::<f32, _>(StandardNormal))
            .collect();
        Self::with_projections(dimension, data, projections, params)
    }

    /// Hash every row of `data` against an explicit projection basis
    /// (`params.num_bits × dimension`, row-major).
    pub fn with_projections(
        dimension: usize,
        data: &[f32],
        projections: Vec<f32>,
        params: SignatureParams,
    ) -> Result<Self> {
        let num_bits = params.num_bits;
        if num_bits == 0 || dimension == 0 {
            return Err(MipsError::invalid("num_bits and dimension must be positive"));
        }
        if projections.len() != num_bits * dimension {
            return Err(MipsError::DimensionMismatch {
                expected: num_bits * dimension,
                actual: projections.len(),
            });
        }
        if data.is_empty() {
            return Err(MipsError::EmptyIndex);
        }
        if data.len() % dimension != 0 {
            return Err(MipsError::invalid(format!(
                "data length {} is not a multiple of dimension {dimension}",
                data.len()
            )));
        }

        let num_points = data.len() / dimension;
        let words_per_code = words_for(num_bits);
        let mut index = Self {
            dimension,
            num_points,
            num_bits,
            words_per_code,
            candidate_margin: params.candidate_margin,
            projections,
            signatures: Vec::with_capacity(num_points * words_per_code),
        };

        let mut words = vec![0u64; words_per_code];
        for point in data.chunks_exact(dimension) {
            index.hash_into(point, &mut words);
            index.signatures.extend_from_slice(&words);
        }

        debug!(
            n = num_points,
            d = dimension,
            k = num_bits,
            words = words_per_code,
            "built signature index"
        );
        Ok(index)
    }

    /// Packed hash code of `v` written into `out` (`words_per_code` words).
    fn hash_into(&self, v: &[f32], out: &mut [u64]) {
        out.fill(0);
        for (i, proj) in self.projections.chunks_exact(self.dimension).enumerate() {
            if simd::dot(proj, v) >= 0.0 {
                out[i / 64] |= 1u64 << (63 - i % 64);
            }
        }
    }

    /// Signature of an arbitrary vector under this basis.
    pub fn hash(&self, v: &[f32]) -> Result<Signature> {
        if v.len() != self.dimension {
            return Err(MipsError::DimensionMismatch {
                expected: self.dimension,
                actual: v.len(),
            });
        }
        let mut words = vec![0u64; self.words_per_code];
        self.hash_into(v, &mut words);
        Ok(Signature {
            words,
            bits: self.num_bits,
        })
    }

    /// Stored signature of point `id`.
    pub fn signature(&self, id: usize) -> Signature {
        Signature {
            words: self.code(id).to_vec(),
            bits: self.num_bits,
        }
    }

    #[inline]
    fn code(&self, id: usize) -> &[u64] {
        let start = id * self.words_per_code;
        &self.signatures[start..start + self.words_per_code]
    }

    /// Candidate ids ranked by descending Hamming similarity to `query`.
    ///
    /// Returns `min(n, top_k + candidate_margin)` ids.
    pub fn rank(&self, top_k: usize, query: &[f32]) -> Result<Vec<u32>> {
        let code = self.hash(query)?;
        let mut list = TopK::new(top_k.saturating_add(self.candidate_margin));
        for id in 0..self.num_points {
            let matched = code.hamming_similarity(self.code(id));
            list.insert(matched as f32, id as u32);
        }
        Ok(list.iter().map(|n| n.id).collect())
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub(crate) fn size_bytes(&self) -> usize {
        self.projections.len() * std::mem::size_of::<f32>()
            + self.signatures.len() * std::mem::size_of::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_data(n: usize, dim: usize, seed: u64) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n * dim).map(|_| rng.random::<f32>() * 2.0 - 1.0).collect()
    }

    fn params(num_bits: usize) -> SignatureParams {
        SignatureParams {
            num_bits,
            seed: Some(7),
            ..Default::default()
        }
    }

    #[test]
    fn popcount_matches_count_ones() {
        for x in [0u64, 1, u64::MAX, 0xdead_beef_cafe_babe, 1 << 63] {
            assert_eq!(popcount64(x), x.count_ones());
        }
    }

    #[test]
    fn compression_round_trip() {
        for k in [64usize, 128, 100, 1, 65] {
            let bits: Vec<bool> = (0..k).map(|i| (i * 7 + i / 3) % 5 < 2).collect();
            let sig = Signature::from_bits(&bits);
            assert_eq!(sig.words().len(), k.div_ceil(64));
            assert_eq!(sig.to_bits(), bits, "K = {k}");
        }
    }

    #[test]
    fn first_bit_is_most_significant() {
        let sig = Signature::from_bits(&[true, false, true]);
        assert_eq!(sig.words()[0], (1u64 << 63) | (1u64 << 61));
    }

    #[test]
    fn padding_bits_are_zero() {
        let sig = Signature::from_bits(&vec![true; 70]);
        assert_eq!(sig.words()[1], 0b111111u64 << 58);
    }

    #[test]
    fn rehashing_is_deterministic() {
        let dim = 12;
        let data = random_data(30, dim, 1);
        let index = SignatureHashIndex::new(dim, &data, params(100)).unwrap();
        for (id, point) in data.chunks_exact(dim).enumerate() {
            assert_eq!(index.hash(point).unwrap(), index.signature(id));
        }
    }

    #[test]
    fn same_seed_same_basis() {
        let dim = 8;
        let data = random_data(20, dim, 2);
        let a = SignatureHashIndex::new(dim, &data, params(70)).unwrap();
        let b = SignatureHashIndex::new(dim, &data, params(70)).unwrap();
        assert_eq!(a.signatures, b.signatures);
    }

    #[test]
    fn flipping_a_hyperplane_flips_its_bit() {
        let dim = 6;
        let k = 90;
        let flip = 67;
        let data = random_data(25, dim, 3);
        let mut rng = StdRng::seed_from_u64(4);
        let basis: Vec<f32> = (0..k * dim)
            .map(|_| rng.sample::<f32, _>(StandardNormal))
            .collect();
        let mut flipped = basis.clone();
        for x in &mut flipped[flip * dim..(flip + 1) * dim] {
            *x = -*x;
        }

        let a = SignatureHashIndex::with_projections(dim, &data, basis, params(k)).unwrap();
        let b = SignatureHashIndex::with_projections(dim, &data, flipped, params(k)).unwrap();
        for id in 0..25 {
            let (sa, sb) = (a.signature(id), b.signature(id));
            for bit in 0..k {
                if bit == flip {
                    assert_ne!(sa.bit(bit), sb.bit(bit));
                } else {
                    assert_eq!(sa.bit(bit), sb.bit(bit));
                }
            }
        }
    }

    #[test]
    fn point_ranks_itself_first() {
        let dim = 16;
        let data = random_data(200, dim, 5);
        let index = SignatureHashIndex::new(dim, &data, params(256)).unwrap();
        let query = &data[42 * dim..43 * dim];
        let ranked = index.rank(1, query).unwrap();
        let top = index.signature(ranked[0] as usize);
        assert_eq!(index.hash(query).unwrap().hamming_similarity(top.words()), 256);
    }

    #[test]
    fn rank_returns_margin_candidates() {
        let dim = 4;
        let data = random_data(300, dim, 6);
        let index = SignatureHashIndex::new(dim, &data, params(32)).unwrap();
        assert_eq!(index.rank(10, &data[..dim]).unwrap().len(), 10 + CANDIDATE_MARGIN);

        let small = SignatureHashIndex::new(dim, &data[..20 * dim], params(32)).unwrap();
        assert_eq!(small.rank(10, &data[..dim]).unwrap().len(), 20);
    }

    #[test]
    fn dirty_padding_in_other_code_is_ignored() {
        let sig = Signature::from_bits(&[true]);
        assert_eq!(sig.hamming_similarity(&[u64::MAX]), 1);
        assert_eq!(sig.hamming_similarity(&[0]), 0);

        let wide = Signature::from_bits(&vec![false; 70]);
        assert_eq!(wide.hamming_similarity(&[0, u64::MAX]), 64);
    }

    #[test]
    fn rank_with_huge_top_k_returns_every_point() {
        let dim = 4;
        let data = random_data(50, dim, 8);
        let index = SignatureHashIndex::new(dim, &data, params(32)).unwrap();
        assert_eq!(index.rank(usize::MAX, &data[..dim]).unwrap().len(), 50);
    }

    #[test]
    fn rejects_zero_bits() {
        let err = SignatureHashIndex::new(2, &[1.0, 0.0], params(0)).unwrap_err();
        assert!(matches!(err, MipsError::InvalidParameter(_)));
    }
}
