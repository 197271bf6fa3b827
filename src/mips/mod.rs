//! Maximum inner product search indexes.
//!
//! Every index answers the same question, top-k by `<p, q>`, and differs in how
//! it avoids scoring all `n` points:
//!
//! | Index | Reduction | Candidate source |
//! |-------|-----------|------------------|
//! | [`SimpleTransformIndex`] | unit sphere, one extra coordinate | SRP signatures |
//! | [`AsymmetricNormIndex`] | scale + `m` norm powers (L2-ALSH) | Euclidean range index |
//! | [`BlockPartitionedIndex`] | norm blocks + residual (H2-ALSH) | per-block range index or scan |
//! | [`ExactIndex`] | none | norm-ordered scan |
//!
//! All of them re-rank candidates with the exact inner product and report
//! `(score, id + 1)` pairs through a [`TopK`] collector.
//!
//! ## Why inner product is hard
//!
//! Inner product is not a metric: `<p, p>` need not be the maximum of
//! `<p, ·>`, so triangle-inequality based pruning does not apply directly.
//! The transforms here append coordinates that encode `||p||`, after which
//! ordering by Euclidean distance agrees (approximately) with ordering by
//! inner product.

mod asymmetric;
mod blocks;
mod exact;
mod simple;

pub use asymmetric::{AsymmetricNormIndex, AsymmetricParams};
pub use blocks::{BlockParams, BlockPartitionedIndex, BlockView, MAX_BLOCK, N_THRESHOLD};
pub use exact::ExactIndex;
pub use simple::SimpleTransformIndex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{MipsError, Result};
use crate::points::check_query;
use crate::simd;
use crate::topk::{Neighbor, TopK};

/// Common contract of every inner-product index.
pub trait MipIndex {
    /// c-k-AMIP search.
    ///
    /// Inserts `(score, id + 1)` pairs into `list`. `norm_q` must be the L2 norm
    /// of `query`; a zero norm is rejected.
    fn search_into(&self, top_k: usize, query: &[f32], norm_q: f32, list: &mut TopK)
        -> Result<()>;

    /// Top-`top_k` results in descending score, with 1-based ids.
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Neighbor>> {
        let mut list = TopK::new(top_k);
        self.search_into(top_k, query, simd::norm(query), &mut list)?;
        Ok(list.into_vec())
    }

    /// Vector dimension.
    fn dimension(&self) -> usize;

    /// Number of indexed vectors.
    fn num_vectors(&self) -> usize;

    fn stats(&self) -> IndexStats;
}

/// Statistics about a built index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub num_vectors: usize,
    pub dimension: usize,
    pub size_bytes: usize,
    pub algorithm: String,
}

/// Id as reported to callers.
#[inline]
pub(crate) fn external_id(id: usize) -> u32 {
    id as u32 + 1
}

pub(crate) fn check_search(dimension: usize, top_k: usize, query: &[f32], norm_q: f32) -> Result<()> {
    if top_k == 0 {
        return Err(MipsError::invalid("top_k must be greater than 0"));
    }
    check_query(dimension, query, norm_q)
}

pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    let seed = seed.unwrap_or_else(|| rand::rng().random());
    StdRng::seed_from_u64(seed)
}

pub(crate) fn check_nn_ratio(nn_ratio: f32) -> Result<()> {
    if !nn_ratio.is_finite() || nn_ratio <= 1.0 {
        return Err(MipsError::invalid(format!(
            "nn_ratio must be finite and > 1, got {nn_ratio}"
        )));
    }
    Ok(())
}

pub(crate) fn positive_max_norm(max_norm: f32) -> Result<f32> {
    if max_norm > 0.0 {
        Ok(max_norm)
    } else {
        Err(MipsError::invalid("at least one point must have a non-zero norm"))
    }
}
