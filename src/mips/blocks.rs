//! H2-ALSH: norm-stratified blocks with a per-block Euclidean reduction.
//!
//! Points are sorted by descending norm and cut greedily into blocks whose
//! norms lie in `[b·M_j, M_j]`, where `M_j` is the block's largest norm and
//!
//! ```text
//! b = sqrt((c0⁴ - 1) / (c0⁴ - c))
//! ```
//!
//! ties the Euclidean ratio `c0` to the inner-product ratio `c`. Inside block
//! `j` every point gets one residual coordinate so all transformed points
//! share the norm `M_j`, and a scaled query `λq` with `λ = M_j / ||q||` turns
//! inner product into distance exactly:
//!
//! ```text
//! P(x) = [x, sqrt(M_j² - ||x||²)]       Q(q) = [λq, 0]
//! ||P(x) - Q(q)||² = 2 (M_j² - λ <x, q>)
//! ```
//!
//! A point beating the current k-th score `τ` therefore lies within
//! `R = sqrt(2 (M_j² - λτ))`, which bounds the range query.
//!
//! ## Strategies per block
//!
//! Blocks with at most `n_threshold` members are scanned; larger ones get
//! their own range index. Blocks are visited in descending `M_j` and the walk
//! stops as soon as `M_j · ||q|| <= τ`: by Cauchy–Schwarz no later block can
//! hold a better point.
//!
//! # References
//!
//! - Huang, Ma, Feng, Fang, Tung (2018). "Accurate and Fast Asymmetric
//!   Locality-Sensitive Hashing Scheme for Maximum Inner Product Search." KDD.

use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::distance::inner_product_bounded;
use crate::error::{MipsError, Result};
use crate::hash::Qalsh;
use crate::mips::{
    check_nn_ratio, check_search, external_id, positive_max_norm, seeded_rng, IndexStats,
    MipIndex,
};
use crate::points::PointSet;
use crate::range::RangeIndex;
use crate::topk::TopK;

/// Default maximum number of points per block.
pub const MAX_BLOCK: usize = 25_000;

/// Default block size above which a range index is built.
pub const N_THRESHOLD: usize = 1_000;

/// H2-ALSH parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockParams {
    /// Approximation ratio `c0 > 1` of the Euclidean search.
    pub nn_ratio: f32,
    /// Approximation ratio `c` in `(0, 1)` of the inner-product search.
    pub mip_ratio: f32,
    /// Maximum members per block.
    pub max_block: usize,
    /// Blocks larger than this are indexed; smaller ones are scanned.
    pub n_threshold: usize,
    /// RNG seed for the per-block range indexes.
    pub seed: Option<u64>,
}

impl Default for BlockParams {
    fn default() -> Self {
        Self {
            nn_ratio: 2.0,
            mip_ratio: 0.9,
            max_block: MAX_BLOCK,
            n_threshold: N_THRESHOLD,
            seed: None,
        }
    }
}

impl BlockParams {
    /// Lower norm ratio `b` of a block.
    pub fn ratio_bound(&self) -> Result<f32> {
        check_nn_ratio(self.nn_ratio)?;
        if !(self.mip_ratio > 0.0 && self.mip_ratio < 1.0) {
            return Err(MipsError::invalid(format!(
                "mip_ratio must lie in (0, 1), got {}",
                self.mip_ratio
            )));
        }
        let c0_4 = self.nn_ratio.powi(4);
        if c0_4 <= self.mip_ratio {
            return Err(MipsError::invalid(format!(
                "nn_ratio^4 ({c0_4}) must exceed mip_ratio ({})",
                self.mip_ratio
            )));
        }
        Ok(((c0_4 - 1.0) / (c0_4 - self.mip_ratio)).sqrt())
    }
}

/// A norm-bounded run of the sorted order.
#[derive(Debug, Clone)]
enum Block<R> {
    Scan {
        max_norm: f32,
        members: Range<usize>,
    },
    Indexed {
        max_norm: f32,
        members: Range<usize>,
        delegate: R,
    },
}

impl<R> Block<R> {
    fn max_norm(&self) -> f32 {
        match self {
            Block::Scan { max_norm, .. } | Block::Indexed { max_norm, .. } => *max_norm,
        }
    }

    fn members(&self) -> Range<usize> {
        match self {
            Block::Scan { members, .. } | Block::Indexed { members, .. } => members.clone(),
        }
    }
}

/// Read-only view of one block.
#[derive(Debug, Clone, Copy)]
pub struct BlockView<'a> {
    pub max_norm: f32,
    /// Original ids, norm-descending.
    pub member_ids: &'a [u32],
    pub indexed: bool,
}

/// H2-ALSH index.
#[derive(Debug, Clone)]
pub struct BlockPartitionedIndex<R = Qalsh> {
    points: Arc<PointSet>,
    /// Point ids sorted by descending norm; blocks are ranges of this.
    order: Vec<u32>,
    blocks: Vec<Block<R>>,
    max_norm: f32,
    ratio_bound: f32,
}

impl<R: RangeIndex> BlockPartitionedIndex<R> {
    pub fn new(points: Arc<PointSet>, params: BlockParams) -> Result<Self> {
        let b = params.ratio_bound()?;
        if params.max_block == 0 {
            return Err(MipsError::invalid("max_block must be greater than 0"));
        }
        let max_norm = positive_max_norm(points.max_norm())?;

        let n = points.len();
        let dim = points.dimension();
        let mut order: Vec<u32> = (0..n as u32).collect();
        order.sort_by(|&x, &y| {
            points
                .norm(y as usize)
                .total_cmp(&points.norm(x as usize))
                .then(x.cmp(&y))
        });

        let mut rng = seeded_rng(params.seed);
        let mut blocks = Vec::new();
        let mut i = 0;
        while i < n {
            let start = i;
            let block_max = points.norm(order[i] as usize);
            let block_min = block_max * b;
            i += 1;
            while i < n && i - start < params.max_block && points.norm(order[i] as usize) >= block_min
            {
                i += 1;
            }

            let members = start..i;
            if members.len() > params.n_threshold {
                let sq_max = block_max * block_max;
                let mut transformed = Vec::with_capacity(members.len() * (dim + 1));
                for &id in &order[members.clone()] {
                    let id = id as usize;
                    let norm = points.norm(id);
                    transformed.extend_from_slice(points.get(id));
                    transformed.push((sq_max - norm * norm).max(0.0).sqrt());
                }
                let delegate = R::build(dim + 1, transformed, params.nn_ratio, &mut rng)?;
                blocks.push(Block::Indexed {
                    max_norm: block_max,
                    members,
                    delegate,
                });
            } else {
                blocks.push(Block::Scan {
                    max_norm: block_max,
                    members,
                });
            }
        }

        debug!(
            n,
            d = dim,
            c0 = params.nn_ratio,
            c = params.mip_ratio,
            b,
            max_norm,
            num_blocks = blocks.len(),
            indexed = blocks
                .iter()
                .filter(|blk| matches!(blk, Block::Indexed { .. }))
                .count(),
            "built h2-alsh index"
        );
        Ok(Self {
            points,
            order,
            blocks,
            max_norm,
            ratio_bound: b,
        })
    }

    /// Lower norm ratio `b` used to cut blocks.
    pub fn ratio_bound(&self) -> f32 {
        self.ratio_bound
    }

    pub fn max_norm(&self) -> f32 {
        self.max_norm
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Blocks in visiting order (non-increasing `max_norm`).
    pub fn blocks(&self) -> impl Iterator<Item = BlockView<'_>> + '_ {
        self.blocks.iter().map(|block| BlockView {
            max_norm: block.max_norm(),
            member_ids: &self.order[block.members()],
            indexed: matches!(block, Block::Indexed { .. }),
        })
    }

    /// Score `id` and offer it to `list` unless the norm bound rules it out.
    #[inline]
    fn offer(&self, id: usize, query: &[f32], norm_q: f32, kip: f32, list: &mut TopK) -> f32 {
        match inner_product_bounded(kip, self.points.get(id), self.points.norm(id), query, norm_q) {
            Some(ip) => list.insert(ip, external_id(id)),
            None => kip,
        }
    }
}

impl<R: RangeIndex> MipIndex for BlockPartitionedIndex<R> {
    fn search_into(
        &self,
        top_k: usize,
        query: &[f32],
        norm_q: f32,
        list: &mut TopK,
    ) -> Result<()> {
        check_search(self.points.dimension(), top_k, query, norm_q)?;

        let mut kip = list.threshold();
        let mut scaled: Vec<f32> = Vec::new();

        for (j, block) in self.blocks.iter().enumerate() {
            let block_max = block.max_norm();
            if block_max * norm_q <= kip {
                trace!(block = j, of = self.blocks.len(), kip, "norm bound stops block walk");
                break;
            }

            match block {
                Block::Scan { members, .. } => {
                    for &id in &self.order[members.clone()] {
                        let id = id as usize;
                        if self.points.norm(id) * norm_q <= kip {
                            break;
                        }
                        kip = self.offer(id, query, norm_q, kip, list);
                    }
                }
                Block::Indexed {
                    members, delegate, ..
                } => {
                    let lambda = block_max / norm_q;
                    let radius = (2.0 * (block_max * block_max - lambda * kip)).sqrt();
                    scaled.clear();
                    scaled.extend(query.iter().map(|v| lambda * v));
                    scaled.push(0.0);

                    let ids = &self.order[members.clone()];
                    for local in delegate.range_query(top_k, radius, &scaled) {
                        let id = ids[local as usize] as usize;
                        if self.points.norm(id) * norm_q > kip {
                            kip = self.offer(id, query, norm_q, kip, list);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn dimension(&self) -> usize {
        self.points.dimension()
    }

    fn num_vectors(&self) -> usize {
        self.points.len()
    }

    fn stats(&self) -> IndexStats {
        let delegates: usize = self
            .blocks
            .iter()
            .map(|block| match block {
                Block::Indexed { delegate, .. } => delegate.size_bytes(),
                Block::Scan { .. } => 0,
            })
            .sum();
        IndexStats {
            num_vectors: self.points.len(),
            dimension: self.points.dimension(),
            size_bytes: self.order.len() * std::mem::size_of::<u32>() + delegates,
            algorithm: "H2-ALSH".to_string(),
        }
    }
}
