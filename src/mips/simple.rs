//! Simple-LSH: inner product search as angular search on a sphere.
//!
//! With `M = max ||x||`, points and queries are mapped to `d + 1` dimensions:
//!
//! ```text
//! P(x) = [x / M,  sqrt(1 - ||x||² / M²)]     (unit norm)
//! Q(q) = [q / ||q||,  0]                     (unit norm)
//! ```
//!
//! so `<P(x), Q(q)> = <x, q> / (M ||q||)`: the cosine between transformed
//! vectors is monotone in the original inner product, and sign random
//! projections rank it.
//!
//! # References
//!
//! - Neyshabur & Srebro (2015). "On Symmetric and Asymmetric LSHs for Inner
//!   Product Search." ICML.

use std::sync::Arc;

use tracing::debug;

use crate::distance::inner_product_bounded;
use crate::error::Result;
use crate::hash::{SignatureHashIndex, SignatureParams};
use crate::mips::{check_search, external_id, positive_max_norm, IndexStats, MipIndex};
use crate::points::PointSet;
use crate::topk::TopK;

/// Simple-LSH index over a shared point set.
#[derive(Debug, Clone)]
pub struct SimpleTransformIndex {
    points: Arc<PointSet>,
    max_norm: f32,
    lsh: SignatureHashIndex,
}

impl SimpleTransformIndex {
    pub fn new(points: Arc<PointSet>, params: SignatureParams) -> Result<Self> {
        let max_norm = positive_max_norm(points.max_norm())?;
        let dim = points.dimension();

        let mut transformed = Vec::with_capacity(points.len() * (dim + 1));
        for (id, x) in points.iter().enumerate() {
            transformed.extend(x.iter().map(|v| v / max_norm));
            let ratio = points.norm(id) / max_norm;
            transformed.push((1.0 - ratio * ratio).max(0.0).sqrt());
        }
        let lsh = SignatureHashIndex::new(dim + 1, &transformed, params)?;

        debug!(
            n = points.len(),
            d = dim,
            k = lsh.num_bits(),
            max_norm,
            "built simple-lsh index"
        );
        Ok(Self {
            points,
            max_norm,
            lsh,
        })
    }

    pub fn max_norm(&self) -> f32 {
        self.max_norm
    }
}

impl MipIndex for SimpleTransformIndex {
    fn search_into(
        &self,
        top_k: usize,
        query: &[f32],
        norm_q: f32,
        list: &mut TopK,
    ) -> Result<()> {
        check_search(self.points.dimension(), top_k, query, norm_q)?;

        let mut transformed: Vec<f32> = query.iter().map(|v| v / norm_q).collect();
        transformed.push(0.0);
        let candidates = self.lsh.rank(top_k, &transformed)?;

        let mut kip = list.threshold();
        for id in candidates {
            let id = id as usize;
            if let Some(ip) = inner_product_bounded(
                kip,
                self.points.get(id),
                self.points.norm(id),
                query,
                norm_q,
            ) {
                kip = list.insert(ip, external_id(id));
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
        IndexStats {
            num_vectors: self.points.len(),
            dimension: self.points.dimension(),
            size_bytes: self.lsh.size_bytes(),
            algorithm: "Simple-LSH".to_string(),
        }
    }
}
