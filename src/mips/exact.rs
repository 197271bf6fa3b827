//! Exact inner product search by a norm-ordered scan.
//!
//! Visiting points in descending norm lets the scan stop at the first point
//! with `||p|| · ||q|| <= τ`; everything after it is bounded by the same
//! product. Used as ground truth and as the baseline in benches.

use std::sync::Arc;

use crate::distance::inner_product_bounded;
use crate::error::Result;
use crate::mips::{check_search, external_id, IndexStats, MipIndex};
use crate::points::PointSet;
use crate::topk::TopK;

#[derive(Debug, Clone)]
pub struct ExactIndex {
    points: Arc<PointSet>,
    /// Point ids sorted by descending norm.
    order: Vec<u32>,
}

impl ExactIndex {
    pub fn new(points: Arc<PointSet>) -> Self {
        let mut order: Vec<u32> = (0..points.len() as u32).collect();
        order.sort_by(|&x, &y| {
            points
                .norm(y as usize)
                .total_cmp(&points.norm(x as usize))
                .then(x.cmp(&y))
        });
        Self { points, order }
    }
}

impl MipIndex for ExactIndex {
    fn search_into(
        &self,
        top_k: usize,
        query: &[f32],
        norm_q: f32,
        list: &mut TopK,
    ) -> Result<()> {
        check_search(self.points.dimension(), top_k, query, norm_q)?;

        let mut kip = list.threshold();
        for &id in &self.order {
            let id = id as usize;
            let norm = self.points.norm(id);
            if norm * norm_q <= kip {
                break;
            }
            if let Some(ip) = inner_product_bounded(kip, self.points.get(id), norm, query, norm_q) {
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
            size_bytes: self.points.size_bytes() + self.order.len() * std::mem::size_of::<u32>(),
            algorithm: "Exact".to_string(),
        }
    }
}
