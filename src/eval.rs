//! Ground truth and recall for evaluating approximate results.

use std::collections::HashSet;

use crate::distance::inner_product;
use crate::mips::external_id;
use crate::points::PointSet;
use crate::topk::Neighbor;

/// Exact top-`k` by inner product, scoring every point.
///
/// Ids are 1-based and ordered like [`TopK`](crate::TopK): descending score,
/// lower id first on ties.
pub fn ground_truth(points: &PointSet, query: &[f32], k: usize) -> Vec<Neighbor> {
    let mut scored: Vec<Neighbor> = points
        .iter()
        .enumerate()
        .map(|(id, p)| Neighbor {
            id: external_id(id),
            score: inner_product(p, query),
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
    scored.truncate(k);
    scored
}

/// Fraction of the first `k` ground-truth ids present in the first `k`
/// retrieved ids.
pub fn recall_at_k(ground_truth: &[u32], retrieved: &[u32], k: usize) -> f32 {
    if k == 0 || ground_truth.is_empty() {
        return 0.0;
    }
    let gt: HashSet<u32> = ground_truth.iter().take(k).copied().collect();
    let hits = retrieved.iter().take(k).filter(|id| gt.contains(*id)).count();
    hits as f32 / gt.len().min(k) as f32
}
