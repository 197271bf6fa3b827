//! Inner-product evaluation.
//!
//! Two flavours are provided:
//!
//! - [`inner_product`]: plain dot product, used when every score is needed.
//! - [`inner_product_bounded`]: used on the re-ranking path of every index. It
//!   gives up as soon as the Cauchy–Schwarz bound on the unread suffix proves
//!   the result cannot beat the current k-th best score.
//!
//! ## Pruning bound
//!
//! After consuming a prefix of `j` coordinates with partial sum `s_j`,
//!
//! ```text
//! <p, q> <= s_j + ||p[j..]|| * ||q[j..]||
//! ```
//!
//! and the suffix norms are recovered from the precomputed full norms as
//! `||p||² - ||p[..j]||²`, so no second pass over the data is needed.

use crate::simd;

/// Coordinates consumed between two bound checks.
const CHUNK: usize = 16;

/// Relative slack added to the suffix bound to absorb rounding in the
/// running norm subtraction.
const PRUNE_SLACK: f32 = 1e-4;

/// Exact inner product `<a, b>`.
#[inline]
#[must_use]
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    simd::dot(a, b)
}

/// Inner product that may stop early.
///
/// Returns `None` once the partial sum plus the Cauchy–Schwarz bound on the
/// remaining coordinates is `<= threshold`; the caller can then discard the
/// point without knowing its exact score. Otherwise returns the exact inner
/// product.
///
/// `point_norm` and `query_norm` must be the L2 norms of `point` and `query`.
#[must_use]
pub fn inner_product_bounded(
    threshold: f32,
    point: &[f32],
    point_norm: f32,
    query: &[f32],
    query_norm: f32,
) -> Option<f32> {
    let full_bound = point_norm * query_norm;
    if full_bound <= threshold {
        return None;
    }
    let slack = PRUNE_SLACK * full_bound;

    let mut ip = 0.0f32;
    let mut point_rest = point_norm * point_norm;
    let mut query_rest = query_norm * query_norm;
    let chunks = point.len().div_ceil(CHUNK);

    for (i, (pc, qc)) in point.chunks(CHUNK).zip(query.chunks(CHUNK)).enumerate() {
        for (&x, &y) in pc.iter().zip(qc.iter()) {
            ip += x * y;
            point_rest -= x * x;
            query_rest -= y * y;
        }
        if i + 1 == chunks {
            break;
        }
        let bound = (point_rest.max(0.0) * query_rest.max(0.0)).sqrt();
        if ip + bound + slack <= threshold {
            return None;
        }
    }
    Some(ip)
}
