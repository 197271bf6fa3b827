//! L2-ALSH: asymmetric transforms from inner product to Euclidean distance.
//!
//! Points are scaled so the largest norm becomes `U < 1`, then `m` coordinates
//! holding successive squares of the scaled norm are appended; queries are
//! normalized and padded with `1/2`:
//!
//! ```text
//! P(x) = [S·x, ||S·x||², ||S·x||⁴, ..., ||S·x||^(2^m)],   S = U / M
//! Q(q) = [q / ||q||, 1/2, ..., 1/2]
//!
//! ||P(x) - Q(q)||² = 1 + m/4 - 2 S <x, q>/||q|| + ||S·x||^(2^(m+1))
//! ```
//!
//! The last term vanishes as `m` grows (`||S·x|| <= U < 1`), leaving the
//! distance a decreasing function of `<x, q>`.
//!
//! # References
//!
//! - Shrivastava & Li (2014). "Asymmetric LSH (ALSH) for Sublinear Time
//!   Maximum Inner Product Search (MIPS)." NeurIPS.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

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

/// Constant in every appended query coordinate.
const QUERY_PAD: f32 = 0.5;

/// L2-ALSH parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsymmetricParams {
    /// Number of appended norm-power coordinates `m`.
    pub extra_dims: usize,
    /// Target maximum norm after scaling, `U` in `(0, 1)`.
    pub scale: f32,
    /// Approximation ratio of the Euclidean search.
    pub nn_ratio: f32,
    /// RNG seed for the range index; `None` draws one from entropy.
    pub seed: Option<u64>,
}

impl Default for AsymmetricParams {
    fn default() -> Self {
        Self {
            extra_dims: 3,
            scale: 0.83,
            nn_ratio: 2.0,
            seed: None,
        }
    }
}

/// L2-ALSH index: one range index over all transformed points.
#[derive(Debug, Clone)]
pub struct AsymmetricNormIndex<R = Qalsh> {
    points: Arc<PointSet>,
    extra_dims: usize,
    scale: f32,
    max_norm: f32,
    nn: R,
}

/// Transformed point `[s·x, (s‖x‖)², (s‖x‖)⁴, ...]`.
fn transform_point(out: &mut Vec<f32>, x: &[f32], norm: f32, scale: f32, extra_dims: usize) {
    out.extend(x.iter().map(|v| v * scale));
    let mut power = norm * scale;
    for _ in 0..extra_dims {
        power *= power;
        out.push(power);
    }
}

impl<R: RangeIndex> AsymmetricNormIndex<R> {
    pub fn new(points: Arc<PointSet>, params: AsymmetricParams) -> Result<Self> {
        if params.extra_dims == 0 {
            return Err(MipsError::invalid("extra_dims must be greater than 0"));
        }
        if !(params.scale > 0.0 && params.scale < 1.0) {
            return Err(MipsError::invalid(format!(
                "scale must lie in (0, 1), got {}",
                params.scale
            )));
        }
        check_nn_ratio(params.nn_ratio)?;
        let max_norm = positive_max_norm(points.max_norm())?;

        let dim = points.dimension();
        let scale = params.scale / max_norm;
        let mut transformed = Vec::with_capacity(points.len() * (dim + params.extra_dims));
        for (id, x) in points.iter().enumerate() {
            transform_point(&mut transformed, x, points.norm(id), scale, params.extra_dims);
        }

        let mut rng = seeded_rng(params.seed);
        let nn = R::build(
            dim + params.extra_dims,
            transformed,
            params.nn_ratio,
            &mut rng,
        )?;

        debug!(
            n = points.len(),
            d = dim,
            m = params.extra_dims,
            u = params.scale,
            c0 = params.nn_ratio,
            max_norm,
            "built l2-alsh index"
        );
        Ok(Self {
            points,
            extra_dims: params.extra_dims,
            scale,
            max_norm,
            nn,
        })
    }

    pub fn max_norm(&self) -> f32 {
        self.max_norm
    }

    /// Factor `U / M` applied to every data point before the norm powers are
    /// appended.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Query-side transform `[q / ||q||, 1/2, ..., 1/2]`.
    fn transform_query(&self, query: &[f32], norm_q: f32) -> Vec<f32> {
        let mut out = Vec::with_capacity(query.len() + self.extra_dims);
        out.extend(query.iter().map(|v| v / norm_q));
        out.extend(std::iter::repeat(QUERY_PAD).take(self.extra_dims));
        out
    }
}

impl<R: RangeIndex> MipIndex for AsymmetricNormIndex<R> {
    fn search_into(
        &self,
        top_k: usize,
        query: &[f32],
        norm_q: f32,
        list: &mut TopK,
    ) -> Result<()> {
        check_search(self.points.dimension(), top_k, query, norm_q)?;

        let transformed = self.transform_query(query, norm_q);
        let candidates = self.nn.range_query(top_k, f32::INFINITY, &transformed);

        let mut kip = list.threshold();
        for id in candidates {
            let id = id as usize;
            let norm = self.points.norm(id);
            if norm * norm_q <= kip {
                break;
            }
            if let Some(ip) =
                inner_product_bounded(kip, self.points.get(id), norm, query, norm_q)
            {
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
            size_bytes: self.nn.size_bytes(),
            algorithm: "L2-ALSH".to_string(),
        }
    }
}
