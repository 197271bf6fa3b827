//! Euclidean nearest-neighbor range search behind a trait.
//!
//! The asymmetric and block-partitioned indexes reduce inner-product search
//! to Euclidean search and hand the transformed points to a [`RangeIndex`].
//! [`Qalsh`](crate::hash::Qalsh) is the default; [`LinearScan`] answers the
//! same queries exactly and is what exhaustive configurations and tests use.

use rand::rngs::StdRng;

use crate::error::{MipsError, Result};
use crate::simd;
use crate::topk::TopK;

/// A (c-approximate) nearest-neighbor index answering radius-bounded queries.
pub trait RangeIndex: Sized {
    /// Index `points` (flat, `n × dimension`), owning them from now on.
    ///
    /// `ratio` is the approximation ratio `c > 1` of the Euclidean search.
    fn build(dimension: usize, points: Vec<f32>, ratio: f32, rng: &mut StdRng) -> Result<Self>;

    /// Up to `top_k` local indices, nearest first, among points within
    /// `radius` of `query` (subject to the approximation guarantee).
    ///
    /// `f32::INFINITY` means unbounded.
    fn range_query(&self, top_k: usize, radius: f32, query: &[f32]) -> Vec<u32>;

    /// Approximate heap footprint.
    fn size_bytes(&self) -> usize;
}

pub(crate) fn check_points(dimension: usize, points: &[f32]) -> Result<usize> {
    if dimension == 0 {
        return Err(MipsError::invalid("dimension must be greater than 0"));
    }
    if points.is_empty() {
        return Err(MipsError::EmptyIndex);
    }
    if points.len() % dimension != 0 {
        return Err(MipsError::invalid(format!(
            "buffer length {} is not a multiple of dimension {dimension}",
            points.len()
        )));
    }
    Ok(points.len() / dimension)
}

/// Exact range search by scanning every point.
#[derive(Debug, Clone)]
pub struct LinearScan {
    dimension: usize,
    points: Vec<f32>,
}

impl RangeIndex for LinearScan {
    fn build(dimension: usize, points: Vec<f32>, _ratio: f32, _rng: &mut StdRng) -> Result<Self> {
        check_points(dimension, &points)?;
        Ok(Self { dimension, points })
    }

    fn range_query(&self, top_k: usize, radius: f32, query: &[f32]) -> Vec<u32> {
        let mut best = TopK::new(top_k);
        for (i, p) in self.points.chunks_exact(self.dimension).enumerate() {
            let dist = simd::l2_distance(p, query);
            if dist <= radius || radius.is_nan() {
                best.insert(-dist, i as u32);
            }
        }
        best.iter().map(|n| n.id).collect()
    }

    fn size_bytes(&self) -> usize {
        self.points.len() * std::mem::size_of::<f32>()
    }
}
