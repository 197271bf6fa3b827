//! Immutable point set shared by every index.

use crate::error::{MipsError, Result};
use crate::simd;

/// `n` vectors of dimension `d` in one contiguous buffer, plus their L2 norms.
///
/// Layout: `[v0_d0, v0_d1, ..., v0_dn, v1_d0, ...]`. A point's identity is its
/// 0-based position; indexes hold the set behind an `Arc` and never mutate it.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSet {
    data: Vec<f32>,
    norms: Vec<f32>,
    dimension: usize,
}

impl PointSet {
    /// Build from a flat buffer, computing norms.
    pub fn new(dimension: usize, data: Vec<f32>) -> Result<Self> {
        Self::check_shape(dimension, &data)?;
        let norms = data.chunks_exact(dimension).map(simd::norm).collect();
        Self::with_norms(dimension, data, norms)
    }

    /// Build from a flat buffer and caller-supplied norms.
    pub fn with_norms(dimension: usize, data: Vec<f32>, norms: Vec<f32>) -> Result<Self> {
        Self::check_shape(dimension, &data)?;
        let n = data.len() / dimension;
        if norms.len() != n {
            return Err(MipsError::NormCountMismatch {
                points: n,
                norms: norms.len(),
            });
        }
        if let Some(bad) = norms.iter().find(|x| !x.is_finite() || **x < 0.0) {
            return Err(MipsError::invalid(format!(
                "norms must be finite and non-negative, found {bad}"
            )));
        }
        Ok(Self {
            data,
            norms,
            dimension,
        })
    }

    /// Build from row vectors.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let dimension = rows.first().map(Vec::len).ok_or(MipsError::EmptyIndex)?;
        let mut data = Vec::with_capacity(rows.len() * dimension);
        for row in rows {
            if row.len() != dimension {
                return Err(MipsError::DimensionMismatch {
                    expected: dimension,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Self::new(dimension, data)
    }

    fn check_shape(dimension: usize, data: &[f32]) -> Result<()> {
        if dimension == 0 {
            return Err(MipsError::invalid("dimension must be greater than 0"));
        }
        if data.is_empty() {
            return Err(MipsError::EmptyIndex);
        }
        if data.len() % dimension != 0 {
            return Err(MipsError::invalid(format!(
                "buffer length {} is not a multiple of dimension {dimension}",
                data.len()
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.norms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.norms.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Vector `id`.
    #[inline]
    pub fn get(&self, id: usize) -> &[f32] {
        let start = id * self.dimension;
        &self.data[start..start + self.dimension]
    }

    /// Norm of vector `id`.
    #[inline]
    pub fn norm(&self, id: usize) -> f32 {
        self.norms[id]
    }

    pub fn norms(&self) -> &[f32] {
        &self.norms
    }

    /// Largest norm in the set.
    pub fn max_norm(&self) -> f32 {
        self.norms.iter().copied().fold(0.0, f32::max)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dimension)
    }

    pub(crate) fn size_bytes(&self) -> usize {
        (self.data.len() + self.norms.len()) * std::mem::size_of::<f32>()
    }
}

/// Validate a query against the index dimension and its precomputed norm.
pub(crate) fn check_query(dimension: usize, query: &[f32], norm_q: f32) -> Result<()> {
    if query.len() != dimension {
        return Err(MipsError::DimensionMismatch {
            expected: dimension,
            actual: query.len(),
        });
    }
    if !norm_q.is_finite() || norm_q <= 0.0 {
        return Err(MipsError::ZeroNormQuery);
    }
    Ok(())
}
