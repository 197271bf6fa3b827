//! Error types for index construction and search.

use thiserror::Error;

/// Errors that can occur while building or querying an index.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MipsError {
    /// No points were supplied.
    #[error("index is empty")]
    EmptyIndex,

    /// A construction or query parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Vector length does not match the index dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Number of supplied norms differs from the number of points.
    #[error("norm count mismatch: {points} points, {norms} norms")]
    NormCountMismatch { points: usize, norms: usize },

    /// Query norm is zero or not finite, so it cannot be normalized.
    #[error("query norm must be finite and non-zero")]
    ZeroNormQuery,
}

pub type Result<T> = std::result::Result<T, MipsError>;

impl MipsError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}
