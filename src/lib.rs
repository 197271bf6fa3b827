//! amips: c-Approximate Maximum Inner Product Search.
//!
//! Given a fixed set of vectors, return the top-k by inner product with a
//! query, faster than scoring every vector, with a provable approximation
//! ratio. Four index families are provided, organized by how they reduce the
//! problem:
//!
//! - [`SignatureHashIndex`]: sign-random-projection signatures ranked by
//!   Hamming similarity (angular candidates, no inner products).
//! - [`SimpleTransformIndex`]: maps everything onto a unit sphere so angular
//!   ranking orders inner products, then re-ranks exactly.
//! - [`AsymmetricNormIndex`]: L2-ALSH, appends norm powers so Euclidean
//!   distance orders inner products, then queries a range index.
//! - [`BlockPartitionedIndex`]: H2-ALSH, norm-stratified blocks, each scanned
//!   or delegated to its own range index, with a global stopping rule.
//!
//! All indexes are built once and are read-only afterwards; concurrent queries
//! from several threads only need a shared reference.
//!
//! ```rust
//! use std::sync::Arc;
//! use amips::{BlockParams, BlockPartitionedIndex, MipIndex, PointSet};
//!
//! let points = Arc::new(PointSet::new(2, vec![3.0, 0.0, 0.0, 4.0, 1.0, 1.0]).unwrap());
//! let index: BlockPartitionedIndex = BlockPartitionedIndex::new(points, BlockParams::default()).unwrap();
//!
//! let best = index.search(&[1.0, 0.0], 1).unwrap();
//! assert_eq!(best[0].id, 1); // ids are reported 1-based
//! assert_eq!(best[0].score, 3.0);
//! ```
//!
//! # Critical Nuances
//!
//! ## Reported ids
//!
//! Point identity is the 0-based position in the [`PointSet`]; results are
//! reported as `id + 1`.
//!
//! ## Query norm
//!
//! The transforms divide by `||q||`. A zero or non-finite query norm is
//! rejected with [`MipsError::ZeroNormQuery`] rather than producing NaN scores.
//!
//! ## Exhaustive settings
//!
//! With `top_k = n` (and, for blocks, `n_threshold >= n`) every index
//! degenerates to an exact scan and returns the brute-force ranking.

pub mod distance;
pub mod error;
pub mod eval;
pub mod hash;
pub mod mips;
pub mod points;
pub mod range;
pub mod simd;
pub mod topk;

// Re-exports
pub use error::{MipsError, Result};
pub use hash::{Qalsh, SignatureHashIndex, SignatureParams};
pub use mips::{
    AsymmetricNormIndex, AsymmetricParams, BlockParams, BlockPartitionedIndex, ExactIndex,
    IndexStats, MipIndex, SimpleTransformIndex,
};
pub use points::PointSet;
pub use range::{LinearScan, RangeIndex};
pub use topk::{Neighbor, TopK};
