//! Hash-based building blocks.
//!
//! | Module | Hash family | Answers |
//! |--------|-------------|---------|
//! | [`signature`] | sign random projection | Hamming-ranked candidates (angular) |
//! | [`qalsh`] | query-aware projection lines | c-approximate Euclidean range queries |

pub mod qalsh;
pub mod signature;

pub use qalsh::{Qalsh, QalshShape};
pub use signature::{
    popcount64, Signature, SignatureHashIndex, SignatureParams, CANDIDATE_MARGIN,
};
