//! Dense vector kernels.
//!
//! With the `innr` feature (default) the kernels come from `innr`, which
//! dispatches to AVX2/FMA or NEON at runtime. Without it a portable version
//! with four independent accumulators is compiled instead.
//!
//! ```rust
//! use amips::simd::{dot, norm};
//!
//! let a = [3.0_f32, 4.0];
//! assert!((dot(&a, &a) - 25.0).abs() < 1e-6);
//! assert!((norm(&a) - 5.0).abs() < 1e-6);
//! ```

#[cfg(feature = "innr")]
pub use innr::{dot, l2_distance, l2_distance_squared, norm};

#[cfg(not(feature = "innr"))]
mod portable {
    /// Lanes summed independently before the final reduction.
    const LANES: usize = 4;

    #[inline]
    fn fold4(a: &[f32], b: &[f32], term: impl Fn(f32, f32) -> f32) -> f32 {
        let n = a.len().min(b.len());
        let (a, b) = (&a[..n], &b[..n]);
        let mut acc = [0.0f32; LANES];
        let head = a.chunks_exact(LANES).zip(b.chunks_exact(LANES));
        for (xs, ys) in head {
            for lane in 0..LANES {
                acc[lane] += term(xs[lane], ys[lane]);
            }
        }
        let tail = n - n % LANES;
        let rest: f32 = a[tail..].iter().zip(&b[tail..]).map(|(&x, &y)| term(x, y)).sum();
        (acc[0] + acc[1]) + (acc[2] + acc[3]) + rest
    }

    /// Dot product; extra trailing elements of the longer slice are ignored.
    #[inline]
    #[must_use]
    pub fn dot(a: &[f32], b: &[f32]) -> f32 {
        fold4(a, b, |x, y| x * y)
    }

    /// Euclidean length.
    #[inline]
    #[must_use]
    pub fn norm(v: &[f32]) -> f32 {
        dot(v, v).sqrt()
    }

    /// Squared Euclidean distance.
    #[inline]
    #[must_use]
    pub fn l2_distance_squared(a: &[f32], b: &[f32]) -> f32 {
        fold4(a, b, |x, y| (x - y) * (x - y))
    }

    #[inline]
    #[must_use]
    pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
        l2_distance_squared(a, b).sqrt()
    }
}

#[cfg(not(feature = "innr"))]
pub use portable::*;
