//! Query-aware LSH (QALSH) for c-approximate Euclidean range search.
//!
//! Each of `m` hash functions is a Gaussian projection line `h(o) = a·o`.
//! Instead of fixing buckets at build time, the query's own projection is the
//! bucket center: a point collides with the query on line `i` at radius `r`
//! when `|h_i(o) - h_i(q)| <= w·r/2`. Points colliding on at least `l` lines
//! are verified with a true distance computation.
//!
//! Growing `r` by the ratio `c` (virtual rehashing) only widens a window over
//! each line's sorted table, so one index serves every radius.
//!
//! ```text
//! w  = sqrt(8c² ln c / (c² - 1))
//! p1 = 1 - 2Φ(-w/2)        collision probability at distance <= r
//! p2 = 1 - 2Φ(-w/(2c))     collision probability at distance >  c·r
//! ```
//!
//! # References
//!
//! - Huang, Feng, Zhang, Fang, Ng (2015). "Query-aware locality-sensitive
//!   hashing for approximate nearest neighbor search." VLDB.

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;
use tracing::debug;

use crate::error::{MipsError, Result};
use crate::hash::signature::CANDIDATE_MARGIN;
use crate::range::{check_points, RangeIndex};
use crate::simd;
use crate::topk::TopK;

/// Success probability target `δ = 1/e`.
const LN_INV_DELTA: f64 = 1.0;

/// Abramowitz & Stegun 7.1.26, max error 1.5e-7.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    sign * (1.0 - poly * (-x * x).exp())
}

fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Derived hashing parameters `(w, m, l)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QalshShape {
    /// Bucket width at radius 1.
    pub width: f32,
    /// Number of projection lines.
    pub num_lines: usize,
    /// Collisions needed before a point is verified.
    pub threshold: usize,
}

impl QalshShape {
    pub fn new(ratio: f32, num_points: usize, candidate_margin: usize) -> Self {
        let c = f64::from(ratio);
        let w = (8.0 * c * c * c.ln() / (c * c - 1.0)).sqrt();
        let p1 = 1.0 - 2.0 * normal_cdf(-w / 2.0);
        let p2 = 1.0 - 2.0 * normal_cdf(-w / (2.0 * c));

        let beta = (candidate_margin.max(1) as f64 / num_points.max(1) as f64).min(0.5);
        let ln_inv_beta = (2.0 / beta).ln();
        let eta = (ln_inv_beta / LN_INV_DELTA).sqrt();
        let alpha = (eta * p1 + p2) / (1.0 + eta);

        let gap = p1 - p2;
        let m = ((ln_inv_beta.sqrt() + LN_INV_DELTA.sqrt()).powi(2) / (2.0 * gap * gap)).ceil();
        let num_lines = (m as usize).max(1);
        let threshold = ((alpha * num_lines as f64).ceil() as usize).clamp(1, num_lines);

        Self {
            width: w as f32,
            num_lines,
            threshold,
        }
    }
}

/// One entry of a line's sorted projection table.
#[derive(Debug, Clone, Copy)]
struct Projected {
    value: f32,
    id: u32,
}

/// QALSH range index over owned points.
#[derive(Debug, Clone)]
pub struct Qalsh {
    dimension: usize,
    num_points: usize,
    ratio: f32,
    shape: QalshShape,
    candidate_margin: usize,
    /// `m` projection lines, row-major `m × d`.
    lines: Vec<f32>,
    /// `m` tables of `n` entries each, every table sorted by value.
    tables: Vec<Projected>,
    points: Vec<f32>,
}

/// Per-query collision bookkeeping.
struct Probe {
    freq: Vec<u32>,
    verified: Vec<bool>,
    best: TopK,
    checked: usize,
}

impl Qalsh {
    /// Build with an explicit candidate margin.
    pub fn with_margin(
        dimension: usize,
        points: Vec<f32>,
        ratio: f32,
        candidate_margin: usize,
        rng: &mut StdRng,
    ) -> Result<Self> {
        let num_points = check_points(dimension, &points)?;
        if !ratio.is_finite() || ratio <= 1.0 {
            return Err(MipsError::invalid(format!(
                "approximation ratio must be finite and > 1, got {ratio}"
            )));
        }
        let shape = QalshShape::new(ratio, num_points, candidate_margin);

        let lines: Vec<f32> = (0..shape.num_lines * dimension)
            .map(|_| rng.sample::<f32, _>(StandardNormal))
            .collect();

        let mut tables = Vec::with_capacity(shape.num_lines * num_points);
        for line in lines.chunks_exact(dimension) {
            let start = tables.len();
            tables.extend(
                points
                    .chunks_exact(dimension)
                    .enumerate()
                    .map(|(id, p)| Projected {
                        value: simd::dot(line, p),
                        id: id as u32,
                    }),
            );
            tables[start..].sort_by(|a, b| a.value.total_cmp(&b.value));
        }

        debug!(
            n = num_points,
            d = dimension,
            c = ratio,
            w = shape.width,
            m = shape.num_lines,
            l = shape.threshold,
            "built qalsh index"
        );

        Ok(Self {
            dimension,
            num_points,
            ratio,
            shape,
            candidate_margin,
            lines,
            tables,
            points,
        })
    }

    pub fn shape(&self) -> QalshShape {
        self.shape
    }

    #[inline]
    fn table(&self, line: usize) -> &[Projected] {
        let start = line * self.num_points;
        &self.tables[start..start + self.num_points]
    }

    #[inline]
    fn point(&self, id: usize) -> &[f32] {
        let start = id * self.dimension;
        &self.points[start..start + self.dimension]
    }

    fn collide(&self, probe: &mut Probe, id: u32, query: &[f32]) {
        let slot = id as usize;
        probe.freq[slot] += 1;
        if probe.freq[slot] as usize >= self.shape.threshold && !probe.verified[slot] {
            probe.verified[slot] = true;
            let dist = simd::l2_distance(self.point(slot), query);
            probe.best.insert(-dist, id);
            probe.checked += 1;
        }
    }
}

impl RangeIndex for Qalsh {
    fn build(dimension: usize, points: Vec<f32>, ratio: f32, rng: &mut StdRng) -> Result<Self> {
        Self::with_margin(dimension, points, ratio, CANDIDATE_MARGIN, rng)
    }

    fn range_query(&self, top_k: usize, radius: f32, query: &[f32]) -> Vec<u32> {
        if top_k == 0 || query.len() != self.dimension {
            return Vec::new();
        }
        let bound = if radius.is_finite() {
            radius.max(0.0)
        } else {
            f32::INFINITY
        };
        let n = self.num_points;
        let num_lines = self.shape.num_lines;

        let centers: Vec<f32> = self
            .lines
            .chunks_exact(self.dimension)
            .map(|line| simd::dot(line, query))
            .collect();
        // Window [left, right) of consumed entries on each line.
        let mut left: Vec<usize> = Vec::with_capacity(num_lines);
        let mut right: Vec<usize> = Vec::with_capacity(num_lines);
        for (line, &center) in centers.iter().enumerate() {
            let pos = self.table(line).partition_point(|e| e.value < center);
            left.push(pos);
            right.push(pos);
        }

        let mut probe = Probe {
            freq: vec![0; n],
            verified: vec![false; n],
            best: TopK::new(top_k),
            checked: 0,
        };

        let mut r = 1.0f32.min(bound);
        loop {
            let half = self.shape.width * r / 2.0;
            for (line, &center) in centers.iter().enumerate() {
                let table = self.table(line);
                while left[line] > 0 && center - table[left[line] - 1].value <= half {
                    left[line] -= 1;
                    self.collide(&mut probe, table[left[line]].id, query);
                }
                while right[line] < n && table[right[line]].value - center <= half {
                    self.collide(&mut probe, table[right[line]].id, query);
                    right[line] += 1;
                }
            }

            if probe.best.is_full() && -probe.best.threshold() <= self.ratio * r {
                break;
            }
            if probe.checked >= top_k.saturating_add(self.candidate_margin) {
                break;
            }
            if left.iter().all(|&l| l == 0) && right.iter().all(|&x| x == n) {
                break;
            }
            if r >= bound {
                break;
            }
            r = (r * self.ratio).min(bound);
        }

        probe.best.iter().map(|nb| nb.id).collect()
    }

    fn size_bytes(&self) -> usize {
        (self.lines.len() + self.points.len()) * std::mem::size_of::<f32>()
            + self.tables.len() * std::mem::size_of::<Projected>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn random_points(n: usize, dim: usize, seed: u64) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n * dim).map(|_| rng.random::<f32>() * 2.0 - 1.0).collect()
    }

    #[test]
    fn erf_reference_values() {
        assert!(erf(0.0).abs() < 1e-7);
        assert!((erf(1.0) - 0.842_700_79).abs() < 1e-6);
        assert!((erf(-1.0) + 0.842_700_79).abs() < 1e-6);
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-7);
    }

    #[test]
    fn shape_is_sane() {
        let shape = QalshShape::new(2.0, 10_000, CANDIDATE_MARGIN);
        assert!((shape.width - 2.719).abs() < 1e-2);
        assert!(shape.num_lines > 10);
        assert!(shape.threshold >= 1 && shape.threshold <= shape.num_lines);
    }

    #[test]
    fn unbounded_query_with_k_equal_n_returns_everything_sorted() {
        let dim = 8;
        let n = 60;
        let points = random_points(n, dim, 1);
        let query = random_points(1, dim, 2);
        let mut rng = StdRng::seed_from_u64(3);
        let index = Qalsh::build(dim, points.clone(), 2.0, &mut rng).unwrap();

        let got = index.range_query(n, f32::INFINITY, &query);
        assert_eq!(got.len(), n);
        let dists: Vec<f32> = got
            .iter()
            .map(|&id| simd::l2_distance(&points[id as usize * dim..(id as usize + 1) * dim], &query))
            .collect();
        assert!(dists.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn finds_exact_duplicate() {
        let dim = 16;
        let n = 2_000;
        let points = random_points(n, dim, 4);
        let mut rng = StdRng::seed_from_u64(5);
        let index = Qalsh::build(dim, points.clone(), 2.0, &mut rng).unwrap();

        let target = 1234;
        let query = &points[target * dim..(target + 1) * dim];
        let got = index.range_query(1, f32::INFINITY, query);
        assert_eq!(got, vec![target as u32]);
    }

    #[test]
    fn huge_top_k_checks_every_point() {
        let dim = 6;
        let n = 40;
        let points = random_points(n, dim, 6);
        let query = random_points(1, dim, 7);
        let mut rng = StdRng::seed_from_u64(8);
        let index = Qalsh::build(dim, points, 2.0, &mut rng).unwrap();
        assert_eq!(index.range_query(usize::MAX, f32::INFINITY, &query).len(), n);
    }

    #[test]
    fn rejects_ratio_at_most_one() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(Qalsh::build(2, vec![1.0, 1.0], 1.0, &mut rng).is_err());
        assert!(Qalsh::build(2, vec![1.0, 1.0], f32::NAN, &mut rng).is_err());
    }
}
