//! Bounded top-k collector.
//!
//! Every index funnels its scored candidates through [`TopK`]. The value
//! returned by [`TopK::insert`] is the current admission threshold, which the
//! callers feed back into their pruning tests (`norm(p) * norm(q) <= kth`).
//!
//! ## Ordering
//!
//! Entries are kept in descending score. On equal scores the lower id ranks
//! first, so the contents never depend on insertion order. A pair that ties
//! the current k-th score is admitted only if its id is lower than the k-th
//! entry's id.
//!
//! Pruning callers compare with `<=` against the threshold, so a candidate
//! that would only tie the k-th score can be skipped before it reaches the
//! collector.

use serde::{Deserialize, Serialize};

/// Threshold reported while the collector still has free slots.
pub const MINREAL: f32 = f32::MIN;

/// One search result: an inner-product score and a point id.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: u32,
    pub score: f32,
}

/// Fixed-capacity list of the `k` highest-scoring `(score, id)` pairs.
#[derive(Debug, Clone)]
pub struct TopK {
    capacity: usize,
    entries: Vec<Neighbor>,
}

#[inline]
fn ranks_before(a: &Neighbor, score: f32, id: u32) -> bool {
    a.score > score || (a.score == score && a.id < id)
}

impl TopK {
    /// Create an empty collector holding at most `capacity` entries.
    ///
    /// A zero-capacity collector admits nothing and reports `f32::MAX` as its
    /// threshold, so callers prune every candidate.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity.min(4096) + 1),
        }
    }

    /// Offer `(score, id)`; returns the current k-th best score, or
    /// [`MINREAL`] while not yet full.
    ///
    /// NaN scores are ignored.
    pub fn insert(&mut self, score: f32, id: u32) -> f32 {
        if self.capacity == 0 {
            return f32::MAX;
        }
        if score.is_nan() {
            return self.threshold();
        }
        if self.is_full() {
            let last = self.entries[self.entries.len() - 1];
            if !(score > last.score || (score == last.score && id < last.id)) {
                return last.score;
            }
        }
        let pos = self.entries.partition_point(|e| ranks_before(e, score, id));
        self.entries.insert(pos, Neighbor { id, score });
        self.entries.truncate(self.capacity);
        self.threshold()
    }

    /// Current admission threshold.
    #[inline]
    pub fn threshold(&self) -> f32 {
        if self.capacity == 0 {
            f32::MAX
        } else if self.is_full() {
            self.entries[self.entries.len() - 1].score
        } else {
            MINREAL
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Id at rank `i` (0 = best).
    #[inline]
    pub fn ith_id(&self, i: usize) -> u32 {
        self.entries[i].id
    }

    /// Score at rank `i` (0 = best).
    #[inline]
    pub fn ith_score(&self, i: usize) -> f32 {
        self.entries[i].score
    }

    pub fn iter(&self) -> impl Iterator<Item = &Neighbor> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Neighbor> {
        self.entries
    }
}
