//! Sum tree for prioritized sampling.
use rand::Rng;
use segment_tree::{ops::MinIgnoreNaN, SegmentPoint};
use serde::{Deserialize, Serialize};

/// How importance sampling weights are normalized.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub enum WeightNormalizer {
    /// Normalize by the largest weight any stored transition could get.
    All,

    /// Normalize by the largest weight in the sampled batch.
    Batch,
}

/// Binary tree whose leaves hold `(p + eps)^alpha` for every buffer slot and
/// whose inner nodes hold the sum of their children.
///
/// Sampling descends from the root, so slot `i` is drawn with probability
/// `P(i) = p_i^alpha / sum_k p_k^alpha`.
#[derive(Debug)]
pub struct SumTree {
    eps: f32,
    alpha: f32,
    capacity: usize,
    n_samples: usize,
    max_priority: f32,
    tree: Vec<f32>,
    min_tree: SegmentPoint<f32, MinIgnoreNaN>,
    normalize: WeightNormalizer,
}

impl SumTree {
    /// Creates an empty tree for `capacity` slots.
    pub fn new(capacity: usize, alpha: f32, normalize: WeightNormalizer) -> Self {
        Self {
            eps: 1e-6,
            alpha,
            capacity,
            n_samples: 0,
            max_priority: 1.0,
            tree: vec![0f32; 2 * capacity - 1],
            min_tree: SegmentPoint::build(vec![f32::MAX; capacity], MinIgnoreNaN),
            normalize,
        }
    }

    /// Sum of all leaves.
    pub fn total(&self) -> f32 {
        self.tree[0]
    }

    /// Number of filled slots.
    pub fn len(&self) -> usize {
        self.n_samples
    }

    /// Returns `true` if no slot is filled.
    pub fn is_empty(&self) -> bool {
        self.n_samples == 0
    }

    /// Largest raw priority set so far; new transitions get this priority.
    pub fn max_priority(&self) -> f32 {
        self.max_priority
    }

    /// Sets the priority of a newly written slot to the current maximum.
    ///
    /// Slots are filled in order `0, 1, ...` until the tree is full.
    pub fn add(&mut self, ix: usize) {
        debug_assert!(ix <= self.n_samples);
        self.update(ix, self.max_priority);
        if self.n_samples < self.capacity {
            self.n_samples += 1;
        }
    }

    /// Sets the raw priority of slot `ix`, typically its absolute TD error.
    pub fn update(&mut self, ix: usize, p: f32) {
        debug_assert!(ix < self.capacity);
        let p = if p.is_finite() { p.abs() } else { self.max_priority };
        self.max_priority = self.max_priority.max(p);

        let p = (p + self.eps).powf(self.alpha);
        self.min_tree.modify(ix, p);

        let mut node = ix + self.capacity - 1;
        self.tree[node] = p;
        while node > 0 {
            node = (node - 1) / 2;
            self.tree[node] = self.tree[2 * node + 1] + self.tree[2 * node + 2];
        }
    }

    /// Returns the slot whose cumulative priority interval contains `s`.
    ///
    /// `s` is expected in `[0, total())`.
    pub fn get(&self, s: f32) -> usize {
        let mut s = s;
        let mut ix = 0;
        loop {
            let left = 2 * ix + 1;
            if left >= self.tree.len() {
                break;
            }
            let right = left + 1;
            if s < self.tree[left] || self.tree[right] <= 0.0 {
                ix = left;
            } else {
                s -= self.tree[left];
                ix = right;
            }
        }
        ix + 1 - self.capacity
    }

    /// Samples slots with replacement and returns them with their
    /// importance sampling weights $w_i=\left(N P(i)\right)^{-\beta}$,
    /// normalized according to [`WeightNormalizer`].
    ///
    /// The tree must not be empty.
    pub fn sample(
        &self,
        batch_size: usize,
        beta: f32,
        rng: &mut impl Rng,
    ) -> (Vec<usize>, Vec<f32>) {
        let total = self.total();
        let ixs = (0..batch_size)
            .map(|_| self.get(total * rng.gen::<f32>()))
            .collect::<Vec<_>>();

        let n = self.n_samples as f32 / total;
        let ws = ixs
            .iter()
            .map(|ix| (n * self.tree[ix + self.capacity - 1]).powf(-beta))
            .collect::<Vec<_>>();

        let w_max = match self.normalize {
            WeightNormalizer::All => (n * self.min_tree.query(0, self.n_samples)).powf(-beta),
            WeightNormalizer::Batch => ws.iter().fold(f32::MIN_POSITIVE, |m, &w| m.max(w)),
        };
        let ws = ws.iter().map(|w| w / w_max).collect();

        (ixs, ws)
    }
}
