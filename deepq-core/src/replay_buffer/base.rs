use super::{IwScheduler, PerConfig, ReplayBufferConfig, SumTree, Transition, TransitionBatch};
use crate::{error::DeepqError, ExperienceBufferBase, ReplayBufferBase};
use anyhow::Result;
use log::trace;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// State of prioritized experience replay (PER).
struct PerState {
    /// Sum tree over slot priorities.
    sum_tree: SumTree,

    /// Scheduler of the importance sampling exponent.
    iw_scheduler: IwScheduler,
}

impl PerState {
    fn new(capacity: usize, per_config: &PerConfig) -> Self {
        Self {
            sum_tree: SumTree::new(capacity, per_config.alpha, per_config.normalize),
            iw_scheduler: IwScheduler::new(
                per_config.beta_0,
                per_config.beta_final,
                per_config.n_opts_final,
            ),
        }
    }
}

/// How [`ReplayBuffer`] draws slots.
enum Sampling {
    /// Uniformly at random with replacement.
    Uniform,

    /// Proportionally to priorities, with importance sampling weights.
    Prioritized(PerState),
}

/// Fixed-capacity ring of transitions.
///
/// Storage is allocated once at construction. Until the buffer is full,
/// transitions are appended; afterwards each [`push`](ExperienceBufferBase::push)
/// overwrites the slot under the write cursor, which always holds the oldest
/// transition, and advances the cursor circularly.
pub struct ReplayBuffer {
    /// Maximum number of transitions that can be stored.
    capacity: usize,

    /// Write cursor, the slot the next transition goes to.
    i: usize,

    /// Stored transitions, `data.len() <= capacity`.
    data: Vec<Transition>,

    /// Random number generator for sampling.
    rng: StdRng,

    sampling: Sampling,
}

impl ReplayBuffer {
    /// Maximum number of transitions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` if the buffer samples proportionally to priorities.
    pub fn is_prioritized(&self) -> bool {
        matches!(self.sampling, Sampling::Prioritized(_))
    }

    /// Current exponent of importance sampling weights, PER only.
    pub fn beta(&self) -> Option<f32> {
        match &self.sampling {
            Sampling::Prioritized(per_state) => Some(per_state.iw_scheduler.beta()),
            Sampling::Uniform => None,
        }
    }

    /// Transition stored in slot `ix`.
    pub fn get(&self, ix: usize) -> Option<&Transition> {
        self.data.get(ix)
    }

    /// Iterates over the stored transitions, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        let (newer, older) = if self.data.len() < self.capacity {
            self.data.split_at(self.data.len())
        } else {
            self.data.split_at(self.i)
        };
        older.iter().chain(newer.iter())
    }

    fn sample_ixs(&mut self, size: usize) -> (Vec<usize>, Option<Vec<f32>>) {
        match &self.sampling {
            Sampling::Uniform => {
                let len = self.data.len();
                let ixs = (0..size).map(|_| self.rng.gen_range(0..len)).collect();
                (ixs, None)
            }
            Sampling::Prioritized(per_state) => {
                let beta = per_state.iw_scheduler.beta();
                let (ixs, ws) = per_state.sum_tree.sample(size, beta, &mut self.rng);
                (ixs, Some(ws))
            }
        }
    }
}

impl ExperienceBufferBase for ReplayBuffer {
    type Item = Transition;

    fn len(&self) -> usize {
        self.data.len()
    }

    fn push(&mut self, tr: Transition) -> Result<()> {
        let slot = self.i;
        if self.data.len() < self.capacity {
            self.data.push(tr);
        } else {
            trace!("Overwrite slot {}", slot);
            self.data[slot] = tr;
        }

        if let Sampling::Prioritized(per_state) = &mut self.sampling {
            per_state.sum_tree.add(slot);
        }

        self.i = (self.i + 1) % self.capacity;
        Ok(())
    }
}

impl ReplayBufferBase for ReplayBuffer {
    type Config = ReplayBufferConfig;
    type Batch = TransitionBatch;

    fn build(config: &Self::Config) -> Result<Self> {
        config.validate()?;
        let capacity = config.capacity;
        let sampling = match &config.per_config {
            Some(per_config) => Sampling::Prioritized(PerState::new(capacity, per_config)),
            None => Sampling::Uniform,
        };

        Ok(Self {
            capacity,
            i: 0,
            data: Vec::with_capacity(capacity),
            rng: StdRng::seed_from_u64(config.seed),
            sampling,
        })
    }

    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        if size == 0 {
            return Err(DeepqError::invalid_config("batch size must be positive").into());
        }
        if self.data.len() < size || self.data.is_empty() {
            return Err(DeepqError::InsufficientData {
                requested: size,
                available: self.data.len(),
            }
            .into());
        }

        let (ixs, weight) = self.sample_ixs(size);
        let transitions = ixs.iter().map(|&ix| &self.data[ix]).collect::<Vec<_>>();
        Ok(TransitionBatch::collate(&transitions, ixs, weight))
    }

    fn update_priority(&mut self, ixs: &[usize], td_errs: &[f32]) {
        if let Sampling::Prioritized(per_state) = &mut self.sampling {
            for (&ix, &td_err) in ixs.iter().zip(td_errs.iter()) {
                per_state.sum_tree.update(ix, td_err);
            }
            per_state.iw_scheduler.add_n_opts();
        }
    }
}
