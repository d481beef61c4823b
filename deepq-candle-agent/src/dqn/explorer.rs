//! Exploration strategy of DQN.
use anyhow::Result;
use deepq_core::DeepqError;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Decay of epsilon over the global step counter.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum EpsilonSchedule {
    /// `eps_end + (eps_start - eps_end) * exp(-decay_rate * step)`.
    Exponential {
        /// Decay rate per step.
        decay_rate: f64,
    },

    /// Linear interpolation reaching `eps_end` at `decay_steps`.
    Linear {
        /// Number of steps until `eps_end`.
        decay_steps: usize,
    },
}

/// Epsilon-greedy explorer for DQN.
///
/// With probability `epsilon(step)` a uniformly random action is taken,
/// otherwise the greedy one.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedy {
    pub eps_start: f64,
    pub eps_end: f64,
    pub schedule: EpsilonSchedule,
}

impl Default for EpsilonGreedy {
    fn default() -> Self {
        Self {
            eps_start: 1.0,
            eps_end: 0.01,
            schedule: EpsilonSchedule::Exponential { decay_rate: 0.001 },
        }
    }
}

impl EpsilonGreedy {
    /// Constructs epsilon-greedy explorer with exponential decay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs epsilon-greedy explorer decaying linearly over `decay_steps`.
    pub fn with_decay_steps(decay_steps: usize) -> Self {
        Self {
            schedule: EpsilonSchedule::Linear { decay_steps },
            ..Self::default()
        }
    }

    /// Set the epsilon value at the start.
    pub fn eps_start(mut self, v: f64) -> Self {
        self.eps_start = v;
        self
    }

    /// Set the epsilon value approached as the step grows.
    pub fn eps_end(mut self, v: f64) -> Self {
        self.eps_end = v;
        self
    }

    /// Set the schedule.
    pub fn schedule(mut self, v: EpsilonSchedule) -> Self {
        self.schedule = v;
        self
    }

    /// Checks that `0 <= eps_end <= eps_start <= 1` and the decay is non-negative.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.eps_start)
            || !(0.0..=1.0).contains(&self.eps_end)
            || self.eps_end > self.eps_start
        {
            return Err(DeepqError::invalid_config(format!(
                "epsilon must satisfy 0 <= eps_end <= eps_start <= 1: eps_start = {}, eps_end = {}",
                self.eps_start, self.eps_end
            ))
            .into());
        }
        if let EpsilonSchedule::Exponential { decay_rate } = self.schedule {
            if decay_rate.is_nan() || decay_rate < 0.0 {
                return Err(DeepqError::invalid_config(format!(
                    "decay rate must be non-negative: {}",
                    decay_rate
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Exploration rate at the given step.
    pub fn epsilon(&self, step: usize) -> f64 {
        let range = self.eps_start - self.eps_end;
        let eps = match self.schedule {
            EpsilonSchedule::Exponential { decay_rate } => {
                self.eps_start - range * (1.0 - (-decay_rate * step as f64).exp())
            }
            EpsilonSchedule::Linear { decay_steps } => match decay_steps {
                0 => self.eps_end,
                _ => {
                    let frac = (step as f64 / decay_steps as f64).min(1.0);
                    self.eps_start - range * frac
                }
            },
        };
        eps.max(self.eps_end).min(self.eps_start)
    }

    /// Takes an action at the given step.
    ///
    /// `greedy` is evaluated only when exploiting, so callers can defer the
    /// forward pass of the network.
    pub fn action<F>(
        &self,
        step: usize,
        n_actions: usize,
        rng: &mut impl Rng,
        greedy: F,
    ) -> Result<usize>
    where
        F: FnOnce() -> Result<usize>,
    {
        let r = rng.gen::<f64>();
        if r < self.epsilon(step) {
            Ok(rng.gen_range(0..n_actions))
        } else {
            greedy()
        }
    }
}

/// Index of the largest value, the first one on ties.
///
/// NaN values are never selected unless all values are NaN.
pub fn greedy_action(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] || (values[best].is_nan() && !v.is_nan()) {
            best = i;
        }
    }
    best
}
