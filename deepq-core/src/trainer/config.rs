//! Configuration of [`Trainer`](super::Trainer).
use crate::error::DeepqError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trainer`](super::Trainer).
///
/// ```rust
/// use deepq_core::TrainerConfig;
///
/// let config = TrainerConfig::default()
///     .n_stack(4)
///     .warmup_steps(50_000)
///     .update_target_every(10_000)
///     .save_interval(100)
///     .model_dir("model/dqn_pong");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// Number of frames stacked into an observation.
    pub n_stack: usize,

    /// Environment steps taken before the first episode to fill the
    /// replay buffer, without optimization.
    pub warmup_steps: usize,

    /// Interval of optimization steps in environment steps.
    pub opt_interval: usize,

    /// Interval of copying the online parameters into the target
    /// estimator, in environment steps.
    pub update_target_every: usize,

    /// Interval of checkpoints in episodes. `0` disables checkpoints.
    pub save_interval: usize,

    /// Directory where checkpoints are written.
    pub model_dir: Option<String>,

    /// Episodes are cut after this many steps, if given.
    pub max_episode_steps: Option<usize>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            n_stack: 4,
            warmup_steps: 0,
            opt_interval: 1,
            update_target_every: 10_000,
            save_interval: 0,
            model_dir: None,
            max_episode_steps: None,
        }
    }
}

impl TrainerConfig {
    /// Sets the number of stacked frames.
    pub fn n_stack(mut self, n_stack: usize) -> Self {
        self.n_stack = n_stack;
        self
    }

    /// Sets the number of warm-up steps.
    pub fn warmup_steps(mut self, warmup_steps: usize) -> Self {
        self.warmup_steps = warmup_steps;
        self
    }

    /// Sets the interval of optimization in environment steps.
    pub fn opt_interval(mut self, opt_interval: usize) -> Self {
        self.opt_interval = opt_interval;
        self
    }

    /// Sets the interval of target synchronization in environment steps.
    pub fn update_target_every(mut self, update_target_every: usize) -> Self {
        self.update_target_every = update_target_every;
        self
    }

    /// Sets the interval of checkpoints in episodes.
    pub fn save_interval(mut self, save_interval: usize) -> Self {
        self.save_interval = save_interval;
        self
    }

    /// Sets the directory of checkpoints.
    pub fn model_dir(mut self, model_dir: impl Into<String>) -> Self {
        self.model_dir = Some(model_dir.into());
        self
    }

    /// Sets the maximum length of episodes.
    pub fn max_episode_steps(mut self, max_episode_steps: usize) -> Self {
        self.max_episode_steps = Some(max_episode_steps);
        self
    }

    /// Checks the values, fails with [`DeepqError::InvalidConfiguration`].
    pub fn validate(&self) -> Result<()> {
        if self.n_stack == 0 {
            return Err(DeepqError::invalid_config("n_stack must be positive").into());
        }
        if self.opt_interval == 0 {
            return Err(DeepqError::invalid_config("opt_interval must be positive").into());
        }
        if self.update_target_every == 0 {
            return Err(DeepqError::invalid_config("update_target_every must be positive").into());
        }
        if self.save_interval > 0 && self.model_dir.is_none() {
            return Err(DeepqError::invalid_config("save_interval is set without model_dir").into());
        }
        if self.max_episode_steps == Some(0) {
            return Err(DeepqError::invalid_config("max_episode_steps must be positive").into());
        }
        Ok(())
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
