//! Counters of the training loop and per-episode statistics.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// File name of [`TrainerState`] in a checkpoint directory.
pub const TRAINER_STATE_FILE: &str = "trainer_state.yaml";

/// Counters threaded through the training loop.
///
/// `env_steps` is the global step counter. It grows by one per environment
/// interaction, warm-up included, and drives exploration and target
/// synchronization.
#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub struct TrainerState {
    /// Environment steps.
    pub env_steps: usize,

    /// Optimization steps actually applied.
    pub opt_steps: usize,

    /// Finished episodes.
    pub episode: usize,
}

impl TrainerState {
    /// Loads the state from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the state to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Statistics of a finished episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeStats {
    /// Zero-based index of the episode.
    pub episode: usize,

    /// Number of environment steps in the episode.
    pub length: usize,

    /// Sum of rewards in the episode.
    pub cumulative_reward: f32,

    /// Global step counter at the end of the episode.
    pub env_steps: usize,
}

/// Cloneable flag asking a [`Trainer`](super::Trainer) to stop.
///
/// The flag is checked at episode boundaries. The episode in progress runs
/// to its end, then the trainer yields no more statistics.
#[derive(Debug, Default, Clone)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Creates a signal that is not raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`StopSignal::stop`] was called on any clone.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_trainer_state_round_trip() -> Result<()> {
        let state = TrainerState {
            env_steps: 1234,
            opt_steps: 1000,
            episode: 7,
        };
        let dir = TempDir::new("trainer_state")?;
        let path = dir.path().join(TRAINER_STATE_FILE);
        state.save(&path)?;
        assert_eq!(TrainerState::load(&path)?, state);
        Ok(())
    }

    #[test]
    fn test_stop_signal_is_shared() {
        let signal = StopSignal::new();
        let clone = signal.clone();
        assert!(!signal.is_stopped());
        clone.stop();
        assert!(signal.is_stopped());
    }
}
