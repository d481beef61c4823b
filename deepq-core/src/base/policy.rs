//! Policy.
use crate::StackedFrames;
use anyhow::Result;
use serde::de::DeserializeOwned;
use std::path::Path;

/// A policy over stacked-frame observations.
///
/// Policy is a mapping from an observation to an action id.
/// The mapping can be either of deterministic or stochastic.
pub trait Policy {
    /// Samples an action given an observation.
    ///
    /// `env_steps` is the global environment step counter, which drives
    /// step-indexed exploration schedules.
    fn sample(&mut self, obs: &StackedFrames, env_steps: usize) -> Result<usize>;
}

/// A configurable object.
pub trait Configurable {
    /// Configuration.
    type Config: Clone + DeserializeOwned;

    /// Builds the object.
    fn build(config: Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Builds the object with the configuration in the yaml file of the given path.
    fn build_from_path(path: impl AsRef<Path>) -> Result<Self>
    where
        Self: Sized,
    {
        let file = std::fs::File::open(path)?;
        let rdr = std::io::BufReader::new(file);
        let config = serde_yaml::from_reader(rdr)?;
        Self::build(config)
    }
}
