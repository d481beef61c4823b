//! Environment.
use super::Step;
use anyhow::Result;

/// Represents an environment with a discrete action set, typically an MDP
/// observed through raw frames.
///
/// Errors returned by [`Env::reset`] and [`Env::step`] abort the current
/// episode of the [`Trainer`](crate::Trainer) and are surfaced to its caller
/// as [`DeepqError::Environment`](crate::DeepqError::Environment).
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Raw frame emitted by the environment.
    type Frame;

    /// Information in the [`Step`] object.
    type Info;

    /// Builds an environment with a given random seed.
    ///
    /// The same seed and action sequence should reproduce the same trajectory.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Number of legal actions. Action ids are `0..n_actions()`.
    fn n_actions(&self) -> usize;

    /// Starts a new episode and returns its first frame.
    fn reset(&mut self) -> Result<Self::Frame>;

    /// Performs an environment step.
    fn step(&mut self, act: usize) -> Result<Step<Self>>
    where
        Self: Sized;
}
