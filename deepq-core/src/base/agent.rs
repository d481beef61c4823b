//! Agent.
use super::{Policy, ReplayBufferBase};
use crate::record::Record;
use anyhow::Result;
use std::path::Path;

/// Represents a trainable value-based policy.
///
/// The agent owns an online value estimator and a target estimator.
/// The [`Trainer`](crate::Trainer) decides when to optimize and when to
/// synchronize the target estimator.
pub trait Agent<R: ReplayBufferBase>: Policy {
    /// Set the policy to training mode.
    fn train(&mut self);

    /// Set the policy to evaluation mode.
    fn eval(&mut self);

    /// Return if it is in training mode.
    fn is_train(&self) -> bool;

    /// Number of actions the value estimator scores.
    fn n_actions(&self) -> usize;

    /// Exploration rate used by [`Policy::sample`] at the given step.
    fn epsilon(&self, env_steps: usize) -> f64;

    /// Performs an optimization step.
    ///
    /// Returns `Ok(None)` when the step was skipped, e.g. while `buffer`
    /// holds fewer transitions than a batch.
    fn opt(&mut self, buffer: &mut R) -> Result<Option<()>> {
        Ok(self.opt_with_record(buffer)?.map(|_| ()))
    }

    /// Performs an optimization step and returns some information.
    fn opt_with_record(&mut self, buffer: &mut R) -> Result<Option<Record>>;

    /// Copies the parameters of the online estimator into the target estimator.
    fn sync_target(&mut self) -> Result<()>;

    /// Save the parameters of the agent in the given directory.
    ///
    /// This method creates a number of files in the directory: the online
    /// estimator, the target estimator and the optimizer state.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Load the parameters of the agent from the given directory.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}
