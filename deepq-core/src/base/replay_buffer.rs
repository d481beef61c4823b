//! Replay buffer interface.
//!
//! Replay buffers store transitions collected from environments and sample
//! decorrelated batches of them for training agents.

use anyhow::Result;

/// Interface for buffers that store experiences from environments.
///
/// # Examples
///
/// ```ignore
/// struct SimpleBuffer<T> {
///     items: Vec<T>,
/// }
///
/// impl<T> ExperienceBufferBase for SimpleBuffer<T> {
///     type Item = T;
///
///     fn push(&mut self, tr: T) -> Result<()> {
///         self.items.push(tr);
///         Ok(())
///     }
///
///     fn len(&self) -> usize {
///         self.items.len()
///     }
/// }
/// ```
pub trait ExperienceBufferBase {
    /// The type of items stored in the buffer.
    type Item;

    /// Pushes a new experience into the buffer.
    fn push(&mut self, tr: Self::Item) -> Result<()>;

    /// Returns the current number of experiences in the buffer.
    fn len(&self) -> usize;

    /// Returns `true` if the buffer holds no experience.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Interface for replay buffers that generate batches for training.
pub trait ReplayBufferBase {
    /// Configuration parameters for the replay buffer.
    type Config: Clone;

    /// The type of batch generated for training.
    type Batch;

    /// Builds a new replay buffer from the given configuration.
    fn build(config: &Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Samples a batch of `size` experiences.
    ///
    /// Fails with [`DeepqError::InsufficientData`](crate::DeepqError::InsufficientData)
    /// if the buffer holds fewer than `size` experiences, and with
    /// [`DeepqError::InvalidConfiguration`](crate::DeepqError::InvalidConfiguration)
    /// if `size` is zero.
    fn batch(&mut self, size: usize) -> Result<Self::Batch>;

    /// Updates the priorities of sampled experiences with their new
    /// absolute TD errors.
    ///
    /// Buffers sampling uniformly ignore this call.
    fn update_priority(&mut self, ixs: &[usize], td_errs: &[f32]);
}
