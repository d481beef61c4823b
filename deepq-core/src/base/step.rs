//! Environment step.
use super::Env;

/// Represents the outcome `(o_t+1, r_t, done_t)` of applying an action,
/// with some additional information.
///
/// An environment emits a [`Step`] object at every interaction step.
/// The [`Trainer`](crate::Trainer) turns it into a
/// [`Transition`](crate::Transition) `(o_t, a_t, r_t, o_t+1, done_t)`.
pub struct Step<E: Env> {
    /// Raw frame after the action.
    pub obs: E::Frame,

    /// Reward.
    pub reward: f32,

    /// Flag denoting if the episode is terminated.
    pub is_done: bool,

    /// Information defined by the environment.
    pub info: E::Info,
}

impl<E: Env> Step<E> {
    /// Constructs a [`Step`] object.
    pub fn new(obs: E::Frame, reward: f32, is_done: bool, info: E::Info) -> Self {
        Step {
            obs,
            reward,
            is_done,
            info,
        }
    }
}
