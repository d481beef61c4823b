use crate::StackedFrames;

/// A single experience `(s_t, a_t, r_t, s_t+1, done_t)`.
///
/// Created by the [`Trainer`](crate::Trainer) after each environment step.
/// Once pushed into a [`ReplayBuffer`](super::ReplayBuffer) it is owned by the
/// buffer and only read until it is overwritten.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// Observation before the action.
    pub state: StackedFrames,

    /// Action id.
    pub action: usize,

    /// Reward.
    pub reward: f32,

    /// Observation after the action.
    pub next_state: StackedFrames,

    /// `true` if the episode terminated with this transition.
    pub done: bool,
}

impl Transition {
    /// Constructs a transition.
    pub fn new(
        state: StackedFrames,
        action: usize,
        reward: f32,
        next_state: StackedFrames,
        done: bool,
    ) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            done,
        }
    }
}
