use crate::util::OutDim;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Dueling`](super::Dueling).
pub struct DuelingConfig<C> {
    /// Configuration of the shared feature network.
    pub(super) feature_config: C,

    /// Width of the hidden layer in each stream.
    pub(super) hidden_dim: usize,

    /// Number of actions.
    pub(super) n_actions: usize,
}

impl<C> DuelingConfig<C> {
    /// Creates a dueling head on top of the feature network.
    ///
    /// The output dimension of `feature_config` is the input of both streams.
    pub fn new(feature_config: C, hidden_dim: usize, n_actions: usize) -> Self {
        Self {
            feature_config,
            hidden_dim,
            n_actions,
        }
    }
}

impl<C> OutDim for DuelingConfig<C> {
    fn get_out_dim(&self) -> usize {
        self.n_actions
    }

    fn set_out_dim(&mut self, v: usize) {
        self.n_actions = v;
    }
}
