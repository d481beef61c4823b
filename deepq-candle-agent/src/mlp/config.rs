use crate::util::OutDim;
use anyhow::Result;
use deepq_core::DeepqError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Mlp`](super::Mlp).
pub struct MlpConfig {
    pub(super) in_dim: usize,
    pub(super) units: Vec<usize>,
    pub(super) out_dim: usize,
    pub(super) activation_out: bool,
}

impl MlpConfig {
    /// Creates configuration of MLP.
    ///
    /// * `in_dim` - Number of elements of a flattened observation.
    /// * `units` - Widths of the hidden layers.
    /// * `activation_out` - If `true`, activation function is added in the final layer.
    pub fn new(in_dim: usize, units: Vec<usize>, out_dim: usize, activation_out: bool) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
            activation_out,
        }
    }

    /// Input dimension.
    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    pub(super) fn validate(&self) -> Result<()> {
        if self.in_dim == 0 || self.out_dim == 0 {
            return Err(DeepqError::invalid_config(format!(
                "MLP dimensions must be positive: in_dim = {}, out_dim = {}",
                self.in_dim, self.out_dim
            ))
            .into());
        }
        if self.units.iter().any(|&u| u == 0) {
            return Err(DeepqError::invalid_config(format!(
                "MLP hidden units must be positive: {:?}",
                self.units
            ))
            .into());
        }
        Ok(())
    }
}

impl OutDim for MlpConfig {
    fn get_out_dim(&self) -> usize {
        self.out_dim
    }

    fn set_out_dim(&mut self, out_dim: usize) {
        self.out_dim = out_dim;
    }
}
