//! DQN and Dueling-DQN agents implemented with [candle](https://crates.io/crates/candle-core).
//!
//! The agent [`Dqn`](dqn::Dqn) owns two estimators of identical
//! architecture, an online one trained by gradient steps and a target one
//! holding a snapshot of the online parameters. Action-value networks are
//! [`SubModel1`](model::SubModel1) implementations: [`Mlp`](mlp::Mlp),
//! [`Cnn`](cnn::Cnn), or any of them under a [`Dueling`](dueling::Dueling)
//! head.
pub mod cnn;
pub mod dqn;
pub mod dueling;
pub mod mlp;
pub mod model;
pub mod opt;
pub mod util;
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    #[default]
    Cpu,

    /// The GPU device with the given ordinal.
    Cuda(usize),
}

impl Device {
    /// Creates the corresponding [`candle_core::Device`].
    ///
    /// Fails for [`Device::Cuda`] if candle is built without CUDA support.
    pub fn to_candle(self) -> Result<candle_core::Device> {
        match self {
            Self::Cpu => Ok(candle_core::Device::Cpu),
            Self::Cuda(n) => Ok(candle_core::Device::new_cuda(n)?),
        }
    }
}

impl TryFrom<Device> for candle_core::Device {
    type Error = anyhow::Error;

    fn try_from(device: Device) -> Result<Self> {
        device.to_candle()
    }
}
