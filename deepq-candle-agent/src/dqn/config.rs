//! Configuration of DQN agent.
use super::{explorer::EpsilonGreedy, DqnModelConfig};
use crate::{
    model::SubModel1,
    util::{CriticLoss, OutDim},
    Device,
};
use anyhow::Result;
use candle_core::Tensor;
use deepq_core::DeepqError;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    marker::PhantomData,
    path::Path,
};

fn default_seed() -> u64 {
    42
}

/// Configuration of [`Dqn`](super::Dqn).
#[derive(Deserialize, Serialize)]
pub struct DqnConfig<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    pub(super) model_config: DqnModelConfig<Q::Config>,
    pub(super) batch_size: usize,
    pub(super) discount_factor: f64,
    #[serde(default)]
    pub(super) double_dqn: bool,
    pub(super) critic_loss: CriticLoss,
    pub(super) explorer: EpsilonGreedy,
    #[serde(default)]
    pub device: Device,
    #[serde(default = "default_seed")]
    pub(super) seed: u64,
    #[serde(skip)]
    phantom: PhantomData<Q>,
}

impl<Q> Clone for DqnConfig<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    fn clone(&self) -> Self {
        Self {
            model_config: self.model_config.clone(),
            batch_size: self.batch_size,
            discount_factor: self.discount_factor,
            double_dqn: self.double_dqn,
            critic_loss: self.critic_loss,
            explorer: self.explorer.clone(),
            device: self.device,
            seed: self.seed,
            phantom: PhantomData,
        }
    }
}

impl<Q> PartialEq for DqnConfig<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    fn eq(&self, other: &Self) -> bool {
        self.model_config == other.model_config
            && self.batch_size == other.batch_size
            && self.discount_factor == other.discount_factor
            && self.double_dqn == other.double_dqn
            && self.critic_loss == other.critic_loss
            && self.explorer == other.explorer
            && self.device == other.device
            && self.seed == other.seed
    }
}

impl<Q> std::fmt::Debug for DqnConfig<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DqnConfig")
            .field("model_config", &self.model_config)
            .field("batch_size", &self.batch_size)
            .field("discount_factor", &self.discount_factor)
            .field("double_dqn", &self.double_dqn)
            .field("critic_loss", &self.critic_loss)
            .field("explorer", &self.explorer)
            .field("device", &self.device)
            .field("seed", &self.seed)
            .finish()
    }
}

impl<Q> Default for DqnConfig<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    /// Constructs DQN config with default parameters.
    fn default() -> Self {
        Self {
            model_config: Default::default(),
            batch_size: 32,
            discount_factor: 0.99,
            double_dqn: false,
            critic_loss: CriticLoss::SmoothL1,
            explorer: EpsilonGreedy::default(),
            device: Device::Cpu,
            seed: default_seed(),
            phantom: PhantomData,
        }
    }
}

impl<Q> DqnConfig<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
{
    /// Batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.discount_factor = v;
        self
    }

    /// Explorer.
    pub fn explorer(mut self, v: EpsilonGreedy) -> Self {
        self.explorer = v;
        self
    }

    /// Sets the configuration of the model.
    pub fn model_config(mut self, model_config: DqnModelConfig<Q::Config>) -> Self {
        self.model_config = model_config;
        self
    }

    /// Sets the output dimention of the dqn model of the DQN agent.
    pub fn out_dim(mut self, out_dim: usize) -> Self {
        let model_config = self.model_config.clone();
        self.model_config = model_config.out_dim(out_dim);
        self
    }

    /// Double DQN
    pub fn double_dqn(mut self, double_dqn: bool) -> Self {
        self.double_dqn = double_dqn;
        self
    }

    /// Critic loss.
    pub fn critic_loss(mut self, v: CriticLoss) -> Self {
        self.critic_loss = v;
        self
    }

    /// Device.
    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Seed of the random number generator used for exploration.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Checks the values that the model configuration does not cover.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(DeepqError::invalid_config("batch_size must be positive").into());
        }
        if !(0.0..=1.0).contains(&self.discount_factor) {
            return Err(DeepqError::invalid_config(format!(
                "discount_factor must be in [0, 1]: {}",
                self.discount_factor
            ))
            .into());
        }
        self.explorer.validate()
    }

    /// Loads [`DqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of DQN agent from {:?}", path_);
        Ok(b)
    }

    /// Saves [`DqnConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of DQN agent into {:?}", path_);
        Ok(())
    }
}
