use crate::{
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::{clip_coef, copy_varmap, grad_norm, OutDim},
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use deepq_core::DeepqError;
use log::{info, trace};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`DqnModel`].
pub struct DqnModelConfig<Q>
where
    Q: OutDim,
{
    pub(super) q_config: Option<Q>,
    pub(super) opt_config: OptimizerConfig,
    #[serde(default)]
    pub(super) max_grad_norm: Option<f64>,
}

impl<Q> Default for DqnModelConfig<Q>
where
    Q: OutDim,
{
    fn default() -> Self {
        Self {
            q_config: None,
            opt_config: OptimizerConfig::default(),
            max_grad_norm: None,
        }
    }
}

impl<Q> DqnModelConfig<Q>
where
    Q: DeserializeOwned + Serialize + OutDim,
{
    /// Sets configurations for action-value function.
    pub fn q_config(mut self, v: Q) -> Self {
        self.q_config = Some(v);
        self
    }

    /// Sets output dimension of the model.
    pub fn out_dim(mut self, v: usize) -> Self {
        match &mut self.q_config {
            None => {}
            Some(q_config) => q_config.set_out_dim(v),
        };
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets the maximum global norm of gradients, `None` disables clipping.
    pub fn max_grad_norm(mut self, v: Option<f64>) -> Self {
        self.max_grad_norm = v;
        self
    }

    /// Constructs [`DqnModelConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DqnModelConfig`] to as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Action-value estimator with its own parameters and optimizer.
///
/// The online and the target estimators of [`Dqn`](super::Dqn) are two
/// instances built from the same configuration. They never share storage,
/// parameters move from one to the other only through [`DqnModel::sync_from`].
pub struct DqnModel<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    varmap: VarMap,

    // Dimension of the output vector (equal to the number of actions).
    n_actions: usize,

    // Action-value function
    q: Q,

    // Optimizer
    opt: Optimizer,
    max_grad_norm: Option<f64>,
}

impl<Q> DqnModel<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs [`DqnModel`].
    pub fn build(config: DqnModelConfig<Q::Config>, device: &Device) -> Result<Self> {
        let q_config = config.q_config.context("q_config is not set.")?;
        let n_actions = q_config.get_out_dim();
        if n_actions == 0 {
            return Err(DeepqError::invalid_config("number of actions must be positive").into());
        }
        if let Some(v) = config.max_grad_norm {
            if v.is_nan() || v <= 0.0 {
                return Err(DeepqError::invalid_config(format!(
                    "max_grad_norm must be positive: {}",
                    v
                ))
                .into());
            }
        }

        let varmap = VarMap::new();
        let q = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
            Q::build(vb, q_config)?
        };
        let vars = {
            let data = crate::util::lock(varmap.data())?;
            let mut vars = data
                .iter()
                .map(|(name, var)| (name.clone(), var.clone()))
                .collect::<Vec<_>>();
            vars.sort_by(|a, b| a.0.cmp(&b.0));
            vars
        };
        let opt = config.opt_config.build(vars)?;

        Ok(Self {
            varmap,
            n_actions,
            q,
            opt,
            max_grad_norm: config.max_grad_norm,
        })
    }

    /// Number of actions.
    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    /// Outputs the action values of shape `[batch, n_actions]` given observations.
    pub fn predict(&self, obs: &Tensor) -> Result<Tensor> {
        self.q.forward(obs)
    }

    /// Values of the chosen actions, `output[i] = predict(obs)[i, act[i]]`.
    ///
    /// `act` is a `u32` tensor of shape `[batch]`.
    pub fn select_action_value(&self, obs: &Tensor, act: &Tensor) -> Result<Tensor> {
        let q = self.predict(obs)?;
        Ok(q.gather(&act.unsqueeze(1)?, 1)?.squeeze(1)?)
    }

    /// Applies a gradient step minimizing `loss` and returns the gradient norm
    /// before clipping.
    pub fn update(&mut self, loss: &Tensor) -> Result<f32> {
        let grads = loss.backward()?;
        let norm = grad_norm(&grads, self.opt.vars())?;
        let scale = clip_coef(norm, self.max_grad_norm);
        trace!("grad_norm = {}, scale = {}", norm, scale);
        self.opt.step(&grads, scale)?;
        Ok(norm)
    }

    /// Replaces the parameters with a copy of those in `other`.
    pub fn sync_from(&mut self, other: &Self) -> Result<()> {
        copy_varmap(&self.varmap, &other.varmap)
    }

    /// Number of optimization steps applied.
    pub fn n_updates(&self) -> usize {
        self.opt.n_steps()
    }

    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save dqnmodel to {:?}", path.as_ref());
        Ok(())
    }

    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load dqnmodel from {:?}", path.as_ref());
        Ok(())
    }

    /// Saves the optimizer state.
    pub fn save_opt<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.opt.save(path)
    }

    /// Loads the optimizer state.
    pub fn load_opt<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.opt.load(path)
    }
}
