//! Optimizers.
//!
//! Adam and RMSprop keep their moment estimates in tensors named after the
//! parameters, so that the optimizer state can be checkpointed with
//! [`Optimizer::save`] and restored with [`Optimizer::load`].
use anyhow::{anyhow, Result};
use candle_core::{backprop::GradStore, DType, Tensor, Var};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path};

/// Configuration of optimizer for training neural networks in an RL agent.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// Adam optimizer.
    Adam {
        /// Learning rate.
        lr: f64,
        /// Decay of the first moment.
        #[serde(default = "default_beta1")]
        beta1: f64,
        /// Decay of the second moment.
        #[serde(default = "default_beta2")]
        beta2: f64,
        /// Term added to the denominator.
        #[serde(default = "default_eps")]
        eps: f64,
    },

    /// RMSprop optimizer.
    RmsProp {
        /// Learning rate.
        lr: f64,
        /// Smoothing constant of the squared gradient average.
        #[serde(default = "default_alpha")]
        alpha: f64,
        /// Term added to the denominator.
        #[serde(default = "default_eps")]
        eps: f64,
    },
}

fn default_beta1() -> f64 {
    0.9
}

fn default_beta2() -> f64 {
    0.999
}

fn default_eps() -> f64 {
    1e-8
}

fn default_alpha() -> f64 {
    0.99
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam {
            lr: 1e-3,
            beta1: default_beta1(),
            beta2: default_beta2(),
            eps: default_eps(),
        }
    }
}

impl OptimizerConfig {
    /// Constructs an optimizer of the given named variables.
    pub fn build(&self, vars: Vec<(String, Var)>) -> Result<Optimizer> {
        let with_first_moment = matches!(self, Self::Adam { .. });
        let params = vars
            .into_iter()
            .filter(|(_, var)| var.dtype().is_float())
            .map(|(name, var)| -> Result<ParamState> {
                let m = match with_first_moment {
                    true => Some(Var::zeros(var.dims(), var.dtype(), var.device())?),
                    false => None,
                };
                let v = Var::zeros(var.dims(), var.dtype(), var.device())?;
                Ok(ParamState { name, var, m, v })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Optimizer {
            config: self.clone(),
            params,
            step_t: 0,
        })
    }

    /// Override learning rate.
    pub fn learning_rate(self, lr: f64) -> Self {
        match self {
            Self::Adam {
                beta1, beta2, eps, ..
            } => Self::Adam {
                lr,
                beta1,
                beta2,
                eps,
            },
            Self::RmsProp { alpha, eps, .. } => Self::RmsProp { lr, alpha, eps },
        }
    }
}

/// A parameter with its moment estimates.
struct ParamState {
    name: String,
    var: Var,

    /// First moment, Adam only.
    m: Option<Var>,

    /// Second moment.
    v: Var,
}

/// Optimizer updating a fixed set of variables.
pub struct Optimizer {
    config: OptimizerConfig,
    params: Vec<ParamState>,
    step_t: usize,
}

impl Optimizer {
    /// Number of steps applied so far.
    pub fn n_steps(&self) -> usize {
        self.step_t
    }

    /// Variables updated by this optimizer.
    pub fn vars(&self) -> impl Iterator<Item = &Var> {
        self.params.iter().map(|p| &p.var)
    }

    /// Applies a step with gradients multiplied by `scale`.
    ///
    /// New values of all parameters and moments are computed before any of
    /// them is written, so a failure leaves the parameters untouched.
    pub fn step(&mut self, grads: &GradStore, scale: f64) -> Result<()> {
        let t = self.step_t + 1;
        let mut updates = Vec::with_capacity(self.params.len());

        for p in self.params.iter() {
            let g = match grads.get(&p.var) {
                Some(g) => g.affine(scale, 0.0)?,
                None => continue,
            };
            let update = match (&self.config, &p.m) {
                (
                    OptimizerConfig::Adam {
                        lr,
                        beta1,
                        beta2,
                        eps,
                    },
                    Some(m),
                ) => {
                    let next_m = ((m.as_tensor() * *beta1)? + (&g * (1.0 - beta1))?)?;
                    let next_v = ((p.v.as_tensor() * *beta2)? + (g.sqr()? * (1.0 - beta2))?)?;
                    let m_hat = (&next_m * (1.0 / (1.0 - beta1.powi(t as i32))))?;
                    let v_hat = (&next_v * (1.0 / (1.0 - beta2.powi(t as i32))))?;
                    let delta = (m_hat / (v_hat.sqrt()? + *eps)?)?;
                    let next_theta = (p.var.as_tensor() - (delta * *lr)?)?;
                    (next_theta, Some(next_m), next_v)
                }
                (OptimizerConfig::RmsProp { lr, alpha, eps }, _) => {
                    let next_v = ((p.v.as_tensor() * *alpha)? + (g.sqr()? * (1.0 - alpha))?)?;
                    let delta = (&g / (next_v.sqrt()? + *eps)?)?;
                    let next_theta = (p.var.as_tensor() - (delta * *lr)?)?;
                    (next_theta, None, next_v)
                }
                (OptimizerConfig::Adam { .. }, None) => {
                    return Err(anyhow!("first moment of {} is missing", p.name))
                }
            };
            updates.push((p, update));
        }

        for (p, (next_theta, next_m, next_v)) in updates {
            if let (Some(m), Some(next_m)) = (&p.m, next_m) {
                m.set(&next_m)?;
            }
            p.v.set(&next_v)?;
            p.var.set(&next_theta)?;
        }
        self.step_t = t;

        Ok(())
    }

    /// Saves the moment estimates and the step count as safetensors.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut tensors = HashMap::new();
        for p in self.params.iter() {
            if let Some(m) = &p.m {
                tensors.insert(format!("m.{}", p.name), m.as_tensor().clone());
            }
            tensors.insert(format!("v.{}", p.name), p.v.as_tensor().clone());
        }
        let device = self
            .params
            .first()
            .map(|p| p.var.device().clone())
            .unwrap_or(candle_core::Device::Cpu);
        tensors.insert(
            "step".to_string(),
            Tensor::new(&[i64::try_from(self.step_t)?], &device)?,
        );
        candle_core::safetensors::save(&tensors, path)?;
        Ok(())
    }

    /// Restores the state written by [`Optimizer::save`].
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let device = self
            .params
            .first()
            .map(|p| p.var.device().clone())
            .unwrap_or(candle_core::Device::Cpu);
        let tensors = candle_core::safetensors::load(path, &device)?;
        let get = |k: &str| {
            tensors
                .get(k)
                .ok_or_else(|| anyhow!("{} is missing in the optimizer state", k))
        };

        for p in self.params.iter() {
            if let Some(m) = &p.m {
                m.set(get(&format!("m.{}", p.name))?)?;
            }
            p.v.set(get(&format!("v.{}", p.name))?)?;
        }
        let step = get("step")?.to_dtype(DType::I64)?.to_vec1::<i64>()?;
        self.step_t = usize::try_from(step.first().copied().unwrap_or(0))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use tempdir::TempDir;

    fn quadratic_step(opt: &mut Optimizer, x: &Var, scale: f64) -> Result<()> {
        let loss = x.as_tensor().sqr()?.sum_all()?;
        let grads = loss.backward()?;
        opt.step(&grads, scale)
    }

    #[test]
    fn test_adam_minimizes_quadratic() -> Result<()> {
        let x = Var::new(&[3f32, -2.0], &Device::Cpu)?;
        let mut opt = OptimizerConfig::default()
            .learning_rate(0.1)
            .build(vec![("x".to_string(), x.clone())])?;
        for _ in 0..200 {
            quadratic_step(&mut opt, &x, 1.0)?;
        }
        let v = x.as_tensor().to_vec1::<f32>()?;
        assert!(v.iter().all(|e| e.abs() < 0.1), "{:?}", v);
        assert_eq!(opt.n_steps(), 200);
        Ok(())
    }

    #[test]
    fn test_rmsprop_first_step() -> Result<()> {
        let x = Var::new(&[1f32], &Device::Cpu)?;
        let config = OptimizerConfig::RmsProp {
            lr: 0.01,
            alpha: 0.99,
            eps: 1e-8,
        };
        let mut opt = config.build(vec![("x".to_string(), x.clone())])?;
        quadratic_step(&mut opt, &x, 1.0)?;

        // g = 2, v = 0.01 * 4, step = lr * g / sqrt(v) = 0.1
        let v = x.as_tensor().to_vec1::<f32>()?[0];
        assert!((v - 0.9).abs() < 1e-4, "{}", v);
        Ok(())
    }

    #[test]
    fn test_zero_scale_keeps_parameters() -> Result<()> {
        let x = Var::new(&[1f32, 2.0], &Device::Cpu)?;
        let mut opt = OptimizerConfig::default().build(vec![("x".to_string(), x.clone())])?;
        quadratic_step(&mut opt, &x, 0.0)?;
        assert_eq!(x.as_tensor().to_vec1::<f32>()?, vec![1.0, 2.0]);
        Ok(())
    }

    #[test]
    fn test_save_load_state() -> Result<()> {
        let dir = TempDir::new("opt")?;
        let path = dir.path().join("opt.safetensors");

        let x = Var::new(&[3f32, -2.0], &Device::Cpu)?;
        let mut opt = OptimizerConfig::default().build(vec![("x".to_string(), x.clone())])?;
        for _ in 0..5 {
            quadratic_step(&mut opt, &x, 1.0)?;
        }
        opt.save(&path)?;

        // Same parameter values, fresh moments restored from the file.
        let y = Var::new(&x.as_tensor().to_vec1::<f32>()?[..], &Device::Cpu)?;
        let mut opt2 = OptimizerConfig::default().build(vec![("x".to_string(), y.clone())])?;
        opt2.load(&path)?;
        assert_eq!(opt2.n_steps(), 5);

        quadratic_step(&mut opt, &x, 1.0)?;
        quadratic_step(&mut opt2, &y, 1.0)?;
        assert_eq!(
            x.as_tensor().to_vec1::<f32>()?,
            y.as_tensor().to_vec1::<f32>()?
        );
        Ok(())
    }

    #[test]
    fn test_save_load_keeps_large_step_count() -> Result<()> {
        let dir = TempDir::new("opt")?;
        let path = dir.path().join("opt.safetensors");
        let n_steps = u32::MAX as usize + 7;

        let x = Var::new(&[1f32], &Device::Cpu)?;
        let mut opt = OptimizerConfig::default().build(vec![("x".to_string(), x.clone())])?;
        opt.step_t = n_steps;
        opt.save(&path)?;

        let mut opt2 = OptimizerConfig::default().build(vec![("x".to_string(), x)])?;
        opt2.load(&path)?;
        assert_eq!(opt2.n_steps(), n_steps);
        Ok(())
    }
}
