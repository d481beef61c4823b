//! Utilities.
use anyhow::{anyhow, Result};
use candle_core::{backprop::GradStore, Tensor, Var};
use candle_nn::VarMap;
use log::trace;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

/// Critic loss type.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub enum CriticLoss {
    /// Mean squared error.
    Mse,

    /// Smooth L1 loss.
    SmoothL1,
}

impl CriticLoss {
    /// Per-sample loss between predictions `x` and targets `y`.
    pub fn elementwise(&self, x: &Tensor, y: &Tensor) -> Result<Tensor> {
        match self {
            Self::Mse => Ok((x - y)?.sqr()?),
            Self::SmoothL1 => smooth_l1(x, y),
        }
    }

    /// Mean loss, each sample weighted by `weight` if given.
    pub fn loss(&self, x: &Tensor, y: &Tensor, weight: Option<&Tensor>) -> Result<Tensor> {
        let l = self.elementwise(x, y)?;
        let l = match weight {
            Some(w) => (l * w)?,
            None => l,
        };
        Ok(l.mean_all()?)
    }
}

/// Elementwise smooth L1 loss without reduction.
///
/// See <https://pytorch.org/docs/stable/generated/torch.nn.SmoothL1Loss.html>.
pub fn smooth_l1(x: &Tensor, y: &Tensor) -> Result<Tensor> {
    let d = (x - y)?.abs()?;
    let quadratic = (d.sqr()? * 0.5)?;
    let linear = d.affine(1.0, -0.5)?;
    Ok(d.lt(1.0)?.where_cond(&quadratic, &linear)?)
}

/// Activation function between layers.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy, Default)]
pub enum Activation {
    /// Rectified linear unit.
    #[default]
    Relu,

    /// Exponential linear unit with `alpha = 1`.
    Elu,
}

impl Activation {
    /// Applies the activation function.
    pub fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            Self::Relu => xs.relu(),
            Self::Elu => xs.elu(1.0),
        }
    }
}

/// Computes TD targets `r + gamma * max_a Q_tgt(s', a)`.
///
/// `is_done` is a `u8` mask. For terminal transitions the target is the
/// reward itself, whatever `next_q` holds.
pub fn td_target(reward: &Tensor, is_done: &Tensor, next_q: &Tensor, gamma: f64) -> Result<Tensor> {
    let bootstrapped = (reward + (next_q * gamma)?)?;
    Ok(is_done.where_cond(reward, &bootstrapped)?)
}

/// Global L2 norm of the gradients of `vars`.
pub fn grad_norm<'a>(grads: &GradStore, vars: impl Iterator<Item = &'a Var>) -> Result<f32> {
    let mut sum = 0f32;
    for var in vars {
        if let Some(g) = grads.get(var) {
            sum += g.sqr()?.sum_all()?.to_scalar::<f32>()?;
        }
    }
    Ok(sum.sqrt())
}

/// Factor scaling gradients of norm `norm` down to `max_norm`.
pub fn clip_coef(norm: f32, max_norm: Option<f64>) -> f64 {
    match max_norm {
        Some(max_norm) if norm as f64 > max_norm => max_norm / (norm as f64 + 1e-6),
        _ => 1.0,
    }
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    m.lock().map_err(|_| anyhow!("poisoned lock of variables"))
}

/// Copies the values of variables in `src` into the variables of `dest`
/// with the same names.
///
/// Values are copied into the storage of `dest`, which shares nothing with
/// `src` afterwards. Both maps must hold the same names and shapes.
pub fn copy_varmap(dest: &VarMap, src: &VarMap) -> Result<()> {
    let dest = lock(dest.data())?;
    let src = lock(src.data())?;
    if dest.len() != src.len() {
        return Err(anyhow!(
            "variable maps differ in size: {} and {}",
            dest.len(),
            src.len()
        ));
    }

    for (name, v_dest) in dest.iter() {
        let v_src = src
            .get(name)
            .ok_or_else(|| anyhow!("variable {} is missing in the source", name))?;
        trace!("copy {}", name);
        v_dest.set(&v_src.as_tensor().detach())?;
    }

    Ok(())
}

/// Returns detached copies of all variables, keyed by name.
pub fn named_tensors(varmap: &VarMap) -> Result<HashMap<String, Tensor>> {
    let data = lock(varmap.data())?;
    data.iter()
        .map(|(k, v)| -> Result<(String, Tensor)> {
            Ok((k.clone(), v.as_tensor().copy()?.detach()))
        })
        .collect()
}

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;

    /// Sets the output dimension.
    fn set_out_dim(&mut self, v: usize);
}
