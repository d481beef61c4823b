//! Multilayer perceptron.
mod base;
mod config;
use crate::util::Activation;
use anyhow::Result;
pub use base::Mlp;
use candle_core::Tensor;
use candle_nn::{Linear, Module};
pub use config::MlpConfig;

/// Applies `layers` with ReLU in between and `final_act`, if any, at the end.
fn mlp_forward(xs: Tensor, layers: &[Linear], final_act: Option<Activation>) -> Result<Tensor> {
    let n_layers = layers.len();
    let mut xs = xs;

    for layer in layers.iter().take(n_layers - 1) {
        xs = layer.forward(&xs)?.relu()?;
    }

    let xs = layers[n_layers - 1].forward(&xs)?;
    match final_act {
        Some(act) => Ok(act.forward(&xs)?),
        None => Ok(xs),
    }
}
