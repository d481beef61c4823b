use super::DuelingConfig;
use crate::{
    model::SubModel1,
    util::{Activation, OutDim},
};
use anyhow::Result;
use candle_core::{Tensor, D};
use candle_nn::{linear, Linear, Module, VarBuilder};
use deepq_core::DeepqError;

/// A stream of the dueling head, a hidden layer with ELU followed by a linear output.
struct Stream {
    hidden: Linear,
    out: Linear,
}

impl Stream {
    fn build(vb: VarBuilder, in_dim: usize, hidden_dim: usize, out_dim: usize) -> Result<Self> {
        Ok(Self {
            hidden: linear(in_dim, hidden_dim, vb.pp("fc"))?,
            out: linear(hidden_dim, out_dim, vb.pp("out"))?,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = Activation::Elu.forward(&self.hidden.forward(xs)?)?;
        Ok(self.out.forward(&xs)?)
    }
}

/// Dueling action-value network.
///
/// A feature network `F` is followed by a state-value stream `V(s)` and an
/// advantage stream `A(s, a)`, combined as
/// `Q(s, a) = V(s) + (A(s, a) - mean_a A(s, a))`.
pub struct Dueling<F> {
    feature: F,
    value: Stream,
    advantage: Stream,
}

impl<F> Dueling<F>
where
    F: SubModel1<Input = Tensor, Output = Tensor>,
{
    /// Returns `V(s)` of shape `[batch, 1]` and `A(s, a)` of shape `[batch, n_actions]`.
    pub fn streams(&self, xs: &Tensor) -> Result<(Tensor, Tensor)> {
        let features = self.feature.forward(xs)?;
        let v = self.value.forward(&features)?;
        let a = self.advantage.forward(&features)?;
        Ok((v, a))
    }
}

impl<F> SubModel1 for Dueling<F>
where
    F: SubModel1<Input = Tensor, Output = Tensor>,
    F::Config: OutDim,
{
    type Config = DuelingConfig<F::Config>;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, xs: &Self::Input) -> Result<Tensor> {
        let (v, a) = self.streams(xs)?;
        let a_mean = a.mean_keepdim(D::Minus1)?;
        Ok(v.broadcast_add(&a.broadcast_sub(&a_mean)?)?)
    }

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        let feature_dim = config.feature_config.get_out_dim();
        if feature_dim == 0 || config.hidden_dim == 0 || config.n_actions == 0 {
            return Err(DeepqError::invalid_config(format!(
                "dueling dimensions must be positive: feature = {}, hidden = {}, actions = {}",
                feature_dim, config.hidden_dim, config.n_actions
            ))
            .into());
        }
        let feature = F::build(vb.pp("feature"), config.feature_config)?;
        let value = Stream::build(vb.pp("value"), feature_dim, config.hidden_dim, 1)?;
        let advantage = Stream::build(
            vb.pp("advantage"),
            feature_dim,
            config.hidden_dim,
            config.n_actions,
        )?;

        Ok(Self {
            feature,
            value,
            advantage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlp::{Mlp, MlpConfig};
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn dueling() -> Result<Dueling<Mlp>> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = DuelingConfig::new(MlpConfig::new(6, vec![16], 8, true), 16, 4);
        Dueling::build(vb, config)
    }

    fn probe() -> Result<Tensor> {
        Ok(Tensor::arange(0f32, 18f32, &Device::Cpu)?
            .affine(0.1, -0.5)?
            .reshape((3, 2, 3))?)
    }

    #[test]
    fn test_value_cancels_in_action_differences() -> Result<()> {
        let net = dueling()?;
        let xs = probe()?;
        let q = net.forward(&xs)?.to_vec2::<f32>()?;
        let (_, a) = net.streams(&xs)?;
        let a = a.to_vec2::<f32>()?;

        for (q, a) in q.iter().zip(a.iter()) {
            assert_eq!(q.len(), 4);
            for i in 0..4 {
                for j in 0..4 {
                    assert!(((q[i] - q[j]) - (a[i] - a[j])).abs() < 1e-5);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_mean_action_value_is_state_value() -> Result<()> {
        let net = dueling()?;
        let xs = probe()?;
        let q_mean = net.forward(&xs)?.mean(D::Minus1)?.to_vec1::<f32>()?;
        let (v, _) = net.streams(&xs)?;
        let v = v.squeeze(D::Minus1)?.to_vec1::<f32>()?;

        for (q, v) in q_mean.iter().zip(v.iter()) {
            assert!((q - v).abs() < 1e-5);
        }
        Ok(())
    }
}
