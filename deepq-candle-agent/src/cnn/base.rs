use super::CnnConfig;
use crate::model::SubModel1;
use anyhow::Result;
use candle_core::{DType::F32, Device, Tensor};
use candle_nn::{
    conv::Conv2dConfig,
    conv2d, linear,
    sequential::{seq, Sequential},
    Module, VarBuilder,
};

#[allow(clippy::upper_case_acronyms)]
/// Convolutional neural network, which has the architecture of the DQN paper by default.
///
/// Takes stacked frames of shape `[batch, n_stack, height, width]`.
pub struct Cnn {
    device: Device,
    seq: Sequential,
}

impl Cnn {
    fn stride(s: usize) -> Conv2dConfig {
        Conv2dConfig {
            stride: s,
            ..Default::default()
        }
    }

    fn create_net(vb: &VarBuilder, config: &CnnConfig) -> Result<Sequential> {
        let act = config.activation;
        let scale = config.input_scale;
        let mut net = seq().add_fn(move |xs| xs.to_dtype(F32)?.affine(scale, 0.0));

        let in_channels =
            std::iter::once(config.n_stack).chain(config.out_channels.iter().copied());
        let layers = in_channels
            .zip(config.out_channels.iter())
            .zip(config.kernel_sizes.iter().zip(config.strides.iter()));
        for (i, ((c_in, &c_out), (&k, &s))) in layers.enumerate() {
            net = net
                .add(conv2d(c_in, c_out, k, Self::stride(s), vb.pp(format!("c{}", i + 1)))?)
                .add_fn(move |xs| act.forward(xs));
        }
        net = net.add_fn(|xs| xs.flatten_from(1));

        if !config.skip_linear {
            net = net
                .add(linear(config.flatten_dim()?, config.hidden_dim, vb.pp("l1"))?)
                .add_fn(move |xs| act.forward(xs))
                .add(linear(config.hidden_dim, config.out_dim, vb.pp("l2"))?);
        }

        Ok(net)
    }
}

impl SubModel1 for Cnn {
    type Config = CnnConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, x: &Self::Input) -> Result<Tensor> {
        Ok(self.seq.forward(&x.to_device(&self.device)?)?)
    }

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        config.validate()?;
        let device = vb.device().clone();
        let seq = Self::create_net(&vb, &config)?;

        Ok(Self { device, seq })
    }
}
