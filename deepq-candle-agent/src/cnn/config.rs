use crate::util::{Activation, OutDim};
use anyhow::Result;
use deepq_core::DeepqError;
use serde::{Deserialize, Serialize};

fn default_input_scale() -> f64 {
    1.0
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Cnn`](super::Cnn).
///
/// The default layers are those of the DQN paper on `84x84` frames.
pub struct CnnConfig {
    pub(super) n_stack: usize,
    pub(super) frame_shape: [usize; 2],
    pub(super) out_channels: Vec<usize>,
    pub(super) kernel_sizes: Vec<usize>,
    pub(super) strides: Vec<usize>,
    pub(super) hidden_dim: usize,
    pub(super) out_dim: usize,
    pub(super) skip_linear: bool,
    #[serde(default)]
    pub(super) activation: Activation,
    #[serde(default = "default_input_scale")]
    pub(super) input_scale: f64,
}

impl CnnConfig {
    /// Constructs [`CnnConfig`] for `n_stack` stacked frames and `out_dim` outputs.
    pub fn new(n_stack: usize, out_dim: usize) -> Self {
        Self {
            n_stack,
            frame_shape: [84, 84],
            out_channels: vec![32, 64, 64],
            kernel_sizes: vec![8, 4, 3],
            strides: vec![4, 2, 1],
            hidden_dim: 512,
            out_dim,
            skip_linear: false,
            activation: Activation::Relu,
            input_scale: default_input_scale(),
        }
    }

    /// Sets the shape `[height, width]` of a preprocessed frame.
    pub fn frame_shape(mut self, v: [usize; 2]) -> Self {
        self.frame_shape = v;
        self
    }

    /// Sets the convolution layers, one entry per layer in each list.
    pub fn conv_layers(
        mut self,
        out_channels: Vec<usize>,
        kernel_sizes: Vec<usize>,
        strides: Vec<usize>,
    ) -> Self {
        self.out_channels = out_channels;
        self.kernel_sizes = kernel_sizes;
        self.strides = strides;
        self
    }

    /// Sets the width of the hidden linear layer.
    pub fn hidden_dim(mut self, v: usize) -> Self {
        self.hidden_dim = v;
        self
    }

    /// If `true`, the network ends with the flattened convolution output.
    pub fn skip_linear(mut self, v: bool) -> Self {
        self.skip_linear = v;
        self
    }

    /// Sets the activation function between layers.
    pub fn activation(mut self, v: Activation) -> Self {
        self.activation = v;
        self
    }

    /// Sets the factor applied to the input, e.g. `1 / 255` for raw pixels.
    pub fn input_scale(mut self, v: f64) -> Self {
        self.input_scale = v;
        self
    }

    /// Spatial shape of the output of each convolution layer.
    ///
    /// Fails if the lists have different lengths or a layer output would be empty.
    pub fn conv_output_shapes(&self) -> Result<Vec<[usize; 2]>> {
        let n = self.out_channels.len();
        if n == 0 || self.kernel_sizes.len() != n || self.strides.len() != n {
            return Err(DeepqError::invalid_config(format!(
                "convolution layer lists must be non-empty and of the same length: \
                 out_channels {:?}, kernel_sizes {:?}, strides {:?}",
                self.out_channels, self.kernel_sizes, self.strides
            ))
            .into());
        }

        let mut shape = self.frame_shape;
        let mut shapes = Vec::with_capacity(n);
        for (i, (&k, &s)) in self.kernel_sizes.iter().zip(self.strides.iter()).enumerate() {
            if k == 0 || s == 0 || self.out_channels[i] == 0 || shape[0] < k || shape[1] < k {
                return Err(DeepqError::invalid_config(format!(
                    "convolution layer {} (kernel {}, stride {}, channels {}) does not fit {:?}",
                    i, k, s, self.out_channels[i], shape
                ))
                .into());
            }
            shape = [(shape[0] - k) / s + 1, (shape[1] - k) / s + 1];
            shapes.push(shape);
        }

        Ok(shapes)
    }

    /// Number of elements of the flattened convolution output.
    pub fn flatten_dim(&self) -> Result<usize> {
        let shapes = self.conv_output_shapes()?;
        let [h, w] = shapes[shapes.len() - 1];
        Ok(self.out_channels[self.out_channels.len() - 1] * h * w)
    }

    pub(super) fn validate(&self) -> Result<()> {
        self.conv_output_shapes()?;
        if self.n_stack == 0 || (!self.skip_linear && (self.hidden_dim == 0 || self.out_dim == 0)) {
            return Err(DeepqError::invalid_config(format!(
                "CNN dimensions must be positive: n_stack = {}, hidden_dim = {}, out_dim = {}",
                self.n_stack, self.hidden_dim, self.out_dim
            ))
            .into());
        }
        Ok(())
    }
}

impl OutDim for CnnConfig {
    /// Returns the flattened convolution output size if `skip_linear` is set.
    fn get_out_dim(&self) -> usize {
        match self.skip_linear {
            true => self.flatten_dim().unwrap_or(0),
            false => self.out_dim,
        }
    }

    fn set_out_dim(&mut self, v: usize) {
        self.out_dim = v;
    }
}
