//! Interface of neural networks used in the agents.
use anyhow::Result;
use candle_nn::VarBuilder;

/// Neural network model not owing its [`VarMap`] internally.
///
/// Its parameters are created through the given [`VarBuilder`], so that the
/// owner of the [`VarMap`] decides where they live. Two models built from the
/// same configuration with different [`VarMap`]s have independent parameters
/// with identical names.
///
/// [`VarMap`]: candle_nn::VarMap
pub trait SubModel1 {
    /// Configuration from which [`SubModel1`] is constructed.
    type Config;

    /// Input of the [`SubModel1`].
    type Input;

    /// Output of the [`SubModel1`].
    type Output;

    /// Builds [`SubModel1`] with [`VarBuilder`] and [`SubModel1::Config`].
    ///
    /// Fails with [`DeepqError::InvalidConfiguration`] on inconsistent
    /// dimensions.
    ///
    /// [`DeepqError::InvalidConfiguration`]: deepq_core::DeepqError::InvalidConfiguration
    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// A generalized forward function.
    fn forward(&self, input: &Self::Input) -> Result<Self::Output>;
}
