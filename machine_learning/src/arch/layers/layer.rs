use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::{BatchNorm, Dense};
use crate::{Result, arch::activations::ActFn, params::ParameterState};

/// A layer of a `Sequential` model.
///
/// Layers don't own their trainable parameters, the model hands each of them the slice
/// of the flat parameter (and gradient) buffer that belongs to it.
#[derive(Clone, Debug)]
pub enum Layer {
    Dense(Dense),
    BatchNorm(BatchNorm),
}

impl Layer {
    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::Dense(Dense::new(dim, act_fn))
    }

    pub fn batch_norm(dim: usize, act_fn: Option<ActFn>) -> Self {
        Self::BatchNorm(BatchNorm::new(dim, act_fn))
    }

    /// The amount of trainable parameters of this layer.
    pub fn size(&self) -> usize {
        match self {
            Self::Dense(l) => l.size(),
            Self::BatchNorm(l) => l.size(),
        }
    }

    /// The amount of features this layer expects.
    pub fn inputs(&self) -> usize {
        match self {
            Self::Dense(l) => l.dim().0,
            Self::BatchNorm(l) => l.dim(),
        }
    }

    /// The amount of features this layer outputs.
    pub fn outputs(&self) -> usize {
        match self {
            Self::Dense(l) => l.dim().1,
            Self::BatchNorm(l) => l.dim(),
        }
    }

    pub fn init<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        match self {
            Self::Dense(l) => l.init(params, rng),
            Self::BatchNorm(l) => l.init(params),
        }
    }

    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayView2<f32>,
        training: bool,
    ) -> Result<Array2<f32>> {
        match self {
            Self::Dense(l) => l.forward(params, x, training),
            Self::BatchNorm(l) => l.forward(params, x, training),
        }
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        match self {
            Self::Dense(l) => l.backward(params, grad, d),
            Self::BatchNorm(l) => l.backward(params, grad, d),
        }
    }

    pub fn export(&self, prefix: &str, params: &[f32], state: &mut ParameterState) -> Result<()> {
        match self {
            Self::Dense(l) => l.export(prefix, params, state),
            Self::BatchNorm(l) => l.export(prefix, params, state),
        }
    }

    pub fn import(
        &mut self,
        prefix: &str,
        state: &ParameterState,
        params: &mut [f32],
    ) -> Result<()> {
        match self {
            Self::Dense(l) => l.import(prefix, state, params),
            Self::BatchNorm(l) => l.import(prefix, state, params),
        }
    }
}
