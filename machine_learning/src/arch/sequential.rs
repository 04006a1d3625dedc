use std::mem;

use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::{Model, layers::Layer};
use crate::{MlErr, Result, optimization::Optimizer, params::ParameterState};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The trainable parameters of every layer live in a single flat buffer, in layer order.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
    params: Vec<f32>,
    grad: Vec<f32>,
    training: bool,
}

impl Sequential {
    /// Creates a new `Sequential` and initializes it's parameters.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    /// * `rng` - The random number generator used for the initialization.
    ///
    /// # Returns
    /// A new `Sequential` instance or an error if consecutive layers don't fit together.
    pub fn new<I, R>(layers: I, rng: &mut R) -> Result<Self>
    where
        I: IntoIterator<Item = Layer>,
        R: Rng,
    {
        let layers: Vec<Layer> = layers.into_iter().collect();

        if layers.is_empty() {
            return Err(MlErr::SizeMismatch {
                what: "layers",
                got: 0,
                expected: 1,
            });
        }

        for pair in layers.windows(2) {
            if pair[0].outputs() != pair[1].inputs() {
                return Err(MlErr::SizeMismatch {
                    what: "consecutive layer features",
                    got: pair[1].inputs(),
                    expected: pair[0].outputs(),
                });
            }
        }

        let size = layers.iter().map(Layer::size).sum();
        let mut params = vec![0.; size];
        let mut rest = params.as_mut_slice();

        for layer in &layers {
            let (head, tail) = mem::take(&mut rest).split_at_mut(layer.size());
            layer.init(head, rng)?;
            rest = tail;
        }

        Ok(Self {
            layers,
            grad: vec![0.; size],
            params,
            training: true,
        })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// The amount of features the model expects.
    pub fn inputs(&self) -> usize {
        self.layers.first().map_or(0, Layer::inputs)
    }

    /// The amount of classes the model scores.
    pub fn outputs(&self) -> usize {
        self.layers.last().map_or(0, Layer::outputs)
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.params.len()
    }

    fn forward(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let Self {
            layers,
            params,
            training,
            ..
        } = self;

        let mut offset = 0;
        let mut out: Option<Array2<f32>> = None;

        for layer in layers.iter_mut() {
            let size = layer.size();
            let input = out.as_ref().map_or(x.view(), |a| a.view());
            let next = layer.forward(&params[offset..offset + size], input, *training)?;
            out = Some(next);
            offset += size;
        }

        out.ok_or(MlErr::SizeMismatch {
            what: "layers",
            got: 0,
            expected: 1,
        })
    }

    fn backward(&mut self, mut d: Array2<f32>) -> Result<()> {
        let Self {
            layers,
            params,
            grad,
            ..
        } = self;

        let mut end = params.len();

        for layer in layers.iter_mut().rev() {
            let start = end - layer.size();
            d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
            end = start;
        }

        Ok(())
    }

    fn optimize<O: Optimizer>(&mut self, optimizer: &mut O) -> Result<()> {
        optimizer.update_params(&self.grad, &mut self.params)
    }

    fn parameters(&self) -> Result<ParameterState> {
        let mut state = ParameterState::new();
        let mut offset = 0;

        for (i, layer) in self.layers.iter().enumerate() {
            let size = layer.size();
            layer.export(&i.to_string(), &self.params[offset..offset + size], &mut state)?;
            offset += size;
        }

        Ok(state)
    }

    fn load_parameters(&mut self, state: &ParameterState) -> Result<()> {
        self.parameters()?.check_compatible(state)?;

        let Self { layers, params, .. } = self;
        let mut offset = 0;

        for (i, layer) in layers.iter_mut().enumerate() {
            let size = layer.size();
            layer.import(&i.to_string(), state, &mut params[offset..offset + size])?;
            offset += size;
        }

        Ok(())
    }

    fn train_mode(&mut self) {
        self.training = true;
    }

    fn eval_mode(&mut self) {
        self.training = false;
    }

    fn is_training(&self) -> bool {
        self.training
    }
}
