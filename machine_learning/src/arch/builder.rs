use rand::Rng;

use super::{Sequential, activations::ActFn, layers::Layer};
use crate::Result;

/// Builds multilayer classifiers: every hidden block is a `Dense` layer followed by a
/// `BatchNorm` with the hidden activation (relu unless told otherwise), and the output
/// layer yields raw class scores.
#[derive(Clone, Debug)]
pub struct ClassifierBuilder {
    inputs: usize,
    classes: usize,
    hidden: Vec<usize>,
    activation: ActFn,
}

impl ClassifierBuilder {
    /// The hidden layer sizes used when none are given.
    pub const DEFAULT_HIDDEN: [usize; 2] = [64, 32];

    /// Creates a new `ClassifierBuilder`.
    ///
    /// # Arguments
    /// * `inputs` - The amount of features of each sample.
    /// * `classes` - The amount of classes to score.
    pub fn new(inputs: usize, classes: usize) -> Self {
        Self {
            inputs,
            classes,
            hidden: Self::DEFAULT_HIDDEN.to_vec(),
            activation: ActFn::relu(),
        }
    }

    /// Replaces the hidden layer sizes.
    pub fn hidden(mut self, hidden: &[usize]) -> Self {
        self.hidden = hidden.to_vec();
        self
    }

    /// Replaces the activation applied after every hidden block.
    pub fn activation(mut self, activation: ActFn) -> Self {
        self.activation = activation;
        self
    }

    /// The layers of the classifier, in order.
    pub fn layers(&self) -> Vec<Layer> {
        let mut layers = Vec::with_capacity(2 * self.hidden.len() + 1);
        let mut prev = self.inputs;

        for &dim in &self.hidden {
            layers.push(Layer::dense((prev, dim), None));
            layers.push(Layer::batch_norm(dim, Some(self.activation.clone())));
            prev = dim;
        }

        layers.push(Layer::dense((prev, self.classes), None));
        layers
    }

    /// Builds the classifier, initializing it's parameters with `rng`.
    pub fn build<R: Rng>(&self, rng: &mut R) -> Result<Sequential> {
        Sequential::new(self.layers(), rng)
    }
}
