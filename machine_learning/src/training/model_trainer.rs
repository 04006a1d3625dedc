use std::num::NonZeroUsize;

use log::debug;
use rand::Rng;

use crate::{
    MlErr, Result,
    arch::{Model, loss::LossFn},
    dataset::Dataset,
    optimization::Optimizer,
};

/// A model trainer. Contains the components needed for training a model besides the model
/// itself and the data.
#[derive(Clone, Debug)]
pub struct ModelTrainer<O, L>
where
    O: Optimizer,
    L: LossFn,
{
    optimizer: O,
    loss_fn: L,
    epochs: NonZeroUsize,
    batch_size: NonZeroUsize,
}

impl<O, L> ModelTrainer<O, L>
where
    O: Optimizer,
    L: LossFn,
{
    /// Returns a new `ModelTrainer`.
    ///
    /// # Arguments
    /// * `optimizer` - The optimizer used to update the model's parameters.
    /// * `loss_fn` - The loss function used to measure the difference between a model's output and the expected one.
    /// * `epochs` - The amount of passes over the dataset per `train` call.
    /// * `batch_size` - The maximum amount of samples per parameter update.
    pub fn new(optimizer: O, loss_fn: L, epochs: NonZeroUsize, batch_size: NonZeroUsize) -> Self {
        Self {
            optimizer,
            loss_fn,
            epochs,
            batch_size,
        }
    }

    /// Trains `model` in training mode for `epochs` epochs, every epoch over a fresh
    /// shuffle of `dataset`.
    ///
    /// # Returns
    /// The loss of each epoch, or an error if the dataset is empty.
    pub fn train<M, R>(&mut self, model: &mut M, dataset: &Dataset, rng: &mut R) -> Result<Vec<f32>>
    where
        M: Model,
        R: Rng + ?Sized,
    {
        if dataset.is_empty() {
            return Err(MlErr::EmptyDataset);
        }

        model.train_mode();
        let mut losses = Vec::with_capacity(self.epochs.get());

        for epoch in 0..self.epochs.get() {
            let batches = dataset.shuffled_batches(self.batch_size, rng);
            let loss = model.backprop(&mut self.optimizer, &self.loss_fn, batches)?;

            debug!(epoch = epoch, loss = loss; "finished epoch");
            losses.push(loss);
        }

        Ok(losses)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{arch::ClassifierBuilder, arch::loss::CrossEntropy, optimization::Adam};

    #[test]
    fn empty_dataset() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut model = ClassifierBuilder::new(2, 2).build(&mut rng).unwrap();
        let adam = Adam::with_learning_rate(model.size(), 0.01);
        let mut trainer = ModelTrainer::new(adam, CrossEntropy, 1.try_into().unwrap(), 4.try_into().unwrap());

        let res = trainer.train(&mut model, &Dataset::empty(2), &mut rng);
        assert!(matches!(res, Err(MlErr::EmptyDataset)));
    }

    #[test]
    fn one_loss_per_epoch() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut model = ClassifierBuilder::new(2, 2).build(&mut rng).unwrap();
        let adam = Adam::with_learning_rate(model.size(), 0.01);
        let mut trainer = ModelTrainer::new(adam, CrossEntropy, 3.try_into().unwrap(), 2.try_into().unwrap());
        let dataset = Dataset::new(array![[0., 1.], [1., 0.], [1., 1.]], vec![0, 1, 1]).unwrap();

        let losses = trainer.train(&mut model, &dataset, &mut rng).unwrap();
        assert_eq!(losses.len(), 3);
        assert!(losses.iter().all(|l| l.is_finite()));
    }
}
