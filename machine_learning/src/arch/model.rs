use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::{
    MlErr, Result, arch::loss::LossFn, dataset::Batch, optimization::Optimizer,
    params::ParameterState,
};

/// A trainable model, independent of it's architecture.
///
/// Cloning a model must produce a fully independent copy, parameters included.
pub trait Model: Clone {
    /// Returns the amount of trainable parameters in the model.
    fn size(&self) -> usize;

    /// Computes the class scores for a batch of feature rows.
    fn forward(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Propagates the loss derivative of the last forward pass back through the model,
    /// leaving the gradient ready for `optimize`.
    fn backward(&mut self, d: Array2<f32>) -> Result<()>;

    /// Applies the last computed gradient to the parameters.
    fn optimize<O: Optimizer>(&mut self, optimizer: &mut O) -> Result<()>;

    /// Takes a snapshot of every tensor of the model, tracked buffers included.
    fn parameters(&self) -> Result<ParameterState>;

    /// Replaces the entire state of the model. Nothing is modified if `state` isn't
    /// compatible with the model.
    fn load_parameters(&mut self, state: &ParameterState) -> Result<()>;

    /// Sets the model in training mode, normalization layers use batch statistics.
    fn train_mode(&mut self);

    /// Sets the model in evaluation mode, forward passes don't modify the model's state.
    fn eval_mode(&mut self);

    fn is_training(&self) -> bool;

    /// Predicts the class of every row of `x`.
    fn predict(&mut self, x: ArrayView2<f32>) -> Result<Vec<usize>> {
        let scores = self.forward(x)?;
        Ok(scores.axis_iter(Axis(0)).map(argmax).collect())
    }

    /// Runs one pass over the given batches, updating the parameters after each of them.
    ///
    /// # Arguments
    /// * `optimizer` - The optimizer that dictates how to update the parameters.
    /// * `loss_fn` - The loss function.
    /// * `batches` - The batches of data.
    ///
    /// # Returns
    /// The epoch loss.
    fn backprop<'a, O, L, I>(&mut self, optimizer: &mut O, loss_fn: &L, batches: I) -> Result<f32>
    where
        O: Optimizer,
        L: LossFn,
        I: IntoIterator<Item = Batch<'a>>,
    {
        // NOTE: the epoch loss is approximated as the mean of the batch losses, getting the
        // actual one would require another forward pass over the whole dataset.
        let mut total_loss = 0.0;
        let mut num_batches = 0;

        for batch in batches {
            let y_pred = self.forward(batch.x.view())?;
            total_loss += loss_fn.loss(y_pred.view(), &batch.y)?;
            num_batches += 1;

            let d = loss_fn.loss_prime(y_pred.view(), &batch.y)?;
            self.backward(d)?;
            self.optimize(optimizer)?;
        }

        if num_batches == 0 {
            return Err(MlErr::EmptyDataset);
        }

        Ok(total_loss / num_batches as f32)
    }
}

/// The index of the largest score, the first one on ties.
pub(crate) fn argmax(row: ArrayView1<f32>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, max), (i, &x)| {
            if x > max { (i, x) } else { (best, max) }
        })
        .0
}
