use std::{
    fmt::{self, Display},
    num::NonZeroUsize,
};

use crate::{MlErr, Result, arch::Model, dataset::Dataset};

/// The amount of correct predictions over a dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Accuracy {
    pub correct: usize,
    pub total: usize,
}

impl Accuracy {
    /// The accuracy as a percentage, in `[0, 100]`.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.;
        }

        100. * self.correct as f64 / self.total as f64
    }
}

impl Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}% ({}/{})", self.percent(), self.correct, self.total)
    }
}

/// Measures the accuracy of `model` over `dataset` in evaluation mode, going through it in
/// batches of `batch_size` samples. The model's state isn't modified and it's mode is
/// restored afterwards.
pub fn evaluate<M: Model>(model: &mut M, dataset: &Dataset, batch_size: NonZeroUsize) -> Result<Accuracy> {
    if dataset.is_empty() {
        return Err(MlErr::EmptyDataset);
    }

    let was_training = model.is_training();
    model.eval_mode();

    let mut correct = 0;
    let res = dataset.batches(batch_size).try_for_each(|batch| {
        let predicted = model.predict(batch.x.view())?;
        correct += predicted
            .iter()
            .zip(batch.y.iter())
            .filter(|(p, y)| p == y)
            .count();
        Ok::<_, MlErr>(())
    });

    if was_training {
        model.train_mode();
    }

    res.map(|_| Accuracy {
        correct,
        total: dataset.len(),
    })
}
