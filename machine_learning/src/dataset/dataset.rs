use std::{borrow::Cow, num::NonZeroUsize};

use ndarray::{Array2, ArrayView2, Axis, CowArray};
use rand::{Rng, seq::SliceRandom};

use super::Batch;
use crate::{MlErr, Result};

/// An in memory classification dataset: one row of features per sample and it's encoded
/// class label.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    x: Array2<f32>,
    y: Vec<usize>,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `x` - The feature matrix, one row per sample.
    /// * `y` - The class label of each row.
    ///
    /// # Returns
    /// The dataset or an error if the amount of rows and labels differ.
    pub fn new(x: Array2<f32>, y: Vec<usize>) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(MlErr::SizeMismatch {
                what: "dataset labels",
                got: y.len(),
                expected: x.nrows(),
            });
        }

        Ok(Self { x, y })
    }

    /// Creates a new `Dataset` from a row major buffer of features.
    pub fn from_vec(x_size: usize, x: Vec<f32>, y: Vec<usize>) -> Result<Self> {
        let x = Array2::from_shape_vec((y.len(), x_size), x)?;
        Self::new(x, y)
    }

    /// An empty dataset with samples of `x_size` features.
    pub fn empty(x_size: usize) -> Self {
        Self {
            x: Array2::zeros((0, x_size)),
            y: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.y.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// The amount of features of each sample.
    #[inline]
    pub fn x_size(&self) -> usize {
        self.x.ncols()
    }

    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    pub fn y(&self) -> &[usize] {
        &self.y
    }

    /// The amount of classes needed to represent every label of the dataset.
    pub fn num_classes(&self) -> usize {
        self.y.iter().max().map_or(0, |&max| max + 1)
    }

    /// Gathers the samples at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&i) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(MlErr::SizeMismatch {
                what: "dataset index",
                got: i,
                expected: self.len(),
            });
        }

        Ok(Self {
            x: self.x.select(Axis(0), indices),
            y: indices.iter().map(|&i| self.y[i]).collect(),
        })
    }

    /// Splits the dataset in a training and a validation set after shuffling it.
    ///
    /// # Arguments
    /// * `validation_ratio` - The fraction of samples that go to the validation set, rounded up.
    /// * `rng` - The random number generator used for the shuffle.
    ///
    /// # Returns
    /// The `(train, validation)` pair.
    pub fn split<R: Rng + ?Sized>(&self, validation_ratio: f64, rng: &mut R) -> Result<(Self, Self)> {
        if !(0.0..1.0).contains(&validation_ratio) {
            return Err(MlErr::InvalidShape(format!(
                "the validation ratio must be in [0, 1), got {validation_ratio}"
            )));
        }

        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.shuffle(rng);

        let validation = (self.len() as f64 * validation_ratio).ceil() as usize;
        let (val_idx, train_idx) = indices.split_at(validation.min(self.len()));

        Ok((self.select(train_idx)?, self.select(val_idx)?))
    }

    /// Iterates the dataset in order, in batches of `batch_size` samples. The last one
    /// may be shorter.
    pub fn batches(&self, batch_size: NonZeroUsize) -> impl Iterator<Item = Batch<'_>> {
        let n = batch_size.get();

        self.x
            .axis_chunks_iter(Axis(0), n)
            .zip(self.y.chunks(n))
            .map(|(x, y)| Batch::borrowed(x, y))
    }

    /// Iterates a fresh shuffle of the dataset, in batches of `batch_size` samples.
    pub fn shuffled_batches<'a, R>(
        &'a self,
        batch_size: NonZeroUsize,
        rng: &mut R,
    ) -> impl Iterator<Item = Batch<'a>> + use<'a, R>
    where
        R: Rng + ?Sized,
    {
        let n = batch_size.get();
        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.shuffle(rng);

        (0..indices.len()).step_by(n).map(move |start| {
            let chunk = &indices[start..(start + n).min(indices.len())];

            Batch {
                x: CowArray::from(self.x.select(Axis(0), chunk)),
                y: Cow::Owned(chunk.iter().map(|&i| self.y[i]).collect()),
            }
        })
    }
}
