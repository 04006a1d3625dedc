use ndarray::{Array2, ArrayView2, Axis};

use super::LossFn;
use crate::{MlErr, Result};

/// Cross entropy over the softmax of raw class scores.
#[derive(Default, Clone, Copy, Debug)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }

    /// Computes the row wise softmax of the scores, shifted by the row maximum for
    /// numerical stability.
    pub fn softmax(y_pred: ArrayView2<f32>) -> Array2<f32> {
        let mut probs = y_pred.to_owned();

        for mut row in probs.axis_iter_mut(Axis(0)) {
            let max = row.fold(f32::NEG_INFINITY, |m, &x| m.max(x));
            row.mapv_inplace(|x| (x - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|x| x / sum);
        }

        probs
    }

    fn check(y_pred: &ArrayView2<f32>, y: &[usize]) -> Result<()> {
        if y_pred.nrows() != y.len() {
            return Err(MlErr::SizeMismatch {
                what: "predictions and labels",
                got: y.len(),
                expected: y_pred.nrows(),
            });
        }

        if y.is_empty() {
            return Err(MlErr::EmptyBatch);
        }

        let classes = y_pred.ncols();
        match y.iter().find(|&&label| label >= classes) {
            Some(&label) => Err(MlErr::LabelOutOfRange { label, classes }),
            None => Ok(()),
        }
    }
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: &[usize]) -> Result<f32> {
        Self::check(&y_pred, y)?;
        let probs = Self::softmax(y_pred);

        let total: f32 = probs
            .axis_iter(Axis(0))
            .zip(y)
            .map(|(row, &label)| -row[label].max(f32::MIN_POSITIVE).ln())
            .sum();

        Ok(total / y.len() as f32)
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: &[usize]) -> Result<Array2<f32>> {
        Self::check(&y_pred, y)?;
        let mut d = Self::softmax(y_pred);
        let n = y.len() as f32;

        for (mut row, &label) in d.axis_iter_mut(Axis(0)).zip(y) {
            row[label] -= 1.;
            row.mapv_inplace(|x| x / n);
        }

        Ok(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn uniform_scores() {
        let y_pred = array![[0., 0.], [1., 1.]];
        let loss = CrossEntropy.loss(y_pred.view(), &[0, 1]).unwrap();
        assert!((loss - 2f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn gradient_rows_sum_to_zero() {
        let y_pred = array![[2., -1., 0.5], [0., 3., 1.]];
        let d = CrossEntropy.loss_prime(y_pred.view(), &[2, 1]).unwrap();

        for row in d.axis_iter(Axis(0)) {
            assert!(row.sum().abs() < 1e-6);
        }
        assert!(d[[0, 2]] < 0.);
        assert!(d[[1, 1]] < 0.);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let y_pred = array![[0.3, -0.2, 0.9]];
        let y = [1];
        let d = CrossEntropy.loss_prime(y_pred.view(), &y).unwrap();

        let h = 1e-3;
        for j in 0..3 {
            let mut plus = y_pred.clone();
            plus[[0, j]] += h;
            let mut minus = y_pred.clone();
            minus[[0, j]] -= h;

            let numeric = (CrossEntropy.loss(plus.view(), &y).unwrap()
                - CrossEntropy.loss(minus.view(), &y).unwrap())
                / (2. * h);

            assert!((numeric - d[[0, j]]).abs() < 1e-2);
        }
    }

    #[test]
    fn labels_out_of_range() {
        let y_pred = array![[0., 0.]];
        assert!(matches!(
            CrossEntropy.loss(y_pred.view(), &[2]),
            Err(MlErr::LabelOutOfRange { label: 2, classes: 2 })
        ));
    }
}
