use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::{MlErr, Result};

/// Standardizes features by removing the mean and scaling to unit variance, column wise.
#[derive(Clone, Debug, PartialEq)]
pub struct StandardScaler {
    mean: Array1<f32>,
    scale: Array1<f32>,
}

impl StandardScaler {
    /// Fits the scaler to the population mean and standard deviation of each column of `x`.
    /// Constant columns get a scale of 1.
    pub fn fit(x: ArrayView2<f32>) -> Result<Self> {
        let mean = x.mean_axis(Axis(0)).ok_or(MlErr::EmptyDataset)?;
        let scale = x
            .var_axis(Axis(0), 0.)
            .mapv(|var| if var > 0. { var.sqrt() } else { 1. });

        Ok(Self { mean, scale })
    }

    pub fn mean(&self) -> &Array1<f32> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f32> {
        &self.scale
    }

    /// Standardizes every row of `x`.
    pub fn transform(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.mean.len() {
            return Err(MlErr::SizeMismatch {
                what: "scaler features",
                got: x.ncols(),
                expected: self.mean.len(),
            });
        }

        Ok((&x - &self.mean) / &self.scale)
    }

    /// Standardizes a single sample.
    pub fn transform_row(&self, row: &[f32]) -> Result<Array2<f32>> {
        let x = ArrayView2::from_shape((1, row.len()), row)?;
        self.transform(x)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn standardizes_columns() {
        let x = array![[1f32, 5.], [3., 5.], [5., 5.]];
        let scaler = StandardScaler::fit(x.view()).unwrap();

        assert_eq!(scaler.mean(), &array![3f32, 5.]);
        assert_eq!(scaler.scale()[1], 1.);

        let z = scaler.transform(x.view()).unwrap();
        let std = (8f32 / 3.).sqrt();
        let expected = array![[-2. / std, 0.], [0., 0.], [2. / std, 0.]];
        assert!((&z - &expected).iter().all(|d| d.abs() < 1e-6));
    }

    #[test]
    fn single_row() {
        let scaler = StandardScaler::fit(array![[0f32, 0.], [2., 4.]].view()).unwrap();
        let z = scaler.transform_row(&[2., 0.]).unwrap();
        assert_eq!(z, array![[1f32, -1.]]);
    }

    #[test]
    fn wrong_width() {
        let scaler = StandardScaler::fit(array![[0f32, 1.]].view()).unwrap();
        assert!(scaler.transform_row(&[1.]).is_err());
    }

    #[test]
    fn empty() {
        assert!(StandardScaler::fit(Array2::<f32>::zeros((0, 3)).view()).is_err());
    }
}
