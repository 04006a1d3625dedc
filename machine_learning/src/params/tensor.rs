use std::fmt::{self, Display};

use ndarray::{ArrayD, ArrayViewD, IxDyn};

use crate::{MlErr, Result};

/// The element type a `Tensor` was declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
    I64,
}

impl DType {
    /// Whether the values of this type can be averaged without a cast.
    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }
}

impl Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I64 => "i64",
        };

        f.write_str(s)
    }
}

/// A named entry of a model's state: an n-dimensional array of some numeric type.
///
/// Besides the trainable weights, a model may track bookkeeping values (such as the
/// amount of batches a normalization layer has seen) which are not floating point.
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    I64(ArrayD<i64>),
}

impl Tensor {
    /// Creates a new `f32` tensor from a shape and it's row major values.
    ///
    /// # Arguments
    /// * `shape` - The dimensions of the tensor.
    /// * `values` - The values, must contain exactly the product of `shape` elements.
    ///
    /// # Returns
    /// The new tensor or an error if the shape doesn't match the amount of values.
    pub fn from_f32(shape: &[usize], values: Vec<f32>) -> Result<Self> {
        Ok(Self::F32(ArrayD::from_shape_vec(IxDyn(shape), values)?))
    }

    /// Creates a new `i64` tensor from a shape and it's row major values.
    ///
    /// # Arguments
    /// * `shape` - The dimensions of the tensor.
    /// * `values` - The values, must contain exactly the product of `shape` elements.
    ///
    /// # Returns
    /// The new tensor or an error if the shape doesn't match the amount of values.
    pub fn from_i64(shape: &[usize], values: Vec<i64>) -> Result<Self> {
        Ok(Self::I64(ArrayD::from_shape_vec(IxDyn(shape), values)?))
    }

    /// Creates a zero dimensional `i64` tensor.
    pub fn scalar_i64(value: i64) -> Self {
        Self::I64(ArrayD::from_elem(IxDyn(&[]), value))
    }

    pub fn dtype(&self) -> DType {
        match self {
            Tensor::F32(_) => DType::F32,
            Tensor::F64(_) => DType::F64,
            Tensor::I64(_) => DType::I64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Tensor::F32(a) => a.shape(),
            Tensor::F64(a) => a.shape(),
            Tensor::I64(a) => a.shape(),
        }
    }

    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_f32(&self) -> Option<ArrayViewD<'_, f32>> {
        match self {
            Tensor::F32(a) => Some(a.view()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<ArrayViewD<'_, i64>> {
        match self {
            Tensor::I64(a) => Some(a.view()),
            _ => None,
        }
    }

    /// Describes the layout of this tensor, used for error reporting.
    pub fn describe(&self) -> String {
        format!("{}{:?}", self.dtype(), self.shape())
    }

    /// Checks whether `other` has the same type and shape as `self`.
    pub fn same_layout(&self, other: &Tensor) -> bool {
        self.dtype() == other.dtype() && self.shape() == other.shape()
    }

    /// Returns the largest absolute elementwise difference between two tensors with the
    /// same layout, computed in `f64`.
    ///
    /// # Returns
    /// `None` if the layouts differ.
    pub fn max_abs_diff(&self, other: &Tensor) -> Option<f64> {
        if !self.same_layout(other) {
            return None;
        }

        let max = |acc: f64, d: f64| acc.max(d.abs());
        let diff = match (self, other) {
            (Tensor::F32(a), Tensor::F32(b)) => a
                .iter()
                .zip(b)
                .map(|(x, y)| (*x as f64) - (*y as f64))
                .fold(0., max),
            (Tensor::F64(a), Tensor::F64(b)) => a.iter().zip(b).map(|(x, y)| x - y).fold(0., max),
            (Tensor::I64(a), Tensor::I64(b)) => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) as f64)
                .fold(0., max),
            _ => return None,
        };

        Some(diff)
    }

    /// Copies an `f32` tensor into a flat buffer, checking it has the expected shape.
    ///
    /// # Arguments
    /// * `key` - The name of this tensor, used for error reporting.
    /// * `shape` - The expected shape.
    /// * `out` - Where to write the values in row major order.
    pub(crate) fn copy_f32_into(&self, key: &str, shape: &[usize], out: &mut [f32]) -> Result<()> {
        let incompatible = || MlErr::IncompatibleTensor {
            key: key.to_string(),
            expected: format!("{}{shape:?}", DType::F32),
            got: self.describe(),
        };

        let values = self.as_f32().ok_or_else(incompatible)?;
        if values.shape() != shape || values.len() != out.len() {
            return Err(incompatible());
        }

        out.iter_mut().zip(values.iter()).for_each(|(o, v)| *o = *v);
        Ok(())
    }
}
