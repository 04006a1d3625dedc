use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis};

use crate::{
    MlErr, Result,
    arch::activations::ActFn,
    params::{ParameterState, Tensor},
};

/// Batch normalization over the features of a batch, followed by an optional
/// activation function.
///
/// While training it normalizes with the statistics of the batch and keeps a running
/// estimate of them, which is what gets used in evaluation mode. The trainable
/// parameters are the scale (`weight`) and the shift (`bias`); the running statistics
/// and the amount of batches seen are tracked buffers.
#[derive(Clone, Debug)]
pub struct BatchNorm {
    dim: usize,
    act_fn: Option<ActFn>,
    momentum: f32,
    eps: f32,

    running_mean: Array1<f32>,
    running_var: Array1<f32>,
    num_batches_tracked: i64,

    // Forward metadata
    x_hat: Option<Array2<f32>>,
    inv_std: Option<Array1<f32>>,
    z: Option<Array2<f32>>,
}

impl BatchNorm {
    pub const MOMENTUM: f32 = 0.1;
    pub const EPS: f32 = 1e-5;

    /// Creates a new `BatchNorm` layer.
    ///
    /// # Arguments
    /// * `dim` - The amount of features to normalize.
    /// * `act_fn` - The activation function applied to the output, if any.
    pub fn new(dim: usize, act_fn: Option<ActFn>) -> Self {
        Self {
            dim,
            act_fn,
            momentum: Self::MOMENTUM,
            eps: Self::EPS,
            running_mean: Array1::zeros(dim),
            running_var: Array1::ones(dim),
            num_batches_tracked: 0,
            x_hat: None,
            inv_std: None,
            z: None,
        }
    }

    /// Returns the amount of trainable parameters this layer has.
    pub fn size(&self) -> usize {
        2 * self.dim
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_batches_tracked(&self) -> i64 {
        self.num_batches_tracked
    }

    pub fn act_fn(&self) -> Option<&ActFn> {
        self.act_fn.as_ref()
    }

    pub fn running_mean(&self) -> ArrayView1<'_, f32> {
        self.running_mean.view()
    }

    /// Initializes the scale to one and the shift to zero.
    pub fn init(&self, params: &mut [f32]) -> Result<()> {
        self.check_len(params.len())?;
        let (gamma, beta) = params.split_at_mut(self.dim);
        gamma.fill(1.);
        beta.fill(0.);
        Ok(())
    }

    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayView2<f32>,
        training: bool,
    ) -> Result<Array2<f32>> {
        if x.ncols() != self.dim {
            return Err(MlErr::SizeMismatch {
                what: "batch norm features",
                got: x.ncols(),
                expected: self.dim,
            });
        }

        if x.nrows() == 0 {
            return Err(MlErr::EmptyBatch);
        }

        let (gamma, beta) = self.view_params(params)?;

        let z = if training {
            let n = x.nrows();
            let mean = x.mean_axis(Axis(0)).ok_or(MlErr::EmptyBatch)?;
            let var = x.var_axis(Axis(0), 0.);
            let inv_std = var.mapv(|v| 1. / (v + self.eps).sqrt());
            let x_hat = (&x - &mean) * &inv_std;

            let unbiased = match n {
                1 => var,
                n => var * (n as f32 / (n - 1) as f32),
            };

            let m = self.momentum;
            self.running_mean = &self.running_mean * (1. - m) + &mean * m;
            self.running_var = &self.running_var * (1. - m) + &unbiased * m;
            self.num_batches_tracked += 1;

            let z = &x_hat * &gamma + &beta;
            self.x_hat = Some(x_hat);
            self.inv_std = Some(inv_std);
            z
        } else {
            let inv_std = self.running_var.mapv(|v| 1. / (v + self.eps).sqrt());
            self.x_hat = None;
            self.inv_std = None;
            (&x - &self.running_mean) * &inv_std * &gamma + &beta
        };

        self.z = None;

        let Some(ref act_fn) = self.act_fn else {
            return Ok(z);
        };

        let a = z.mapv(|z| act_fn.f(z));
        if training {
            self.z = Some(z);
        }

        Ok(a)
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        let (Some(x_hat), Some(inv_std)) = (self.x_hat.as_ref(), self.inv_std.as_ref()) else {
            return Err(MlErr::BackwardBeforeForward);
        };

        if d.dim() != x_hat.dim() {
            return Err(MlErr::SizeMismatch {
                what: "batch norm deltas",
                got: d.len(),
                expected: x_hat.len(),
            });
        }

        if let Some(act_fn) = &self.act_fn {
            let z = self.z.as_ref().ok_or(MlErr::BackwardBeforeForward)?;
            d.zip_mut_with(z, |d, &z| *d *= act_fn.df(z));
        }

        let n = d.nrows() as f32;
        let sum_d = d.sum_axis(Axis(0));
        let sum_d_x_hat = (&d * x_hat).sum_axis(Axis(0));

        let (mut dgamma, mut dbeta) = self.view_grad(grad)?;
        dgamma.assign(&sum_d_x_hat);
        dbeta.assign(&sum_d);

        let (gamma, _) = self.view_params(params)?;
        let scale = &gamma * inv_std / n;
        let dx = (&d * n - &sum_d - &(x_hat * &sum_d_x_hat)) * &scale;

        Ok(dx)
    }

    /// Writes this layer's parameters and tracked buffers to `state` under `prefix`.
    pub fn export(&self, prefix: &str, params: &[f32], state: &mut ParameterState) -> Result<()> {
        let (gamma, beta) = self.view_params(params)?;
        let shape = [self.dim];

        state.insert(
            format!("{prefix}.weight"),
            Tensor::from_f32(&shape, gamma.to_vec())?,
        );
        state.insert(
            format!("{prefix}.bias"),
            Tensor::from_f32(&shape, beta.to_vec())?,
        );
        state.insert(
            format!("{prefix}.running_mean"),
            Tensor::from_f32(&shape, self.running_mean.to_vec())?,
        );
        state.insert(
            format!("{prefix}.running_var"),
            Tensor::from_f32(&shape, self.running_var.to_vec())?,
        );
        state.insert(
            format!("{prefix}.num_batches_tracked"),
            Tensor::scalar_i64(self.num_batches_tracked),
        );

        Ok(())
    }

    /// Reads this layer's parameters from `state` into `params` and it's tracked buffers
    /// into the layer itself.
    pub fn import(
        &mut self,
        prefix: &str,
        state: &ParameterState,
        params: &mut [f32],
    ) -> Result<()> {
        self.check_len(params.len())?;
        let shape = [self.dim];
        let (gamma, beta) = params.split_at_mut(self.dim);

        let key = format!("{prefix}.weight");
        state.require(&key)?.copy_f32_into(&key, &shape, gamma)?;

        let key = format!("{prefix}.bias");
        state.require(&key)?.copy_f32_into(&key, &shape, beta)?;

        let mut buf = vec![0.; self.dim];

        let key = format!("{prefix}.running_mean");
        state.require(&key)?.copy_f32_into(&key, &shape, &mut buf)?;
        self.running_mean = Array1::from(buf.clone());

        let key = format!("{prefix}.running_var");
        state.require(&key)?.copy_f32_into(&key, &shape, &mut buf)?;
        self.running_var = Array1::from(buf);

        let key = format!("{prefix}.num_batches_tracked");
        let tensor = state.require(&key)?;
        self.num_batches_tracked = tensor
            .as_i64()
            .filter(|t| t.ndim() == 0)
            .and_then(|t| t.first().copied())
            .ok_or_else(|| MlErr::IncompatibleTensor {
                key,
                expected: "i64[]".to_string(),
                got: tensor.describe(),
            })?;

        Ok(())
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.size() {
            return Err(MlErr::SizeMismatch {
                what: "batch norm parameters",
                got: len,
                expected: self.size(),
            });
        }

        Ok(())
    }

    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut1<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len(grad.len())?;
        let (dgamma, dbeta) = grad.split_at_mut(self.dim);
        Ok((ArrayViewMut1::from(dgamma), ArrayViewMut1::from(dbeta)))
    }

    fn view_params<'a>(&self, params: &'a [f32]) -> Result<(ArrayView1<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len(params.len())?;
        let (gamma, beta) = params.split_at(self.dim);
        Ok((ArrayView1::from(gamma), ArrayView1::from(beta)))
    }
}
