use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis, linalg};
use rand::Rng;

use crate::{
    MlErr, Result,
    arch::activations::ActFn,
    initialization::{ParamGen, RandParamGen},
    params::{ParameterState, Tensor},
};

/// A fully connected layer, `x · w + b` followed by an optional activation function.
///
/// The weights are laid out as an `(inputs, outputs)` matrix followed by the biases.
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Option<Array2<f32>>,
    z: Option<Array2<f32>>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The amount of inputs and outputs of the layer.
    /// * `act_fn` - The activation function applied to the output, if any.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: None,
            z: None,
        }
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Initializes the parameters uniformly in `[-1/sqrt(inputs), 1/sqrt(inputs))`.
    pub fn init<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        RandParamGen::fan_in_uniform(rng, params.len(), self.dim.0)?.fill(params)
    }

    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayView2<f32>,
        training: bool,
    ) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense layer inputs",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        let mut z = x.dot(&w);
        z += &b;

        self.x = training.then(|| x.to_owned());
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
        let x = self.x.as_ref().ok_or(MlErr::BackwardBeforeForward)?;

        if d.dim() != (x.nrows(), self.dim.1) {
            return Err(MlErr::SizeMismatch {
                what: "dense layer deltas",
                got: d.len(),
                expected: x.nrows() * self.dim.1,
            });
        }

        if let Some(act_fn) = &self.act_fn {
            let z = self.z.as_ref().ok_or(MlErr::BackwardBeforeForward)?;
            d.zip_mut_with(z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &x.t(), &d, 0.0, &mut dw);
        db.assign(&d.sum_axis(Axis(0)));

        let (w, _) = self.view_params(params)?;
        Ok(d.dot(&w.t()))
    }

    /// Writes this layer's tensors to `state` under `prefix`.
    pub fn export(&self, prefix: &str, params: &[f32], state: &mut ParameterState) -> Result<()> {
        let (w, b) = self.view_params(params)?;
        let (inputs, outputs) = self.dim;

        state.insert(
            format!("{prefix}.weight"),
            Tensor::from_f32(&[inputs, outputs], w.iter().copied().collect())?,
        );
        state.insert(
            format!("{prefix}.bias"),
            Tensor::from_f32(&[outputs], b.to_vec())?,
        );

        Ok(())
    }

    /// Reads this layer's tensors from `state` into `params`.
    pub fn import(&self, prefix: &str, state: &ParameterState, params: &mut [f32]) -> Result<()> {
        self.check_len(params.len())?;
        let (inputs, outputs) = self.dim;
        let (w, b) = params.split_at_mut(inputs * outputs);

        let key = format!("{prefix}.weight");
        state.require(&key)?.copy_f32_into(&key, &[inputs, outputs], w)?;

        let key = format!("{prefix}.bias");
        state.require(&key)?.copy_f32_into(&key, &[outputs], b)
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.size {
            return Err(MlErr::SizeMismatch {
                what: "dense layer parameters",
                got: len,
                expected: self.size,
            });
        }

        Ok(())
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len(grad.len())?;
        let (dw_raw, db_raw) = grad.split_at_mut(self.dim.0 * self.dim.1);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw)?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    fn view_params<'a>(&self, params: &'a [f32]) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len(params.len())?;
        let (w_raw, b_raw) = params.split_at(self.dim.0 * self.dim.1);
        let w = ArrayView2::from_shape(self.dim, w_raw)?;
        let b = ArrayView1::from_shape(self.dim.1, b_raw)?;
        Ok((w, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn forward_is_an_affine_map() {
        let mut dense = Dense::new((2, 1), None);
        let params = [2., -1., 0.5];
        let x = array![[1., 1.], [3., 2.]];

        let y = dense.forward(&params, x.view(), false).unwrap();
        assert_eq!(y, array![[1.5], [4.5]]);
    }

    #[test]
    fn backward_computes_gradients() {
        let mut dense = Dense::new((2, 1), None);
        let params = [2., -1., 0.5];
        let x = array![[1., 1.], [3., 2.]];
        let mut grad = [0.; 3];

        dense.forward(&params, x.view(), true).unwrap();
        let d = dense
            .backward(&params, &mut grad, array![[1.], [2.]])
            .unwrap();

        assert_eq!(grad, [7., 5., 3.]);
        assert_eq!(d, array![[2., -1.], [4., -2.]]);
    }

    #[test]
    fn backward_requires_a_training_forward() {
        let mut dense = Dense::new((2, 1), None);
        let params = [2., -1., 0.5];
        let mut grad = [0.; 3];

        dense.forward(&params, array![[1., 1.]].view(), false).unwrap();
        assert!(matches!(
            dense.backward(&params, &mut grad, array![[1.]]),
            Err(MlErr::BackwardBeforeForward)
        ));
    }

    #[test]
    fn export_import() {
        let dense = Dense::new((2, 1), None);
        let params = [2., -1., 0.5];
        let mut state = ParameterState::new();
        dense.export("0", &params, &mut state).unwrap();

        assert_eq!(state.require("0.weight").unwrap().shape(), &[2, 1]);
        assert_eq!(state.require("0.bias").unwrap().shape(), &[1]);

        let mut loaded = [0.; 3];
        dense.import("0", &state, &mut loaded).unwrap();
        assert_eq!(loaded, params);
    }

    #[test]
    fn sigmoid_gradient_matches_finite_differences() {
        let mut dense = Dense::new((2, 1), Some(ActFn::sigmoid(1.)));
        let params = [0.3f32, -0.7, 0.1];
        let x = array![[1f32, 2.]];
        let mut grad = [0.; 3];

        dense.forward(&params, x.view(), true).unwrap();
        dense.backward(&params, &mut grad, array![[1.]]).unwrap();

        let h = 1e-2;
        for i in 0..params.len() {
            let mut p = params;
            p[i] += h;
            let up = dense.forward(&p, x.view(), false).unwrap()[[0, 0]];
            p[i] -= 2. * h;
            let down = dense.forward(&p, x.view(), false).unwrap()[[0, 0]];

            assert!(((up - down) / (2. * h) - grad[i]).abs() < 1e-3);
        }
    }

    #[test]
    fn wrong_inputs() {
        let mut dense = Dense::new((2, 1), None);
        let params = [2., -1., 0.5];
        assert!(dense.forward(&params, array![[1., 1., 1.]].view(), false).is_err());
    }
}
