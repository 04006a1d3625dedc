use super::Optimizer;
use crate::{MlErr, Result};

/// Adaptive moment estimation, keeps a running average of the gradient and of it's
/// square for every parameter.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    beta1_t: f32,
    beta2_t: f32,
    m: Box<[f32]>,
    v: Box<[f32]>,
    epsilon: f32,
}

impl Adam {
    pub const BETA1: f32 = 0.9;
    pub const BETA2: f32 = 0.999;
    pub const EPSILON: f32 = 1e-8;

    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization algorithm.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(len: usize, learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            m: vec![0.; len].into_boxed_slice(),
            v: vec![0.; len].into_boxed_slice(),
            epsilon,
        }
    }

    /// Creates a new `Adam` optimizer with the usual hyperparameters.
    pub fn with_learning_rate(len: usize, learning_rate: f32) -> Self {
        Self::new(len, learning_rate, Self::BETA1, Self::BETA2, Self::EPSILON)
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        if grad.len() != params.len() || grad.len() != self.m.len() {
            return Err(MlErr::SizeMismatch {
                what: "gradient and adam moments",
                got: grad.len(),
                expected: self.m.len(),
            });
        }

        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let bc1 = 1. - self.beta1_t;
        let bc2 = 1. - self.beta2_t;
        let step_size = lr / bc1;

        params
            .iter_mut()
            .zip(grad)
            .zip(self.m.iter_mut())
            .zip(self.v.iter_mut())
            .for_each(|(((p, g), m), v)| {
                *m = b1 * *m + (1. - b1) * g;
                *v = b2 * *v + (1. - b2) * g.powi(2);
                *p -= step_size * *m / ((*v / bc2).sqrt() + eps);
            });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_has_the_length_of_the_learning_rate() {
        let mut adam = Adam::with_learning_rate(3, 0.1);
        let mut params = [0.0, 0.0, 1.0];
        adam.update_params(&[4.0, -0.5, 0.0], &mut params).unwrap();

        assert!((params[0] + 0.1).abs() < 1e-5);
        assert!((params[1] - 0.1).abs() < 1e-5);
        assert_eq!(params[2], 1.0);
    }

    #[test]
    fn minimizes_a_quadratic() {
        let mut adam = Adam::with_learning_rate(1, 0.1);
        let mut params = [5.0];

        for _ in 0..1000 {
            let grad = [2.0 * (params[0] - 2.0)];
            adam.update_params(&grad, &mut params).unwrap();
        }

        assert!((params[0] - 2.0).abs() < 5e-2);
    }

    #[test]
    fn size_mismatch() {
        let mut adam = Adam::with_learning_rate(2, 0.1);
        let mut params = [0.0; 3];
        assert!(adam.update_params(&[0.0; 3], &mut params).is_err());
    }
}
