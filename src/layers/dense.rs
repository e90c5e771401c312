use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::math::matrix::Matrix;

/// Fully-connected layer: `y = W·x + b` with `W` of shape `(out, in)`.
///
/// The same type doubles as the gradient accumulator for itself (see
/// [`Dense::zeros_like`]), so optimizers can walk parameters and gradients in
/// lockstep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    pub in_features: usize,
    pub out_features: usize,
    pub weights: Matrix,
    pub biases: Vec<f64>,
}

impl Dense {
    /// He-initialised weights, zero biases. Use in front of ReLU.
    pub fn he<R: Rng + ?Sized>(in_features: usize, out_features: usize, rng: &mut R) -> Dense {
        Dense {
            in_features,
            out_features,
            weights: Matrix::he(out_features, in_features, rng),
            biases: vec![0.0; out_features],
        }
    }

    /// Xavier-initialised weights, zero biases. Use for the output layer.
    pub fn xavier<R: Rng + ?Sized>(in_features: usize, out_features: usize, rng: &mut R) -> Dense {
        Dense {
            in_features,
            out_features,
            weights: Matrix::xavier(out_features, in_features, rng),
            biases: vec![0.0; out_features],
        }
    }

    pub fn zeros_like(&self) -> Dense {
        Dense {
            in_features: self.in_features,
            out_features: self.out_features,
            weights: Matrix::zeros(self.out_features, self.in_features),
            biases: vec![0.0; self.out_features],
        }
    }

    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut z = self.weights.matvec(input);
        for (v, b) in z.iter_mut().zip(&self.biases) {
            *v += b;
        }
        z
    }

    /// Accumulates `∂L/∂W` and `∂L/∂b` into `grads` and returns `∂L/∂x`.
    ///
    /// `grad_out` is `∂L/∂y` for this layer's (pre-activation) output.
    pub fn backward(&self, input: &[f64], grad_out: &[f64], grads: &mut Dense) -> Vec<f64> {
        grads.weights.add_outer(grad_out, input);
        for (gb, g) in grads.biases.iter_mut().zip(grad_out) {
            *gb += g;
        }
        self.weights.matvec_transposed(grad_out)
    }
}
