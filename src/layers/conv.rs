use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::math::{matrix::Matrix, tensor::Tensor};

/// 2-D convolution with a square kernel, stride 1 and no padding.
///
/// Kernels are stored as a `(out_channels, in_channels * k * k)` matrix whose
/// rows are laid out `[c][ky][kx]`, so each row's length is the fan-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conv2d {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: usize,
    pub weights: Matrix,
    pub biases: Vec<f64>,
}

impl Conv2d {
    pub fn he<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        rng: &mut R,
    ) -> Conv2d {
        Conv2d {
            in_channels,
            out_channels,
            kernel_size,
            weights: Matrix::he(out_channels, in_channels * kernel_size * kernel_size, rng),
            biases: vec![0.0; out_channels],
        }
    }

    pub fn zeros_like(&self) -> Conv2d {
        Conv2d {
            in_channels: self.in_channels,
            out_channels: self.out_channels,
            kernel_size: self.kernel_size,
            weights: Matrix::zeros(self.weights.rows, self.weights.cols),
            biases: vec![0.0; self.out_channels],
        }
    }

    /// Spatial output size for an `h × w` input. `None` if the kernel does not fit.
    pub fn output_size(&self, h: usize, w: usize) -> Option<(usize, usize)> {
        let k = self.kernel_size;
        if h < k || w < k {
            return None;
        }
        Some((h - k + 1, w - k + 1))
    }

    #[inline]
    fn kernel_col(&self, c: usize, ky: usize, kx: usize) -> usize {
        (c * self.kernel_size + ky) * self.kernel_size + kx
    }

    pub fn forward(&self, input: &Tensor) -> Tensor {
        debug_assert_eq!(input.channels, self.in_channels);
        let k = self.kernel_size;
        let (oh, ow) = (input.height + 1 - k, input.width + 1 - k);
        let mut out = Tensor::zeros(self.out_channels, oh, ow);

        for o in 0..self.out_channels {
            let kernel = self.weights.row(o);
            for y in 0..oh {
                for x in 0..ow {
                    let mut acc = self.biases[o];
                    for c in 0..self.in_channels {
                        for ky in 0..k {
                            let row_start = input.index(c, y + ky, x);
                            let pixels = &input.data[row_start..row_start + k];
                            let col = self.kernel_col(c, ky, 0);
                            let weights = &kernel[col..col + k];
                            acc += pixels.iter().zip(weights).map(|(p, w)| p * w).sum::<f64>();
                        }
                    }
                    let idx = out.index(o, y, x);
                    out.data[idx] = acc;
                }
            }
        }
        out
    }

    /// Accumulates kernel and bias gradients into `grads` and returns
    /// `∂L/∂input`.
    pub fn backward(&self, input: &Tensor, grad_out: &Tensor, grads: &mut Conv2d) -> Tensor {
        let mut grad_in = Tensor::zeros(input.channels, input.height, input.width);
        self.accumulate(input, grad_out, grads, Some(&mut grad_in));
        grad_in
    }

    /// Like [`Conv2d::backward`] but skips the input gradient; the first
    /// layer of a network has no use for it.
    pub fn backward_weights(&self, input: &Tensor, grad_out: &Tensor, grads: &mut Conv2d) {
        self.accumulate(input, grad_out, grads, None);
    }

    fn accumulate(
        &self,
        input: &Tensor,
        grad_out: &Tensor,
        grads: &mut Conv2d,
        mut grad_in: Option<&mut Tensor>,
    ) {
        let k = self.kernel_size;
        for o in 0..self.out_channels {
            let kernel = self.weights.row(o);
            for y in 0..grad_out.height {
                for x in 0..grad_out.width {
                    let g = grad_out.at(o, y, x);
                    if g == 0.0 {
                        continue;
                    }
                    grads.biases[o] += g;
                    for c in 0..self.in_channels {
                        for ky in 0..k {
                            let row_start = input.index(c, y + ky, x);
                            let col = self.kernel_col(c, ky, 0);
                            let grad_row = &mut grads.weights.row_mut(o)[col..col + k];
                            for (gw, p) in grad_row.iter_mut().zip(&input.data[row_start..row_start + k]) {
                                *gw += g * p;
                            }
                            if let Some(gi) = grad_in.as_deref_mut() {
                                for (d, w) in gi.data[row_start..row_start + k]
                                    .iter_mut()
                                    .zip(&kernel[col..col + k])
                                {
                                    *d += g * w;
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_filter() -> Conv2d {
        Conv2d {
            in_channels: 1,
            out_channels: 1,
            kernel_size: 2,
            weights: Matrix { rows: 1, cols: 4, data: vec![1.0; 4] },
            biases: vec![0.25],
        }
    }

    #[test]
    fn valid_convolution_shrinks_by_kernel_minus_one() {
        let conv = box_filter();
        let input = Tensor::from_vec(1, 3, 3, (1..=9).map(f64::from).collect()).unwrap();
        let out = conv.forward(&input);
        assert_eq!(out.shape(), (1, 2, 2));
        assert_eq!(out.data, vec![12.25, 16.25, 24.25, 28.25]);
        assert_eq!(conv.output_size(28, 28), Some((27, 27)));
        assert_eq!(conv.output_size(1, 5), None);
    }

    #[test]
    fn backward_distributes_gradient_over_receptive_fields() {
        let conv = box_filter();
        let input = Tensor::from_vec(1, 3, 3, vec![1.0; 9]).unwrap();
        let grad_out = Tensor::from_vec(1, 2, 2, vec![1.0; 4]).unwrap();
        let mut grads = conv.zeros_like();
        let grad_in = conv.backward(&input, &grad_out, &mut grads);

        assert_eq!(grads.biases, vec![4.0]);
        assert_eq!(grads.weights.data, vec![4.0; 4]);
        // Corners are covered once, edges twice, the centre four times.
        assert_eq!(grad_in.data, vec![1.0, 2.0, 1.0, 2.0, 4.0, 2.0, 1.0, 2.0, 1.0]);

        let mut weight_only = conv.zeros_like();
        conv.backward_weights(&input, &grad_out, &mut weight_only);
        assert_eq!(weight_only, grads);
    }
}
