use crate::math::tensor::Tensor;

/// Non-overlapping max pooling (`window × window`, stride = window).
///
/// Trailing rows/columns that do not fill a whole window are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxPool2d {
    pub window: usize,
}

impl MaxPool2d {
    pub fn new(window: usize) -> MaxPool2d {
        MaxPool2d { window }
    }

    pub fn output_size(&self, h: usize, w: usize) -> (usize, usize) {
        (h / self.window, w / self.window)
    }

    /// Returns the pooled tensor and, for every output cell, the flat index
    /// of the input element that won the max (needed for the backward pass).
    pub fn forward(&self, input: &Tensor) -> (Tensor, Vec<usize>) {
        let s = self.window;
        let (oh, ow) = self.output_size(input.height, input.width);
        let mut out = Tensor::zeros(input.channels, oh, ow);
        let mut switches = vec![0usize; out.len()];

        for c in 0..input.channels {
            for y in 0..oh {
                for x in 0..ow {
                    let mut best_idx = input.index(c, y * s, x * s);
                    let mut best = input.data[best_idx];
                    for dy in 0..s {
                        for dx in 0..s {
                            let idx = input.index(c, y * s + dy, x * s + dx);
                            if input.data[idx] > best {
                                best = input.data[idx];
                                best_idx = idx;
                            }
                        }
                    }
                    let o = out.index(c, y, x);
                    out.data[o] = best;
                    switches[o] = best_idx;
                }
            }
        }
        (out, switches)
    }

    /// Routes each output gradient back to the input element that produced it.
    pub fn backward(
        &self,
        input_shape: (usize, usize, usize),
        switches: &[usize],
        grad_out: &Tensor,
    ) -> Tensor {
        let (c, h, w) = input_shape;
        let mut grad_in = Tensor::zeros(c, h, w);
        for (&src, &g) in switches.iter().zip(&grad_out.data) {
            grad_in.data[src] += g;
        }
        grad_in
    }
}
