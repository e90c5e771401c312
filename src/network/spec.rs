use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Colour channels of every model input.
pub const INPUT_CHANNELS: usize = 3;
/// Output channels of the first convolution.
pub const CONV_A_CHANNELS: usize = 20;
/// Output channels of the second convolution.
pub const CONV_B_CHANNELS: usize = 50;
/// Square kernel size shared by both convolutions.
pub const KERNEL_SIZE: usize = 5;
/// Max-pool window (and stride).
pub const POOL_WINDOW: usize = 2;
/// Width of the hidden fully-connected layer.
pub const HIDDEN_UNITS: usize = 500;

/// Describes one classifier instance: the input size it accepts and the
/// number of classes it scores.
///
/// Everything else about the architecture is fixed:
///
/// ```text
/// 3×H×W ─conv5─▶ 20×(H-4)×(W-4) ─relu─pool2─▶ 20×h1×w1
///       ─conv5─▶ 50×(h1-4)×(w1-4) ─relu─pool2─▶ 50×h2×w2
///       ─flatten─▶ 50·h2·w2 ─fc─relu─▶ 500 ─fc─▶ C ─log_softmax─▶ C
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierSpec {
    pub height: usize,
    pub width: usize,
    pub num_classes: usize,
}

/// Spatial sizes at each stage of the forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeChain {
    pub conv_a: (usize, usize),
    pub pool_a: (usize, usize),
    pub conv_b: (usize, usize),
    pub pool_b: (usize, usize),
    pub flattened: usize,
}

impl ClassifierSpec {
    /// Builds a spec, rejecting input sizes the shape chain cannot handle.
    pub fn new(height: usize, width: usize, num_classes: usize) -> Result<ClassifierSpec> {
        let spec = ClassifierSpec { height, width, num_classes };
        spec.shape_chain()?;
        Ok(spec)
    }

    pub fn shape_chain(&self) -> Result<ShapeChain> {
        if self.num_classes == 0 {
            return Err(Error::configuration("classifier needs at least one class"));
        }
        let conv = |(h, w): (usize, usize), stage: &str| -> Result<(usize, usize)> {
            if h < KERNEL_SIZE || w < KERNEL_SIZE {
                return Err(Error::configuration(format!(
                    "input {}x{} too small: {} sees {}x{}, kernel is {}",
                    self.height, self.width, stage, h, w, KERNEL_SIZE
                )));
            }
            Ok((h - KERNEL_SIZE + 1, w - KERNEL_SIZE + 1))
        };
        let pool = |(h, w): (usize, usize)| (h / POOL_WINDOW, w / POOL_WINDOW);

        let conv_a = conv((self.height, self.width), "convolution A")?;
        let pool_a = pool(conv_a);
        let conv_b = conv(pool_a, "convolution B")?;
        let pool_b = pool(conv_b);
        if pool_b.0 == 0 || pool_b.1 == 0 {
            return Err(Error::configuration(format!(
                "input {}x{} too small: nothing left after the second pooling",
                self.height, self.width
            )));
        }
        Ok(ShapeChain {
            conv_a,
            pool_a,
            conv_b,
            pool_b,
            flattened: CONV_B_CHANNELS * pool_b.0 * pool_b.1,
        })
    }

    /// Length of the vector fed into the first fully-connected layer.
    pub fn flattened_len(&self) -> Result<usize> {
        Ok(self.shape_chain()?.flattened)
    }
}
