use crate::error::{Error, Result};

/// Channel-first `C × H × W` image tensor stored as one flat buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f64>,
}

impl Tensor {
    pub fn zeros(channels: usize, height: usize, width: usize) -> Tensor {
        Tensor { channels, height, width, data: vec![0.0; channels * height * width] }
    }

    /// Wraps `data`, failing if its length does not match the shape.
    pub fn from_vec(channels: usize, height: usize, width: usize, data: Vec<f64>) -> Result<Tensor> {
        let expected = channels * height * width;
        if data.len() != expected {
            return Err(Error::shape("tensor buffer", expected, data.len()));
        }
        Ok(Tensor { channels, height, width, data })
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.channels, self.height, self.width)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn index(&self, c: usize, y: usize, x: usize) -> usize {
        (c * self.height + y) * self.width + x
    }

    #[inline]
    pub fn at(&self, c: usize, y: usize, x: usize) -> f64 {
        self.data[self.index(c, y, x)]
    }

    /// Plane of channel `c`.
    pub fn channel(&self, c: usize) -> &[f64] {
        let plane = self.height * self.width;
        &self.data[c * plane..(c + 1) * plane]
    }
}
