//! Pure bytes → tensor conversion.
//!
//! Everything here works on in-memory buffers owned by the caller; nothing is
//! staged on disk, so concurrent requests never share intermediate state.

use image::{imageops::FilterType, DynamicImage, GenericImageView, RgbImage};

use crate::error::{Error, Result};
use crate::math::tensor::Tensor;
use crate::network::spec::INPUT_CHANNELS;

/// Decodes an encoded image (PNG/JPEG/BMP/GIF) at its native size into a
/// `3 × H × W` tensor with values in `[0, 1]`. Any alpha channel is dropped.
pub fn decode(encoded: &[u8]) -> Result<Tensor> {
    let img = load(encoded)?;
    Ok(rgb_to_tensor(&img.to_rgb8()))
}

/// Like [`decode`], but resizes to `height × width` first when the decoded
/// image has a different size.
pub fn decode_resized(encoded: &[u8], height: usize, width: usize) -> Result<Tensor> {
    let img = load(encoded)?;
    let (h, w) = (height as u32, width as u32);
    let img = if img.dimensions() != (w, h) {
        img.resize_exact(w, h, FilterType::Lanczos3)
    } else {
        img
    };
    Ok(rgb_to_tensor(&img.to_rgb8()))
}

fn load(encoded: &[u8]) -> Result<DynamicImage> {
    if encoded.is_empty() {
        return Err(Error::decode("empty image payload"));
    }
    image::load_from_memory(encoded).map_err(|e| Error::decode(format!("unreadable image: {e}")))
}

/// Interleaved RGB bytes → channel-first floats scaled by 1/255.
fn rgb_to_tensor(rgb: &RgbImage) -> Tensor {
    let (w, h) = (rgb.width() as usize, rgb.height() as usize);
    let mut tensor = Tensor::zeros(INPUT_CHANNELS, h, w);
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..INPUT_CHANNELS {
            let idx = tensor.index(c, y as usize, x as usize);
            tensor.data[idx] = f64::from(pixel.0[c]) / 255.0;
        }
    }
    tensor
}
