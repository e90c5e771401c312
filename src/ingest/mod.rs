pub mod image;
pub mod payload;

pub use self::image::{decode, decode_resized};
pub use payload::decode_base64;
