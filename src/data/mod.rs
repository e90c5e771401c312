pub mod class_index;
pub mod loader;
pub mod prefetch;
pub mod split;

pub use class_index::{ClassIndex, UNKNOWN_LABEL};
pub use loader::{discover, ImageSource, LabeledImage};
pub use prefetch::{Batch, Prefetcher};
pub use split::{split, Split};
