pub mod params;

pub use params::{Params, PARAMS_FILE};
