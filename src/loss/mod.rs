pub mod nll;

pub use nll::{argmax, NllLoss};
