pub mod activation;

pub use activation::{log_softmax, relu_backward_in_place, relu_in_place};
