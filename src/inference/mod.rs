pub mod engine;

pub use engine::{InferenceEngine, Prediction, PredictionResult};
