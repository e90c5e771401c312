pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod data;
pub mod ingest;
pub mod config;
pub mod train;
pub mod inference;
pub mod error;

// Convenience re-exports
pub use math::{matrix::Matrix, tensor::Tensor};
pub use network::{Checkpoint, CheckpointRole, Classifier, ClassifierSpec};
pub use data::ClassIndex;
pub use config::Params;
pub use train::{run_training, train_loop, TrainConfig, TrainReport};
pub use inference::{InferenceEngine, Prediction, PredictionResult};
pub use error::{Error, ErrorKind, Result};
