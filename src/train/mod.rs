pub mod epoch_stats;
pub mod loop_fn;
pub mod pipeline;
pub mod selection;
pub mod store;
pub mod train_config;

pub use epoch_stats::{BatchProgress, EpochStats, TrainEvent};
pub use loop_fn::{evaluate, train_loop, Evaluation, TrainReport};
pub use pipeline::{run_training, TrainingRun};
pub use selection::CheckpointSelector;
pub use store::{CheckpointStore, FsCheckpointStore, DEFAULT_PREFIX};
pub use train_config::{Device, TrainConfig};
