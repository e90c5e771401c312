pub mod checkpoint;
pub mod classifier;
pub mod spec;

pub use checkpoint::{Checkpoint, CheckpointRole};
pub use classifier::{Classifier, ForwardTrace, ModelParameters};
pub use spec::ClassifierSpec;
