use serde::{Deserialize, Serialize};

use crate::network::checkpoint::CheckpointRole;

/// Per-epoch summary emitted by the training loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Mean training loss over all samples in this epoch.
    pub train_loss: f64,
    /// Mean dev loss (summed NLL / dev size).
    pub dev_loss: f64,
    /// Dev examples whose top class matched the label.
    pub dev_correct: usize,
    pub dev_total: usize,
    /// Checkpoints persisted at the end of this epoch.
    pub saved: Vec<CheckpointRole>,
    /// Wall-clock duration of this epoch, evaluation included.
    pub elapsed_ms: u64,
}

impl EpochStats {
    pub fn dev_accuracy(&self) -> f64 {
        if self.dev_total == 0 {
            0.0
        } else {
            self.dev_correct as f64 / self.dev_total as f64
        }
    }
}

/// Progress reported at a configurable batch interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub epoch: usize,
    /// 0-based index of the batch within the epoch.
    pub batch: usize,
    /// Samples consumed so far this epoch, this batch included.
    pub seen: usize,
    pub total: usize,
    /// Mean loss over this batch.
    pub loss: f64,
}

/// Observation sent on the optional progress channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrainEvent {
    Batch(BatchProgress),
    Epoch(EpochStats),
}
