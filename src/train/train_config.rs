use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Compute device requested for training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    #[default]
    Cpu,
    /// An accelerator. This build has none, so it resolves to `Cpu` with a
    /// warning instead of failing.
    Accelerated,
}

impl Device {
    pub fn resolve(self) -> Device {
        match self {
            Device::Cpu => Device::Cpu,
            Device::Accelerated => {
                tracing::warn!("accelerated device unavailable, falling back to cpu");
                Device::Cpu
            }
        }
    }
}

/// Hyperparameters and paths for a training run.
///
/// Every field has a default (see [`TrainConfig::default`]), so a partial
/// JSON document deserializes cleanly.
///
/// | field                   | default |
/// |-------------------------|---------|
/// | `batch_size`            | 64      |
/// | `test_batch_size`       | 1000    |
/// | `epochs`                | 20      |
/// | `lr`                    | 0.01    |
/// | `momentum`              | 0.5     |
/// | `seed`                  | 1       |
/// | `log_interval`          | 100     |
/// | `holdout_fraction`      | 0.01    |
/// | `save_model_each_epoch` | false   |
/// | `device`                | `cpu`   |
/// | `image_height`          | 28      |
/// | `image_width`           | 28      |
/// | `root_dir`              | `.`     |
/// | `output_dir`            | `.`     |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Samples per training minibatch.
    pub batch_size: usize,
    /// Samples decoded per chunk during dev evaluation.
    pub test_batch_size: usize,
    /// Fixed number of epochs; there is no early stopping.
    pub epochs: usize,
    pub lr: f64,
    pub momentum: f64,
    /// Seeds the split, the weight init and every epoch's shuffle.
    pub seed: u64,
    /// Batches between progress observations.
    pub log_interval: usize,
    /// Share of the corpus held out as the dev split, in (0, 1).
    pub holdout_fraction: f64,
    /// Also persist an `epoch-N` checkpoint after every epoch.
    pub save_model_each_epoch: bool,
    pub device: Device,
    pub image_height: usize,
    pub image_width: usize,
    /// Corpus root; each subdirectory is one class.
    pub root_dir: PathBuf,
    /// Where `params.json` and checkpoints are written.
    pub output_dir: PathBuf,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            batch_size: 64,
            test_batch_size: 1000,
            epochs: 20,
            lr: 0.01,
            momentum: 0.5,
            seed: 1,
            log_interval: 100,
            holdout_fraction: 0.01,
            save_model_each_epoch: false,
            device: Device::Cpu,
            image_height: 28,
            image_width: 28,
            root_dir: PathBuf::from("."),
            output_dir: PathBuf::from("."),
        }
    }
}

impl TrainConfig {
    /// Rejects values no run could use.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.test_batch_size == 0 {
            return Err(Error::configuration("batch sizes must be at least 1"));
        }
        if self.epochs == 0 {
            return Err(Error::configuration("epochs must be at least 1"));
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(Error::configuration(format!("learning rate must be positive, got {}", self.lr)));
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(Error::configuration(format!("momentum must be in [0, 1), got {}", self.momentum)));
        }
        if !(self.holdout_fraction > 0.0 && self.holdout_fraction < 1.0) {
            return Err(Error::configuration(format!(
                "holdout fraction must be in (0, 1), got {}",
                self.holdout_fraction
            )));
        }
        Ok(())
    }
}
