use crate::network::checkpoint::CheckpointRole;

/// Decides which checkpoints to write at the end of each epoch.
///
/// Keeps a running minimum of dev loss starting at +∞: an epoch is `best`
/// only when its loss is strictly below every earlier epoch's. `epoch-N` is
/// written every epoch when enabled, and `last` after the final epoch.
#[derive(Debug, Clone)]
pub struct CheckpointSelector {
    total_epochs: usize,
    save_each_epoch: bool,
    min_dev_loss: f64,
    best_epoch: Option<usize>,
}

impl CheckpointSelector {
    pub fn new(total_epochs: usize, save_each_epoch: bool) -> CheckpointSelector {
        CheckpointSelector {
            total_epochs,
            save_each_epoch,
            min_dev_loss: f64::INFINITY,
            best_epoch: None,
        }
    }

    /// Roles to persist for `epoch` (1-based), in write order.
    pub fn decide(&mut self, epoch: usize, dev_loss: f64) -> Vec<CheckpointRole> {
        let mut roles = Vec::new();
        if self.save_each_epoch {
            roles.push(CheckpointRole::Epoch(epoch));
        }
        // NaN never compares less, so a diverged epoch is never best.
        if dev_loss < self.min_dev_loss {
            self.min_dev_loss = dev_loss;
            self.best_epoch = Some(epoch);
            roles.push(CheckpointRole::Best);
        }
        if epoch == self.total_epochs {
            roles.push(CheckpointRole::Last);
        }
        roles
    }

    pub fn min_dev_loss(&self) -> f64 {
        self.min_dev_loss
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }
}
