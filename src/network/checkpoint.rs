use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::network::classifier::{Classifier, ModelParameters};
use crate::network::spec::ClassifierSpec;

/// Why a snapshot was persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum CheckpointRole {
    /// Lowest dev loss seen so far in the run.
    Best,
    /// Parameters after the final epoch.
    Last,
    /// Parameters after the given 1-based epoch.
    Epoch(usize),
}

impl CheckpointRole {
    /// File name under the checkpoint directory, e.g. `kanji_recognizer_ep3.json`.
    pub fn file_name(&self, prefix: &str) -> String {
        match self {
            CheckpointRole::Best => format!("{prefix}_best.json"),
            CheckpointRole::Last => format!("{prefix}_last.json"),
            CheckpointRole::Epoch(n) => format!("{prefix}_ep{n}.json"),
        }
    }
}

impl fmt::Display for CheckpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointRole::Best => f.write_str("best"),
            CheckpointRole::Last => f.write_str("last"),
            CheckpointRole::Epoch(n) => write!(f, "epoch-{n}"),
        }
    }
}

impl FromStr for CheckpointRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "best" => Ok(CheckpointRole::Best),
            "last" => Ok(CheckpointRole::Last),
            _ => s
                .strip_prefix("epoch-")
                .and_then(|n| n.parse().ok())
                .map(CheckpointRole::Epoch)
                .ok_or_else(|| Error::configuration(format!("unknown checkpoint role '{s}'"))),
        }
    }
}

impl From<CheckpointRole> for String {
    fn from(role: CheckpointRole) -> String {
        role.to_string()
    }
}

impl TryFrom<String> for CheckpointRole {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Immutable snapshot of a classifier's parameters plus the epoch and dev
/// loss that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub role: CheckpointRole,
    pub epoch: usize,
    /// `None` when the loss was not finite (JSON has no NaN/inf).
    pub dev_loss: Option<f64>,
    pub spec: ClassifierSpec,
    pub parameters: ModelParameters,
}

impl Checkpoint {
    pub fn snapshot(classifier: &Classifier, role: CheckpointRole, epoch: usize, dev_loss: f64) -> Checkpoint {
        Checkpoint {
            role,
            epoch,
            dev_loss: dev_loss.is_finite().then_some(dev_loss),
            spec: *classifier.spec(),
            parameters: classifier.parameters().clone(),
        }
    }

    /// Width of the stored output layer.
    pub fn num_classes(&self) -> usize {
        self.parameters.num_classes()
    }

    /// Rebuilds a classifier, checking the parameters against the stored spec.
    pub fn into_classifier(self) -> Result<Classifier> {
        Classifier::from_parameters(self.spec, self.parameters)
    }

    /// Serializes the checkpoint to a JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        // A failed final write must surface here, not in BufWriter's Drop.
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Deserializes a checkpoint previously written by `save_json`.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Checkpoint> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| Error::configuration(format!("cannot open checkpoint '{}': {e}", path.display())))?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
