use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::class_index::ClassIndex;
use crate::error::{Error, Result};
use crate::train::train_config::TrainConfig;

/// File name the trainer writes next to its checkpoints.
pub const PARAMS_FILE: &str = "params.json";

/// The `params.json` artifact: the hyperparameters of a run plus the
/// `idx2cls` map needed to turn class ids back into labels.
///
/// Written once after the dataset is prepared; read by the predictor and the
/// server at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    #[serde(flatten)]
    pub train: TrainConfig,
    pub idx2cls: BTreeMap<String, String>,
}

impl Params {
    pub fn new(train: TrainConfig, class_index: &ClassIndex) -> Params {
        Params { train, idx2cls: class_index.to_idx2cls() }
    }

    pub fn class_index(&self) -> Result<ClassIndex> {
        ClassIndex::from_idx2cls(&self.idx2cls)
    }

    /// Serializes the params to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Deserializes params previously written by `save_json`.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Params> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| Error::configuration(format!("cannot open params '{}': {e}", path.display())))?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
