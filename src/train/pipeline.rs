use std::path::PathBuf;
use std::sync::mpsc;

use rand::{rngs::StdRng, SeedableRng};

use crate::config::params::{Params, PARAMS_FILE};
use crate::data::{class_index::ClassIndex, loader::discover, split::split};
use crate::error::{Error, Result};
use crate::network::{classifier::Classifier, spec::ClassifierSpec};
use crate::train::epoch_stats::TrainEvent;
use crate::train::loop_fn::{train_loop, TrainReport};
use crate::train::store::{FsCheckpointStore, DEFAULT_PREFIX};
use crate::train::train_config::TrainConfig;

/// Everything a finished run leaves behind.
#[derive(Debug)]
pub struct TrainingRun {
    pub class_index: ClassIndex,
    pub params_path: PathBuf,
    pub store: FsCheckpointStore,
    pub report: TrainReport,
}

/// Discovers the corpus under `config.root_dir`, splits it, writes
/// `params.json` and trains a fresh classifier, checkpointing into
/// `config.output_dir`.
pub fn run_training(config: &TrainConfig, progress_tx: Option<&mpsc::Sender<TrainEvent>>) -> Result<TrainingRun> {
    config.validate()?;

    tracing::info!(root = %config.root_dir.display(), "loading dataset");
    let (items, class_index) = discover(&config.root_dir)?;
    let data = split(items, config.seed, config.holdout_fraction)?;
    tracing::info!(
        classes = class_index.len(),
        train = data.train.len(),
        dev = data.dev.len(),
        "dataset preparation completed"
    );
    // Fail before any artifact is written.
    if data.train.is_empty() || data.dev.is_empty() {
        return Err(Error::configuration(format!(
            "corpus of {} images leaves an empty split (train {}, dev {})",
            data.train.len() + data.dev.len(),
            data.train.len(),
            data.dev.len()
        )));
    }

    std::fs::create_dir_all(&config.output_dir)?;
    let params_path = config.output_dir.join(PARAMS_FILE);
    Params::new(config.clone(), &class_index).save_json(&params_path)?;

    let spec = ClassifierSpec::new(config.image_height, config.image_width, class_index.len())?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut classifier = Classifier::new(spec, &mut rng)?;
    let mut store = FsCheckpointStore::new(&config.output_dir, DEFAULT_PREFIX)?;

    let report = train_loop(&mut classifier, &data, config, &mut store, progress_tx)?;
    Ok(TrainingRun { class_index, params_path, store, report })
}
