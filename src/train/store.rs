use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::network::checkpoint::{Checkpoint, CheckpointRole};

/// File-name prefix of checkpoints written by the trainer.
pub const DEFAULT_PREFIX: &str = "kanji_recognizer";

/// Destination for checkpoints decided on by the training loop.
pub trait CheckpointStore {
    /// Persists `checkpoint`, replacing any earlier one with the same role.
    fn save(&mut self, checkpoint: &Checkpoint) -> Result<()>;
}

/// Writes `<dir>/<prefix>_<role>.json` files.
#[derive(Debug, Clone)]
pub struct FsCheckpointStore {
    dir: PathBuf,
    prefix: String,
}

impl FsCheckpointStore {
    /// Creates `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Result<FsCheckpointStore> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| Error::configuration(format!("cannot create '{}': {e}", dir.display())))?;
        Ok(FsCheckpointStore { dir, prefix: prefix.into() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, role: CheckpointRole) -> PathBuf {
        self.dir.join(role.file_name(&self.prefix))
    }

    pub fn load(&self, role: CheckpointRole) -> Result<Checkpoint> {
        Checkpoint::load_json(self.path_for(role))
    }
}

impl CheckpointStore for FsCheckpointStore {
    fn save(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        let path = self.path_for(checkpoint.role);
        // Write next to the target, then rename, so readers never observe a
        // half-written snapshot.
        let tmp = path.with_extension("json.tmp");
        checkpoint.save_json(&tmp)?;
        fs::rename(&tmp, &path)?;
        tracing::info!("saved checkpoint: {} -> {}", checkpoint.role, path.display());
        Ok(())
    }
}

/// Keeps checkpoints in memory, newest last.
impl CheckpointStore for Vec<Checkpoint> {
    fn save(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        self.push(checkpoint.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{classifier::Classifier, spec::ClassifierSpec};
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn saving_a_role_again_supersedes_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsCheckpointStore::new(dir.path().join("ckpt"), DEFAULT_PREFIX).unwrap();
        let spec = ClassifierSpec::new(16, 16, 2).unwrap();
        let model = Classifier::new(spec, &mut StdRng::seed_from_u64(0)).unwrap();

        store.save(&Checkpoint::snapshot(&model, CheckpointRole::Best, 1, 0.9)).unwrap();
        store.save(&Checkpoint::snapshot(&model, CheckpointRole::Best, 3, 0.4)).unwrap();

        let best = store.load(CheckpointRole::Best).unwrap();
        assert_eq!((best.epoch, best.dev_loss), (3, Some(0.4)));
        assert!(store.path_for(CheckpointRole::Best).ends_with("kanji_recognizer_best.json"));
        assert!(!store.path_for(CheckpointRole::Best).with_extension("json.tmp").exists());
        assert!(store.load(CheckpointRole::Last).is_err());
    }
}
