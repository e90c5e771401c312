use std::path::Path;

use crate::config::params::Params;
use crate::data::class_index::ClassIndex;
use crate::error::{Error, Result};
use crate::ingest;
use crate::math::tensor::Tensor;
use crate::network::{checkpoint::Checkpoint, classifier::Classifier, spec::ClassifierSpec};

/// One ranked class.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_id: usize,
    pub label: String,
    /// Log-probability of the class.
    pub score: f64,
}

/// Top-N classes for one image, best first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PredictionResult {
    pub predictions: Vec<Prediction>,
}

impl PredictionResult {
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    pub fn best(&self) -> Option<&Prediction> {
        self.predictions.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Prediction> {
        self.predictions.iter()
    }
}

/// A loaded classifier paired with the class index it was trained on.
///
/// Read-only after construction; `predict` takes `&self`, so one engine can
/// serve any number of threads without locking.
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    classifier: Classifier,
    class_index: ClassIndex,
}

impl InferenceEngine {
    /// Fails with a shape mismatch if the checkpoint's output width differs
    /// from the number of classes in `class_index`.
    pub fn load(checkpoint: Checkpoint, class_index: ClassIndex) -> Result<InferenceEngine> {
        let stored = checkpoint.num_classes();
        if stored != class_index.len() {
            return Err(Error::shape("output layer width", class_index.len(), stored));
        }
        let classifier = checkpoint.into_classifier()?;
        Ok(InferenceEngine { classifier, class_index })
    }

    /// Reads a checkpoint file and the class index out of a params file.
    pub fn open(checkpoint_path: impl AsRef<Path>, params_path: impl AsRef<Path>) -> Result<InferenceEngine> {
        let params = Params::load_json(params_path)?;
        let class_index = params.class_index()?;
        let checkpoint = Checkpoint::load_json(checkpoint_path)?;
        tracing::info!(
            role = %checkpoint.role,
            epoch = checkpoint.epoch,
            classes = class_index.len(),
            "model loaded"
        );
        InferenceEngine::load(checkpoint, class_index)
    }

    pub fn spec(&self) -> &ClassifierSpec {
        self.classifier.spec()
    }

    pub fn class_index(&self) -> &ClassIndex {
        &self.class_index
    }

    /// Ranks the classes for exactly one image and returns the best `n`.
    ///
    /// Requires `n ≤ C`. Scores are log-probabilities, sorted descending;
    /// equal scores keep ascending class-id order.
    pub fn predict(&self, image: &Tensor, n: usize) -> Result<PredictionResult> {
        let classes = self.classifier.num_classes();
        if n > classes {
            return Err(Error::configuration(format!(
                "asked for the top {n} classes but the model only has {classes}"
            )));
        }
        let log_probs = self.classifier.forward(image)?;

        let mut ranking: Vec<usize> = (0..log_probs.len()).collect();
        ranking.sort_by(|&a, &b| log_probs[b].total_cmp(&log_probs[a]));

        let predictions = ranking
            .into_iter()
            .take(n)
            .map(|class_id| Prediction {
                class_id,
                label: self.class_index.label_or_unknown(class_id).to_owned(),
                score: log_probs[class_id],
            })
            .collect();
        Ok(PredictionResult { predictions })
    }

    /// Decodes an encoded image (resizing to the model's input) and ranks it.
    pub fn predict_encoded(&self, encoded: &[u8], n: usize) -> Result<PredictionResult> {
        let spec = self.classifier.spec();
        let image = ingest::decode_resized(encoded, spec.height, spec.width)?;
        self.predict(&image, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::class_index::UNKNOWN_LABEL;
    use crate::error::ErrorKind;
    use crate::network::checkpoint::CheckpointRole;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::HashSet;

    fn engine(classes: usize) -> InferenceEngine {
        let spec = ClassifierSpec::new(16, 16, classes).unwrap();
        let model = Classifier::new(spec, &mut StdRng::seed_from_u64(5)).unwrap();
        let labels = (0..classes).map(|i| format!("k{i}")).collect();
        let index = ClassIndex::from_labels(labels).unwrap();
        InferenceEngine::load(Checkpoint::snapshot(&model, CheckpointRole::Best, 1, 0.5), index).unwrap()
    }

    fn image(seed: u64) -> Tensor {
        let mut rng = StdRng::seed_from_u64(seed);
        Tensor::from_vec(3, 16, 16, (0..768).map(|_| rng.gen()).collect()).unwrap()
    }

    #[test]
    fn returns_n_sorted_distinct_classes() {
        let engine = engine(9);
        let result = engine.predict(&image(1), 6).unwrap();

        assert_eq!(result.len(), 6);
        assert!(result.predictions.windows(2).all(|w| w[0].score >= w[1].score));
        let ids: HashSet<usize> = result.iter().map(|p| p.class_id).collect();
        assert_eq!(ids.len(), 6);
        assert!(result.iter().all(|p| p.label != UNKNOWN_LABEL));
        assert!(result.iter().all(|p| p.label == format!("k{}", p.class_id)));
    }

    #[test]
    fn full_ranking_probabilities_sum_to_one() {
        let engine = engine(4);
        let result = engine.predict(&image(2), 4).unwrap();
        let total: f64 = result.iter().map(|p| p.score.exp()).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn asking_for_more_than_c_classes_is_rejected() {
        let err = engine(3).predict(&image(3), 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn checkpoint_for_ten_classes_does_not_load_with_twelve_labels() {
        let spec = ClassifierSpec::new(16, 16, 10).unwrap();
        let model = Classifier::new(spec, &mut StdRng::seed_from_u64(9)).unwrap();
        let cp = Checkpoint::snapshot(&model, CheckpointRole::Best, 1, 0.1);
        let index = ClassIndex::from_labels((0..12).map(|i| i.to_string()).collect()).unwrap();

        match InferenceEngine::load(cp, index) {
            Err(Error::ShapeMismatch { expected: 12, found: 10, .. }) => {}
            other => panic!("expected shape mismatch, got {other:?}"),
        }
    }

    #[test]
    fn concurrent_predictions_agree() {
        let engine = std::sync::Arc::new(engine(8));
        let img = std::sync::Arc::new(image(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let (engine, img) = (engine.clone(), img.clone());
                std::thread::spawn(move || engine.predict(&img, 6).unwrap())
            })
            .collect();
        let results: Vec<PredictionResult> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }
}
