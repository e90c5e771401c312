use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::data::{loader::LabeledImage, prefetch::Prefetcher, split::Split};
use crate::error::{Error, Result};
use crate::loss::nll::{argmax, NllLoss};
use crate::network::checkpoint::{Checkpoint, CheckpointRole};
use crate::network::classifier::Classifier;
use crate::optim::sgd::Sgd;
use crate::train::epoch_stats::{BatchProgress, EpochStats, TrainEvent};
use crate::train::selection::CheckpointSelector;
use crate::train::store::CheckpointStore;
use crate::train::train_config::TrainConfig;

/// Batches decoded ahead of the one being trained on.
const PREFETCH_DEPTH: usize = 2;

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub history: Vec<EpochStats>,
    /// Epoch whose parameters were last saved as `best`.
    pub best_epoch: Option<usize>,
    pub best_dev_loss: f64,
    pub elapsed: Duration,
}

/// Totals of one pass over the dev split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub loss_sum: f64,
    pub correct: usize,
    pub total: usize,
}

impl Evaluation {
    pub fn mean_loss(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.loss_sum / self.total as f64
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Trains `classifier` for `config.epochs` epochs on `split.train`,
/// evaluating on `split.dev` after each epoch and handing the checkpoints the
/// [`CheckpointSelector`] asks for to `store`.
///
/// Sequential and deterministic for a given `config.seed`: each epoch
/// shuffles with a seeded RNG and batches are consumed in that order.
///
/// # Errors
/// - `Configuration` before any epoch runs if either split is empty or the
///   config is invalid.
/// - Any decode, shape or store error aborts the run; checkpoints already
///   written stay on disk.
pub fn train_loop(
    classifier: &mut Classifier,
    split: &Split<LabeledImage>,
    config: &TrainConfig,
    store: &mut dyn CheckpointStore,
    progress_tx: Option<&mpsc::Sender<TrainEvent>>,
) -> Result<TrainReport> {
    config.validate()?;
    if split.train.is_empty() {
        return Err(Error::configuration("train split is empty"));
    }
    if split.dev.is_empty() {
        return Err(Error::configuration("dev split is empty"));
    }
    let classes = classifier.num_classes();
    if let Some(item) = split.train.iter().chain(&split.dev).find(|i| i.class_id >= classes) {
        return Err(Error::shape("sample class id", classes, item.class_id));
    }
    let device = config.device.resolve();
    tracing::info!(
        ?device,
        train = split.train.len(),
        dev = split.dev.len(),
        classes,
        parameters = classifier.parameters().parameter_count(),
        "training started"
    );

    let train_items: Arc<[LabeledImage]> = split.train.clone().into();
    let dev_items: Arc<[LabeledImage]> = split.dev.clone().into();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut optimizer = Sgd::new(config.lr, config.momentum);
    let mut selector = CheckpointSelector::new(config.epochs, config.save_model_each_epoch);
    let mut history = Vec::with_capacity(config.epochs);
    let run_start = Instant::now();

    for epoch in 1..=config.epochs {
        let t_start = Instant::now();

        // ── Training epoch ────────────────────────────────────────────────
        let train_loss = run_one_epoch(
            classifier,
            &train_items,
            &mut optimizer,
            &mut rng,
            config,
            epoch,
            progress_tx,
        )?;

        // ── Evaluation ────────────────────────────────────────────────────
        let eval = evaluate(classifier, &dev_items, config.test_batch_size)?;
        let dev_loss = eval.mean_loss();
        tracing::info!(
            "Dev set: Average loss: {:.4}, Accuracy: {}/{} ({:.0}%)",
            dev_loss,
            eval.correct,
            eval.total,
            100.0 * eval.accuracy()
        );

        // ── Checkpoint decision ───────────────────────────────────────────
        let saved = selector.decide(epoch, dev_loss);
        for &role in &saved {
            store.save(&Checkpoint::snapshot(classifier, role, epoch, dev_loss))?;
            if role == CheckpointRole::Best {
                tracing::info!(epoch, dev_loss, "best model now updated");
            }
        }

        let stats = EpochStats {
            epoch,
            total_epochs: config.epochs,
            train_loss,
            dev_loss,
            dev_correct: eval.correct,
            dev_total: eval.total,
            saved,
            elapsed_ms: t_start.elapsed().as_millis() as u64,
        };
        if let Some(tx) = progress_tx {
            // A dropped receiver only loses the observations.
            let _ = tx.send(TrainEvent::Epoch(stats.clone()));
        }
        history.push(stats);
    }

    let elapsed = run_start.elapsed();
    tracing::info!("training finished in {} seconds", elapsed.as_secs_f64().round());
    Ok(TrainReport {
        history,
        best_epoch: selector.best_epoch(),
        best_dev_loss: selector.min_dev_loss(),
        elapsed,
    })
}

/// Mean NLL and top-1 accuracy of `classifier` over `items`, with the
/// parameters untouched. `chunk` is the number of images decoded at a time.
pub fn evaluate(classifier: &Classifier, items: &Arc<[LabeledImage]>, chunk: usize) -> Result<Evaluation> {
    let spec = classifier.spec();
    let order: Vec<usize> = (0..items.len()).collect();
    let batches = Prefetcher::spawn(items.clone(), order, chunk, (spec.height, spec.width), PREFETCH_DEPTH);

    let mut eval = Evaluation { loss_sum: 0.0, correct: 0, total: 0 };
    for batch in batches {
        let batch = batch?;
        for (image, &target) in batch.images.iter().zip(&batch.targets) {
            let log_probs = classifier.forward(image)?;
            if target >= log_probs.len() {
                return Err(Error::shape("sample class id", log_probs.len(), target));
            }
            eval.loss_sum += NllLoss::loss(&log_probs, target);
            if argmax(&log_probs) == target {
                eval.correct += 1;
            }
            eval.total += 1;
        }
    }
    Ok(eval)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// One full pass of minibatch SGD over a freshly shuffled order.
/// Returns the mean loss over all samples.
fn run_one_epoch(
    classifier: &mut Classifier,
    items: &Arc<[LabeledImage]>,
    optimizer: &mut Sgd,
    rng: &mut StdRng,
    config: &TrainConfig,
    epoch: usize,
    progress_tx: Option<&mpsc::Sender<TrainEvent>>,
) -> Result<f64> {
    let total = items.len();
    let mut order: Vec<usize> = (0..total).collect();
    order.shuffle(rng);

    let spec = *classifier.spec();
    let num_batches = total.div_ceil(config.batch_size);
    let batches = Prefetcher::spawn(
        items.clone(),
        order,
        config.batch_size,
        (spec.height, spec.width),
        PREFETCH_DEPTH,
    );

    let mut total_loss = 0.0;
    let mut seen = 0;
    for (batch_idx, batch) in batches.enumerate() {
        let batch = batch?;
        let mut grads = classifier.parameters().zeros_like();
        let mut batch_loss = 0.0;
        for (image, &target) in batch.images.iter().zip(&batch.targets) {
            let trace = classifier.forward_trace(image)?;
            batch_loss += classifier.backward(&trace, target, &mut grads)?;
        }

        // Average over the batch and apply.
        let n = batch.len();
        grads.scale(1.0 / n as f64);
        optimizer.step(classifier.parameters_mut(), &grads);

        total_loss += batch_loss;
        seen += n;

        if config.log_interval > 0 && batch_idx % config.log_interval == 0 {
            let progress = BatchProgress {
                epoch,
                batch: batch_idx,
                seen,
                total,
                loss: batch_loss / n as f64,
            };
            tracing::info!(
                "Train Epoch: {} [{}/{} ({:.0}%)]\tLoss: {:.6}",
                epoch,
                seen,
                total,
                100.0 * batch_idx as f64 / num_batches as f64,
                progress.loss
            );
            if let Some(tx) = progress_tx {
                let _ = tx.send(TrainEvent::Batch(progress));
            }
        }
    }

    Ok(total_loss / total as f64)
}
