use std::fs;
use std::path::Path;
use std::sync::{mpsc, Arc};

use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use rand::{rngs::StdRng, Rng, SeedableRng};

use kanji_recognizer::data::{ImageSource, LabeledImage, Split};
use kanji_recognizer::network::Checkpoint;
use kanji_recognizer::train::{run_training, train_loop, TrainConfig, TrainEvent};
use kanji_recognizer::{CheckpointRole, Classifier, ClassifierSpec, ErrorKind, Params};

fn png(base: u8, rng: &mut StdRng) -> Vec<u8> {
    let img = RgbImage::from_fn(16, 16, |_, _| {
        let v = base.saturating_add(rng.gen_range(0..40));
        Rgb([v, v, v])
    });
    let mut buf = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img).write_to(&mut buf, ImageOutputFormat::Png).unwrap();
    buf.into_inner()
}

/// Two classes: bright glyph crops under `日`, dark ones under `月`.
fn write_corpus(root: &Path, per_class: usize) {
    let mut rng = StdRng::seed_from_u64(42);
    for (label, base) in [("日", 200u8), ("月", 20u8)] {
        let dir = root.join(label);
        fs::create_dir_all(&dir).unwrap();
        for i in 0..per_class {
            fs::write(dir.join(format!("{i:03}.png")), png(base, &mut rng)).unwrap();
        }
    }
}

fn config(root: &Path, out: &Path) -> TrainConfig {
    TrainConfig {
        batch_size: 4,
        test_batch_size: 3,
        epochs: 3,
        lr: 0.01,
        momentum: 0.5,
        seed: 7,
        log_interval: 1,
        holdout_fraction: 0.2,
        save_model_each_epoch: true,
        image_height: 16,
        image_width: 16,
        root_dir: root.to_path_buf(),
        output_dir: out.to_path_buf(),
        ..TrainConfig::default()
    }
}

#[test]
fn full_run_writes_params_and_selects_the_minimum_dev_loss() {
    let tmp = tempfile::tempdir().unwrap();
    let corpus = tmp.path().join("corpus");
    let out = tmp.path().join("out");
    write_corpus(&corpus, 10);

    let (tx, rx) = mpsc::channel();
    let run = run_training(&config(&corpus, &out), Some(&tx)).unwrap();
    drop(tx);
    let report = &run.report;

    // params.json carries the label map in sorted directory order.
    let params = Params::load_json(&run.params_path).unwrap();
    let index = params.class_index().unwrap();
    assert_eq!(index.labels(), ["日".to_string(), "月".to_string()]);
    assert_eq!(params.train.epochs, 3);

    assert_eq!(report.history.len(), 3);
    for stats in &report.history {
        assert_eq!(stats.dev_total, 4);
        assert!(stats.train_loss.is_finite());
        assert!(run.store.path_for(CheckpointRole::Epoch(stats.epoch)).is_file());
    }

    // Best is written exactly when the dev loss strictly improves.
    let mut running_min = f64::INFINITY;
    for stats in &report.history {
        let improved = stats.dev_loss < running_min;
        assert_eq!(stats.saved.contains(&CheckpointRole::Best), improved, "epoch {}", stats.epoch);
        assert_eq!(stats.saved.contains(&CheckpointRole::Last), stats.epoch == 3);
        running_min = running_min.min(stats.dev_loss);
    }

    let best = run.store.load(CheckpointRole::Best).unwrap();
    assert_eq!(best.dev_loss, Some(running_min));
    assert_eq!(Some(best.epoch), report.best_epoch);
    assert_eq!(report.best_dev_loss, running_min);

    let last = run.store.load(CheckpointRole::Last).unwrap();
    assert_eq!(last.epoch, 3);

    let events: Vec<TrainEvent> = rx.iter().collect();
    let epochs = events.iter().filter(|e| matches!(e, TrainEvent::Epoch(_))).count();
    assert_eq!(epochs, 3);
    // 16 training samples in batches of 4, logged every batch.
    let batches = events.iter().filter(|e| matches!(e, TrainEvent::Batch(_))).count();
    assert_eq!(batches, 12);
}

#[test]
fn same_seed_reproduces_the_run() {
    let tmp = tempfile::tempdir().unwrap();
    let corpus = tmp.path().join("corpus");
    write_corpus(&corpus, 6);

    let a = run_training(&config(&corpus, &tmp.path().join("a")), None).unwrap();
    let b = run_training(&config(&corpus, &tmp.path().join("b")), None).unwrap();
    let losses = |run: &kanji_recognizer::train::TrainingRun| {
        run.report.history.iter().map(|s| (s.train_loss, s.dev_loss)).collect::<Vec<_>>()
    };
    assert_eq!(losses(&a), losses(&b));

    let best_a = a.store.load(CheckpointRole::Best).unwrap();
    let best_b = b.store.load(CheckpointRole::Best).unwrap();
    assert_eq!(best_a.parameters, best_b.parameters);
}

fn in_memory(base: u8, class_id: usize, rng: &mut StdRng) -> LabeledImage {
    LabeledImage { source: ImageSource::Bytes(Arc::from(png(base, rng))), class_id }
}

fn tiny_classifier() -> Classifier {
    Classifier::new(ClassifierSpec::new(16, 16, 2).unwrap(), &mut StdRng::seed_from_u64(3)).unwrap()
}

#[test]
fn empty_splits_abort_before_training() {
    let mut rng = StdRng::seed_from_u64(1);
    let cfg = TrainConfig { epochs: 1, image_height: 16, image_width: 16, ..TrainConfig::default() };
    let mut store: Vec<Checkpoint> = Vec::new();

    let no_dev = Split { train: vec![in_memory(200, 0, &mut rng)], dev: Vec::new() };
    let err = train_loop(&mut tiny_classifier(), &no_dev, &cfg, &mut store, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let no_train = Split { train: Vec::new(), dev: vec![in_memory(200, 0, &mut rng)] };
    let err = train_loop(&mut tiny_classifier(), &no_train, &cfg, &mut store, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(store.is_empty());
}

#[test]
fn corrupt_sample_aborts_with_a_data_error() {
    let mut rng = StdRng::seed_from_u64(1);
    let cfg = TrainConfig { epochs: 2, batch_size: 2, image_height: 16, image_width: 16, ..TrainConfig::default() };
    let broken = LabeledImage { source: ImageSource::Bytes(Arc::from(&b"not a png"[..])), class_id: 1 };
    let data = Split {
        train: vec![in_memory(200, 0, &mut rng), broken],
        dev: vec![in_memory(20, 1, &mut rng)],
    };
    let mut store: Vec<Checkpoint> = Vec::new();
    let err = train_loop(&mut tiny_classifier(), &data, &cfg, &mut store, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Data);
    assert!(store.is_empty());
}

#[test]
fn in_memory_store_records_roles_in_order() {
    let mut rng = StdRng::seed_from_u64(5);
    let cfg = TrainConfig { epochs: 2, batch_size: 2, image_height: 16, image_width: 16, ..TrainConfig::default() };
    let data = Split {
        train: vec![in_memory(200, 0, &mut rng), in_memory(20, 1, &mut rng), in_memory(210, 0, &mut rng)],
        dev: vec![in_memory(15, 1, &mut rng)],
    };
    let mut store: Vec<Checkpoint> = Vec::new();
    let report = train_loop(&mut tiny_classifier(), &data, &cfg, &mut store, None).unwrap();

    // Epoch 1 always improves on the infinite starting minimum.
    assert_eq!(store[0].role, CheckpointRole::Best);
    assert_eq!(store[0].epoch, 1);
    assert_eq!(store.last().unwrap().role, CheckpointRole::Last);
    assert_eq!(store.last().unwrap().epoch, 2);
    let written: usize = report.history.iter().map(|s| s.saved.len()).sum();
    assert_eq!(store.len(), written);
}

#[test]
fn missing_corpus_root_is_a_configuration_error() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config(&tmp.path().join("nope"), &tmp.path().join("out"));
    let err = run_training(&cfg, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn single_image_corpus_fails_without_writing_params() {
    let tmp = tempfile::tempdir().unwrap();
    let corpus = tmp.path().join("corpus");
    let out = tmp.path().join("out");
    write_corpus(&corpus, 1);
    fs::remove_dir_all(corpus.join("月")).unwrap();

    // ceil(1 * 0.2) = 1, so the lone image lands in dev and train is empty.
    let err = run_training(&config(&corpus, &out), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(!out.join("params.json").exists());
}
