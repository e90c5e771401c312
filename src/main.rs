use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use kanji_recognizer::train::{run_training, Device, TrainConfig};
use kanji_recognizer::InferenceEngine;

#[derive(Parser)]
#[command(name = "kanji-recognizer", version, about = "Train and query the kanji classifier")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on a directory of per-class image folders
    Train(TrainArgs),
    /// Print the top-N classes for one image
    Predict {
        /// Checkpoint file
        #[arg(long, default_value = "kanji_recognizer_best.json")]
        model: PathBuf,
        /// params.json written by `train`
        #[arg(long, default_value = "params.json")]
        config: PathBuf,
        /// Image file to classify
        #[arg(long)]
        image: PathBuf,
        #[arg(long, default_value_t = 6)]
        nbest: usize,
    },
}

#[derive(clap::Args)]
struct TrainArgs {
    /// Dataset root; one sub-directory per class
    #[arg(long, default_value = ".")]
    root_dir: PathBuf,
    /// Where params.json and checkpoints are written
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
    #[arg(long, default_value_t = 64)]
    batch_size: usize,
    #[arg(long, default_value_t = 1000)]
    test_batch_size: usize,
    #[arg(long, default_value_t = 20)]
    epochs: usize,
    #[arg(long, default_value_t = 0.01)]
    lr: f64,
    #[arg(long, default_value_t = 0.5)]
    momentum: f64,
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Batches between progress lines
    #[arg(long, default_value_t = 100)]
    log_interval: usize,
    #[arg(long, default_value_t = 0.01)]
    holdout_fraction: f64,
    /// Also keep one checkpoint per epoch
    #[arg(long)]
    save_model_each_epoch: bool,
    /// Ask for an accelerator; falls back to the CPU
    #[arg(long)]
    accelerated: bool,
    #[arg(long, default_value_t = 28)]
    image_height: usize,
    #[arg(long, default_value_t = 28)]
    image_width: usize,
}

impl TrainArgs {
    fn into_config(self) -> TrainConfig {
        TrainConfig {
            batch_size: self.batch_size,
            test_batch_size: self.test_batch_size,
            epochs: self.epochs,
            lr: self.lr,
            momentum: self.momentum,
            seed: self.seed,
            log_interval: self.log_interval,
            holdout_fraction: self.holdout_fraction,
            save_model_each_epoch: self.save_model_each_epoch,
            device: if self.accelerated { Device::Accelerated } else { Device::Cpu },
            image_height: self.image_height,
            image_width: self.image_width,
            root_dir: self.root_dir,
            output_dir: self.output_dir,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("kanji_recognizer=info".parse()?),
        )
        .init();

    match Cli::parse().command {
        Commands::Train(args) => {
            let config = args.into_config();
            let run = run_training(&config, None).context("training failed")?;
            match run.report.best_epoch {
                Some(epoch) => tracing::info!(
                    epoch,
                    dev_loss = run.report.best_dev_loss,
                    dir = %run.store.dir().display(),
                    "best checkpoint"
                ),
                None => tracing::warn!("no epoch produced a finite dev loss; no best checkpoint was written"),
            }
        }
        Commands::Predict { model, config, image, nbest } => {
            let engine = InferenceEngine::open(&model, &config)
                .with_context(|| format!("cannot load model '{}'", model.display()))?;
            let bytes = std::fs::read(&image).with_context(|| format!("cannot read '{}'", image.display()))?;
            let result = engine.predict_encoded(&bytes, nbest)?;
            for p in result.iter() {
                println!("cls: {}, score: {}", p.label, p.score);
            }
        }
    }
    Ok(())
}
