//! ESIM training loop.
//!
//! Ties together the batch partitioner, tensor bridge, model and checkpoints
//! into an epoch loop using Adam with gradient-norm clipping and a
//! reduce-on-plateau learning rate driven by validation accuracy.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use indicatif::{ProgressBar, ProgressStyle};
use nli_data::{partition, BatchCollection, Dataset};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::model::bridge::batch_to_tensors;
use crate::model::{Esim, EsimConfig};
use crate::training::checkpoint::{
    load_training_state, save_checkpoint, save_weights, CheckpointMeta,
};
use crate::training::metrics::{correct_predictions, EpochMetrics, PassAccumulator, ValidationReport};
use crate::training::scheduler::PlateauScheduler;

/// Configuration for ESIM training.
#[derive(Config, Debug)]
pub struct EsimTrainingConfig {
    /// Maximum number of epochs.
    #[config(default = 64)]
    pub epochs: usize,
    /// Initial learning rate for Adam.
    #[config(default = 4e-4)]
    pub lr: f64,
    /// Epochs without validation improvement before stopping.
    #[config(default = 5)]
    pub patience: usize,
    /// Maximum global gradient norm.
    #[config(default = 10.0)]
    pub max_gradient_norm: f64,
    /// Examples per batch.
    #[config(default = 32)]
    pub batch_size: usize,
    /// Directory for `epoch_{n}` and `best` checkpoints.
    #[config(default = "String::from(\"checkpoints/esim\")")]
    pub target_dir: String,
    /// Seed for shuffling and parameter init. Entropy-seeded when absent.
    #[config(default = "None")]
    pub seed: Option<u64>,
}

/// Result of a completed training run.
#[derive(Debug)]
pub struct TrainingOutcome<B: AutodiffBackend> {
    /// Model after the last trained epoch.
    pub model: Esim<B>,
    /// Metadata as written with the last epoch checkpoint.
    pub meta: CheckpointMeta,
    /// Per-epoch training metrics for the epochs run in this call.
    pub history: Vec<EpochMetrics>,
    pub stopped_early: bool,
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> "),
    );
    pb
}

/// Run the model over every batch in inference mode.
///
/// Pass an inference model (see [`AutodiffModule::valid`]) so dropout is
/// inactive. An empty collection yields zero loss and zero accuracy.
pub fn validate<B: Backend>(
    model: &Esim<B>,
    batches: &BatchCollection,
    device: &B::Device,
) -> ValidationReport {
    let start = Instant::now();
    let loss_fn = CrossEntropyLossConfig::new().init(device);
    let mut acc = PassAccumulator::default();

    for (_, batch) in batches.iter() {
        let tensors = batch_to_tensors::<B>(batch, model.padding_idx(), device);
        let output = model.forward_batch(&tensors);
        let loss: f64 = loss_fn
            .forward(output.logits, tensors.labels.clone())
            .into_scalar()
            .elem();
        let correct = correct_predictions(output.probabilities, tensors.labels);
        acc.update(loss, correct, batch.len());
    }

    ValidationReport {
        elapsed: start.elapsed(),
        loss: acc.mean_loss(),
        accuracy: acc.accuracy(),
    }
}

/// Train for one epoch over `batches`, one optimizer step per batch.
///
/// Returns the updated model and the epoch's training metrics.
pub fn train_epoch<B, O>(
    mut model: Esim<B>,
    optimizer: &mut O,
    batches: &BatchCollection,
    lr: f64,
    epoch: usize,
    device: &B::Device,
) -> (Esim<B>, EpochMetrics)
where
    B: AutodiffBackend,
    O: Optimizer<Esim<B>, B>,
{
    let start = Instant::now();
    let loss_fn = CrossEntropyLossConfig::new().init(device);
    let mut acc = PassAccumulator::default();
    let pb = progress_bar(batches.len());

    for (_, batch) in batches.iter() {
        let tensors = batch_to_tensors::<B>(batch, model.padding_idx(), device);
        let output = model.forward_batch(&tensors);

        let correct = correct_predictions(output.probabilities, tensors.labels.clone());
        let loss = loss_fn.forward(output.logits, tensors.labels);
        let loss_val: f64 = loss.clone().into_scalar().elem();

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optimizer.step(lr, model, grads);

        acc.update(loss_val, correct, batch.len());
        pb.set_message(format!("epoch {epoch} loss: {:.4}", acc.mean_loss()));
        pb.inc(1);
    }
    pb.finish_and_clear();

    let metrics = EpochMetrics {
        epoch,
        elapsed: start.elapsed(),
        loss: acc.mean_loss(),
        accuracy: acc.accuracy(),
    };
    (model, metrics)
}

/// Train ESIM on `train_data`, validating after every epoch.
///
/// Starts from a fresh model built from `model_config`, or from the
/// checkpoint directory `resume_from` (weights, optimizer, scheduler and
/// histories restored, training continues at `epoch + 1`). Writes
/// `{target_dir}/epoch_{n}` after every epoch and `{target_dir}/best` whenever
/// validation accuracy does not fall below the best seen so far. Stops after
/// `patience` consecutive epochs without improvement.
pub fn train<B: AutodiffBackend>(
    config: &EsimTrainingConfig,
    model_config: &EsimConfig,
    train_data: &Dataset,
    valid_batches: &BatchCollection,
    device: &B::Device,
    resume_from: Option<&Path>,
) -> anyhow::Result<TrainingOutcome<B>> {
    let target_dir = PathBuf::from(&config.target_dir);
    std::fs::create_dir_all(&target_dir)
        .with_context(|| format!("failed to create target dir {}", target_dir.display()))?;

    let mut rng = match config.seed {
        Some(seed) => {
            B::seed(seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    let optimizer = AdamConfig::new()
        .with_grad_clipping(Some(GradientClippingConfig::Norm(
            config.max_gradient_norm as f32,
        )))
        .init::<B, Esim<B>>();

    let (mut model, mut optimizer, mut meta) = match resume_from {
        Some(dir) => {
            let (model, optimizer, meta) =
                load_training_state::<B, _>(dir, model_config, optimizer, device)?;
            tracing::info!(
                start_epoch = meta.start_epoch(),
                best_score = meta.best_score,
                "Training will continue on existing model from epoch {}",
                meta.start_epoch()
            );
            (model, optimizer, meta)
        }
        None => {
            let meta = CheckpointMeta {
                epoch: 0,
                best_score: 0.0,
                epochs_count: Vec::new(),
                train_losses: Vec::new(),
                valid_losses: Vec::new(),
                scheduler: None,
            };
            (model_config.init::<B>(device), optimizer, meta)
        }
    };
    let start_epoch = meta.start_epoch();
    let mut scheduler = meta
        .scheduler
        .take()
        .unwrap_or_else(|| PlateauScheduler::halving(config.lr));

    let report = validate(&model.valid(), valid_batches, device);
    tracing::info!(
        loss = format!("{:.4}", report.loss),
        accuracy = format!("{:.4}%", report.accuracy * 100.0),
        "Validation before training"
    );

    tracing::info!(
        start_epoch,
        epochs = config.epochs,
        train_examples = train_data.len(),
        valid_batches = valid_batches.len(),
        "Training ESIM model"
    );

    let mut history = Vec::new();
    let mut patience_counter = 0;
    let mut stopped_early = false;

    for epoch in start_epoch..=config.epochs {
        let lr = scheduler.lr();
        let train_batches = partition(train_data, config.batch_size, true, &mut rng);

        let (trained, metrics) =
            train_epoch(model, &mut optimizer, &train_batches, lr, epoch, device);
        model = trained;

        for warning in metrics.health_check() {
            tracing::warn!(epoch, "Health check: {warning}");
        }
        tracing::info!(
            epoch,
            lr = %format!("{lr:.2e}"),
            "Training {metrics}"
        );

        let report = validate(&model.valid(), valid_batches, device);
        tracing::info!(epoch, "Validation {report}");

        meta.epoch = epoch;
        meta.epochs_count.push(epoch);
        meta.train_losses.push(metrics.loss);
        meta.valid_losses.push(report.loss);
        history.push(metrics);

        scheduler.step(report.accuracy);
        meta.scheduler = Some(scheduler.clone());

        if report.accuracy < meta.best_score {
            patience_counter += 1;
        } else {
            meta.best_score = report.accuracy;
            patience_counter = 0;
            save_weights(&target_dir.join("best"), &model, &meta)?;
            tracing::info!(epoch, best_score = meta.best_score, "New best model saved");
        }

        save_checkpoint(
            &target_dir.join(format!("epoch_{epoch}")),
            &model,
            &optimizer,
            &meta,
        )?;

        if patience_counter >= config.patience {
            tracing::info!(epoch, "Early stopping: patience limit reached, stopping");
            stopped_early = true;
            break;
        }
    }

    meta.scheduler = Some(scheduler);
    tracing::info!(
        epochs_run = history.len(),
        best_score = meta.best_score,
        "Training complete"
    );

    Ok(TrainingOutcome {
        model,
        meta,
        history,
        stopped_early,
    })
}
