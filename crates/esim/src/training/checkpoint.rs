//! Checkpoint directories: model weights, optimizer state and metadata.
//!
//! ```text
//! {dir}/model.mpk       model record
//! {dir}/optimizer.mpk   optimizer record (optional)
//! {dir}/meta.json       CheckpointMeta
//! ```

use std::path::Path;

use anyhow::Context;
use burn::optim::Optimizer;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::model::{Esim, EsimConfig};
use crate::training::scheduler::PlateauScheduler;

/// Metadata saved alongside each checkpoint for resuming training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Last completed epoch (0 for a checkpoint taken before training).
    pub epoch: usize,
    /// Best validation accuracy seen so far.
    pub best_score: f64,
    #[serde(default)]
    pub epochs_count: Vec<usize>,
    #[serde(default)]
    pub train_losses: Vec<f64>,
    #[serde(default)]
    pub valid_losses: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<PlateauScheduler>,
}

impl CheckpointMeta {
    /// Epoch a resumed run starts from.
    pub fn start_epoch(&self) -> usize {
        self.epoch + 1
    }
}

fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

/// Write model weights, optimizer state and metadata.
pub fn save_checkpoint<B, O>(
    dir: &Path,
    model: &Esim<B>,
    optimizer: &O,
    meta: &CheckpointMeta,
) -> anyhow::Result<()>
where
    B: AutodiffBackend,
    O: Optimizer<Esim<B>, B>,
{
    save_weights(dir, model, meta)?;
    Recorder::<B>::record(&recorder(), optimizer.to_record(), dir.join("optimizer"))
        .map_err(|e| anyhow::anyhow!("Failed to save optimizer to {}: {e}", dir.display()))?;

    tracing::debug!(epoch = meta.epoch, dir = %dir.display(), "Checkpoint saved");
    Ok(())
}

/// Write model weights and metadata without optimizer state.
pub fn save_weights<B: Backend>(
    dir: &Path,
    model: &Esim<B>,
    meta: &CheckpointMeta,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create checkpoint dir {}", dir.display()))?;

    model
        .clone()
        .save_file(dir.join("model"), &recorder())
        .map_err(|e| anyhow::anyhow!("Failed to save model to {}: {e}", dir.display()))?;

    let meta_path = dir.join("meta.json");
    let file = std::fs::File::create(&meta_path)
        .with_context(|| format!("failed to create {}", meta_path.display()))?;
    serde_json::to_writer_pretty(file, meta)
        .with_context(|| format!("failed to write {}", meta_path.display()))?;
    Ok(())
}

/// Read `meta.json` from a checkpoint directory.
pub fn load_meta(dir: &Path) -> anyhow::Result<CheckpointMeta> {
    let meta_path = dir.join("meta.json");
    let file = std::fs::File::open(&meta_path)
        .with_context(|| format!("failed to open {}", meta_path.display()))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("failed to parse {}", meta_path.display()))
}

/// Load model weights and metadata, ignoring any optimizer state.
///
/// Creates a fresh model from `config`, then loads saved weights on top.
pub fn load_model<B: Backend>(
    dir: &Path,
    config: &EsimConfig,
    device: &B::Device,
) -> anyhow::Result<(Esim<B>, CheckpointMeta)> {
    let meta = load_meta(dir)?;
    let model = config
        .init::<B>(device)
        .load_file(dir.join("model"), &recorder(), device)
        .map_err(|e| anyhow::anyhow!("Failed to load checkpoint from {}: {e}", dir.display()))?;
    Ok((model, meta))
}

/// Load model weights, optimizer state and metadata for resuming training.
///
/// A checkpoint without `optimizer.mpk` leaves `optimizer` freshly initialized.
pub fn load_training_state<B, O>(
    dir: &Path,
    config: &EsimConfig,
    optimizer: O,
    device: &B::Device,
) -> anyhow::Result<(Esim<B>, O, CheckpointMeta)>
where
    B: AutodiffBackend,
    O: Optimizer<Esim<B>, B>,
{
    let (model, meta) = load_model::<B>(dir, config, device)?;

    let optim_path = dir.join("optimizer.mpk");
    let optimizer = if optim_path.exists() {
        let record = Recorder::<B>::load(&recorder(), dir.join("optimizer"), device)
            .map_err(|e| anyhow::anyhow!("Failed to load optimizer from {}: {e}", dir.display()))?;
        tracing::info!(epoch = meta.epoch, "Restored optimizer state");
        optimizer.load_record(record)
    } else {
        tracing::warn!(dir = %dir.display(), "Checkpoint has no optimizer state, starting fresh");
        optimizer
    };

    Ok((model, optimizer, meta))
}
