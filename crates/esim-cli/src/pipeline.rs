//! Validation driver, training, and dataset utilities behind the CLI subcommands.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use burn::module::AutodiffModule;
use burn::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use esim::model::Esim;
use esim::training::{self, ValidationReport};
use nli_data::{partition, BatchCollection, Dataset, DatasetReader, DatasetWriter, Label};

use crate::config::{load_training_json, TrainingJson};

#[cfg(feature = "cuda")]
pub type InferenceBackend = burn::backend::CudaJit;
#[cfg(not(feature = "cuda"))]
pub type InferenceBackend = burn::backend::NdArray;

pub type TrainBackend = burn::backend::Autodiff<InferenceBackend>;

/// Arguments for the `validate` subcommand.
#[derive(Debug)]
pub struct ValidateArgs {
    /// Path to the JSON training config.
    pub config: PathBuf,
    /// Checkpoint directory whose weights replace the fresh model.
    pub checkpoint: Option<PathBuf>,
    /// Also evaluate the test set.
    pub test: bool,
}

/// Arguments for the `train` subcommand.
#[derive(Debug)]
pub struct TrainArgs {
    pub config: PathBuf,
    /// Checkpoint directory to resume from.
    pub checkpoint: Option<PathBuf>,
}

/// Arguments for the `summary` subcommand.
#[derive(Debug)]
pub struct SummaryArgs {
    /// Path to a pickle or Parquet dataset.
    pub input: PathBuf,
    /// Output as JSON instead of human-readable text.
    pub json: bool,
}

/// Arguments for the `convert` subcommand.
#[derive(Debug)]
pub struct ConvertArgs {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Result of the validation driver.
#[derive(Debug)]
pub struct ValidationOutcome {
    /// Epoch training would resume from: 1 for a fresh model.
    pub start_epoch: usize,
    pub valid: ValidationReport,
    pub test: Option<ValidationReport>,
}

fn load_dataset(path: &Path, what: &str, num_classes: usize) -> anyhow::Result<Dataset> {
    tracing::info!(path = %path.display(), "Loading {what} data");
    let dataset = DatasetReader::read(path)
        .with_context(|| format!("failed to load {what} data"))?;
    dataset
        .check_labels(num_classes)
        .with_context(|| format!("bad label in {}", path.display()))?;
    tracing::info!(examples = dataset.len(), "Loaded {what} data");
    Ok(dataset)
}

/// Partition without shuffling; the order of `dataset` is kept.
fn unshuffled_batches(dataset: &Dataset, batch_size: usize) -> BatchCollection {
    partition(dataset, batch_size, false, &mut StdRng::seed_from_u64(0))
}

/// Load data, build (or restore) the model and run one validation pass.
pub fn validate_with_config(
    config: &TrainingJson,
    checkpoint: Option<&Path>,
    test: bool,
) -> anyhow::Result<ValidationOutcome> {
    let device = <InferenceBackend as Backend>::Device::default();
    tracing::info!(?device, "Preparing for training");

    std::fs::create_dir_all(&config.target_dir).with_context(|| {
        format!("failed to create target dir {}", config.target_dir.display())
    })?;

    // Training data is loaded and checked but not scored.
    let _train = load_dataset(&config.train_data, "training", config.num_classes)?;
    let valid_data = load_dataset(&config.valid_data, "validation", config.num_classes)?;
    let test_data = load_dataset(&config.test_data, "test", config.num_classes)?;

    let valid_batches = unshuffled_batches(&valid_data, config.batch_size);
    let test_batches = unshuffled_batches(&test_data, config.batch_size);

    tracing::info!("Building model");
    let model_config = config.model_config();
    let (model, start_epoch): (Esim<InferenceBackend>, usize) = match checkpoint {
        Some(dir) => {
            let (model, meta) = training::load_model(dir, &model_config, &device)?;
            let start_epoch = meta.start_epoch();
            tracing::info!(
                start_epoch,
                "Training will continue on existing model from epoch {start_epoch}"
            );
            (model, start_epoch)
        }
        None => (model_config.init(&device), 1),
    };

    let valid = training::validate(&model, &valid_batches, &device);
    let test = test.then(|| training::validate(&model, &test_batches, &device));

    Ok(ValidationOutcome {
        start_epoch,
        valid,
        test,
    })
}

/// Run the validation driver and print its accuracies.
pub fn run_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let config = load_training_json(&args.config)?;
    let outcome = validate_with_config(&config, args.checkpoint.as_deref(), args.test)?;

    println!("Validation accuracy: {:.4}%", outcome.valid.accuracy * 100.0);
    if let Some(test) = outcome.test {
        println!(
            "Test loss: {:.4}, accuracy: {:.4}%",
            test.loss,
            test.accuracy * 100.0
        );
    }

    Ok(())
}

/// Train ESIM with the hyperparameters from the config file.
pub fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_training_json(&args.config)?;
    let device = <TrainBackend as Backend>::Device::default();
    tracing::info!(?device, "Preparing for training");

    let train_data = load_dataset(&config.train_data, "training", config.num_classes)?;
    let valid_data = load_dataset(&config.valid_data, "validation", config.num_classes)?;
    let valid_batches = unshuffled_batches(&valid_data, config.batch_size);

    let outcome = training::train::<TrainBackend>(
        &config.training_config(),
        &config.model_config(),
        &train_data,
        &valid_batches,
        &device,
        args.checkpoint.as_deref(),
    )?;

    let final_report = training::validate(&outcome.model.valid(), &valid_batches, &device);

    println!("\n--- Training Summary ---");
    println!("Epochs trained: {}", outcome.history.len());
    println!("Last epoch: {}", outcome.meta.epoch);
    println!("Best validation accuracy: {:.4}%", outcome.meta.best_score * 100.0);
    println!("Final validation accuracy: {:.4}%", final_report.accuracy * 100.0);
    if outcome.stopped_early {
        println!("Stopped early: patience limit reached");
    }
    println!("Checkpoints: {}", config.target_dir.display());
    println!("Elapsed: {:.1}s", start.elapsed().as_secs_f64());

    Ok(())
}

/// Print statistics for a dataset file.
pub fn run_summary(args: SummaryArgs) -> anyhow::Result<()> {
    let summary = DatasetReader::read_summary(&args.input)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("--- Dataset Summary ---");
    println!("File: {}", args.input.display());
    println!("Total examples: {}", summary.total_examples);
    for label in Label::ALL {
        println!("{label}: {}", summary.label_count(label));
    }
    if summary.other_label_count > 0 {
        println!("Other labels: {}", summary.other_label_count);
    }
    println!(
        "Premise length: mean {:.1}, max {}",
        summary.mean_premise_len, summary.max_premise_len
    );
    println!(
        "Hypothesis length: mean {:.1}, max {}",
        summary.mean_hypothesis_len, summary.max_hypothesis_len
    );

    Ok(())
}

/// Convert a dataset between pickle and Parquet.
pub fn run_convert(args: ConvertArgs) -> anyhow::Result<()> {
    let dataset = DatasetReader::read(&args.input)?;
    DatasetWriter::write(&args.output, &dataset)?;
    println!(
        "Converted {} examples: {} -> {}",
        dataset.len(),
        args.input.display(),
        args.output.display()
    );
    Ok(())
}
