//! Integration tests for the ESIM crate.
//!
//! These tests exercise cross-module interactions: dataset file -> partition
//! -> bridge -> model, training steps with the optimizer, and the full
//! train -> checkpoint -> reload pipeline. All use the NdArray backend and
//! synthetic token ids.

use burn::backend::ndarray::NdArray;
use burn::backend::Autodiff;
use burn::module::AutodiffModule;
use burn::optim::AdamConfig;
use burn::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

use esim::model::bridge::batch_to_tensors;
use esim::model::{Esim, EsimConfig};
use esim::training::{
    load_model, train, train_epoch, validate, CheckpointMeta, EsimTrainingConfig,
};
use nli_data::{partition, Dataset, DatasetReader, DatasetWriter};

type TestBackend = NdArray<f32>;
type TestAutodiffBackend = Autodiff<NdArray<f32>>;

fn model_config() -> EsimConfig {
    EsimConfig::new(8, 8).with_vocab_size(64).with_dropout(0.0)
}

/// Synthetic NLI data: the hypothesis repeats a premise token for
/// entailment, uses an unrelated token for neutral and a "negation" token
/// for contradiction. Lengths vary so every batch carries padding.
fn synthetic(n: u32) -> Dataset {
    Dataset::from_examples((0..n).map(|i| {
        let label = i % 3;
        let len = 2 + (i % 4) as usize;
        let premise: Vec<u32> = (0..len as u32).map(|t| 20 + (i + t) % 20).collect();
        let hypothesis = match label {
            0 => vec![premise[0], 5],
            1 => vec![45, 5, 6],
            _ => vec![50, premise[0]],
        };
        (premise, hypothesis, label as i64)
    }))
}

#[test]
fn test_file_to_model_pipeline() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("dev_data.pkl");
    DatasetWriter::write(&path, &synthetic(30)).unwrap();

    let dataset = DatasetReader::read(&path).unwrap();
    let batches = partition(&dataset, 8, false, &mut StdRng::seed_from_u64(0));
    assert_eq!(batches.len(), 4);

    let device = Default::default();
    let model = model_config().init::<TestBackend>(&device);
    for (_, batch) in batches.iter() {
        let tensors = batch_to_tensors::<TestBackend>(batch, model.padding_idx(), &device);
        let output = model.forward_batch(&tensors);
        assert_eq!(output.probabilities.dims(), [batch.len(), 3]);
    }

    let report = validate(&model, &batches, &device);
    assert!((0.0..=1.0).contains(&report.accuracy));
}

#[test]
fn test_validation_accuracy_independent_of_batch_size() {
    let device = Default::default();
    let model = model_config().init::<TestBackend>(&device);
    let dataset = synthetic(30);

    let by_four = partition(&dataset, 4, false, &mut StdRng::seed_from_u64(0));
    let by_seven = partition(&dataset, 7, false, &mut StdRng::seed_from_u64(0));
    let shuffled = partition(&dataset, 7, true, &mut StdRng::seed_from_u64(3));

    let a = validate(&model, &by_four, &device).accuracy;
    let b = validate(&model, &by_seven, &device).accuracy;
    let c = validate(&model, &shuffled, &device).accuracy;
    assert_eq!(a, b);
    assert_eq!(a, c);
}

#[test]
fn test_training_improves_accuracy_on_separable_data() {
    let device = Default::default();
    TestAutodiffBackend::seed(42);

    let dataset = synthetic(48);
    let batches = partition(&dataset, 12, false, &mut StdRng::seed_from_u64(0));

    let mut model = model_config().init::<TestAutodiffBackend>(&device);
    let mut optimizer = AdamConfig::new().init::<TestAutodiffBackend, Esim<TestAutodiffBackend>>();
    let before = validate(&model.valid(), &batches, &device);

    let mut rng = StdRng::seed_from_u64(1);
    for epoch in 1..=30 {
        let shuffled = partition(&dataset, 12, true, &mut rng);
        let (trained, _) = train_epoch(model, &mut optimizer, &shuffled, 5e-3, epoch, &device);
        model = trained;
    }

    let after = validate(&model.valid(), &batches, &device);
    assert!(after.loss < before.loss, "loss {} -> {}", before.loss, after.loss);
    assert!(after.accuracy > 0.6, "accuracy only {}", after.accuracy);
}

#[test]
fn test_train_then_reload_best_checkpoint() {
    let tmp = TempDir::new().unwrap();
    let device = Default::default();

    let train_data = synthetic(24);
    let valid_data = synthetic(9);
    let valid = partition(&valid_data, 4, false, &mut StdRng::seed_from_u64(0));

    let config = EsimTrainingConfig::new()
        .with_epochs(3)
        .with_lr(1e-3)
        .with_patience(3)
        .with_batch_size(8)
        .with_seed(Some(17))
        .with_target_dir(tmp.path().join("run").to_string_lossy().into_owned());

    let outcome = train::<TestAutodiffBackend>(
        &config,
        &model_config(),
        &train_data,
        &valid,
        &device,
        None,
    )
    .unwrap();
    assert_eq!(outcome.meta.epoch, 3);

    // The last epoch checkpoint holds the returned model.
    let (reloaded, meta): (Esim<TestBackend>, CheckpointMeta) =
        load_model(&tmp.path().join("run/epoch_3"), &model_config(), &device).unwrap();
    assert_eq!(meta.epochs_count, vec![1, 2, 3]);
    assert_eq!(meta.valid_losses.len(), 3);

    let a = validate(&reloaded, &valid, &device);
    let b = validate(&outcome.model.valid(), &valid, &device);
    assert_eq!(a.accuracy, b.accuracy);
    assert!((a.loss - b.loss).abs() < 1e-9);

    // The best checkpoint scores the recorded best accuracy.
    let (best, best_meta): (Esim<TestBackend>, CheckpointMeta) =
        load_model(&tmp.path().join("run/best"), &model_config(), &device).unwrap();
    let best_report = validate(&best, &valid, &device);
    assert!((best_report.accuracy - best_meta.best_score).abs() < 1e-12);
    assert_eq!(best_meta.best_score, outcome.meta.best_score);
}
