//! Accuracy counting and per-pass loss/accuracy summaries.

use std::fmt;
use std::time::Duration;

use burn::prelude::*;

/// Number of rows whose most probable class equals the label.
///
/// `probabilities` is `(batch, num_classes)`, `labels` is `(batch,)`.
pub fn correct_predictions<B: Backend>(
    probabilities: Tensor<B, 2>,
    labels: Tensor<B, 1, Int>,
) -> usize {
    let predicted: Tensor<B, 1, Int> = probabilities.argmax(1).squeeze::<1>(1);
    let correct: i64 = predicted.equal(labels).int().sum().into_scalar().elem();
    correct as usize
}

/// Result of one pass over a validation or test batch collection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationReport {
    pub elapsed: Duration,
    /// Mean cross-entropy over batches.
    pub loss: f64,
    /// Fraction of correct predictions, in `[0, 1]`.
    pub accuracy: f64,
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "time: {:.4}s, loss: {:.4}, accuracy: {:.4}%",
            self.elapsed.as_secs_f64(),
            self.loss,
            self.accuracy * 100.0
        )
    }
}

/// Summary of one training epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub elapsed: Duration,
    /// Mean cross-entropy over batches.
    pub loss: f64,
    /// Training accuracy, in `[0, 1]`.
    pub accuracy: f64,
}

impl EpochMetrics {
    /// Warnings for obviously broken training runs.
    pub fn health_check(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !self.loss.is_finite() {
            warnings.push(format!("loss is not finite ({})", self.loss));
        }
        if !(0.0..=1.0).contains(&self.accuracy) {
            warnings.push(format!("accuracy {} outside [0, 1]", self.accuracy));
        }
        warnings
    }
}

impl fmt::Display for EpochMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "epoch {}: time {:.4}s, loss {:.4}, accuracy {:.4}%",
            self.epoch,
            self.elapsed.as_secs_f64(),
            self.loss,
            self.accuracy * 100.0
        )
    }
}

/// Running sums for loss and accuracy over a pass.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PassAccumulator {
    loss_sum: f64,
    batches: usize,
    correct: usize,
    examples: usize,
}

impl PassAccumulator {
    pub(crate) fn update(&mut self, batch_loss: f64, correct: usize, examples: usize) {
        self.loss_sum += batch_loss;
        self.batches += 1;
        self.correct += correct;
        self.examples += examples;
    }

    pub(crate) fn mean_loss(&self) -> f64 {
        if self.batches == 0 {
            0.0
        } else {
            self.loss_sum / self.batches as f64
        }
    }

    pub(crate) fn accuracy(&self) -> f64 {
        if self.examples == 0 {
            0.0
        } else {
            self.correct as f64 / self.examples as f64
        }
    }
}
