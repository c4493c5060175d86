//! Reduce-on-plateau learning rate schedule for a metric to maximise.

use serde::{Deserialize, Serialize};

/// Relative improvement a metric must show over the best value to count.
const IMPROVEMENT_THRESHOLD: f64 = 1e-4;

/// Decays the learning rate by `factor` once the monitored metric has failed
/// to improve for more than `patience` consecutive steps.
///
/// Serialized into checkpoint metadata so a resumed run keeps its decayed rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateauScheduler {
    lr: f64,
    factor: f64,
    patience: usize,
    best: Option<f64>,
    bad_steps: usize,
}

impl PlateauScheduler {
    /// Scheduler with the given factor and patience.
    ///
    /// # Panics
    /// Panics unless `0 < factor < 1`.
    pub fn new(lr: f64, factor: f64, patience: usize) -> Self {
        assert!(factor > 0.0 && factor < 1.0, "factor must be in (0, 1), got {factor}");
        Self {
            lr,
            factor,
            patience,
            best: None,
            bad_steps: 0,
        }
    }

    /// Halve the rate on every step without improvement.
    pub fn halving(lr: f64) -> Self {
        Self::new(lr, 0.5, 0)
    }

    /// Current learning rate.
    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Record a metric value and return the learning rate for the next epoch.
    pub fn step(&mut self, metric: f64) -> f64 {
        let improved = match self.best {
            None => true,
            Some(best) => metric > best * (1.0 + IMPROVEMENT_THRESHOLD),
        };

        if improved {
            self.best = Some(metric);
            self.bad_steps = 0;
        } else {
            self.bad_steps += 1;
        }

        if self.bad_steps > self.patience {
            let old = self.lr;
            self.lr *= self.factor;
            self.bad_steps = 0;
            tracing::info!(old_lr = old, new_lr = self.lr, "Reducing learning rate");
        }

        self.lr
    }
}
