//! JSON training config loading for the ESIM CLI.
//!
//! Deserializes files like `configs/snli_training.json`:
//!
//! ```json
//! {
//!   "train_data": "../data/preprocessed/SNLI/train_data.pkl",
//!   "valid_data": "../data/preprocessed/SNLI/dev_data.pkl",
//!   "test_data": "../data/preprocessed/SNLI/test_data.pkl",
//!   "target_dir": "../data/checkpoints/SNLI",
//!   "embedding_size": 300,
//!   "hidden_size": 300,
//!   "num_classes": 3,
//!   "epochs": 64,
//!   "lr": 0.0004,
//!   "patience": 5,
//!   "max_gradient_norm": 10.0
//! }
//! ```
//!
//! Relative paths resolve against the directory containing the config file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use esim::model::EsimConfig;
use esim::training::EsimTrainingConfig;
use serde::Deserialize;

/// Top-level structure of the training config JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingJson {
    pub train_data: PathBuf,
    pub valid_data: PathBuf,
    pub test_data: PathBuf,
    /// Directory for checkpoints; created if missing.
    pub target_dir: PathBuf,
    pub embedding_size: usize,
    pub hidden_size: usize,
    pub num_classes: usize,
    pub epochs: usize,
    pub lr: f64,
    pub patience: usize,
    pub max_gradient_norm: f64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_dropout")]
    pub dropout: f64,
    #[serde(default = "default_vocab_size")]
    pub vocab_size: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_batch_size() -> usize {
    32
}

fn default_dropout() -> f64 {
    0.5
}

fn default_vocab_size() -> usize {
    30522
}

impl TrainingJson {
    /// Resolve relative data and checkpoint paths against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.train_data,
            &mut self.valid_data,
            &mut self.test_data,
            &mut self.target_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Check every field, reporting all problems at once.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut errors = Vec::new();

        if self.embedding_size == 0 {
            errors.push("embedding_size must be > 0".to_string());
        }
        if self.hidden_size == 0 {
            errors.push("hidden_size must be > 0".to_string());
        }
        if self.num_classes == 0 {
            errors.push("num_classes must be > 0".to_string());
        }
        if self.vocab_size == 0 {
            errors.push("vocab_size must be > 0".to_string());
        }
        if self.batch_size == 0 {
            errors.push("batch_size must be > 0".to_string());
        }
        if self.lr.is_nan() || self.lr <= 0.0 {
            errors.push(format!("lr must be > 0, got {}", self.lr));
        }
        if self.patience == 0 {
            errors.push("patience must be > 0".to_string());
        }
        if self.max_gradient_norm.is_nan() || self.max_gradient_norm <= 0.0 {
            errors.push(format!(
                "max_gradient_norm must be > 0, got {}",
                self.max_gradient_norm
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            errors.push(format!("dropout must be in [0, 1), got {}", self.dropout));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("invalid training config:\n  - {}", errors.join("\n  - "))
        }
    }

    /// Model hyperparameters.
    pub fn model_config(&self) -> EsimConfig {
        EsimConfig::new(self.embedding_size, self.hidden_size)
            .with_vocab_size(self.vocab_size)
            .with_num_classes(self.num_classes)
            .with_dropout(self.dropout)
    }

    /// Training-loop hyperparameters.
    pub fn training_config(&self) -> EsimTrainingConfig {
        EsimTrainingConfig::new()
            .with_epochs(self.epochs)
            .with_lr(self.lr)
            .with_patience(self.patience)
            .with_max_gradient_norm(self.max_gradient_norm)
            .with_batch_size(self.batch_size)
            .with_target_dir(self.target_dir.to_string_lossy().into_owned())
            .with_seed(self.seed)
    }
}

/// Load, resolve and validate a training config.
pub fn load_training_json(path: &Path) -> anyhow::Result<TrainingJson> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let mut config: TrainingJson = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse config {}", path.display()))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    config.resolve_paths(base);
    config.validate()?;

    tracing::info!(path = %path.display(), "Loaded training config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "train_data": "data/train_data.pkl",
        "valid_data": "data/dev_data.pkl",
        "test_data": "/abs/test_data.pkl",
        "target_dir": "checkpoints",
        "embedding_size": 300,
        "hidden_size": 200,
        "num_classes": 3,
        "epochs": 64,
        "lr": 0.0004,
        "patience": 5,
        "max_gradient_norm": 10.0
    }"#;

    #[test]
    fn test_deserialize_with_defaults() {
        let config: TrainingJson = serde_json::from_str(FULL).unwrap();
        assert_eq!(config.embedding_size, 300);
        assert_eq!(config.hidden_size, 200);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.vocab_size, 30522);
        assert!((config.dropout - 0.5).abs() < 1e-12);
        assert!(config.seed.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_required_field() {
        let err = serde_json::from_str::<TrainingJson>(r#"{"train_data": "a.pkl"}"#)
            .unwrap_err()
            .to_string();
        assert!(err.contains("missing field"), "{err}");
    }

    #[test]
    fn test_resolve_paths() {
        let mut config: TrainingJson = serde_json::from_str(FULL).unwrap();
        config.resolve_paths(Path::new("/configs"));
        assert_eq!(config.train_data, PathBuf::from("/configs/data/train_data.pkl"));
        assert_eq!(config.target_dir, PathBuf::from("/configs/checkpoints"));
        assert_eq!(config.test_data, PathBuf::from("/abs/test_data.pkl"));
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config: TrainingJson = serde_json::from_str(FULL).unwrap();
        config.hidden_size = 0;
        config.lr = 0.0;
        config.patience = 0;
        config.batch_size = 0;
        config.max_gradient_norm = -1.0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("hidden_size"), "{err}");
        assert!(err.contains("lr"), "{err}");
        assert!(err.contains("patience"), "{err}");
        assert!(err.contains("batch_size"), "{err}");
        assert!(err.contains("max_gradient_norm"), "{err}");
        assert!(!err.contains("embedding_size"), "{err}");
    }

    #[test]
    fn test_derived_configs() {
        let mut config: TrainingJson = serde_json::from_str(FULL).unwrap();
        config.seed = Some(9);
        config.dropout = 0.0;

        let model = config.model_config();
        assert_eq!(model.embedding_size, 300);
        assert_eq!(model.hidden_size, 200);
        assert_eq!(model.num_classes, 3);
        assert_eq!(model.dropout, 0.0);

        let training = config.training_config();
        assert_eq!(training.epochs, 64);
        assert_eq!(training.patience, 5);
        assert_eq!(training.batch_size, 32);
        assert_eq!(training.seed, Some(9));
        assert_eq!(training.target_dir, "checkpoints");
    }

    #[test]
    fn test_load_resolves_against_config_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("snli_training.json");
        std::fs::write(&path, FULL).unwrap();

        let config = load_training_json(&path).unwrap();
        assert_eq!(config.valid_data, tmp.path().join("data/dev_data.pkl"));
    }
}
