//! ESIM training pipeline: validation, the epoch loop with early stopping,
//! the reduce-on-plateau learning-rate schedule, metrics and checkpoints.

pub mod checkpoint;
pub mod metrics;
pub mod scheduler;
pub mod trainer;

pub use checkpoint::{load_model, load_training_state, save_checkpoint, save_weights, CheckpointMeta};
pub use metrics::{EpochMetrics, ValidationReport};
pub use scheduler::PlateauScheduler;
pub use trainer::{train, train_epoch, validate, EsimTrainingConfig, TrainingOutcome};
