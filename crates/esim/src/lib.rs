//! ESIM (Enhanced Sequential Inference Model) for natural-language inference.
//!
//! Provides the ESIM sentence-pair classifier as a burn module, the bridge
//! from token-id batches to padded tensors, and the training pipeline:
//! validation, the epoch training loop with early stopping, the plateau
//! learning-rate schedule and checkpoints.

pub mod model;
pub mod training;
