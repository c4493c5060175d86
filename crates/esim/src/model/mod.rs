//! ESIM model components: sequence encoders, soft alignment, masked pooling,
//! the full classifier, and the bridge from token-id batches to burn tensors.

pub mod attention;
pub mod bridge;
pub mod encoder;
pub mod esim;
pub mod pooling;

pub use bridge::{batch_to_tensors, PairBatch};
pub use esim::{Esim, EsimConfig, EsimOutput};
