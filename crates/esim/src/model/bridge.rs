//! Tensor bridge: converts token-id batches from `nli-data` into padded
//! burn tensors and sequence masks.
//!
//! Sequences are right-padded with the padding id to the longest sequence in
//! their batch. Masks are float tensors with 1.0 at real tokens and 0.0 at
//! padding, so they can be multiplied directly into activations.

use burn::prelude::*;
use burn::tensor::TensorData;
use nli_data::Batch;

/// A batch of premise/hypothesis pairs ready for the model.
#[derive(Debug, Clone)]
pub struct PairBatch<B: Backend> {
    /// Premise token ids, shape `(batch, premise_len)`.
    pub premises: Tensor<B, 2, Int>,
    /// Premise mask, shape `(batch, premise_len)`.
    pub premise_mask: Tensor<B, 2>,
    /// Hypothesis token ids, shape `(batch, hypothesis_len)`.
    pub hypotheses: Tensor<B, 2, Int>,
    /// Hypothesis mask, shape `(batch, hypothesis_len)`.
    pub hypothesis_mask: Tensor<B, 2>,
    /// Gold class indices, shape `(batch,)`.
    pub labels: Tensor<B, 1, Int>,
}

/// Right-pad token sequences to a common length.
///
/// Returns the flattened ids, the flattened mask and the padded length.
/// The padded length is at least 1, so a batch of empty sentences still
/// produces a valid (fully masked) tensor.
pub fn pad_sequences(sequences: &[Vec<u32>], padding_idx: usize) -> (Vec<i64>, Vec<f32>, usize) {
    let max_len = sequences.iter().map(Vec::len).max().unwrap_or(0).max(1);

    let mut ids = Vec::with_capacity(sequences.len() * max_len);
    let mut mask = Vec::with_capacity(sequences.len() * max_len);
    for seq in sequences {
        ids.extend(seq.iter().map(|&t| t as i64));
        ids.extend(std::iter::repeat(padding_idx as i64).take(max_len - seq.len()));
        mask.extend(std::iter::repeat(1.0_f32).take(seq.len()));
        mask.extend(std::iter::repeat(0.0_f32).take(max_len - seq.len()));
    }

    (ids, mask, max_len)
}

/// Convert token sequences to a padded id tensor and its mask.
///
/// # Panics
/// Panics if `sequences` is empty.
pub fn sequences_to_tensors<B: Backend>(
    sequences: &[Vec<u32>],
    padding_idx: usize,
    device: &B::Device,
) -> (Tensor<B, 2, Int>, Tensor<B, 2>) {
    assert!(!sequences.is_empty(), "sequences must not be empty");

    let batch = sequences.len();
    let (ids, mask, max_len) = pad_sequences(sequences, padding_idx);

    let ids = Tensor::from_data(
        TensorData::new(ids, [batch, max_len]).convert::<B::IntElem>(),
        device,
    );
    let mask = Tensor::from_data(TensorData::new(mask, [batch, max_len]), device);
    (ids, mask)
}

/// Convert class indices to an Int tensor of shape `(batch,)`.
pub fn labels_to_tensor<B: Backend>(labels: &[i64], device: &B::Device) -> Tensor<B, 1, Int> {
    Tensor::from_data(
        TensorData::new(labels.to_vec(), [labels.len()]).convert::<B::IntElem>(),
        device,
    )
}

/// Convert a partitioned batch into model inputs.
///
/// # Panics
/// Panics if the batch is empty. [`nli_data::partition`] never produces
/// empty batches.
pub fn batch_to_tensors<B: Backend>(
    batch: &Batch,
    padding_idx: usize,
    device: &B::Device,
) -> PairBatch<B> {
    assert!(!batch.is_empty(), "batch must not be empty");

    let (premises, premise_mask) = sequences_to_tensors(&batch.premises, padding_idx, device);
    let (hypotheses, hypothesis_mask) =
        sequences_to_tensors(&batch.hypotheses, padding_idx, device);

    PairBatch {
        premises,
        premise_mask,
        hypotheses,
        hypothesis_mask,
        labels: labels_to_tensor(&batch.labels, device),
    }
}
