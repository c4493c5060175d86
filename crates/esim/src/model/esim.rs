//! The ESIM classifier: embedding, input encoding, soft alignment,
//! enhancement, composition, pooling and the feed-forward head.

use burn::nn::{
    Dropout, DropoutConfig, Embedding, EmbeddingConfig, Initializer, Linear, LinearConfig,
};
use burn::prelude::*;
use burn::tensor::activation::{relu, softmax, tanh};

use crate::model::attention::soft_align;
use crate::model::bridge::PairBatch;
use crate::model::encoder::{SequenceEncoder, SequenceEncoderConfig};
use crate::model::pooling::{masked_max, masked_mean};

/// Configuration for the ESIM classifier.
///
/// ```text
/// premise / hypothesis ids (batch, len)
///   → Embedding(vocab→E) × mask → Dropout
///   → BiLSTM(E→H) × mask                          (batch, len, 2H)
///   → soft alignment                              ã, b̃
///   → [a; ã; a−ã; a⊙ã] → Linear(8H→H) → ReLU → Dropout
///   → BiLSTM(H→H) × mask                          (batch, len, 2H)
///   → [mean_a; max_a; mean_b; max_b]              (batch, 8H)
///   → Dropout → Linear(8H→H) → tanh → Dropout → Linear(H→C)
///   → logits, softmax probabilities               (batch, C)
/// ```
#[derive(Config, Debug)]
pub struct EsimConfig {
    /// Size of the token vocabulary (BERT uncased by default).
    #[config(default = 30522)]
    pub vocab_size: usize,
    /// Word embedding dimension.
    pub embedding_size: usize,
    /// LSTM hidden size per direction, also the projection and classifier width.
    pub hidden_size: usize,
    /// Number of output classes.
    #[config(default = 3)]
    pub num_classes: usize,
    /// Dropout probability used throughout the network.
    #[config(default = 0.5)]
    pub dropout: f64,
    /// Token id used for padding; its embedding never reaches the encoder.
    #[config(default = 0)]
    pub padding_idx: usize,
}

/// Enhanced Sequential Inference Model.
#[derive(Module, Debug)]
pub struct Esim<B: Backend> {
    pub(crate) embedding: Embedding<B>,
    pub(crate) encoding: SequenceEncoder<B>,
    pub(crate) projection: Linear<B>,
    pub(crate) composition: SequenceEncoder<B>,
    pub(crate) classifier_hidden: Linear<B>,
    pub(crate) classifier_out: Linear<B>,
    dropout: Dropout,
    padding_idx: usize,
}

/// Classifier output for one batch.
#[derive(Debug, Clone)]
pub struct EsimOutput<B: Backend> {
    /// Unnormalised class scores, shape `(batch, num_classes)`.
    pub logits: Tensor<B, 2>,
    /// Softmax of `logits`, shape `(batch, num_classes)`.
    pub probabilities: Tensor<B, 2>,
}

impl EsimConfig {
    /// Initialize an ESIM model with the given configuration.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Esim<B> {
        let h = self.hidden_size;
        let linear = |d_in: usize, d_out: usize| {
            LinearConfig::new(d_in, d_out)
                .with_initializer(Initializer::XavierUniform { gain: 1.0 })
                .init(device)
        };

        Esim {
            embedding: EmbeddingConfig::new(self.vocab_size, self.embedding_size).init(device),
            encoding: SequenceEncoderConfig::new(self.embedding_size, h).init(device),
            projection: linear(8 * h, h),
            composition: SequenceEncoderConfig::new(h, h).init(device),
            classifier_hidden: linear(8 * h, h),
            classifier_out: linear(h, self.num_classes),
            dropout: DropoutConfig::new(self.dropout).init(),
            padding_idx: self.padding_idx,
        }
    }
}

impl<B: Backend> Esim<B> {
    /// Forward pass over padded token ids and their masks.
    ///
    /// Input shapes: ids and masks are `(batch, premise_len)` and
    /// `(batch, hypothesis_len)`.
    /// Output shape: `(batch, num_classes)` for both logits and probabilities.
    pub fn forward(
        &self,
        premises: Tensor<B, 2, Int>,
        premise_mask: Tensor<B, 2>,
        hypotheses: Tensor<B, 2, Int>,
        hypothesis_mask: Tensor<B, 2>,
    ) -> EsimOutput<B> {
        let embedded_p = self.embed(premises, premise_mask.clone());
        let embedded_h = self.embed(hypotheses, hypothesis_mask.clone());

        let encoded_p = self.encoding.forward(embedded_p, premise_mask.clone());
        let encoded_h = self.encoding.forward(embedded_h, hypothesis_mask.clone());

        let (attended_p, attended_h) = soft_align(
            encoded_p.clone(),
            premise_mask.clone(),
            encoded_h.clone(),
            hypothesis_mask.clone(),
        );

        let enhanced_p = self.project(enhance(encoded_p, attended_p));
        let enhanced_h = self.project(enhance(encoded_h, attended_h));

        let composed_p = self.composition.forward(enhanced_p, premise_mask.clone());
        let composed_h = self.composition.forward(enhanced_h, hypothesis_mask.clone());

        let features = Tensor::cat(
            vec![
                masked_mean(composed_p.clone(), premise_mask.clone()),
                masked_max(composed_p, premise_mask),
                masked_mean(composed_h.clone(), hypothesis_mask.clone()),
                masked_max(composed_h, hypothesis_mask),
            ],
            1,
        );

        let x = self.dropout.forward(features);
        let x = tanh(self.classifier_hidden.forward(x));
        let x = self.dropout.forward(x);
        let logits = self.classifier_out.forward(x);
        let probabilities = softmax(logits.clone(), 1);

        EsimOutput {
            logits,
            probabilities,
        }
    }

    /// Token id this model treats as padding.
    pub fn padding_idx(&self) -> usize {
        self.padding_idx
    }

    /// Forward pass over a converted batch.
    pub fn forward_batch(&self, batch: &PairBatch<B>) -> EsimOutput<B> {
        self.forward(
            batch.premises.clone(),
            batch.premise_mask.clone(),
            batch.hypotheses.clone(),
            batch.hypothesis_mask.clone(),
        )
    }

    /// Embed ids, zeroing padded positions.
    fn embed(&self, ids: Tensor<B, 2, Int>, mask: Tensor<B, 2>) -> Tensor<B, 3> {
        let embedded = self.embedding.forward(ids) * mask.unsqueeze_dim::<3>(2);
        self.dropout.forward(embedded)
    }

    fn project(&self, enhanced: Tensor<B, 3>) -> Tensor<B, 3> {
        self.dropout.forward(relu(self.projection.forward(enhanced)))
    }
}

/// `[a; ã; a − ã; a ⊙ ã]` along the feature axis.
fn enhance<B: Backend>(encoded: Tensor<B, 3>, attended: Tensor<B, 3>) -> Tensor<B, 3> {
    let diff = encoded.clone() - attended.clone();
    let prod = encoded.clone() * attended.clone();
    Tensor::cat(vec![encoded, attended, diff, prod], 2)
}
