//! Soft alignment between premise and hypothesis encodings.
//!
//! ```text
//! similarity  = P · Hᵀ                              (batch, p_len, h_len)
//! p_attn      = masked_softmax(similarity,  h_mask)
//! h_attn      = masked_softmax(similarityᵀ, p_mask)
//! P̃           = weighted_sum(H, p_attn, p_mask)      (batch, p_len, d)
//! H̃           = weighted_sum(P, h_attn, h_mask)      (batch, h_len, d)
//! ```

use burn::prelude::*;
use burn::tensor::activation::softmax;

const RENORM_EPSILON: f64 = 1e-13;

/// Softmax over the last axis that gives masked positions zero weight.
///
/// `scores` is `(batch, rows, cols)`, `mask` is `(batch, cols)`. Scores are
/// multiplied by the mask before the softmax, the result is masked again and
/// each row renormalised, so a row whose columns are all masked sums to 0.
pub fn masked_softmax<B: Backend>(scores: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 3> {
    let mask = mask.unsqueeze_dim::<3>(1);
    let weights = softmax(scores * mask.clone(), 2) * mask;
    let norm = weights.clone().sum_dim(2).add_scalar(RENORM_EPSILON);
    weights / norm
}

/// Attention-weighted sum of `values`, zeroed at masked rows.
///
/// `values` is `(batch, cols, d)`, `weights` is `(batch, rows, cols)` and
/// `row_mask` is `(batch, rows)`. Returns `(batch, rows, d)`.
pub fn weighted_sum<B: Backend>(
    values: Tensor<B, 3>,
    weights: Tensor<B, 3>,
    row_mask: Tensor<B, 2>,
) -> Tensor<B, 3> {
    weights.matmul(values) * row_mask.unsqueeze_dim::<3>(2)
}

/// Align each sentence against the other.
///
/// Returns `(attended_premises, attended_hypotheses)` with the same shapes as
/// `premises` and `hypotheses`.
pub fn soft_align<B: Backend>(
    premises: Tensor<B, 3>,
    premise_mask: Tensor<B, 2>,
    hypotheses: Tensor<B, 3>,
    hypothesis_mask: Tensor<B, 2>,
) -> (Tensor<B, 3>, Tensor<B, 3>) {
    let similarity = premises.clone().matmul(hypotheses.clone().swap_dims(1, 2));

    let premise_attn = masked_softmax(similarity.clone(), hypothesis_mask.clone());
    let hypothesis_attn = masked_softmax(similarity.swap_dims(1, 2), premise_mask.clone());

    let attended_premises = weighted_sum(hypotheses, premise_attn, premise_mask);
    let attended_hypotheses = weighted_sum(premises, hypothesis_attn, hypothesis_mask);
    (attended_premises, attended_hypotheses)
}
