//! Masked pooling over the time axis.

use burn::prelude::*;

/// Value written into padded steps before max pooling.
const MAX_POOL_FILL: f32 = -1e7;

/// Mean over real (unmasked) steps.
///
/// `x` is `(batch, seq_len, d)`, `mask` is `(batch, seq_len)`. Returns
/// `(batch, d)`. A sequence with no real steps pools to zeros.
pub fn masked_mean<B: Backend>(x: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 2> {
    let lengths = mask.clone().sum_dim(1).clamp_min(1.0);
    let summed: Tensor<B, 2> = (x * mask.unsqueeze_dim::<3>(2)).sum_dim(1).squeeze::<2>(1);
    summed / lengths
}

/// Max over real steps; padded steps are replaced by `-1e7` first.
///
/// `x` is `(batch, seq_len, d)`, `mask` is `(batch, seq_len)`. Returns `(batch, d)`.
/// Reduces over the last axis: ndarray's `max_dim` backward scatters only
/// along the last axis.
pub fn masked_max<B: Backend>(x: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 2> {
    let mask = mask.unsqueeze_dim::<3>(2);
    let fill = mask.clone().neg().add_scalar(1.0).mul_scalar(MAX_POOL_FILL);
    (x * mask + fill).swap_dims(1, 2).max_dim(2).squeeze::<2>(2)
}
