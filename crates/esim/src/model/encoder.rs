//! Masked bidirectional LSTM encoder.
//!
//! Used twice by ESIM: once for input encoding over word embeddings and once
//! for inference composition over the projected enhancement features.
//!
//! Sequences are right-padded. The backward direction reads each sequence
//! reversed within its own length, so padding never reaches the hidden state
//! of a real step and a sentence encodes the same whatever its batchmates are.

use burn::nn::{Lstm, LstmConfig};
use burn::prelude::*;

/// Configuration for a [`SequenceEncoder`].
#[derive(Config, Debug)]
pub struct SequenceEncoderConfig {
    /// Feature size of each input step.
    pub d_input: usize,
    /// Hidden size per direction. The output has `2 * d_hidden` features.
    pub d_hidden: usize,
}

/// Bidirectional LSTM whose outputs at padded steps are zeroed.
#[derive(Module, Debug)]
pub struct SequenceEncoder<B: Backend> {
    pub(crate) forward_lstm: Lstm<B>,
    pub(crate) backward_lstm: Lstm<B>,
}

impl SequenceEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SequenceEncoder<B> {
        SequenceEncoder {
            forward_lstm: LstmConfig::new(self.d_input, self.d_hidden, true).init(device),
            backward_lstm: LstmConfig::new(self.d_input, self.d_hidden, true).init(device),
        }
    }
}

impl<B: Backend> SequenceEncoder<B> {
    /// Encode a padded batch.
    ///
    /// Input shapes: `x` is `(batch, seq_len, d_input)`, `mask` is `(batch, seq_len)`.
    /// Output shape: `(batch, seq_len, 2 * d_hidden)`, forward features first.
    pub fn forward(&self, x: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 3> {
        let index = reversal_index(mask.clone());

        let (forward_out, _) = self.forward_lstm.forward(x.clone(), None);
        let (backward_out, _) = self
            .backward_lstm
            .forward(reverse_steps(x, index.clone()), None);
        let backward_out = reverse_steps(backward_out, index);

        Tensor::cat(vec![forward_out, backward_out], 2) * mask.unsqueeze_dim::<3>(2)
    }
}

/// Per-row time index that reverses the real steps and keeps padding in place.
///
/// For a row of length `n`, position `p < n` maps to `n - 1 - p` and
/// position `p >= n` maps to itself. Applying it twice is the identity.
fn reversal_index<B: Backend>(mask: Tensor<B, 2>) -> Tensor<B, 2, Int> {
    let [batch, seq_len] = mask.dims();
    let device = mask.device();

    let lengths = mask.sum_dim(1).int().expand([batch, seq_len]);
    let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
        .unsqueeze::<2>()
        .expand([batch, seq_len]);

    let padded = positions.clone().greater_equal(lengths.clone());
    (lengths - positions.clone())
        .sub_scalar(1)
        .mask_where(padded, positions)
}

/// Reorder the time axis of `x` (`(batch, seq_len, d)`) by a per-row index.
fn reverse_steps<B: Backend>(x: Tensor<B, 3>, index: Tensor<B, 2, Int>) -> Tensor<B, 3> {
    let [batch, seq_len, d] = x.dims();
    let index = index.unsqueeze_dim::<3>(1).expand([batch, d, seq_len]);
    x.swap_dims(1, 2).gather(2, index).swap_dims(1, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::backend::Autodiff;
    use burn::tensor::{Distribution, TensorData};

    type TestBackend = NdArray<f32>;

    fn mask(rows: &[&[f32]]) -> Tensor<TestBackend, 2> {
        let width = rows[0].len();
        let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Tensor::from_data(TensorData::new(flat, [rows.len(), width]), &Default::default())
    }

    fn values(t: Tensor<TestBackend, 3>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_output_shape() {
        let device = Default::default();
        let encoder = SequenceEncoderConfig::new(12, 5).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 3>::random([3, 7, 12], Distribution::Normal(0.0, 1.0), &device);
        let mask = Tensor::<TestBackend, 2>::ones([3, 7], &device);

        let out = encoder.forward(x, mask);
        assert_eq!(out.dims(), [3, 7, 10]);
    }

    #[test]
    fn test_reversal_index() {
        let index = reversal_index(mask(&[
            &[1.0, 1.0, 1.0, 0.0],
            &[1.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0],
        ]));
        let index: Vec<i64> = index.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(index, vec![2, 1, 0, 3, 0, 1, 2, 3, 0, 1, 2, 3]);
    }

    #[test]
    fn test_reverse_steps_within_length() {
        let device = Default::default();
        // One feature per step, values equal to the step number.
        let x = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(vec![0.0_f32, 1.0, 2.0, 3.0, 0.0, 1.0, 2.0, 3.0], [2, 4, 1]),
            &device,
        );
        let index = reversal_index(mask(&[&[1.0, 1.0, 1.0, 0.0], &[1.0, 1.0, 0.0, 0.0]]));

        let reversed = reverse_steps(x.clone(), index.clone());
        assert_eq!(values(reversed.clone()), vec![2.0, 1.0, 0.0, 3.0, 1.0, 0.0, 2.0, 3.0]);
        assert_eq!(values(reverse_steps(reversed, index)), values(x));
    }

    #[test]
    fn test_padded_steps_are_zero() {
        let device = Default::default();
        let encoder = SequenceEncoderConfig::new(4, 3).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 3>::random([2, 4, 4], Distribution::Normal(0.0, 1.0), &device);
        let mask = mask(&[&[1.0, 1.0, 0.0, 0.0], &[1.0, 1.0, 1.0, 1.0]]);

        let out = encoder.forward(x, mask);
        let padded: f32 = out
            .clone()
            .slice([0..1, 2..4, 0..6])
            .abs()
            .sum()
            .into_scalar()
            .elem();
        assert_eq!(padded, 0.0);

        let real: f32 = out.slice([1..2, 0..4, 0..6]).abs().sum().into_scalar().elem();
        assert!(real > 0.0, "unpadded outputs should be non-zero");
    }

    #[test]
    fn test_encoding_ignores_padding_length() {
        let device = Default::default();
        let encoder = SequenceEncoderConfig::new(4, 3).init::<TestBackend>(&device);
        let short = Tensor::<TestBackend, 3>::random([1, 2, 4], Distribution::Normal(0.0, 1.0), &device);
        let noise = Tensor::<TestBackend, 3>::random([1, 5, 4], Distribution::Normal(0.0, 1.0), &device);
        let padded = Tensor::cat(vec![short.clone(), noise], 1);

        let alone = values(encoder.forward(short, mask(&[&[1.0, 1.0]])));
        let in_padding = encoder.forward(padded, mask(&[&[1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]]));
        let in_padding = values(in_padding.slice([0..1, 0..2, 0..6]));

        for (a, b) in alone.iter().zip(&in_padding) {
            assert!((a - b).abs() < 1e-5, "{alone:?} vs {in_padding:?}");
        }
    }

    #[test]
    fn test_backward_pass_through_reversal() {
        type AutodiffBackend = Autodiff<TestBackend>;
        let device = Default::default();
        let encoder = SequenceEncoderConfig::new(4, 3).init::<AutodiffBackend>(&device);
        let x = Tensor::<AutodiffBackend, 3>::random([2, 3, 4], Distribution::Normal(0.0, 1.0), &device)
            .require_grad();
        let mask = Tensor::<AutodiffBackend, 2>::from_data(
            TensorData::new(vec![1.0_f32, 1.0, 0.0, 1.0, 1.0, 1.0], [2, 3]),
            &device,
        );

        let grads = encoder.forward(x.clone(), mask).sum().backward();
        let grad = x.grad(&grads).expect("input should have gradient");
        let sum: f32 = grad.abs().sum().into_scalar().elem();
        assert!(sum > 0.0);
    }
}
