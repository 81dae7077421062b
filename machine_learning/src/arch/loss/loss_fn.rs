use ndarray::{Array2, ArrayView2};

use crate::Result;

/// A loss over per-class scores and integer class labels.
pub trait LossFn {
    /// Returns the mean loss of the batch.
    fn loss(&self, logits: ArrayView2<f32>, labels: &[usize]) -> Result<f32>;

    /// Returns the gradient of `loss` with respect to `logits`.
    fn loss_prime(&self, logits: ArrayView2<f32>, labels: &[usize]) -> Result<Array2<f32>>;
}
