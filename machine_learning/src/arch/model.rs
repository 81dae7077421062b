use std::ops::Range;

use ndarray::{Array2, ArrayView2, Axis};
use rand::rngs::StdRng;

use crate::{Result, data::Batch};

/// Whether a forward pass is part of training or of evaluation.
///
/// Stochastic layers such as dropout are only active in `Mode::Train`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// A named slice of the flat parameter vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamGroup {
    pub name: &'static str,
    pub range: Range<usize>,
    /// Whether weight decay applies to this group.
    pub decay: bool,
}

/// A model whose parameters live outside of it, in a flat `[f32]` buffer.
///
/// The model only keeps what a forward pass has to remember for the following backward
/// pass, so the same instance can be run against different parameter vectors.
pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Returns how the parameter vector is split into groups.
    fn param_groups(&self) -> Vec<ParamGroup>;

    /// Samples a fresh parameter vector.
    fn init_params(&self, rng: &mut StdRng) -> Result<Vec<f32>>;

    /// Computes the per-class scores of a batch.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `batch` - The inputs.
    /// * `mode` - Whether this pass is followed by a `backward` call.
    ///
    /// # Returns
    /// A `(batch, classes)` matrix of logits.
    fn forward(&mut self, params: &[f32], batch: &Batch, mode: Mode) -> Result<Array2<f32>>;

    /// Accumulates into `grad` the gradient of the loss with respect to the parameters,
    /// given its gradient with respect to the logits of the last forward pass.
    fn backward(&mut self, params: &[f32], grad: &mut [f32], d_logits: Array2<f32>) -> Result<()>;
}

/// Returns the index of the highest score of each row, the first one on ties.
pub fn argmax_rows(logits: ArrayView2<f32>) -> Vec<usize> {
    logits
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |(best, max), (i, &x)| {
                    if x > max { (i, x) } else { (best, max) }
                })
                .0
        })
        .collect()
}
