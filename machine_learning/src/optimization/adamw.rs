use rayon::prelude::*;

use super::Optimizer;
use crate::{MlErr, Result, arch::ParamGroup};

/// Adam with decoupled weight decay.
///
/// Each step applies the bias corrected Adam update and then shrinks every parameter of a
/// decaying group by `learning_rate * weight_decay`.
#[derive(Debug)]
pub struct AdamW {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    beta1_t: f32,
    beta2_t: f32,
    v: Box<[f32]>,
    s: Box<[f32]>,
    decay: Box<[f32]>,
    epsilon: f32,
}

impl AdamW {
    /// Creates a new `AdamW` optimizer.
    ///
    /// # Arguments
    /// * `groups` - The parameter groups of the model, the ones with `decay` unset are
    ///   exempt from weight decay.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `epsilon` - Added to the denominator for numerical stability.
    /// * `weight_decay` - The decoupled weight decay coefficient.
    ///
    /// # Returns
    /// A new `AdamW` instance.
    pub fn new(groups: &[ParamGroup], learning_rate: f32, epsilon: f32, weight_decay: f32) -> Self {
        let len = groups.iter().map(|g| g.range.end).max().unwrap_or(0);
        let mut decay = vec![0.; len];

        for group in groups.iter().filter(|g| g.decay) {
            decay[group.range.clone()].fill(weight_decay);
        }

        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            beta1_t: 1.,
            beta2_t: 1.,
            v: vec![0.; len].into_boxed_slice(),
            s: vec![0.; len].into_boxed_slice(),
            decay: decay.into_boxed_slice(),
            epsilon,
        }
    }
}

impl Optimizer for AdamW {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        for (what, got) in [("gradient", grad.len()), ("parameters", params.len())] {
            if got != self.v.len() {
                return Err(MlErr::SizeMismatch {
                    what,
                    got,
                    expected: self.v.len(),
                });
            }
        }

        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let bc1 = 1. - self.beta1_t;
        let bc2 = 1. - self.beta2_t;
        let step_size = lr * (bc2.sqrt() / bc1);

        params
            .par_iter_mut()
            .zip(grad.par_iter())
            .zip(self.v.par_iter_mut())
            .zip(self.s.par_iter_mut())
            .zip(self.decay.par_iter())
            .for_each(|((((p, g), v), s), wd)| {
                *v = b1 * *v + (1. - b1) * g;
                *s = b2 * *s + (1. - b2) * g.powi(2);
                *p -= step_size * *v / (s.sqrt() + eps);
                *p -= lr * wd * *p;
            });

        Ok(())
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }
}
