use ndarray::Array2;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::arch::Mode;

/// Inverted dropout: zeroes each activation with probability `p` during training and
/// rescales the survivors by `1 / (1 - p)`.
#[derive(Debug, Clone)]
pub struct Dropout {
    p: f32,
    rng: StdRng,
    mask: Option<Array2<f32>>,
}

impl Dropout {
    pub fn new(p: f32, seed: u64) -> Self {
        Self {
            p: p.clamp(0., 1.),
            rng: StdRng::seed_from_u64(seed),
            mask: None,
        }
    }

    pub fn forward(&mut self, x: Array2<f32>, mode: Mode) -> Array2<f32> {
        if mode == Mode::Eval || self.p == 0. {
            self.mask = None;
            return x;
        }

        let p = self.p;
        let keep = if p < 1. { 1. / (1. - p) } else { 0. };
        let rng = &mut self.rng;
        let mask = Array2::from_shape_fn(x.dim(), |_| if rng.random::<f32>() < p { 0. } else { keep });

        let out = x * &mask;
        self.mask = Some(mask);
        out
    }

    pub fn backward(&self, d: Array2<f32>) -> Array2<f32> {
        match &self.mask {
            Some(mask) => d * mask,
            None => d,
        }
    }
}
