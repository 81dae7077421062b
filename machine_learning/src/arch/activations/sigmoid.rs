#[derive(Clone, Debug)]
pub struct Sigmoid {
    amp: f32,
}

impl Default for Sigmoid {
    fn default() -> Self {
        Self::new(1.)
    }
}

impl Sigmoid {
    pub fn new(amp: f32) -> Self {
        Self { amp }
    }

    pub fn f(&self, z: f32) -> f32 {
        self.amp / (1. + (-z).exp())
    }

    pub fn df(&self, z: f32) -> f32 {
        let amp = self.amp;

        (amp * (-z).exp()) / ((-z).exp() + 1.).powi(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivative_peaks_at_zero() {
        let sigmoid = Sigmoid::default();
        assert!((sigmoid.f(0.) - 0.5).abs() < 1e-6);
        assert!((sigmoid.df(0.) - 0.25).abs() < 1e-6);
        assert!(sigmoid.df(4.) < sigmoid.df(0.));
    }
}
