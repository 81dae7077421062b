use crate::Result;

/// Updates a flat parameter vector given its gradient.
pub trait Optimizer {
    /// Takes one optimization step.
    ///
    /// # Arguments
    /// * `grad` - The gradient of the loss with respect to `params`.
    /// * `params` - The parameters that are going to be modified.
    ///
    /// # Returns
    /// An error if `grad` and `params` don't match the optimizer's size.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()>;

    fn learning_rate(&self) -> f32;

    fn set_learning_rate(&mut self, learning_rate: f32);

    /// Clears a gradient buffer before the next accumulation.
    fn zero_grad(&self, grad: &mut [f32]) {
        grad.fill(0.);
    }
}
