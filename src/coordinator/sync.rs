use crate::error::CoordinatorErr;

/// Averages gradients across the workers of a group.
///
/// `reduce` is a blocking collective. Every worker must call it the same number of
/// times per epoch, with buffers of the same length, or the group deadlocks. The
/// distributed sampler guarantees this by giving every worker the same batch count.
pub trait Synchronizer {
    /// Replaces `grad` with the mean of every worker's `grad`.
    fn reduce(&mut self, grad: &mut [f32]) -> Result<(), CoordinatorErr>;
}

/// The synchronizer of a single worker run.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalSync;

impl Synchronizer for LocalSync {
    fn reduce(&mut self, _grad: &mut [f32]) -> Result<(), CoordinatorErr> {
        Ok(())
    }
}
