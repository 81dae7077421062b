use log::{info, warn};

use crate::{
    checkpoint::CheckpointManager,
    coordinator::WorkerContext,
    epoch::EpochResult,
    error::Result,
    metrics::MetricLogger,
    progress::Progress,
    state::ModelState,
};

/// Performs the side effects only the master worker is allowed to have.
///
/// On any other worker every method is a no-op.
pub struct MasterGate {
    ctx: WorkerContext,
    logger: Option<Box<dyn MetricLogger>>,
}

impl MasterGate {
    /// Creates a new `MasterGate`, the logger is dropped right away on non master workers.
    pub fn new(ctx: WorkerContext, logger: Box<dyn MetricLogger>) -> Self {
        Self {
            ctx,
            logger: ctx.is_master().then_some(logger),
        }
    }

    #[inline]
    pub fn is_master(&self) -> bool {
        self.ctx.is_master()
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.ctx.rank()
    }

    /// The batch progress of a training epoch, silent on non master workers.
    pub fn train_progress(&self, epoch: usize, total: usize) -> Progress {
        Progress::train(self.rank(), epoch, total).silenced(!self.is_master())
    }

    /// The batch progress of an evaluation pass, silent on non master workers.
    pub fn valid_progress(&self, total: usize) -> Progress {
        Progress::valid(self.rank(), total).silenced(!self.is_master())
    }

    /// Records the loss and accuracy of an epoch. Failures are only reported.
    pub fn log_epoch(&mut self, result: &EpochResult) {
        let Some(logger) = self.logger.as_mut() else {
            return;
        };

        let metrics = [
            ("loss", f64::from(result.loss)),
            ("accuracy", f64::from(result.score)),
        ];

        if let Err(e) = logger.log(result.epoch, &metrics) {
            warn!(epoch = result.epoch; "failed to log metrics: {e}");
        }
    }

    /// Checkpoints `state` if `result` improves on its best record.
    ///
    /// # Returns
    /// Whether a checkpoint was written, always `false` on non master workers.
    pub fn maybe_checkpoint(
        &self,
        manager: &CheckpointManager,
        state: &mut ModelState,
        result: &EpochResult,
    ) -> Result<bool> {
        if !self.is_master() || !manager.maybe_save(state, result)? {
            return Ok(false);
        }

        let best = state.best;
        info!(
            ">>>> rank: {} save model to {}, epoch={}, loss={:.3}, score={:.3}",
            self.ctx.rank(),
            manager.path().display(),
            best.epoch,
            best.loss,
            best.score
        );

        Ok(true)
    }
}
