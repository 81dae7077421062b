use super::Optimizer;

/// Adjusts an optimizer's learning rate as training advances.
pub trait Scheduler {
    /// Advances one step and updates the learning rate of `optimizer`.
    fn step(&mut self, optimizer: &mut dyn Optimizer);

    /// Returns the amount of steps taken so far.
    fn steps(&self) -> u64;
}

/// Linear warmup from zero up to the base learning rate over `warmup` steps, then linear
/// decay down to zero at `total` steps.
#[derive(Debug, Clone)]
pub struct LinearWarmup {
    base_lr: f32,
    warmup: u64,
    total: u64,
    step: u64,
}

impl LinearWarmup {
    /// Creates the schedule and sets the learning rate of `optimizer` to its initial value.
    ///
    /// The optimizer's current learning rate is taken as the base one.
    pub fn new(optimizer: &mut dyn Optimizer, warmup: u64, total: u64) -> Self {
        let schedule = Self {
            base_lr: optimizer.learning_rate(),
            warmup,
            total,
            step: 0,
        };

        optimizer.set_learning_rate(schedule.learning_rate_at(0));
        schedule
    }

    /// Returns the multiplier applied to the base learning rate at `step`.
    pub fn factor(&self, step: u64) -> f32 {
        if step < self.warmup {
            return step as f32 / self.warmup.max(1) as f32;
        }

        let left = self.total.saturating_sub(step) as f32;
        let span = self.total.saturating_sub(self.warmup).max(1) as f32;
        (left / span).max(0.)
    }

    pub fn learning_rate_at(&self, step: u64) -> f32 {
        self.base_lr * self.factor(step)
    }
}

impl Scheduler for LinearWarmup {
    fn step(&mut self, optimizer: &mut dyn Optimizer) {
        self.step += 1;
        optimizer.set_learning_rate(self.learning_rate_at(self.step));
    }

    fn steps(&self) -> u64 {
        self.step
    }
}
