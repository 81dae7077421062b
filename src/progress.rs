use log::debug;

/// A mean updated one value at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningMean {
    count: usize,
    mean: f64,
}

impl RunningMean {
    pub fn push(&mut self, value: f64) -> f64 {
        self.count += 1;
        self.mean += (value - self.mean) / self.count as f64;
        self.mean
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// The mean of every pushed value, 0 if there's none.
    pub fn mean(&self) -> f64 {
        self.mean
    }
}

/// Per batch progress of one epoch, reported at `debug` level unless silenced.
#[derive(Debug)]
pub struct Progress {
    stage: &'static str,
    rank: usize,
    epoch: Option<usize>,
    total: usize,
    done: usize,
    silent: bool,
}

impl Progress {
    pub fn train(rank: usize, epoch: usize, total: usize) -> Self {
        Self {
            stage: "Train",
            rank,
            epoch: Some(epoch),
            total,
            done: 0,
            silent: false,
        }
    }

    pub fn valid(rank: usize, total: usize) -> Self {
        Self {
            stage: "Valid",
            rank,
            epoch: None,
            total,
            done: 0,
            silent: false,
        }
    }

    pub fn silenced(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    #[inline]
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    #[inline]
    pub fn done(&self) -> usize {
        self.done
    }

    /// Marks one more batch as done.
    ///
    /// # Arguments
    /// * `postfix` - The batch's figures, e.g. `Loss: 0.693 (0.701)`.
    pub fn update(&mut self, postfix: impl FnOnce() -> String) {
        self.done += 1;

        if !self.silent && log::log_enabled!(log::Level::Debug) {
            let Self {
                stage,
                rank,
                done,
                total,
                ..
            } = *self;

            let postfix = postfix();
            match self.epoch {
                Some(epoch) => debug!(
                    rank = rank, epoch = epoch;
                    "{stage}({rank}) {epoch} [{done}/{total}] {postfix}"
                ),
                None => debug!(rank = rank; "{stage}({rank}) [{done}/{total}] {postfix}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_mean_matches_the_plain_mean() {
        let mut mean = RunningMean::default();
        assert_eq!(mean.mean(), 0.);

        for x in [1., 2., 3., 6.] {
            mean.push(x);
        }

        assert_eq!(mean.count(), 4);
        assert!((mean.mean() - 3.).abs() < 1e-12);
    }

    #[test]
    fn silenced_progress_still_counts_batches() {
        let mut progress = Progress::valid(1, 2).silenced(true);

        progress.update(String::new);
        progress.update(String::new);

        assert!(progress.is_silent());
        assert_eq!(progress.done(), 2);
    }
}
