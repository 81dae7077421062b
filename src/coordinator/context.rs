use std::num::NonZeroUsize;

use machine_learning::data::ShardSpec;

/// Where a worker sits in its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerContext {
    rank: usize,
    world_size: usize,
}

impl WorkerContext {
    /// Creates a new `WorkerContext`.
    ///
    /// A `world_size` of 0 describes a plain single process run.
    pub fn new(rank: usize, world_size: usize) -> Self {
        Self { rank, world_size }
    }

    /// The context of a run without a process group.
    pub fn single() -> Self {
        Self::new(0, 1)
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[inline]
    pub fn world_size(&self) -> usize {
        self.world_size
    }

    #[inline]
    pub fn is_distributed(&self) -> bool {
        self.world_size > 1
    }

    /// Exactly one worker of the group is the master, the only one allowed to log
    /// metrics and write checkpoints.
    #[inline]
    pub fn is_master(&self) -> bool {
        self.world_size == 0 || self.rank % self.world_size == 0
    }

    /// The slice of the dataset this worker trains on.
    pub fn shard(&self) -> ShardSpec {
        let world_size = NonZeroUsize::new(self.world_size).unwrap_or(NonZeroUsize::MIN);
        ShardSpec::new(self.rank % world_size.get(), world_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sole_workers_are_master() {
        assert!(WorkerContext::new(0, 0).is_master());
        assert!(WorkerContext::new(0, 1).is_master());
        assert!(WorkerContext::single().is_master());
    }

    #[test]
    fn exactly_one_master_per_group() {
        for world_size in 2..6 {
            let masters = (0..world_size)
                .filter(|&rank| WorkerContext::new(rank, world_size).is_master())
                .count();
            assert_eq!(masters, 1);
        }
        assert!(!WorkerContext::new(1, 2).is_master());
    }

    #[test]
    fn single_process_runs_use_the_whole_dataset() {
        let shard = WorkerContext::new(0, 0).shard();
        assert_eq!(shard.range(10), 0..10);
    }
}
