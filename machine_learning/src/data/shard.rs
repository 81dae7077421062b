use std::num::NonZeroUsize;
use std::ops::Range;

/// Splits `total` samples among `world_size` workers and returns the shard for `rank`.
///
/// Properties:
/// - Ranges are contiguous, disjoint and cover `[0..total)`.
/// - Sizes differ by at most 1 (balanced partition).
pub fn shard_range(total: usize, rank: usize, world_size: usize) -> Range<usize> {
    assert!(world_size > 0);
    assert!(rank < world_size);

    let base = total / world_size;
    let rem = total % world_size;

    let start = rank * base + rank.min(rem);
    let extra = if rank < rem { 1 } else { 0 };
    let end = start + base + extra;

    start..end
}

/// The slot a worker occupies in a distributed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSpec {
    pub rank: usize,
    pub world_size: NonZeroUsize,
}

impl ShardSpec {
    pub fn new(rank: usize, world_size: NonZeroUsize) -> Self {
        assert!(rank < world_size.get(), "rank out of range");
        Self { rank, world_size }
    }

    #[inline]
    pub fn range(self, total: usize) -> Range<usize> {
        shard_range(total, self.rank, self.world_size.get())
    }

    /// The amount of samples every worker sees once `total` is padded up to a multiple of
    /// the world size.
    #[inline]
    pub fn padded_len(self, total: usize) -> usize {
        total.div_ceil(self.world_size.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_range_balanced() {
        // total 10, workers 3 => sizes 4,3,3
        assert_eq!(shard_range(10, 0, 3), 0..4);
        assert_eq!(shard_range(10, 1, 3), 4..7);
        assert_eq!(shard_range(10, 2, 3), 7..10);
    }

    #[test]
    fn padded_len_rounds_up() {
        let spec = ShardSpec::new(1, NonZeroUsize::new(3).unwrap());
        assert_eq!(spec.range(10), 4..7);
        assert_eq!(spec.padded_len(10), 4);
        assert_eq!(spec.padded_len(9), 3);
        assert_eq!(spec.padded_len(0), 0);
    }
}
