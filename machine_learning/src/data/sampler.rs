use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::ShardSpec;

/// Decides the order in which the examples of a dataset are visited.
#[derive(Debug, Clone)]
pub enum Sampler {
    /// Visits every example in storage order.
    Sequential,
    /// Visits every example in a fresh permutation each epoch.
    Random { rng: StdRng },
    /// Visits this worker's slice of a permutation shared by every worker.
    ///
    /// The permutation is derived from `seed + epoch`, so all workers must call
    /// `set_epoch` with the same value before iterating.
    Distributed {
        seed: u64,
        epoch: u64,
        shard: ShardSpec,
        shuffle: bool,
    },
}

impl Sampler {
    pub fn random(seed: u64) -> Self {
        Self::Random {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn distributed(seed: u64, shard: ShardSpec, shuffle: bool) -> Self {
        Self::Distributed {
            seed,
            epoch: 0,
            shard,
            shuffle,
        }
    }

    /// Sets the epoch of a distributed sampler, the rest ignore it.
    pub fn set_epoch(&mut self, value: u64) {
        if let Self::Distributed { epoch, .. } = self {
            *epoch = value;
        }
    }

    /// Returns the amount of indices this sampler yields for a dataset of `total` examples.
    pub fn num_samples(&self, total: usize) -> usize {
        match self {
            Self::Sequential | Self::Random { .. } => total,
            Self::Distributed { shard, .. } => shard.padded_len(total),
        }
    }

    /// Draws the indices for one pass over a dataset of `total` examples.
    ///
    /// A distributed sampler pads the permutation by wrapping around to its start until
    /// it divides evenly among the workers, so every worker gets the same amount.
    pub fn indices(&mut self, total: usize) -> Vec<usize> {
        let mut order: Vec<_> = (0..total).collect();

        match self {
            Self::Sequential => order,
            Self::Random { rng } => {
                order.shuffle(rng);
                order
            }
            &mut Self::Distributed {
                seed,
                epoch,
                shard,
                shuffle,
            } => {
                if total == 0 {
                    return order;
                }

                if shuffle {
                    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(epoch));
                    order.shuffle(&mut rng);
                }

                let padded = shard.padded_len(total) * shard.world_size.get();
                for i in total..padded {
                    order.push(order[i % total]);
                }

                order[shard.range(padded)].to_vec()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, num::NonZeroUsize};

    use super::*;

    fn shard(rank: usize, world_size: usize) -> ShardSpec {
        ShardSpec::new(rank, NonZeroUsize::new(world_size).unwrap())
    }

    #[test]
    fn sequential_keeps_storage_order() {
        assert_eq!(Sampler::Sequential.indices(4), vec![0, 1, 2, 3]);
    }

    #[test]
    fn random_is_reproducible_for_a_seed() {
        let a = Sampler::random(7).indices(50);
        let b = Sampler::random(7).indices(50);
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn distributed_shards_cover_the_padded_dataset() {
        let total = 10;
        let world_size = 4;
        let mut seen = Vec::new();

        for rank in 0..world_size {
            let mut sampler = Sampler::distributed(3, shard(rank, world_size), true);
            sampler.set_epoch(2);
            let indices = sampler.indices(total);
            assert_eq!(indices.len(), 3);
            assert_eq!(sampler.num_samples(total), 3);
            seen.extend(indices);
        }

        assert_eq!(seen.len(), 12);
        let unique: HashSet<_> = seen.into_iter().collect();
        assert_eq!(unique.len(), total);
    }

    #[test]
    fn distributed_order_changes_with_the_epoch() {
        let mut sampler = Sampler::distributed(0, shard(0, 1), true);
        sampler.set_epoch(0);
        let first = sampler.indices(64);
        sampler.set_epoch(1);
        let second = sampler.indices(64);
        sampler.set_epoch(0);
        let again = sampler.indices(64);

        assert_ne!(first, second);
        assert_eq!(first, again);
    }

    #[test]
    fn distributed_without_shuffle_wraps_in_order() {
        let mut sampler = Sampler::distributed(0, shard(1, 2), false);
        assert_eq!(sampler.indices(3), vec![2, 0]);
    }

    #[test]
    fn empty_datasets_yield_nothing() {
        let mut sampler = Sampler::distributed(0, shard(1, 2), true);
        assert!(sampler.indices(0).is_empty());
        assert_eq!(sampler.num_samples(0), 0);
    }
}
