use std::{num::NonZeroUsize, sync::Arc};

use super::{Batch, InMemoryDataset, Sampler};

/// Groups the examples drawn by a `Sampler` into collated batches.
#[derive(Debug, Clone)]
pub struct DataLoader {
    dataset: Arc<InMemoryDataset>,
    sampler: Sampler,
    batch_size: NonZeroUsize,
}

impl DataLoader {
    pub fn new(dataset: Arc<InMemoryDataset>, sampler: Sampler, batch_size: NonZeroUsize) -> Self {
        Self {
            dataset,
            sampler,
            batch_size,
        }
    }

    /// Returns the amount of batches a pass over this loader yields.
    #[inline]
    pub fn len(&self) -> usize {
        self.sampler
            .num_samples(self.dataset.len())
            .div_ceil(self.batch_size.get())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn set_epoch(&mut self, epoch: u64) {
        self.sampler.set_epoch(epoch);
    }

    /// Starts a new pass over the dataset.
    pub fn batches(&mut self) -> Batches<'_> {
        let indices = self.sampler.indices(self.dataset.len());

        Batches {
            dataset: &self.dataset,
            indices,
            batch_size: self.batch_size.get(),
            cursor: 0,
        }
    }
}

/// An iterator over the batches of one pass.
pub struct Batches<'a> {
    dataset: &'a InMemoryDataset,
    indices: Vec<usize>,
    batch_size: usize,
    cursor: usize,
}

impl Iterator for Batches<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.indices.len() {
            return None;
        }

        let end = (self.cursor + self.batch_size).min(self.indices.len());
        let examples: Vec<_> = self.indices[self.cursor..end]
            .iter()
            .filter_map(|&i| self.dataset.get(i))
            .collect();

        self.cursor = end;
        Some(Batch::collate(&examples))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.indices.len() - self.cursor).div_ceil(self.batch_size);
        (left, Some(left))
    }
}

impl ExactSizeIterator for Batches<'_> {}
