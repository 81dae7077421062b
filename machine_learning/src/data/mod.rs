mod batch;
mod dataloader;
mod dataset;
mod sampler;
mod shard;

pub use batch::Batch;
pub use dataloader::{Batches, DataLoader};
pub use dataset::{Example, InMemoryDataset};
pub use sampler::Sampler;
pub use shard::{ShardSpec, shard_range};
