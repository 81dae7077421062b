use std::{path::PathBuf, time::Duration};

use clap::Parser;

use crate::coordinator::{DEFAULT_ADDR, DEFAULT_PORT, DEFAULT_TIMEOUT, Rendezvous};

/// Trains a sequence classifier on one or more workers, keeping the best checkpoint.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Args {
    /// Model configuration file
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,

    /// Vocabulary file, one token per line
    #[arg(long, default_value = "vocab.txt")]
    pub vocab: PathBuf,

    /// Checkpoint file, restored at startup and overwritten on every improvement
    #[arg(long, default_value = "save_best.ckpt")]
    pub save: PathBuf,

    #[arg(long, default_value = "data/ratings_train.json")]
    pub train_data: PathBuf,

    #[arg(long, default_value = "data/ratings_test.json")]
    pub test_data: PathBuf,

    #[arg(long, default_value_t = 2)]
    pub epoch: usize,

    #[arg(long, default_value_t = 512)]
    pub batch: usize,

    /// Compute device, only `cpu` is available
    #[arg(long)]
    pub gpu: Option<String>,

    /// Amount of worker processes to train with
    #[arg(long, default_value_t = 1)]
    pub workers: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, alias = "weight_decay", default_value_t = 0.)]
    pub weight_decay: f32,

    #[arg(long, alias = "learning_rate", default_value_t = 5e-5)]
    pub learning_rate: f32,

    #[arg(long, alias = "adam_epsilon", default_value_t = 1e-8)]
    pub adam_epsilon: f32,

    #[arg(long, alias = "warmup_steps", default_value_t = 0)]
    pub warmup_steps: u64,

    /// Optional JSON lines file receiving one metrics record per epoch
    #[arg(long)]
    pub metrics: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_ADDR)]
    pub master_addr: String,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub master_port: u16,

    /// Seconds every worker has to join the group
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub rendezvous_timeout: u64,

    /// Set by the launcher on each spawned worker
    #[arg(long, hide = true)]
    pub rank: Option<usize>,

    /// Set by the launcher on each spawned worker
    #[arg(long, hide = true)]
    pub world_size: Option<usize>,
}

impl Args {
    /// Returns the size of the group this process belongs to.
    pub fn world_size(&self) -> usize {
        self.world_size.unwrap_or(self.workers)
    }

    /// Whether this process has to spawn the workers instead of training itself.
    pub fn is_launcher(&self) -> bool {
        self.rank.is_none() && self.world_size() > 1
    }

    pub fn rendezvous(&self) -> Rendezvous {
        Rendezvous {
            addr: self.master_addr.clone(),
            port: self.master_port,
            world_size: self.world_size(),
            timeout: Duration::from_secs(self.rendezvous_timeout),
        }
    }
}
