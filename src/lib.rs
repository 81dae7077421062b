//! Distributed training of a sequence classifier with best checkpoint tracking.

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod epoch;
pub mod error;
pub mod launch;
pub mod master;
pub mod metrics;
pub mod progress;
pub mod state;
pub mod supervisor;

pub use error::{CheckpointErr, CoordinatorErr, Result, TrainErr};
pub use supervisor::{RunSummary, train_model};
