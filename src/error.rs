use std::{
    error::Error,
    fmt::{self, Display},
    io,
    path::PathBuf,
    time::Duration,
};

use machine_learning::MlErr;

/// The result type used across the trainer.
pub type Result<T> = std::result::Result<T, TrainErr>;

/// Errors raised while establishing or using the process group.
#[derive(Debug)]
pub enum CoordinatorErr {
    /// Could not listen on the rendezvous address.
    Bind { addr: String, source: io::Error },
    /// Not every worker joined before the deadline.
    Timeout { waited: Duration, detail: String },
    InvalidRank { rank: usize, world_size: usize },
    DuplicateRank(usize),
    WorldSizeMismatch { got: usize, expected: usize },
    /// A peer sent a message that doesn't fit the current step of the protocol.
    Unexpected {
        expected: &'static str,
        got: &'static str,
    },
    /// A collective was called with buffers of different lengths across workers.
    SizeMismatch { got: usize, expected: usize },
    Io(io::Error),
}

impl Display for CoordinatorErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind { addr, source } => write!(f, "failed to listen at {addr}: {source}"),
            Self::Timeout { waited, detail } => {
                write!(f, "rendezvous timed out after {waited:?}: {detail}")
            }
            Self::InvalidRank { rank, world_size } => {
                write!(f, "rank {rank} is out of range for a world of {world_size}")
            }
            Self::DuplicateRank(rank) => write!(f, "rank {rank} joined twice"),
            Self::WorldSizeMismatch { got, expected } => {
                write!(f, "peer expects a world of {got}, this one has {expected}")
            }
            Self::Unexpected { expected, got } => {
                write!(f, "expected a {expected} message, got {got}")
            }
            Self::SizeMismatch { got, expected } => {
                write!(f, "collective buffer has {got} values, expected {expected}")
            }
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for CoordinatorErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Bind { source, .. } => Some(source),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CoordinatorErr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Errors raised while reading or writing checkpoints.
#[derive(Debug)]
pub enum CheckpointErr {
    Io { path: PathBuf, source: io::Error },
    /// The file exists but can't be used to restore this model.
    Corrupt { path: PathBuf, reason: String },
}

impl Display for CheckpointErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "checkpoint io error at {}: {source}", path.display())
            }
            Self::Corrupt { path, reason } => {
                write!(f, "corrupt checkpoint at {}: {reason}", path.display())
            }
        }
    }
}

impl Error for CheckpointErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Corrupt { .. } => None,
        }
    }
}

/// All errors that can end a training run.
#[derive(Debug)]
pub enum TrainErr {
    /// Invalid configuration, caught before any epoch.
    InvalidConfig(String),
    /// A configuration file couldn't be read.
    Io { path: PathBuf, source: io::Error },
    /// A configuration file couldn't be parsed.
    Format {
        path: PathBuf,
        source: serde_json::Error,
    },
    Ml(MlErr),
    Checkpoint(CheckpointErr),
    Coordinator(CoordinatorErr),
    /// A batch produced a NaN or infinite loss.
    NonFiniteLoss { epoch: usize, batch: usize },
    /// Spawned workers that didn't exit successfully.
    WorkersFailed(Vec<usize>),
}

impl Display for TrainErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Io { path, source } => write!(f, "failed to read {}: {source}", path.display()),
            Self::Format { path, source } => {
                write!(f, "failed to parse {}: {source}", path.display())
            }
            Self::Ml(e) => write!(f, "{e}"),
            Self::Checkpoint(e) => write!(f, "{e}"),
            Self::Coordinator(e) => write!(f, "process group: {e}"),
            Self::NonFiniteLoss { epoch, batch } => {
                write!(f, "non finite loss at epoch {epoch}, batch {batch}")
            }
            Self::WorkersFailed(ranks) => write!(f, "workers {ranks:?} failed"),
        }
    }
}

impl Error for TrainErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Format { source, .. } => Some(source),
            Self::Ml(e) => Some(e),
            Self::Checkpoint(e) => Some(e),
            Self::Coordinator(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for TrainErr {
    fn from(e: MlErr) -> Self {
        Self::Ml(e)
    }
}

impl From<CheckpointErr> for TrainErr {
    fn from(e: CheckpointErr) -> Self {
        Self::Checkpoint(e)
    }
}

impl From<CoordinatorErr> for TrainErr {
    fn from(e: CoordinatorErr) -> Self {
        Self::Coordinator(e)
    }
}
