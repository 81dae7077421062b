use std::{
    error::Error,
    fmt::{self, Display},
    io,
    path::PathBuf,
};

use rand_distr::NormalError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    TokenOutOfRange {
        token: u32,
        vocab_size: usize,
    },
    LabelOutOfRange {
        label: usize,
        classes: usize,
    },
    InvalidInput(String),
    EmptyVocab(PathBuf),
    DeviceUnavailable(String),
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Parse {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch { what, got, expected } => {
                write!(f, "size mismatch for {what}: got {got}, expected {expected}")
            }
            MlErr::TokenOutOfRange { token, vocab_size } => {
                write!(f, "token id {token} is out of range for a vocabulary of {vocab_size}")
            }
            MlErr::LabelOutOfRange { label, classes } => {
                write!(f, "label {label} is out of range for {classes} classes")
            }
            MlErr::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            MlErr::EmptyVocab(path) => write!(f, "the vocabulary at {} is empty", path.display()),
            MlErr::DeviceUnavailable(device) => write!(f, "device {device} is not available"),
            MlErr::Io { path, source } => write!(f, "failed to read {}: {source}", path.display()),
            MlErr::Parse { path, line, source } => {
                write!(f, "malformed record at {}:{line}: {source}", path.display())
            }
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Io { source, .. } => Some(source),
            MlErr::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<NormalError> for MlErr {
    fn from(value: NormalError) -> Self {
        Self::InvalidInput(value.to_string())
    }
}
