use std::{error::Error, fmt, io};

use comms::ConfigErr;
use machine_learning::MlErr;

/// The worker module's result type.
pub type Result<T> = std::result::Result<T, WorkerErr>;

/// Worker runtime failures.
#[derive(Debug)]
pub enum WorkerErr {
    Io(io::Error),
    Config(ConfigErr),
    Model(MlErr),
    MalformedRecord {
        key: String,
        reason: String,
    },
    IdentifierMismatch {
        key: String,
        block: &'static str,
        expected: f64,
        got: f64,
    },
    MissingWeights,
    NotReady,
}

impl fmt::Display for WorkerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerErr::Io(e) => write!(f, "io error: {e}"),
            WorkerErr::Config(e) => write!(f, "config error: {e}"),
            WorkerErr::Model(e) => write!(f, "model error: {e}"),
            WorkerErr::MalformedRecord { key, reason } => {
                write!(f, "malformed record {key}: {reason}")
            }
            WorkerErr::IdentifierMismatch {
                key,
                block,
                expected,
                got,
            } => write!(
                f,
                "identifier mismatch in record {key}: the {block} block carries {got}, expected {expected}"
            ),
            WorkerErr::MissingWeights => {
                write!(f, "no weight vector received for the inference round")
            }
            WorkerErr::NotReady => write!(f, "the worker's shard was never loaded"),
        }
    }
}

impl Error for WorkerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorkerErr::Io(e) => Some(e),
            WorkerErr::Config(e) => Some(e),
            WorkerErr::Model(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WorkerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ConfigErr> for WorkerErr {
    fn from(value: ConfigErr) -> Self {
        Self::Config(value)
    }
}

impl From<MlErr> for WorkerErr {
    fn from(value: MlErr) -> Self {
        Self::Model(value)
    }
}
