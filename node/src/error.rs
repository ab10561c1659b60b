use std::{error::Error, fmt, io};

use comms::ConfigErr;
use machine_learning::MlErr;
use worker::WorkerErr;

/// The node module's result type.
pub type Result<T> = std::result::Result<T, NodeErr>;

/// Failures of a node's roles and of the local runner.
#[derive(Debug)]
pub enum NodeErr {
    Io(io::Error),
    Config(ConfigErr),
    /// A model or driver name with nothing registered under it.
    Registry(MlErr),
    Worker(WorkerErr),
    /// The cluster or its input can't be laid out as asked.
    Layout(String),
}

impl fmt::Display for NodeErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Config(e) => write!(f, "config error: {e}"),
            Self::Registry(e) => write!(f, "registry error: {e}"),
            Self::Worker(e) => write!(f, "worker error: {e}"),
            Self::Layout(msg) => write!(f, "invalid layout: {msg}"),
        }
    }
}

impl Error for NodeErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Registry(e) => Some(e),
            Self::Worker(e) => Some(e),
            Self::Layout(_) => None,
        }
    }
}

impl From<io::Error> for NodeErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ConfigErr> for NodeErr {
    fn from(value: ConfigErr) -> Self {
        Self::Config(value)
    }
}

impl From<MlErr> for NodeErr {
    fn from(value: MlErr) -> Self {
        Self::Registry(value)
    }
}

impl From<WorkerErr> for NodeErr {
    fn from(value: WorkerErr) -> Self {
        Self::Worker(value)
    }
}
