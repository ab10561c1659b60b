use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        a: &'static str,
        b: &'static str,
        got: usize,
        expected: usize,
    },
    LabelOutOfRange {
        label: usize,
        n_states: usize,
    },
    EdgeOutOfRange {
        node: usize,
        n_nodes: usize,
    },
    Unsupported(&'static str),
    UnknownFactory {
        kind: &'static str,
        name: String,
    },
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                a,
                b,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch between {a} and {b}, got {got} and expected {expected}"
            ),
            MlErr::LabelOutOfRange { label, n_states } => {
                write!(f, "Label {label} is out of range for a model with {n_states} states")
            }
            MlErr::EdgeOutOfRange { node, n_nodes } => {
                write!(f, "An edge references node {node} of a graph with {n_nodes} nodes")
            }
            MlErr::Unsupported(what) => write!(f, "Unsupported model capability: {what}"),
            MlErr::UnknownFactory { kind, name } => {
                write!(f, "Unknown {kind} factory `{name}`")
            }
        }
    }
}

impl Error for MlErr {}
