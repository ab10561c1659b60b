pub mod crf;
pub mod error;
pub mod inference;
pub mod registry;
pub mod structured;

pub use crf::{GraphCrf, InferenceMethod};
pub use error::{MlErr, Result};
pub use registry::{ModelRegistry, Registry};
pub use structured::{Graph, Labels, StructuredModel};
