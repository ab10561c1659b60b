pub mod data;
pub mod error;
pub mod predict;
pub mod train;
pub mod worker;

pub use error::{Result, WorkerErr};
pub use predict::PredictWorker;
pub use train::TrainWorker;
pub use worker::{Superstep, Worker};
