pub mod config;
pub mod coordinator;
pub mod defaults;
pub mod dispatcher;
pub mod driver;
pub mod error;
pub mod runner;

pub use config::{Mode, RoleKind};
pub use coordinator::Coordinator;
pub use dispatcher::Dispatcher;
pub use driver::{Driver, DriverRegistry};
pub use error::{NodeErr, Result};
pub use runner::run_local;
