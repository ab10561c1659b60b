use std::sync::Arc;

use comms::{Peer, config::keys};
use log::info;

use crate::{Result, driver::DriverRegistry};

/// The coordinator role, a thin shell around the configured driver.
pub struct Coordinator {
    drivers: Arc<DriverRegistry>,
}

impl Coordinator {
    /// Creates a new `Coordinator`.
    ///
    /// # Arguments
    /// * `drivers` - Where the configured driver is built from.
    ///
    /// # Returns
    /// A new `Coordinator` instance.
    pub fn new(drivers: Arc<DriverRegistry>) -> Self {
        Self { drivers }
    }

    /// The coordinator loads nothing.
    pub async fn setup(&mut self, _peer: &mut dyn Peer) -> Result<()> {
        Ok(())
    }

    /// Builds the driver named by `driver.entry_point` and runs it once.
    ///
    /// # Returns
    /// Whatever the driver returned, or the lookup error.
    pub async fn bsp(&mut self, peer: &mut dyn Peer) -> Result<()> {
        let name = peer.config().get_str(keys::DRIVER)?.to_string();
        let mut driver = self.drivers.build(&name)?;

        info!(peer = peer.peer_index(), driver = name.as_str(); "running driver");
        driver.run(peer).await
    }

    pub async fn cleanup(&mut self, _peer: &mut dyn Peer) -> Result<()> {
        Ok(())
    }
}
