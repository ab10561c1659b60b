pub mod config;
pub mod local;
pub mod msg;
mod peer;

pub use config::{Config, ConfigErr};
pub use local::{LocalCluster, LocalPeer, cluster};
pub use peer::{Peer, Record};

/// Returns the address under which the peer with `index` is reachable.
///
/// # Arguments
/// * `index` - The peer's index inside the synchronization group.
///
/// # Returns
/// The peer's name.
pub fn peer_name(index: usize) -> String {
    format!("peer-{index}")
}
