//! Round logic run by the coordinator.

mod broadcast;
mod predict;

use std::io;

use comms::Peer;
use machine_learning::Registry;

pub use broadcast::{BroadcastDriver, RoundSummary};
pub use predict::PredictDriver;

use crate::Result;

/// Registry of drivers constructible by name.
pub type DriverRegistry = Registry<Box<dyn Driver>>;

/// The coordinator's side of a run.
///
/// A driver owns every round: it sends the weights, synchronizes with the workers and
/// reads back their reports. It runs once per coordinator.
#[async_trait::async_trait]
pub trait Driver: Send {
    async fn run(&mut self, peer: &mut dyn Peer) -> Result<()>;
}

/// The names of every peer but the calling one.
pub(crate) fn worker_names(peer: &dyn Peer) -> io::Result<Vec<String>> {
    (0..peer.num_peers())
        .filter(|&index| index != peer.peer_index())
        .map(|index| peer.peer_name(index))
        .collect()
}

/// Drains the messages the last barrier delivered and decodes every one of them.
pub(crate) fn drain<T>(peer: &mut dyn Peer) -> io::Result<Vec<T>>
where
    T: std::str::FromStr<Err = io::Error>,
{
    std::iter::from_fn(|| peer.current_message())
        .map(|msg| msg.parse())
        .collect()
}
