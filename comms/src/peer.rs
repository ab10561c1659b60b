use std::io;

use crate::Config;

/// A single input record handed to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub value: String,
}

impl Record {
    /// Creates a new `Record`.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The capabilities a peer of the synchronization group exposes to the roles running on it.
///
/// Every peer advances through barrier separated supersteps, a message sent during
/// a superstep is only visible to its recipient after the barrier that closes it.
#[async_trait::async_trait]
pub trait Peer: Send {
    /// The run configuration, shared by every peer.
    fn config(&self) -> &Config;

    /// This peer's index inside the group.
    fn peer_index(&self) -> usize;

    /// The amount of peers in the group.
    fn num_peers(&self) -> usize;

    /// Resolves the name under which the peer with `index` receives messages.
    ///
    /// # Returns
    /// The peer name or `io::ErrorKind::NotFound` if there is no such peer.
    fn peer_name(&self, index: usize) -> io::Result<String>;

    /// Blocks until every peer of the group reached the barrier.
    async fn sync(&mut self) -> io::Result<()>;

    /// Stages `msg` for delivery to `peer_name` at the end of the current superstep.
    async fn send(&mut self, peer_name: &str, msg: String) -> io::Result<()>;

    /// Pops the next message delivered by the last barrier.
    fn current_message(&mut self) -> Option<String>;

    /// Reads the next input record, `None` once the input is exhausted.
    fn read_next(&mut self) -> io::Result<Option<Record>>;

    /// Persists an output record.
    fn write(&mut self, key: &str, value: &str) -> io::Result<()>;

    /// Writes a line to the peer's log.
    fn log(&self, line: &str);
}
