//! An in-process synchronization group: every peer is a handle over the same shared
//! barrier and mailboxes, meant to be driven from one task per peer.

use std::{
    collections::VecDeque,
    io,
    mem,
    sync::Arc,
};

use log::{debug, error};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{Config, Peer, Record, peer_name};

/// A line logged by one of the peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub peer: usize,
    pub line: String,
}

/// Barrier bookkeeping and the mailboxes it swaps on release.
struct Group {
    parties: usize,
    arrived: usize,
    generation: u64,
    staged: Vec<Vec<String>>,
    delivered: Vec<VecDeque<String>>,
}

impl Group {
    /// Opens the barrier, the staged messages become the delivered ones and whatever
    /// was left unread from the previous superstep is dropped.
    fn release(&mut self) {
        self.arrived = 0;
        self.generation += 1;

        for (staged, delivered) in self.staged.iter_mut().zip(&mut self.delivered) {
            *delivered = mem::take(staged).into();
        }
    }

    fn is_complete(&self) -> bool {
        self.arrived > 0 && self.arrived >= self.parties
    }
}

struct Shared {
    config: Config,
    size: usize,
    group: Mutex<Group>,
    release: watch::Sender<u64>,
    logs: Mutex<Vec<LogLine>>,
    outputs: Mutex<Vec<Record>>,
}

impl Shared {
    fn open(&self, group: &mut Group) {
        group.release();
        self.release.send_replace(group.generation);
        debug!(generation = group.generation; "barrier released");
    }
}

/// Observer handle over a local synchronization group.
#[derive(Clone)]
pub struct LocalCluster {
    shared: Arc<Shared>,
}

impl LocalCluster {
    /// The amount of peers the group was created with.
    pub fn size(&self) -> usize {
        self.shared.size
    }

    /// Every line logged so far, in logging order.
    pub fn logs(&self) -> Vec<LogLine> {
        self.shared.logs.lock().clone()
    }

    /// The lines logged so far by the peer with `index`.
    pub fn peer_logs(&self, index: usize) -> Vec<String> {
        self.shared
            .logs
            .lock()
            .iter()
            .filter(|log| log.peer == index)
            .map(|log| log.line.clone())
            .collect()
    }

    /// Every output record written so far, in writing order.
    pub fn outputs(&self) -> Vec<Record> {
        self.shared.outputs.lock().clone()
    }
}

/// Creates a local synchronization group with one peer per input shard.
///
/// # Arguments
/// * `config` - The configuration every peer sees.
/// * `inputs` - The records each peer reads, the i-th shard belongs to the i-th peer.
///
/// # Returns
/// An observer handle of the group and the peers, ordered by index.
pub fn cluster(config: Config, inputs: Vec<Vec<Record>>) -> (LocalCluster, Vec<LocalPeer>) {
    let size = inputs.len();
    let group = Group {
        parties: size,
        arrived: 0,
        generation: 0,
        staged: vec![Vec::new(); size],
        delivered: vec![VecDeque::new(); size],
    };

    let (release, _) = watch::channel(0);
    let shared = Arc::new(Shared {
        config,
        size,
        group: Mutex::new(group),
        release,
        logs: Mutex::new(Vec::new()),
        outputs: Mutex::new(Vec::new()),
    });

    let peers = inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| LocalPeer {
            index,
            shared: Arc::clone(&shared),
            input: input.into(),
            inbox: VecDeque::new(),
        })
        .collect();

    (LocalCluster { shared }, peers)
}

/// A peer of a local synchronization group.
///
/// Dropping the peer removes it from the group, the barrier then stops waiting for it.
pub struct LocalPeer {
    index: usize,
    shared: Arc<Shared>,
    input: VecDeque<Record>,
    inbox: VecDeque<String>,
}

impl LocalPeer {
    fn resolve(&self, name: &str) -> io::Result<usize> {
        name.strip_prefix("peer-")
            .and_then(|index| index.parse::<usize>().ok())
            .filter(|&index| index < self.shared.size)
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("unknown peer `{name}`"))
            })
    }
}

#[async_trait::async_trait]
impl Peer for LocalPeer {
    fn config(&self) -> &Config {
        &self.shared.config
    }

    fn peer_index(&self) -> usize {
        self.index
    }

    fn num_peers(&self) -> usize {
        self.shared.size
    }

    fn peer_name(&self, index: usize) -> io::Result<String> {
        if index >= self.shared.size {
            let text = format!("peer index {index} out of range for {} peers", self.shared.size);
            return Err(io::Error::new(io::ErrorKind::NotFound, text));
        }

        Ok(peer_name(index))
    }

    async fn sync(&mut self) -> io::Result<()> {
        let mut release = self.shared.release.subscribe();

        let generation = {
            let mut group = self.shared.group.lock();
            group.arrived += 1;
            let generation = group.generation;

            if group.is_complete() {
                self.shared.open(&mut group);
            }

            generation
        };

        let released = release.wait_for(|&g| g > generation).await.is_ok();
        if !released {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "the synchronization group was torn down",
            ));
        }

        let mut group = self.shared.group.lock();
        self.inbox = mem::take(&mut group.delivered[self.index]);
        Ok(())
    }

    async fn send(&mut self, peer_name: &str, msg: String) -> io::Result<()> {
        let index = self.resolve(peer_name)?;
        self.shared.group.lock().staged[index].push(msg);
        Ok(())
    }

    fn current_message(&mut self) -> Option<String> {
        self.inbox.pop_front()
    }

    fn read_next(&mut self) -> io::Result<Option<Record>> {
        Ok(self.input.pop_front())
    }

    fn write(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.shared.outputs.lock().push(Record::new(key, value));
        Ok(())
    }

    fn log(&self, line: &str) {
        error!(peer = self.index; "{line}");
        self.shared.logs.lock().push(LogLine {
            peer: self.index,
            line: line.to_string(),
        });
    }
}

impl Drop for LocalPeer {
    fn drop(&mut self) {
        let mut group = self.shared.group.lock();
        group.parties -= 1;
        debug!(peer = self.index, parties = group.parties; "peer left the group");

        if group.is_complete() {
            self.shared.open(&mut group);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (LocalCluster, LocalPeer, LocalPeer) {
        let (cluster, mut peers) = cluster(Config::default(), vec![Vec::new(), Vec::new()]);
        let b = peers.pop().unwrap();
        let a = peers.pop().unwrap();
        (cluster, a, b)
    }

    #[tokio::test]
    async fn messages_become_visible_after_the_barrier() {
        let (_cluster, mut a, mut b) = pair();

        a.send("peer-1", "hello".into()).await.unwrap();
        assert_eq!(b.current_message(), None);

        let (ra, rb) = tokio::join!(a.sync(), b.sync());
        ra.unwrap();
        rb.unwrap();

        assert_eq!(b.current_message().as_deref(), Some("hello"));
        assert_eq!(b.current_message(), None);
        assert_eq!(a.current_message(), None);
    }

    #[tokio::test]
    async fn unread_messages_are_dropped_at_the_next_barrier() {
        let (_cluster, mut a, mut b) = pair();

        a.send("peer-1", "stale".into()).await.unwrap();
        let (ra, rb) = tokio::join!(a.sync(), b.sync());
        ra.unwrap();
        rb.unwrap();

        let (ra, rb) = tokio::join!(a.sync(), b.sync());
        ra.unwrap();
        rb.unwrap();

        assert_eq!(b.current_message(), None);
    }

    #[tokio::test]
    async fn departed_peers_do_not_stall_the_barrier() {
        let (_cluster, mut peers) = cluster(Config::default(), vec![Vec::new(); 3]);
        let c = peers.pop().unwrap();
        let b = peers.pop().unwrap();
        let mut a = peers.pop().unwrap();

        let waiting = tokio::spawn(async move {
            a.sync().await.unwrap();
            a
        });

        drop(b);
        drop(c);

        let a = waiting.await.unwrap();
        assert_eq!(a.peer_index(), 0);
    }

    #[tokio::test]
    async fn unknown_peers_are_rejected() {
        let (_cluster, mut a, _b) = pair();

        let err = a.send("peer-7", "x".into()).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        let err = a.send("coordinator", "x".into()).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        assert!(a.peer_name(2).is_err());
        assert_eq!(a.peer_name(1).unwrap(), "peer-1");
    }

    #[test]
    fn input_logs_and_outputs() {
        let input = vec![Record::new("0", "a"), Record::new("1", "b")];
        let (cluster, mut peers) = cluster(Config::default(), vec![input]);
        let peer = &mut peers[0];

        assert_eq!(peer.read_next().unwrap(), Some(Record::new("0", "a")));
        assert_eq!(peer.read_next().unwrap(), Some(Record::new("1", "b")));
        assert_eq!(peer.read_next().unwrap(), None);

        peer.log("something happened");
        peer.write("k", "v").unwrap();

        assert_eq!(cluster.peer_logs(0), vec!["something happened".to_string()]);
        assert_eq!(cluster.outputs(), vec![Record::new("k", "v")]);
    }
}
