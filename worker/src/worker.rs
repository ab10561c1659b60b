use std::{io, panic, sync::Arc};

use comms::{Peer, config::keys};
use log::{info, warn};
use machine_learning::{ModelRegistry, StructuredModel};
use tokio::task;

use crate::{Result, data::ShardState};

/// What a worker does after finishing a superstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Superstep {
    Continue,
    Done,
}

/// A worker role strategy.
///
/// `setup` loads the worker's shard, `bsp` runs its supersteps until the strategy is
/// done. A worker whose setup never completed does not take part in any superstep.
#[async_trait::async_trait]
pub trait Worker: Send {
    /// Short name of the strategy, used for logging.
    fn kind(&self) -> &'static str;

    /// Whether `setup` completed.
    fn is_ready(&self) -> bool;

    /// Loads the worker's shard from the peer's input.
    async fn setup(&mut self, peer: &mut dyn Peer) -> Result<()>;

    /// Runs a single superstep.
    async fn superstep(&mut self, peer: &mut dyn Peer) -> Result<Superstep>;

    /// Runs supersteps until the strategy reports it is done.
    async fn bsp(&mut self, peer: &mut dyn Peer) -> Result<()> {
        if !self.is_ready() {
            warn!(peer = peer.peer_index(), kind = self.kind(); "skipping the supersteps, the shard was never loaded");
            return Ok(());
        }

        let mut round = 0usize;
        while self.superstep(peer).await? == Superstep::Continue {
            round += 1;
        }

        info!(peer = peer.peer_index(), kind = self.kind(), rounds = round; "worker finished");
        Ok(())
    }

    async fn cleanup(&mut self, _peer: &mut dyn Peer) -> Result<()> {
        Ok(())
    }
}

/// A worker's model together with the shard it loaded.
pub(crate) struct Loaded {
    pub model: Box<dyn StructuredModel>,
    pub shard: ShardState,
}

impl Loaded {
    /// Builds the configured model and reads the peer's whole input with it.
    ///
    /// # Arguments
    /// * `peer` - The peer whose input is loaded.
    /// * `models` - The registry the `model.factory` key is resolved in.
    /// * `with_joints` - Whether the ground truth joints are needed.
    pub(crate) fn load(
        peer: &mut dyn Peer,
        models: &ModelRegistry,
        with_joints: bool,
    ) -> Result<Self> {
        let model = models.build(peer.config().get_str(keys::MODEL_FACTORY)?)?;
        let shard = ShardState::load(peer, model.as_ref(), with_joints)?;

        info!(peer = peer.peer_index(), samples = shard.len(); "shard loaded");
        Ok(Self { model, shard })
    }
}

/// Runs CPU bound model work over `loaded` on tokio's blocking pool.
///
/// A panic inside `f` is resumed on the calling task so it keeps its message.
pub(crate) async fn offload<T, F>(loaded: &Arc<Loaded>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Loaded) -> Result<T> + Send + 'static,
{
    let loaded = Arc::clone(loaded);

    match task::spawn_blocking(move || f(&loaded)).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => panic::resume_unwind(e.into_panic()),
        Err(e) => Err(io::Error::other(format!("compute join error: {e}")).into()),
    }
}

#[cfg(test)]
mod tests {
    use machine_learning::GraphCrf;

    use super::*;

    fn loaded() -> Arc<Loaded> {
        Arc::new(Loaded {
            model: Box::new(GraphCrf::new(2, 2, 1)),
            shard: ShardState::default(),
        })
    }

    #[tokio::test]
    async fn offloaded_work_returns_its_result() {
        let size = offload(&loaded(), |loaded| Ok(loaded.model.size_psi()))
            .await
            .unwrap();

        assert_eq!(size, 8);
    }

    #[tokio::test]
    async fn offloaded_panics_keep_their_message() {
        let loaded = loaded();
        let task = tokio::spawn(async move {
            offload(&loaded, |_| -> Result<()> { panic!("boom") }).await
        });

        let err = task.await.unwrap_err();
        assert!(err.is_panic());

        let payload = err.into_panic();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"boom"));
    }
}
