use std::sync::Arc;

use comms::{Peer, msg::{self, TestReport}};
use log::debug;
use machine_learning::ModelRegistry;
use ndarray::Array1;

use crate::{
    Result, WorkerErr,
    worker::{Loaded, Superstep, Worker, offload},
};

/// Worker strategy for inference runs, a single superstep labeling the whole shard
/// with the broadcast weights.
pub struct PredictWorker {
    coordinator: usize,
    models: Arc<ModelRegistry>,
    loaded: Option<Arc<Loaded>>,
}

impl PredictWorker {
    /// Creates a new `PredictWorker`.
    ///
    /// # Arguments
    /// * `coordinator` - Index of the peer the predictions are sent to.
    /// * `models` - Where the configured model is built from.
    ///
    /// # Returns
    /// A new `PredictWorker` instance.
    pub fn new(coordinator: usize, models: Arc<ModelRegistry>) -> Self {
        Self {
            coordinator,
            models,
            loaded: None,
        }
    }
}

#[async_trait::async_trait]
impl Worker for PredictWorker {
    fn kind(&self) -> &'static str {
        "predict"
    }

    fn is_ready(&self) -> bool {
        self.loaded.is_some()
    }

    async fn setup(&mut self, peer: &mut dyn Peer) -> Result<()> {
        self.loaded = Some(Arc::new(Loaded::load(peer, &self.models, false)?));
        Ok(())
    }

    async fn superstep(&mut self, peer: &mut dyn Peer) -> Result<Superstep> {
        let loaded = self.loaded.as_ref().ok_or(WorkerErr::NotReady)?;

        peer.sync().await?;

        let weights = peer
            .current_message()
            .filter(|msg| !msg.trim().is_empty())
            .ok_or(WorkerErr::MissingWeights)?;

        let w = Array1::from(msg::parse_weights(&weights)?);
        let report = offload(loaded, move |Loaded { model, shard }| {
            Ok(TestReport {
                predictions: model.batch_inference(&shard.xs, w.view())?,
                references: shard.references.clone(),
            })
        })
        .await?;

        let coordinator = peer.peer_name(self.coordinator)?;
        peer.send(&coordinator, report.to_string()).await?;
        debug!(peer = peer.peer_index(), samples = loaded.shard.len(); "predictions sent");

        peer.sync().await?;
        Ok(Superstep::Done)
    }
}
