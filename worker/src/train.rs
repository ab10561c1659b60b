use std::sync::Arc;

use comms::{Peer, msg::{self, TrainReport}};
use log::debug;
use machine_learning::ModelRegistry;
use ndarray::{Array1, ArrayView1};

use crate::{
    Result, WorkerErr,
    worker::{Loaded, Superstep, Worker, offload},
};

/// Worker strategy for training runs.
///
/// Every superstep it takes the weights the coordinator broadcast, runs loss
/// augmented inference over its shard and reports the feature joint differences
/// and losses back. An empty superstep ends the run.
pub struct TrainWorker {
    coordinator: usize,
    models: Arc<ModelRegistry>,
    loaded: Option<Arc<Loaded>>,
}

impl TrainWorker {
    /// Creates a new `TrainWorker`.
    ///
    /// # Arguments
    /// * `coordinator` - Index of the peer the reports are sent to.
    /// * `models` - Where the configured model is built from.
    ///
    /// # Returns
    /// A new `TrainWorker` instance.
    pub fn new(coordinator: usize, models: Arc<ModelRegistry>) -> Self {
        Self {
            coordinator,
            models,
            loaded: None,
        }
    }
}

/// Computes the report of a training superstep over the whole shard.
fn report(loaded: &Loaded, w: ArrayView1<'_, f64>) -> Result<TrainReport> {
    let Loaded { model, shard } = loaded;
    let joints = shard.joints.as_ref().ok_or(WorkerErr::NotReady)?;

    let y_hats = model.batch_loss_augmented_inference(&shard.xs, &shard.ys, w, false)?;

    let rescale = model.rescale_c();
    let dpsi = shard
        .xs
        .iter()
        .zip(&y_hats)
        .zip(&joints.per_sample)
        .map(|((x, y_hat), psi_gt)| {
            let psi_hat = model.psi(x, y_hat, rescale.then_some(y_hat.as_slice()))?;
            Ok(psi_gt - &psi_hat)
        })
        .collect::<Result<Vec<_>>>()?;

    let dpsi_sum = dpsi
        .iter()
        .fold(Array1::zeros(model.size_psi()), |acc, d| acc + d);

    let losses = model.batch_loss(&shard.ys, &y_hats)?;
    let loss_sum = losses.iter().fold(0.0, |acc, loss| acc + loss);

    Ok(TrainReport {
        predictions: y_hats,
        dpsi: dpsi.iter().map(|d| d.to_vec()).collect(),
        dpsi_sum: dpsi_sum.to_vec(),
        losses,
        loss_sum,
    })
}

#[async_trait::async_trait]
impl Worker for TrainWorker {
    fn kind(&self) -> &'static str {
        "train"
    }

    fn is_ready(&self) -> bool {
        self.loaded.is_some()
    }

    async fn setup(&mut self, peer: &mut dyn Peer) -> Result<()> {
        self.loaded = Some(Arc::new(Loaded::load(peer, &self.models, true)?));
        Ok(())
    }

    async fn superstep(&mut self, peer: &mut dyn Peer) -> Result<Superstep> {
        let loaded = self.loaded.as_ref().ok_or(WorkerErr::NotReady)?;

        peer.sync().await?;

        let Some(weights) = peer.current_message().filter(|msg| !msg.trim().is_empty()) else {
            debug!(peer = peer.peer_index(); "no weights received, stopping");
            return Ok(Superstep::Done);
        };

        let w = Array1::from(msg::parse_weights(&weights)?);
        let report = offload(loaded, move |loaded| report(loaded, w.view())).await?;

        for (id, loss) in loaded.shard.ids.iter().zip(&report.losses) {
            debug!(peer = peer.peer_index(), id = *id, loss = *loss; "sample loss");
        }

        let coordinator = peer.peer_name(self.coordinator)?;
        peer.send(&coordinator, report.to_string()).await?;
        debug!(peer = peer.peer_index(), loss = report.loss_sum; "report sent");

        peer.sync().await?;
        Ok(Superstep::Continue)
    }
}
