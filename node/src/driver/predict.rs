use comms::{
    Peer,
    config::keys,
    msg::{TestReport, encode_weights, parse_weights},
};
use log::info;

use super::{Driver, drain, worker_names};
use crate::Result;

/// Encodes a labeling the way the input spells labels, 1-based.
fn encode_labels(labels: &[usize]) -> String {
    labels
        .iter()
        .map(|label| (label + 1).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Labels every worker's shard with the configured weights in a single round.
///
/// Every sample is written as a `sample-<n>` output record holding its predicted
/// labels and its reference values.
#[derive(Debug, Default)]
pub struct PredictDriver;

#[async_trait::async_trait]
impl Driver for PredictDriver {
    async fn run(&mut self, peer: &mut dyn Peer) -> Result<()> {
        let weights = encode_weights(&parse_weights(
            peer.config().get_str(keys::DRIVER_WEIGHTS)?,
        )?);

        let workers = worker_names(peer)?;
        for worker in &workers {
            peer.send(worker, weights.clone()).await?;
        }

        peer.sync().await?;
        peer.sync().await?;

        let reports: Vec<TestReport> = drain(peer)?;
        let samples = reports
            .iter()
            .flat_map(|report| report.predictions.iter().zip(&report.references));

        let mut written = 0usize;
        for (predictions, reference) in samples {
            let value = format!("{};{}", encode_labels(predictions), encode_weights(reference));
            peer.write(&format!("sample-{written}"), &value)?;
            written += 1;
        }

        info!(peer = peer.peer_index(), reports = reports.len(), samples = written; "predictions written");
        Ok(())
    }
}
