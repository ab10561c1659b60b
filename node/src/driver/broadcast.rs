use std::fmt;

use comms::{
    Peer,
    config::keys,
    msg::{TrainReport, encode_weights, parse_weights},
};
use log::info;

use super::{Driver, drain, worker_names};
use crate::Result;

/// The reports of a training round aggregated over every worker.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
    pub round: usize,
    pub reports: Vec<TrainReport>,
    /// Sum of every worker's loss.
    pub loss: f64,
    /// Elementwise sum of every worker's feature joint difference.
    pub dpsi_sum: Vec<f64>,
}

impl RoundSummary {
    /// Aggregates the reports of a round.
    ///
    /// # Arguments
    /// * `round` - The round's index.
    /// * `reports` - What the workers sent during the round.
    ///
    /// # Returns
    /// A new `RoundSummary` instance.
    pub fn new(round: usize, reports: Vec<TrainReport>) -> Self {
        let loss = reports.iter().fold(0.0, |acc, report| acc + report.loss_sum);

        let mut dpsi_sum: Vec<f64> = Vec::new();
        for report in &reports {
            if dpsi_sum.len() < report.dpsi_sum.len() {
                dpsi_sum.resize(report.dpsi_sum.len(), 0.0);
            }

            for (sum, value) in dpsi_sum.iter_mut().zip(&report.dpsi_sum) {
                *sum += value;
            }
        }

        Self {
            round,
            reports,
            loss,
            dpsi_sum,
        }
    }

    pub fn samples(&self) -> usize {
        self.reports.iter().map(|report| report.losses.len()).sum()
    }
}

impl fmt::Display for RoundSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}", self.loss, encode_weights(&self.dpsi_sum))
    }
}

/// Runs a fixed amount of training rounds with the configured weights, then ends
/// the run with an empty round.
///
/// Every round is written as a `round-<n>` output record holding the total loss and
/// the summed feature joint difference.
#[derive(Debug, Default)]
pub struct BroadcastDriver;

#[async_trait::async_trait]
impl Driver for BroadcastDriver {
    async fn run(&mut self, peer: &mut dyn Peer) -> Result<()> {
        let (weights, rounds) = {
            let config = peer.config();
            let weights = parse_weights(config.get_str(keys::DRIVER_WEIGHTS)?)?;
            (encode_weights(&weights), config.get_or(keys::DRIVER_ROUNDS, 1usize)?)
        };

        let workers = worker_names(peer)?;
        info!(peer = peer.peer_index(), workers = workers.len(), rounds = rounds; "starting training");

        for round in 0..rounds {
            for worker in &workers {
                peer.send(worker, weights.clone()).await?;
            }

            peer.sync().await?;
            peer.sync().await?;

            let summary = RoundSummary::new(round, drain(peer)?);
            info!(
                round = round,
                reports = summary.reports.len(),
                samples = summary.samples(),
                loss = summary.loss;
                "round finished"
            );

            peer.write(&format!("round-{round}"), &summary.to_string())?;
        }

        // nothing sent, the workers stop
        peer.sync().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(dpsi_sum: Vec<f64>, losses: Vec<f64>) -> TrainReport {
        TrainReport {
            predictions: vec![vec![0]; losses.len()],
            dpsi: vec![dpsi_sum.clone(); losses.len()],
            dpsi_sum,
            loss_sum: losses.iter().sum(),
            losses,
        }
    }

    #[test]
    fn summaries_add_up_the_reports() {
        let reports = vec![
            report(vec![1.0, -2.0], vec![1.0, 2.0]),
            report(vec![0.5, 0.5], vec![3.0]),
        ];

        let summary = RoundSummary::new(4, reports);

        assert_eq!(summary.loss, 6.0);
        assert_eq!(summary.dpsi_sum, vec![1.5, -1.5]);
        assert_eq!(summary.samples(), 3);
        assert_eq!(summary.to_string(), "6;1.5 -1.5");
    }

    #[test]
    fn empty_rounds_summarize_to_zero() {
        let summary = RoundSummary::new(0, Vec::new());

        assert_eq!(summary.loss, 0.0);
        assert!(summary.dpsi_sum.is_empty());
        assert_eq!(summary.to_string(), "0;");
    }
}
