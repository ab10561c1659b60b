use comms::Peer;
use log::debug;
use machine_learning::{Graph, Labels, StructuredModel};
use ndarray::Array1;

use super::{Sample, parse_record};
use crate::Result;

/// The ground truth joint feature vectors of a shard.
#[derive(Debug, Clone, PartialEq)]
pub struct Joints {
    pub per_sample: Vec<Array1<f64>>,
    pub sum: Array1<f64>,
}

/// Everything a worker loaded from its input, read-only once built.
///
/// The per sample vectors are index aligned and keep the input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShardState {
    pub ids: Vec<f64>,
    pub xs: Vec<Graph>,
    pub ys: Vec<Labels>,
    pub references: Vec<Vec<f64>>,
    /// Only computed for training.
    pub joints: Option<Joints>,
}

impl ShardState {
    /// Reads every input record of `peer` into a new `ShardState`.
    ///
    /// # Arguments
    /// * `peer` - The peer whose input is drained.
    /// * `model` - The model used to compute the ground truth joints.
    /// * `with_joints` - Whether to compute the ground truth joints.
    ///
    /// # Returns
    /// The loaded shard or the first record or model error found.
    pub fn load(
        peer: &mut dyn Peer,
        model: &dyn StructuredModel,
        with_joints: bool,
    ) -> Result<Self> {
        let mut shard = Self::default();

        while let Some(record) = peer.read_next()? {
            let Sample {
                id,
                x,
                y,
                reference,
            } = parse_record(&record)?;

            debug!(peer = peer.peer_index(), key = record.key.as_str(), id = id, nodes = x.n_nodes(); "loaded record");
            shard.ids.push(id);
            shard.xs.push(x);
            shard.ys.push(y);
            shard.references.push(reference);
        }

        if with_joints {
            shard.joints = Some(shard.ground_truth_joints(model)?);
        }

        Ok(shard)
    }

    fn ground_truth_joints(&self, model: &dyn StructuredModel) -> Result<Joints> {
        let rescale = model.rescale_c();
        let per_sample = self
            .xs
            .iter()
            .zip(&self.ys)
            .map(|(x, y)| model.psi(x, y, rescale.then_some(y.as_slice())))
            .collect::<machine_learning::Result<Vec<_>>>()?;

        let sum = per_sample
            .iter()
            .fold(Array1::zeros(model.size_psi()), |acc, psi| acc + psi);

        Ok(Joints { per_sample, sum })
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use comms::{Config, Record, cluster};
    use machine_learning::GraphCrf;
    use ndarray::array;

    use super::*;

    fn records() -> Vec<Record> {
        vec![
            Record::new("a", "1 1 1 0,1 2 0 1;1 1 2 1;1 1 1 5,1 2 2 6"),
            Record::new("b", "2 1 0 1,2 2 0 1;2 1 2 0;2 1 2 7,2 2 2 8"),
        ]
    }

    #[test]
    fn loads_records_in_input_order() {
        let (_cluster, mut peers) = cluster(Config::default(), vec![records()]);
        let model = GraphCrf::new(2, 2, 1);

        let shard = ShardState::load(&mut peers[0], &model, false).unwrap();

        assert_eq!(shard.len(), 2);
        assert_eq!(shard.ids, vec![1.0, 2.0]);
        assert_eq!(shard.ys, vec![vec![0, 1], vec![1, 1]]);
        assert_eq!(shard.references[1], vec![2.0, 7.0, 2.0, 8.0]);
        assert!(shard.joints.is_none());
    }

    #[test]
    fn training_shards_sum_the_ground_truth_joints() {
        let (_cluster, mut peers) = cluster(Config::default(), vec![records()]);
        let model = GraphCrf::new(2, 2, 1);

        let shard = ShardState::load(&mut peers[0], &model, true).unwrap();
        let joints = shard.joints.unwrap();

        assert_eq!(joints.per_sample.len(), 2);
        assert_eq!(joints.sum, &joints.per_sample[0] + &joints.per_sample[1]);
        // unary block of the first sample: node 0 in state 0, node 1 in state 1
        assert_eq!(
            joints.per_sample[0],
            array![1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0]
        );
    }

    #[test]
    fn an_empty_input_is_an_empty_shard() {
        let (_cluster, mut peers) = cluster(Config::default(), vec![Vec::new()]);
        let model = GraphCrf::new(2, 2, 1);

        let shard = ShardState::load(&mut peers[0], &model, true).unwrap();

        assert!(shard.is_empty());
        assert_eq!(shard.joints.unwrap().sum, Array1::<f64>::zeros(8));
    }
}
