use ndarray::{Array1, Array2, Array3, ArrayView1, s};

use crate::{
    Graph, Labels, MlErr, Result, StructuredModel,
    inference::{inference_icm, inference_unaries},
};

/// How a `GraphCrf` maximizes its score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceMethod {
    /// Per node argmax of the unary potentials.
    Unary,
    /// Iterated conditional modes over unary and pairwise potentials.
    Icm { max_iter: usize },
}

/// Pairwise conditional random field over general graphs with edge features.
///
/// The weight vector is laid out as a `(n_states, n_features)` unary block followed by
/// one `(n_states, n_states)` pairwise block per edge feature.
#[derive(Debug, Clone)]
pub struct GraphCrf {
    n_states: usize,
    n_features: usize,
    n_edge_features: usize,
    class_weight: Array1<f64>,
    method: InferenceMethod,
}

impl GraphCrf {
    /// Creates a new `GraphCrf` with unit class weights and unary inference.
    ///
    /// # Arguments
    /// * `n_states` - The amount of classes a node can take.
    /// * `n_features` - The width of a node's feature row.
    /// * `n_edge_features` - The width of an edge's feature row.
    ///
    /// # Returns
    /// A new `GraphCrf` instance.
    pub fn new(n_states: usize, n_features: usize, n_edge_features: usize) -> Self {
        Self {
            n_states,
            n_features,
            n_edge_features,
            class_weight: Array1::ones(n_states),
            method: InferenceMethod::Unary,
        }
    }

    /// Replaces the per class loss weights.
    ///
    /// # Returns
    /// The model or a `SizeMismatch` if there isn't one weight per state.
    pub fn with_class_weight(mut self, class_weight: Vec<f64>) -> Result<Self> {
        if class_weight.len() != self.n_states {
            return Err(MlErr::SizeMismatch {
                a: "class weights",
                b: "states",
                got: class_weight.len(),
                expected: self.n_states,
            });
        }

        self.class_weight = Array1::from(class_weight);
        Ok(self)
    }

    pub fn with_inference(mut self, method: InferenceMethod) -> Self {
        self.method = method;
        self
    }

    pub fn n_states(&self) -> usize {
        self.n_states
    }

    fn unary_size(&self) -> usize {
        self.n_states * self.n_features
    }

    fn pairwise_offset(&self, k: usize, from: usize, to: usize) -> usize {
        self.unary_size() + (k * self.n_states + from) * self.n_states + to
    }

    fn check_x(&self, x: &Graph) -> Result<()> {
        let checks = [
            ("node features", "model features", x.nodes.ncols(), self.n_features),
            ("edge columns", "edge endpoints", x.edges.ncols(), 2),
            ("edge features", "model edge features", x.edge_features.ncols(), self.n_edge_features),
            ("edge feature rows", "edges", x.edge_features.nrows(), x.n_edges()),
        ];

        for (a, b, got, expected) in checks {
            if got != expected {
                return Err(MlErr::SizeMismatch { a, b, got, expected });
            }
        }

        let n_nodes = x.n_nodes();
        match x.edges.iter().find(|&&node| node >= n_nodes) {
            Some(&node) => Err(MlErr::EdgeOutOfRange { node, n_nodes }),
            None => Ok(()),
        }
    }

    fn check_labels(&self, n_nodes: usize, y: &[usize]) -> Result<()> {
        if y.len() != n_nodes {
            return Err(MlErr::SizeMismatch {
                a: "labels",
                b: "nodes",
                got: y.len(),
                expected: n_nodes,
            });
        }

        match y.iter().find(|&&label| label >= self.n_states) {
            Some(&label) => Err(MlErr::LabelOutOfRange {
                label,
                n_states: self.n_states,
            }),
            None => Ok(()),
        }
    }

    fn check_w(&self, w: ArrayView1<'_, f64>) -> Result<()> {
        if w.len() != self.size_psi() {
            return Err(MlErr::SizeMismatch {
                a: "weights",
                b: "joint features",
                got: w.len(),
                expected: self.size_psi(),
            });
        }

        Ok(())
    }

    fn unary_potentials(&self, x: &Graph, w: ArrayView1<'_, f64>) -> Array2<f64> {
        let nf = self.n_features;
        let weights = Array2::from_shape_fn((self.n_states, nf), |(s, f)| w[s * nf + f]);
        x.nodes.dot(&weights.t())
    }

    fn pairwise_potentials(&self, x: &Graph, w: ArrayView1<'_, f64>) -> Array3<f64> {
        let ns = self.n_states;
        let mut potentials = Array3::zeros((x.n_edges(), ns, ns));

        for (e, features) in x.edge_features.rows().into_iter().enumerate() {
            for (k, &feature) in features.iter().enumerate() {
                for from in 0..ns {
                    for to in 0..ns {
                        potentials[[e, from, to]] += feature * w[self.pairwise_offset(k, from, to)];
                    }
                }
            }
        }

        potentials
    }

    fn maximize(&self, x: &Graph, unary: Array2<f64>, w: ArrayView1<'_, f64>) -> Labels {
        match self.method {
            InferenceMethod::Unary => inference_unaries(&unary),
            InferenceMethod::Icm { max_iter } => {
                let pairwise = self.pairwise_potentials(x, w);
                inference_icm(&unary, &pairwise, &x.edges, max_iter)
            }
        }
    }
}

impl StructuredModel for GraphCrf {
    fn size_psi(&self) -> usize {
        self.unary_size() + self.n_edge_features * self.n_states * self.n_states
    }

    fn psi(&self, x: &Graph, y: &[usize], _rescale: Option<&[usize]>) -> Result<Array1<f64>> {
        self.check_x(x)?;
        self.check_labels(x.n_nodes(), y)?;

        let nf = self.n_features;
        let mut psi = Array1::zeros(self.size_psi());

        for (node, &label) in x.nodes.rows().into_iter().zip(y) {
            psi.slice_mut(s![label * nf..(label + 1) * nf])
                .scaled_add(1.0, &node);
        }

        for (edge, features) in x.edges.rows().into_iter().zip(x.edge_features.rows()) {
            let (from, to) = (y[edge[0]], y[edge[1]]);
            for (k, &feature) in features.iter().enumerate() {
                psi[self.pairwise_offset(k, from, to)] += feature;
            }
        }

        Ok(psi)
    }

    fn loss(&self, y: &[usize], y_hat: &[usize]) -> Result<f64> {
        self.check_labels(y.len(), y)?;
        self.check_labels(y.len(), y_hat)?;

        let loss = y
            .iter()
            .zip(y_hat)
            .filter(|(truth, pred)| truth != pred)
            .map(|(&truth, _)| self.class_weight[truth])
            .sum();

        Ok(loss)
    }

    fn inference(&self, x: &Graph, w: ArrayView1<'_, f64>) -> Result<Labels> {
        self.check_x(x)?;
        self.check_w(w)?;

        let unary = self.unary_potentials(x, w);
        Ok(self.maximize(x, unary, w))
    }

    fn loss_augmented_inference(
        &self,
        x: &Graph,
        y: &[usize],
        w: ArrayView1<'_, f64>,
        relaxed: bool,
    ) -> Result<Labels> {
        if relaxed {
            return Err(MlErr::Unsupported("relaxed inference"));
        }

        self.check_x(x)?;
        self.check_w(w)?;
        self.check_labels(x.n_nodes(), y)?;

        let mut unary = self.unary_potentials(x, w);
        for (mut row, &truth) in unary.rows_mut().into_iter().zip(y) {
            let penalty = self.class_weight[truth];
            for (state, potential) in row.iter_mut().enumerate() {
                if state != truth {
                    *potential += penalty;
                }
            }
        }

        Ok(self.maximize(x, unary, w))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, array};

    use super::*;

    fn graph() -> Graph {
        Graph {
            nodes: array![[1.0, 0.0], [0.0, 2.0], [1.0, 1.0]],
            edges: array![[0usize, 1], [1, 2]],
            edge_features: array![[1.0], [0.5]],
        }
    }

    #[test]
    fn psi_layout() {
        let model = GraphCrf::new(2, 2, 1);
        assert_eq!(model.size_psi(), 2 * 2 + 2 * 2);

        let psi = model.psi(&graph(), &[0, 1, 1], None).unwrap();
        // unary: state 0 gets node 0, state 1 gets nodes 1 and 2.
        // pairwise: edge 0 is (0 -> 1) with 1.0, edge 1 is (1 -> 1) with 0.5.
        assert_eq!(psi, array![1.0, 0.0, 1.0, 3.0, 0.0, 1.0, 0.0, 0.5]);
    }

    #[test]
    fn batch_psi_sums_the_samples() {
        let model = GraphCrf::new(2, 2, 1);
        let xs = vec![graph(), graph()];
        let ys = vec![vec![0, 1, 1], vec![1, 1, 1]];

        let sum = model.batch_psi(&xs, &ys, None).unwrap();
        let expected = model.psi(&xs[0], &ys[0], None).unwrap()
            + model.psi(&xs[1], &ys[1], None).unwrap();

        assert_eq!(sum, expected);
    }

    #[test]
    fn inference_and_loss() {
        let model = GraphCrf::new(2, 2, 1);
        // state 0 scores feature 0, state 1 scores feature 1.
        let w = array![1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];

        let y_hat = model.inference(&graph(), w.view()).unwrap();
        assert_eq!(y_hat, vec![0, 1, 0]);

        assert_eq!(model.loss(&[0, 1, 1], &y_hat).unwrap(), 1.0);
        assert_eq!(model.loss(&y_hat, &y_hat).unwrap(), 0.0);
    }

    #[test]
    fn loss_augmentation_favours_wrong_labels() {
        let model = GraphCrf::new(2, 2, 1)
            .with_class_weight(vec![5.0, 5.0])
            .unwrap();
        let w = array![1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];

        let y = [0, 1, 0];
        let y_hat = model
            .loss_augmented_inference(&graph(), &y, w.view(), false)
            .unwrap();

        assert_eq!(y_hat, vec![1, 0, 1]);
        assert_eq!(model.loss(&y, &y_hat).unwrap(), 15.0);
    }

    #[test]
    fn invalid_inputs_are_reported() {
        let model = GraphCrf::new(2, 2, 1);
        let w = Array1::zeros(3);

        assert!(matches!(
            model.inference(&graph(), w.view()),
            Err(MlErr::SizeMismatch { a: "weights", .. })
        ));

        assert!(matches!(
            model.psi(&graph(), &[0, 2, 1], None),
            Err(MlErr::LabelOutOfRange { label: 2, .. })
        ));

        let mut x = graph();
        x.edges = array![[0usize, 3], [1, 2]];
        assert!(matches!(
            model.psi(&x, &[0, 1, 1], None),
            Err(MlErr::EdgeOutOfRange { node: 3, .. })
        ));

        let w = Array1::zeros(model.size_psi());
        assert!(matches!(
            model.loss_augmented_inference(&graph(), &[0, 0, 0], w.view(), true),
            Err(MlErr::Unsupported(_))
        ));

        let x = Graph {
            edges: Array2::zeros((0, 2)),
            edge_features: Array2::zeros((0, 1)),
            ..graph()
        };
        assert_eq!(model.inference(&x, w.view()).unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn icm_uses_the_pairwise_block() {
        let model = GraphCrf::new(2, 2, 1).with_inference(InferenceMethod::Icm { max_iter: 10 });
        let x = Graph {
            nodes: array![[1.0, 0.0], [0.0, 1.0]],
            edges: array![[0usize, 1]],
            edge_features: array![[1.0]],
        };
        // node 0 strongly prefers state 1, node 1 mildly prefers state 0 and the edge
        // rewards both ends being 1.
        let w = array![0.0, 0.5, 2.0, 0.0, 0.0, 0.0, 0.0, 4.0];

        let unary = GraphCrf::new(2, 2, 1);
        assert_eq!(unary.inference(&x, w.view()).unwrap(), vec![1, 0]);
        assert_eq!(model.inference(&x, w.view()).unwrap(), vec![1, 1]);
    }
}
