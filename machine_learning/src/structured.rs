use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;

use crate::{MlErr, Result};

/// A labeling, one class index per node.
pub type Labels = Vec<usize>;

/// A graph structured input.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    /// One row of features per node.
    pub nodes: Array2<f64>,
    /// One `(from, to)` row per edge, 0-based node indices.
    pub edges: Array2<usize>,
    /// One row of features per edge.
    pub edge_features: Array2<f64>,
}

impl Graph {
    pub fn n_nodes(&self) -> usize {
        self.nodes.nrows()
    }

    pub fn n_edges(&self) -> usize {
        self.edges.nrows()
    }
}

fn check_batch(a: &'static str, b: &'static str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(MlErr::SizeMismatch {
            a,
            b,
            got,
            expected,
        });
    }

    Ok(())
}

/// A structured output prediction model.
///
/// The batched methods default to the per sample ones run in parallel, the output
/// keeps the order of the input.
pub trait StructuredModel: Send + Sync {
    /// The length of the joint feature vector, and so of the weight vector.
    fn size_psi(&self) -> usize;

    /// Whether `psi` takes a labeling a second time as rescaling reference.
    fn rescale_c(&self) -> bool {
        false
    }

    /// Joint feature mapping of `x` labeled as `y`.
    ///
    /// # Arguments
    /// * `x` - The input.
    /// * `y` - The labeling.
    /// * `rescale` - The rescaling reference, only given when `rescale_c` is set.
    fn psi(&self, x: &Graph, y: &[usize], rescale: Option<&[usize]>) -> Result<Array1<f64>>;

    /// Loss of predicting `y_hat` when the truth is `y`.
    fn loss(&self, y: &[usize], y_hat: &[usize]) -> Result<f64>;

    /// The highest scoring labeling of `x` under `w`.
    fn inference(&self, x: &Graph, w: ArrayView1<'_, f64>) -> Result<Labels>;

    /// The labeling of `x` maximizing its score under `w` plus its loss against `y`.
    fn loss_augmented_inference(
        &self,
        x: &Graph,
        y: &[usize],
        w: ArrayView1<'_, f64>,
        relaxed: bool,
    ) -> Result<Labels>;

    /// Sum of the joint feature vectors of every sample.
    fn batch_psi(
        &self,
        xs: &[Graph],
        ys: &[Labels],
        rescale: Option<&[Labels]>,
    ) -> Result<Array1<f64>> {
        check_batch("inputs", "labelings", ys.len(), xs.len())?;
        if let Some(rescale) = rescale {
            check_batch("inputs", "rescale references", rescale.len(), xs.len())?;
        }

        let psis = xs
            .par_iter()
            .zip(ys)
            .enumerate()
            .map(|(i, (x, y))| self.psi(x, y, rescale.map(|r| r[i].as_slice())))
            .collect::<Result<Vec<_>>>()?;

        let sum = psis
            .into_iter()
            .fold(Array1::zeros(self.size_psi()), |acc, psi| acc + psi);

        Ok(sum)
    }

    fn batch_loss(&self, ys: &[Labels], y_hats: &[Labels]) -> Result<Vec<f64>> {
        check_batch("labelings", "predictions", y_hats.len(), ys.len())?;

        ys.par_iter()
            .zip(y_hats)
            .map(|(y, y_hat)| self.loss(y, y_hat))
            .collect()
    }

    fn batch_inference(&self, xs: &[Graph], w: ArrayView1<'_, f64>) -> Result<Vec<Labels>> {
        xs.par_iter().map(|x| self.inference(x, w)).collect()
    }

    fn batch_loss_augmented_inference(
        &self,
        xs: &[Graph],
        ys: &[Labels],
        w: ArrayView1<'_, f64>,
        relaxed: bool,
    ) -> Result<Vec<Labels>> {
        check_batch("inputs", "labelings", ys.len(), xs.len())?;

        xs.par_iter()
            .zip(ys)
            .map(|(x, y)| self.loss_augmented_inference(x, y, w, relaxed))
            .collect()
    }
}
