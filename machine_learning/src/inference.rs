//! Maximization routines over unary and pairwise potentials.
//!
//! `unary` has shape `(n_nodes, n_states)`, `pairwise` has shape
//! `(n_edges, n_states, n_states)` and `edges` holds one `(from, to)` row per edge.

use log::debug;
use ndarray::{Array2, Array3, ArrayView1};

use crate::Labels;

fn argmax(scores: ArrayView1<'_, f64>) -> usize {
    let mut best = 0;
    for (s, &score) in scores.iter().enumerate() {
        if score > scores[best] {
            best = s;
        }
    }

    best
}

/// Score of `labels` under the given potentials.
pub fn compute_energy(
    unary: &Array2<f64>,
    pairwise: &Array3<f64>,
    edges: &Array2<usize>,
    labels: &[usize],
) -> f64 {
    let unary_energy: f64 = labels
        .iter()
        .enumerate()
        .map(|(i, &s)| unary[[i, s]])
        .sum();

    let pairwise_energy: f64 = edges
        .rows()
        .into_iter()
        .enumerate()
        .map(|(e, edge)| pairwise[[e, labels[edge[0]], labels[edge[1]]]])
        .sum();

    unary_energy + pairwise_energy
}

/// Picks the best state of every node ignoring the pairwise potentials.
pub fn inference_unaries(unary: &Array2<f64>) -> Labels {
    unary.rows().into_iter().map(argmax).collect()
}

/// Iterated conditional modes.
///
/// Starts from the unary solution and greedily relabels one node at a time given its
/// neighbours, until a full sweep changes nothing or `max_iter` sweeps ran.
pub fn inference_icm(
    unary: &Array2<f64>,
    pairwise: &Array3<f64>,
    edges: &Array2<usize>,
    max_iter: usize,
) -> Labels {
    let (n_nodes, n_states) = unary.dim();
    let mut labels = inference_unaries(unary);

    // (edge, neighbour, whether the node is the edge's source)
    let mut incident = vec![Vec::new(); n_nodes];
    for (e, edge) in edges.rows().into_iter().enumerate() {
        incident[edge[0]].push((e, edge[1], true));
        incident[edge[1]].push((e, edge[0], false));
    }

    for sweep in 0..max_iter {
        let mut changed = false;

        for node in 0..n_nodes {
            let mut scores = unary.row(node).to_owned();
            for &(e, other, is_source) in &incident[node] {
                let theirs = labels[other];
                for s in 0..n_states {
                    scores[s] += if is_source {
                        pairwise[[e, s, theirs]]
                    } else {
                        pairwise[[e, theirs, s]]
                    };
                }
            }

            let best = argmax(scores.view());
            if best != labels[node] {
                labels[node] = best;
                changed = true;
            }
        }

        if !changed {
            debug!(
                sweep = sweep,
                nodes = n_nodes,
                energy = compute_energy(unary, pairwise, edges, &labels);
                "icm converged"
            );
            break;
        }
    }

    labels
}

#[cfg(test)]
mod tests {
    use ndarray::{Array3, array};

    use super::*;

    #[test]
    fn unaries_pick_the_row_maximum() {
        let unary = array![[0.1, 0.9], [2.0, -1.0], [0.5, 0.5]];
        assert_eq!(inference_unaries(&unary), vec![1, 0, 0]);
    }

    #[test]
    fn icm_follows_strong_pairwise_agreement() {
        // node 1 slightly prefers state 1, but the edge rewards agreeing with node 0.
        let unary = array![[5.0, 0.0], [0.0, 0.1]];
        let edges = array![[0usize, 1]];
        let mut pairwise = Array3::zeros((1, 2, 2));
        pairwise[[0, 0, 0]] = 1.0;
        pairwise[[0, 1, 1]] = 1.0;

        assert_eq!(inference_unaries(&unary), vec![0, 1]);

        let labels = inference_icm(&unary, &pairwise, &edges, 10);
        assert_eq!(labels, vec![0, 0]);

        let icm = compute_energy(&unary, &pairwise, &edges, &labels);
        let greedy = compute_energy(&unary, &pairwise, &edges, &[0, 1]);
        assert!(icm > greedy);
    }

    #[test]
    fn icm_without_sweeps_is_the_unary_solution() {
        let unary = array![[0.0, 1.0], [1.0, 0.0]];
        let edges = array![[0usize, 1]];
        let pairwise = Array3::from_elem((1, 2, 2), 3.0);

        assert_eq!(inference_icm(&unary, &pairwise, &edges, 0), vec![1, 0]);
    }
}
