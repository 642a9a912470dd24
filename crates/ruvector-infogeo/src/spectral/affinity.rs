//! Affinity matrices and graph Laplacians

use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};

use crate::error::{InfoGeoError, Result};
use crate::graph::InformationGraph;
use crate::types::NodeKey;
use crate::utils::{argsort, EPS};

/// Iteration budget handed to the symmetric eigensolver
pub const EIGEN_MAX_ITER: usize = 10_000;

/// Dense Gaussian affinity over graph nodes
#[derive(Debug, Clone)]
pub struct AffinityMatrix {
    nodes: Vec<NodeKey>,
    matrix: DMatrix<f64>,
    sigma: f64,
}

impl AffinityMatrix {
    /// `A_uv = exp(-d_uv² / σ)` on graph edges, zero elsewhere
    pub fn from_graph(graph: &InformationGraph, sigma: f64) -> Result<Self> {
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(InfoGeoError::invalid_parameter(
                "affinity_sigma",
                format!("must be finite and positive, got {}", sigma),
            ));
        }
        let n = graph.node_count();
        if n == 0 {
            return Err(InfoGeoError::empty_input("information graph"));
        }

        let mut matrix = DMatrix::zeros(n, n);
        for edge in graph.edges() {
            let w = (-edge.distance * edge.distance / sigma).exp();
            // Spatial and temporal edges between the same pair accumulate
            matrix[(edge.source, edge.target)] += w;
            matrix[(edge.target, edge.source)] += w;
        }

        Ok(Self {
            nodes: graph.nodes().to_vec(),
            matrix,
            sigma,
        })
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the matrix has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node keys in row order
    pub fn nodes(&self) -> &[NodeKey] {
        &self.nodes
    }

    /// Affinity scale σ
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Entry (i, j)
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.matrix[(i, j)]
    }

    /// Dense matrix
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Row sums
    pub fn degrees(&self) -> Vec<f64> {
        self.matrix.row_iter().map(|row| row.sum()).collect()
    }
}

/// Laplacian normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaplacianNorm {
    /// L = D - A
    Unnormalized,
    /// L = I - D^(-1/2) A D^(-1/2)
    Symmetric,
    /// L = I - D^(-1) A
    #[default]
    RandomWalk,
}

/// Eigenpairs in ascending eigenvalue order
#[derive(Debug, Clone)]
pub struct Spectrum {
    /// Eigenvalues, ascending
    pub values: Vec<f64>,
    /// Eigenvectors as columns, aligned with `values`
    pub vectors: DMatrix<f64>,
}

/// Graph Laplacian of an affinity matrix
#[derive(Debug, Clone)]
pub struct Laplacian {
    nodes: Vec<NodeKey>,
    norm: LaplacianNorm,
    matrix: DMatrix<f64>,
    /// Symmetric matrix with the same spectrum, used for eigendecomposition
    symmetric: DMatrix<f64>,
    degrees: Vec<f64>,
}

impl Laplacian {
    /// Build a Laplacian with the given normalization
    ///
    /// Rows of zero-degree nodes are left at zero for the normalized forms,
    /// so an isolated node is its own zero-eigenvalue component.
    pub fn new(affinity: &AffinityMatrix, norm: LaplacianNorm) -> Self {
        let a = affinity.matrix();
        let n = affinity.len();
        let degrees = affinity.degrees();

        let inv_sqrt: Vec<f64> = degrees
            .iter()
            .map(|&d| if d > EPS { 1.0 / d.sqrt() } else { 0.0 })
            .collect();

        let unnormalized = DMatrix::from_fn(n, n, |i, j| {
            if i == j {
                degrees[i] - a[(i, j)]
            } else {
                -a[(i, j)]
            }
        });
        let sym = DMatrix::from_fn(n, n, |i, j| {
            if degrees[i] <= EPS || degrees[j] <= EPS {
                0.0
            } else if i == j {
                1.0 - a[(i, j)] * inv_sqrt[i] * inv_sqrt[j]
            } else {
                -a[(i, j)] * inv_sqrt[i] * inv_sqrt[j]
            }
        });

        let (matrix, symmetric) = match norm {
            LaplacianNorm::Unnormalized => (unnormalized.clone(), unnormalized),
            LaplacianNorm::Symmetric => (sym.clone(), sym),
            LaplacianNorm::RandomWalk => {
                let rw = DMatrix::from_fn(n, n, |i, j| {
                    if degrees[i] <= EPS {
                        0.0
                    } else if i == j {
                        1.0 - a[(i, j)] / degrees[i]
                    } else {
                        -a[(i, j)] / degrees[i]
                    }
                });
                (rw, sym)
            }
        };

        Self {
            nodes: affinity.nodes().to_vec(),
            norm,
            matrix,
            symmetric,
            degrees,
        }
    }

    /// Random-walk Laplacian `I - D⁻¹A`
    pub fn random_walk(affinity: &AffinityMatrix) -> Self {
        Self::new(affinity, LaplacianNorm::RandomWalk)
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the Laplacian has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node keys in row order
    pub fn nodes(&self) -> &[NodeKey] {
        &self.nodes
    }

    /// Normalization in use
    pub fn norm(&self) -> LaplacianNorm {
        self.norm
    }

    /// Dense Laplacian
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Affinity degrees
    pub fn degrees(&self) -> &[f64] {
        &self.degrees
    }

    /// Eigendecomposition with a symmetric solver
    ///
    /// The random-walk form is not symmetric; its eigenpairs come from the
    /// symmetric form with `v_rw = D^(-1/2) v_sym`.
    pub fn spectrum(&self) -> Result<Spectrum> {
        let n = self.len();
        let eigen = SymmetricEigen::try_new(self.symmetric.clone(), f64::EPSILON, EIGEN_MAX_ITER)
            .ok_or_else(|| InfoGeoError::convergence_failure("eigensolver", EIGEN_MAX_ITER, f64::NAN))?;

        let raw: Vec<f64> = eigen.eigenvalues.iter().copied().collect();
        let order = argsort(&raw);

        let mut vectors = DMatrix::zeros(n, n);
        for (col, &src) in order.iter().enumerate() {
            let mut v = eigen.eigenvectors.column(src).clone_owned();
            if self.norm == LaplacianNorm::RandomWalk {
                for (i, x) in v.iter_mut().enumerate() {
                    if self.degrees[i] > EPS {
                        *x /= self.degrees[i].sqrt();
                    }
                }
                let norm = v.norm();
                if norm > EPS {
                    v /= norm;
                }
            }
            vectors.set_column(col, &v);
        }

        Ok(Spectrum {
            values: order.iter().map(|&i| raw[i]).collect(),
            vectors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeKind, InfoEdge};

    fn path_graph(distances: &[f64]) -> InformationGraph {
        let n = distances.len() + 1;
        let nodes = (0..n).map(|i| NodeKey::spatial(format!("n{}", i))).collect();
        let counts = vec![vec![1.0]; n];
        let edges = distances
            .iter()
            .enumerate()
            .map(|(i, &d)| InfoEdge {
                source: i,
                target: i + 1,
                distance: d,
                kind: EdgeKind::Spatial,
            })
            .collect();
        InformationGraph::from_parts(nodes, counts, edges).unwrap()
    }

    #[test]
    fn test_gaussian_affinity() {
        let graph = path_graph(&[0.0, 1.0]);
        let a = AffinityMatrix::from_graph(&graph, 2.0).unwrap();
        assert_eq!(a.get(0, 1), 1.0);
        assert!((a.get(1, 2) - (-0.5f64).exp()).abs() < 1e-12);
        assert_eq!(a.get(0, 2), 0.0);
        assert_eq!(a.get(2, 1), a.get(1, 2));
        assert!(AffinityMatrix::from_graph(&graph, 0.0).is_err());
    }

    #[test]
    fn test_random_walk_rows_sum_to_zero() {
        let graph = path_graph(&[0.5, 1.0, 0.2]);
        let l = Laplacian::random_walk(&AffinityMatrix::from_graph(&graph, 1.0).unwrap());
        for i in 0..l.len() {
            let row: f64 = l.matrix().row(i).sum();
            assert!(row.abs() < 1e-12);
            assert!((l.matrix()[(i, i)] - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_isolated_node_row_is_zero() {
        let nodes = vec![NodeKey::spatial("a"), NodeKey::spatial("b"), NodeKey::spatial("c")];
        let edges = vec![InfoEdge {
            source: 0,
            target: 1,
            distance: 0.0,
            kind: EdgeKind::Spatial,
        }];
        let graph = InformationGraph::from_parts(nodes, vec![vec![1.0]; 3], edges).unwrap();
        let l = Laplacian::random_walk(&AffinityMatrix::from_graph(&graph, 1.0).unwrap());

        assert!(l.matrix().row(2).iter().all(|&v| v == 0.0));
        assert!(l.matrix().iter().all(|v| v.is_finite()));

        let spectrum = l.spectrum().unwrap();
        let zeros = spectrum.values.iter().filter(|v| v.abs() < 1e-9).count();
        assert_eq!(zeros, 2);
    }

    #[test]
    fn test_far_edge_underflows_to_isolated_rows() {
        let graph = path_graph(&[0.5, 40.0]);
        let a = AffinityMatrix::from_graph(&graph, 1.0).unwrap();
        assert_eq!(a.get(1, 2), 0.0);

        let l = Laplacian::random_walk(&a);
        assert!(l.matrix().row(2).iter().all(|&v| v == 0.0));
        let spectrum = l.spectrum().unwrap();
        let zeros = spectrum.values.iter().filter(|v| v.abs() < 1e-9).count();
        assert_eq!(zeros, 2);
    }

    #[test]
    fn test_random_walk_eigenpairs() {
        let graph = path_graph(&[0.3, 0.8, 0.1, 0.5]);
        let l = Laplacian::random_walk(&AffinityMatrix::from_graph(&graph, 1.0).unwrap());
        let spectrum = l.spectrum().unwrap();

        assert!(spectrum.values.windows(2).all(|w| w[0] <= w[1]));
        assert!(spectrum.values[0].abs() < 1e-9);
        for (k, &lambda) in spectrum.values.iter().enumerate() {
            let v = spectrum.vectors.column(k).clone_owned();
            let residual = l.matrix() * &v - &v * lambda;
            assert!(residual.norm() < 1e-8);
        }
    }

    #[test]
    fn test_unnormalized_is_symmetric() {
        let graph = path_graph(&[0.3, 0.8]);
        let l = Laplacian::new(
            &AffinityMatrix::from_graph(&graph, 1.0).unwrap(),
            LaplacianNorm::Unnormalized,
        );
        assert_eq!(l.matrix(), &l.matrix().transpose());
        assert_eq!(l.norm(), LaplacianNorm::Unnormalized);
    }
}
