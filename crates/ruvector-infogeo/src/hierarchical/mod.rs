//! Information-Weighted Agglomerative Clustering
//!
//! Greedy bottom-up merging over the information graph. The information a
//! partition carries about a reference distribution `r` is
//!
//! ```text
//! I(P) = Σ_C (w_C / N) · KL(p_C ‖ r)
//! ```
//!
//! and merging clusters A and B loses
//!
//! ```text
//! ΔI = (w_A/N)·KL(p_A‖r) + (w_B/N)·KL(p_B‖r) − ((w_A+w_B)/N)·KL(p_AB‖r)
//! ```
//!
//! where `p_AB` is the weight-averaged mixture. Convexity of KL keeps
//! `ΔI ≥ 0`, so cumulative heights never decrease.
//!
//! Only graph-adjacent clusters are merge candidates. If the graph has
//! several components, the leftover roots are merged without the
//! adjacency constraint so the tree always ends in a single root.

mod dendrogram;

pub use dendrogram::{Dendrogram, Merge};

use std::collections::{BTreeSet, BinaryHeap};

use tracing::debug;

use crate::divergence::Regularization;
use crate::error::{InfoGeoError, Result};
use crate::graph::InformationGraph;
use crate::types::NodeKey;
use crate::utils::{kl_divergence, mixture, normalize_counts, smoothed_distribution, CostKey, EPS};

/// Cluster state during agglomeration
#[derive(Debug, Clone)]
struct ClusterState {
    weight: f64,
    distribution: Vec<f64>,
    size: usize,
}

/// Agglomerative clusterer with the information-loss linkage
#[derive(Debug, Clone, Default)]
pub struct AgglomerativeInfoClusterer {
    regularization: Regularization,
}

impl AgglomerativeInfoClusterer {
    /// Create a clusterer without zero-count smoothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Set zero-count regularization for leaf distributions
    pub fn with_regularization(mut self, regularization: Regularization) -> Self {
        self.regularization = regularization;
        self
    }

    /// Cluster with node totals as weights and the pooled distribution as reference
    pub fn cluster_with_defaults(&self, graph: &InformationGraph) -> Result<Dendrogram> {
        let n = graph.node_count();
        if n == 0 {
            return Err(InfoGeoError::empty_input("information graph"));
        }
        let width = graph.node_counts(0).len();
        let mut pooled = vec![0.0; width];
        let weights: Vec<f64> = (0..n)
            .map(|i| {
                let counts = graph.node_counts(i);
                for (p, &c) in pooled.iter_mut().zip(counts) {
                    *p += c;
                }
                counts.iter().sum()
            })
            .collect();
        let reference = normalize_counts(&pooled)
            .ok_or_else(|| InfoGeoError::degenerate_distribution("pooled counts sum to zero"))?;

        self.cluster(graph, &weights, &reference)
    }

    /// Build the full dendrogram
    pub fn cluster(
        &self,
        graph: &InformationGraph,
        weights: &[f64],
        reference: &[f64],
    ) -> Result<Dendrogram> {
        let n = graph.node_count();
        if n == 0 {
            return Err(InfoGeoError::empty_input("information graph"));
        }
        if weights.len() != n {
            return Err(InfoGeoError::dimension_mismatch(n, weights.len()));
        }
        if let Some(w) = weights.iter().find(|w| !(w.is_finite() && **w >= 0.0)) {
            return Err(InfoGeoError::invalid_parameter(
                "population_weights",
                format!("must be finite and non-negative, got {}", w),
            ));
        }
        let total: f64 = weights.iter().sum();
        if total <= EPS {
            return Err(InfoGeoError::degenerate_distribution(
                "population weights sum to zero",
            ));
        }
        let width = graph.node_counts(0).len();
        if reference.len() != width {
            return Err(InfoGeoError::dimension_mismatch(width, reference.len()));
        }
        let reference = normalize_counts(reference)
            .ok_or_else(|| InfoGeoError::degenerate_distribution("reference distribution"))?;

        let mut clusters: Vec<Option<ClusterState>> = Vec::with_capacity(2 * n - 1);
        for (i, &weight) in weights.iter().enumerate() {
            clusters.push(Some(ClusterState {
                weight,
                distribution: self.leaf_distribution(graph.node_counts(i), graph.node(i))?,
                size: 1,
            }));
        }

        let info = |c: &ClusterState| c.weight / total * kl_divergence(&c.distribution, &reference);
        let total_information: f64 = clusters.iter().flatten().map(&info).sum();

        let merge_cost = |a: &ClusterState, b: &ClusterState| -> (f64, ClusterState) {
            let merged = ClusterState {
                weight: a.weight + b.weight,
                distribution: mixture(&a.distribution, a.weight, &b.distribution, b.weight),
                size: a.size + b.size,
            };
            let cost = (info(a) + info(b) - info(&merged)).max(0.0);
            (cost, merged)
        };

        let mut neighbors: Vec<BTreeSet<usize>> = (0..n)
            .map(|i| graph.neighbors(i).map(|(j, _)| j).collect())
            .collect();

        let mut heap = BinaryHeap::new();
        for (a, adjacent) in neighbors.iter().enumerate() {
            for &b in adjacent.range(a + 1..) {
                if let (Some(ca), Some(cb)) = (&clusters[a], &clusters[b]) {
                    heap.push(CostKey {
                        cost: merge_cost(ca, cb).0,
                        a,
                        b,
                    });
                }
            }
        }

        let mut dendrogram = Dendrogram::new(graph.nodes().to_vec(), total_information);
        let mut active: BTreeSet<usize> = (0..n).collect();
        let mut constrained = true;

        while active.len() > 1 {
            let Some(CostKey { a, b, .. }) = heap.pop() else {
                // Remaining clusters are disconnected components
                debug!(
                    components = active.len(),
                    "merging disconnected components without adjacency"
                );
                constrained = false;
                let ids: Vec<usize> = active.iter().copied().collect();
                for (x, &a) in ids.iter().enumerate() {
                    for &b in &ids[x + 1..] {
                        if let (Some(ca), Some(cb)) = (&clusters[a], &clusters[b]) {
                            heap.push(CostKey {
                                cost: merge_cost(ca, cb).0,
                                a,
                                b,
                            });
                        }
                    }
                }
                continue;
            };
            if !(active.contains(&a) && active.contains(&b)) {
                continue;
            }

            let (Some(ca), Some(cb)) = (clusters[a].take(), clusters[b].take()) else {
                continue;
            };
            let (cost, merged) = merge_cost(&ca, &cb);
            let id = dendrogram.push(a, b, merged.size, cost);
            active.remove(&a);
            active.remove(&b);

            let linked: BTreeSet<usize> = if constrained {
                let mut set: BTreeSet<usize> = neighbors[a].union(&neighbors[b]).copied().collect();
                set.remove(&a);
                set.remove(&b);
                set.retain(|x| active.contains(x));
                set
            } else {
                active.clone()
            };

            for &other in &linked {
                if let Some(co) = &clusters[other] {
                    heap.push(CostKey {
                        cost: merge_cost(co, &merged).0,
                        a: other,
                        b: id,
                    });
                }
                neighbors[other].remove(&a);
                neighbors[other].remove(&b);
                neighbors[other].insert(id);
            }

            clusters.push(Some(merged));
            neighbors.push(linked);
            active.insert(id);
        }

        debug!(
            leaves = n,
            total_information,
            total_loss = dendrogram.heights().last().copied().unwrap_or(0.0),
            "agglomerative clustering done"
        );
        Ok(dendrogram)
    }

    fn leaf_distribution(&self, counts: &[f64], node: &NodeKey) -> Result<Vec<f64>> {
        let distribution = match self.regularization.pseudo_count {
            Some(eps) if eps > 0.0 => smoothed_distribution(counts, eps),
            _ => normalize_counts(counts),
        };
        distribution.ok_or_else(|| {
            InfoGeoError::degenerate_distribution(format!("node {} has zero counts", node))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::divergence::Divergence;
    use crate::graph::{AdjacencyRule, InformationGraphBuilder};
    use crate::spatial::{CoordinateSystem, SpatialIndex};
    use crate::types::{Categories, CountTable, Unit};

    fn line_graph(rows: &[[f64; 2]], rule: AdjacencyRule) -> InformationGraph {
        let units: Vec<Unit> = (0..rows.len())
            .map(|i| Unit::new(format!("u{}", i), i as f64, 0.0))
            .collect();
        let index = SpatialIndex::new(&units, CoordinateSystem::Projected).unwrap();
        let table = CountTable::from_vectors(
            Categories::new(["a", "b"]).unwrap(),
            rows.iter()
                .enumerate()
                .map(|(i, r)| (NodeKey::spatial(format!("u{}", i)), r.to_vec()))
                .collect(),
        )
        .unwrap();
        InformationGraphBuilder::new(Divergence::Euclidean, rule)
            .build(&index, &table)
            .unwrap()
    }

    #[test]
    fn test_similar_neighbours_merge_first() {
        let graph = line_graph(
            &[[90.0, 10.0], [88.0, 12.0], [15.0, 85.0], [10.0, 90.0]],
            AdjacencyRule::DistanceThreshold { max_distance: 1.0 },
        );
        let dendrogram = AgglomerativeInfoClusterer::new()
            .cluster_with_defaults(&graph)
            .unwrap();

        assert_eq!(dendrogram.merges().len(), 3);
        let heights = dendrogram.heights();
        assert!(heights.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(dendrogram.cutree(2).unwrap().labels(), &[1, 1, 2, 2]);

        // Root is the pooled distribution, so all information is lost
        let last = *heights.last().unwrap();
        assert!((last - dendrogram.total_information()).abs() < 1e-12);
        assert!((dendrogram.information_retained(4).unwrap() - last).abs() < 1e-12);
    }

    #[test]
    fn test_adjacency_constrains_merges() {
        // u0 and u2 are identical but not adjacent
        let graph = line_graph(
            &[[50.0, 50.0], [10.0, 90.0], [50.0, 50.0]],
            AdjacencyRule::DistanceThreshold { max_distance: 1.0 },
        );
        let dendrogram = AgglomerativeInfoClusterer::new()
            .cluster_with_defaults(&graph)
            .unwrap();
        let first = dendrogram.merges()[0];
        assert!(first.left == 1 || first.right == 1);
    }

    #[test]
    fn test_disconnected_components_reach_root() {
        let graph = line_graph(
            &[[80.0, 20.0], [70.0, 30.0], [20.0, 80.0]],
            AdjacencyRule::Contiguity(vec![("u0".into(), "u1".into())]),
        );
        let dendrogram = AgglomerativeInfoClusterer::new()
            .cluster_with_defaults(&graph)
            .unwrap();
        assert_eq!(dendrogram.merges().len(), 2);
        assert_eq!(dendrogram.merges()[1].size, 3);
        assert_eq!(dendrogram.cutree(2).unwrap().labels(), &[1, 1, 2]);
    }

    #[test]
    fn test_input_validation() {
        let graph = line_graph(
            &[[1.0, 1.0], [2.0, 1.0]],
            AdjacencyRule::KNearest { k: 1 },
        );
        let clusterer = AgglomerativeInfoClusterer::new();
        assert!(matches!(
            clusterer.cluster(&graph, &[1.0], &[0.5, 0.5]).unwrap_err(),
            InfoGeoError::DimensionMismatch { .. }
        ));
        assert!(clusterer.cluster(&graph, &[1.0, -1.0], &[0.5, 0.5]).is_err());
        assert!(clusterer.cluster(&graph, &[1.0, 1.0], &[0.0, 0.0]).is_err());
        assert!(clusterer.cluster(&graph, &[1.0, 1.0], &[0.5, 0.5]).is_ok());
    }
}
