//! Information Graph
//!
//! Nodes are (unit, period) snapshots; edges join spatially adjacent units
//! within a period and the same unit across consecutive periods. Each edge
//! carries the symmetric divergence between its endpoints' raw counts.
//!
//! Construction is deterministic: nodes follow the count table order and
//! edges are sorted by (source, target) regardless of how the weights were
//! computed.

mod adjacency;

pub use adjacency::AdjacencyRule;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::divergence::{Divergence, Regularization};
use crate::error::{InfoGeoError, Result};
use crate::spatial::SpatialIndex;
use crate::types::{ClusterAssignment, CountTable, NodeKey};

/// Edge origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Adjacent units in the same period
    Spatial,
    /// Same unit in consecutive periods
    Temporal,
}

/// Weighted undirected edge, `source < target`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InfoEdge {
    /// Node index of the lower endpoint
    pub source: usize,
    /// Node index of the higher endpoint
    pub target: usize,
    /// Information divergence between the endpoints
    pub distance: f64,
    /// Spatial or temporal adjacency
    pub kind: EdgeKind,
}

/// Graph over (unit, period) nodes with divergence-weighted edges
#[derive(Debug, Clone)]
pub struct InformationGraph {
    nodes: Vec<NodeKey>,
    counts: Vec<Vec<f64>>,
    edges: Vec<InfoEdge>,
    /// Per node: (neighbor, edge index)
    adjacency: Vec<Vec<(usize, usize)>>,
    lookup: HashMap<NodeKey, usize>,
    clusters: Option<ClusterAssignment>,
}

impl InformationGraph {
    /// Assemble a graph from nodes, their counts and edges
    pub fn from_parts(
        nodes: Vec<NodeKey>,
        counts: Vec<Vec<f64>>,
        mut edges: Vec<InfoEdge>,
    ) -> Result<Self> {
        if nodes.len() != counts.len() {
            return Err(InfoGeoError::dimension_mismatch(nodes.len(), counts.len()));
        }
        let n = nodes.len();
        for edge in edges.iter_mut() {
            if edge.source.max(edge.target) >= n {
                return Err(InfoGeoError::dimension_mismatch(
                    n,
                    edge.source.max(edge.target) + 1,
                ));
            }
            if !(edge.distance.is_finite() && edge.distance >= 0.0) {
                return Err(InfoGeoError::invalid_parameter(
                    "edge distance",
                    format!("must be finite and non-negative, got {}", edge.distance),
                ));
            }
            if edge.source > edge.target {
                std::mem::swap(&mut edge.source, &mut edge.target);
            }
        }
        edges.sort_by(|a, b| (a.source, a.target).cmp(&(b.source, b.target)));

        let mut adjacency = vec![Vec::new(); n];
        for (e, edge) in edges.iter().enumerate() {
            adjacency[edge.source].push((edge.target, e));
            adjacency[edge.target].push((edge.source, e));
        }
        let lookup = nodes
            .iter()
            .enumerate()
            .map(|(i, key)| (key.clone(), i))
            .collect();

        Ok(Self {
            nodes,
            counts,
            edges,
            adjacency,
            lookup,
            clusters: None,
        })
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Node keys in index order
    pub fn nodes(&self) -> &[NodeKey] {
        &self.nodes
    }

    /// Node key at an index
    pub fn node(&self, i: usize) -> &NodeKey {
        &self.nodes[i]
    }

    /// Index of a node
    pub fn node_index(&self, key: &NodeKey) -> Option<usize> {
        self.lookup.get(key).copied()
    }

    /// Raw category counts of a node
    pub fn node_counts(&self, i: usize) -> &[f64] {
        &self.counts[i]
    }

    /// Edges sorted by (source, target)
    pub fn edges(&self) -> &[InfoEdge] {
        &self.edges
    }

    /// Neighbours of a node with the connecting edge
    pub fn neighbors(&self, i: usize) -> impl Iterator<Item = (usize, &InfoEdge)> + '_ {
        self.adjacency[i]
            .iter()
            .map(move |&(j, e)| (j, &self.edges[e]))
    }

    /// Degree (edge count) of a node
    pub fn degree(&self, i: usize) -> usize {
        self.adjacency[i].len()
    }

    /// Connected components, each sorted, ordered by smallest member
    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let n = self.node_count();
        let mut seen = vec![false; n];
        let mut components = Vec::new();

        for start in 0..n {
            if seen[start] {
                continue;
            }
            seen[start] = true;
            let mut stack = vec![start];
            let mut component = Vec::new();
            while let Some(u) = stack.pop() {
                component.push(u);
                for &(v, _) in &self.adjacency[u] {
                    if !seen[v] {
                        seen[v] = true;
                        stack.push(v);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    /// Store cluster labels on the nodes; edges are untouched
    pub fn attach_clusters(&mut self, assignment: &ClusterAssignment) -> Result<()> {
        if assignment.nodes() != self.nodes.as_slice() {
            return Err(InfoGeoError::dimension_mismatch(
                self.nodes.len(),
                assignment.nodes().len(),
            ));
        }
        self.clusters = Some(assignment.clone());
        Ok(())
    }

    /// Attached cluster labels, if any
    pub fn clusters(&self) -> Option<&ClusterAssignment> {
        self.clusters.as_ref()
    }

    /// Cluster label of a node
    pub fn cluster_of(&self, key: &NodeKey) -> Option<usize> {
        let i = self.node_index(key)?;
        self.clusters.as_ref().map(|c| c.labels()[i])
    }
}

/// Candidate edge before weighting
type Candidate = (usize, usize, EdgeKind);

/// Builds an [`InformationGraph`] from counts and an adjacency rule
#[derive(Debug, Clone)]
pub struct InformationGraphBuilder {
    divergence: Divergence,
    rule: AdjacencyRule,
    regularization: Regularization,
}

impl InformationGraphBuilder {
    /// Create a builder
    pub fn new(divergence: Divergence, rule: AdjacencyRule) -> Self {
        Self {
            divergence,
            rule,
            regularization: Regularization::none(),
        }
    }

    /// Set zero-count regularization for edge divergences
    pub fn with_regularization(mut self, regularization: Regularization) -> Self {
        self.regularization = regularization;
        self
    }

    /// Divergence used for edge weights
    pub fn divergence(&self) -> Divergence {
        self.divergence
    }

    /// Build the graph
    pub fn build(&self, index: &SpatialIndex, counts: &CountTable) -> Result<InformationGraph> {
        if counts.is_empty() {
            return Err(InfoGeoError::empty_input("count table"));
        }

        let nodes: Vec<NodeKey> = counts.nodes().cloned().collect();
        let vectors: Vec<Vec<f64>> = counts
            .iter()
            .map(|(_, v)| v.as_slice().to_vec())
            .collect();

        // period -> unit position -> node index
        let mut by_period: BTreeMap<Option<i32>, HashMap<usize, usize>> = BTreeMap::new();
        for (i, key) in nodes.iter().enumerate() {
            let u = index.require(&key.unit)?;
            by_period.entry(key.period).or_default().insert(u, i);
        }

        let unit_pairs = self.rule.pairs(index)?;
        let mut candidates: Vec<Candidate> = Vec::new();

        for members in by_period.values() {
            for &(a, b) in &unit_pairs {
                if let (Some(&i), Some(&j)) = (members.get(&a), members.get(&b)) {
                    candidates.push((i.min(j), i.max(j), EdgeKind::Spatial));
                }
            }
        }

        // Consecutive periods of the global period list only
        let periods: Vec<Option<i32>> = by_period.keys().copied().collect();
        for window in periods.windows(2) {
            let (earlier, later) = (&by_period[&window[0]], &by_period[&window[1]]);
            for (u, &i) in earlier {
                if let Some(&j) = later.get(u) {
                    candidates.push((i.min(j), i.max(j), EdgeKind::Temporal));
                }
            }
        }

        let edges = self.weigh(&vectors, &candidates)?;

        // Spot-check symmetry on one edge in debug builds
        if cfg!(debug_assertions) {
            if let Some(edge) = edges.first() {
                let reverse = self.divergence.symmetric(
                    &vectors[edge.target],
                    &vectors[edge.source],
                    self.regularization,
                )?;
                debug_assert!(
                    (reverse - edge.distance).abs() <= 1e-9 * (1.0 + edge.distance.abs()),
                    "edge divergence must be symmetric"
                );
            }
        }

        let graph = InformationGraph::from_parts(nodes, vectors, edges)?;
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            rule = self.rule.name(),
            divergence = %self.divergence,
            "information graph built"
        );
        Ok(graph)
    }

    /// Evaluate edge distances
    /// Uses parallel computation when 'parallel' feature is enabled
    fn weigh(&self, vectors: &[Vec<f64>], candidates: &[Candidate]) -> Result<Vec<InfoEdge>> {
        let weigh_one = |&(source, target, kind): &Candidate| -> Result<InfoEdge> {
            let distance = self.divergence.symmetric(
                &vectors[source],
                &vectors[target],
                self.regularization,
            )?;
            Ok(InfoEdge {
                source,
                target,
                distance,
                kind,
            })
        };

        #[cfg(feature = "parallel")]
        {
            candidates.par_iter().map(weigh_one).collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            candidates.iter().map(weigh_one).collect()
        }
    }
}
