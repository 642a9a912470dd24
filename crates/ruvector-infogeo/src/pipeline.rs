//! End-to-end analysis run

use tracing::{info, info_span};

use crate::config::AnalysisConfig;
use crate::error::{AnalysisWarning, InfoGeoError, Result};
use crate::graph::{AdjacencyRule, InformationGraph, InformationGraphBuilder};
use crate::hierarchical::{AgglomerativeInfoClusterer, Dendrogram};
use crate::kernel::KernelField;
use crate::metric::{MetricField, MetricTensorEstimator};
use crate::spatial::SpatialIndex;
use crate::spectral::{AffinityMatrix, Laplacian, SpectralClusterer, SpectralConfig, SpectralResult};
use crate::types::{ClusterAssignment, CountTable, NodeKey, Unit};

/// Immutable outputs of one analysis run
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// Per-node metric tensors
    pub field: MetricField,
    /// Information graph with spectral cluster labels attached
    pub graph: InformationGraph,
    /// Spectral clustering outcome and eigenvalue diagnostics
    pub spectral: SpectralResult,
    /// Agglomerative merge tree
    pub dendrogram: Dendrogram,
    /// Dendrogram cut at the configured k
    pub hierarchical: ClusterAssignment,
    /// Non-fatal diagnostics from every stage
    pub warnings: Vec<AnalysisWarning>,
}

impl AnalysisReport {
    /// Spectral and hierarchical labels of a node
    pub fn labels_of(&self, key: &NodeKey) -> Option<(usize, usize)> {
        Some((self.spectral.assignment.get(key)?, self.hierarchical.get(key)?))
    }
}

/// Configured analysis, reusable across datasets
#[derive(Debug, Clone)]
pub struct InfoGeoAnalysis {
    config: AnalysisConfig,
}

impl InfoGeoAnalysis {
    /// Validate the configuration and create the analysis
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run every stage over one dataset
    pub fn run(
        &self,
        units: &[Unit],
        adjacency: AdjacencyRule,
        counts: &CountTable,
    ) -> Result<AnalysisReport> {
        let config = &self.config;
        let span = info_span!("infogeo_run", divergence = %config.divergence, k = config.clusters);
        let _enter = span.enter();

        if counts.is_empty() {
            return Err(InfoGeoError::empty_input("count table"));
        }
        if config.temporal != counts.is_temporal() {
            return Err(InfoGeoError::invalid_parameter(
                "temporal",
                format!(
                    "temporal = {} but the count table {} periods",
                    config.temporal,
                    if counts.is_temporal() { "has" } else { "has no" }
                ),
            ));
        }

        let index = SpatialIndex::new(units, config.coordinate_system)?;
        let kernel = KernelField::new(&index, counts)?.with_cutoff_sigmas(config.cutoff_sigmas);

        let nodes: Vec<NodeKey> = counts.nodes().cloned().collect();
        let field = MetricTensorEstimator::from_config(&kernel, config)?.estimate_all(&nodes);

        let mut graph = InformationGraphBuilder::new(config.divergence, adjacency)
            .with_regularization(config.divergence_regularization())
            .build(&index, counts)?;

        let affinity = AffinityMatrix::from_graph(&graph, config.affinity_sigma)?;
        let laplacian = Laplacian::random_walk(&affinity);
        let spectral = SpectralClusterer::new(SpectralConfig {
            k: config.clusters,
            restarts: config.restarts,
            max_iter: config.kmeans_max_iter,
            seed: config.seed,
            ..Default::default()
        })
        .cluster(&laplacian)?;
        graph.attach_clusters(&spectral.assignment)?;

        let dendrogram = AgglomerativeInfoClusterer::new()
            .with_regularization(config.divergence_regularization())
            .cluster_with_defaults(&graph)?;
        let hierarchical = dendrogram.cutree(config.clusters)?;

        let warnings: Vec<AnalysisWarning> = field
            .warnings
            .iter()
            .chain(&spectral.warnings)
            .cloned()
            .collect();

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            tensors = field.len(),
            failed_tensors = field.failures.len(),
            warnings = warnings.len(),
            "analysis complete"
        );

        Ok(AnalysisReport {
            field,
            graph,
            spectral,
            dendrogram,
            hierarchical,
            warnings,
        })
    }
}
