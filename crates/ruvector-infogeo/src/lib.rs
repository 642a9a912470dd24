//! # RuVector InfoGeo
//!
//! Information geometry of categorical count fields: how fast the local
//! composition of a population changes across space and time, and where
//! it naturally splits into regions.
//!
//! ## Core Modules
//!
//! - **Spatial Index**: Radius, nearest-unit and pairwise queries over centroids
//! - **Kernel Field**: Gaussian-kernel local mixtures of category counts
//! - **Divergences**: Euclidean, cumulative Euclidean and Kullback-Leibler
//! - **Metric Tensors**: Finite-difference Hessians of a divergence per unit
//! - **Information Graph**: Divergence-weighted spatial and temporal adjacency
//! - **Spectral Clustering**: Random-walk Laplacian embedding plus seeded k-means
//! - **Hierarchical Clustering**: Information-loss linkage with a dendrogram
//!
//! ## Design Principles
//!
//! 1. **Pure Rust**: nalgebra for dense eigenproblems, no BLAS/LAPACK
//! 2. **Deterministic**: Sorted nodes and edges, explicit seeds for every restart
//! 3. **Numerically Guarded**: Pseudo-counts, bandwidth widening, PSD clamping
//! 4. **Batch Tolerant**: One unit's failure never aborts the metric field
//!
//! ## Architecture
//!
//! ```text
//!   units ──► SpatialIndex ──► KernelField ──► MetricTensorEstimator ──► MetricField
//!                  │                                   ▲
//!                  │                              Divergence
//!                  ▼                                   │
//!   counts ──► InformationGraphBuilder ────────────────┘
//!                  │
//!          ┌───────┴────────┐
//!          ▼                ▼
//!   AffinityMatrix    AgglomerativeInfoClusterer
//!          │                │
//!      Laplacian        Dendrogram ──► cutree(k)
//!          │
//!   SpectralClusterer ──► ClusterAssignment
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use ruvector_infogeo::prelude::*;
//!
//! let units = vec![
//!     Unit::new("a", 0.0, 0.0),
//!     Unit::new("b", 0.0, 1.0),
//!     Unit::new("c", 1.0, 0.0),
//!     Unit::new("d", 1.0, 1.0),
//! ];
//! let records = vec![
//!     CountRecord::new("a", "x", 100.0),
//!     CountRecord::new("b", "x", 100.0),
//!     CountRecord::new("c", "y", 100.0),
//!     CountRecord::new("d", "y", 100.0),
//! ];
//! let counts = CountTable::from_records(&records).unwrap();
//!
//! let config = AnalysisConfig::new(Divergence::KullbackLeibler, 1.0)
//!     .with_smoothing(true)
//!     .with_clusters(2);
//! let report = InfoGeoAnalysis::new(config)
//!     .unwrap()
//!     .run(&units, AdjacencyRule::DistanceThreshold { max_distance: 1.0 }, &counts)
//!     .unwrap();
//!
//! assert_eq!(report.spectral.assignment.labels(), &[1, 1, 2, 2]);
//! assert_eq!(report.hierarchical.labels(), &[1, 1, 2, 2]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod divergence;
pub mod error;
pub mod graph;
pub mod hierarchical;
pub mod kernel;
pub mod metric;
pub mod pipeline;
pub mod spatial;
pub mod spectral;
pub mod types;
pub mod utils;

// Re-exports for convenience - Core
pub use config::{AnalysisConfig, RegularizationConfig};
pub use error::{AnalysisWarning, InfoGeoError, Result};
pub use pipeline::{AnalysisReport, InfoGeoAnalysis};
pub use types::{
    Categories, ClusterAssignment, Coord, CoordinateFrame, CountRecord, CountTable, CountVector,
    NodeKey, Unit, UnitId,
};

// Re-exports - Geometry and estimation
pub use divergence::{Divergence, Regularization};
pub use kernel::{Bandwidth, KernelField, LocalEstimate};
pub use metric::{MetricField, MetricTensor, MetricTensorEstimator, UnitTensor};
pub use spatial::{CoordinateSystem, SpatialIndex};

// Re-exports - Graph and clustering
pub use graph::{AdjacencyRule, EdgeKind, InfoEdge, InformationGraph, InformationGraphBuilder};
pub use hierarchical::{AgglomerativeInfoClusterer, Dendrogram, Merge};
pub use spectral::{suggest_k, SpectralClusterer, SpectralConfig, SpectralResult};
pub use spectral::{AffinityMatrix, Laplacian, LaplacianNorm};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::divergence::*;
    pub use crate::error::*;
    pub use crate::graph::*;
    pub use crate::hierarchical::*;
    pub use crate::kernel::*;
    pub use crate::metric::*;
    pub use crate::pipeline::*;
    pub use crate::spatial::*;
    pub use crate::spectral::*;
    pub use crate::types::*;
}
