//! Error types for ruvector-infogeo

use thiserror::Error;

use crate::types::NodeKey;

/// Result type alias for ruvector-infogeo operations
pub type Result<T> = std::result::Result<T, InfoGeoError>;

/// Errors that can occur while estimating or clustering an information field
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InfoGeoError {
    /// No unit lies within the kernel cutoff radius of a query point
    #[error("Insufficient data: no unit within {radius:.4} of ({x:.4}, {y:.4}, t = {t:?})")]
    InsufficientData {
        /// Query x coordinate
        x: f64,
        /// Query y coordinate
        y: f64,
        /// Query time coordinate, if any
        t: Option<f64>,
        /// Spatial cutoff radius that was searched
        radius: f64,
    },

    /// All-zero count vector reached a normalizing functional without smoothing
    #[error("Degenerate distribution: {context}")]
    DegenerateDistribution {
        /// Where the zero-mass vector was encountered
        context: String,
    },

    /// Iterative solver did not converge
    #[error("Convergence failed in {stage} after {iterations} iterations (residual: {residual:.2e})")]
    ConvergenceFailure {
        /// Stage that failed (e.g. "kmeans", "eigensolver")
        stage: String,
        /// Number of iterations attempted
        iterations: usize,
        /// Final residual/change value
        residual: f64,
    },

    /// Dimension mismatch between inputs
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension received
        got: usize,
    },

    /// Empty input where non-empty was required
    #[error("Empty input: {context}")]
    EmptyInput {
        /// Context describing what was empty
        context: String,
    },

    /// Invalid parameter value
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason why it's invalid
        reason: String,
    },

    /// Negative or non-finite category count
    #[error("Invalid count {value} for unit '{unit}', category '{category}'")]
    InvalidCount {
        /// Unit identifier
        unit: String,
        /// Category label
        category: String,
        /// Offending value
        value: f64,
    },

    /// Reference to a unit that is not indexed
    #[error("Unknown unit '{id}'")]
    UnknownUnit {
        /// Unit identifier
        id: String,
    },

    /// Same unit identifier supplied twice
    #[error("Duplicate unit '{id}'")]
    DuplicateUnit {
        /// Unit identifier
        id: String,
    },
}

impl InfoGeoError {
    /// Create an insufficient data error
    pub fn insufficient_data(x: f64, y: f64, t: Option<f64>, radius: f64) -> Self {
        Self::InsufficientData { x, y, t, radius }
    }

    /// Create a degenerate distribution error
    pub fn degenerate_distribution(context: impl Into<String>) -> Self {
        Self::DegenerateDistribution {
            context: context.into(),
        }
    }

    /// Create a convergence failure error
    pub fn convergence_failure(stage: impl Into<String>, iterations: usize, residual: f64) -> Self {
        Self::ConvergenceFailure {
            stage: stage.into(),
            iterations,
            residual,
        }
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        Self::DimensionMismatch { expected, got }
    }

    /// Create an empty input error
    pub fn empty_input(context: impl Into<String>) -> Self {
        Self::EmptyInput {
            context: context.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid count error
    pub fn invalid_count(unit: impl Into<String>, category: impl Into<String>, value: f64) -> Self {
        Self::InvalidCount {
            unit: unit.into(),
            category: category.into(),
            value,
        }
    }

    /// Create an unknown unit error
    pub fn unknown_unit(id: impl Into<String>) -> Self {
        Self::UnknownUnit { id: id.into() }
    }

    /// Create a duplicate unit error
    pub fn duplicate_unit(id: impl Into<String>) -> Self {
        Self::DuplicateUnit { id: id.into() }
    }

    /// Analysis stage an error belongs to, for retry decisions
    pub fn stage(&self) -> &str {
        match self {
            Self::InsufficientData { .. } => "kernel",
            Self::DegenerateDistribution { .. } => "divergence",
            Self::ConvergenceFailure { stage, .. } => stage,
            Self::DimensionMismatch { .. } | Self::EmptyInput { .. } => "input",
            Self::InvalidParameter { .. } => "config",
            Self::InvalidCount { .. } => "counts",
            Self::UnknownUnit { .. } | Self::DuplicateUnit { .. } => "spatial",
        }
    }

    /// Whether widening the bandwidth or enabling smoothing may resolve the error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData { .. }
                | Self::DegenerateDistribution { .. }
                | Self::ConvergenceFailure { .. }
        )
    }
}

/// Non-fatal conditions reported alongside results
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisWarning {
    /// Negative eigenvalue beyond tolerance was clamped to zero
    #[error("Ill-conditioned metric at {node}: min eigenvalue {min_eigenvalue:.3e} clamped")]
    IllConditionedMetric {
        /// Affected node
        node: NodeKey,
        /// Most negative eigenvalue before clamping
        min_eigenvalue: f64,
    },

    /// Affinity graph splits into several components
    #[error("Disconnected graph: {components} components")]
    DisconnectedGraph {
        /// Number of connected components (zero-eigenvalue multiplicity)
        components: usize,
    },

    /// k-means settled on fewer distinct labels than requested
    #[error("Spectral clustering found {found} of {requested} clusters")]
    FewerClusters {
        /// Requested k
        requested: usize,
        /// Distinct labels in the returned assignment
        found: usize,
    },
}
