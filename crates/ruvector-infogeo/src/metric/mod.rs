//! Local Metric Tensors
//!
//! The metric at a unit is the Hessian of a divergence functional with
//! respect to a small displacement of the kernel query point:
//!
//! ```text
//! g_ij(c₀) = ∂² D(n(c₀), n(c₀ + δ)) / ∂δᵢ ∂δⱼ |_{δ=0}
//! ```
//!
//! where `n(c)` is the unnormalized kernel estimate. For KL this is the
//! discrete analogue of the Fisher information metric pulled back onto
//! (x, y[, t]) coordinates.
//!
//! ## Numerical scheme
//!
//! - Step `h = step_fraction · bandwidth` per axis (0.1 by default), so
//!   perturbations stay deep inside the kernel support
//! - Diagonal: `(f(+eᵢ) − 2f(0) + f(−eᵢ)) / h²`
//! - Off-diagonal: four-point mixed difference evaluated in both orders,
//!   then averaged into an exactly symmetric matrix
//! - Negative eigenvalues beyond round-off are clamped to zero and the unit
//!   is flagged ill-conditioned

mod estimator;
mod tensor;

pub use estimator::{MetricTensorEstimator, NEGATIVE_EIGEN_RTOL};
pub use tensor::{MetricTensor, UnitTensor};

use crate::error::{AnalysisWarning, InfoGeoError};
use crate::types::{CoordinateFrame, NodeKey};
use crate::utils::variance;

/// Metric tensors for a batch of nodes
#[derive(Debug, Clone)]
pub struct MetricField {
    /// Frame shared by every tensor
    pub frame: CoordinateFrame,
    /// Successfully estimated tensors, in input order
    pub tensors: Vec<UnitTensor>,
    /// Nodes whose estimate failed, with the cause
    pub failures: Vec<(NodeKey, InfoGeoError)>,
    /// Non-fatal diagnostics (clamped tensors)
    pub warnings: Vec<AnalysisWarning>,
}

impl MetricField {
    /// Empty field
    pub fn new(frame: CoordinateFrame) -> Self {
        Self {
            frame,
            tensors: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Tensor of a node, if estimated
    pub fn get(&self, key: &NodeKey) -> Option<&UnitTensor> {
        self.tensors.iter().find(|t| &t.key == key)
    }

    /// Number of estimated tensors
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// True when nothing was estimated
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// True when every requested node was estimated
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of tensors flagged ill-conditioned
    pub fn ill_conditioned_count(&self) -> usize {
        self.tensors.iter().filter(|t| t.ill_conditioned).count()
    }

    /// Traces, in tensor order
    pub fn traces(&self) -> Vec<f64> {
        self.tensors.iter().map(|t| t.tensor.trace()).collect()
    }

    /// Determinants, in tensor order
    pub fn determinants(&self) -> Vec<f64> {
        self.tensors.iter().map(|t| t.tensor.determinant()).collect()
    }

    /// Population variance of traces across units
    pub fn trace_variance(&self) -> f64 {
        variance(&self.traces())
    }
}
