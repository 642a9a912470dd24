//! Finite-difference Hessian of a divergence functional over the kernel field

use std::collections::HashMap;

use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::tensor::{MetricTensor, UnitTensor};
use super::MetricField;
use crate::config::{AnalysisConfig, RegularizationConfig};
use crate::divergence::{Divergence, Regularization};
use crate::error::{AnalysisWarning, InfoGeoError, Result};
use crate::kernel::{Bandwidth, KernelField, LocalEstimate};
use crate::types::{Coord, CoordinateFrame, NodeKey};

/// Relative tolerance below which negative eigenvalues count as round-off
pub const NEGATIVE_EIGEN_RTOL: f64 = 1e-8;

/// Perturbation pattern: step multiples along (x, y, t)
type Offset = [i8; 3];

/// Estimates g_ij = ∂²D(n(c₀), n(c₀ + δ)) / ∂δᵢ∂δⱼ at each unit centroid
#[derive(Debug, Clone)]
pub struct MetricTensorEstimator<'a> {
    field: &'a KernelField<'a>,
    divergence: Divergence,
    bandwidth: Bandwidth,
    frame: CoordinateFrame,
    smoothing: bool,
    regularization: RegularizationConfig,
    step_fraction: f64,
}

impl<'a> MetricTensorEstimator<'a> {
    /// Create an estimator over a kernel field
    pub fn new(
        field: &'a KernelField<'a>,
        divergence: Divergence,
        bandwidth: Bandwidth,
        frame: CoordinateFrame,
    ) -> Result<Self> {
        bandwidth.validate()?;
        if frame.is_temporal() && bandwidth.temporal.is_none() {
            return Err(InfoGeoError::invalid_parameter(
                "temporal_bandwidth",
                "a spatio-temporal frame needs a temporal bandwidth",
            ));
        }
        Ok(Self {
            field,
            divergence,
            bandwidth,
            frame,
            smoothing: false,
            regularization: RegularizationConfig::default(),
            step_fraction: 0.1,
        })
    }

    /// Create an estimator from an analysis configuration
    pub fn from_config(field: &'a KernelField<'a>, config: &AnalysisConfig) -> Result<Self> {
        Ok(Self::new(field, config.divergence, config.bandwidth(), config.frame())?
            .with_smoothing(config.smoothing)
            .with_regularization(config.regularization)
            .with_step_fraction(config.step_fraction))
    }

    /// Toggle zero-count smoothing (pseudo-counts plus bandwidth widening)
    pub fn with_smoothing(mut self, smoothing: bool) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Set regularization knobs
    pub fn with_regularization(mut self, regularization: RegularizationConfig) -> Self {
        self.regularization = regularization;
        self
    }

    /// Set finite-difference step as a fraction of the bandwidth
    pub fn with_step_fraction(mut self, step_fraction: f64) -> Self {
        self.step_fraction = step_fraction;
        self
    }

    /// Tensor frame
    pub fn frame(&self) -> CoordinateFrame {
        self.frame
    }

    fn divergence_regularization(&self) -> Regularization {
        if self.smoothing {
            Regularization::pseudo_count(self.regularization.pseudo_count)
        } else {
            Regularization::none()
        }
    }

    /// Base coordinate of a node
    fn base_coord(&self, key: &NodeKey) -> Result<Coord> {
        let index = self.field.index();
        let [x, y] = index.coord(index.require(&key.unit)?);
        if self.frame.is_temporal() && key.period.is_none() {
            return Err(InfoGeoError::invalid_parameter(
                "node",
                format!("{} has no period but the frame is spatio-temporal", key),
            ));
        }
        Ok(Coord {
            x,
            y,
            t: key.period.map(f64::from),
        })
    }

    /// Base estimate, widening the bandwidth near empty categories when smoothing
    fn resolve_base(&self, coord: &Coord) -> Result<(Bandwidth, LocalEstimate)> {
        let attempts = if self.smoothing {
            self.regularization.max_widenings
        } else {
            0
        };
        let mut bandwidth = self.bandwidth;

        for attempt in 0..=attempts {
            let last = attempt == attempts;
            match self.field.local_estimate(coord, &bandwidth) {
                Ok(estimate) if last || !estimate.has_zero_category() => {
                    return Ok((bandwidth, estimate));
                }
                Ok(_) => {}
                Err(err @ InfoGeoError::InsufficientData { .. }) if !last => {
                    debug!(%err, attempt, "widening bandwidth");
                }
                Err(err) => return Err(err),
            }
            bandwidth = bandwidth.widened(self.regularization.widening_factor);
        }

        // The final attempt always returns from the loop
        Err(InfoGeoError::insufficient_data(
            coord.x,
            coord.y,
            coord.t,
            bandwidth.spatial,
        ))
    }

    /// Step length per axis, derived from the bandwidth
    fn steps(&self, bandwidth: &Bandwidth) -> [f64; 3] {
        let spatial = self.step_fraction * bandwidth.spatial;
        let temporal = self.step_fraction * bandwidth.temporal.unwrap_or(1.0);
        [spatial, spatial, temporal]
    }

    fn displace(&self, coord: &Coord, offset: Offset, steps: &[f64; 3]) -> Coord {
        let dx = f64::from(offset[0]) * steps[0];
        let dy = f64::from(offset[1]) * steps[1];
        let [x, y] = self.field.index().offset(coord.xy(), dx, dy);
        let t = coord.t.map(|t| t + f64::from(offset[2]) * steps[2]);
        Coord { x, y, t }
    }

    /// Estimate the tensor of one node
    pub fn estimate(&self, key: &NodeKey) -> Result<UnitTensor> {
        let coord = self.base_coord(key)?;
        let (bandwidth, base) = self.resolve_base(&coord)?;
        let steps = self.steps(&bandwidth);
        let regularization = self.divergence_regularization();
        let d = self.frame.dim();

        let mut memo: HashMap<Offset, f64> = HashMap::new();
        let mut f = |offset: Offset| -> Result<f64> {
            if let Some(&v) = memo.get(&offset) {
                return Ok(v);
            }
            let value = if offset == [0, 0, 0] {
                self.divergence
                    .evaluate(&base.counts, &base.counts, regularization)?
            } else {
                let perturbed = self
                    .field
                    .local_estimate(&self.displace(&coord, offset, &steps), &bandwidth)?;
                self.divergence
                    .evaluate(&base.counts, &perturbed.counts, regularization)?
            };
            memo.insert(offset, value);
            Ok(value)
        };

        let axis = |i: usize, sign: i8| -> Offset {
            let mut o = [0i8; 3];
            o[i] = sign;
            o
        };
        let pair = |i: usize, si: i8, j: usize, sj: i8| -> Offset {
            let mut o = [0i8; 3];
            o[i] = si;
            o[j] = sj;
            o
        };

        let f0 = f([0, 0, 0])?;
        let mut raw = vec![vec![0.0; d]; d];
        for i in 0..d {
            let h = steps[i];
            raw[i][i] = (f(axis(i, 1))? - 2.0 * f0 + f(axis(i, -1))?) / (h * h);
            for j in 0..d {
                if i == j {
                    continue;
                }
                // Differencing along i first, then j; the (j, i) pass uses the other order
                let plus_i = f(pair(i, 1, j, 1))? - f(pair(i, 1, j, -1))?;
                let minus_i = f(pair(i, -1, j, 1))? - f(pair(i, -1, j, -1))?;
                raw[i][j] = (plus_i - minus_i) / (4.0 * steps[i] * steps[j]);
            }
        }

        let tensor = MetricTensor::from_raw(self.frame, &raw);
        if !tensor.is_finite() {
            return Err(InfoGeoError::degenerate_distribution(format!(
                "non-finite metric tensor at {}",
                key
            )));
        }
        let (tensor, min_eigenvalue, ill_conditioned) =
            tensor.clamp_negative(NEGATIVE_EIGEN_RTOL);

        Ok(UnitTensor {
            key: key.clone(),
            tensor,
            ill_conditioned,
            min_eigenvalue,
            bandwidth,
        })
    }

    /// Estimate every node; single-node failures are collected, not propagated
    /// Uses parallel computation when 'parallel' feature is enabled
    pub fn estimate_all(&self, nodes: &[NodeKey]) -> MetricField {
        #[cfg(feature = "parallel")]
        let results: Vec<Result<UnitTensor>> =
            nodes.par_iter().map(|key| self.estimate(key)).collect();

        #[cfg(not(feature = "parallel"))]
        let results: Vec<Result<UnitTensor>> = nodes.iter().map(|key| self.estimate(key)).collect();

        let mut field = MetricField::new(self.frame);
        for (key, result) in nodes.iter().zip(results) {
            match result {
                Ok(unit) => {
                    if unit.ill_conditioned {
                        warn!(
                            node = %unit.key,
                            min_eigenvalue = unit.min_eigenvalue,
                            "ill-conditioned metric tensor clamped"
                        );
                        field.warnings.push(AnalysisWarning::IllConditionedMetric {
                            node: unit.key.clone(),
                            min_eigenvalue: unit.min_eigenvalue,
                        });
                    }
                    field.tensors.push(unit);
                }
                Err(err) => {
                    warn!(node = %key, %err, "metric tensor estimation failed");
                    field.failures.push((key.clone(), err));
                }
            }
        }

        debug!(
            estimated = field.tensors.len(),
            failed = field.failures.len(),
            divergence = %self.divergence,
            "metric field estimated"
        );
        field
    }
}
