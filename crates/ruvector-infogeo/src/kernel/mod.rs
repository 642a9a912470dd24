//! Kernel Field
//!
//! Gaussian-kernel local mixtures of category counts. For a query point
//! `c` and bandwidths `(h, τ)` the local estimate is
//!
//! ```text
//! n(c) = Σᵤ Σₜ exp(-‖c - xᵤ‖² / 2h²) · exp(-(c_t - t)² / 2τ²) · countsᵤ,ₜ
//! ```
//!
//! The sum is left unnormalized unless the caller asks otherwise, so the
//! estimate keeps local population mass. Units farther than
//! `cutoff_sigmas · h` (or `cutoff_sigmas · τ` in time) are skipped.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{InfoGeoError, Result};
use crate::spatial::SpatialIndex;
use crate::types::{Coord, CountTable, CountVector};
use crate::utils::EPS;

/// Default kernel support in bandwidths
pub const DEFAULT_CUTOFF_SIGMAS: f64 = 3.0;

/// Kernel bandwidths
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bandwidth {
    /// Spatial bandwidth, in distance units
    pub spatial: f64,
    /// Temporal bandwidth, in periods
    pub temporal: Option<f64>,
}

impl Bandwidth {
    /// Spatial-only bandwidth
    pub fn new(spatial: f64) -> Self {
        Self {
            spatial,
            temporal: None,
        }
    }

    /// Add a temporal bandwidth
    pub fn with_temporal(mut self, temporal: f64) -> Self {
        self.temporal = Some(temporal);
        self
    }

    /// Both bandwidths scaled by `factor`
    pub fn widened(&self, factor: f64) -> Self {
        Self {
            spatial: self.spatial * factor,
            temporal: self.temporal.map(|t| t * factor),
        }
    }

    /// Check that every bandwidth is finite and positive
    pub fn validate(&self) -> Result<()> {
        if !(self.spatial.is_finite() && self.spatial > 0.0) {
            return Err(InfoGeoError::invalid_parameter(
                "spatial_bandwidth",
                format!("must be finite and positive, got {}", self.spatial),
            ));
        }
        if let Some(t) = self.temporal {
            if !(t.is_finite() && t > 0.0) {
                return Err(InfoGeoError::invalid_parameter(
                    "temporal_bandwidth",
                    format!("must be finite and positive, got {}", t),
                ));
            }
        }
        Ok(())
    }
}

/// Kernel-weighted local counts with their support
#[derive(Debug, Clone, PartialEq)]
pub struct LocalEstimate {
    /// Weighted category counts
    pub counts: Vec<f64>,
    /// Sum of kernel weights
    pub mass: f64,
    /// Number of (unit, period) snapshots that contributed
    pub contributors: usize,
}

impl LocalEstimate {
    /// True when any category has zero weighted count
    pub fn has_zero_category(&self) -> bool {
        self.counts.iter().any(|&c| c <= EPS)
    }
}

/// Per-unit snapshot: (period, counts)
type Snapshot<'a> = (Option<i32>, &'a [f64]);

/// Kernel-smoothed count field over indexed units
#[derive(Debug, Clone)]
pub struct KernelField<'a> {
    index: &'a SpatialIndex,
    snapshots: Vec<Vec<Snapshot<'a>>>,
    width: usize,
    cutoff_sigmas: f64,
}

impl<'a> KernelField<'a> {
    /// Attach a count table to a spatial index; every counted unit must be indexed
    pub fn new(index: &'a SpatialIndex, counts: &'a CountTable) -> Result<Self> {
        if counts.is_empty() {
            return Err(InfoGeoError::empty_input("count table"));
        }
        let mut snapshots: Vec<Vec<Snapshot<'a>>> = vec![Vec::new(); index.len()];
        for (key, vector) in counts.iter() {
            let i = index.require(&key.unit)?;
            snapshots[i].push((key.period, vector.as_slice()));
        }
        for list in snapshots.iter_mut() {
            list.sort_by_key(|&(period, _)| period);
        }

        Ok(Self {
            index,
            snapshots,
            width: counts.categories().len(),
            cutoff_sigmas: DEFAULT_CUTOFF_SIGMAS,
        })
    }

    /// Set kernel support radius in bandwidths
    pub fn with_cutoff_sigmas(mut self, cutoff_sigmas: f64) -> Self {
        self.cutoff_sigmas = cutoff_sigmas.max(EPS);
        self
    }

    /// Underlying spatial index
    pub fn index(&self) -> &SpatialIndex {
        self.index
    }

    /// Number of categories
    pub fn width(&self) -> usize {
        self.width
    }

    /// Kernel-weighted counts, mass and support around `query`
    pub fn local_estimate(&self, query: &Coord, bandwidth: &Bandwidth) -> Result<LocalEstimate> {
        let h = bandwidth.spatial;
        let radius = self.cutoff_sigmas * h;
        let inv_two_h2 = 1.0 / (2.0 * h * h);

        let mut counts = vec![0.0; self.width];
        let mut mass = 0.0;
        let mut contributors = 0usize;

        for (i, d) in self.index.within(query.xy(), radius) {
            let w_space = (-d * d * inv_two_h2).exp();
            for &(period, values) in &self.snapshots[i] {
                let Some(w_time) = self.temporal_weight(query.t, period, bandwidth.temporal)
                else {
                    continue;
                };
                let w = w_space * w_time;
                for (acc, &v) in counts.iter_mut().zip(values) {
                    *acc += w * v;
                }
                mass += w;
                contributors += 1;
            }
        }

        if contributors == 0 {
            return Err(InfoGeoError::insufficient_data(
                query.x, query.y, query.t, radius,
            ));
        }

        trace!(
            x = query.x,
            y = query.y,
            contributors,
            mass,
            "kernel estimate"
        );

        Ok(LocalEstimate {
            counts,
            mass,
            contributors,
        })
    }

    /// Local mixture of counts around `query`
    ///
    /// With `normalize` the weights are divided by their sum; otherwise the
    /// unnormalized mass is preserved.
    pub fn local_distribution(
        &self,
        query: &Coord,
        bandwidth: &Bandwidth,
        normalize: bool,
    ) -> Result<CountVector> {
        let estimate = self.local_estimate(query, bandwidth)?;
        let counts = if normalize && estimate.mass > EPS {
            estimate.counts.iter().map(|&c| c / estimate.mass).collect()
        } else {
            estimate.counts
        };
        CountVector::new(counts)
    }

    /// Temporal kernel weight, or `None` if the snapshot is outside the support
    fn temporal_weight(
        &self,
        query_t: Option<f64>,
        period: Option<i32>,
        temporal_bandwidth: Option<f64>,
    ) -> Option<f64> {
        match (query_t, period, temporal_bandwidth) {
            (Some(t), Some(p), Some(tau)) => {
                let dt = t - p as f64;
                if dt.abs() > self.cutoff_sigmas * tau {
                    None
                } else {
                    Some((-dt * dt / (2.0 * tau * tau)).exp())
                }
            }
            // No temporal kernel: only the query's own period contributes
            (Some(t), Some(p), None) => ((t - p as f64).abs() <= EPS).then_some(1.0),
            _ => Some(1.0),
        }
    }
}
