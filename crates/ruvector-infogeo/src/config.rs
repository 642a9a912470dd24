//! Analysis configuration

use serde::{Deserialize, Serialize};

use crate::divergence::{Divergence, Regularization};
use crate::error::{InfoGeoError, Result};
use crate::kernel::{Bandwidth, DEFAULT_CUTOFF_SIGMAS};
use crate::spatial::CoordinateSystem;
use crate::types::CoordinateFrame;

/// Zero-count regularization knobs used when smoothing is enabled
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegularizationConfig {
    /// Additive pseudo-count ε applied before normalizing in KL
    pub pseudo_count: f64,
    /// Bandwidth multiplier applied while the local estimate has empty categories
    pub widening_factor: f64,
    /// Maximum number of widening steps per unit
    pub max_widenings: usize,
}

impl Default for RegularizationConfig {
    fn default() -> Self {
        Self {
            pseudo_count: 0.5,
            widening_factor: 1.5,
            max_widenings: 3,
        }
    }
}

impl RegularizationConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.pseudo_count.is_finite() && self.pseudo_count > 0.0) {
            return Err(InfoGeoError::invalid_parameter(
                "pseudo_count",
                format!("must be finite and positive, got {}", self.pseudo_count),
            ));
        }
        if !(self.widening_factor.is_finite() && self.widening_factor >= 1.0) {
            return Err(InfoGeoError::invalid_parameter(
                "widening_factor",
                format!("must be >= 1, got {}", self.widening_factor),
            ));
        }
        Ok(())
    }
}

/// Full configuration of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Divergence functional for tensors and edge weights
    pub divergence: Divergence,
    /// Coordinate system of unit centroids
    pub coordinate_system: CoordinateSystem,
    /// Estimate 3×3 spatio-temporal tensors instead of 2×2 spatial ones
    pub temporal: bool,
    /// Spatial kernel bandwidth
    pub spatial_bandwidth: f64,
    /// Temporal kernel bandwidth (required when `temporal`)
    pub temporal_bandwidth: Option<f64>,
    /// Enable zero-count regularization
    pub smoothing: bool,
    /// Regularization knobs
    pub regularization: RegularizationConfig,
    /// Kernel support radius, in bandwidths
    pub cutoff_sigmas: f64,
    /// Finite-difference step as a fraction of the bandwidth
    pub step_fraction: f64,
    /// Gaussian affinity scale σ in exp(-d²/σ)
    pub affinity_sigma: f64,
    /// Number of clusters k
    pub clusters: usize,
    /// Independent k-means restarts
    pub restarts: usize,
    /// Lloyd iteration budget per restart
    pub kmeans_max_iter: usize,
    /// Base seed for k-means restarts
    pub seed: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            divergence: Divergence::KullbackLeibler,
            coordinate_system: CoordinateSystem::Projected,
            temporal: false,
            spatial_bandwidth: 1.0,
            temporal_bandwidth: None,
            smoothing: false,
            regularization: RegularizationConfig::default(),
            cutoff_sigmas: DEFAULT_CUTOFF_SIGMAS,
            step_fraction: 0.1,
            affinity_sigma: 1.0,
            clusters: 2,
            restarts: 10,
            kmeans_max_iter: 300,
            seed: 42,
        }
    }
}

impl AnalysisConfig {
    /// Create config with a divergence functional and spatial bandwidth.
    pub fn new(divergence: Divergence, spatial_bandwidth: f64) -> Self {
        Self {
            divergence,
            spatial_bandwidth,
            ..Default::default()
        }
    }

    /// Enable the time axis with a temporal bandwidth
    pub fn with_temporal(mut self, temporal_bandwidth: f64) -> Self {
        self.temporal = true;
        self.temporal_bandwidth = Some(temporal_bandwidth);
        self
    }

    /// Set the centroid coordinate system
    pub fn with_coordinate_system(mut self, system: CoordinateSystem) -> Self {
        self.coordinate_system = system;
        self
    }

    /// Toggle zero-count smoothing
    pub fn with_smoothing(mut self, smoothing: bool) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Set regularization knobs
    pub fn with_regularization(mut self, regularization: RegularizationConfig) -> Self {
        self.regularization = regularization;
        self
    }

    /// Set the affinity scale
    pub fn with_affinity_sigma(mut self, sigma: f64) -> Self {
        self.affinity_sigma = sigma;
        self
    }

    /// Set number of clusters
    pub fn with_clusters(mut self, k: usize) -> Self {
        self.clusters = k;
        self
    }

    /// Set k-means restarts
    pub fn with_restarts(mut self, restarts: usize) -> Self {
        self.restarts = restarts;
        self
    }

    /// Set the base random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Resolve the tensor frame once
    pub fn frame(&self) -> CoordinateFrame {
        CoordinateFrame::from_temporal(self.temporal)
    }

    /// Kernel bandwidths
    pub fn bandwidth(&self) -> Bandwidth {
        Bandwidth {
            spatial: self.spatial_bandwidth,
            temporal: self.temporal_bandwidth,
        }
    }

    /// Divergence regularization implied by the smoothing flag
    pub fn divergence_regularization(&self) -> Regularization {
        if self.smoothing {
            Regularization::pseudo_count(self.regularization.pseudo_count)
        } else {
            Regularization::none()
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        self.bandwidth().validate()?;
        if self.temporal && self.temporal_bandwidth.is_none() {
            return Err(InfoGeoError::invalid_parameter(
                "temporal_bandwidth",
                "required when the temporal axis is enabled",
            ));
        }
        if self.smoothing {
            self.regularization.validate()?;
        }
        if !(self.cutoff_sigmas.is_finite() && self.cutoff_sigmas > 0.0) {
            return Err(InfoGeoError::invalid_parameter(
                "cutoff_sigmas",
                format!("must be finite and positive, got {}", self.cutoff_sigmas),
            ));
        }
        if !(self.step_fraction > 0.0 && self.step_fraction < self.cutoff_sigmas) {
            return Err(InfoGeoError::invalid_parameter(
                "step_fraction",
                format!(
                    "must lie in (0, cutoff_sigmas = {}), got {}",
                    self.cutoff_sigmas, self.step_fraction
                ),
            ));
        }
        if !(self.affinity_sigma.is_finite() && self.affinity_sigma > 0.0) {
            return Err(InfoGeoError::invalid_parameter(
                "affinity_sigma",
                format!("must be finite and positive, got {}", self.affinity_sigma),
            ));
        }
        if self.clusters == 0 {
            return Err(InfoGeoError::invalid_parameter(
                "clusters",
                "must be at least 1",
            ));
        }
        if self.restarts == 0 {
            return Err(InfoGeoError::invalid_parameter(
                "restarts",
                "must be at least 1",
            ));
        }
        if self.kmeans_max_iter == 0 {
            return Err(InfoGeoError::invalid_parameter(
                "kmeans_max_iter",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
