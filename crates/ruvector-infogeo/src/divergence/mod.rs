//! Divergence Functionals
//!
//! Scalar comparisons between two non-negative count vectors over the same
//! category support. The set is closed: callers pick a variant of
//! [`Divergence`] rather than supplying arbitrary closures.
//!
//! | Variant | Formula | Input |
//! |---------|---------|-------|
//! | Euclidean | Σ (pᵢ − qᵢ)² | raw counts |
//! | CumulativeEuclidean | Σ (Pᵢ − Qᵢ)², P = cumsum(p) | raw counts, ordered axis |
//! | KullbackLeibler | Σ p̂ᵢ log(p̂ᵢ / q̂ᵢ) | normalized internally |
//!
//! The Euclidean variants keep population mass, which matters for the
//! unnormalized kernel estimates fed to the metric tensor estimator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{InfoGeoError, Result};
use crate::utils::{
    cumulative, kl_divergence, normalize_counts, smoothed_distribution, squared_euclidean,
};

/// Zero-count regularization policy
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Regularization {
    /// Additive pseudo-count applied to every category before normalizing
    pub pseudo_count: Option<f64>,
}

impl Regularization {
    /// No regularization: zero-mass vectors are rejected
    pub fn none() -> Self {
        Self { pseudo_count: None }
    }

    /// Additive pseudo-count smoothing
    pub fn pseudo_count(epsilon: f64) -> Self {
        Self {
            pseudo_count: Some(epsilon),
        }
    }

    /// Whether smoothing is active
    pub fn is_smoothing(&self) -> bool {
        self.pseudo_count.map_or(false, |e| e > 0.0)
    }
}

/// Named divergence functional
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Divergence {
    /// Squared Euclidean distance between raw counts
    Euclidean,
    /// Squared Euclidean distance between cumulative counts
    CumulativeEuclidean,
    /// Kullback-Leibler divergence between normalized distributions
    KullbackLeibler,
}

impl Divergence {
    /// Every available functional
    pub const ALL: [Divergence; 3] = [
        Divergence::Euclidean,
        Divergence::CumulativeEuclidean,
        Divergence::KullbackLeibler,
    ];

    /// Canonical name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::CumulativeEuclidean => "cumulative_euclidean",
            Self::KullbackLeibler => "kl",
        }
    }

    /// Whether D(p, q) == D(q, p) for every input
    pub fn is_symmetric(&self) -> bool {
        !matches!(self, Self::KullbackLeibler)
    }

    /// Evaluate D(p, q)
    pub fn evaluate(&self, p: &[f64], q: &[f64], regularization: Regularization) -> Result<f64> {
        if p.len() != q.len() {
            return Err(InfoGeoError::dimension_mismatch(p.len(), q.len()));
        }
        if p.is_empty() {
            return Err(InfoGeoError::empty_input("category support"));
        }

        match self {
            Self::Euclidean => Ok(squared_euclidean(p, q)),
            Self::CumulativeEuclidean => Ok(squared_euclidean(&cumulative(p), &cumulative(q))),
            Self::KullbackLeibler => {
                let p_hat = distribution(p, regularization, "first argument")?;
                let q_hat = distribution(q, regularization, "second argument")?;
                Ok(kl_divergence(&p_hat, &q_hat))
            }
        }
    }

    /// Symmetrized divergence used for graph edge weights
    ///
    /// KL is averaged over both directions; the Euclidean variants are
    /// returned unchanged.
    pub fn symmetric(&self, p: &[f64], q: &[f64], regularization: Regularization) -> Result<f64> {
        if self.is_symmetric() {
            return self.evaluate(p, q, regularization);
        }
        let forward = self.evaluate(p, q, regularization)?;
        let backward = self.evaluate(q, p, regularization)?;
        Ok(0.5 * (forward + backward))
    }
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Divergence {
    type Err = InfoGeoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "euclidean" => Ok(Self::Euclidean),
            "cumulative_euclidean" | "cumulative" => Ok(Self::CumulativeEuclidean),
            "kl" | "kullback_leibler" => Ok(Self::KullbackLeibler),
            other => Err(InfoGeoError::invalid_parameter(
                "divergence",
                format!("unknown functional '{}'", other),
            )),
        }
    }
}

fn distribution(counts: &[f64], regularization: Regularization, role: &str) -> Result<Vec<f64>> {
    let normalized = match regularization.pseudo_count {
        Some(epsilon) if epsilon > 0.0 => smoothed_distribution(counts, epsilon),
        _ => normalize_counts(counts),
    };
    normalized.ok_or_else(|| {
        InfoGeoError::degenerate_distribution(format!(
            "{} of KL divergence has zero total count and smoothing is disabled",
            role
        ))
    })
}
