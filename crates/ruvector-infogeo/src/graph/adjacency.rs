//! Spatial adjacency policies

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{InfoGeoError, Result};
use crate::spatial::SpatialIndex;
use crate::types::UnitId;

/// Rule deciding which pairs of units share a spatial edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjacencyRule {
    /// Explicit neighbour pairs, e.g. shared polygon boundaries
    Contiguity(Vec<(UnitId, UnitId)>),
    /// Every pair of centroids closer than `max_distance`
    DistanceThreshold {
        /// Inclusive distance cutoff in index units
        max_distance: f64,
    },
    /// Each unit linked to its `k` nearest centroids, then symmetrized
    KNearest {
        /// Neighbours per unit
        k: usize,
    },
}

impl AdjacencyRule {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Contiguity(_) => "contiguity",
            Self::DistanceThreshold { .. } => "distance_threshold",
            Self::KNearest { .. } => "k_nearest",
        }
    }

    /// Validate rule parameters
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::DistanceThreshold { max_distance }
                if !(max_distance.is_finite() && *max_distance >= 0.0) =>
            {
                Err(InfoGeoError::invalid_parameter(
                    "max_distance",
                    format!("must be finite and non-negative, got {}", max_distance),
                ))
            }
            Self::KNearest { k: 0 } => Err(InfoGeoError::invalid_parameter(
                "k",
                "k-nearest adjacency needs k >= 1",
            )),
            _ => Ok(()),
        }
    }

    /// Unordered unit pairs `(i, j)` with `i < j`, sorted, over index positions
    pub fn pairs(&self, index: &SpatialIndex) -> Result<Vec<(usize, usize)>> {
        self.validate()?;
        let mut pairs = BTreeSet::new();
        let mut add = |a: usize, b: usize| {
            if a != b {
                pairs.insert((a.min(b), a.max(b)));
            }
        };

        match self {
            Self::Contiguity(links) => {
                for (a, b) in links {
                    add(index.require(a)?, index.require(b)?);
                }
            }
            Self::DistanceThreshold { max_distance } => {
                for i in 0..index.len() {
                    for (j, _) in index.within(index.coord(i), *max_distance) {
                        add(i, j);
                    }
                }
            }
            Self::KNearest { k } => {
                for i in 0..index.len() {
                    // The unit itself comes back at distance zero
                    for (j, _) in index.nearest(index.coord(i), k + 1) {
                        add(i, j);
                    }
                }
            }
        }

        Ok(pairs.into_iter().collect())
    }
}
