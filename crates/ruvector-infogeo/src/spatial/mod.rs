//! Spatial Index
//!
//! Nearby-unit, nearest-unit and pairwise-distance queries over unit
//! centroids. Units are stored sorted by identifier, so index `i` means the
//! same unit for every consumer.
//!
//! Projected coordinates use planar Euclidean distance with an x-sorted
//! sweep for radius queries. Geographic coordinates (longitude/latitude in
//! degrees) use haversine distance in kilometres and a linear scan.

use std::collections::HashMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{InfoGeoError, Result};
use crate::types::{Unit, UnitId};
use crate::utils::EPS;

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Kilometres per degree of latitude on the mean sphere
pub const KM_PER_DEGREE: f64 = EARTH_RADIUS_KM * PI / 180.0;

/// Coordinate system of unit centroids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSystem {
    /// Planar projected coordinates (e.g. kilometres)
    #[default]
    Projected,
    /// Longitude / latitude in degrees, distances in kilometres
    Geographic,
}

impl CoordinateSystem {
    /// Distance between two centroids
    #[inline]
    pub fn distance(&self, a: [f64; 2], b: [f64; 2]) -> f64 {
        match self {
            Self::Projected => (a[0] - b[0]).hypot(a[1] - b[1]),
            Self::Geographic => haversine_km(a, b),
        }
    }

    /// Displace a coordinate by a local tangent-plane step (dx east, dy north)
    pub fn offset(&self, coord: [f64; 2], dx: f64, dy: f64) -> [f64; 2] {
        match self {
            Self::Projected => [coord[0] + dx, coord[1] + dy],
            Self::Geographic => {
                let cos_lat = (coord[1] * PI / 180.0).cos().abs().max(EPS);
                [
                    coord[0] + dx / (KM_PER_DEGREE * cos_lat),
                    coord[1] + dy / KM_PER_DEGREE,
                ]
            }
        }
    }
}

fn haversine_km(a: [f64; 2], b: [f64; 2]) -> f64 {
    let (lon1, lat1) = (a[0].to_radians(), a[1].to_radians());
    let (lon2, lat2) = (b[0].to_radians(), b[1].to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Index over unit centroids
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    ids: Vec<UnitId>,
    coords: Vec<[f64; 2]>,
    lookup: HashMap<UnitId, usize>,
    /// Unit indices sorted by x (projected sweep)
    by_x: Vec<usize>,
    system: CoordinateSystem,
}

impl SpatialIndex {
    /// Build the index; rejects empty input, duplicate ids and non-finite centroids
    pub fn new(units: &[Unit], system: CoordinateSystem) -> Result<Self> {
        if units.is_empty() {
            return Err(InfoGeoError::empty_input("spatial units"));
        }

        let mut sorted: Vec<&Unit> = units.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let mut ids = Vec::with_capacity(sorted.len());
        let mut coords = Vec::with_capacity(sorted.len());
        let mut lookup = HashMap::with_capacity(sorted.len());

        for unit in sorted {
            if !unit.x.is_finite() || !unit.y.is_finite() {
                return Err(InfoGeoError::invalid_parameter(
                    "centroid",
                    format!("unit '{}' has a non-finite centroid", unit.id),
                ));
            }
            if lookup.insert(unit.id.clone(), ids.len()).is_some() {
                return Err(InfoGeoError::duplicate_unit(unit.id.as_str()));
            }
            ids.push(unit.id.clone());
            coords.push([unit.x, unit.y]);
        }

        let mut by_x: Vec<usize> = (0..coords.len()).collect();
        by_x.sort_by(|&a, &b| coords[a][0].total_cmp(&coords[b][0]).then(a.cmp(&b)));

        Ok(Self {
            ids,
            coords,
            lookup,
            by_x,
            system,
        })
    }

    /// Number of indexed units
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when no units are indexed
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Coordinate system of the centroids
    pub fn system(&self) -> CoordinateSystem {
        self.system
    }

    /// Index of a unit
    pub fn position(&self, id: &UnitId) -> Option<usize> {
        self.lookup.get(id).copied()
    }

    /// Index of a unit, or `UnknownUnit`
    pub fn require(&self, id: &UnitId) -> Result<usize> {
        self.position(id)
            .ok_or_else(|| InfoGeoError::unknown_unit(id.as_str()))
    }

    /// Identifier at an index
    pub fn id(&self, idx: usize) -> &UnitId {
        &self.ids[idx]
    }

    /// Centroid at an index
    pub fn coord(&self, idx: usize) -> [f64; 2] {
        self.coords[idx]
    }

    /// Distance between two coordinates in this system
    #[inline]
    pub fn distance(&self, a: [f64; 2], b: [f64; 2]) -> f64 {
        self.system.distance(a, b)
    }

    /// Distance between two indexed units
    #[inline]
    pub fn pairwise(&self, i: usize, j: usize) -> f64 {
        self.distance(self.coords[i], self.coords[j])
    }

    /// Displace a coordinate by a local step in distance units
    pub fn offset(&self, coord: [f64; 2], dx: f64, dy: f64) -> [f64; 2] {
        self.system.offset(coord, dx, dy)
    }

    /// Units within `radius` of `query`, as (index, distance) sorted by index
    pub fn within(&self, query: [f64; 2], radius: f64) -> Vec<(usize, f64)> {
        let mut hits = match self.system {
            CoordinateSystem::Projected => {
                let lo = query[0] - radius;
                let hi = query[0] + radius;
                let start = self.by_x.partition_point(|&i| self.coords[i][0] < lo);
                self.by_x[start..]
                    .iter()
                    .take_while(|&&i| self.coords[i][0] <= hi)
                    .filter_map(|&i| {
                        let d = self.distance(query, self.coords[i]);
                        (d <= radius).then_some((i, d))
                    })
                    .collect::<Vec<_>>()
            }
            CoordinateSystem::Geographic => self
                .coords
                .iter()
                .enumerate()
                .filter_map(|(i, &c)| {
                    let d = self.distance(query, c);
                    (d <= radius).then_some((i, d))
                })
                .collect(),
        };
        hits.sort_by_key(|&(i, _)| i);
        hits
    }

    /// The `k` nearest units to `query`, sorted by distance then index
    pub fn nearest(&self, query: [f64; 2], k: usize) -> Vec<(usize, f64)> {
        let mut all: Vec<(usize, f64)> = self
            .coords
            .iter()
            .enumerate()
            .map(|(i, &c)| (i, self.distance(query, c)))
            .collect();
        all.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        all.truncate(k);
        all
    }

    /// Full pairwise distance matrix
    /// Uses parallel computation when 'parallel' feature is enabled
    pub fn pairwise_distances(&self) -> Vec<Vec<f64>> {
        let n = self.len();

        #[cfg(feature = "parallel")]
        {
            (0..n)
                .into_par_iter()
                .map(|i| (0..n).map(|j| self.pairwise(i, j)).collect())
                .collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            (0..n)
                .map(|i| (0..n).map(|j| self.pairwise(i, j)).collect())
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize) -> Vec<Unit> {
        let mut units = Vec::new();
        for i in 0..n {
            for j in 0..n {
                units.push(Unit::new(format!("u{}_{}", i, j), i as f64, j as f64));
            }
        }
        units
    }

    #[test]
    fn test_within_matches_brute_force() {
        let index = SpatialIndex::new(&grid(5), CoordinateSystem::Projected).unwrap();
        let query = [2.2, 1.7];
        let hits = index.within(query, 1.5);

        let brute: Vec<usize> = (0..index.len())
            .filter(|&i| index.distance(query, index.coord(i)) <= 1.5)
            .collect();
        let got: Vec<usize> = hits.iter().map(|&(i, _)| i).collect();
        assert_eq!(got, brute);
    }

    #[test]
    fn test_nearest_orders_by_distance() {
        let index = SpatialIndex::new(&grid(3), CoordinateSystem::Projected).unwrap();
        let nearest = index.nearest([0.1, 0.0], 3);
        assert_eq!(index.id(nearest[0].0).as_str(), "u0_0");
        assert!(nearest[0].1 <= nearest[1].1);
        assert!(nearest[1].1 <= nearest[2].1);
    }

    #[test]
    fn test_duplicate_unit_rejected() {
        let units = vec![Unit::new("a", 0.0, 0.0), Unit::new("a", 1.0, 1.0)];
        let err = SpatialIndex::new(&units, CoordinateSystem::Projected).unwrap_err();
        assert!(matches!(err, InfoGeoError::DuplicateUnit { .. }));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(SpatialIndex::new(&[], CoordinateSystem::Projected).is_err());
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        let d = CoordinateSystem::Geographic.distance([0.0, 0.0], [0.0, 1.0]);
        assert!((d - KM_PER_DEGREE).abs() < 1e-6);
    }

    #[test]
    fn test_geographic_offset_round_trip() {
        let system = CoordinateSystem::Geographic;
        let origin = [-87.6, 41.9];
        let moved = system.offset(origin, 3.0, 4.0);
        let d = system.distance(origin, moved);
        assert!((d - 5.0).abs() < 1e-2);
    }

    #[test]
    fn test_pairwise_distances_symmetric() {
        let index = SpatialIndex::new(&grid(3), CoordinateSystem::Projected).unwrap();
        let d = index.pairwise_distances();
        for i in 0..index.len() {
            assert_eq!(d[i][i], 0.0);
            for j in 0..index.len() {
                assert_eq!(d[i][j], d[j][i]);
            }
        }
    }
}
