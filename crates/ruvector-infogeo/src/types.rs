//! Core data model: units, node keys, coordinates and category count tables

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{InfoGeoError, Result};

/// Stable identifier of a spatial unit
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Create a unit identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UnitId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Graph / tensor node: a unit, optionally at one time period
///
/// Ordering is by unit id first, then period, which fixes node order in
/// every matrix built downstream.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    /// Spatial unit
    pub unit: UnitId,
    /// Time period index (None for purely spatial analyses)
    pub period: Option<i32>,
}

impl NodeKey {
    /// Node of a spatial-only analysis
    pub fn spatial(unit: impl Into<UnitId>) -> Self {
        Self {
            unit: unit.into(),
            period: None,
        }
    }

    /// Node of a unit at a given period
    pub fn temporal(unit: impl Into<UnitId>, period: i32) -> Self {
        Self {
            unit: unit.into(),
            period: Some(period),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.period {
            Some(t) => write!(f, "{}@{}", self.unit, t),
            None => write!(f, "{}", self.unit),
        }
    }
}

/// A spatial unit: identifier plus polygon centroid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Identifier
    pub id: UnitId,
    /// Centroid x (projected units, or longitude in degrees)
    pub x: f64,
    /// Centroid y (projected units, or latitude in degrees)
    pub y: f64,
}

impl Unit {
    /// Create a unit at a centroid
    pub fn new(id: impl Into<UnitId>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
        }
    }
}

/// Query coordinate in the analysis frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    /// x coordinate
    pub x: f64,
    /// y coordinate
    pub y: f64,
    /// Continuous time coordinate (period index), if temporal
    pub t: Option<f64>,
}

impl Coord {
    /// Planar coordinate
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, t: None }
    }

    /// Coordinate with a time component
    pub fn with_time(x: f64, y: f64, t: f64) -> Self {
        Self { x, y, t: Some(t) }
    }

    /// Spatial part as an array
    pub fn xy(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

/// Local coordinate frame of the metric tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateFrame {
    /// (x, y)
    Spatial,
    /// (x, y, t)
    SpatioTemporal,
}

impl CoordinateFrame {
    /// Resolve the frame from the temporal flag
    pub fn from_temporal(temporal: bool) -> Self {
        if temporal {
            Self::SpatioTemporal
        } else {
            Self::Spatial
        }
    }

    /// Tensor dimension
    pub fn dim(&self) -> usize {
        match self {
            Self::Spatial => 2,
            Self::SpatioTemporal => 3,
        }
    }

    /// Whether the frame carries a time axis
    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::SpatioTemporal)
    }
}

/// Ordered category labels shared by every count vector
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Categories {
    labels: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl TryFrom<Vec<String>> for Categories {
    type Error = InfoGeoError;

    fn try_from(labels: Vec<String>) -> Result<Self> {
        Self::new(labels)
    }
}

impl From<Categories> for Vec<String> {
    fn from(categories: Categories) -> Self {
        categories.labels
    }
}

impl Categories {
    /// Build from an ordered label list
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut categories = Self::default();
        for label in labels {
            let label = label.into();
            if categories.lookup.contains_key(&label) {
                return Err(InfoGeoError::invalid_parameter(
                    "categories",
                    format!("duplicate category '{}'", label),
                ));
            }
            categories.push(label);
        }
        Ok(categories)
    }

    fn push(&mut self, label: String) -> usize {
        let idx = self.labels.len();
        self.lookup.insert(label.clone(), idx);
        self.labels.push(label);
        idx
    }

    fn index_or_insert(&mut self, label: &str) -> usize {
        match self.lookup.get(label) {
            Some(&idx) => idx,
            None => self.push(label.to_string()),
        }
    }

    /// Position of a label on the category axis
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.lookup.get(label).copied()
    }

    /// Labels in axis order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of categories
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True when no categories are defined
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Non-negative category counts of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountVector(Vec<f64>);

impl CountVector {
    /// Validate and wrap counts; entries must be finite and non-negative
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if let Some((i, &v)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(InfoGeoError::invalid_count("<unnamed>", format!("#{}", i), v));
        }
        Ok(Self(values))
    }

    /// Counts in category order
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Number of categories
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for a zero-length vector
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total population
    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    /// True when the vector carries no mass
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0.0)
    }
}

/// One long-format input row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountRecord {
    /// Unit identifier
    pub unit: UnitId,
    /// Category label
    pub category: String,
    /// Non-negative count
    pub count: f64,
    /// Time period, if the data is temporal
    pub period: Option<i32>,
}

impl CountRecord {
    /// Row of a spatial-only table
    pub fn new(unit: impl Into<UnitId>, category: impl Into<String>, count: f64) -> Self {
        Self {
            unit: unit.into(),
            category: category.into(),
            count,
            period: None,
        }
    }

    /// Row at a time period
    pub fn at_period(mut self, period: i32) -> Self {
        self.period = Some(period);
        self
    }
}

/// Dense per-node count vectors over a shared category support
#[derive(Debug, Clone, PartialEq)]
pub struct CountTable {
    categories: Categories,
    entries: BTreeMap<NodeKey, CountVector>,
}

impl CountTable {
    /// Pivot long-format rows; categories are ordered by first appearance
    pub fn from_records(records: &[CountRecord]) -> Result<Self> {
        let mut categories = Categories::default();
        for record in records {
            categories.index_or_insert(&record.category);
        }
        Self::from_records_with_categories(categories, records)
    }

    /// Pivot long-format rows onto an explicit category order
    pub fn from_records_with_categories(
        categories: Categories,
        records: &[CountRecord],
    ) -> Result<Self> {
        if records.is_empty() {
            return Err(InfoGeoError::empty_input("count records"));
        }
        let temporal = records[0].period.is_some();
        let width = categories.len();
        let mut entries: BTreeMap<NodeKey, Vec<f64>> = BTreeMap::new();

        for record in records {
            if record.period.is_some() != temporal {
                return Err(InfoGeoError::invalid_parameter(
                    "records",
                    "rows mix timed and untimed observations",
                ));
            }
            if !record.count.is_finite() || record.count < 0.0 {
                return Err(InfoGeoError::invalid_count(
                    record.unit.as_str(),
                    record.category.as_str(),
                    record.count,
                ));
            }
            let idx = categories.index_of(&record.category).ok_or_else(|| {
                InfoGeoError::invalid_parameter(
                    "category",
                    format!("'{}' is not in the category axis", record.category),
                )
            })?;
            let key = NodeKey {
                unit: record.unit.clone(),
                period: record.period,
            };
            let row = entries.entry(key).or_insert_with(|| vec![0.0; width]);
            row[idx] += record.count;
        }

        Ok(Self {
            categories,
            entries: entries
                .into_iter()
                .map(|(k, v)| (k, CountVector(v)))
                .collect(),
        })
    }

    /// Build directly from dense vectors
    pub fn from_vectors(categories: Categories, rows: Vec<(NodeKey, Vec<f64>)>) -> Result<Self> {
        if rows.is_empty() {
            return Err(InfoGeoError::empty_input("count vectors"));
        }
        let temporal = rows[0].0.period.is_some();
        let mut entries = BTreeMap::new();
        for (key, values) in rows {
            if values.len() != categories.len() {
                return Err(InfoGeoError::dimension_mismatch(
                    categories.len(),
                    values.len(),
                ));
            }
            if key.period.is_some() != temporal {
                return Err(InfoGeoError::invalid_parameter(
                    "rows",
                    "rows mix timed and untimed observations",
                ));
            }
            for (i, &v) in values.iter().enumerate() {
                if !v.is_finite() || v < 0.0 {
                    return Err(InfoGeoError::invalid_count(
                        key.unit.as_str(),
                        categories.labels()[i].as_str(),
                        v,
                    ));
                }
            }
            if entries.insert(key.clone(), CountVector(values)).is_some() {
                return Err(InfoGeoError::invalid_parameter(
                    "rows",
                    format!("node {} given twice", key),
                ));
            }
        }
        Ok(Self {
            categories,
            entries,
        })
    }

    /// Category axis
    pub fn categories(&self) -> &Categories {
        &self.categories
    }

    /// Counts of a node
    pub fn get(&self, key: &NodeKey) -> Option<&CountVector> {
        self.entries.get(key)
    }

    /// Nodes and their counts in key order
    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, &CountVector)> {
        self.entries.iter()
    }

    /// Node keys in key order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeKey> {
        self.entries.keys()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether rows carry time periods
    pub fn is_temporal(&self) -> bool {
        self.entries.keys().next().map_or(false, |k| k.period.is_some())
    }

    /// Sorted distinct periods
    pub fn periods(&self) -> Vec<i32> {
        let set: BTreeSet<i32> = self.entries.keys().filter_map(|k| k.period).collect();
        set.into_iter().collect()
    }

    /// Sorted distinct units
    pub fn units(&self) -> Vec<UnitId> {
        let set: BTreeSet<&UnitId> = self.entries.keys().map(|k| &k.unit).collect();
        set.into_iter().cloned().collect()
    }

    /// Pooled counts over all nodes
    pub fn pooled_counts(&self) -> Vec<f64> {
        let mut pooled = vec![0.0; self.categories.len()];
        for counts in self.entries.values() {
            for (p, &c) in pooled.iter_mut().zip(counts.as_slice()) {
                *p += c;
            }
        }
        pooled
    }

    /// Pooled normalized distribution over all nodes
    pub fn global_distribution(&self) -> Result<Vec<f64>> {
        let pooled = self.pooled_counts();
        let total: f64 = pooled.iter().sum();
        if total <= 0.0 {
            return Err(InfoGeoError::degenerate_distribution(
                "pooled counts sum to zero",
            ));
        }
        Ok(pooled.into_iter().map(|c| c / total).collect())
    }
}

/// Cluster labels (1..=k) for an ordered set of nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    nodes: Vec<NodeKey>,
    labels: Vec<usize>,
    k: usize,
}

impl ClusterAssignment {
    /// Relabel arbitrary group ids to 1..=k in order of first appearance
    pub fn from_groups(nodes: Vec<NodeKey>, groups: &[usize]) -> Result<Self> {
        if nodes.len() != groups.len() {
            return Err(InfoGeoError::dimension_mismatch(nodes.len(), groups.len()));
        }
        let mut relabel: HashMap<usize, usize> = HashMap::new();
        let labels: Vec<usize> = groups
            .iter()
            .map(|&g| {
                let next = relabel.len() + 1;
                *relabel.entry(g).or_insert(next)
            })
            .collect();
        Ok(Self {
            nodes,
            labels,
            k: relabel.len(),
        })
    }

    /// Number of clusters
    pub fn k(&self) -> usize {
        self.k
    }

    /// Nodes, in label order
    pub fn nodes(&self) -> &[NodeKey] {
        &self.nodes
    }

    /// Labels aligned with `nodes()`
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Label of a node
    pub fn get(&self, key: &NodeKey) -> Option<usize> {
        self.nodes
            .iter()
            .position(|n| n == key)
            .map(|i| self.labels[i])
    }

    /// Nodes carrying label `c`
    pub fn members(&self, c: usize) -> Vec<&NodeKey> {
        self.nodes
            .iter()
            .zip(&self.labels)
            .filter(|(_, &l)| l == c)
            .map(|(n, _)| n)
            .collect()
    }

    /// Cluster sizes, index `c - 1` for label `c`
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &l in &self.labels {
            sizes[l - 1] += 1;
        }
        sizes
    }

    /// (node, label) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, usize)> {
        self.nodes.iter().zip(self.labels.iter().copied())
    }

    /// True when both assignments induce the same partition
    pub fn same_partition(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.labels == other.labels
    }
}
