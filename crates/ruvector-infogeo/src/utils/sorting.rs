//! Ordering helpers for floating point keys

use std::cmp::Ordering;

/// Argsort: returns indices that would sort the array ascending
///
/// Ties keep index order, so the result is deterministic.
pub fn argsort(data: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..data.len()).collect();
    indices.sort_by(|&a, &b| data[a].total_cmp(&data[b]).then(a.cmp(&b)));
    indices
}

/// Min-heap entry keyed by cost, ties broken by the (a, b) pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostKey {
    /// Cost to minimize
    pub cost: f64,
    /// First identifier
    pub a: usize,
    /// Second identifier
    pub b: usize,
}

impl Eq for CostKey {}

impl Ord for CostKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so that std's max-heap pops the smallest cost
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.a.cmp(&self.a))
            .then_with(|| other.b.cmp(&self.b))
    }
}

impl PartialOrd for CostKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
