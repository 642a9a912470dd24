//! Dendrogram with information-loss heights

use serde::{Deserialize, Serialize};

use crate::error::{InfoGeoError, Result};
use crate::types::{ClusterAssignment, NodeKey};

/// One merge step
///
/// Ids follow the SciPy convention: leaves are `0..n`, merge `i` creates
/// cluster `n + i`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Merge {
    /// Smaller cluster id
    pub left: usize,
    /// Larger cluster id
    pub right: usize,
    /// Leaves under the new cluster
    pub size: usize,
    /// Information lost by this merge
    pub cost: f64,
    /// Cumulative information lost up to and including this merge
    pub height: f64,
}

/// Merge tree over graph nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dendrogram {
    leaves: Vec<NodeKey>,
    merges: Vec<Merge>,
    /// Information of the all-singletons partition relative to the reference
    total_information: f64,
}

impl Dendrogram {
    /// Start a dendrogram over `leaves`
    pub fn new(leaves: Vec<NodeKey>, total_information: f64) -> Self {
        Self {
            merges: Vec::with_capacity(leaves.len().saturating_sub(1)),
            leaves,
            total_information,
        }
    }

    /// Record a merge; returns the new cluster id
    pub(crate) fn push(&mut self, a: usize, b: usize, size: usize, cost: f64) -> usize {
        let height = self.merges.last().map_or(0.0, |m| m.height) + cost;
        self.merges.push(Merge {
            left: a.min(b),
            right: a.max(b),
            size,
            cost,
            height,
        });
        self.leaves.len() + self.merges.len() - 1
    }

    /// Leaf nodes, in id order
    pub fn leaves(&self) -> &[NodeKey] {
        &self.leaves
    }

    /// Number of leaves
    pub fn n_leaves(&self) -> usize {
        self.leaves.len()
    }

    /// Merge steps, in order
    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    /// Information of the finest partition
    pub fn total_information(&self) -> f64 {
        self.total_information
    }

    /// Cumulative loss after each merge
    pub fn heights(&self) -> Vec<f64> {
        self.merges.iter().map(|m| m.height).collect()
    }

    /// Loss accumulated by the first `steps` merges
    fn loss_after(&self, steps: usize) -> f64 {
        if steps == 0 {
            0.0
        } else {
            self.merges[steps - 1].height
        }
    }

    fn check_k(&self, k: usize) -> Result<()> {
        let n = self.n_leaves();
        if k == 0 || k > n {
            return Err(InfoGeoError::invalid_parameter(
                "k",
                format!("must lie in 1..={}, got {}", n, k),
            ));
        }
        if n - k > self.merges.len() {
            return Err(InfoGeoError::invalid_parameter(
                "k",
                format!("dendrogram stops at {} clusters", n - self.merges.len()),
            ));
        }
        Ok(())
    }

    /// Cut into exactly `k` clusters, labelled 1..=k
    pub fn cutree(&self, k: usize) -> Result<ClusterAssignment> {
        self.check_k(k)?;
        let n = self.n_leaves();
        let steps = n - k;

        let mut parent: Vec<usize> = (0..n + steps).collect();
        for (i, merge) in self.merges[..steps].iter().enumerate() {
            parent[merge.left] = n + i;
            parent[merge.right] = n + i;
        }
        let root = |mut x: usize| {
            while parent[x] != x {
                x = parent[x];
            }
            x
        };
        let groups: Vec<usize> = (0..n).map(root).collect();

        ClusterAssignment::from_groups(self.leaves.clone(), &groups)
    }

    /// Information kept by the k-cluster cut relative to the single root
    ///
    /// Equals the loss of the last `k - 1` merges.
    pub fn information_retained(&self, k: usize) -> Result<f64> {
        self.check_k(k)?;
        let n = self.n_leaves();
        let total_loss = self.loss_after(self.merges.len());
        Ok(total_loss - self.loss_after(n - k))
    }

    /// Information captured by a k-cluster cut: `height[last] - height[last - k]`
    ///
    /// Heights are the cumulative losses, indexed from zero, with
    /// `height[-1] = 0`. Valid for `k` in `1..=merges().len()`.
    pub fn information_captured(&self, k: usize) -> Result<f64> {
        let steps = self.merges.len();
        if k == 0 || k > steps {
            return Err(InfoGeoError::invalid_parameter(
                "k",
                format!("must lie in 1..={}, got {}", steps, k),
            ));
        }
        Ok(self.loss_after(steps) - self.loss_after(steps - k))
    }

    /// `(k, information_captured(k))` for every k from 1 to the merge count
    pub fn information_curve(&self) -> Vec<(usize, f64)> {
        let steps = self.merges.len();
        let total_loss = self.loss_after(steps);
        (1..=steps)
            .map(|k| (k, total_loss - self.loss_after(steps - k)))
            .collect()
    }
}
