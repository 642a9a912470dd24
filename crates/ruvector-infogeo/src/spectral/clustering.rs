//! Spectral Clustering
//!
//! Bottom-k Laplacian eigenvectors as an embedding, then k-means with
//! seeded k-means++ restarts. The lowest-inertia restart wins; ties go to
//! the lower restart index.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::affinity::{Laplacian, Spectrum};
use crate::error::{AnalysisWarning, InfoGeoError, Result};
use crate::types::ClusterAssignment;
use crate::utils::{argsort, dot, norm, squared_euclidean, EPS, ZERO_EIGEN_TOL};

/// Columns whose |cos| with an already selected column exceeds this are duplicates
const PARALLEL_COS: f64 = 1.0 - 1e-9;

/// Spectral clustering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    /// Number of clusters
    pub k: usize,
    /// Independent k-means restarts
    pub restarts: usize,
    /// Lloyd iterations per restart
    pub max_iter: usize,
    /// Base seed; restart r uses `seed + r`
    pub seed: u64,
    /// Centroid shift below which a restart has converged
    pub tolerance: f64,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            k: 2,
            restarts: 10,
            max_iter: 300,
            seed: 42,
            tolerance: 1e-10,
        }
    }
}

impl SpectralConfig {
    /// Config with `k` clusters and defaults otherwise
    pub fn with_k(k: usize) -> Self {
        Self {
            k,
            ..Default::default()
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(InfoGeoError::invalid_parameter("k", "must be at least 1"));
        }
        if self.restarts == 0 {
            return Err(InfoGeoError::invalid_parameter(
                "restarts",
                "must be at least 1",
            ));
        }
        if self.max_iter == 0 {
            return Err(InfoGeoError::invalid_parameter(
                "max_iter",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Outcome of one spectral clustering call
#[derive(Debug, Clone)]
pub struct SpectralResult {
    /// Labels 1..=k aligned with the Laplacian nodes
    pub assignment: ClusterAssignment,
    /// All Laplacian eigenvalues, ascending
    pub eigenvalues: Vec<f64>,
    /// Per-node embedding rows
    pub embedding: Vec<Vec<f64>>,
    /// Within-cluster sum of squares of the winning restart
    pub inertia: f64,
    /// Index of the winning restart
    pub best_restart: usize,
    /// Number of (numerically) zero eigenvalues
    pub zero_multiplicity: usize,
    /// Non-fatal diagnostics
    pub warnings: Vec<AnalysisWarning>,
}

impl SpectralResult {
    /// Successive eigenvalue gaps λᵢ₊₁ − λᵢ
    pub fn eigengaps(&self) -> Vec<f64> {
        self.eigenvalues.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Advisory k from the eigengap heuristic
    pub fn suggested_k(&self, max_k: usize) -> usize {
        suggest_k(&self.eigenvalues, max_k)
    }
}

/// k with the largest gap `λ_k − λ_{k−1}` among the first `max_k + 1` eigenvalues
///
/// Advisory only; ties go to the smaller k.
pub fn suggest_k(eigenvalues: &[f64], max_k: usize) -> usize {
    let limit = max_k.min(eigenvalues.len().saturating_sub(1));
    let mut best = (1, f64::NEG_INFINITY);
    for k in 1..=limit {
        let gap = eigenvalues[k] - eigenvalues[k - 1];
        if gap > best.1 {
            best = (k, gap);
        }
    }
    best.0
}

/// One k-means restart
#[derive(Debug, Clone)]
struct Restart {
    labels: Vec<usize>,
    inertia: f64,
}

/// Spectral clustering over a graph Laplacian
#[derive(Debug, Clone)]
pub struct SpectralClusterer {
    config: SpectralConfig,
}

impl SpectralClusterer {
    /// Create with configuration
    pub fn new(config: SpectralConfig) -> Self {
        Self { config }
    }

    /// Create with just number of clusters
    pub fn with_k(k: usize) -> Self {
        Self::new(SpectralConfig::with_k(k))
    }

    /// Configuration
    pub fn config(&self) -> &SpectralConfig {
        &self.config
    }

    /// Cluster the Laplacian's nodes into `k` groups
    pub fn cluster(&self, laplacian: &Laplacian) -> Result<SpectralResult> {
        self.config.validate()?;
        let n = laplacian.len();
        let k = self.config.k;
        if n == 0 {
            return Err(InfoGeoError::empty_input("laplacian"));
        }
        if k > n {
            return Err(InfoGeoError::invalid_parameter(
                "k",
                format!("{} clusters requested for {} nodes", k, n),
            ));
        }

        let spectrum = laplacian.spectrum()?;
        let scale = spectrum.values.iter().fold(1.0f64, |m, v| m.max(v.abs()));
        let zero_multiplicity = spectrum
            .values
            .iter()
            .filter(|v| v.abs() <= ZERO_EIGEN_TOL * scale)
            .count();

        let mut warnings = Vec::new();
        if zero_multiplicity > 1 {
            warn!(components = zero_multiplicity, "affinity graph is disconnected");
            warnings.push(AnalysisWarning::DisconnectedGraph {
                components: zero_multiplicity,
            });
        }

        let embedding = embed(&spectrum, k);
        let (best_restart, best) = self.best_of_restarts(&embedding, k)?;
        let assignment = ClusterAssignment::from_groups(laplacian.nodes().to_vec(), &best.labels)?;
        warnings.extend(shortfall(k, assignment.k()));

        debug!(
            nodes = n,
            k,
            found = assignment.k(),
            inertia = best.inertia,
            best_restart,
            "spectral clustering done"
        );

        Ok(SpectralResult {
            assignment,
            eigenvalues: spectrum.values,
            embedding,
            inertia: best.inertia,
            best_restart,
            zero_multiplicity,
            warnings,
        })
    }

    /// Run every restart and keep the lowest inertia
    /// Uses parallel computation when 'parallel' feature is enabled
    fn best_of_restarts(&self, embedding: &[Vec<f64>], k: usize) -> Result<(usize, Restart)> {
        #[cfg(feature = "parallel")]
        let runs: Vec<Result<Restart>> = (0..self.config.restarts)
            .into_par_iter()
            .map(|r| self.kmeans(embedding, k, r))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let runs: Vec<Result<Restart>> = (0..self.config.restarts)
            .map(|r| self.kmeans(embedding, k, r))
            .collect();

        let mut best: Option<(usize, Restart)> = None;
        let mut last_error = None;
        for (r, run) in runs.into_iter().enumerate() {
            match run {
                Ok(restart) => {
                    let better = best
                        .as_ref()
                        .map_or(true, |(_, b)| restart.inertia < b.inertia);
                    if better {
                        best = Some((r, restart));
                    }
                }
                Err(err) => {
                    warn!(restart = r, %err, "k-means restart discarded");
                    last_error = Some(err);
                }
            }
        }

        match (best, last_error) {
            (Some(best), _) => Ok(best),
            (None, Some(err)) => Err(err),
            (None, None) => Err(InfoGeoError::empty_input("k-means restarts")),
        }
    }

    /// Lloyd iterations from a k-means++ start
    fn kmeans(&self, points: &[Vec<f64>], k: usize, restart: usize) -> Result<Restart> {
        let n = points.len();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_add(restart as u64));
        let mut centroids = kmeans_plusplus(points, k, &mut rng);
        let mut labels = vec![usize::MAX; n];

        for iteration in 1..=self.config.max_iter {
            let mut changed = false;
            for (i, point) in points.iter().enumerate() {
                let nearest = nearest_centroid(point, &centroids);
                if labels[i] != nearest {
                    labels[i] = nearest;
                    changed = true;
                }
            }

            let updated = update_centroids(points, &labels, centroids.len());
            let shift = centroids
                .iter()
                .zip(&updated)
                .map(|(a, b)| squared_euclidean(a, b))
                .fold(0.0f64, f64::max)
                .sqrt();
            centroids = updated;

            if !changed || shift <= self.config.tolerance {
                let inertia = points
                    .iter()
                    .zip(&labels)
                    .map(|(p, &c)| squared_euclidean(p, &centroids[c]))
                    .sum();
                return Ok(Restart { labels, inertia });
            }

            if iteration == self.config.max_iter {
                return Err(InfoGeoError::convergence_failure(
                    "kmeans",
                    self.config.max_iter,
                    shift,
                ));
            }
        }

        // max_iter >= 1, so the loop always returns
        Err(InfoGeoError::convergence_failure("kmeans", 0, f64::NAN))
    }
}

/// Node rows of the bottom-k eigenvectors, skipping duplicate directions
fn embed(spectrum: &Spectrum, k: usize) -> Vec<Vec<f64>> {
    let n = spectrum.vectors.nrows();
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(k);

    for c in 0..spectrum.vectors.ncols() {
        if columns.len() == k {
            break;
        }
        let candidate: Vec<f64> = spectrum.vectors.column(c).iter().copied().collect();
        let len = norm(&candidate);
        if len <= EPS {
            continue;
        }
        let duplicate = columns
            .iter()
            .any(|kept| (dot(kept, &candidate) / (norm(kept) * len)).abs() > PARALLEL_COS);
        if !duplicate {
            columns.push(candidate);
        }
    }

    (0..n)
        .map(|i| columns.iter().map(|col| col[i]).collect())
        .collect()
}

/// k-means++ seeding: first centroid uniform, then proportional to D²
fn kmeans_plusplus(points: &[Vec<f64>], k: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut centroids: Vec<Vec<f64>> = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..n)].clone());

    for _ in 1..k {
        let weights: Vec<f64> = points
            .iter()
            .map(|p| {
                centroids
                    .iter()
                    .map(|c| squared_euclidean(p, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();

        let chosen = if total <= EPS {
            rng.gen_range(0..n)
        } else {
            let threshold = rng.gen::<f64>() * total;
            let mut cumsum = 0.0;
            let mut chosen = n - 1;
            for (i, &w) in weights.iter().enumerate() {
                cumsum += w;
                if w > 0.0 && cumsum >= threshold {
                    chosen = i;
                    break;
                }
            }
            chosen
        };
        centroids.push(points[chosen].clone());
    }

    centroids
}

fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let d = squared_euclidean(point, centroid);
        if d < best_dist {
            best_dist = d;
            best = c;
        }
    }
    best
}

/// Warning for an assignment with fewer labels than requested
fn shortfall(requested: usize, found: usize) -> Option<AnalysisWarning> {
    if found >= requested {
        return None;
    }
    warn!(requested, found, "k-means produced fewer clusters than requested");
    Some(AnalysisWarning::FewerClusters { requested, found })
}

/// Recompute centroids
///
/// Empty clusters are reseeded at the points farthest from their own
/// centroids, one distinct point per empty cluster.
fn update_centroids(points: &[Vec<f64>], labels: &[usize], k: usize) -> Vec<Vec<f64>> {
    let dim = points.first().map_or(0, Vec::len);
    let mut sums = vec![vec![0.0; dim]; k];
    let mut counts = vec![0usize; k];

    for (point, &c) in points.iter().zip(labels) {
        counts[c] += 1;
        for (s, &x) in sums[c].iter_mut().zip(point) {
            *s += x;
        }
    }

    let mut centroids: Vec<Option<Vec<f64>>> = sums
        .into_iter()
        .zip(counts)
        .map(|(sum, count)| {
            (count > 0).then(|| sum.into_iter().map(|s| s / count as f64).collect())
        })
        .collect();

    if centroids.iter().any(Option::is_none) {
        let closeness: Vec<f64> = points
            .iter()
            .zip(labels)
            .map(|(p, &c)| centroids[c].as_ref().map_or(0.0, |m| -squared_euclidean(p, m)))
            .collect();
        let mut farthest = argsort(&closeness).into_iter();
        for slot in centroids.iter_mut().filter(|c| c.is_none()) {
            *slot = farthest.next().map(|i| points[i].clone());
        }
    }

    centroids
        .into_iter()
        .map(|c| c.unwrap_or_else(|| vec![0.0; dim]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeKind, InfoEdge, InformationGraph};
    use crate::spectral::AffinityMatrix;
    use crate::types::NodeKey;

    /// Two triangles joined by one long (low-affinity) edge
    fn two_cliques() -> Laplacian {
        let edges: Vec<InfoEdge> = [
            (0, 1, 0.1),
            (0, 2, 0.1),
            (1, 2, 0.1),
            (3, 4, 0.1),
            (3, 5, 0.1),
            (4, 5, 0.1),
            (2, 3, 3.0),
        ]
        .into_iter()
        .map(|(source, target, distance)| InfoEdge {
            source,
            target,
            distance,
            kind: EdgeKind::Spatial,
        })
        .collect();
        let nodes = (0..6).map(|i| NodeKey::spatial(format!("n{}", i))).collect();
        let graph = InformationGraph::from_parts(nodes, vec![vec![1.0]; 6], edges).unwrap();
        Laplacian::random_walk(&AffinityMatrix::from_graph(&graph, 1.0).unwrap())
    }

    #[test]
    fn test_two_cliques_separate() {
        let result = SpectralClusterer::with_k(2).cluster(&two_cliques()).unwrap();
        assert_eq!(result.assignment.labels(), &[1, 1, 1, 2, 2, 2]);
        assert_eq!(result.assignment.sizes(), vec![3, 3]);
        assert_eq!(result.zero_multiplicity, 1);
        assert!(result.warnings.is_empty());
        assert_eq!(result.suggested_k(4), 2);
    }

    #[test]
    fn test_single_cluster() {
        let result = SpectralClusterer::with_k(1).cluster(&two_cliques()).unwrap();
        assert_eq!(result.assignment.k(), 1);
        assert!(result.assignment.labels().iter().all(|&l| l == 1));
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let laplacian = two_cliques();
        let config = SpectralConfig {
            k: 3,
            restarts: 4,
            seed: 7,
            ..Default::default()
        };
        let a = SpectralClusterer::new(config.clone()).cluster(&laplacian).unwrap();
        let b = SpectralClusterer::new(config).cluster(&laplacian).unwrap();
        assert_eq!(a.assignment, b.assignment);
        assert_eq!(a.best_restart, b.best_restart);
        assert_eq!(a.inertia, b.inertia);
    }

    #[test]
    fn test_too_many_clusters() {
        let err = SpectralClusterer::with_k(7).cluster(&two_cliques()).unwrap_err();
        assert!(matches!(err, InfoGeoError::InvalidParameter { .. }));
    }

    #[test]
    fn test_empty_cluster_reseeded_at_farthest_point() {
        let points = vec![vec![0.0], vec![0.0], vec![1.0], vec![10.0]];
        let centroids = update_centroids(&points, &[0, 0, 0, 0], 3);
        assert_eq!(centroids, vec![vec![2.75], vec![10.0], vec![0.0]]);
    }

    #[test]
    fn test_identical_points_report_shortfall() {
        let points = vec![vec![0.5, 0.5]; 4];
        let restart = SpectralClusterer::with_k(3).kmeans(&points, 3, 0).unwrap();
        assert!(restart.labels.iter().all(|&l| l == restart.labels[0]));

        assert_eq!(
            shortfall(3, 1),
            Some(AnalysisWarning::FewerClusters {
                requested: 3,
                found: 1
            })
        );
        assert_eq!(shortfall(2, 2), None);
    }

    #[test]
    fn test_suggest_k() {
        assert_eq!(suggest_k(&[0.0, 0.0, 0.0, 0.9, 1.0], 4), 3);
        assert_eq!(suggest_k(&[0.0, 0.5, 0.6], 1), 1);
        assert_eq!(suggest_k(&[0.0], 5), 1);
    }

    #[test]
    fn test_config_validation() {
        assert!(SpectralConfig::with_k(0).validate().is_err());
        let config = SpectralConfig {
            restarts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
