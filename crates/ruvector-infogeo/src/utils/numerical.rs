//! Numerical utility functions

use super::{EPS, PROB_FLOOR};

/// Dot product of two vectors
#[inline]
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y.iter()).map(|(&a, &b)| a * b).sum()
}

/// Euclidean norm of a vector
#[inline]
pub fn norm(x: &[f64]) -> f64 {
    dot(x, x).sqrt()
}

/// Squared Euclidean distance
#[inline]
pub fn squared_euclidean(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y.iter()).map(|(&a, &b)| (a - b).powi(2)).sum()
}

/// Running sums along the category axis
pub fn cumulative(x: &[f64]) -> Vec<f64> {
    let mut acc = 0.0;
    x.iter()
        .map(|&v| {
            acc += v;
            acc
        })
        .collect()
}

/// Normalize non-negative counts to a probability vector
///
/// Returns `None` when the counts carry no mass.
pub fn normalize_counts(counts: &[f64]) -> Option<Vec<f64>> {
    let total: f64 = counts.iter().sum();
    if total <= EPS {
        None
    } else {
        Some(counts.iter().map(|&c| c / total).collect())
    }
}

/// Add a pseudo-count to every category, then normalize
pub fn smoothed_distribution(counts: &[f64], pseudo_count: f64) -> Option<Vec<f64>> {
    let shifted: Vec<f64> = counts.iter().map(|&c| c + pseudo_count).collect();
    normalize_counts(&shifted)
}

/// KL divergence: D_KL(P || Q) = sum(P * log(P/Q))
///
/// Both P and Q must be probability distributions. Zero entries of Q are
/// floored at `PROB_FLOOR` so the result stays finite.
pub fn kl_divergence(p: &[f64], q: &[f64]) -> f64 {
    debug_assert_eq!(p.len(), q.len());

    p.iter()
        .zip(q.iter())
        .map(|(&pi, &qi)| {
            if pi <= 0.0 {
                0.0
            } else {
                pi * (pi / qi.max(PROB_FLOOR)).ln()
            }
        })
        .sum::<f64>()
        .max(0.0)
}

/// Population-weighted mixture of two distributions
pub fn mixture(p: &[f64], wp: f64, q: &[f64], wq: f64) -> Vec<f64> {
    let total = wp + wq;
    if total <= EPS {
        return p.to_vec();
    }
    p.iter()
        .zip(q.iter())
        .map(|(&a, &b)| (wp * a + wq * b) / total)
        .collect()
}

/// Sample variance (population form) of a slice
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cumulative() {
        assert_eq!(cumulative(&[1.0, 2.0, 3.0]), vec![1.0, 3.0, 6.0]);
    }

    #[test]
    fn test_normalize_counts() {
        let p = normalize_counts(&[1.0, 3.0]).unwrap();
        assert!((p[0] - 0.25).abs() < 1e-12);
        assert!(normalize_counts(&[0.0, 0.0]).is_none());
    }

    #[test]
    fn test_smoothed_distribution_of_zero_vector_is_uniform() {
        let p = smoothed_distribution(&[0.0, 0.0, 0.0, 0.0], 0.5).unwrap();
        for v in p {
            assert!((v - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_kl_divergence() {
        let p = vec![0.25, 0.25, 0.25, 0.25];
        let q = vec![0.25, 0.25, 0.25, 0.25];

        // KL divergence of identical distributions is 0
        assert!(kl_divergence(&p, &q).abs() < 1e-10);
    }

    #[test]
    fn test_kl_floor_keeps_result_finite() {
        let d = kl_divergence(&[1.0, 0.0], &[0.0, 1.0]);
        assert!(d.is_finite());
        assert!(d > 20.0);
    }

    #[test]
    fn test_mixture_weights() {
        let m = mixture(&[1.0, 0.0], 3.0, &[0.0, 1.0], 1.0);
        assert!((m[0] - 0.75).abs() < 1e-12);
        assert!((m[1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_variance() {
        assert!((variance(&[1.0, 3.0]) - 1.0).abs() < 1e-12);
        assert_eq!(variance(&[]), 0.0);
    }
}
