//! Local metric tensor and its derived scalars

use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};

use crate::kernel::Bandwidth;
use crate::types::{CoordinateFrame, NodeKey};
use crate::utils::EPS;

/// Symmetric d×d metric in local (x, y[, t]) coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTensor {
    frame: CoordinateFrame,
    /// Row-major entries
    data: Vec<f64>,
}

impl MetricTensor {
    /// Zero tensor of a frame
    pub fn zeros(frame: CoordinateFrame) -> Self {
        let d = frame.dim();
        Self {
            frame,
            data: vec![0.0; d * d],
        }
    }

    /// Build from a raw (possibly asymmetric) estimate, averaging M and Mᵀ
    ///
    /// `0.5 * (a + b)` is evaluated identically for (i, j) and (j, i), so
    /// the result is exactly symmetric.
    pub fn from_raw(frame: CoordinateFrame, raw: &[Vec<f64>]) -> Self {
        let d = frame.dim();
        let mut data = vec![0.0; d * d];
        for i in 0..d {
            for j in 0..d {
                data[i * d + j] = 0.5 * (raw[i][j] + raw[j][i]);
            }
        }
        Self { frame, data }
    }

    fn from_matrix(frame: CoordinateFrame, m: &DMatrix<f64>) -> Self {
        let d = frame.dim();
        let raw: Vec<Vec<f64>> = (0..d).map(|i| (0..d).map(|j| m[(i, j)]).collect()).collect();
        Self::from_raw(frame, &raw)
    }

    /// Coordinate frame
    pub fn frame(&self) -> CoordinateFrame {
        self.frame
    }

    /// Dimension d
    pub fn dim(&self) -> usize {
        self.frame.dim()
    }

    /// Entry (i, j)
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.dim() + j]
    }

    /// Rows as nested vectors
    pub fn rows(&self) -> Vec<Vec<f64>> {
        let d = self.dim();
        (0..d).map(|i| self.data[i * d..(i + 1) * d].to_vec()).collect()
    }

    /// Copy into a nalgebra matrix
    pub fn as_matrix(&self) -> DMatrix<f64> {
        let d = self.dim();
        DMatrix::from_row_slice(d, d, &self.data)
    }

    /// Exact entrywise symmetry check
    pub fn is_symmetric(&self) -> bool {
        let d = self.dim();
        (0..d).all(|i| (0..d).all(|j| self.get(i, j) == self.get(j, i)))
    }

    /// True when every entry is finite
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    /// Sum of diagonal entries
    pub fn trace(&self) -> f64 {
        (0..self.dim()).map(|i| self.get(i, i)).sum()
    }

    /// Determinant
    pub fn determinant(&self) -> f64 {
        self.as_matrix().determinant()
    }

    /// Trace of the spatial (x, y) block
    pub fn spatial_trace(&self) -> f64 {
        self.get(0, 0) + self.get(1, 1)
    }

    /// Isolated (t, t) entry of a spatio-temporal tensor
    pub fn temporal_component(&self) -> Option<f64> {
        self.frame.is_temporal().then(|| self.get(2, 2))
    }

    /// Eigenvalues in ascending order
    pub fn eigenvalues(&self) -> Vec<f64> {
        let mut values: Vec<f64> = SymmetricEigen::new(self.as_matrix())
            .eigenvalues
            .iter()
            .copied()
            .collect();
        values.sort_by(|a, b| a.total_cmp(b));
        values
    }

    /// Project onto the PSD cone when an eigenvalue is negative beyond tolerance
    ///
    /// Returns the (possibly clamped) tensor, the smallest eigenvalue before
    /// clamping, and whether clamping happened. The tolerance is relative to
    /// the largest eigenvalue magnitude.
    pub fn clamp_negative(&self, relative_tolerance: f64) -> (Self, f64, bool) {
        if !self.is_finite() {
            return (self.clone(), f64::NAN, false);
        }
        let eigen = SymmetricEigen::new(self.as_matrix());
        let min = eigen.eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
        let scale = eigen.eigenvalues.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        let tolerance = relative_tolerance * scale.max(EPS);

        if min >= -tolerance {
            return (self.clone(), min, false);
        }

        let clamped = eigen.eigenvalues.map(|v| v.max(0.0));
        let rebuilt =
            &eigen.eigenvectors * DMatrix::from_diagonal(&clamped) * eigen.eigenvectors.transpose();
        (Self::from_matrix(self.frame, &rebuilt), min, true)
    }
}

/// Metric tensor estimated for one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTensor {
    /// Node the tensor belongs to
    pub key: NodeKey,
    /// Estimated tensor (PSD after clamping)
    pub tensor: MetricTensor,
    /// Whether a negative eigenvalue had to be clamped
    pub ill_conditioned: bool,
    /// Smallest eigenvalue before clamping
    pub min_eigenvalue: f64,
    /// Bandwidth actually used (after any smoothing-driven widening)
    pub bandwidth: Bandwidth,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_is_exactly_symmetric() {
        let raw = vec![vec![1.0, 0.1 + 0.2], vec![0.3, 2.0]];
        let m = MetricTensor::from_raw(CoordinateFrame::Spatial, &raw);
        assert!(m.is_symmetric());
        assert_eq!(m.get(0, 1), m.get(1, 0));
    }

    #[test]
    fn test_scalars() {
        let raw = vec![
            vec![2.0, 0.0, 0.0],
            vec![0.0, 3.0, 0.0],
            vec![0.0, 0.0, 4.0],
        ];
        let m = MetricTensor::from_raw(CoordinateFrame::SpatioTemporal, &raw);
        assert!((m.trace() - 9.0).abs() < 1e-12);
        assert!((m.determinant() - 24.0).abs() < 1e-9);
        assert!((m.spatial_trace() - 5.0).abs() < 1e-12);
        assert_eq!(m.temporal_component(), Some(4.0));
        assert_eq!(MetricTensor::zeros(CoordinateFrame::Spatial).temporal_component(), None);
    }

    #[test]
    fn test_clamp_negative_eigenvalue() {
        // Eigenvalues 3 and -1
        let raw = vec![vec![1.0, 2.0], vec![2.0, 1.0]];
        let m = MetricTensor::from_raw(CoordinateFrame::Spatial, &raw);
        let (clamped, min, flagged) = m.clamp_negative(1e-8);

        assert!(flagged);
        assert!((min + 1.0).abs() < 1e-9);
        assert!(clamped.is_symmetric());
        let eig = clamped.eigenvalues();
        assert!(eig[0] > -1e-9);
        assert!((eig[1] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_clamp_leaves_psd_untouched() {
        let raw = vec![vec![2.0, 0.5], vec![0.5, 1.0]];
        let m = MetricTensor::from_raw(CoordinateFrame::Spatial, &raw);
        let (same, _, flagged) = m.clamp_negative(1e-8);
        assert!(!flagged);
        assert_eq!(same, m);
    }
}
