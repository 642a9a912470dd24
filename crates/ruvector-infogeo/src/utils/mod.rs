//! Numerical and ordering helpers shared by the estimators

mod numerical;
mod sorting;

pub use numerical::*;
pub use sorting::*;

/// Small positive threshold for division guards
pub const EPS: f64 = 1e-12;

/// Probability floor used when a smoothed distribution is not available
pub const PROB_FLOOR: f64 = 1e-10;

/// Tolerance for treating an eigenvalue as zero
pub const ZERO_EIGEN_TOL: f64 = 1e-9;
