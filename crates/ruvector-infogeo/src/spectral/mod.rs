//! Spectral Methods for Information Graphs
//!
//! Edge divergences become affinities, affinities become a Laplacian, and
//! the Laplacian's low end becomes an embedding for k-means.
//!
//! ## Pipeline
//!
//! ```text
//! d_uv  ──►  A_uv = exp(-d_uv² / σ)  ──►  L = I − D⁻¹A  ──►  bottom-k eigvecs  ──►  k-means
//! ```
//!
//! ## Mathematical Background
//!
//! - The multiplicity of the zero eigenvalue of L equals the number of
//!   connected components of the affinity graph
//! - `L_rw = D^(-1/2) L_sym D^(1/2)`, so both share a spectrum and the
//!   symmetric solver can be used for the random-walk form
//! - Large gaps between consecutive eigenvalues hint at natural cluster
//!   counts (advisory only)

mod affinity;
mod clustering;

pub use affinity::{AffinityMatrix, Laplacian, LaplacianNorm, Spectrum, EIGEN_MAX_ITER};
pub use clustering::{suggest_k, SpectralClusterer, SpectralConfig, SpectralResult};
