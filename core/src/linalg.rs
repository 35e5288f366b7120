//! Linear algebra helpers for Gaussian belief densities.
//!
//! Public API:
//!     pub fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64>
//!     pub fn robust_cholesky(a: &DMatrix<f64>, opt: SolveOptions) -> Option<Cholesky<f64, Dyn>>
//!     pub fn gaussian_log_density(residual: &DVector<f64>, covariance: &DMatrix<f64>) -> Result<f64>
//!
//! Strategy:
//! 1) Symmetrize P ← 0.5 (P + Pᵀ)
//! 2) Cholesky
//! 3) Jittered Cholesky (geometric ramp)
//!
//! Covariances produced by projecting a 2-D road belief into the 4-D ground frame are rank
//! deficient before observation noise is added, so the jitter ramp matters in practice.

use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector, Dyn};

use crate::error::{Result, TrackingError};

const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Symmetrize a matrix: P ← 0.5 (P + Pᵀ)
///
/// Simple matrix symmetrization function that reduces round-off errors associated
/// with floating point arithmetic.
#[inline]
pub fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    0.5 * (m + m.transpose())
}

#[derive(Debug, Clone, Copy)]
pub struct SolveOptions {
    pub initial_jitter: f64, // e.g., 1e-12
    pub max_jitter: f64,     // e.g., 1e-6
    pub max_tries: usize,    // e.g., 6
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            initial_jitter: 1e-12,
            max_jitter: 1e-6,
            max_tries: 6,
        }
    }
}

/// Cholesky factorization of an SPD-ish matrix with jitter retries.
///
/// The matrix is symmetrized first. If plain Cholesky fails, a growing multiple of the
/// identity is added to the diagonal until the factorization succeeds or `max_jitter`
/// is exceeded. Returns `None` if all attempts fail.
pub fn robust_cholesky(a: &DMatrix<f64>, opt: SolveOptions) -> Option<Cholesky<f64, Dyn>> {
    if !a.is_square() {
        return None;
    }
    let a_sym = symmetrize(a);
    if let Some(ch) = Cholesky::new(a_sym.clone()) {
        return Some(ch);
    }
    let n = a_sym.nrows();
    let mut jitter = opt.initial_jitter;
    for _ in 0..opt.max_tries {
        let mut a_j = a_sym.clone();
        for i in 0..n {
            a_j[(i, i)] += jitter;
        }
        if let Some(ch) = Cholesky::new(a_j) {
            return Some(ch);
        }
        jitter *= 10.0;
        if jitter > opt.max_jitter {
            break;
        }
    }
    None
}

/// Log-density of a zero-mean multivariate normal evaluated at `residual`.
///
/// $$
/// \ln \mathcal{N}(r; 0, \Sigma) = -\tfrac{1}{2}\left(k \ln 2\pi + \ln|\Sigma| + r^T \Sigma^{-1} r\right)
/// $$
///
/// # Errors
/// `InvalidArgument` if the shapes disagree or the covariance cannot be factored even
/// after jitter.
pub fn gaussian_log_density(residual: &DVector<f64>, covariance: &DMatrix<f64>) -> Result<f64> {
    if covariance.nrows() != residual.len() || !covariance.is_square() {
        return Err(TrackingError::invalid(format!(
            "covariance of shape {:?} does not match a residual of length {}",
            covariance.shape(),
            residual.len()
        )));
    }
    let ch = robust_cholesky(covariance, SolveOptions::default())
        .ok_or_else(|| TrackingError::invalid("covariance is not positive definite"))?;
    let log_det: f64 = 2.0 * ch.l().diagonal().iter().map(|d| d.ln()).sum::<f64>();
    let mahalanobis = residual.dot(&ch.solve(residual));
    Ok(-0.5 * (residual.len() as f64 * LN_2PI + log_det + mahalanobis))
}

/* =============================== Tests ==================================== */
