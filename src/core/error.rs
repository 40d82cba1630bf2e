//! Error types for volkit

use thiserror::Error;

/// Error taxonomy for the pricing and calibration routines.
///
/// All components fail fast and report the specific condition to the
/// immediate caller; nothing retries internally and no partial results are
/// returned on failure.
#[derive(Error, Debug)]
pub enum VolError {
    /// Malformed or out-of-domain input (non-positive spot/strike/maturity,
    /// zero path or step counts, parameters outside their admissible range).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Zero or ill-signed denominator/radicand: vanishing vega, degenerate
    /// Dupire denominator, negative local variance, diverging Newton iterate.
    #[error("numerical singularity: {0}")]
    Singularity(String),

    /// Iterative solver exhausted its iteration budget without meeting
    /// tolerance.
    #[error("no convergence after {iterations} iterations (residual {residual:.3e})")]
    Convergence { iterations: usize, residual: f64 },
}

pub type VolResult<T> = Result<T, VolError>;

impl VolError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn singularity(msg: impl Into<String>) -> Self {
        Self::Singularity(msg.into())
    }
}
