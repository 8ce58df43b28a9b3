//! Errors raised by belief arithmetic.

use thiserror::Error;

/// Failure modes of natural-parameter belief operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BeliefError {
    /// A division left a scalar belief with negative precision.
    #[error("division produced negative precision {precision:.6e}")]
    NegativePrecision { precision: f64 },

    /// A division left a precision matrix with a negative eigenvalue.
    #[error("precision matrix is not positive semidefinite (min eigenvalue {min_eigenvalue:.6e})")]
    NotPositiveSemidefinite { min_eigenvalue: f64 },

    /// Dividing a proper belief by a point mass has no density.
    #[error("cannot divide by a point mass")]
    PointMassDivision,

    /// Moments were requested from a belief whose precision is not positive definite.
    #[error("belief is improper and has no moments")]
    Improper,

    /// Two beliefs (or a belief and a direction) disagree on dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A projection named a coordinate outside the belief.
    #[error("index {index} out of range for dimension {dimension}")]
    IndexOutOfRange { index: usize, dimension: usize },
}

impl BeliefError {
    /// True when the error signals a loss of positive (semi-)definiteness.
    pub fn is_divergence(&self) -> bool {
        matches!(
            self,
            BeliefError::NegativePrecision { .. } | BeliefError::NotPositiveSemidefinite { .. }
        )
    }

    /// The offending precision (or smallest eigenvalue) of a divergence.
    pub fn divergent_precision(&self) -> Option<f64> {
        match self {
            BeliefError::NegativePrecision { precision } => Some(*precision),
            BeliefError::NotPositiveSemidefinite { min_eigenvalue } => Some(*min_eigenvalue),
            _ => None,
        }
    }
}
