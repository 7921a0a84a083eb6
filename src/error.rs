use std::time::Duration;

use thiserror::Error;

/// Errors raised while building, solving, or extracting a planning window.
///
/// Every variant is terminal for the window that produced it. The rolling
/// driver stops at the first error and keeps what it already committed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OptimizerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Length mismatch: {field} has {actual} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Problem is infeasible")]
    Infeasible,

    /// Indicates a modelling defect (a variable without an upper bound), not bad data.
    #[error("Problem is unbounded")]
    Unbounded,

    #[error("Solver exceeded its {0:?} time limit without a feasible assignment")]
    TimedOut(Duration),

    #[error("Solver failure: {0}")]
    Solver(String),
}

impl OptimizerError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Get the error type string
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::LengthMismatch { .. } => "LengthMismatchError",
            Self::Infeasible => "InfeasibleError",
            Self::Unbounded => "UnboundedError",
            Self::TimedOut(_) => "TimeoutError",
            Self::Solver(_) => "SolverError",
        }
    }
}

pub type Result<T, E = OptimizerError> = std::result::Result<T, E>;
