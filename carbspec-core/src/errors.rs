use crate::activity::ModelKind;
use crate::equilibrium::{SolveStage, SpeciationResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for a failed speciation solve.
///
/// Numerical failures carry the solver's last estimate (tagged non-converged) so it can be
/// displayed for diagnosis. Such an estimate is never a converged result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error("Invalid input `{field}`: {reason}")]
    InvalidInput { field: String, reason: String },
    #[error("Activity model {model} is unavailable: {reason}")]
    ModelUnavailable { model: ModelKind, reason: String },
    #[error("No sign change in the charge-balance residual over pH [{low}, {high}]")]
    BracketInvalid {
        low: f64,
        high: f64,
        estimate: Box<SpeciationResult>,
    },
    #[error("The {stage} did not converge within {iterations} iterations")]
    ConvergenceFailed {
        stage: SolveStage,
        iterations: usize,
        estimate: Box<SpeciationResult>,
    },
}

impl SolveError {
    pub(crate) fn invalid_input(field: &str, reason: impl Into<String>) -> Self {
        SolveError::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// The non-converged estimate attached to a numerical failure.
    pub fn estimate(&self) -> Option<&SpeciationResult> {
        match self {
            SolveError::BracketInvalid { estimate, .. }
            | SolveError::ConvergenceFailed { estimate, .. } => Some(estimate),
            _ => None,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            SolveError::InvalidInput { .. } => FailureKind::InvalidInput,
            SolveError::ModelUnavailable { .. } => FailureKind::ModelUnavailable,
            SolveError::BracketInvalid { .. } => FailureKind::BracketInvalid,
            SolveError::ConvergenceFailed { .. } => FailureKind::ConvergenceFailed,
        }
    }
}

/// Convenience type for `Result<T, SolveError>`.
pub type SolveResult<T> = Result<T, SolveError>;

/// Coarse classification of a [`SolveError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    InvalidInput,
    ModelUnavailable,
    BracketInvalid,
    ConvergenceFailed,
}

/// Serializable record of a failed solve, kept in place of a result inside batch outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveFailure {
    pub kind: FailureKind,
    pub reason: String,
    /// Last non-converged estimate, for diagnostic display only.
    pub estimate: Option<Box<SpeciationResult>>,
}

impl From<SolveError> for SolveFailure {
    fn from(error: SolveError) -> Self {
        let reason = error.to_string();
        let kind = error.kind();
        let estimate = match error {
            SolveError::BracketInvalid { estimate, .. }
            | SolveError::ConvergenceFailed { estimate, .. } => Some(estimate),
            _ => None,
        };
        Self {
            kind,
            reason,
            estimate,
        }
    }
}
