use thiserror::Error;

use crate::domain::{OperationState, TrainingStatus};

/// Errors raised by the optimization engine itself.
///
/// Storage and IO failures travel as plain `anyhow::Error`; these variants
/// are the ones callers are expected to match on (via `downcast_ref` when
/// they arrive wrapped in an `anyhow::Error`).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("model not trained for this location")]
    ModelNotTrained,

    #[error("no training data for HVAC {0} state")]
    NoTrainingData(OperationState),

    #[error("training failed: {0}")]
    TrainingFailure(String),

    #[error("invalid schedule length: expected {expected}, got {actual}")]
    InvalidScheduleLength { expected: usize, actual: usize },

    #[error("invalid starting time '{0}', expected DD/MM/YYYY HH:MM")]
    InvalidStartingTime(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("training history cannot move from {from} to {to}")]
    InvalidTransition { from: TrainingStatus, to: TrainingStatus },
}

impl EngineError {
    /// Stable machine-readable identifier for logs and API payloads
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::ModelNotTrained => "ModelNotTrained",
            EngineError::NoTrainingData(_) => "NoTrainingData",
            EngineError::TrainingFailure(_) => "TrainingFailure",
            EngineError::InvalidScheduleLength { .. } => "InvalidScheduleLength",
            EngineError::InvalidStartingTime(_) => "InvalidStartingTime",
            EngineError::InvalidRequest(_) => "InvalidRequest",
            EngineError::InvalidTransition { .. } => "InvalidTransition",
        }
    }

    /// Find an engine error anywhere in an `anyhow` chain
    pub fn find(error: &anyhow::Error) -> Option<&EngineError> {
        error.chain().find_map(|cause| cause.downcast_ref::<EngineError>())
    }
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        EngineError::InvalidRequest(errors.to_string())
    }
}
