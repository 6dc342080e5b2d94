// core/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WaypointError {
  #[error("Step not found in flow '{flow}': {step_name}")]
  StepNotFound { flow: String, step_name: String },

  #[error("Required step '{step_name}' in flow '{flow}' has no handlers")]
  HandlerMissing { flow: String, step_name: String },

  #[error("No flow registered for context type {context_type}")]
  NotRegistered { context_type: String },

  #[error("Context type mismatch (expected {expected_type})")]
  TypeMismatch { expected_type: String },

  #[error("Handler failed. Source: {source}")]
  HandlerError {
    #[source]
    source: AnyhowError,
  },
}

impl From<AnyhowError> for WaypointError {
  fn from(err: AnyhowError) -> Self {
    WaypointError::HandlerError { source: err }
  }
}

pub type WaypointResult<T, E = WaypointError> = std::result::Result<T, E>;
