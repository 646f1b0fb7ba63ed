//! Error types for analysis runs.

use crate::models::TaskKind;
use thiserror::Error;

/// A generation call failed or returned nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors that end an analysis run, or stop it from starting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// Input text was empty or whitespace only.
    #[error("input text is empty")]
    EmptyInput,

    /// The configuration enables no tasks.
    #[error("no analysis tasks are enabled")]
    NoTasksEnabled,

    /// The configuration breaks an invariant.
    #[error("invalid analysis configuration: {0}")]
    InvalidConfig(String),

    /// The generation backend failed. `task` is `None` in combined mode.
    #[error("{}", backend_message(.task, .source))]
    Backend {
        task: Option<TaskKind>,
        #[source]
        source: BackendError,
    },
}

fn backend_message(task: &Option<TaskKind>, source: &BackendError) -> String {
    match task {
        Some(task) => format!("{} task failed: {}", task, source),
        None => format!("combined analysis failed: {}", source),
    }
}

impl AnalysisError {
    /// Pre-flight errors are raised before any backend call.
    pub fn is_validation(&self) -> bool {
        !matches!(self, AnalysisError::Backend { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_message() {
        let err = AnalysisError::Backend {
            task: Some(TaskKind::Sentiment),
            source: BackendError::new("HTTP 503"),
        };
        assert_eq!(err.to_string(), "Sentiment task failed: HTTP 503");
        assert!(!err.is_validation());

        let combined = AnalysisError::Backend {
            task: None,
            source: BackendError::new("empty reply"),
        };
        assert_eq!(combined.to_string(), "combined analysis failed: empty reply");
    }

    #[test]
    fn test_validation_errors() {
        assert!(AnalysisError::EmptyInput.is_validation());
        assert!(AnalysisError::NoTasksEnabled.is_validation());
        assert_eq!(AnalysisError::EmptyInput.to_string(), "input text is empty");
    }
}
