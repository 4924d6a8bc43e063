//! Error types for Sage.
//!
//! A single error enum covers every failure category in the assistant:
//! configuration, I/O, the four collaborators behind the controller,
//! prompts and serialization.

use thiserror::Error;

/// Unified error type for Sage.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM transport and provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// The intent classifier could not produce a label
    #[error("Classification error: {0}")]
    Classification(String),

    /// The retrieval service could not answer a query or store documents
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Caller-supplied input violates a contract
    #[error("Validation error: {0}")]
    Validation(String),

    /// Image captioning failed (never escapes a captioner)
    #[error("Caption error: {0}")]
    Caption(String),

    /// Answer synthesis failed
    #[error("Answer error: {0}")]
    Answer(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Whether this error came from a collaborator of the controller or
    /// its transport. These are the failures `Controller::respond` absorbs.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            AppError::Llm(_)
                | AppError::Classification(_)
                | AppError::Retrieval(_)
                | AppError::Caption(_)
                | AppError::Answer(_)
                | AppError::Prompt(_)
                | AppError::Io(_)
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_failures() {
        assert!(AppError::Retrieval("index unavailable".into()).is_collaborator_failure());
        assert!(AppError::Answer("timeout".into()).is_collaborator_failure());
        assert!(AppError::Classification("bad model".into()).is_collaborator_failure());
        assert!(!AppError::Validation("empty query".into()).is_collaborator_failure());
        assert!(!AppError::Config("missing".into()).is_collaborator_failure());
        assert!(!AppError::Serialization("bad json".into()).is_collaborator_failure());
    }

    #[test]
    fn test_error_display() {
        let err = AppError::Validation("ids and texts differ in length".into());
        assert_eq!(
            err.to_string(),
            "Validation error: ids and texts differ in length"
        );
    }
}
