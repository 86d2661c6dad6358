//! Error types for Docent.
//!
//! A single application-level error enum shared by the provider crates and the
//! CLI. The knowledge crate layers its own typed taxonomy on top of this and
//! converts in both directions.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for Docent.
///
/// Provider boundaries report timeouts and rate limits as dedicated variants so
/// callers can branch on them without inspecting messages.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM or embedding provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// The provider could not be reached at all
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// A provider call exceeded its deadline
    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: String,
        after: Duration,
    },

    /// The provider rejected the call because of rate limiting
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Knowledge base and RAG errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Build a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        AppError::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Whether retrying the same call could plausibly succeed.
    ///
    /// Only timeouts qualify; everything else needs caller opt-in.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Timeout { .. })
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
    fn test_timeout_display() {
        let err = AppError::timeout("embedding request", Duration::from_millis(1500));
        assert_eq!(err.to_string(), "embedding request timed out after 1500ms");
        assert!(err.is_transient());
    }

    #[test]
    fn test_only_timeouts_are_transient() {
        assert!(!AppError::RateLimited("slow down".into()).is_transient());
        assert!(!AppError::Llm("boom".into()).is_transient());
        assert!(!AppError::Unavailable("connection refused".into()).is_transient());
    }

    #[test]
    fn test_json_error_conversion() {
        let err: AppError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
