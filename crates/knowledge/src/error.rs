//! Typed failures for ingestion, indexing and answering.
//!
//! Every failure that leaves this crate carries a stable [`ErrorKind`] and,
//! at the public boundary, the [`Stage`] in which it happened.

use docent_core::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors raised inside the knowledge engine.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("corrupt input: {0}")]
    CorruptInput(String),

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout { operation: String, after: Duration },

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("no documents have been indexed")]
    NoDocumentsIndexed,

    #[error("question is empty")]
    EmptyQuestion,

    #[error("text generator unavailable: {0}")]
    GeneratorUnavailable(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("search failed: {0}")]
    Search(String),

    #[error("index is not ready: {0}")]
    IndexNotReady(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Stable, serialisable error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedFormat,
    CorruptInput,
    EmptyInput,
    InvalidInput,
    DimensionMismatch,
    Embedding,
    Timeout,
    Persistence,
    NoDocumentsIndexed,
    EmptyQuestion,
    GeneratorUnavailable,
    Generation,
    RateLimited,
    Provider,
    Search,
    IndexNotReady,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat => "unsupported_format",
            Self::CorruptInput => "corrupt_input",
            Self::EmptyInput => "empty_input",
            Self::InvalidInput => "invalid_input",
            Self::DimensionMismatch => "dimension_mismatch",
            Self::Embedding => "embedding",
            Self::Timeout => "timeout",
            Self::Persistence => "persistence",
            Self::NoDocumentsIndexed => "no_documents_indexed",
            Self::EmptyQuestion => "empty_question",
            Self::GeneratorUnavailable => "generator_unavailable",
            Self::Generation => "generation",
            Self::RateLimited => "rate_limited",
            Self::Provider => "provider",
            Self::Search => "search",
            Self::IndexNotReady => "index_not_ready",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl KnowledgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::CorruptInput(_) => ErrorKind::CorruptInput,
            Self::EmptyInput(_) => ErrorKind::EmptyInput,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Self::Embedding(_) => ErrorKind::Embedding,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::NoDocumentsIndexed => ErrorKind::NoDocumentsIndexed,
            Self::EmptyQuestion => ErrorKind::EmptyQuestion,
            Self::GeneratorUnavailable(_) => ErrorKind::GeneratorUnavailable,
            Self::Generation(_) => ErrorKind::Generation,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Provider(_) => ErrorKind::Provider,
            Self::Search(_) => ErrorKind::Search,
            Self::IndexNotReady(_) => ErrorKind::IndexNotReady,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Attach the stage this error surfaced in.
    pub fn at(self, stage: Stage) -> Failure {
        Failure { stage, error: self }
    }
}

impl From<AppError> for KnowledgeError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Timeout { operation, after } => Self::Timeout { operation, after },
            AppError::RateLimited(msg) => Self::RateLimited(msg),
            AppError::Io(e) => Self::Persistence(e.to_string()),
            other => Self::Provider(other.to_string()),
        }
    }
}

impl From<KnowledgeError> for AppError {
    fn from(err: KnowledgeError) -> Self {
        match err {
            KnowledgeError::Timeout { operation, after } => AppError::Timeout { operation, after },
            KnowledgeError::RateLimited(msg) => AppError::RateLimited(msg),
            other => AppError::Knowledge(other.to_string()),
        }
    }
}

pub type KnowledgeResult<T> = Result<T, KnowledgeError>;

/// Pipeline stage in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validation,
    Extraction,
    Chunking,
    Embedding,
    Indexing,
    Persistence,
    Retrieval,
    Generation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Extraction => "extraction",
            Self::Chunking => "chunking",
            Self::Embedding => "embedding",
            Self::Indexing => "indexing",
            Self::Persistence => "persistence",
            Self::Retrieval => "retrieval",
            Self::Generation => "generation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed failure at the public boundary: what went wrong and where.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {error}")]
pub struct Failure {
    pub stage: Stage,
    #[source]
    pub error: KnowledgeError,
}

impl Failure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl From<Failure> for AppError {
    fn from(failure: Failure) -> Self {
        AppError::Knowledge(failure.to_string())
    }
}

/// Tag a `KnowledgeResult` with the stage it belongs to.
pub trait StageExt<T> {
    fn at(self, stage: Stage) -> Result<T, Failure>;
}

impl<T> StageExt<T> for KnowledgeResult<T> {
    fn at(self, stage: Stage) -> Result<T, Failure> {
        self.map_err(|e| e.at(stage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::NoDocumentsIndexed).unwrap();
        assert_eq!(json, "\"no_documents_indexed\"");
        assert_eq!(ErrorKind::DimensionMismatch.to_string(), "dimension_mismatch");
    }

    #[test]
    fn test_failure_display_includes_stage() {
        let failure = KnowledgeError::EmptyQuestion.at(Stage::Validation);
        assert_eq!(failure.to_string(), "validation stage failed: question is empty");
        assert_eq!(failure.kind(), ErrorKind::EmptyQuestion);
    }

    #[test]
    fn test_app_error_mapping() {
        let timeout: KnowledgeError =
            AppError::timeout("embed", Duration::from_secs(2)).into();
        assert_eq!(timeout.kind(), ErrorKind::Timeout);

        let limited: KnowledgeError = AppError::RateLimited("429".into()).into();
        assert_eq!(limited.kind(), ErrorKind::RateLimited);

        let other: KnowledgeError = AppError::Unavailable("refused".into()).into();
        assert_eq!(other.kind(), ErrorKind::Provider);
    }

    #[test]
    fn test_round_trip_preserves_timeout() {
        let err = KnowledgeError::Timeout {
            operation: "generate".into(),
            after: Duration::from_millis(10),
        };
        assert!(AppError::from(err).is_transient());
    }

    #[test]
    fn test_stage_ext() {
        let result: KnowledgeResult<()> = Err(KnowledgeError::Cancelled);
        let failure = result.at(Stage::Embedding).unwrap_err();
        assert_eq!(failure.stage, Stage::Embedding);
    }
}
