//! Knowledge system type definitions.

use crate::error::{ErrorKind, Failure, Stage};
use crate::similarity::Metric;
use serde::{Deserialize, Serialize};

/// A chunk stored in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    /// Sequence number, unique within the index
    pub id: u64,

    /// Trimmed chunk text
    pub text: String,

    pub source_document_name: String,

    /// Handle assigned at ingestion
    pub source_document_id: String,

    /// Position within the source document
    pub position: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

/// A chunk waiting to be embedded and added to the index.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChunk {
    pub text: String,
    pub source_document_name: String,
    pub source_document_id: String,
    pub position: u32,
    pub page: Option<u32>,
    pub section: Option<String>,
}

impl PendingChunk {
    pub fn new(
        text: impl Into<String>,
        source_document_name: impl Into<String>,
        source_document_id: impl Into<String>,
        position: u32,
    ) -> Self {
        Self {
            text: text.into(),
            source_document_name: source_document_name.into(),
            source_document_id: source_document_id.into(),
            position,
            page: None,
            section: None,
        }
    }

    pub(crate) fn into_indexed(self, id: u64) -> IndexedChunk {
        IndexedChunk {
            id,
            text: self.text,
            source_document_name: self.source_document_name,
            source_document_id: self.source_document_id,
            position: self.position,
            page: self.page,
            section: self.section,
        }
    }
}

/// A retrieved chunk with its normalised `[0, 1]` similarity score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: IndexedChunk,
    pub score: f32,
}

/// Why a search produced no results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    EmptyIndex,
    EmptyQuery,
}

/// Result of a search: ranked hits, or an explicit empty signal.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Hits ordered by descending score; never empty.
    Hits(Vec<ScoredChunk>),
    Empty(EmptyReason),
}

impl SearchOutcome {
    pub fn hits(&self) -> &[ScoredChunk] {
        match self {
            Self::Hits(hits) => hits,
            Self::Empty(_) => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty(_))
    }

    pub fn into_hits(self) -> Vec<ScoredChunk> {
        match self {
            Self::Hits(hits) => hits,
            Self::Empty(_) => Vec::new(),
        }
    }
}

/// Lifecycle state of the vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

impl IndexState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

/// One indexed document and its chunk count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub source_document_id: String,
    pub source_document_name: String,
    pub chunk_count: usize,
}

/// Snapshot of index statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub chunk_count: usize,
    pub document_count: usize,
    pub dimension: Option<usize>,
    pub metric: Metric,
    pub state: IndexState,
    /// In-memory changes the last snapshot write did not capture
    pub unpersisted_changes: bool,
}

/// A file handed to the ingestor by the upload boundary.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
    /// Declared extension, with or without a leading dot
    pub extension: String,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>, extension: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            extension: extension.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Ok,
    Error,
}

/// Serialisable description of a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Failure> for FailureReport {
    fn from(failure: &Failure) -> Self {
        Self {
            stage: failure.stage,
            kind: failure.kind(),
            message: failure.error.to_string(),
        }
    }
}

/// Per-file ingestion record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    pub document_name: String,

    /// Assigned only when the file reached the index
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,

    pub status: FileStatus,
    pub chunk_count: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureReport>,
}

impl FileOutcome {
    pub fn ok(name: impl Into<String>, document_id: impl Into<String>, chunk_count: usize) -> Self {
        Self {
            document_name: name.into(),
            document_id: Some(document_id.into()),
            status: FileStatus::Ok,
            chunk_count,
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, failure: &Failure) -> Self {
        Self {
            document_name: name.into(),
            document_id: None,
            status: FileStatus::Error,
            chunk_count: 0,
            error: Some(failure.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == FileStatus::Ok
    }
}

/// Aggregate result of one ingestion batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionSummary {
    pub outcomes: Vec<FileOutcome>,
    pub success_count: usize,
    pub error_count: usize,
    pub total_chunks_added: usize,
    /// The batch stopped early on cancellation
    pub cancelled: bool,
    pub duration_secs: f64,
}

impl IngestionSummary {
    pub(crate) fn from_outcomes(outcomes: Vec<FileOutcome>, cancelled: bool, duration_secs: f64) -> Self {
        let success_count = outcomes.iter().filter(|o| o.is_ok()).count();
        let total_chunks_added = outcomes.iter().map(|o| o.chunk_count).sum();
        Self {
            error_count: outcomes.len() - success_count,
            success_count,
            total_chunks_added,
            cancelled,
            duration_secs,
            outcomes,
        }
    }
}

/// A source cited by an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCitation {
    pub document_name: String,
    pub document_id: String,
    pub chunk_id: u64,
    pub position: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub score: f32,
    /// Leading text of the chunk
    pub snippet: String,
}

impl From<&ScoredChunk> for SourceCitation {
    fn from(hit: &ScoredChunk) -> Self {
        Self {
            document_name: hit.chunk.source_document_name.clone(),
            document_id: hit.chunk.source_document_id.clone(),
            chunk_id: hit.chunk.id,
            position: hit.chunk.position,
            page: hit.chunk.page,
            score: hit.score,
            snippet: crate::rag::context::truncate_snippet(&hit.chunk.text, SNIPPET_CHARS),
        }
    }
}

/// Maximum snippet length for source citations.
const SNIPPET_CHARS: usize = 150;

/// A grounded answer and the sources used to build its context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerResult {
    pub answer: String,

    /// Sources in descending score order
    pub sources: Vec<SourceCitation>,

    pub max_score: f32,

    /// Best score fell below the confidence threshold
    pub low_confidence: bool,

    pub model: String,
}
