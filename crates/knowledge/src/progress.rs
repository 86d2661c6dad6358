//! Structured progress reporting for ingestion.
//!
//! Events flow to an optional callback and are mirrored to `tracing` at
//! debug level.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Ingestion phase an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Extract,
    Chunk,
    Embed,
    Index,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Chunk => "chunk",
            Self::Embed => "embed",
            Self::Index => "index",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress event emitted during ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub phase: Phase,

    /// 1-based index of the file being processed
    pub file_index: usize,

    pub file_count: usize,

    pub document_name: String,

    /// Human-readable detail
    pub message: String,

    /// Seconds since the reporter was created
    pub elapsed_secs: f64,
}

impl ProgressEvent {
    /// Percentage of files started, including the current one.
    pub fn percentage(&self) -> f64 {
        if self.file_count == 0 {
            return 0.0;
        }
        (self.file_index as f64 / self.file_count as f64) * 100.0
    }

    /// Format as a simple user-facing line.
    pub fn format_simple(&self) -> String {
        format!(
            "[{}] {}/{} ({:.0}%) {} - {}",
            self.phase,
            self.file_index,
            self.file_count,
            self.percentage(),
            self.document_name,
            self.message
        )
    }
}

/// Callback for progress events.
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Progress reporter that emits events through a callback.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    start_time: Instant,
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            start_time: Instant::now(),
        }
    }

    /// A reporter that only logs.
    pub fn noop() -> Self {
        Self {
            callback: None,
            start_time: Instant::now(),
        }
    }

    pub(crate) fn emit(
        &self,
        phase: Phase,
        file_index: usize,
        file_count: usize,
        document_name: &str,
        message: impl Into<String>,
    ) {
        let event = ProgressEvent {
            phase,
            file_index,
            file_count,
            document_name: document_name.to_string(),
            message: message.into(),
            elapsed_secs: self.start_time.elapsed().as_secs_f64(),
        };

        tracing::debug!(
            phase = %event.phase,
            file = event.file_index,
            of = event.file_count,
            document = %event.document_name,
            message = %event.message,
            elapsed_secs = event.elapsed_secs,
            "Ingestion progress"
        );

        if let Some(callback) = &self.callback {
            callback(&event);
        }
    }
}
