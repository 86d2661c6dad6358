//! Document ingestion: extract, chunk, embed and index uploaded files.
//!
//! Files are processed one at a time. A failure in one file is recorded in
//! its [`FileOutcome`] and the batch moves on.

use crate::chunker::chunk_text;
use crate::error::{ErrorKind, Failure, KnowledgeError, KnowledgeResult, Stage, StageExt};
use crate::extract::{ExtractedText, ExtractorRegistry};
use crate::progress::{Phase, ProgressReporter};
use crate::types::{FileOutcome, IngestionSummary, PendingChunk, UploadedFile};
use crate::vector_index::VectorIndex;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Limits applied to every uploaded file.
#[derive(Debug, Clone, Copy)]
pub struct IngestLimits {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_file_bytes: u64,
}

/// Runs uploaded files through the ingestion pipeline into a [`VectorIndex`].
#[derive(Debug)]
pub struct DocumentIngestor {
    index: Arc<VectorIndex>,
    registry: Arc<ExtractorRegistry>,
    limits: IngestLimits,
    progress: ProgressReporter,
}

impl DocumentIngestor {
    pub fn new(
        index: Arc<VectorIndex>,
        registry: Arc<ExtractorRegistry>,
        limits: IngestLimits,
    ) -> KnowledgeResult<Self> {
        if limits.chunk_size == 0 || limits.chunk_overlap >= limits.chunk_size {
            return Err(KnowledgeError::InvalidInput(format!(
                "chunk size must exceed overlap (size={}, overlap={})",
                limits.chunk_size, limits.chunk_overlap
            )));
        }
        Ok(Self {
            index,
            registry,
            limits,
            progress: ProgressReporter::noop(),
        })
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Ingest a batch of files.
    ///
    /// Only an empty file list is an error. Every other failure lands in the
    /// per-file outcome. When `cancel` fires, the file in flight (if it has
    /// not reached the index yet) and all later files are recorded as
    /// cancelled.
    pub async fn ingest(
        &self,
        files: Vec<UploadedFile>,
        cancel: &CancellationToken,
    ) -> Result<IngestionSummary, Failure> {
        if files.is_empty() {
            return Err(
                KnowledgeError::InvalidInput("no files to ingest".to_string()).at(Stage::Validation),
            );
        }

        let start = Instant::now();
        let file_count = files.len();
        let mut outcomes = Vec::with_capacity(file_count);
        let mut cancelled = false;

        tracing::info!(files = file_count, "Starting ingestion batch");

        for (i, file) in files.into_iter().enumerate() {
            let name = file.name.clone();

            let outcome = if cancelled || cancel.is_cancelled() {
                cancelled = true;
                FileOutcome::failed(&name, &KnowledgeError::Cancelled.at(Stage::Validation))
            } else {
                match self.ingest_file(file, i + 1, file_count, cancel).await {
                    Ok(outcome) => outcome,
                    Err(failure) => {
                        if failure.kind() == ErrorKind::Cancelled {
                            cancelled = true;
                        } else {
                            tracing::warn!(
                                document = %name,
                                stage = %failure.stage,
                                kind = %failure.kind(),
                                error = %failure.error,
                                "Failed to ingest document"
                            );
                        }
                        FileOutcome::failed(&name, &failure)
                    }
                }
            };
            outcomes.push(outcome);
        }

        let summary =
            IngestionSummary::from_outcomes(outcomes, cancelled, start.elapsed().as_secs_f64());

        tracing::info!(
            succeeded = summary.success_count,
            failed = summary.error_count,
            chunks = summary.total_chunks_added,
            cancelled = summary.cancelled,
            duration_secs = summary.duration_secs,
            "Ingestion batch finished"
        );

        Ok(summary)
    }

    async fn ingest_file(
        &self,
        file: UploadedFile,
        file_index: usize,
        file_count: usize,
        cancel: &CancellationToken,
    ) -> Result<FileOutcome, Failure> {
        let UploadedFile {
            name,
            bytes,
            extension,
        } = file;

        self.validate(&name, &bytes, &extension).at(Stage::Validation)?;

        self.progress.emit(
            Phase::Extract,
            file_index,
            file_count,
            &name,
            format!("{} bytes", bytes.len()),
        );
        let extracted = self.extract(bytes, extension).await.at(Stage::Extraction)?;

        let document_id = uuid::Uuid::new_v4().to_string();
        let chunks = self
            .chunk(&name, &document_id, &extracted)
            .at(Stage::Chunking)?;
        self.progress.emit(
            Phase::Chunk,
            file_index,
            file_count,
            &name,
            format!("{} chunks", chunks.len()),
        );

        if cancel.is_cancelled() {
            return Err(KnowledgeError::Cancelled.at(Stage::Embedding));
        }

        self.progress.emit(
            Phase::Embed,
            file_index,
            file_count,
            &name,
            format!("model={}", self.index.embedder().model_name()),
        );
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .index
            .embedder()
            .embed_texts(&texts)
            .await
            .at(Stage::Embedding)?;

        self.progress.emit(
            Phase::Index,
            file_index,
            file_count,
            &name,
            format!("{} vectors", vectors.len()),
        );
        let chunk_count = chunks.len();
        match self.index.insert_prepared(chunks, vectors).await {
            Ok(_) => {
                tracing::debug!(document = %name, chunks = chunk_count, "Ingested document");
                Ok(FileOutcome::ok(name, document_id, chunk_count))
            }
            Err(err @ KnowledgeError::Persistence(_)) => {
                // Chunks are live in memory but not on disk
                let failure = err.at(Stage::Persistence);
                tracing::warn!(
                    document = %name,
                    stage = %failure.stage,
                    kind = %failure.kind(),
                    error = %failure.error,
                    "Document indexed but not persisted"
                );
                let mut outcome = FileOutcome::failed(name, &failure);
                outcome.document_id = Some(document_id);
                outcome.chunk_count = chunk_count;
                Ok(outcome)
            }
            Err(err) => Err(err.at(Stage::Indexing)),
        }
    }

    fn validate(&self, name: &str, bytes: &[u8], extension: &str) -> KnowledgeResult<()> {
        if name.trim().is_empty() {
            return Err(KnowledgeError::InvalidInput(
                "document name is empty".to_string(),
            ));
        }
        if bytes.is_empty() {
            return Err(KnowledgeError::EmptyInput(format!("'{}' is empty", name)));
        }
        if bytes.len() as u64 > self.limits.max_file_bytes {
            return Err(KnowledgeError::InvalidInput(format!(
                "'{}' is {} bytes, limit is {}",
                name,
                bytes.len(),
                self.limits.max_file_bytes
            )));
        }
        if !self.registry.is_allowed(extension) {
            return Err(KnowledgeError::UnsupportedFormat(format!(
                "extension '{}' is not allowed",
                extension
            )));
        }
        Ok(())
    }

    async fn extract(&self, bytes: Vec<u8>, extension: String) -> KnowledgeResult<ExtractedText> {
        let registry = self.registry.clone();
        tokio::task::spawn_blocking(move || registry.extract(&bytes, &extension))
            .await
            .map_err(|e| KnowledgeError::CorruptInput(format!("extraction task failed: {}", e)))?
    }

    fn chunk(
        &self,
        name: &str,
        document_id: &str,
        extracted: &ExtractedText,
    ) -> KnowledgeResult<Vec<PendingChunk>> {
        let chunks: Vec<PendingChunk> = chunk_text(
            &extracted.text,
            self.limits.chunk_size,
            self.limits.chunk_overlap,
        )?
        .map(|c| PendingChunk {
            text: c.text.to_string(),
            source_document_name: name.to_string(),
            source_document_id: document_id.to_string(),
            position: c.position,
            page: extracted.page_at(c.start),
            section: extracted.section_at(c.start).map(str::to_string),
        })
        .collect();

        if chunks.is_empty() {
            return Err(KnowledgeError::EmptyInput(
                "no extractable text".to_string(),
            ));
        }
        Ok(chunks)
    }
}
