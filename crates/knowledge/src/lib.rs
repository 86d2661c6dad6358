//! Document ingestion and vector retrieval for Docent.
//!
//! A knowledge base turns uploaded documents into embedded chunks held in a
//! [`VectorIndex`] and answers questions against them with an
//! [`AnswerEngine`]. [`KnowledgeBase`] wires the parts together for one
//! named base under `.docent/knowledge/<base>/`.

pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod progress;
pub mod rag;
pub mod similarity;
pub mod snapshot;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::{GenerationConfig, KnowledgeBaseConfig, DEFAULT_BASE};
pub use error::{ErrorKind, Failure, KnowledgeError, KnowledgeResult, Stage};
pub use ingest::{DocumentIngestor, IngestLimits};
pub use progress::{Phase, ProgressEvent, ProgressReporter};
pub use rag::{AnswerEngine, AnswerSettings, CONFIDENCE_THRESHOLD};
pub use similarity::Metric;
pub use types::{
    AnswerResult, DocumentSummary, EmptyReason, FileOutcome, FileStatus, IndexState, IndexStats,
    IndexedChunk, IngestionSummary, PendingChunk, ScoredChunk, SearchOutcome, SourceCitation,
    UploadedFile,
};
pub use vector_index::VectorIndex;

use docent_core::{AppConfig, AppError, AppResult};
use docent_llm::{create_client, ClientOptions, LlmClient, RetryPolicy};
use docent_prompt::{resolve_prompt, PromptDefinition, ANSWER_PROMPT_ID};
use embeddings::Embedder;
use error::StageExt;
use extract::ExtractorRegistry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One knowledge base: its index, ingestor and answer engine.
#[derive(Debug)]
pub struct KnowledgeBase {
    config: KnowledgeBaseConfig,
    index: Arc<VectorIndex>,
    ingestor: DocumentIngestor,
    engine: AnswerEngine,
}

impl KnowledgeBase {
    /// Open the base named `base_name` in `app.workspace`.
    ///
    /// Loads `config.yaml` (or defaults), builds the embedding provider and
    /// text generator, resolves the answer prompt and loads the index
    /// snapshot. A snapshot that exists but cannot be loaded is an error.
    pub async fn open(app: &AppConfig, base_name: &str) -> AppResult<Self> {
        let workspace = app.workspace.as_path();
        let mut config = config::load_config(workspace, base_name)?;

        if config.embedding.provider == "ollama" && config.embedding.endpoint.is_none() {
            config.embedding.endpoint = app.endpoint.clone();
        }

        let embedder = Embedder::from_config(&config.embedding, config.metric)
            .at(Stage::Embedding)
            .map_err(AppError::from)?;

        let mut options = ClientOptions::default().with_timeout(config.generation.timeout());
        if let Some(endpoint) = &app.endpoint {
            options = options.with_endpoint(endpoint.clone());
        }
        let generator = create_client(&app.provider, options)?;

        let prompt = resolve_prompt(workspace, ANSWER_PROMPT_ID)?;
        let model = config
            .generation
            .model
            .clone()
            .unwrap_or_else(|| app.model.clone());

        let index_path = config::get_index_path(workspace, base_name);
        let base = Self::assemble(config, Arc::new(embedder), Some(index_path), generator, prompt, model)
            .await
            .map_err(AppError::from)?;

        tracing::info!(
            base = base_name,
            chunks = base.index.len().await,
            embedding = base.index.embedder().provider_name(),
            generator = app.provider.as_str(),
            "Opened knowledge base"
        );
        Ok(base)
    }

    /// Build a base from explicit parts. With `index_path` set to `None` the
    /// index is never written to disk.
    pub async fn assemble(
        config: KnowledgeBaseConfig,
        embedder: Arc<Embedder>,
        index_path: Option<std::path::PathBuf>,
        generator: Arc<dyn LlmClient>,
        prompt: PromptDefinition,
        model: String,
    ) -> Result<Self, Failure> {
        let index = Arc::new(
            VectorIndex::open(embedder, index_path)
                .await
                .at(Stage::Persistence)?,
        );

        let registry = Arc::new(ExtractorRegistry::new(&config.allowed_extensions));
        let ingestor = DocumentIngestor::new(
            index.clone(),
            registry,
            IngestLimits {
                chunk_size: config.chunk_size,
                chunk_overlap: config.chunk_overlap,
                max_file_bytes: config.max_file_bytes,
            },
        )
        .at(Stage::Validation)?;

        let settings = AnswerSettings {
            top_k: config.top_k,
            max_context_chars: config.max_context_chars,
            model,
            temperature: config.generation.temperature,
            max_output_tokens: config.generation.max_output_tokens,
            timeout: config.generation.timeout(),
            retry: RetryPolicy::default().with_max_retries(config.generation.max_retries),
        };
        let engine = AnswerEngine::new(index.clone(), generator, prompt, settings);

        Ok(Self {
            config,
            index,
            ingestor,
            engine,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &KnowledgeBaseConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Report ingestion progress through `progress`.
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.ingestor = self.ingestor.with_progress(progress);
        self
    }

    pub async fn ingest(
        &self,
        files: Vec<UploadedFile>,
        cancel: &CancellationToken,
    ) -> Result<IngestionSummary, Failure> {
        self.ingestor.ingest(files, cancel).await
    }

    pub async fn answer(
        &self,
        question: &str,
        top_k: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<AnswerResult, Failure> {
        self.engine.answer(question, top_k, cancel).await
    }

    /// Retrieve without generating.
    pub async fn search(&self, query: &str, top_k: Option<usize>) -> Result<SearchOutcome, Failure> {
        self.index
            .search(query, top_k.unwrap_or(self.config.top_k))
            .await
            .at(Stage::Retrieval)
    }

    pub async fn clear(&self) -> Result<(), Failure> {
        self.index.clear().await.at(Stage::Indexing)
    }

    /// Remove one document's chunks. Returns the number removed.
    pub async fn remove(&self, source_document_id: &str) -> Result<usize, Failure> {
        self.index
            .remove_document(source_document_id)
            .await
            .at(Stage::Indexing)
    }

    pub async fn documents(&self) -> Vec<DocumentSummary> {
        self.index.documents().await
    }

    pub async fn stats(&self) -> IndexStats {
        self.index.stats().await
    }

    /// Write any changes an earlier snapshot write missed.
    pub async fn shutdown(self) -> Result<(), Failure> {
        self.index.persist_if_dirty().await.at(Stage::Persistence)?;
        tracing::debug!(base = %self.config.name, "Knowledge base shut down");
        Ok(())
    }
}
