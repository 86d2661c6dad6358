//! Guarded access to an embedding provider.

use crate::embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
use crate::error::{KnowledgeError, KnowledgeResult};
use crate::similarity::{l2_norm, l2_normalize, Metric};
use docent_core::AppError;
use docent_llm::retry::{with_timeout, RetryPolicy};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Wraps an [`EmbeddingProvider`] and enforces the vector invariants the
/// index depends on.
///
/// - each provider call is bounded by a timeout; timed-out calls are retried
///   per the [`RetryPolicy`], other failures are not
/// - the vector length is pinned by configuration or by the first vector
///   seen; later vectors of another length fail with `DimensionMismatch`
/// - non-finite and zero-norm vectors are rejected
/// - under [`Metric::InnerProduct`] every vector is scaled to unit length
#[derive(Debug)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    metric: Metric,
    timeout: Duration,
    retry: RetryPolicy,
    batch_size: usize,
    dimension: OnceLock<usize>,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, metric: Metric) -> Self {
        let dimension = OnceLock::new();
        if let Some(d) = provider.dimensions() {
            let _ = dimension.set(d);
        }
        Self {
            provider,
            metric,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            batch_size: 32,
            dimension,
        }
    }

    /// Build the provider named in `config` and wrap it.
    pub fn from_config(config: &EmbeddingConfig, metric: Metric) -> KnowledgeResult<Self> {
        let provider = create_provider(config).map_err(|e| KnowledgeError::Provider(e.to_string()))?;
        let embedder = Self::new(provider, metric)
            .with_timeout(config.timeout())
            .with_retry(RetryPolicy::default().with_max_retries(config.max_retries))
            .with_batch_size(config.batch_size);
        if let Some(d) = config.dimensions {
            embedder.pin_dimension(d)?;
        }
        Ok(embedder)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// The pinned vector length, once known.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    /// Pin the vector length, failing if a different one is already pinned.
    pub fn pin_dimension(&self, dimension: usize) -> KnowledgeResult<()> {
        let pinned = *self.dimension.get_or_init(|| dimension);
        if pinned != dimension {
            return Err(KnowledgeError::DimensionMismatch {
                expected: pinned,
                actual: dimension,
            });
        }
        Ok(())
    }

    /// Embed a single query string.
    pub async fn embed_query(&self, text: &str) -> KnowledgeResult<Vec<f32>> {
        let mut vectors = self.embed_texts(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| KnowledgeError::Embedding("provider returned no vector".to_string()))
    }

    /// Embed texts in provider-sized batches. Fails as a whole on the first
    /// bad batch.
    pub async fn embed_texts(&self, texts: &[String]) -> KnowledgeResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        let provider: &dyn EmbeddingProvider = self.provider.as_ref();
        let timeout = self.timeout;

        for batch in texts.chunks(self.batch_size) {
            // Providers may issue one request per text, so the deadline grows
            // with the batch.
            let deadline = timeout.saturating_mul(u32::try_from(batch.len()).unwrap_or(u32::MAX));
            let vectors = self
                .retry
                .run("embedding request", move || {
                    with_timeout("embedding request", deadline, provider.embed_batch(batch))
                })
                .await
                .map_err(embedding_error)?;

            if vectors.len() != batch.len() {
                return Err(KnowledgeError::Embedding(format!(
                    "provider returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }

            out.extend(self.finalize_batch(vectors)?);
        }

        tracing::debug!(
            provider = self.provider.provider_name(),
            count = out.len(),
            dimension = ?self.dimension(),
            "Embedded texts"
        );

        Ok(out)
    }

    /// Validate a whole provider response, then pin its length.
    ///
    /// Nothing is pinned unless every vector in the batch is usable.
    fn finalize_batch(&self, mut vectors: Vec<Vec<f32>>) -> KnowledgeResult<Vec<Vec<f32>>> {
        let Some(first_len) = vectors.first().map(Vec::len) else {
            return Ok(vectors);
        };
        let expected = self.dimension().unwrap_or(first_len);

        for vector in &mut vectors {
            if vector.is_empty() {
                return Err(KnowledgeError::Embedding(
                    "provider returned an empty vector".to_string(),
                ));
            }
            if vector.len() != expected {
                return Err(KnowledgeError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            prepare_vector(self.metric, vector)?;
        }

        self.pin_dimension(expected)?;
        Ok(vectors)
    }
}

/// Check that `vector` is usable under `metric`, scaling it to unit length
/// when the metric requires it.
pub(crate) fn prepare_vector(metric: Metric, vector: &mut [f32]) -> KnowledgeResult<()> {
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(KnowledgeError::Embedding(
            "vector has a non-finite component".to_string(),
        ));
    }
    let usable = if metric.requires_unit_vectors() {
        l2_normalize(vector)
    } else {
        l2_norm(vector) > 0.0
    };
    if !usable {
        return Err(KnowledgeError::Embedding("vector has zero norm".to_string()));
    }
    Ok(())
}

fn embedding_error(err: AppError) -> KnowledgeError {
    match err {
        AppError::Timeout { operation, after } => KnowledgeError::Timeout { operation, after },
        AppError::RateLimited(msg) => KnowledgeError::RateLimited(msg),
        other => KnowledgeError::Embedding(other.to_string()),
    }
}
