//! In-memory vector index with an on-disk snapshot.
//!
//! Chunks and vectors are kept in parallel vectors of equal length. All
//! access goes through one `tokio::sync::RwLock`, which is fair: a queued
//! writer blocks new readers, so `add_chunks` and `clear` are not starved by
//! a stream of searches. Embedding happens before the lock is taken.

use crate::embeddings::guard::prepare_vector;
use crate::embeddings::Embedder;
use crate::error::{KnowledgeError, KnowledgeResult};
use crate::similarity::Metric;
use crate::snapshot;
use crate::types::{
    DocumentSummary, EmptyReason, IndexState, IndexStats, IndexedChunk, PendingChunk,
    ScoredChunk, SearchOutcome,
};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug)]
struct Inner {
    state: IndexState,
    chunks: Vec<IndexedChunk>,
    vectors: Vec<Vec<f32>>,
    dimension: Option<usize>,
    next_chunk_id: u64,
    /// Set when a mutation could not be persisted
    dirty: bool,
}

impl Inner {
    fn ensure_ready(&self) -> KnowledgeResult<()> {
        match self.state {
            IndexState::Ready => Ok(()),
            other => Err(KnowledgeError::IndexNotReady(other.as_str().to_string())),
        }
    }

    fn reset(&mut self) {
        self.chunks.clear();
        self.vectors.clear();
        self.next_chunk_id = 0;
        self.dirty = false;
    }
}

/// Vector index over embedded chunks.
#[derive(Debug)]
pub struct VectorIndex {
    embedder: Arc<Embedder>,
    path: Option<PathBuf>,
    inner: RwLock<Inner>,
}

impl VectorIndex {
    /// Create an index in the `Uninitialized` state. Call [`load`] before use.
    ///
    /// With `path` set to `None` the index lives in memory only.
    ///
    /// [`load`]: VectorIndex::load
    pub fn new(embedder: Arc<Embedder>, path: Option<PathBuf>) -> Self {
        let dimension = embedder.dimension();
        Self {
            embedder,
            path,
            inner: RwLock::new(Inner {
                state: IndexState::Uninitialized,
                chunks: Vec::new(),
                vectors: Vec::new(),
                dimension,
                next_chunk_id: 0,
                dirty: false,
            }),
        }
    }

    /// Create and load an index. A corrupt snapshot is an error.
    pub async fn open(embedder: Arc<Embedder>, path: Option<PathBuf>) -> KnowledgeResult<Self> {
        let index = Self::new(embedder, path);
        index.load().await?;
        Ok(index)
    }

    pub fn metric(&self) -> Metric {
        self.embedder.metric()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn embedder(&self) -> &Arc<Embedder> {
        &self.embedder
    }

    pub async fn state(&self) -> IndexState {
        self.inner.read().await.state
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.chunks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn dimension(&self) -> Option<usize> {
        self.inner.read().await.dimension
    }

    /// Load the snapshot, moving through `Loading` to `Ready`.
    ///
    /// A missing snapshot yields an empty index. An unreadable or invalid
    /// one moves the index to `Failed` and returns the error; a failed index
    /// rejects every operation until a later `load` succeeds.
    pub async fn load(&self) -> KnowledgeResult<()> {
        let mut inner = self.inner.write().await;
        inner.state = IndexState::Loading;

        match self.read_snapshot().await {
            Ok(Some(data)) => {
                inner.chunks = data.chunks;
                inner.vectors = data.vectors;
                inner.dimension = data.dimension;
                inner.next_chunk_id = data.next_chunk_id;
                inner.dirty = false;
                inner.state = IndexState::Ready;
                tracing::info!(
                    chunks = inner.chunks.len(),
                    dimension = ?inner.dimension,
                    path = ?self.path,
                    "Loaded vector index snapshot"
                );
                Ok(())
            }
            Ok(None) => {
                inner.reset();
                inner.state = IndexState::Ready;
                tracing::debug!(path = ?self.path, "No snapshot found, starting with an empty index");
                Ok(())
            }
            Err(err) => {
                inner.reset();
                inner.state = IndexState::Failed;
                tracing::error!(kind = %err.kind(), error = %err, path = ?self.path, "Failed to load vector index");
                Err(err)
            }
        }
    }

    async fn read_snapshot(&self) -> KnowledgeResult<Option<snapshot::SnapshotData>> {
        let Some(path) = self.path.clone() else {
            return Ok(None);
        };
        let data = tokio::task::spawn_blocking(move || snapshot::read(&path))
            .await
            .map_err(|e| KnowledgeError::Persistence(format!("snapshot reader failed: {}", e)))??;

        let Some(data) = data else {
            return Ok(None);
        };

        if data.metric != self.metric() {
            return Err(KnowledgeError::Persistence(format!(
                "snapshot uses metric '{}' but the index is configured for '{}'",
                data.metric.as_str(),
                self.metric().as_str()
            )));
        }
        if let Some(d) = data.dimension {
            self.embedder.pin_dimension(d)?;
        }
        Ok(Some(data))
    }

    /// Embed and add a batch of chunks, then persist.
    ///
    /// The batch is all-or-nothing: an embedding failure or a dimension
    /// mismatch leaves the index untouched. Returns the assigned chunk ids.
    pub async fn add_chunks(&self, chunks: Vec<PendingChunk>) -> KnowledgeResult<Vec<u64>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        self.inner.read().await.ensure_ready()?;

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_texts(&texts).await?;
        self.insert_prepared(chunks, vectors).await
    }

    /// Add chunks with precomputed vectors, then persist.
    ///
    /// Vectors are checked and, under inner product, scaled to unit length.
    pub async fn add_embedded(
        &self,
        chunks: Vec<PendingChunk>,
        mut vectors: Vec<Vec<f32>>,
    ) -> KnowledgeResult<Vec<u64>> {
        if chunks.len() != vectors.len() {
            return Err(KnowledgeError::InvalidInput(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        for vector in &mut vectors {
            prepare_vector(self.metric(), vector)?;
        }
        self.insert_prepared(chunks, vectors).await
    }

    /// Append chunks whose vectors already passed through the [`Embedder`].
    pub(crate) async fn insert_prepared(
        &self,
        chunks: Vec<PendingChunk>,
        vectors: Vec<Vec<f32>>,
    ) -> KnowledgeResult<Vec<u64>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(empty) = chunks.iter().find(|c| c.text.trim().is_empty()) {
            return Err(KnowledgeError::InvalidInput(format!(
                "chunk {} of '{}' has no text",
                empty.position, empty.source_document_name
            )));
        }

        let mut inner = self.inner.write().await;
        inner.ensure_ready()?;

        let expected = inner.dimension.unwrap_or(vectors[0].len());
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(KnowledgeError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        let first_id = inner.next_chunk_id;
        let ids: Vec<u64> = (first_id..first_id + chunks.len() as u64).collect();
        inner.dimension = Some(expected);
        inner.next_chunk_id += chunks.len() as u64;
        for (chunk, id) in chunks.into_iter().zip(&ids) {
            inner.chunks.push(chunk.into_indexed(*id));
        }
        inner.vectors.extend(vectors);

        tracing::info!(
            added = ids.len(),
            total = inner.chunks.len(),
            dimension = expected,
            "Added chunks to vector index"
        );

        self.persist_locked(&mut inner).await?;
        Ok(ids)
    }

    /// Rank chunks by similarity to `query`.
    ///
    /// `top_k` is clamped to `[1, len]`. An empty index or blank query gives
    /// [`SearchOutcome::Empty`] rather than an error.
    pub async fn search(&self, query: &str, top_k: usize) -> KnowledgeResult<SearchOutcome> {
        if query.trim().is_empty() {
            return Ok(SearchOutcome::Empty(EmptyReason::EmptyQuery));
        }
        {
            let inner = self.inner.read().await;
            inner.ensure_ready()?;
            if inner.chunks.is_empty() {
                return Ok(SearchOutcome::Empty(EmptyReason::EmptyIndex));
            }
        }

        let query_vector = self.embedder.embed_query(query).await?;

        let inner = self.inner.read().await;
        inner.ensure_ready()?;
        if inner.chunks.is_empty() {
            return Ok(SearchOutcome::Empty(EmptyReason::EmptyIndex));
        }
        if let Some(d) = inner.dimension {
            if query_vector.len() != d {
                return Err(KnowledgeError::DimensionMismatch {
                    expected: d,
                    actual: query_vector.len(),
                });
            }
        }

        let hits = rank(
            self.metric(),
            &query_vector,
            &inner.chunks,
            &inner.vectors,
            top_k,
        );

        tracing::debug!(
            top_k,
            returned = hits.len(),
            best = hits.first().map(|h| h.score),
            "Searched vector index"
        );

        Ok(SearchOutcome::Hits(hits))
    }

    /// Write the current state to the snapshot.
    pub async fn persist(&self) -> KnowledgeResult<()> {
        let mut inner = self.inner.write().await;
        inner.ensure_ready()?;
        self.persist_locked(&mut inner).await
    }

    /// Persist only if an earlier write failed.
    pub async fn persist_if_dirty(&self) -> KnowledgeResult<()> {
        let mut inner = self.inner.write().await;
        if inner.state == IndexState::Ready && inner.dirty {
            self.persist_locked(&mut inner).await?;
        }
        Ok(())
    }

    async fn persist_locked(&self, inner: &mut Inner) -> KnowledgeResult<()> {
        let Some(path) = self.path.clone() else {
            inner.dirty = false;
            return Ok(());
        };

        let result = match snapshot::encode(
            self.metric(),
            inner.dimension,
            inner.next_chunk_id,
            &inner.chunks,
            &inner.vectors,
        ) {
            Ok(bytes) => tokio::task::spawn_blocking(move || snapshot::write_atomic(&path, &bytes))
                .await
                .map_err(|e| KnowledgeError::Persistence(format!("snapshot writer failed: {}", e)))
                .and_then(|r| r),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                inner.dirty = false;
                tracing::debug!(chunks = inner.chunks.len(), path = ?self.path, "Persisted vector index");
                Ok(())
            }
            Err(err) => {
                inner.dirty = true;
                tracing::warn!(
                    kind = %err.kind(),
                    error = %err,
                    chunks = inner.chunks.len(),
                    "In-memory index changed but the snapshot was not written"
                );
                Err(err)
            }
        }
    }

    /// Remove every chunk and the snapshot file.
    ///
    /// The file goes first; if it cannot be removed nothing changes.
    pub async fn clear(&self) -> KnowledgeResult<()> {
        let mut inner = self.inner.write().await;
        inner.ensure_ready()?;

        if let Some(path) = self.path.clone() {
            tokio::task::spawn_blocking(move || snapshot::remove(&path))
                .await
                .map_err(|e| KnowledgeError::Persistence(format!("snapshot remover failed: {}", e)))??;
        }

        let removed = inner.chunks.len();
        inner.reset();
        tracing::info!(removed, "Cleared vector index");
        Ok(())
    }

    /// Remove all chunks of one document and persist. Returns how many
    /// chunks were removed.
    pub async fn remove_document(&self, source_document_id: &str) -> KnowledgeResult<usize> {
        let mut inner = self.inner.write().await;
        inner.ensure_ready()?;

        let before = inner.chunks.len();
        let keep: Vec<bool> = inner
            .chunks
            .iter()
            .map(|c| c.source_document_id != source_document_id)
            .collect();
        let removed = keep.iter().filter(|k| !**k).count();
        if removed == 0 {
            return Ok(0);
        }

        let mut flags = keep.iter();
        inner.chunks.retain(|_| *flags.next().unwrap_or(&true));
        let mut flags = keep.iter();
        inner.vectors.retain(|_| *flags.next().unwrap_or(&true));

        tracing::info!(
            document = source_document_id,
            removed,
            remaining = before - removed,
            "Removed document from vector index"
        );

        self.persist_locked(&mut inner).await?;
        Ok(removed)
    }

    /// Indexed documents in first-ingested order.
    pub async fn documents(&self) -> Vec<DocumentSummary> {
        let inner = self.inner.read().await;
        summarize_documents(&inner.chunks)
    }

    pub async fn stats(&self) -> IndexStats {
        let inner = self.inner.read().await;
        IndexStats {
            chunk_count: inner.chunks.len(),
            document_count: summarize_documents(&inner.chunks).len(),
            dimension: inner.dimension,
            metric: self.metric(),
            state: inner.state,
            unpersisted_changes: inner.dirty,
        }
    }

    #[cfg(test)]
    pub(crate) async fn vector_count(&self) -> usize {
        self.inner.read().await.vectors.len()
    }

    #[cfg(test)]
    pub(crate) async fn snapshot_contents(&self) -> (Vec<IndexedChunk>, Vec<Vec<f32>>) {
        let inner = self.inner.read().await;
        (inner.chunks.clone(), inner.vectors.clone())
    }
}

/// Score every vector against `query` and keep the best `top_k`.
///
/// Ties are broken by chunk id so results are deterministic.
fn rank(
    metric: Metric,
    query: &[f32],
    chunks: &[IndexedChunk],
    vectors: &[Vec<f32>],
    top_k: usize,
) -> Vec<ScoredChunk> {
    let k = top_k.clamp(1, chunks.len());
    let mut scored: Vec<(usize, f32)> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (i, metric.score(query, v)))
        .collect();

    let by_score = |a: &(usize, f32), b: &(usize, f32)| -> Ordering {
        b.1.total_cmp(&a.1)
            .then_with(|| chunks[a.0].id.cmp(&chunks[b.0].id))
    };

    if k < scored.len() {
        scored.select_nth_unstable_by(k - 1, by_score);
        scored.truncate(k);
    }
    scored.sort_by(by_score);

    scored
        .into_iter()
        .map(|(i, score)| ScoredChunk {
            chunk: chunks[i].clone(),
            score,
        })
        .collect()
}

fn summarize_documents(chunks: &[IndexedChunk]) -> Vec<DocumentSummary> {
    let mut order: Vec<DocumentSummary> = Vec::new();
    let mut slots: HashMap<&str, usize> = HashMap::new();
    for chunk in chunks {
        match slots.get(chunk.source_document_id.as_str()) {
            Some(&i) => order[i].chunk_count += 1,
            None => {
                slots.insert(&chunk.source_document_id, order.len());
                order.push(DocumentSummary {
                    source_document_id: chunk.source_document_id.clone(),
                    source_document_name: chunk.source_document_name.clone(),
                    chunk_count: 1,
                });
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use crate::embeddings::EmbeddingProvider;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn embedder(metric: Metric) -> Arc<Embedder> {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(TrigramProvider::new(64));
        Arc::new(Embedder::new(provider, metric))
    }

    fn pending(doc: &str, texts: &[&str]) -> Vec<PendingChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| PendingChunk::new(*t, format!("{}.txt", doc), doc, i as u32))
            .collect()
    }

    async fn ready_index(path: Option<PathBuf>) -> VectorIndex {
        VectorIndex::open(embedder(Metric::InnerProduct), path)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_new_index_is_uninitialized() {
        let index = VectorIndex::new(embedder(Metric::InnerProduct), None);
        assert_eq!(index.state().await, IndexState::Uninitialized);
        let err = index.search("anything", 3).await.unwrap_err();
        assert!(matches!(err, KnowledgeError::IndexNotReady(_)));
    }

    #[tokio::test]
    async fn test_search_empty_index() {
        let index = ready_index(None).await;
        let outcome = index.search("what color is the sky", 5).await.unwrap();
        assert_eq!(outcome, SearchOutcome::Empty(EmptyReason::EmptyIndex));
    }

    #[tokio::test]
    async fn test_search_blank_query() {
        let index = ready_index(None).await;
        index
            .add_chunks(pending("a", &["The sky is blue."]))
            .await
            .unwrap();
        let outcome = index.search("   ", 5).await.unwrap();
        assert_eq!(outcome, SearchOutcome::Empty(EmptyReason::EmptyQuery));
    }

    #[tokio::test]
    async fn test_search_ranks_relevant_chunk_first() {
        let index = ready_index(None).await;
        index
            .add_chunks(pending(
                "facts",
                &[
                    "Bananas are yellow and grow in bunches.",
                    "The sky is blue on a clear day.",
                    "Rust programs compile to native code.",
                ],
            ))
            .await
            .unwrap();

        let outcome = index.search("What color is the sky?", 2).await.unwrap();
        let hits = outcome.hits();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].chunk.text.contains("sky"));
        assert!(hits[0].score >= hits[1].score);
        assert!(hits.iter().all(|h| (0.0..=1.0).contains(&h.score)));
    }

    #[tokio::test]
    async fn test_top_k_clamped() {
        let index = ready_index(None).await;
        index
            .add_chunks(pending("a", &["one fish", "two fish"]))
            .await
            .unwrap();

        assert_eq!(index.search("fish", 50).await.unwrap().hits().len(), 2);
        assert_eq!(index.search("fish", 0).await.unwrap().hits().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_dimension_leaves_index_unchanged() {
        let index = ready_index(None).await;
        index
            .add_chunks(pending("a", &["first chunk"]))
            .await
            .unwrap();

        let err = index
            .add_embedded(pending("b", &["intruder"]), vec![vec![1.0; 8]])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            KnowledgeError::DimensionMismatch { expected: 64, actual: 8 }
        ));
        assert_eq!(index.len().await, 1);
        assert_eq!(index.vector_count().await, 1);
    }

    #[tokio::test]
    async fn test_mixed_batch_dimensions_rejected_atomically() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(TrigramProvider::new(4));
        let index = VectorIndex::open(Arc::new(Embedder::new(provider, Metric::L2)), None)
            .await
            .unwrap();
        let err = index
            .add_embedded(
                pending("a", &["x", "y"]),
                vec![vec![1.0, 0.0, 0.0, 0.0], vec![1.0, 0.0]],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::DimensionMismatch { .. }));
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_add_embedded_normalizes_for_inner_product() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(TrigramProvider::new(2));
        let index = VectorIndex::open(
            Arc::new(Embedder::new(provider, Metric::InnerProduct)),
            None,
        )
        .await
        .unwrap();
        index
            .add_embedded(pending("a", &["x"]), vec![vec![3.0, 4.0]])
            .await
            .unwrap();

        let (_, vectors) = index.snapshot_contents().await;
        assert!((vectors[0][0] - 0.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_persist_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.json");

        let index = ready_index(Some(path.clone())).await;
        index
            .add_chunks(pending("a", &["alpha text", "beta text"]))
            .await
            .unwrap();
        index
            .add_chunks(pending("b", &["gamma text"]))
            .await
            .unwrap();
        let before = index.snapshot_contents().await;

        let reloaded = ready_index(Some(path)).await;
        assert_eq!(reloaded.snapshot_contents().await, before);
        assert_eq!(reloaded.dimension().await, Some(64));

        // Ids continue after the reloaded range
        let ids = reloaded.add_chunks(pending("c", &["delta"])).await.unwrap();
        assert_eq!(ids, vec![3]);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_fails_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let index = VectorIndex::new(embedder(Metric::InnerProduct), Some(path));
        let err = index.load().await.unwrap_err();
        assert!(matches!(err, KnowledgeError::Persistence(_)));
        assert_eq!(index.state().await, IndexState::Failed);
        assert!(index.add_chunks(pending("a", &["x"])).await.is_err());
    }

    #[tokio::test]
    async fn test_metric_mismatch_fails_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.json");

        let index = ready_index(Some(path.clone())).await;
        index.add_chunks(pending("a", &["alpha"])).await.unwrap();

        let result = VectorIndex::open(embedder(Metric::L2), Some(path)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.json");

        let index = ready_index(Some(path.clone())).await;
        index.add_chunks(pending("a", &["alpha"])).await.unwrap();
        assert!(path.exists());

        index.clear().await.unwrap();
        assert!(!path.exists());
        assert!(index.is_empty().await);
        assert!(index.search("alpha", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_document() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.json");

        let index = ready_index(Some(path.clone())).await;
        index.add_chunks(pending("a", &["one", "two"])).await.unwrap();
        index.add_chunks(pending("b", &["three"])).await.unwrap();

        assert_eq!(index.remove_document("a").await.unwrap(), 2);
        assert_eq!(index.remove_document("missing").await.unwrap(), 0);

        let docs = index.documents().await;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source_document_id, "b");
        assert_eq!(index.vector_count().await, 1);

        let reloaded = ready_index(Some(path)).await;
        assert_eq!(reloaded.len().await, 1);
    }

    #[tokio::test]
    async fn test_persist_failure_is_surfaced_and_flagged() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("base");
        let index = ready_index(Some(base.join("index.json"))).await;

        // A regular file where the snapshot directory should be
        std::fs::write(&base, b"").unwrap();

        let err = index.add_chunks(pending("a", &["alpha"])).await.unwrap_err();

        assert!(matches!(err, KnowledgeError::Persistence(_)));
        let stats = index.stats().await;
        assert_eq!(stats.chunk_count, 1);
        assert!(stats.unpersisted_changes);
    }

    #[tokio::test]
    async fn test_stats() {
        let index = ready_index(None).await;
        index.add_chunks(pending("a", &["one", "two"])).await.unwrap();
        index.add_chunks(pending("b", &["three"])).await.unwrap();

        let stats = index.stats().await;
        assert_eq!(stats.chunk_count, 3);
        assert_eq!(stats.document_count, 2);
        assert_eq!(stats.dimension, Some(64));
        assert_eq!(stats.state, IndexState::Ready);
    }

    #[tokio::test]
    async fn test_concurrent_searches_during_add() {
        let index = Arc::new(ready_index(None).await);
        index.add_chunks(pending("a", &["seed text"])).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let index = index.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    index
                        .add_chunks(pending(&format!("d{}", i), &["more text"]))
                        .await
                        .map(|_| ())
                } else {
                    index.search("text", 3).await.map(|_| ())
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(index.len().await, 5);
        assert_eq!(index.vector_count().await, 5);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_round_trip_preserves_contents(
            texts in prop::collection::vec("[a-z]{1,12}( [a-z]{1,12}){0,4}", 1..8)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let temp = TempDir::new().unwrap();
                let path = temp.path().join("index.json");

                let index = ready_index(Some(path.clone())).await;
                let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                index.add_chunks(pending("doc", &refs)).await.unwrap();
                assert_eq!(index.len().await, index.vector_count().await);

                let reloaded = ready_index(Some(path)).await;
                assert_eq!(reloaded.snapshot_contents().await, index.snapshot_contents().await);
            });
        }
    }
}
