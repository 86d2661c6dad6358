//! On-disk snapshot of the vector index.
//!
//! A snapshot is one JSON document:
//!
//! ```json
//! { "format": "docent-index", "version": 1, "metric": "inner_product",
//!   "dimension": 384, "next_chunk_id": 12, "chunk_count": 12,
//!   "checksum": "<sha256 hex>", "payload": { "chunks": [..], "vectors": [..] } }
//! ```
//!
//! The checksum covers a fixed binary encoding of the payload (field bytes
//! and vector bit patterns), so it does not depend on JSON formatting.

use crate::error::{KnowledgeError, KnowledgeResult};
use crate::similarity::Metric;
use crate::types::IndexedChunk;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::Path;

pub const FORMAT: &str = "docent-index";
pub const VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope<P> {
    format: String,
    version: u32,
    metric: Metric,
    dimension: Option<usize>,
    next_chunk_id: u64,
    chunk_count: usize,
    checksum: String,
    payload: P,
}

#[derive(Serialize)]
struct PayloadRef<'a> {
    chunks: &'a [IndexedChunk],
    vectors: &'a [Vec<f32>],
}

#[derive(Deserialize)]
struct Payload {
    chunks: Vec<IndexedChunk>,
    vectors: Vec<Vec<f32>>,
}

/// Index contents restored from a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotData {
    pub metric: Metric,
    pub dimension: Option<usize>,
    pub next_chunk_id: u64,
    pub chunks: Vec<IndexedChunk>,
    pub vectors: Vec<Vec<f32>>,
}

/// Serialise index contents into snapshot bytes.
pub fn encode(
    metric: Metric,
    dimension: Option<usize>,
    next_chunk_id: u64,
    chunks: &[IndexedChunk],
    vectors: &[Vec<f32>],
) -> KnowledgeResult<Vec<u8>> {
    let envelope = Envelope {
        format: FORMAT.to_string(),
        version: VERSION,
        metric,
        dimension,
        next_chunk_id,
        chunk_count: chunks.len(),
        checksum: checksum(chunks, vectors),
        payload: PayloadRef { chunks, vectors },
    };
    serde_json::to_vec(&envelope)
        .map_err(|e| KnowledgeError::Persistence(format!("failed to serialize snapshot: {}", e)))
}

/// Parse and verify snapshot bytes.
pub fn decode(bytes: &[u8]) -> KnowledgeResult<SnapshotData> {
    let envelope: Envelope<Payload> = serde_json::from_slice(bytes)
        .map_err(|e| corrupt(format!("unreadable snapshot: {}", e)))?;

    if envelope.format != FORMAT {
        return Err(corrupt(format!("unexpected format '{}'", envelope.format)));
    }
    if envelope.version != VERSION {
        return Err(corrupt(format!(
            "unsupported snapshot version {}",
            envelope.version
        )));
    }

    let Payload { chunks, vectors } = envelope.payload;

    if chunks.len() != vectors.len() || chunks.len() != envelope.chunk_count {
        return Err(corrupt(format!(
            "count mismatch: header {}, chunks {}, vectors {}",
            envelope.chunk_count,
            chunks.len(),
            vectors.len()
        )));
    }

    if checksum(&chunks, &vectors) != envelope.checksum {
        return Err(corrupt("checksum mismatch".to_string()));
    }

    if let Some(d) = envelope.dimension {
        if let Some(bad) = vectors.iter().find(|v| v.len() != d) {
            return Err(corrupt(format!(
                "vector of length {} in a {}-dimensional index",
                bad.len(),
                d
            )));
        }
    } else if !vectors.is_empty() {
        return Err(corrupt("vectors present without a dimension".to_string()));
    }

    if let Some(max_id) = chunks.iter().map(|c| c.id).max() {
        if max_id >= envelope.next_chunk_id {
            return Err(corrupt(format!(
                "chunk id {} not below next_chunk_id {}",
                max_id, envelope.next_chunk_id
            )));
        }
    }

    Ok(SnapshotData {
        metric: envelope.metric,
        dimension: envelope.dimension,
        next_chunk_id: envelope.next_chunk_id,
        chunks,
        vectors,
    })
}

/// Read a snapshot from disk. A missing file is `Ok(None)`.
pub fn read(path: &Path) -> KnowledgeResult<Option<SnapshotData>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(KnowledgeError::Persistence(format!(
                "failed to read snapshot {:?}: {}",
                path, e
            )))
        }
    };
    decode(&bytes).map(Some)
}

/// Replace the snapshot at `path` with `bytes`.
///
/// The bytes go to a temporary file in the same directory, which is synced
/// and then renamed over the target, so readers see the old or the new
/// snapshot and never a torn one.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> KnowledgeResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| KnowledgeError::Persistence(format!("no parent directory for {:?}", path)))?;
    std::fs::create_dir_all(dir).map_err(|e| persistence("create snapshot directory", e))?;

    let mut tmp =
        tempfile::NamedTempFile::new_in(dir).map_err(|e| persistence("create temp file", e))?;
    tmp.write_all(bytes)
        .map_err(|e| persistence("write snapshot", e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| persistence("sync snapshot", e))?;
    tmp.persist(path)
        .map_err(|e| persistence("replace snapshot", e.error))?;
    Ok(())
}

/// Delete the snapshot at `path`, if any.
pub fn remove(path: &Path) -> KnowledgeResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(persistence("remove snapshot", e)),
    }
}

fn checksum(chunks: &[IndexedChunk], vectors: &[Vec<f32>]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((chunks.len() as u64).to_le_bytes());
    for (chunk, vector) in chunks.iter().zip(vectors) {
        hasher.update(chunk.id.to_le_bytes());
        hash_str(&mut hasher, &chunk.text);
        hash_str(&mut hasher, &chunk.source_document_name);
        hash_str(&mut hasher, &chunk.source_document_id);
        hasher.update(chunk.position.to_le_bytes());
        hasher.update(chunk.page.map_or(u64::MAX, u64::from).to_le_bytes());
        hash_str(&mut hasher, chunk.section.as_deref().unwrap_or(""));
        hasher.update((vector.len() as u64).to_le_bytes());
        for x in vector {
            hasher.update(x.to_bits().to_le_bytes());
        }
    }
    // Unpaired trailing entries still change the digest
    hasher.update((vectors.len() as u64).to_le_bytes());

    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn hash_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn corrupt(detail: String) -> KnowledgeError {
    KnowledgeError::Persistence(format!("corrupt snapshot: {}", detail))
}

fn persistence(action: &str, err: std::io::Error) -> KnowledgeError {
    KnowledgeError::Persistence(format!("failed to {}: {}", action, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chunk(id: u64, text: &str) -> IndexedChunk {
        IndexedChunk {
            id,
            text: text.to_string(),
            source_document_name: "notes.md".to_string(),
            source_document_id: "doc-1".to_string(),
            position: id as u32,
            page: None,
            section: Some("Intro".to_string()),
        }
    }

    fn sample() -> (Vec<IndexedChunk>, Vec<Vec<f32>>) {
        (
            vec![chunk(0, "alpha"), chunk(1, "beta")],
            vec![vec![0.6, 0.8], vec![1.0, 0.0]],
        )
    }

    #[test]
    fn test_round_trip() {
        let (chunks, vectors) = sample();
        let bytes = encode(Metric::InnerProduct, Some(2), 2, &chunks, &vectors).unwrap();
        let data = decode(&bytes).unwrap();

        assert_eq!(data.chunks, chunks);
        assert_eq!(data.vectors, vectors);
        assert_eq!(data.dimension, Some(2));
        assert_eq!(data.next_chunk_id, 2);
    }

    #[test]
    fn test_tampered_payload_fails_checksum() {
        let (chunks, vectors) = sample();
        let bytes = encode(Metric::InnerProduct, Some(2), 2, &chunks, &vectors).unwrap();
        let tampered = String::from_utf8(bytes).unwrap().replace("alpha", "gamma");

        let err = decode(tampered.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn test_rejects_foreign_format_and_truncation() {
        let (chunks, vectors) = sample();
        let bytes = encode(Metric::L2, Some(2), 2, &chunks, &vectors).unwrap();

        assert!(decode(&bytes[..bytes.len() / 2]).is_err());

        let foreign = String::from_utf8(bytes)
            .unwrap()
            .replace("docent-index", "other-index");
        assert!(decode(foreign.as_bytes())
            .unwrap_err()
            .to_string()
            .contains("unexpected format"));
    }

    #[test]
    fn test_rejects_wrong_vector_length() {
        let chunks = vec![chunk(0, "alpha")];
        let vectors = vec![vec![1.0, 0.0, 0.0]];
        let bytes = encode(Metric::InnerProduct, Some(2), 1, &chunks, &vectors).unwrap();
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_read_missing_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(read(&temp.path().join("index.json")).unwrap().is_none());
    }

    #[test]
    fn test_write_read_remove() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("base").join("index.json");
        let (chunks, vectors) = sample();

        let bytes = encode(Metric::InnerProduct, Some(2), 2, &chunks, &vectors).unwrap();
        write_atomic(&path, &bytes).unwrap();
        assert_eq!(read(&path).unwrap().unwrap().chunks.len(), 2);

        // Overwrite leaves no temp files behind
        write_atomic(&path, &bytes).unwrap();
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);

        remove(&path).unwrap();
        assert!(!path.exists());
        remove(&path).unwrap();
    }
}
