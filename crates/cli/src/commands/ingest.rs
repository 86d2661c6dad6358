//! Ingest command handler.
//!
//! Turns file and directory arguments into uploads and runs them through the
//! knowledge base ingestor.

use clap::Args;
use docent_core::{config::AppConfig, AppError, AppResult};
use docent_knowledge::extract::normalize_extension;
use docent_knowledge::{FileOutcome, IngestionSummary, ProgressReporter, UploadedFile};
use futures::{StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::{close_base, open_base, print_json, surface};

/// Files read from disk concurrently while building the batch.
const READ_CONCURRENCY: usize = 8;

/// Extract, chunk, embed and index documents
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files or directories to ingest. Directories are walked recursively.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Suppress per-phase progress on stderr
    #[arg(short, long)]
    pub quiet: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(
        &self,
        config: &AppConfig,
        base: &str,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        tracing::info!("Executing ingest command for base '{}'", base);

        let mut kb = open_base(config, base).await?;

        let files = collect_files(&self.paths, &kb.config().allowed_extensions)?;
        if files.is_empty() {
            return Err(AppError::Config(
                "No ingestible files found in the given paths".to_string(),
            ));
        }
        tracing::debug!("Collected {} files", files.len());

        let max_bytes = kb.config().max_file_bytes;
        let (files, oversized) = split_oversized(files, max_bytes)?;
        for (path, len) in &oversized {
            tracing::warn!(
                path = %path.display(),
                bytes = len,
                limit = max_bytes,
                "Skipping oversized file"
            );
            eprintln!(
                "skip   {} ({} bytes, limit is {})",
                path.display(),
                len,
                max_bytes
            );
        }
        if files.is_empty() {
            return Err(AppError::Config(
                "Every file exceeds the configured size limit".to_string(),
            ));
        }

        let uploads = read_uploads(files).await?;

        if !self.quiet && !self.json {
            kb = kb.with_progress(ProgressReporter::new(Arc::new(|event| {
                eprintln!("{}", event.format_simple());
            })));
        }

        let summary = kb.ingest(uploads, cancel).await.map_err(surface)?;

        if self.json {
            print_json(&summary)?;
        } else {
            print_summary(&summary);
        }

        close_base(kb).await
    }
}

/// Expand directories and keep explicit files.
///
/// Files found by walking a directory are kept only when their extension is
/// allowed and they are not hidden. Files named explicitly are always kept so
/// the ingestor can report why it rejects them.
pub(crate) fn collect_files(paths: &[PathBuf], allowed: &[String]) -> AppResult<Vec<PathBuf>> {
    let allowed: Vec<String> = allowed.iter().map(|e| normalize_extension(e)).collect();
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        if !path.is_dir() {
            return Err(AppError::Config(format!("Path does not exist: {:?}", path)));
        }

        let walker = WalkDir::new(path)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.path()));

        for entry in walker {
            let entry = entry.map_err(|e| AppError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let keep = extension_of(entry.path())
                .map(|ext| allowed.contains(&normalize_extension(&ext)))
                .unwrap_or(false);
            if keep {
                files.push(entry.into_path());
            }
        }
    }

    // A file can be named directly and also reached through its directory
    let mut seen = HashSet::new();
    files.retain(|path| {
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
        seen.insert(key)
    });
    Ok(files)
}

/// Separate files larger than `max_bytes` so they are never read into memory.
pub(crate) fn split_oversized(
    files: Vec<PathBuf>,
    max_bytes: u64,
) -> AppResult<(Vec<PathBuf>, Vec<(PathBuf, u64)>)> {
    let mut keep = Vec::with_capacity(files.len());
    let mut oversized = Vec::new();
    for path in files {
        let len = std::fs::metadata(&path)?.len();
        if len > max_bytes {
            oversized.push((path, len));
        } else {
            keep.push(path);
        }
    }
    Ok((keep, oversized))
}

async fn read_uploads(files: Vec<PathBuf>) -> AppResult<Vec<UploadedFile>> {
    futures::stream::iter(files)
        .map(|path| async move {
            let bytes = tokio::fs::read(&path).await?;
            Ok::<_, AppError>(to_upload(&path, bytes))
        })
        .buffered(READ_CONCURRENCY)
        .try_collect()
        .await
}

fn to_upload(path: &Path, bytes: Vec<u8>) -> UploadedFile {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    UploadedFile::new(name, bytes, extension_of(path).unwrap_or_default())
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().into_owned())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

fn print_summary(summary: &IngestionSummary) {
    for outcome in &summary.outcomes {
        println!("{}", describe(outcome));
    }
    println!();
    println!(
        "Ingested {} of {} files ({} chunks) in {:.2}s",
        summary.success_count,
        summary.outcomes.len(),
        summary.total_chunks_added,
        summary.duration_secs
    );
    if summary.cancelled {
        println!("Ingestion was cancelled before all files were processed");
    }
}

fn describe(outcome: &FileOutcome) -> String {
    match (&outcome.error, &outcome.document_id) {
        (None, Some(id)) => format!(
            "ok     {} ({} chunks) id={}",
            outcome.document_name, outcome.chunk_count, id
        ),
        (None, None) => format!("ok     {}", outcome.document_name),
        (Some(report), _) => format!(
            "error  {} [{}/{}] {}",
            outcome.document_name, report.stage, report.kind, report.message
        ),
    }
}
