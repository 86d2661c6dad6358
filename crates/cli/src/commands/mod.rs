//! Command handlers for the Docent CLI.
//!
//! Each command opens the selected knowledge base, does its work and shuts the
//! base down so pending snapshot writes are retried before exit.

pub mod ask;
pub mod documents;
pub mod ingest;
pub mod search;
pub mod stats;

pub use ask::AskCommand;
pub use documents::{ClearCommand, DocumentsCommand, RemoveCommand};
pub use ingest::IngestCommand;
pub use search::SearchCommand;
pub use stats::StatsCommand;

use docent_core::{AppConfig, AppError, AppResult};
use docent_knowledge::{Failure, KnowledgeBase};
use serde::Serialize;

pub(crate) async fn open_base(config: &AppConfig, base: &str) -> AppResult<KnowledgeBase> {
    KnowledgeBase::open(config, base).await
}

/// Log a failure with its stage and kind, then hand it to the caller.
pub(crate) fn surface(failure: Failure) -> AppError {
    tracing::error!(
        stage = %failure.stage,
        kind = %failure.kind(),
        "{}",
        failure.error
    );
    failure.into()
}

/// Close the base, surfacing a final persistence failure.
pub(crate) async fn close_base(base: KnowledgeBase) -> AppResult<()> {
    base.shutdown().await.map_err(surface)
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
