//! Document management commands: list, remove and clear.

use clap::Args;
use docent_core::{config::AppConfig, AppError, AppResult};

use super::{close_base, open_base, print_json, surface};

/// List indexed documents
#[derive(Args, Debug)]
pub struct DocumentsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DocumentsCommand {
    pub async fn execute(&self, config: &AppConfig, base: &str) -> AppResult<()> {
        let kb = open_base(config, base).await?;
        let documents = kb.documents().await;

        if self.json {
            print_json(&documents)?;
        } else if documents.is_empty() {
            println!("No documents in '{}'", base);
        } else {
            for doc in &documents {
                println!(
                    "{}  {} ({} chunks)",
                    doc.source_document_id, doc.source_document_name, doc.chunk_count
                );
            }
        }

        close_base(kb).await
    }
}

/// Remove one document from the index
#[derive(Args, Debug)]
pub struct RemoveCommand {
    /// Document id, as printed by `ingest` or `documents`
    pub document_id: String,
}

impl RemoveCommand {
    pub async fn execute(&self, config: &AppConfig, base: &str) -> AppResult<()> {
        tracing::info!("Removing document '{}' from base '{}'", self.document_id, base);

        let kb = open_base(config, base).await?;
        let removed = kb.remove(&self.document_id).await.map_err(surface)?;
        close_base(kb).await?;

        if removed == 0 {
            return Err(AppError::Knowledge(format!(
                "No document with id '{}' in '{}'",
                self.document_id, base
            )));
        }

        println!("Removed {} chunks", removed);
        Ok(())
    }
}

/// Remove every document from the index
#[derive(Args, Debug)]
pub struct ClearCommand {
    /// Skip confirmation
    #[arg(short, long)]
    pub yes: bool,
}

impl ClearCommand {
    pub async fn execute(&self, config: &AppConfig, base: &str) -> AppResult<()> {
        if !self.yes {
            return Err(AppError::Config(format!(
                "Refusing to clear '{}' without --yes",
                base
            )));
        }

        tracing::info!("Clearing base '{}'", base);

        let kb = open_base(config, base).await?;
        kb.clear().await.map_err(surface)?;
        close_base(kb).await?;

        println!("Knowledge base '{}' cleared", base);
        Ok(())
    }
}
