//! Stats command handler.

use clap::Args;
use docent_core::{config::AppConfig, AppResult};

use super::{close_base, open_base, print_json};

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig, base: &str) -> AppResult<()> {
        let kb = open_base(config, base).await?;
        let stats = kb.stats().await;

        if self.json {
            let output = serde_json::json!({
                "base": base,
                "embedding": kb.index().embedder().provider_name(),
                "embeddingModel": kb.index().embedder().model_name(),
                "stats": stats,
            });
            print_json(&output)?;
        } else {
            println!("Knowledge base: {}", base);
            println!("  State: {}", stats.state.as_str());
            println!("  Documents: {}", stats.document_count);
            println!("  Chunks: {}", stats.chunk_count);
            println!("  Metric: {}", stats.metric.as_str());
            match stats.dimension {
                Some(dimension) => println!("  Dimension: {}", dimension),
                None => println!("  Dimension: (not yet known)"),
            }
            println!(
                "  Embedding: {} ({})",
                kb.index().embedder().provider_name(),
                kb.index().embedder().model_name()
            );
            if stats.unpersisted_changes {
                println!("  Warning: changes not yet written to disk");
            }
        }

        close_base(kb).await
    }
}
