//! Search command handler.
//!
//! Shows what retrieval returns for a query without calling the generator.

use clap::Args;
use docent_core::{config::AppConfig, AppResult};
use docent_knowledge::{EmptyReason, SearchOutcome, SourceCitation};

use super::{close_base, open_base, print_json, surface};

/// Show the chunks a query retrieves, without generating
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Query text
    pub query: String,

    /// Number of chunks to retrieve (default: the base's top_k)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig, base: &str) -> AppResult<()> {
        tracing::info!("Executing search command for base '{}'", base);

        let kb = open_base(config, base).await?;
        let outcome = kb
            .search(&self.query, self.top_k)
            .await
            .map_err(surface)?;

        let hits: Vec<SourceCitation> = outcome.hits().iter().map(SourceCitation::from).collect();

        if self.json {
            print_json(&hits)?;
        } else {
            match outcome {
                SearchOutcome::Empty(EmptyReason::EmptyIndex) => {
                    println!("The knowledge base '{}' has no documents", base)
                }
                SearchOutcome::Empty(EmptyReason::EmptyQuery) => println!("The query is empty"),
                SearchOutcome::Hits(_) => {
                    for (rank, hit) in hits.iter().enumerate() {
                        println!(
                            "{}. [{:.3}] {} #{}",
                            rank + 1,
                            hit.score,
                            hit.document_name,
                            hit.position
                        );
                        println!("   {}", hit.snippet.replace('\n', " "));
                    }
                }
            }
        }

        close_base(kb).await
    }
}
