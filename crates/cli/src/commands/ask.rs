//! Ask command handler.
//!
//! Answers a question from the knowledge base and lists the cited sources.

use clap::Args;
use docent_core::{config::AppConfig, AppError, AppResult};
use docent_knowledge::AnswerResult;
use tokio_util::sync::CancellationToken;

use super::{close_base, open_base, print_json, surface};

/// Answer a question from the indexed documents
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<std::path::PathBuf>,

    /// Number of chunks to retrieve (default: the base's top_k)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(
        &self,
        config: &AppConfig,
        base: &str,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        tracing::info!("Executing ask command for base '{}'", base);

        let question = self.question_text().await?;
        let kb = open_base(config, base).await?;

        let result = kb
            .answer(&question, self.top_k, cancel)
            .await
            .map_err(surface)?;

        tracing::debug!(
            "Answer: max_score={:.3}, low_confidence={}, sources={}",
            result.max_score,
            result.low_confidence,
            result.sources.len()
        );

        if self.json {
            print_json(&result)?;
        } else {
            print_answer(&result);
        }

        close_base(kb).await
    }

    async fn question_text(&self) -> AppResult<String> {
        match (&self.question, &self.file) {
            (Some(question), _) => Ok(question.clone()),
            (None, Some(path)) => Ok(tokio::fs::read_to_string(path).await?),
            (None, None) => Err(AppError::Config(
                "No question provided. Pass it as an argument or with --file".to_string(),
            )),
        }
    }
}

fn print_answer(result: &AnswerResult) {
    println!("{}", result.answer.trim());
    println!();

    if result.low_confidence {
        println!(
            "Note: the best match scored {:.2}; the sources may not cover this question.",
            result.max_score
        );
        println!();
    }

    println!("Sources:");
    for source in &result.sources {
        match source.page {
            Some(page) => println!(
                "- {} p.{} (chunk {}, score {:.3})",
                source.document_name, page, source.position, source.score
            ),
            None => println!(
                "- {} (chunk {}, score {:.3})",
                source.document_name, source.position, source.score
            ),
        }
    }
}
