//! Docent CLI
//!
//! Main entry point for the `docent` command-line tool.
//! Ingests documents into a local knowledge base and answers questions
//! grounded in them.

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    AskCommand, ClearCommand, DocumentsCommand, IngestCommand, RemoveCommand, SearchCommand,
    StatsCommand,
};
use docent_core::{config::AppConfig, logging, AppResult};
use docent_knowledge::DEFAULT_BASE;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Docent - local document ingestion and grounded question answering
#[derive(Parser, Debug)]
#[command(name = "docent")]
#[command(about = "Local document ingestion and grounded question answering", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "DOCENT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "DOCENT_CONFIG")]
    config: Option<PathBuf>,

    /// Knowledge base name
    #[arg(short, long, global = true, env = "DOCENT_BASE", default_value = DEFAULT_BASE)]
    base: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Text generation provider
    #[arg(short, long, global = true, env = "DOCENT_PROVIDER")]
    provider: Option<String>,

    /// Generation model identifier
    #[arg(short, long, global = true, env = "DOCENT_MODEL")]
    model: Option<String>,

    /// Provider endpoint URL
    #[arg(long, global = true, env = "DOCENT_ENDPOINT")]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract, chunk, embed and index documents
    Ingest(IngestCommand),

    /// Answer a question from the indexed documents
    Ask(AskCommand),

    /// Show the chunks a query retrieves, without generating
    Search(SearchCommand),

    /// List indexed documents
    Documents(DocumentsCommand),

    /// Remove one document from the index
    Remove(RemoveCommand),

    /// Remove every document from the index
    Clear(ClearCommand),

    /// Show index statistics
    Stats(StatsCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Ingest(_) => "ingest",
            Commands::Ask(_) => "ask",
            Commands::Search(_) => "search",
            Commands::Documents(_) => "documents",
            Commands::Remove(_) => "remove",
            Commands::Clear(_) => "clear",
            Commands::Stats(_) => "stats",
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let mut config = AppConfig::load()?.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.endpoint,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    config.log_json |= cli.log_json;

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;

    tracing::info!("Docent CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.validate()?;
    config.ensure_state_dir()?;

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let span = tracing::info_span!("command", name = cli.command.name(), base = %cli.base);
    let result = dispatch(cli.command, &config, &cli.base, &cancel)
        .instrument(span)
        .await;

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::debug!("Command failed: {}", e),
    }

    result
}

async fn dispatch(
    command: Commands,
    config: &AppConfig,
    base: &str,
    cancel: &CancellationToken,
) -> AppResult<()> {
    match command {
        Commands::Ingest(cmd) => cmd.execute(config, base, cancel).await,
        Commands::Ask(cmd) => cmd.execute(config, base, cancel).await,
        Commands::Search(cmd) => cmd.execute(config, base).await,
        Commands::Documents(cmd) => cmd.execute(config, base).await,
        Commands::Remove(cmd) => cmd.execute(config, base).await,
        Commands::Clear(cmd) => cmd.execute(config, base).await,
        Commands::Stats(cmd) => cmd.execute(config, base).await,
    }
}

/// Cancel in-flight work on the first Ctrl-C.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling");
            cancel.cancel();
        }
    });
}
