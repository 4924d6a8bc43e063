//! Sage CLI
//!
//! Main entry point for the sage command-line tool.
//! Routes questions to the text or visual pipeline and manages the
//! knowledge base and intent model.

mod commands;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use commands::{AskCommand, KnowledgeCommand, TrainCommand};
use sage_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Sage - intent-routing assistant over a local knowledge base
#[derive(Parser, Debug)]
#[command(name = "sage")]
#[command(about = "Intent-routing assistant over a local knowledge base", long_about = None)]
#[command(version)]
struct Cli {
    /// Question to answer (shorthand for `sage ask --query`)
    #[arg(long)]
    query: Option<String>,

    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "SAGE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "SAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (ollama, openai, groq)
    #[arg(short, long, global = true, env = "SAGE_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "SAGE_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a question
    Ask(AskCommand),

    /// Train the intent classifier from a labelled CSV file
    Train(TrainCommand),

    /// Knowledge base management
    Knowledge(KnowledgeCommand),
}

impl Cli {
    /// Reject a top-level `--query` combined with a subcommand.
    fn check_query_usage(&self) -> Result<(), clap::Error> {
        match (&self.query, &self.command) {
            (Some(_), Some(_)) => Err(Cli::command().error(
                ErrorKind::ArgumentConflict,
                "--query cannot be combined with a subcommand (use `sage ask --query`)",
            )),
            _ => Ok(()),
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();
    if let Err(e) = cli.check_query_usage() {
        e.exit();
    }

    let config = AppConfig::load()?.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Sage CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.ensure_sage_dir()?;

    let command = match (cli.command, cli.query) {
        (Some(command), _) => command,
        (None, query) => Commands::Ask(AskCommand::from_query(query)),
    };

    let command_name = match &command {
        Commands::Ask(_) => "ask",
        Commands::Train(_) => "train",
        Commands::Knowledge(_) => "knowledge",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Train(cmd) => cmd.execute(&config),
        Commands::Knowledge(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
