//! webgrade CLI - Main Entry Point
//!
//! The same binary is the orchestrator, the per-model runner and the
//! per-prompt worker; the pools re-execute it with the `model` and
//! `prompt` subcommands.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use webgrade_cli::commands::{self, model, prompt, run, scores, Context};
use webgrade_cli::config::{WebgradeConfig, DEFAULT_CONFIG_FILE};
use webgrade_cli::output::{self, print_error};

/// webgrade - automated quality grading for generated web pages
#[derive(Parser)]
#[command(name = "webgrade")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults to ./webgrade.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Benchmark every model of a challenge
    Run(run::RunArgs),

    /// Benchmark one model directory
    Model(model::ModelArgs),

    /// Analyse a single prompt (used by `model`)
    #[command(hide = true)]
    Prompt(prompt::PromptArgs),

    /// Show scores of finished runs
    Scores(scores::ScoresArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let config_file = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = match WebgradeConfig::load(&config_file) {
        Ok(config) => config,
        Err(e) => {
            print_error(&format!("Invalid configuration {}: {}", config_file.display(), e));
            std::process::exit(2);
        }
    };
    let ctx = Context {
        config,
        config_path: cli.config,
        format: cli.format,
    };

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, &ctx).await?,
        Commands::Model(args) => commands::model::execute(args, &ctx).await?,
        Commands::Prompt(args) => commands::prompt::execute(args, &ctx).await?,
        Commands::Scores(args) => commands::scores::execute(args, &ctx).await?,
        Commands::Version => {
            println!("webgrade v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
