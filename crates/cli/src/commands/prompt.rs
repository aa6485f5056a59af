//! Prompt worker
//!
//! Internal command run by the model pool, one process per prompt. It
//! always leaves a detailed report in the prompt's output directory unless
//! the definition cannot be read at all.

use anyhow::{Context as _, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::info;
use webgrade_common::BenchmarkDefinition;
use webgrade_engine::{run_prompt, PromptJob};

use super::Context;

/// Prompt worker arguments
#[derive(Args, Debug)]
pub struct PromptArgs {
    /// Benchmark definition JSON
    pub definition: PathBuf,

    /// Prompt to analyse
    pub prompt_id: String,

    /// Directory holding the model's generated HTML files
    pub html_dir: PathBuf,

    /// Model run directory receiving the prompt's output directory
    pub run_dir: PathBuf,

    /// Timestamp shared by every prompt of the model run
    #[arg(long)]
    pub timestamp: String,
}

pub async fn execute(args: PromptArgs, ctx: &Context) -> Result<()> {
    let definition = BenchmarkDefinition::load(&args.definition)?;
    let prompt = definition
        .prompt(&args.prompt_id)
        .with_context(|| format!("in {}", args.definition.display()))?;

    let report = run_prompt(
        &ctx.config.engine,
        &PromptJob {
            prompt,
            html_dir: &args.html_dir,
            run_dir: &args.run_dir,
            timestamp: &args.timestamp,
        },
    )
    .await;

    info!(
        "Prompt {} finished: {} ({:.2}%)",
        report.prompt_id,
        report.status,
        report.weighted_percentage()
    );
    Ok(())
}
