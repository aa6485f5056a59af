//! Model Command
//!
//! Runs every prompt of a benchmark definition against one model's HTML
//! directory. Each prompt is analysed in its own `webgrade prompt` process;
//! the per-prompt reports are folded into `MASTER_BENCHMARK_SUMMARY.json`.

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use webgrade_common::{BenchmarkDefinition, ModelSummary, PromptReport, PromptSpec, RunStatus, MODEL_SUMMARY_FILE};
use webgrade_engine::{prompt_output_dir, report_path, write_report};

use super::Context;
use crate::output::{print_list, print_success, TableDisplay};
use crate::pool::{run_bounded, tail, ChildOutcome, WorkerCommand};

/// Directory receiving model runs when none is given
pub const DEFAULT_OUTPUT_BASE: &str = "ui_benchmark_master_runs";

/// Model command arguments
#[derive(Args, Debug)]
pub struct ModelArgs {
    /// Benchmark definition JSON
    pub definition: PathBuf,

    /// Directory holding the model's generated HTML files
    pub html_dir: PathBuf,

    /// Directory receiving the timestamped model run
    #[arg(default_value = DEFAULT_OUTPUT_BASE)]
    pub output_base: PathBuf,

    /// Prompts analysed concurrently
    #[arg(long)]
    pub workers: Option<usize>,
}

/// Layout of one model run
pub struct ModelRun<'a> {
    pub definition: &'a BenchmarkDefinition,
    pub definition_path: &'a Path,
    pub html_dir: &'a Path,
    pub run_dir: &'a Path,
    pub timestamp: &'a str,
}

/// Pool of prompt worker processes
pub struct PromptPool {
    worker: WorkerCommand,
    workers: usize,
    timeout: Duration,
}

impl PromptPool {
    pub fn new(worker: WorkerCommand, workers: usize, timeout: Duration) -> Self {
        Self {
            worker,
            workers,
            timeout,
        }
    }

    /// Analyse every prompt; reports come back in definition order
    pub async fn analyze(&self, run: &ModelRun<'_>) -> Vec<PromptReport> {
        let prompts: Vec<&PromptSpec> = run.definition.prompts.iter().collect();
        run_bounded(prompts, self.workers, |prompt| self.analyze_prompt(run, prompt)).await
    }

    async fn analyze_prompt(&self, run: &ModelRun<'_>, prompt: &PromptSpec) -> PromptReport {
        let Some(prompt_id) = prompt.prompt_id.as_deref() else {
            warn!("Skipping prompt without prompt_id: {:?}", prompt.prompt_description);
            return PromptReport::not_analyzed(
                "UNKNOWN",
                "",
                prompt.prompt_description.clone(),
                RunStatus::NoPromptId,
                "Prompt config has no prompt_id",
                "",
            );
        };

        info!("Starting prompt {}", prompt_id);
        let outcome = self
            .worker
            .clone()
            .arg(run.definition_path)
            .arg(prompt_id)
            .arg(run.html_dir)
            .arg(run.run_dir)
            .arg("--timestamp")
            .arg(run.timestamp)
            .run(self.timeout)
            .await;

        collect_prompt_result(outcome, run, prompt, prompt_id, self.timeout).await
    }
}

/// Turn a finished prompt worker into its report
///
/// A worker that left no readable report is recorded as crashed and a killed
/// one as timed out; both get a report written in the worker's place.
pub async fn collect_prompt_result(
    outcome: ChildOutcome,
    run: &ModelRun<'_>,
    prompt: &PromptSpec,
    prompt_id: &str,
    timeout: Duration,
) -> PromptReport {
    let path = report_path(run.run_dir, prompt_id, run.timestamp);

    let (status, message) = match outcome {
        ChildOutcome::TimedOut => (
            RunStatus::Timeout,
            format!("Prompt worker exceeded {}s and was killed", timeout.as_secs()),
        ),
        ChildOutcome::SpawnFailed(e) => (
            RunStatus::WorkerCrashed,
            format!("Could not start prompt worker: {}", e),
        ),
        ChildOutcome::Exited { code, stderr, .. } => match read_report(&path).await {
            Ok(report) => return report,
            Err(e) => {
                let code = code.map_or_else(|| "a signal".to_string(), |c| format!("code {}", c));
                (
                    RunStatus::WorkerCrashed,
                    format!(
                        "Prompt worker exited with {} without a usable report ({}). Stderr: {}",
                        code,
                        e,
                        tail(&stderr, 500)
                    ),
                )
            }
        },
    };

    error!("Prompt {}: {}", prompt_id, message);
    let output_dir = prompt_output_dir(run.run_dir, prompt_id, run.timestamp);
    let report = PromptReport::not_analyzed(
        prompt_id,
        prompt.html_file_name().unwrap_or_default(),
        prompt.prompt_description.clone(),
        status,
        message,
        output_dir.display().to_string(),
    );
    if let Err(e) = write_report(&report, &output_dir).await {
        warn!("Could not write report for {}: {}", prompt_id, e);
    }
    report
}

async fn read_report(path: &Path) -> Result<PromptReport> {
    let raw = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Run the whole model and write its summary
pub async fn run_model(args: &ModelArgs, ctx: &Context) -> Result<(ModelSummary, PathBuf)> {
    if !args.definition.is_file() {
        bail!("Benchmark definition not found: {}", args.definition.display());
    }
    if !args.html_dir.is_dir() {
        bail!("HTML directory not found: {}", args.html_dir.display());
    }
    let definition = BenchmarkDefinition::load(&args.definition)?;

    let model_name = args
        .html_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown_model".to_string());
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
    let run_dir = args.output_base.join(format!("{}_{}", model_name, timestamp));
    std::fs::create_dir_all(&run_dir)?;

    let workers = ctx.config.pool.prompt_workers(args.workers);
    info!(
        "Model {}: {} prompts with up to {} workers, output in {}",
        model_name,
        definition.prompts.len(),
        workers,
        run_dir.display()
    );

    let pool = PromptPool::new(ctx.worker("prompt")?, workers, ctx.config.pool.prompt_timeout());
    let run = ModelRun {
        definition: &definition,
        definition_path: &args.definition,
        html_dir: &args.html_dir,
        run_dir: &run_dir,
        timestamp: &timestamp,
    };
    let reports = pool.analyze(&run).await;

    let config_name = args
        .definition
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let summary = ModelSummary::build(
        model_name,
        config_name,
        args.html_dir.display().to_string(),
        definition.prompts.len(),
        &reports,
    );
    write_summary(&summary, &run_dir)?;
    Ok((summary, run_dir))
}

/// Write `MASTER_BENCHMARK_SUMMARY.json` into the run directory
pub fn write_summary(summary: &ModelSummary, run_dir: &Path) -> Result<PathBuf> {
    let path = run_dir.join(MODEL_SUMMARY_FILE);
    std::fs::write(&path, serde_json::to_vec_pretty(summary)?)?;
    Ok(path)
}

/// Prompt result display wrapper
#[derive(Serialize)]
pub struct PromptResultDisplay {
    pub prompt_id: String,
    pub status: RunStatus,
    pub overall_weighted_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableDisplay for PromptResultDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Prompt", "Status", "Weighted %", "Error"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.prompt_id.clone(),
            self.status.to_string(),
            format!("{:.2}", self.overall_weighted_percentage),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

pub async fn execute(args: ModelArgs, ctx: &Context) -> Result<()> {
    let (summary, run_dir) = run_model(&args, ctx).await?;

    let rows: Vec<PromptResultDisplay> = summary
        .individual_prompt_results
        .iter()
        .map(|entry| PromptResultDisplay {
            prompt_id: entry.prompt_id.clone(),
            status: entry.status,
            overall_weighted_percentage: entry.overall_weighted_percentage,
            error: entry.error.clone(),
        })
        .collect();
    print_list(&rows, ctx.format);

    let agg = &summary.aggregate_scores;
    println!(
        "Analysed {}/{} prompts. Technical quality {:.2}%, adherence {:.2}%, weighted {:.2}%",
        summary.prompts_analyzed_successfully,
        summary.total_prompts_configured,
        agg.technical_quality_percentage,
        agg.prompt_adherence_percentage,
        agg.overall_weighted_score_from_totals
    );
    print_success(&format!(
        "Summary written to {}",
        run_dir.join(MODEL_SUMMARY_FILE).display()
    ));
    Ok(())
}
