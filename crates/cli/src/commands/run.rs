//! Run Command
//!
//! Benchmarks every model directory of a challenge. Each model runs in its
//! own `webgrade model` process, at most `max_models` at a time.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};
use webgrade_common::ModelRunStatus;

use super::Context;
use crate::config::PROMPT_WORKERS_ENV;
use crate::output::{print_list, print_info, TableDisplay};
use crate::pool::{run_bounded, tail, ChildOutcome, WorkerCommand};

/// Benchmark definition looked up in the challenge directory, then the base directory
pub const BENCHMARK_CONFIG_FILE: &str = "master_prompts_benchmark_config.json";

/// Run command arguments
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory holding one sub-directory per challenge
    pub base_html_dir: PathBuf,

    /// Challenge to benchmark; each of its sub-directories is a model
    pub challenge: String,

    /// Directory receiving `<challenge>/run_<timestamp>`
    pub output_dir: PathBuf,

    /// Models analysed concurrently
    #[arg(long)]
    pub max_models: Option<usize>,

    /// Prompts analysed concurrently inside each model
    #[arg(long)]
    pub workers_per_model: Option<usize>,
}

/// Outcome of one model process
#[derive(Debug, Clone, Serialize)]
pub struct ModelRunResult {
    pub model: String,
    pub status: ModelRunStatus,
    pub output_base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableDisplay for ModelRunResult {
    fn headers() -> Vec<&'static str> {
        vec!["Model", "Status", "Output", "Error"]
    }

    fn row(&self) -> Vec<String> {
        let status = match self.status {
            ModelRunStatus::Success => self.status.to_string().green().to_string(),
            ModelRunStatus::Timeout => self.status.to_string().yellow().to_string(),
            _ => self.status.to_string().red().to_string(),
        };
        vec![
            self.model.clone(),
            status,
            self.output_base.clone(),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

/// Find the benchmark definition for a challenge
pub fn locate_benchmark_config(base_html_dir: &Path, challenge: &str) -> Option<PathBuf> {
    [base_html_dir.join(challenge), base_html_dir.to_path_buf()]
        .into_iter()
        .map(|dir| dir.join(BENCHMARK_CONFIG_FILE))
        .find(|path| path.is_file())
}

/// Model directories of a challenge, sorted by name
pub fn discover_models(challenge_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut models = Vec::new();
    for entry in std::fs::read_dir(challenge_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            models.push(entry.path());
        }
    }
    models.sort();
    Ok(models)
}

/// Pool of model worker processes
pub struct ModelPool {
    worker: WorkerCommand,
    max_models: usize,
    timeout: Duration,
    prompt_workers: Option<usize>,
}

impl ModelPool {
    pub fn new(worker: WorkerCommand, max_models: usize, timeout: Duration, prompt_workers: Option<usize>) -> Self {
        Self {
            worker,
            max_models,
            timeout,
            prompt_workers,
        }
    }

    /// Run every model; without a benchmark definition nothing is spawned
    pub async fn run(&self, models: &[PathBuf], config: Option<&Path>, output_base: &Path) -> Vec<ModelRunResult> {
        let Some(config) = config else {
            return models
                .iter()
                .map(|model| ModelRunResult {
                    model: model_name(model),
                    status: ModelRunStatus::ConfigNotFound,
                    output_base: output_base.display().to_string(),
                    error: Some(format!("{} not found", BENCHMARK_CONFIG_FILE)),
                })
                .collect();
        };

        run_bounded(models.iter().collect(), self.max_models, |model| {
            self.run_model(model, config, output_base)
        })
        .await
    }

    async fn run_model(&self, model: &Path, config: &Path, output_base: &Path) -> ModelRunResult {
        let name = model_name(model);
        info!("Starting model {}", name);

        let mut cmd = self.worker.clone().arg(config).arg(model).arg(output_base);
        if let Some(workers) = self.prompt_workers {
            cmd = cmd.env(PROMPT_WORKERS_ENV, workers.to_string());
        }
        let outcome = cmd.run(self.timeout).await;

        let (status, error) = match outcome {
            ChildOutcome::Exited { code: Some(0), .. } => (ModelRunStatus::Success, None),
            ChildOutcome::Exited { code, stderr, .. } => (
                ModelRunStatus::AnalyzerFailure,
                Some(format!(
                    "Exit code {}: {}",
                    code.map_or_else(|| "none".to_string(), |c| c.to_string()),
                    tail(&stderr, 300)
                )),
            ),
            ChildOutcome::TimedOut => (
                ModelRunStatus::Timeout,
                Some(format!("Model exceeded {}s and was killed", self.timeout.as_secs())),
            ),
            ChildOutcome::SpawnFailed(e) => (ModelRunStatus::SpawnError, Some(e)),
        };

        match &error {
            Some(e) => error!("Model {} finished with {}: {}", name, status, e),
            None => info!("Model {} finished", name),
        }
        ModelRunResult {
            model: name,
            status,
            output_base: output_base.display().to_string(),
            error,
        }
    }
}

fn model_name(model: &Path) -> String {
    model
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| model.display().to_string())
}

/// Run every model of a challenge
pub async fn run_challenge(args: &RunArgs, ctx: &Context) -> Result<(Vec<ModelRunResult>, PathBuf)> {
    let challenge_dir = args.base_html_dir.join(&args.challenge);
    if !challenge_dir.is_dir() {
        bail!("Challenge directory not found: {}", challenge_dir.display());
    }
    let models = discover_models(&challenge_dir)?;
    if models.is_empty() {
        bail!("No model directories in {}", challenge_dir.display());
    }

    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let output_base = args
        .output_dir
        .join(&args.challenge)
        .join(format!("run_{}", timestamp));
    std::fs::create_dir_all(&output_base)?;

    let config = locate_benchmark_config(&args.base_html_dir, &args.challenge);
    match &config {
        Some(path) => info!("Using benchmark definition {}", path.display()),
        None => error!(
            "{} not found in {} or {}",
            BENCHMARK_CONFIG_FILE,
            challenge_dir.display(),
            args.base_html_dir.display()
        ),
    }

    let max_models = args.max_models.unwrap_or(ctx.config.pool.max_models).max(1);
    info!("Benchmarking {} models, {} at a time", models.len(), max_models);

    let pool = ModelPool::new(
        ctx.worker("model")?,
        max_models,
        ctx.config.pool.model_timeout(),
        args.workers_per_model,
    );
    let results = pool.run(&models, config.as_deref(), &output_base).await;
    Ok((results, output_base))
}

pub async fn execute(args: RunArgs, ctx: &Context) -> Result<()> {
    let (results, output_base) = run_challenge(&args, ctx).await?;

    println!();
    println!("{}", "Overall benchmark summary".bold());
    print_list(&results, ctx.format);

    let succeeded = results
        .iter()
        .filter(|r| r.status == ModelRunStatus::Success)
        .count();
    let line = format!("{}/{} models completed", succeeded, results.len());
    if succeeded == results.len() {
        println!("{}", line.green());
    } else {
        println!("{}", line.red());
    }
    print_info(&format!("Outputs in {}", output_base.display()));
    Ok(())
}
