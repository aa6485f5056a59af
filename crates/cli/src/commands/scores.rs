//! Scores Command
//!
//! Collects the model summaries found under an output directory and shows
//! how the technical and adherence parts make up each model's score.

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;
use webgrade_common::scoring::{percentage, ADHERENCE_WEIGHT, TECHNICAL_WEIGHT};
use webgrade_common::{ModelSummary, MODEL_SUMMARY_FILE};

use super::Context;
use crate::output::{print_list, TableDisplay};

/// Scores command arguments
#[derive(Args, Debug)]
pub struct ScoresArgs {
    /// Output directory of `webgrade run`
    pub output_dir: PathBuf,

    /// Only show runs of this challenge
    #[arg(long)]
    pub challenge: Option<String>,
}

/// One model run's score breakdown
#[derive(Debug, Clone, Serialize)]
pub struct ScoreRow {
    pub model: String,
    pub run_id: String,
    pub prompts_analyzed: usize,
    pub prompts_configured: usize,
    pub tq_contribution_pct: f64,
    pub adh_contribution_pct: f64,
    pub overall_score_pct: f64,
}

impl ScoreRow {
    pub fn from_summary(summary: &ModelSummary, run_id: impl Into<String>) -> Self {
        let agg = &summary.aggregate_scores;
        Self {
            model: summary.benchmark_run_name.clone(),
            run_id: run_id.into(),
            prompts_analyzed: summary.prompts_analyzed_successfully,
            prompts_configured: summary.total_prompts_configured,
            tq_contribution_pct: percentage(agg.total_tq_earned, agg.total_tq_max) * TECHNICAL_WEIGHT,
            adh_contribution_pct: percentage(agg.total_adh_earned, agg.total_adh_max) * ADHERENCE_WEIGHT,
            overall_score_pct: agg.overall_weighted_score_from_totals,
        }
    }
}

impl TableDisplay for ScoreRow {
    fn headers() -> Vec<&'static str> {
        vec!["Model", "Run", "Prompts", "Technical (30%)", "Adherence (70%)", "Overall"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.model.clone(),
            self.run_id.clone(),
            format!("{}/{}", self.prompts_analyzed, self.prompts_configured),
            format!("{:.2}", self.tq_contribution_pct),
            format!("{:.2}", self.adh_contribution_pct),
            format!("{:.2}", self.overall_score_pct),
        ]
    }
}

/// Every readable model summary below `root`, best overall score first
pub fn collect_scores(root: &Path) -> Vec<ScoreRow> {
    let mut rows: Vec<ScoreRow> = WalkDir::new(root)
        .max_depth(4)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == MODEL_SUMMARY_FILE)
        .filter_map(|entry| {
            let path = entry.path();
            match read_summary(path) {
                Ok(summary) => Some(ScoreRow::from_summary(&summary, run_id(path))),
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    None
                }
            }
        })
        .collect();

    rows.sort_by(|a, b| b.overall_score_pct.total_cmp(&a.overall_score_pct));
    rows
}

fn read_summary(path: &Path) -> Result<ModelSummary> {
    Ok(serde_json::from_slice(&std::fs::read(path)?)?)
}

/// `run_<timestamp>` directory holding the model run, if any
fn run_id(summary_path: &Path) -> String {
    summary_path
        .parent()
        .and_then(Path::parent)
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| n.starts_with("run_"))
        .unwrap_or_else(|| "-".to_string())
}

pub async fn execute(args: ScoresArgs, ctx: &Context) -> Result<()> {
    let root = match &args.challenge {
        Some(challenge) => args.output_dir.join(challenge),
        None => args.output_dir.clone(),
    };
    if !root.is_dir() {
        bail!("Directory not found: {}", root.display());
    }

    print_list(&collect_scores(&root), ctx.format);
    Ok(())
}
