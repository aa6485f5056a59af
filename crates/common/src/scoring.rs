//! Score aggregation
//!
//! Category maxima are fixed up front from the viewport plan
//! ([`CategoryPlan`]); a [`ScoreBoard`] then accumulates findings for one
//! prompt run. Reports and model summaries are plain serializable values
//! built from a finished board.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::debug;

use crate::finding::{Category, Finding, Status};
use crate::types::ViewportPlan;

pub const TECHNICAL_WEIGHT: f64 = 0.3;
pub const ADHERENCE_WEIGHT: f64 = 0.7;

const ALREADY_AWARDED: &str = "(Points already awarded)";

/// `earned / max * 100`, or 0 when nothing was available
pub fn percentage(earned: f64, max: f64) -> f64 {
    if max > 0.0 {
        earned / max * 100.0
    } else {
        0.0
    }
}

pub fn weighted_percentage(technical_pct: f64, adherence_pct: f64) -> f64 {
    technical_pct * TECHNICAL_WEIGHT + adherence_pct * ADHERENCE_WEIGHT
}

/// Per-category maxima derived from a viewport plan
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryPlan {
    maxima: BTreeMap<Category, f64>,
}

impl CategoryPlan {
    pub fn from_viewports(plan: &ViewportPlan) -> Self {
        let factor = if plan.covers_desktop_and_mobile() { 2.0 } else { 1.0 };
        let maxima = Category::TECHNICAL
            .iter()
            .map(|&c| {
                let max = if c.is_viewport_scalable() {
                    c.base_cap() * factor
                } else {
                    c.base_cap()
                };
                (c, max)
            })
            .collect();
        Self { maxima }
    }

    pub fn max(&self, category: Category) -> f64 {
        self.maxima.get(&category).copied().unwrap_or(0.0)
    }

    pub fn technical_max(&self) -> f64 {
        self.maxima.values().sum()
    }
}

/// Earned points and findings of one category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub earned: f64,
    pub max: f64,
    pub details: Vec<Finding>,
}

/// Accumulates findings for a single prompt run
#[derive(Debug)]
pub struct ScoreBoard {
    plan: CategoryPlan,
    categories: BTreeMap<Category, CategoryScore>,
    scoring_viewport: HashMap<Category, String>,
    adherence: CategoryScore,
    awarded: HashSet<String>,
    page_load_errors: Vec<String>,
}

impl ScoreBoard {
    pub fn new(viewports: &ViewportPlan, adherence_max: f64) -> Self {
        let plan = CategoryPlan::from_viewports(viewports);
        let categories = Category::TECHNICAL
            .iter()
            .map(|&c| {
                (
                    c,
                    CategoryScore {
                        max: plan.max(c),
                        ..Default::default()
                    },
                )
            })
            .collect();
        Self {
            plan,
            categories,
            scoring_viewport: HashMap::new(),
            adherence: CategoryScore {
                max: adherence_max,
                ..Default::default()
            },
            awarded: HashSet::new(),
            page_load_errors: Vec::new(),
        }
    }

    pub fn plan(&self) -> &CategoryPlan {
        &self.plan
    }

    pub fn record(&mut self, finding: Finding) {
        debug!(
            category = %finding.category,
            check = %finding.check,
            status = %finding.status,
            points = finding.points_earned,
            viewport = %finding.viewport,
            "finding"
        );
        if finding.category == Category::PromptAdherence {
            self.record_adherence(finding);
        } else {
            self.record_technical(finding);
        }
    }

    /// Record a page load failure for a viewport
    pub fn record_page_load_error(&mut self, viewport: &str, message: &str) {
        self.page_load_errors.push(format!("{}: {}", viewport, message));
        self.record(Finding::new(
            Category::PageLoadErrors,
            "Page Load",
            Status::Fail,
            0.0,
            0.0,
            viewport,
            message,
        ));
    }

    fn record_technical(&mut self, mut finding: Finding) {
        let category = finding.category;

        if !category.is_viewport_scalable() && finding.max_points_for_this_check > 0.0 {
            let scoring = self
                .scoring_viewport
                .entry(category)
                .or_insert_with(|| finding.viewport.clone());
            if *scoring != finding.viewport {
                finding.message = format!("(Informational, scored on {}) {}", scoring, finding.message);
                finding.status = Status::Info;
                finding.points_earned = 0.0;
                finding.max_points_for_this_check = 0.0;
            }
        }

        let score = self.categories.entry(category).or_default();
        score.earned = (score.earned + finding.points_earned).min(score.max).max(0.0);
        score.details.push(finding);
    }

    fn record_adherence(&mut self, mut finding: Finding) {
        let awards_points = finding.is_pass() && finding.points_earned > 0.0;
        if awards_points && !self.awarded.insert(finding.check.clone()) {
            finding.points_earned = 0.0;
            finding.message = format!("{} {}", ALREADY_AWARDED, finding.message);
        }
        let score = &mut self.adherence;
        score.earned = (score.earned + finding.points_earned).min(score.max).max(0.0);
        score.details.push(finding);
    }

    pub fn category(&self, category: Category) -> Option<&CategoryScore> {
        if category == Category::PromptAdherence {
            return Some(&self.adherence);
        }
        self.categories.get(&category)
    }

    pub fn technical_earned(&self) -> f64 {
        self.categories.values().map(|c| c.earned).sum()
    }

    pub fn adherence_earned(&self) -> f64 {
        self.adherence.earned
    }

    /// Freeze the board into report scores plus the page load error list
    pub fn finish(self) -> (Scores, Vec<String>) {
        let tq_earned = self.technical_earned();
        let tq_max = self.plan.technical_max();
        let technical = TechnicalQuality {
            earned: tq_earned,
            max: tq_max,
            percentage: percentage(tq_earned, tq_max),
            categories: self.categories,
        };
        let adherence = PromptAdherence {
            earned: self.adherence.earned,
            max: self.adherence.max,
            percentage: percentage(self.adherence.earned, self.adherence.max),
            details: self.adherence.details,
        };
        (Scores::new(technical, adherence), self.page_load_errors)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalQuality {
    pub earned: f64,
    pub max: f64,
    pub percentage: f64,
    pub categories: BTreeMap<Category, CategoryScore>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptAdherence {
    pub earned: f64,
    pub max: f64,
    pub percentage: f64,
    pub details: Vec<Finding>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overall {
    pub earned_raw_sum: f64,
    pub max_raw_sum: f64,
    pub percentage_weighted: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub technical_quality: TechnicalQuality,
    pub prompt_adherence: PromptAdherence,
    pub overall: Overall,
}

impl Scores {
    pub fn new(technical_quality: TechnicalQuality, prompt_adherence: PromptAdherence) -> Self {
        let overall = Overall {
            earned_raw_sum: technical_quality.earned + prompt_adherence.earned,
            max_raw_sum: technical_quality.max + prompt_adherence.max,
            percentage_weighted: weighted_percentage(
                technical_quality.percentage,
                prompt_adherence.percentage,
            ),
        };
        Self {
            technical_quality,
            prompt_adherence,
            overall,
        }
    }
}

/// Outcome of analysing one prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    FileNotFound,
    NoPromptId,
    WebdriverError,
    AnalysisError,
    WorkerCrashed,
    Timeout,
}

impl RunStatus {
    pub fn is_scored(self) -> bool {
        self == RunStatus::Success
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::FileNotFound => "FILE_NOT_FOUND",
            RunStatus::NoPromptId => "NO_PROMPT_ID",
            RunStatus::WebdriverError => "WEBDRIVER_ERROR",
            RunStatus::AnalysisError => "ANALYSIS_ERROR",
            RunStatus::WorkerCrashed => "WORKER_CRASHED",
            RunStatus::Timeout => "TIMEOUT",
        };
        f.write_str(s)
    }
}

/// Outcome of one model's whole benchmark run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelRunStatus {
    Success,
    ConfigNotFound,
    AnalyzerFailure,
    Timeout,
    SpawnError,
}

impl fmt::Display for ModelRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelRunStatus::Success => "SUCCESS",
            ModelRunStatus::ConfigNotFound => "CONFIG_NOT_FOUND",
            ModelRunStatus::AnalyzerFailure => "ANALYZER_FAILURE",
            ModelRunStatus::Timeout => "TIMEOUT",
            ModelRunStatus::SpawnError => "SPAWN_ERROR",
        };
        f.write_str(s)
    }
}

/// Detailed report of one prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptReport {
    pub prompt_id: String,
    pub html_file: String,
    pub prompt_description: String,
    #[serde(default)]
    pub page_title: Option<String>,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub analysis_timestamp: DateTime<Utc>,
    pub scores: Scores,
    #[serde(default)]
    pub page_load_errors: Vec<String>,
    pub output_directory: String,
}

impl PromptReport {
    /// Report for a prompt that never reached scoring
    pub fn not_analyzed(
        prompt_id: impl Into<String>,
        html_file: impl Into<String>,
        prompt_description: impl Into<String>,
        status: RunStatus,
        error: impl Into<String>,
        output_directory: impl Into<String>,
    ) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            html_file: html_file.into(),
            prompt_description: prompt_description.into(),
            page_title: None,
            status,
            error: Some(error.into()),
            analysis_timestamp: Utc::now(),
            scores: Scores::default(),
            page_load_errors: Vec::new(),
            output_directory: output_directory.into(),
        }
    }

    pub fn weighted_percentage(&self) -> f64 {
        self.scores.overall.percentage_weighted
    }
}

/// Aggregate scores over the successfully analysed prompts of one model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateScores {
    pub total_tq_earned: f64,
    pub total_tq_max: f64,
    pub total_adh_earned: f64,
    pub total_adh_max: f64,
    pub technical_quality_percentage: f64,
    pub prompt_adherence_percentage: f64,
    pub average_prompt_weighted_score: f64,
    pub overall_weighted_score_from_totals: f64,
}

impl AggregateScores {
    pub fn from_reports<'a, I>(reports: I) -> Self
    where
        I: IntoIterator<Item = &'a PromptReport>,
    {
        let mut agg = AggregateScores::default();
        let mut weighted = Vec::new();

        for report in reports.into_iter().filter(|r| r.status.is_scored()) {
            let tq = &report.scores.technical_quality;
            let adh = &report.scores.prompt_adherence;
            agg.total_tq_earned += tq.earned;
            if tq.max > 0.0 {
                agg.total_tq_max += tq.max;
            }
            agg.total_adh_earned += adh.earned;
            if adh.max > 0.0 {
                agg.total_adh_max += adh.max;
            }
            weighted.push(report.weighted_percentage());
        }

        agg.technical_quality_percentage = percentage(agg.total_tq_earned, agg.total_tq_max);
        agg.prompt_adherence_percentage = percentage(agg.total_adh_earned, agg.total_adh_max);
        agg.overall_weighted_score_from_totals =
            weighted_percentage(agg.technical_quality_percentage, agg.prompt_adherence_percentage);
        if !weighted.is_empty() {
            agg.average_prompt_weighted_score = weighted.iter().sum::<f64>() / weighted.len() as f64;
        }
        agg
    }
}

/// Index entry of one prompt inside a model summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptIndexEntry {
    pub prompt_id: String,
    pub status: RunStatus,
    pub overall_weighted_percentage: f64,
    pub report_directory: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&PromptReport> for PromptIndexEntry {
    fn from(report: &PromptReport) -> Self {
        Self {
            prompt_id: report.prompt_id.clone(),
            status: report.status,
            overall_weighted_percentage: report.weighted_percentage(),
            report_directory: report.output_directory.clone(),
            error: report.error.clone(),
        }
    }
}

/// Per-model summary written as `MASTER_BENCHMARK_SUMMARY.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    pub benchmark_run_name: String,
    pub benchmark_config_file: String,
    pub html_source_directory: String,
    pub run_timestamp: DateTime<Utc>,
    pub total_prompts_configured: usize,
    pub prompts_analyzed_successfully: usize,
    pub aggregate_scores: AggregateScores,
    pub individual_prompt_results: Vec<PromptIndexEntry>,
}

impl ModelSummary {
    pub fn build(
        benchmark_run_name: impl Into<String>,
        benchmark_config_file: impl Into<String>,
        html_source_directory: impl Into<String>,
        total_prompts_configured: usize,
        reports: &[PromptReport],
    ) -> Self {
        Self {
            benchmark_run_name: benchmark_run_name.into(),
            benchmark_config_file: benchmark_config_file.into(),
            html_source_directory: html_source_directory.into(),
            run_timestamp: Utc::now(),
            total_prompts_configured,
            prompts_analyzed_successfully: reports.iter().filter(|r| r.status.is_scored()).count(),
            aggregate_scores: AggregateScores::from_reports(reports),
            individual_prompt_results: reports.iter().map(PromptIndexEntry::from).collect(),
        }
    }
}
