//! webgrade Common Library
//!
//! Check model, color math, findings and score aggregation shared by the
//! analysis engine and the CLI.

pub mod check;
pub mod color;
pub mod error;
pub mod finding;
pub mod scoring;
pub mod types;

// Re-export commonly used types
pub use check::{CheckKind, CheckSpec, ElementQuery, SelectorKind};
pub use error::{Error, Result};
pub use finding::{Category, Finding, Status};
pub use scoring::{
    AggregateScores, CategoryPlan, ModelRunStatus, ModelSummary, PromptReport, RunStatus, ScoreBoard,
    Scores,
};
pub use types::*;

/// webgrade version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// File name of the per-model summary
pub const MODEL_SUMMARY_FILE: &str = "MASTER_BENCHMARK_SUMMARY.json";

/// File name of a prompt's detailed report
pub fn report_file_name(prompt_id: &str) -> String {
    format!("{}_detailed_report.json", prompt_id)
}
