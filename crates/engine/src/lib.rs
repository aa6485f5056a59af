//! webgrade analysis engine
//!
//! Drives a headless browser over a generated page and turns what it sees
//! into findings:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  run_prompt(config, job) -> PromptReport                     │
//! │    ├── ChromeDriver::spawn + WebDriverSession::start          │
//! │    └── Analyzer::analyze                                      │
//! │          for each viewport in plan order:                     │
//! │            ├── load page (readyState, screenshot)             │
//! │            ├── technical: html / css / js (first viewport)    │
//! │            ├── axe, contrast, responsiveness                  │
//! │            ├── lighthouse (once per viewport name)            │
//! │            └── adherence checks ── interpreter                │
//! │                                      ├── predicate::evaluate  │
//! │                                      └── InteractionRunner    │
//! │          ScoreBoard ──> PromptReport                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod analyzer;
pub mod audit;
pub mod browser;
pub mod config;
pub mod contrast;
pub mod error;
pub mod interaction;
pub mod interpreter;
pub mod poll;
pub mod predicate;
pub mod static_server;
pub mod technical;
pub mod webdriver;

#[cfg(test)]
pub(crate) mod fake;

pub use analyzer::{prompt_output_dir, report_path, run_prompt, write_report, Analyzer, PromptJob, PromptRun};
pub use browser::{BrowserSession, ElementRef};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use interpreter::{evaluate_check, run_checks};
pub use webdriver::{ChromeDriver, SessionOptions, WebDriverSession};
