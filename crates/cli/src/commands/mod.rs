//! CLI Commands

pub mod model;
pub mod prompt;
pub mod run;
pub mod scores;

use anyhow::Result;
use std::path::PathBuf;

use crate::config::WebgradeConfig;
use crate::output::OutputFormat;
use crate::pool::WorkerCommand;

/// State shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    pub config: WebgradeConfig,

    /// Configuration file given on the command line, forwarded to workers
    pub config_path: Option<PathBuf>,

    pub format: OutputFormat,
}

impl Context {
    /// Command re-invoking this binary with `subcommand`
    pub fn worker(&self, subcommand: &str) -> Result<WorkerCommand> {
        let mut cmd = WorkerCommand::current_exe()?;
        if let Some(path) = &self.config_path {
            cmd = cmd.arg("--config").arg(path);
        }
        Ok(cmd.arg(subcommand))
    }
}
