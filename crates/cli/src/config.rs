//! CLI configuration
//!
//! Loaded from a TOML file; every section has defaults, so a missing file
//! or a partial one is fine. Command-line flags override file values.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use webgrade_engine::EngineConfig;

/// Environment variable overriding the number of concurrent prompt workers
pub const PROMPT_WORKERS_ENV: &str = "WEBGRADE_PROMPT_WORKERS";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "webgrade.toml";

/// webgrade configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebgradeConfig {
    /// Process pools
    pub pool: PoolConfig,

    /// Browser, auditors and page timing
    pub engine: EngineConfig,
}

/// Process pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Models analysed concurrently
    pub max_models: usize,

    /// Prompts analysed concurrently per model; half the CPUs when unset
    pub prompt_workers: Option<usize>,

    pub model_timeout_secs: u64,

    pub prompt_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_models: 2,
            prompt_workers: None,
            model_timeout_secs: 2 * 60 * 60,
            prompt_timeout_secs: 30 * 60,
        }
    }
}

impl PoolConfig {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_secs(self.prompt_timeout_secs)
    }

    /// Prompt worker count: flag, then environment, then file, then half the CPUs
    pub fn prompt_workers(&self, flag: Option<usize>) -> usize {
        let env = std::env::var(PROMPT_WORKERS_ENV).ok();
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(2);
        resolve_prompt_workers(flag, env.as_deref(), self.prompt_workers, cpus)
    }
}

/// First positive value among flag, environment and file; else `cpus / 2`, at least 1
pub fn resolve_prompt_workers(
    flag: Option<usize>,
    env: Option<&str>,
    configured: Option<usize>,
    cpus: usize,
) -> usize {
    let from_env = env.and_then(|v| v.trim().parse::<usize>().ok());
    [flag, from_env, configured]
        .into_iter()
        .flatten()
        .find(|&n| n > 0)
        .unwrap_or((cpus / 2).max(1))
}

impl WebgradeConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
