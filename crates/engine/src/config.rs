//! Engine configuration
//!
//! Plain serde structs with defaults; the CLI embeds them in its TOML file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::webdriver::SessionOptions;

/// Everything a prompt run needs besides the prompt itself
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub browser: BrowserConfig,
    pub audit: AuditConfig,
    pub timing: TimingConfig,
}

/// Browser and driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// chromedriver binary, looked up on `PATH` when relative
    pub chromedriver: PathBuf,

    /// Chrome binary; chromedriver picks its default when unset
    pub chrome_binary: Option<PathBuf>,

    pub headless: bool,

    pub driver_startup_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chromedriver: PathBuf::from("chromedriver"),
            chrome_binary: None,
            headless: true,
            driver_startup_timeout_secs: 20,
        }
    }
}

/// External auditor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Local copy of `axe.min.js`
    pub axe_script: PathBuf,

    /// Lighthouse CLI; searched on `PATH` when unset
    pub lighthouse: Option<PathBuf>,

    pub lighthouse_timeout_secs: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            axe_script: PathBuf::from("axe.min.js"),
            lighthouse: None,
            lighthouse_timeout_secs: 300,
        }
    }
}

/// Waits during page loading
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// `document.readyState == "complete"` budget per viewport
    pub page_load_timeout_secs: u64,

    /// Pause after the page reports complete, before any check
    pub post_load_settle_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            page_load_timeout_secs: 15,
            post_load_settle_ms: 1000,
        }
    }
}

impl EngineConfig {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            headless: self.browser.headless,
            chrome_binary: self.browser.chrome_binary.clone(),
            page_load_timeout: self.page_load_timeout() * 2,
            ..SessionOptions::default()
        }
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.timing.page_load_timeout_secs)
    }

    pub fn post_load_settle(&self) -> Duration {
        Duration::from_millis(self.timing.post_load_settle_ms)
    }

    pub fn driver_startup_timeout(&self) -> Duration {
        Duration::from_secs(self.browser.driver_startup_timeout_secs)
    }

    pub fn lighthouse_timeout(&self) -> Duration {
        Duration::from_secs(self.audit.lighthouse_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_value(serde_json::json!({"audit": {"lighthouse_timeout_secs": 60}})).unwrap();
        assert_eq!(config.lighthouse_timeout(), Duration::from_secs(60));
        assert_eq!(config.audit.axe_script, PathBuf::from("axe.min.js"));
        assert_eq!(config.page_load_timeout(), Duration::from_secs(15));
        assert!(config.session_options().headless);
    }
}
