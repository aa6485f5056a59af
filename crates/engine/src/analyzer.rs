//! Per-prompt analysis run
//!
//! One browser session walks the prompt's viewport plan in order. At each
//! viewport the page is loaded, technical checks run, then the adherence
//! checks. Findings go to a [`ScoreBoard`] and the finished board becomes the
//! prompt's [`PromptReport`].

use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};
use url::Url;
use webgrade_common::{
    report_file_name, Finding, PromptReport, PromptSpec, RunStatus, ScoreBoard, Status, Viewport,
};

use crate::audit::{
    check_accessibility, check_performance, AccessibilityAuditor, AxeAuditor, LighthouseAuditor,
    PerformanceAuditor,
};
use crate::browser::BrowserSession;
use crate::config::EngineConfig;
use crate::contrast::check_contrast;
use crate::error::{EngineError, EngineResult};
use crate::interpreter::run_checks;
use crate::poll::{poll_until, POLL_INTERVAL};
use crate::predicate::Observation;
use crate::technical::{check_css_quality, check_html_structure, check_javascript_health, check_responsiveness};
use crate::webdriver::{ChromeDriver, WebDriverSession};

const READY_STATE_SCRIPT: &str = "return document.readyState;";

/// Directory holding everything one prompt run writes
pub fn prompt_output_dir(run_dir: &Path, prompt_id: &str, timestamp: &str) -> PathBuf {
    run_dir.join(format!("{}_{}", prompt_id, timestamp))
}

/// Location of a prompt's detailed report
pub fn report_path(run_dir: &Path, prompt_id: &str, timestamp: &str) -> PathBuf {
    prompt_output_dir(run_dir, prompt_id, timestamp).join(report_file_name(prompt_id))
}

/// Inputs of one prompt analysis
pub struct PromptRun<'a> {
    pub prompt_id: &'a str,
    pub prompt: &'a PromptSpec,
    pub html_file: &'a Path,
    pub output_dir: &'a Path,
}

/// Checks that run once per prompt rather than once per viewport
#[derive(Debug, Default)]
struct RunState {
    page_checks_done: bool,
    viewport_meta_scored: bool,
    lighthouse_done: HashSet<String>,
    page_title: Option<String>,
}

pub struct Analyzer<'a> {
    session: &'a dyn BrowserSession,
    accessibility: &'a dyn AccessibilityAuditor,
    performance: &'a dyn PerformanceAuditor,
    page_load_timeout: Duration,
    settle: Duration,
}

impl<'a> Analyzer<'a> {
    pub fn new(
        session: &'a dyn BrowserSession,
        accessibility: &'a dyn AccessibilityAuditor,
        performance: &'a dyn PerformanceAuditor,
    ) -> Self {
        Self {
            session,
            accessibility,
            performance,
            page_load_timeout: Duration::from_secs(15),
            settle: Duration::from_secs(1),
        }
    }

    pub fn with_timing(mut self, page_load_timeout: Duration, settle: Duration) -> Self {
        self.page_load_timeout = page_load_timeout;
        self.settle = settle;
        self
    }

    /// Analyse the page across the viewport plan
    ///
    /// Page load failures and check failures end up in the report. Only
    /// problems with the output directory or the HTML path return `Err`.
    pub async fn analyze(&self, run: &PromptRun<'_>) -> EngineResult<PromptReport> {
        let screenshots = run.output_dir.join("screenshots");
        tokio::fs::create_dir_all(&screenshots).await?;

        let absolute = std::fs::canonicalize(run.html_file)?;
        let url = Url::from_file_path(&absolute)
            .map_err(|_| EngineError::InvalidCheck(format!("not a file path: {}", absolute.display())))?
            .to_string();

        info!("Starting analysis for prompt {} ({})", run.prompt_id, url);
        let plan = &run.prompt.viewports_to_test;
        let mut board = ScoreBoard::new(plan, run.prompt.max_adherence_points());
        let mut state = RunState::default();
        let mut loaded_once = false;

        for viewport in plan.iter() {
            info!(
                "--- Viewport: {} ({}x{}) for prompt {} ---",
                viewport.name, viewport.width, viewport.height, run.prompt_id
            );
            let screenshot = screenshots.join(format!("{}_{}.png", run.prompt_id, viewport.name));
            match self.load_page(viewport, &url, &screenshot).await {
                Ok(title) => state.page_title = Some(title),
                Err(e) => {
                    let message = match e {
                        EngineError::Timeout(_) => format!("Page timed out loading at {}.", viewport.name),
                        other => format!("WebDriver error at {}: {}", viewport.name, other),
                    };
                    warn!("({}) {}", run.prompt_id, message);
                    board.record_page_load_error(&viewport.name, &message);
                    continue;
                }
            }
            loaded_once = true;

            if let Err(e) = self.run_viewport(run, viewport, &mut board, &mut state).await {
                error!(
                    "Critical error for prompt {} at viewport {}: {}. Skipping further checks for this viewport.",
                    run.prompt_id, viewport.name, e
                );
            }
        }

        if !loaded_once {
            warn!("Page for prompt {} failed to load on all viewports", run.prompt_id);
        }
        info!("Analysis finished for prompt {}", run.prompt_id);

        let (scores, page_load_errors) = board.finish();
        Ok(PromptReport {
            prompt_id: run.prompt_id.to_string(),
            html_file: file_name(run.html_file),
            prompt_description: run.prompt.prompt_description.clone(),
            page_title: state.page_title,
            status: RunStatus::Success,
            error: None,
            analysis_timestamp: Utc::now(),
            scores,
            page_load_errors,
            output_directory: run.output_dir.display().to_string(),
        })
    }

    /// Resize, navigate, wait for `readyState == "complete"`, screenshot
    async fn load_page(&self, viewport: &Viewport, url: &str, screenshot: &Path) -> EngineResult<String> {
        let session = self.session;
        session.set_window_size(viewport.width, viewport.height).await?;
        session.navigate(url).await?;

        let ready = poll_until(self.page_load_timeout, POLL_INTERVAL, move || async move {
            let state = session.execute(READY_STATE_SCRIPT, Vec::new()).await?;
            Ok::<_, EngineError>(if state == "complete" {
                Observation::pass("complete")
            } else {
                Observation::fail(format!("readyState is {}", state))
            })
        })
        .await?;
        if !ready.passed {
            return Err(EngineError::Timeout(format!("page load at {}", viewport.name)));
        }

        let title = session.title().await?;
        let title = if title.trim().is_empty() { "N/A".to_string() } else { title };
        sleep(self.settle).await;

        match session.screenshot().await {
            Ok(png) => match tokio::fs::write(screenshot, png).await {
                Ok(()) => info!("Page loaded. Screenshot: {}", file_name(screenshot)),
                Err(e) => warn!("Could not save screenshot {}: {}", screenshot.display(), e),
            },
            Err(e) if e.is_session_fatal() => return Err(e),
            Err(e) => warn!("Screenshot failed at {}: {}", viewport.name, e),
        }
        Ok(title)
    }

    async fn run_viewport(
        &self,
        run: &PromptRun<'_>,
        viewport: &Viewport,
        board: &mut ScoreBoard,
        state: &mut RunState,
    ) -> EngineResult<()> {
        let session = self.session;
        let vp = viewport.name.as_str();
        let record_all = |board: &mut ScoreBoard, findings: Vec<Finding>| {
            for finding in findings {
                record(board, run.prompt_id, finding);
            }
        };

        if !state.page_checks_done {
            record_all(board, check_html_structure(session, vp, state.page_title.as_deref()).await?);
            record_all(board, check_css_quality(session, vp).await?);
            record(board, run.prompt_id, check_javascript_health(session, vp).await?);
            state.page_checks_done = true;
        }

        let axe_report = run
            .output_dir
            .join(format!("axe_report_{}_{}.json", run.prompt_id, vp));
        let axe = check_accessibility(session, self.accessibility, vp, &axe_report).await?;
        record(board, run.prompt_id, axe);
        record_all(board, check_contrast(session, vp).await?);
        record_all(board, check_responsiveness(session, vp, state.viewport_meta_scored).await?);
        state.viewport_meta_scored = true;

        if state.lighthouse_done.insert(vp.to_lowercase()) {
            let findings =
                check_performance(self.performance, run.html_file, viewport, run.output_dir, run.prompt_id).await;
            record_all(board, findings);
        }

        run_checks(session, &run.prompt.adherence_checks, vp, board).await
    }
}

fn record(board: &mut ScoreBoard, prompt_id: &str, finding: Finding) {
    match finding.status {
        Status::Fail => warn!(
            "[FAIL] ({}@{}) {} - {}: {}",
            prompt_id, finding.viewport, finding.category, finding.check, finding.message
        ),
        Status::Warn if finding.max_points_for_this_check > 0.0 => warn!(
            "[WARN] ({}@{}) {} - {}: {}",
            prompt_id, finding.viewport, finding.category, finding.check, finding.message
        ),
        _ => {}
    }
    board.record(finding);
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Write `report` to `<output_directory>/<prompt_id>_detailed_report.json`
pub async fn write_report(report: &PromptReport, output_dir: &Path) -> EngineResult<PathBuf> {
    tokio::fs::create_dir_all(output_dir).await?;
    let path = output_dir.join(report_file_name(&report.prompt_id));
    tokio::fs::write(&path, serde_json::to_vec_pretty(report)?).await?;
    Ok(path)
}

/// A prompt to analyse inside one model run
pub struct PromptJob<'a> {
    pub prompt: &'a PromptSpec,
    pub html_dir: &'a Path,
    pub run_dir: &'a Path,
    pub timestamp: &'a str,
}

/// Analyse one prompt end to end with a fresh chromedriver and browser
///
/// Always yields a report. Unless the prompt has no id, the report is also
/// written to the prompt's output directory.
pub async fn run_prompt(config: &EngineConfig, job: &PromptJob<'_>) -> PromptReport {
    let prompt = job.prompt;
    let Some(prompt_id) = prompt.prompt_id.as_deref() else {
        return PromptReport::not_analyzed(
            "UNKNOWN",
            "",
            prompt.prompt_description.clone(),
            RunStatus::NoPromptId,
            "Prompt config has no prompt_id",
            "",
        );
    };

    let output_dir = prompt_output_dir(job.run_dir, prompt_id, job.timestamp);
    let html_file = job.html_dir.join(format!("{}.html", prompt_id));
    let report = if !html_file.is_file() {
        PromptReport::not_analyzed(
            prompt_id,
            file_name(&html_file),
            prompt.prompt_description.clone(),
            RunStatus::FileNotFound,
            format!("HTML file {} not found in {}.", file_name(&html_file), job.html_dir.display()),
            output_dir.display().to_string(),
        )
    } else {
        analyze_with_browser(config, prompt_id, prompt, &html_file, &output_dir).await
    };

    if let Err(e) = write_report(&report, &output_dir).await {
        error!("Could not write report for prompt {}: {}", prompt_id, e);
    }
    report
}

async fn analyze_with_browser(
    config: &EngineConfig,
    prompt_id: &str,
    prompt: &PromptSpec,
    html_file: &Path,
    output_dir: &Path,
) -> PromptReport {
    let failed = |status: RunStatus, e: &EngineError| {
        error!("Prompt {} ended with {}: {}", prompt_id, status, e);
        PromptReport::not_analyzed(
            prompt_id,
            file_name(html_file),
            prompt.prompt_description.clone(),
            status,
            e.to_string(),
            output_dir.display().to_string(),
        )
    };

    let driver = match ChromeDriver::spawn(&config.browser.chromedriver, config.driver_startup_timeout()).await {
        Ok(driver) => driver,
        Err(e) => return failed(RunStatus::WebdriverError, &e),
    };
    let session = match WebDriverSession::start(driver.base_url(), &config.session_options()).await {
        Ok(session) => session,
        Err(e) => return failed(RunStatus::WebdriverError, &e),
    };

    let axe = AxeAuditor::new(&config.audit.axe_script);
    let lighthouse = LighthouseAuditor::new(config.audit.lighthouse.clone(), config.lighthouse_timeout());
    let analyzer = Analyzer::new(&session, &axe, &lighthouse)
        .with_timing(config.page_load_timeout(), config.post_load_settle());
    let run = PromptRun {
        prompt_id,
        prompt,
        html_file,
        output_dir,
    };
    let report = match analyzer.analyze(&run).await {
        Ok(report) => report,
        Err(e) if e.is_session_fatal() => failed(RunStatus::WebdriverError, &e),
        Err(e) => failed(RunStatus::AnalysisError, &e),
    };

    if let Err(e) = session.quit().await {
        warn!("Closing browser for prompt {} failed: {}", prompt_id, e);
    }
    drop(driver);
    report
}
