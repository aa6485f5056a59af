//! External auditors: axe-core accessibility and Lighthouse
//!
//! The engine does not implement audit algorithms; it runs the tools and
//! maps their structured results onto findings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};
use webgrade_common::{Category, Finding, Status, Viewport};

use crate::browser::BrowserSession;
use crate::error::{EngineError, EngineResult};
use crate::static_server::StaticServer;

/// Lighthouse category ids and the technical categories they score
pub const LIGHTHOUSE_CATEGORIES: [(&str, Category); 4] = [
    ("performance", Category::LighthousePerformance),
    ("accessibility", Category::LighthouseAccessibility),
    ("best-practices", Category::LighthouseBestPractices),
    ("seo", Category::LighthouseSeo),
];

/// Default Lighthouse wall-clock limit
pub const LIGHTHOUSE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxeViolation {
    pub id: String,
    #[serde(default)]
    pub impact: Option<String>,
    #[serde(default)]
    pub help: String,
}

/// Parsed axe-core result plus the raw document for the report file
#[derive(Debug, Clone)]
pub struct AxeResults {
    pub violations: Vec<AxeViolation>,
    pub raw: Value,
}

impl AxeResults {
    pub fn from_raw(raw: Value) -> EngineResult<Self> {
        let violations = match raw.get("violations") {
            Some(v) => serde_json::from_value(v.clone())?,
            None => Vec::new(),
        };
        Ok(Self { violations, raw })
    }
}

#[async_trait]
pub trait AccessibilityAuditor: Send + Sync {
    async fn audit(&self, session: &dyn BrowserSession) -> EngineResult<AxeResults>;
}

/// Injects a local `axe.min.js` and runs `axe.run()` in the page
pub struct AxeAuditor {
    script_path: PathBuf,
}

impl AxeAuditor {
    pub fn new(script_path: impl Into<PathBuf>) -> Self {
        Self {
            script_path: script_path.into(),
        }
    }
}

#[async_trait]
impl AccessibilityAuditor for AxeAuditor {
    async fn audit(&self, session: &dyn BrowserSession) -> EngineResult<AxeResults> {
        let source = tokio::fs::read_to_string(&self.script_path).await.map_err(|e| {
            EngineError::AuditUnavailable(format!("axe script {}: {}", self.script_path.display(), e))
        })?;
        session.execute(&source, Vec::new()).await?;
        let raw = session
            .execute("return axe.run(document, {resultTypes: ['violations']});", Vec::new())
            .await?;
        AxeResults::from_raw(raw)
    }
}

/// Score axe violations: 10/5/2/1 penalty per critical/serious/moderate/minor
pub fn axe_finding(results: &AxeResults, viewport: &str, report_name: &str) -> Finding {
    let category = Category::AxeAccessibility;
    let max = category.base_cap();
    if results.violations.is_empty() {
        return Finding::new(category, "Axe Violations", Status::Pass, max, max, viewport, "No violations.");
    }

    let count = |impact: &str| {
        results
            .violations
            .iter()
            .filter(|v| v.impact.as_deref() == Some(impact))
            .count()
    };
    let (critical, serious, moderate, minor) =
        (count("critical"), count("serious"), count("moderate"), count("minor"));
    let penalty = (critical * 10 + serious * 5 + moderate * 2 + minor) as f64;
    let earned = (max - penalty).max(0.0);
    let status = if earned >= max * 0.9 {
        Status::Pass
    } else if critical > 0 || serious > 0 {
        Status::Fail
    } else {
        Status::Warn
    };

    Finding::new(
        category,
        "Axe Violations",
        status,
        earned,
        max,
        viewport,
        format!(
            "{} Axe violations (Crit:{},Ser:{},Mod:{},Min:{}). Report: {}",
            results.violations.len(),
            critical,
            serious,
            moderate,
            minor,
            report_name
        ),
    )
    .with_data(json!(results.violations))
}

/// Run the accessibility audit and write the raw result to `report_path`
pub async fn check_accessibility(
    session: &dyn BrowserSession,
    auditor: &dyn AccessibilityAuditor,
    viewport: &str,
    report_path: &Path,
) -> EngineResult<Finding> {
    let run = async {
        let results = auditor.audit(session).await?;
        tokio::fs::write(report_path, serde_json::to_vec_pretty(&results.raw)?).await?;
        Ok::<_, EngineError>(results)
    };
    match run.await {
        Ok(results) => {
            let name = report_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(axe_finding(&results, viewport, &name))
        }
        Err(e) if e.is_session_fatal() => Err(e),
        Err(e) => {
            warn!("Axe-core failed at {}: {}", viewport, e);
            let max = Category::AxeAccessibility.base_cap();
            let message: String = format!("Error running Axe-core: {}", e).chars().take(222).collect();
            Ok(Finding::new(
                Category::AxeAccessibility,
                "Axe Execution",
                Status::Fail,
                0.0,
                max,
                viewport,
                message,
            ))
        }
    }
}

/// Result of one performance audit run
#[derive(Debug, Clone, PartialEq)]
pub enum AuditOutcome {
    /// Score in `[0, 1]` per category id; `None` when the report lacks it
    Scores(BTreeMap<String, Option<f64>>),
    /// Tool not installed
    Unavailable(String),
    /// Tool ran but produced no usable report
    Failed {
        check: &'static str,
        message: String,
        data: Option<Value>,
    },
}

pub struct AuditRequest<'a> {
    pub url: &'a str,
    pub viewport: &'a Viewport,
    pub report_dir: &'a Path,
    pub prompt_id: &'a str,
}

#[async_trait]
pub trait PerformanceAuditor: Send + Sync {
    /// Whether the tool can run at all
    fn available(&self) -> bool;

    async fn audit(&self, request: &AuditRequest<'_>) -> AuditOutcome;
}

/// Runs the `lighthouse` CLI
pub struct LighthouseAuditor {
    binary: Option<PathBuf>,
    timeout: Duration,
}

impl LighthouseAuditor {
    /// Use `binary` when given, otherwise look for `lighthouse` on `PATH`
    pub fn new(binary: Option<PathBuf>, timeout: Duration) -> Self {
        let binary = binary.or_else(|| find_on_path("lighthouse"));
        if binary.is_none() {
            warn!("Lighthouse CLI not found; Lighthouse categories will score 0");
        }
        Self { binary, timeout }
    }
}

fn find_on_path(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Command-line arguments for one Lighthouse run
pub fn lighthouse_args(url: &str, viewport: &Viewport, output_base: &Path) -> Vec<String> {
    let categories: Vec<&str> = LIGHTHOUSE_CATEGORIES.iter().map(|(id, _)| *id).collect();
    let mut args = vec![
        url.to_string(),
        "--output=json".to_string(),
        "--output=html".to_string(),
        format!("--output-path={}", output_base.display()),
        "--quiet".to_string(),
        "--throttling-method=simulate".to_string(),
        "--chrome-flags=--headless=new --disable-gpu --no-sandbox --no-zygote".to_string(),
        format!("--only-categories={}", categories.join(",")),
    ];
    if viewport.is_desktop() {
        args.push("--preset=desktop".to_string());
    } else if !viewport.is_mobile() {
        debug!("Viewport '{}' is custom; using Lighthouse defaults", viewport.name);
    }
    args
}

#[derive(Debug, Deserialize)]
struct LighthouseReport {
    #[serde(rename = "runtimeError", default)]
    runtime_error: Option<RuntimeError>,
    #[serde(default)]
    categories: BTreeMap<String, LighthouseCategory>,
}

#[derive(Debug, Deserialize)]
struct RuntimeError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LighthouseCategory {
    #[serde(default)]
    score: Option<f64>,
}

/// Interpret a Lighthouse JSON report
pub fn parse_lighthouse_report(raw: &str) -> AuditOutcome {
    let report: LighthouseReport = match serde_json::from_str(raw) {
        Ok(report) => report,
        Err(e) => {
            return AuditOutcome::Failed {
                check: "Lighthouse Main Error",
                message: format!("Error: {}", e),
                data: None,
            }
        }
    };
    if let Some(err) = report.runtime_error {
        return AuditOutcome::Failed {
            check: "Lighthouse Runtime Error",
            message: format!(
                "Runtime error: {} - {}",
                err.code.unwrap_or_default(),
                err.message.unwrap_or_default()
            ),
            data: None,
        };
    }
    AuditOutcome::Scores(
        LIGHTHOUSE_CATEGORIES
            .iter()
            .map(|(id, _)| {
                let score = report.categories.get(*id).and_then(|c| c.score);
                (id.to_string(), score)
            })
            .collect(),
    )
}

fn describe_timeout(timeout: Duration) -> String {
    let secs = timeout.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        format!("{} min", secs / 60)
    } else {
        format!("{:.1} s", timeout.as_secs_f64())
    }
}

#[async_trait]
impl PerformanceAuditor for LighthouseAuditor {
    fn available(&self) -> bool {
        self.binary.is_some()
    }

    async fn audit(&self, request: &AuditRequest<'_>) -> AuditOutcome {
        let Some(binary) = &self.binary else {
            return AuditOutcome::Unavailable("Lighthouse CLI not found.".to_string());
        };
        if let Err(e) = tokio::fs::create_dir_all(request.report_dir).await {
            return AuditOutcome::Failed {
                check: "Lighthouse Main Error",
                message: format!("Error: {}", e),
                data: None,
            };
        }

        let output_base = request.report_dir.join(format!("lh_{}", request.prompt_id));
        let args = lighthouse_args(request.url, request.viewport, &output_base);
        let cmdline = format!("{} {}", binary.display(), args.join(" "));
        info!("Running Lighthouse on {} ({})", request.url, request.viewport.name);

        let child = Command::new(binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();
        let output = match tokio::time::timeout(self.timeout, child).await {
            Err(_) => {
                return AuditOutcome::Failed {
                    check: "Lighthouse Execution",
                    message: format!("Timed out ({}).", describe_timeout(self.timeout)),
                    data: None,
                }
            }
            Ok(Err(e)) => {
                return AuditOutcome::Failed {
                    check: "Lighthouse Main Error",
                    message: format!("Error: {}", e),
                    data: None,
                }
            }
            Ok(Ok(output)) => output,
        };

        let report_path = PathBuf::from(format!("{}.report.json", output_base.display()));
        if !output.status.success() || !report_path.is_file() {
            let stderr: String = String::from_utf8_lossy(&output.stderr).chars().take(500).collect();
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return AuditOutcome::Failed {
                check: "Lighthouse Execution",
                message: format!("CLI failed. Code: {}. Stderr: {}", code, stderr),
                data: Some(json!({"cmd": cmdline})),
            };
        }

        match tokio::fs::read_to_string(&report_path).await {
            Ok(raw) => parse_lighthouse_report(&raw),
            Err(e) => AuditOutcome::Failed {
                check: "Lighthouse Main Error",
                message: format!("Error: {}", e),
                data: None,
            },
        }
    }
}

/// One finding per Lighthouse category
pub fn lighthouse_findings(outcome: &AuditOutcome, viewport: &str) -> Vec<Finding> {
    LIGHTHOUSE_CATEGORIES
        .iter()
        .map(|(id, category)| {
            let max = category.base_cap();
            match outcome {
                AuditOutcome::Unavailable(message) => Finding::new(
                    *category,
                    "Lighthouse Execution",
                    Status::Warn,
                    0.0,
                    max,
                    viewport,
                    message.clone(),
                ),
                AuditOutcome::Failed { check, message, data } => {
                    let finding = Finding::new(*category, *check, Status::Fail, 0.0, max, viewport, message.clone());
                    match data {
                        Some(data) => finding.with_data(data.clone()),
                        None => finding,
                    }
                }
                AuditOutcome::Scores(scores) => match scores.get(*id).copied().flatten() {
                    Some(score) => {
                        let earned = (score * max * 100.0).round() / 100.0;
                        let status = if score >= 0.9 {
                            Status::Pass
                        } else if score >= 0.5 {
                            Status::Warn
                        } else {
                            Status::Fail
                        };
                        Finding::new(
                            *category,
                            "Lighthouse Score",
                            status,
                            earned,
                            max,
                            viewport,
                            format!("{}/100", (score * 100.0) as i64),
                        )
                    }
                    None => Finding::new(
                        *category,
                        "Lighthouse Score",
                        Status::Fail,
                        0.0,
                        max,
                        viewport,
                        "Score not found.",
                    ),
                },
            }
        })
        .collect()
}

/// Serve the prompt's directory, run the performance audit, tear down
pub async fn check_performance(
    auditor: &dyn PerformanceAuditor,
    html_file: &Path,
    viewport: &Viewport,
    prompt_output_dir: &Path,
    prompt_id: &str,
) -> Vec<Finding> {
    if !auditor.available() {
        return lighthouse_findings(
            &AuditOutcome::Unavailable("Lighthouse CLI not found.".to_string()),
            &viewport.name,
        );
    }

    let server_failed = || AuditOutcome::Failed {
        check: "Lighthouse Server",
        message: "Failed to start local server.".to_string(),
        data: None,
    };
    let (Some(root), Some(file_name)) = (html_file.parent(), html_file.file_name()) else {
        return lighthouse_findings(&server_failed(), &viewport.name);
    };
    let server = match StaticServer::start(root).await {
        Ok(server) => server,
        Err(e) => {
            warn!("Static server for Lighthouse failed: {}", e);
            return lighthouse_findings(&server_failed(), &viewport.name);
        }
    };
    let url = match server.url_for(&file_name.to_string_lossy()) {
        Ok(url) => url,
        Err(e) => {
            warn!("Could not build Lighthouse URL: {}", e);
            server.shutdown().await;
            return lighthouse_findings(&server_failed(), &viewport.name);
        }
    };

    let report_dir = prompt_output_dir.join(format!("lighthouse_reports_{}", viewport.name));
    let outcome = auditor
        .audit(&AuditRequest {
            url: &url,
            viewport,
            report_dir: &report_dir,
            prompt_id,
        })
        .await;
    server.shutdown().await;
    if let AuditOutcome::Failed { message, .. } = &outcome {
        warn!("Lighthouse failed at {}: {}", viewport.name, message);
    }
    lighthouse_findings(&outcome, &viewport.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeBrowser;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn violation(id: &str, impact: &str) -> AxeViolation {
        AxeViolation {
            id: id.into(),
            impact: Some(impact.into()),
            help: format!("fix {}", id),
        }
    }

    fn results(violations: Vec<AxeViolation>) -> AxeResults {
        AxeResults {
            raw: json!({"violations": violations}),
            violations,
        }
    }

    #[test]
    fn test_axe_scoring() {
        let clean = axe_finding(&results(vec![]), "desktop", "r.json");
        assert_eq!((clean.status, clean.points_earned), (Status::Pass, 20.0));

        let minor = axe_finding(&results(vec![violation("region", "minor")]), "desktop", "r.json");
        assert_eq!((minor.status, minor.points_earned), (Status::Pass, 19.0));

        let moderate = axe_finding(
            &results(vec![violation("a", "moderate"), violation("b", "moderate")]),
            "desktop",
            "r.json",
        );
        assert_eq!((moderate.status, moderate.points_earned), (Status::Warn, 16.0));

        let severe = axe_finding(
            &results(vec![
                violation("image-alt", "critical"),
                violation("label", "critical"),
                violation("color-contrast", "serious"),
            ]),
            "mobile",
            "axe_report_p1_mobile.json",
        );
        assert_eq!((severe.status, severe.points_earned), (Status::Fail, 0.0));
        assert_eq!(
            severe.message,
            "3 Axe violations (Crit:2,Ser:1,Mod:0,Min:0). Report: axe_report_p1_mobile.json"
        );
        assert_eq!(severe.data.unwrap()[0]["id"], "image-alt");
    }

    struct CannedAxe(Mutex<Option<EngineResult<AxeResults>>>);

    #[async_trait]
    impl AccessibilityAuditor for CannedAxe {
        async fn audit(&self, _session: &dyn BrowserSession) -> EngineResult<AxeResults> {
            self.0
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(EngineError::Script("already used".into())))
        }
    }

    #[tokio::test]
    async fn test_check_accessibility_writes_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("axe_report_p1_desktop.json");
        let auditor = CannedAxe(Mutex::new(Some(Ok(results(vec![violation("x", "serious")])))));

        let finding = check_accessibility(&FakeBrowser::new(), &auditor, "desktop", &path)
            .await
            .unwrap();
        assert_eq!(finding.points_earned, 15.0);
        let written: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["violations"][0]["impact"], "serious");
    }

    #[tokio::test]
    async fn test_check_accessibility_error_is_failed_finding() {
        let dir = TempDir::new().unwrap();
        let auditor = AxeAuditor::new(dir.path().join("missing-axe.min.js"));
        let finding = check_accessibility(&FakeBrowser::new(), &auditor, "desktop", &dir.path().join("r.json"))
            .await
            .unwrap();
        assert_eq!(finding.check, "Axe Execution");
        assert_eq!(finding.status, Status::Fail);
        assert_eq!(finding.max_points_for_this_check, 20.0);
    }

    #[tokio::test]
    async fn test_axe_auditor_injects_and_runs() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("axe.min.js");
        std::fs::write(&script, "window.axe = {};").unwrap();
        let browser = FakeBrowser::new().returning(
            "axe.run",
            json!({"violations": [{"id": "label", "impact": "critical", "help": "Form elements must have labels"}]}),
        );
        let results = AxeAuditor::new(&script).audit(&browser).await.unwrap();
        assert_eq!(results.violations.len(), 1);
        assert_eq!(browser.dom().scripts[0], "window.axe = {};");
    }

    #[test]
    fn test_lighthouse_args() {
        let base = Path::new("/out/lighthouse_reports_desktop/lh_p1");
        let desktop = lighthouse_args("http://localhost:9/p1.html", &Viewport::new("desktop", 1920, 1080), base);
        assert_eq!(desktop[0], "http://localhost:9/p1.html");
        assert!(desktop.contains(&"--output-path=/out/lighthouse_reports_desktop/lh_p1".to_string()));
        assert!(desktop.contains(&"--only-categories=performance,accessibility,best-practices,seo".to_string()));
        assert_eq!(desktop.last().unwrap(), "--preset=desktop");

        let mobile = lighthouse_args("u", &Viewport::new("mobile", 375, 667), base);
        assert!(!mobile.iter().any(|a| a.starts_with("--preset")));
    }

    #[test]
    fn test_parse_lighthouse_report() {
        let outcome = parse_lighthouse_report(
            r#"{"categories": {"performance": {"score": 0.93}, "seo": {"score": null}, "accessibility": {"score": 0.5}}}"#,
        );
        let AuditOutcome::Scores(scores) = outcome else { panic!("expected scores") };
        assert_eq!(scores["performance"], Some(0.93));
        assert_eq!(scores["seo"], None);
        assert_eq!(scores["best-practices"], None);

        let failed = parse_lighthouse_report(r#"{"runtimeError": {"code": "NO_FCP", "message": "No paint"}}"#);
        assert_eq!(
            failed,
            AuditOutcome::Failed {
                check: "Lighthouse Runtime Error",
                message: "Runtime error: NO_FCP - No paint".into(),
                data: None
            }
        );
    }

    #[test]
    fn test_lighthouse_findings() {
        let scores: BTreeMap<String, Option<f64>> = [
            ("performance".to_string(), Some(0.934)),
            ("accessibility".to_string(), Some(0.57)),
            ("best-practices".to_string(), Some(0.2)),
            ("seo".to_string(), None),
        ]
        .into_iter()
        .collect();
        let findings = lighthouse_findings(&AuditOutcome::Scores(scores), "desktop");
        assert_eq!(findings.len(), 4);

        assert_eq!(findings[0].category, Category::LighthousePerformance);
        assert_eq!(findings[0].points_earned, 18.68);
        assert_eq!(findings[0].status, Status::Pass);
        assert_eq!(findings[0].message, "93/100");

        assert_eq!(findings[1].status, Status::Warn);
        assert_eq!(findings[1].points_earned, 5.7);
        assert_eq!(findings[2].status, Status::Fail);
        assert_eq!(findings[3].message, "Score not found.");

        let missing = lighthouse_findings(&AuditOutcome::Unavailable("Lighthouse CLI not found.".into()), "mobile");
        assert!(missing.iter().all(|f| f.status == Status::Warn && f.points_earned == 0.0));
        assert_eq!(missing.iter().map(|f| f.max_points_for_this_check).sum::<f64>(), 40.0);
    }

    fn fake_lighthouse(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("lighthouse");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_lighthouse_auditor_runs_cli() {
        let dir = TempDir::new().unwrap();
        let bin = fake_lighthouse(
            dir.path(),
            r#"for a in "$@"; do case "$a" in --output-path=*) out="${a#--output-path=}";; esac; done
printf '{"categories": {"performance": {"score": 1}}}' > "$out.report.json""#,
        );
        let auditor = LighthouseAuditor::new(Some(bin), Duration::from_secs(10));
        let report_dir = dir.path().join("reports");
        let viewport = Viewport::new("desktop", 1920, 1080);
        let outcome = auditor
            .audit(&AuditRequest {
                url: "http://localhost:1/p.html",
                viewport: &viewport,
                report_dir: &report_dir,
                prompt_id: "p1",
            })
            .await;
        let AuditOutcome::Scores(scores) = outcome else { panic!("expected scores, got {:?}", outcome) };
        assert_eq!(scores["performance"], Some(1.0));
        assert!(report_dir.join("lh_p1.report.json").is_file());
    }

    #[tokio::test]
    async fn test_lighthouse_auditor_failure_and_timeout() {
        let dir = TempDir::new().unwrap();
        let viewport = Viewport::new("mobile", 375, 667);
        let report_dir = dir.path().join("reports");
        let request = AuditRequest {
            url: "http://localhost:1/p.html",
            viewport: &viewport,
            report_dir: &report_dir,
            prompt_id: "p1",
        };

        let failing = LighthouseAuditor::new(
            Some(fake_lighthouse(dir.path(), "echo 'chrome missing' >&2; exit 3")),
            Duration::from_secs(10),
        );
        match failing.audit(&request).await {
            AuditOutcome::Failed { check, message, data } => {
                assert_eq!(check, "Lighthouse Execution");
                assert!(message.starts_with("CLI failed. Code: 3."), "{}", message);
                assert!(message.contains("chrome missing"));
                assert!(data.unwrap()["cmd"].as_str().unwrap().contains("--only-categories"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let slow_dir = TempDir::new().unwrap();
        let slow = LighthouseAuditor::new(
            Some(fake_lighthouse(slow_dir.path(), "sleep 5")),
            Duration::from_millis(200),
        );
        match slow.audit(&request).await {
            AuditOutcome::Failed { check, message, .. } => {
                assert_eq!(check, "Lighthouse Execution");
                assert!(message.starts_with("Timed out"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_describe_timeout() {
        assert_eq!(describe_timeout(LIGHTHOUSE_TIMEOUT), "5 min");
        assert_eq!(describe_timeout(Duration::from_millis(1500)), "1.5 s");
    }
}
