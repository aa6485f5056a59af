//! Technical-quality checks: HTML structure, CSS quality, script health and
//! responsiveness
//!
//! Each sub-check yields one finding. A per-check browser error becomes a
//! FAIL finding for that sub-check only; session-fatal errors propagate.

use serde::Deserialize;
use serde_json::json;
use std::cmp::Ordering;
use std::time::Duration;
use tracing::debug;
use webgrade_common::check::{ElementQuery, SelectorKind};
use webgrade_common::{Category, Finding, Status};

use crate::browser::{truthy, BrowserSession, LogEntry};
use crate::error::{EngineError, EngineResult};
use crate::poll::{poll_until, POLL_INTERVAL};
use crate::predicate::Observation;

/// Console messages never counted as page errors
pub const JS_IGNORE_PATTERNS: [&str; 8] = [
    "favicon.ico",
    "extension",
    "custom-element",
    "deprecated",
    "doubleclick.net",
    "googlesyndication.com",
    "net::ERR_FAILED",
    "ResizeObserver loop limit exceeded",
];

const VIEWPORT_META_POINTS: f64 = 4.0;
const HORIZONTAL_SCROLL_POINTS: f64 = 6.0;
const SCROLL_READY_BUDGET: Duration = Duration::from_secs(3);

const HEADINGS_SCRIPT: &str = "return Array.from(document.querySelectorAll('h1, h2, h3, h4, h5, h6')) \
    .filter(h => h.checkVisibility ? h.checkVisibility() : h.offsetParent !== null) \
    .map(h => { const r = h.getBoundingClientRect(); \
      return {level: Number(h.tagName[1]), x: r.left + window.scrollX, y: r.top + window.scrollY}; });";

const FORM_LABELS_SCRIPT: &str = r#"
const sel = 'input:not([type="hidden"]):not([type="submit"]):not([type="reset"]):not([type="button"]):not([type="image"]), select, textarea';
const inputs = Array.from(document.querySelectorAll(sel))
  .filter(i => i.checkVisibility ? i.checkVisibility() : i.offsetParent !== null);
let unlabeled = 0;
for (const i of inputs) {
  const byFor = i.id && document.querySelector('label[for="' + CSS.escape(i.id) + '"]');
  const wrapped = i.closest('label');
  const aria = i.getAttribute('aria-label') || i.getAttribute('aria-labelledby');
  if (!byFor && !wrapped && !aria) unlabeled++;
}
return {total: inputs.length, unlabeled: unlabeled};
"#;

const CSS_VARIABLES_SCRIPT: &str =
    "return Array.from(getComputedStyle(document.documentElement)).filter(k => k.startsWith('--')).length;";

const STYLE_TEXT_SCRIPT: &str =
    "let c = ''; document.querySelectorAll('style').forEach(s => c += s.textContent); return c;";

const BODY_READY_SCRIPT: &str = "return !!(document.body && document.body.scrollHeight > 0);";

const HORIZONTAL_SCROLL_SCRIPT: &str = "return document.documentElement.scrollWidth > document.documentElement.clientWidth \
    || document.body.scrollWidth > document.body.clientWidth;";

/// Separate session-fatal errors from errors scored against one sub-check
fn contain<T>(result: EngineResult<T>) -> EngineResult<Result<T, EngineError>> {
    match result {
        Err(e) if e.is_session_fatal() => Err(e),
        other => Ok(other),
    }
}

fn tag(name: &str) -> ElementQuery {
    ElementQuery {
        selector: name.to_string(),
        selector_type: Some(SelectorKind::TagName),
    }
}

fn sub_check(
    category: Category,
    name: &str,
    passed: bool,
    points: f64,
    viewport: &str,
    message: impl Into<String>,
    miss: Status,
) -> Finding {
    let (status, earned) = if passed { (Status::Pass, points) } else { (miss, 0.0) };
    Finding::new(category, name, status, earned, points, viewport, message)
}

async fn any_visible(session: &dyn BrowserSession, query: &ElementQuery) -> EngineResult<bool> {
    for el in session.find_elements(query).await? {
        if session.is_displayed(&el).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub x: f64,
    pub y: f64,
}

/// `(h1 verdict, order verdict)` for visible headings in any order
pub fn heading_verdicts(headings: &[Heading]) -> ((bool, String), (bool, String)) {
    if headings.is_empty() {
        let msg = "No visible headings.".to_string();
        return ((false, msg.clone()), (false, msg));
    }
    let mut sorted = headings.to_vec();
    sorted.sort_by(|a, b| {
        a.y.partial_cmp(&b.y)
            .unwrap_or(Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
    });

    let h1s = sorted.iter().filter(|h| h.level == 1).count();
    let h1 = match h1s {
        1 => (true, "PASS".to_string()),
        0 => (false, "No visible <h1>.".to_string()),
        n => (false, format!("Multiple visible <h1>s ({}).", n)),
    };

    let first_not_h1 = sorted[0].level != 1 && h1s > 0;
    let jumps = sorted.windows(2).any(|w| w[1].level > w[0].level + 1);
    let order = if first_not_h1 || jumps {
        (false, "Heading order issue.".to_string())
    } else {
        (true, "PASS".to_string())
    };
    (h1, order)
}

#[derive(Debug, Deserialize)]
struct FormLabelCount {
    total: u64,
    unlabeled: u64,
}

/// HTML Structure & Semantics sub-checks
pub async fn check_html_structure(
    session: &dyn BrowserSession,
    viewport: &str,
    page_title: Option<&str>,
) -> EngineResult<Vec<Finding>> {
    let category = Category::HtmlStructure;
    let mut findings = Vec::new();

    let lang = async {
        match session.find_element(&tag("html")).await? {
            Some(html) => Ok::<_, EngineError>(session.attribute(&html, "lang").await?),
            None => Ok(None),
        }
    };
    let has_lang = contain(lang.await)?
        .map(|l| l.map(|l| !l.trim().is_empty()).unwrap_or(false))
        .unwrap_or(false);
    findings.push(sub_check(
        category,
        "HTML Lang",
        has_lang,
        1.0,
        viewport,
        if has_lang { "PASS" } else { "Missing/empty." },
        Status::Fail,
    ));

    let has_title = page_title
        .map(|t| t != "N/A" && !t.trim().is_empty())
        .unwrap_or(false);
    findings.push(sub_check(
        category,
        "Page Title",
        has_title,
        1.0,
        viewport,
        if has_title { "PASS" } else { "Missing/empty." },
        Status::Warn,
    ));

    for (check, name, miss) in [
        ("Main Tag", "main", Status::Fail),
        ("Nav Tag", "nav", Status::Warn),
        ("Footer Tag", "footer", Status::Warn),
    ] {
        findings.push(match contain(any_visible(session, &tag(name)).await)? {
            Ok(found) => sub_check(
                category,
                check,
                found,
                1.0,
                viewport,
                if found {
                    "PASS".to_string()
                } else {
                    format!("No visible <{}>.", name)
                },
                miss,
            ),
            Err(_) => sub_check(category, check, false, 1.0, viewport, format!("Error checking <{}>.", name), Status::Fail),
        });
    }

    let headings = async {
        let raw = session.execute(HEADINGS_SCRIPT, Vec::new()).await?;
        Ok::<Vec<Heading>, EngineError>(serde_json::from_value(raw)?)
    };
    let ((h1_ok, h1_msg), (order_ok, order_msg)) = match contain(headings.await)? {
        Ok(list) => heading_verdicts(&list),
        Err(e) => {
            debug!("Heading scan failed: {}", e);
            let msg = "Error processing.".to_string();
            ((false, msg.clone()), (false, msg))
        }
    };
    findings.push(sub_check(category, "H1 Count", h1_ok, 1.0, viewport, h1_msg, Status::Fail));
    findings.push(sub_check(category, "Heading Order Logic", order_ok, 1.0, viewport, order_msg, Status::Fail));

    let images = async {
        let mut visible = 0usize;
        let mut missing = 0usize;
        for img in session.find_elements(&tag("img")).await? {
            if session.is_displayed(&img).await? {
                visible += 1;
                if session.attribute(&img, "alt").await?.is_none() {
                    missing += 1;
                }
            }
        }
        Ok::<_, EngineError>((visible, missing))
    };
    findings.push(match contain(images.await)? {
        Ok((0, _)) => Finding::new(category, "Image Alts", Status::Info, 1.0, 1.0, viewport, "No visible images (INFO)."),
        Ok((_, 0)) => sub_check(category, "Image Alts", true, 1.0, viewport, "PASS", Status::Fail),
        Ok((_, missing)) => sub_check(
            category,
            "Image Alts",
            false,
            1.0,
            viewport,
            format!("{} visible images missing 'alt'.", missing),
            Status::Fail,
        ),
        Err(_) => sub_check(category, "Image Alts", false, 1.0, viewport, "Error checking image alts.", Status::Fail),
    });

    let labels = async {
        let raw = session.execute(FORM_LABELS_SCRIPT, Vec::new()).await?;
        Ok::<FormLabelCount, EngineError>(serde_json::from_value(raw)?)
    };
    findings.push(match contain(labels.await)? {
        Ok(count) if count.total == 0 => Finding::new(
            category,
            "Form Labels",
            Status::Info,
            2.0,
            2.0,
            viewport,
            "No relevant form inputs (INFO).",
        )
        .with_data(json!({"unlabeled_count": 0})),
        Ok(count) => sub_check(
            category,
            "Form Labels",
            count.unlabeled == 0,
            2.0,
            viewport,
            if count.unlabeled == 0 {
                "PASS".to_string()
            } else {
                format!("{} inputs unlabeled.", count.unlabeled)
            },
            Status::Fail,
        )
        .with_data(json!({"unlabeled_count": count.unlabeled})),
        Err(_) => sub_check(category, "Form Labels", false, 2.0, viewport, "Error checking form labels.", Status::Fail),
    });

    Ok(findings)
}

/// Points for a count where at most `full` earns everything and at most
/// `half` earns half
fn tiered(points: f64, count: usize, full: usize, half: usize) -> (f64, Status) {
    if count <= full {
        (points, Status::Pass)
    } else if count <= half {
        (points * 0.5, Status::Warn)
    } else {
        (0.0, Status::Fail)
    }
}

/// CSS Quality sub-checks
pub async fn check_css_quality(session: &dyn BrowserSession, viewport: &str) -> EngineResult<Vec<Finding>> {
    let category = Category::CssQuality;
    let mut findings = Vec::new();

    let vars = async {
        let raw = session.execute(CSS_VARIABLES_SCRIPT, Vec::new()).await?;
        Ok::<u64, EngineError>(raw.as_u64().unwrap_or(0))
    };
    findings.push(match contain(vars.await)? {
        Ok(n) if n > 3 => sub_check(category, "CSS Variables", true, 2.0, viewport, format!("Good use ({} vars).", n), Status::Warn),
        Ok(n) if n > 0 => sub_check(category, "CSS Variables", true, 2.0, viewport, format!("Some use ({} vars).", n), Status::Warn),
        Ok(_) => sub_check(category, "CSS Variables", false, 2.0, viewport, "No :root CSS variables.", Status::Warn),
        Err(_) => sub_check(category, "CSS Variables", false, 2.0, viewport, "Error checking CSS vars.", Status::Fail),
    });

    let layout = async {
        let is_modern = |display: &str| matches!(display, "flex" | "grid");
        if let Some(body) = session.find_element(&tag("body")).await? {
            if is_modern(&session.css_value(&body, "display").await?) {
                return Ok::<bool, EngineError>(true);
            }
        }
        if let Some(main) = session.find_element(&tag("main")).await? {
            if session.is_displayed(&main).await? {
                return Ok(is_modern(&session.css_value(&main, "display").await?));
            }
        }
        Ok(false)
    };
    findings.push(match contain(layout.await)? {
        Ok(true) => sub_check(category, "Modern Layout Body/Main", true, 1.0, viewport, "Uses flex/grid on body/main.", Status::Info),
        Ok(false) => sub_check(category, "Modern Layout Body/Main", false, 1.0, viewport, "Flex/Grid not on body/main.", Status::Info),
        Err(_) => sub_check(category, "Modern Layout Body/Main", false, 1.0, viewport, "Error checking layout.", Status::Fail),
    });

    let inline = async {
        let mut count = 0usize;
        for el in session.find_elements(&ElementQuery::css("[style]")).await? {
            if session.is_displayed(&el).await?
                && !session.attribute(&el, "style").await?.unwrap_or_default().trim().is_empty()
            {
                count += 1;
            }
        }
        Ok::<usize, EngineError>(count)
    };
    findings.push(match contain(inline.await)? {
        Ok(count) => {
            let (earned, status) = tiered(1.0, count, 3, 10);
            let message = match status {
                Status::Pass => "Minimal inline styles.".to_string(),
                Status::Warn => format!("Moderate inline styles ({}).", count),
                _ => format!("Excessive inline styles ({}).", count),
            };
            Finding::new(category, "Inline Styles", status, earned, 1.0, viewport, message)
        }
        Err(_) => sub_check(category, "Inline Styles", false, 1.0, viewport, "Error checking inline styles.", Status::Fail),
    });

    let important = async {
        let raw = session.execute(STYLE_TEXT_SCRIPT, Vec::new()).await?;
        let text = raw.as_str().unwrap_or_default().to_lowercase();
        Ok::<usize, EngineError>(text.matches("!important").count())
    };
    findings.push(match contain(important.await)? {
        Ok(count) => {
            let (earned, status) = tiered(1.0, count, 0, 2);
            let message = match status {
                Status::Pass => "No !important in <style> tags.".to_string(),
                Status::Warn => format!("Low !important usage ({}).", count),
                _ => format!("High !important usage ({}).", count),
            };
            Finding::new(category, "!important Usage", status, earned, 1.0, viewport, message)
        }
        Err(_) => sub_check(category, "!important Usage", false, 1.0, viewport, "Error checking !important.", Status::Fail),
    });

    Ok(findings)
}

/// SEVERE console entries that are not known noise, formatted for reporting
pub fn significant_js_errors(logs: &[LogEntry]) -> Vec<String> {
    logs.iter()
        .filter(|entry| entry.level == "SEVERE")
        .filter(|entry| {
            let lower = entry.message.to_lowercase();
            !JS_IGNORE_PATTERNS
                .iter()
                .any(|p| lower.contains(&p.to_lowercase()))
        })
        .map(|entry| {
            let first: String = entry
                .message
                .lines()
                .next()
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect();
            format!("JS ERROR: {}", first)
        })
        .collect()
}

/// JavaScript Health: console errors collected since page load
pub async fn check_javascript_health(session: &dyn BrowserSession, viewport: &str) -> EngineResult<Finding> {
    let category = Category::JavaScriptHealth;
    let max = category.base_cap();
    let finding = match contain(session.browser_logs().await)? {
        Ok(logs) => {
            let errors = significant_js_errors(&logs);
            if errors.is_empty() {
                Finding::new(category, "JS Console Errors", Status::Pass, max, max, viewport, "No significant JS errors.")
            } else {
                let shown: Vec<&String> = errors.iter().take(5).collect();
                Finding::new(
                    category,
                    "JS Console Errors",
                    Status::Fail,
                    0.0,
                    max,
                    viewport,
                    format!("{} JS error(s).", errors.len()),
                )
                .with_data(json!(shown))
            }
        }
        Err(e) => {
            debug!("Browser logs unavailable: {}", e);
            Finding::new(
                category,
                "JS Console Errors",
                Status::Warn,
                0.0,
                max,
                viewport,
                "Could not retrieve browser logs.",
            )
        }
    };
    Ok(finding)
}

/// Whether a viewport meta `content` allows responsive, zoomable layout
pub fn viewport_meta_ok(content: &str) -> bool {
    let content = content.to_lowercase();
    content.contains("width=device-width")
        && content.contains("initial-scale=1")
        && !content.contains("user-scalable=no")
        && !content.contains("maximum-scale=1")
}

/// Responsiveness sub-checks for the current viewport.
///
/// The viewport meta tag is scored once per prompt; pass
/// `meta_already_scored` for every viewport after the first.
pub async fn check_responsiveness(
    session: &dyn BrowserSession,
    viewport: &str,
    meta_already_scored: bool,
) -> EngineResult<Vec<Finding>> {
    let category = Category::Responsiveness;
    let mut findings = Vec::new();

    if meta_already_scored {
        findings.push(Finding::new(
            category,
            "Viewport Meta Tag",
            Status::Info,
            0.0,
            0.0,
            viewport,
            "Already scored for this prompt.",
        ));
    } else {
        let meta = async {
            match session.find_element(&ElementQuery::css("meta[name='viewport']")).await? {
                Some(el) => Ok::<_, EngineError>(Some(session.attribute(&el, "content").await?.unwrap_or_default())),
                None => Ok(None),
            }
        };
        let points = VIEWPORT_META_POINTS;
        findings.push(match contain(meta.await)? {
            Ok(Some(content)) if viewport_meta_ok(&content) => Finding::new(
                category,
                "Viewport Meta Tag",
                Status::Pass,
                points,
                points,
                viewport,
                "Configured correctly for responsiveness.",
            ),
            Ok(Some(content)) => Finding::new(
                category,
                "Viewport Meta Tag",
                Status::Fail,
                0.0,
                points,
                viewport,
                format!("Suboptimal or restrictive viewport: '{}'.", content.to_lowercase()),
            ),
            Ok(None) => Finding::new(category, "Viewport Meta Tag", Status::Fail, 0.0, points, viewport, "Viewport meta tag missing."),
            Err(_) => Finding::new(category, "Viewport Meta Tag", Status::Fail, 0.0, points, viewport, "Error checking viewport meta."),
        });
    }

    let points = HORIZONTAL_SCROLL_POINTS;
    let ready = poll_until(SCROLL_READY_BUDGET, POLL_INTERVAL, move || async move {
        let value = session.execute(BODY_READY_SCRIPT, Vec::new()).await?;
        Ok(Observation::new(truthy(&value), "body has no height yet"))
    })
    .await?;
    if !ready.passed {
        findings.push(Finding::new(
            category,
            "Horizontal Scrollbar",
            Status::Warn,
            0.0,
            points,
            viewport,
            "Page content not fully loaded for scroll check.",
        ));
        return Ok(findings);
    }

    findings.push(match contain(session.execute(HORIZONTAL_SCROLL_SCRIPT, Vec::new()).await)? {
        Ok(value) if !truthy(&value) => Finding::new(
            category,
            "Horizontal Scrollbar",
            Status::Pass,
            points,
            points,
            viewport,
            "No horizontal scrollbar detected.",
        ),
        Ok(_) => Finding::new(category, "Horizontal Scrollbar", Status::Fail, 0.0, points, viewport, "Horizontal scrollbar detected."),
        Err(_) => Finding::new(category, "Horizontal Scrollbar", Status::Fail, 0.0, points, viewport, "Error checking scroll."),
    });
    Ok(findings)
}
