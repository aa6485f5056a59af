//! Live-page text contrast scan
//!
//! The browser only reports computed style strings; compositing and the
//! WCAG verdict happen in [`webgrade_common::color`].

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use webgrade_common::color::{assess_contrast, effective_background, Rgba, TextStyle};
use webgrade_common::{Category, Finding, Status};

use crate::browser::{describe_element, BrowserSession, ElementRef};
use crate::error::EngineResult;

/// Upper bound on candidates per viewport
pub const MAX_CANDIDATES: usize = 150;

/// Points deducted per AA failure
pub const AA_PENALTY: f64 = 2.5;

const CANDIDATE_SCRIPT: &str = r#"
const found = [];
const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_ELEMENT, {
  acceptNode(node) {
    const skip = ['SCRIPT', 'STYLE', 'NOSCRIPT', 'IFRAME', 'HEAD', 'META', 'LINK', 'TITLE'];
    if (skip.includes(node.nodeName) || node.closest('svg')) return NodeFilter.FILTER_REJECT;
    let direct = false;
    for (let c = node.firstChild; c; c = c.nextSibling) {
      if (c.nodeType === Node.TEXT_NODE && c.nodeValue.trim().length > 0) { direct = true; break; }
    }
    const placeholder = (node.nodeName === 'INPUT' || node.nodeName === 'TEXTAREA')
      && node.placeholder && node.placeholder.trim().length > 0;
    if (!direct && !placeholder) return NodeFilter.FILTER_SKIP;
    const s = window.getComputedStyle(node);
    if (!s || s.display === 'none' || s.visibility === 'hidden' || parseFloat(s.opacity) === 0
      || parseFloat(s.fontSize) < 8 || node.offsetWidth === 0 || node.offsetHeight === 0) {
      return NodeFilter.FILTER_REJECT;
    }
    return NodeFilter.FILTER_ACCEPT;
  }
});
while (walker.nextNode() && found.length < arguments[0]) found.push(walker.currentNode);
return found;
"#;

const STYLE_SCRIPT: &str = "const el = arguments[0]; \
    if (!el || !el.checkVisibility || !el.checkVisibility()) return null; \
    const s = window.getComputedStyle(el); if (!s) return null; \
    return {color: s.color, fontSize: s.fontSize, fontWeight: s.fontWeight, opacity: s.opacity};";

const BACKGROUND_SCRIPT: &str = "const layers = []; \
    for (let el = arguments[0]; el; el = el.parentElement) { \
      layers.push(getComputedStyle(el).backgroundColor); \
      if (el.tagName === 'BODY' || el.tagName === 'HTML') break; \
    } \
    return {layers: layers, document: getComputedStyle(document.documentElement).backgroundColor};";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComputedText {
    color: Option<String>,
    font_size: Option<String>,
    #[serde(default)]
    font_weight: Option<Value>,
    #[serde(default)]
    opacity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BackgroundChain {
    #[serde(default)]
    layers: Vec<String>,
    #[serde(default)]
    document: Option<String>,
}

#[derive(Debug, Default)]
struct Tally {
    checked: usize,
    aa_failures: usize,
    aaa_only: usize,
}

fn snippet(text: &str) -> String {
    let short: String = text.chars().take(40).collect::<String>().replace('\n', " ");
    if text.chars().count() > 40 {
        format!("{}...", short)
    } else {
        short
    }
}

/// Scan visible text at the current viewport and score it
pub async fn check_contrast(session: &dyn BrowserSession, viewport: &str) -> EngineResult<Vec<Finding>> {
    let max = Category::ColorContrast.base_cap();
    let category = Category::ColorContrast;
    let mut findings = Vec::new();

    let raw = match session.execute(CANDIDATE_SCRIPT, vec![json!(MAX_CANDIDATES)]).await {
        Ok(raw) => raw,
        Err(e) if e.is_session_fatal() => return Err(e),
        Err(e) => {
            findings.push(Finding::new(
                category,
                "Contrast Element Fetch",
                Status::Fail,
                0.0,
                max,
                viewport,
                format!("Error fetching text elements: {}", e),
            ));
            return Ok(findings);
        }
    };
    let candidates: Vec<ElementRef> = raw
        .as_array()
        .map(|items| items.iter().filter_map(ElementRef::from_json).collect())
        .unwrap_or_default();
    if candidates.is_empty() {
        findings.push(Finding::new(
            category,
            "Contrast Check",
            Status::Info,
            max,
            max,
            viewport,
            "No visible text elements by script to check.",
        ));
        return Ok(findings);
    }

    let mut visible = Vec::with_capacity(candidates.len());
    for el in candidates {
        match session.is_displayed(&el).await {
            Ok(true) => visible.push(el),
            Ok(false) => {}
            Err(e) if e.is_session_fatal() => return Err(e),
            Err(e) => debug!("Contrast candidate dropped: {}", e),
        }
    }
    if visible.is_empty() {
        findings.push(Finding::new(
            category,
            "Contrast Check",
            Status::Info,
            max,
            max,
            viewport,
            "No valid text elements after filtering.",
        ));
        return Ok(findings);
    }

    info!("Checking contrast for ~{} text candidate(s) at {}", visible.len(), viewport);
    let mut tally = Tally::default();
    for el in &visible {
        match assess_element(session, el, viewport, &mut tally).await {
            Ok(Some(finding)) => findings.push(finding),
            Ok(None) => {}
            Err(e) if e.is_session_fatal() => return Err(e),
            Err(e) => debug!("Contrast element skipped: {}", e),
        }
    }

    let result = if tally.checked == 0 {
        Finding::new(
            category,
            "Contrast Check Result",
            Status::Fail,
            0.0,
            max,
            viewport,
            format!("Checked 0 of {} candidates.", visible.len()),
        )
    } else if tally.aa_failures > 0 {
        Finding::new(
            category,
            "Contrast Check Result",
            Status::Fail,
            (max - tally.aa_failures as f64 * AA_PENALTY).max(0.0),
            max,
            viewport,
            format!(
                "{} WCAG AA failures on {} instances.",
                tally.aa_failures, tally.checked
            ),
        )
    } else {
        Finding::new(
            category,
            "Contrast Check Result",
            Status::Pass,
            max,
            max,
            viewport,
            format!(
                "All {} instances meet WCAG AA. ({} only AA, not AAA).",
                tally.checked, tally.aaa_only
            ),
        )
    };
    findings.push(result);
    Ok(findings)
}

/// Detail finding for one element, if it fails AA or misses AAA
async fn assess_element(
    session: &dyn BrowserSession,
    el: &ElementRef,
    viewport: &str,
    tally: &mut Tally,
) -> EngineResult<Option<Finding>> {
    let mut text = session.text(el).await?.trim().to_string();
    if text.is_empty() {
        let tag = session.tag_name(el).await?.to_lowercase();
        if tag == "input" || tag == "textarea" {
            text = session
                .attribute(el, "placeholder")
                .await?
                .unwrap_or_default()
                .trim()
                .to_string();
        }
    }
    if text.is_empty() {
        return Ok(None);
    }

    let raw = session.execute(STYLE_SCRIPT, vec![el.to_json()]).await?;
    if raw.is_null() {
        return Ok(None);
    }
    let computed: ComputedText = serde_json::from_value(raw)?;
    let (Some(color), Some(font_size)) = (computed.color.as_deref(), computed.font_size.as_deref()) else {
        return Ok(None);
    };
    let weight = computed
        .font_weight
        .as_ref()
        .map(webgrade_common::check::value_text)
        .unwrap_or_default();
    let Some(style) = TextStyle::from_computed(color, font_size, &weight, computed.opacity.as_deref()) else {
        return Ok(None);
    };

    let chain: BackgroundChain =
        serde_json::from_value(session.execute(BACKGROUND_SCRIPT, vec![el.to_json()]).await?)?;
    let background = effective_background(
        chain.layers.iter().map(|l| Rgba::parse(l)),
        chain.document.as_deref().and_then(Rgba::parse),
    );
    let Some(verdict) = assess_contrast(&style, background) else {
        return Ok(None);
    };
    tally.checked += 1;

    let category = Category::ColorContrast;
    let text = snippet(&text);
    if !verdict.passes_aa {
        tally.aa_failures += 1;
        let desc = describe_element(session, el).await;
        return Ok(Some(
            Finding::new(
                category,
                "Contrast Failure (AA)",
                Status::Fail,
                0.0,
                0.0,
                viewport,
                format!("AA FAIL {:.2} for '{}' in {}", verdict.ratio, text, desc),
            )
            .with_data(json!({
                "ratio": verdict.ratio,
                "text": text,
                "fg": color,
                "bg_eff": background.to_string(),
            })),
        ));
    }
    if !verdict.passes_aaa {
        tally.aaa_only += 1;
        let desc = describe_element(session, el).await;
        return Ok(Some(
            Finding::new(
                category,
                "Contrast Suboptimal (AAA)",
                Status::Info,
                0.0,
                0.0,
                viewport,
                format!("AAA WARN {:.2} for '{}' in {}", verdict.ratio, text, desc),
            )
            .with_data(json!({"ratio": verdict.ratio})),
        ));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeBrowser, FakeElement};

    fn page(colors: &[(&'static str, &'static str)]) -> FakeBrowser {
        let mut browser = FakeBrowser::new();
        let mut refs = Vec::new();
        for (id, _) in colors {
            browser = browser.with_element(FakeElement::new(id, "p").text("Some readable copy"));
            refs.push(ElementRef(id.to_string()).to_json());
        }
        let by_id: Vec<(String, String)> = colors
            .iter()
            .map(|(id, c)| (id.to_string(), c.to_string()))
            .collect();
        browser
            .returning("createTreeWalker", Value::Array(refs))
            .on_script("checkVisibility", move |_, args| {
                let id = ElementRef::from_json(&args[0]).map(|e| e.0).unwrap_or_default();
                let color = by_id
                    .iter()
                    .find(|(i, _)| *i == id)
                    .map(|(_, c)| c.clone())
                    .unwrap_or_default();
                Ok(json!({"color": color, "fontSize": "16px", "fontWeight": "400", "opacity": "1"}))
            })
            .returning(
                "parentElement",
                json!({"layers": ["rgba(0, 0, 0, 0)", "rgb(255, 255, 255)"], "document": "rgba(0, 0, 0, 0)"}),
            )
    }

    fn result(findings: &[Finding]) -> &Finding {
        findings.last().unwrap()
    }

    #[tokio::test]
    async fn test_all_text_meets_aa() {
        let browser = page(&[("a", "rgb(0, 0, 0)"), ("b", "rgb(33, 33, 33)")]);
        let findings = check_contrast(&browser, "desktop").await.unwrap();
        assert_eq!(findings.len(), 1);
        let r = result(&findings);
        assert_eq!(r.check, "Contrast Check Result");
        assert_eq!(r.status, Status::Pass);
        assert_eq!(r.points_earned, 15.0);
        assert_eq!(r.message, "All 2 instances meet WCAG AA. (0 only AA, not AAA).");
    }

    #[tokio::test]
    async fn test_aa_failure_penalized_aaa_miss_is_info() {
        let browser = page(&[
            ("grey", "rgb(119, 119, 119)"),
            ("dim", "rgb(100, 100, 100)"),
            ("ink", "rgb(0, 0, 0)"),
        ]);
        let findings = check_contrast(&browser, "mobile").await.unwrap();
        assert_eq!(findings.len(), 3);

        assert_eq!(findings[0].check, "Contrast Failure (AA)");
        assert_eq!(findings[0].max_points_for_this_check, 0.0);
        assert_eq!(findings[0].data.as_ref().unwrap()["bg_eff"], "rgb(255, 255, 255)");
        assert_eq!(findings[1].check, "Contrast Suboptimal (AAA)");
        assert_eq!(findings[1].status, Status::Info);

        let r = result(&findings);
        assert_eq!(r.status, Status::Fail);
        assert_eq!(r.points_earned, 12.5);
        assert_eq!(r.message, "1 WCAG AA failures on 3 instances.");
    }

    #[tokio::test]
    async fn test_transparent_text_is_excluded() {
        let browser = page(&[("ghost", "rgba(0, 0, 0, 0.05)")]);
        let findings = check_contrast(&browser, "desktop").await.unwrap();
        let r = result(&findings);
        assert_eq!(r.status, Status::Fail);
        assert_eq!(r.message, "Checked 0 of 1 candidates.");
    }

    #[tokio::test]
    async fn test_no_candidates_earns_full_points() {
        let browser = FakeBrowser::new().returning("createTreeWalker", json!([]));
        let findings = check_contrast(&browser, "desktop").await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].check, "Contrast Check");
        assert_eq!(findings[0].status, Status::Info);
        assert_eq!(findings[0].points_earned, 15.0);
    }

    #[tokio::test]
    async fn test_fetch_error_fails() {
        let browser = FakeBrowser::new().on_script("createTreeWalker", |_, _| Err("detached".into()));
        let findings = check_contrast(&browser, "desktop").await.unwrap();
        assert_eq!(findings[0].check, "Contrast Element Fetch");
        assert_eq!(findings[0].points_earned, 0.0);
        assert_eq!(findings[0].max_points_for_this_check, 15.0);
    }

    #[test]
    fn test_snippet_truncates() {
        assert_eq!(snippet("short\ntext"), "short text");
        let long = "x".repeat(45);
        assert_eq!(snippet(&long), format!("{}...", "x".repeat(40)));
    }
}
