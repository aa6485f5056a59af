//! Declarative adherence check interpreter

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use webgrade_common::check::{CheckKind, CheckSpec, OrderCheck};
use webgrade_common::{Category, Finding, ScoreBoard};

use crate::browser::{describe_element, BrowserSession};
use crate::error::EngineResult;
use crate::interaction::InteractionRunner;
use crate::predicate::{evaluate, Observation, Predicate};

const ORDER_SCRIPT: &str = "const els = Array.from(arguments); \
    const all = Array.from(document.querySelectorAll('*')); \
    return els.map((el, i) => ({index: all.indexOf(el), contains_previous: i > 0 && el.contains(els[i - 1])}));";

#[derive(Debug, Deserialize)]
struct OrderSample {
    index: i64,
    #[serde(default)]
    contains_previous: bool,
}

/// Evaluate one check at one viewport.
///
/// Check failures and non-fatal errors both yield a FAIL finding worth 0 of
/// the declared points. Only session-fatal errors are returned as `Err`.
pub async fn evaluate_check(
    session: &dyn BrowserSession,
    spec: &CheckSpec,
    viewport: &str,
) -> EngineResult<Finding> {
    let name = spec.check_name();
    debug!("Adherence check '{}' ({}) at {}", name, spec.kind.type_name(), viewport);

    let observation = match observe(session, &spec.kind).await {
        Ok(obs) => obs,
        Err(e) if e.is_session_fatal() => return Err(e),
        Err(e) => {
            warn!("Check '{}' errored: {}", name, e);
            Observation::fail(format!("CRITICAL ERROR during check execution: {}", e))
                .with_data(json!({"error": e.to_string()}))
        }
    };

    let finding = Finding::verdict(
        Category::PromptAdherence,
        name,
        observation.passed,
        spec.points,
        viewport,
        observation.message,
    );
    Ok(match observation.data {
        Some(data) => finding.with_data(data),
        None => finding,
    })
}

async fn observe(session: &dyn BrowserSession, kind: &CheckKind) -> EngineResult<Observation> {
    match kind {
        CheckKind::ElementOrder(order) => verify_order(session, order).await,
        CheckKind::Interaction(interaction) => {
            let result = InteractionRunner::new(session).run(interaction).await?;
            let data = result.data();
            Ok(Observation::new(result.passed, result.message).with_data(data))
        }
        other => match Predicate::for_check(other) {
            Some(predicate) => evaluate(session, &predicate, None).await,
            None => Ok(Observation::fail(format!(
                "Unsupported adherence check type: {}",
                other.type_name()
            ))),
        },
    }
}

async fn verify_order(session: &dyn BrowserSession, order: &OrderCheck) -> EngineResult<Observation> {
    if order.selectors_in_order.len() < 2 {
        return Ok(Observation::fail("Order check needs >= 2 selectors."));
    }

    let mut elements = Vec::with_capacity(order.selectors_in_order.len());
    for entry in &order.selectors_in_order {
        let query = entry.query();
        match session.find_visible(&query).await? {
            Some(el) => elements.push(el),
            None => {
                return Ok(Observation::fail(format!(
                    "Order element '{}' not found/visible.",
                    query
                )))
            }
        }
    }

    let args: Vec<Value> = elements.iter().map(|e| e.to_json()).collect();
    let raw = session.execute(ORDER_SCRIPT, args).await?;
    let samples: Vec<OrderSample> = serde_json::from_value(raw)?;
    let indices: Vec<i64> = samples.iter().map(|p| p.index).collect();

    for (i, pair) in samples.windows(2).enumerate() {
        let (prev, next) = (&pair[0], &pair[1]);
        if prev.index < 0 || next.index < 0 || next.index >= prev.index {
            continue;
        }
        if next.contains_previous {
            debug!("Order pair {} is a parent following its child", i);
            continue;
        }
        let mut described = Vec::with_capacity(elements.len());
        for el in &elements {
            described.push(describe_element(session, el).await);
        }
        return Ok(Observation::fail("Elements not in expected DOM source order.")
            .with_data(json!({"indices": indices, "selectors": described})));
    }
    Ok(Observation::pass("Elements in expected DOM source order.").with_data(json!({"indices": indices})))
}

/// Run every applicable check in declaration order, recording into `board`.
///
/// Stops at the first session-fatal error; findings recorded so far stay.
pub async fn run_checks(
    session: &dyn BrowserSession,
    checks: &[CheckSpec],
    viewport: &str,
    board: &mut ScoreBoard,
) -> EngineResult<()> {
    for spec in checks.iter().filter(|c| c.applies_to(viewport)) {
        let finding = evaluate_check(session, spec, viewport).await?;
        board.record(finding);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::fake::{FakeBrowser, FakeElement};
    use webgrade_common::{Status, ViewportPlan};

    fn check(value: Value) -> CheckSpec {
        serde_json::from_value(value).unwrap()
    }

    fn landing_page() -> FakeBrowser {
        FakeBrowser::new()
            .with_element(FakeElement::new("hero", "section").matching(".hero"))
            .with_element(FakeElement::new("cta", "a").matching("[data-testid=\"cta\"]").text("Buy now"))
            .with_element(FakeElement::new("promo", "div").matching(".promo").hidden())
    }

    #[tokio::test]
    async fn test_presence_pass_and_fail() {
        let browser = landing_page();
        let present = check(json!({"type": "element_presence", "name": "Hero", "points": 5, "selector": ".hero"}));
        let finding = evaluate_check(&browser, &present, "desktop").await.unwrap();
        assert_eq!(finding.status, Status::Pass);
        assert_eq!(finding.points_earned, 5.0);
        assert_eq!(finding.category, Category::PromptAdherence);

        let hidden = check(json!({"type": "element_presence", "name": "Promo", "points": 3, "selector": ".promo"}));
        let finding = evaluate_check(&browser, &hidden, "desktop").await.unwrap();
        assert_eq!(finding.status, Status::Fail);
        assert_eq!(finding.points_earned, 0.0);
        assert_eq!(finding.max_points_for_this_check, 3.0);
        assert!(finding.message.contains("present but NOT visible"));
    }

    #[tokio::test]
    async fn test_should_not_exist_passes_for_hidden_element() {
        let browser = landing_page();
        let spec = check(json!({
            "type": "element_presence", "points": 2, "selector": ".promo", "should_not_exist": true
        }));
        let finding = evaluate_check(&browser, &spec, "mobile").await.unwrap();
        assert!(finding.is_pass());
        assert_eq!(finding.check, "Unnamed element_presence check");
    }

    fn order_browser(indices: Value) -> FakeBrowser {
        FakeBrowser::new()
            .with_element(FakeElement::new("header", "header"))
            .with_element(FakeElement::new("main", "main"))
            .with_element(FakeElement::new("footer", "footer"))
            .returning("querySelectorAll('*')", indices)
    }

    fn order_check() -> CheckSpec {
        check(json!({
            "type": "element_order", "name": "Layout order", "points": 4,
            "selectors_in_order": ["header", {"selector": "main", "selector_type": "tag_name"}, "footer"]
        }))
    }

    #[tokio::test]
    async fn test_order_in_source_order() {
        let browser = order_browser(json!([
            {"index": 3, "contains_previous": false},
            {"index": 10, "contains_previous": false},
            {"index": 40, "contains_previous": false}
        ]));
        let finding = evaluate_check(&browser, &order_check(), "desktop").await.unwrap();
        assert!(finding.is_pass(), "{}", finding.message);
        assert_eq!(finding.data.unwrap()["indices"], json!([3, 10, 40]));
    }

    #[tokio::test]
    async fn test_order_out_of_order_fails() {
        let browser = order_browser(json!([
            {"index": 3, "contains_previous": false},
            {"index": 40, "contains_previous": false},
            {"index": 10, "contains_previous": false}
        ]));
        let finding = evaluate_check(&browser, &order_check(), "desktop").await.unwrap();
        assert_eq!(finding.status, Status::Fail);
        assert_eq!(finding.message, "Elements not in expected DOM source order.");
        assert_eq!(finding.data.unwrap()["selectors"][0], "<header>");
    }

    #[tokio::test]
    async fn test_order_parent_after_child_is_allowed() {
        let browser = order_browser(json!([
            {"index": 5, "contains_previous": false},
            {"index": 2, "contains_previous": true},
            {"index": 9, "contains_previous": false}
        ]));
        let finding = evaluate_check(&browser, &order_check(), "desktop").await.unwrap();
        assert!(finding.is_pass());
    }

    #[tokio::test]
    async fn test_order_needs_two_selectors() {
        let browser = order_browser(json!([]));
        let spec = check(json!({"type": "element_order", "points": 1, "selectors_in_order": ["header"]}));
        let finding = evaluate_check(&browser, &spec, "desktop").await.unwrap();
        assert_eq!(finding.message, "Order check needs >= 2 selectors.");
    }

    #[tokio::test]
    async fn test_order_missing_element() {
        let browser = order_browser(json!([]));
        let spec = check(json!({"type": "element_order", "points": 1, "selectors_in_order": ["header", "aside"]}));
        let finding = evaluate_check(&browser, &spec, "desktop").await.unwrap();
        assert_eq!(finding.message, "Order element 'aside' not found/visible.");
    }

    #[tokio::test]
    async fn test_errors_become_failed_findings() {
        let browser = FakeBrowser::new();
        let spec = check(json!({
            "type": "element_order", "name": "Broken", "points": 2, "selectors_in_order": ["a", "b"]
        }));
        // elements missing -> ordinary fail, no error
        let finding = evaluate_check(&browser, &spec, "desktop").await.unwrap();
        assert_eq!(finding.status, Status::Fail);

        let browser = FakeBrowser::new()
            .with_element(FakeElement::new("a", "a"))
            .with_element(FakeElement::new("b", "b"))
            .on_script("querySelectorAll", |_, _| Ok(json!("not a list")));
        let finding = evaluate_check(&browser, &spec, "desktop").await.unwrap();
        assert_eq!(finding.status, Status::Fail);
        assert_eq!(finding.points_earned, 0.0);
        assert!(finding.message.starts_with("CRITICAL ERROR during check execution"));
    }

    #[tokio::test]
    async fn test_fatal_error_propagates() {
        let browser = landing_page().lost_session();
        let spec = check(json!({"type": "element_presence", "points": 1, "selector": ".hero"}));
        let result = evaluate_check(&browser, &spec, "desktop").await;
        assert!(matches!(result, Err(EngineError::SessionLost(_))));
    }

    #[tokio::test]
    async fn test_interaction_finding_carries_log() {
        let browser = FakeBrowser::new().with_element(FakeElement::new("btn", "button").matching("#go"));
        let spec = check(json!({
            "type": "interaction", "name": "Click go", "points": 6,
            "sequence": [{
                "trigger_element": {"selector": "#go"},
                "action": {"type": "click"},
                "wait_for_outcome_ms": 0,
                "expected_outcomes": [{"outcome_type": "url_change", "expected_url_part": "page.html"}]
            }]
        }));
        let finding = evaluate_check(&browser, &spec, "desktop").await.unwrap();
        assert!(finding.is_pass(), "{}", finding.message);
        assert_eq!(finding.message, "All interaction steps/outcomes verified.");
        let log = finding.data.unwrap()["interaction_log"].clone();
        assert!(log.as_array().unwrap().len() >= 3);
    }

    #[tokio::test]
    async fn test_run_checks_respects_viewport_filter() {
        let browser = landing_page();
        let checks = vec![
            check(json!({"type": "element_presence", "name": "Hero", "points": 5, "selector": ".hero"})),
            check(json!({
                "type": "element_presence", "name": "Burger", "points": 3,
                "selector": ".burger", "viewports": ["mobile"]
            })),
        ];
        let mut board = ScoreBoard::new(&ViewportPlan::default(), 8.0);
        run_checks(&browser, &checks, "desktop", &mut board).await.unwrap();
        assert_eq!(board.adherence_earned(), 5.0);
        let (scores, _) = board.finish();
        assert_eq!(scores.prompt_adherence.details.len(), 1);
    }

    #[tokio::test]
    async fn test_evaluation_is_idempotent_on_static_page() {
        let browser = landing_page();
        let checks = vec![
            check(json!({"type": "element_presence", "name": "Hero", "points": 5, "selector": ".hero"})),
            check(json!({
                "type": "text_content", "name": "CTA text", "points": 2,
                "selector": "[data-testid=\"cta\"]", "expected_text": "buy", "match_type": "contains"
            })),
            check(json!({"type": "element_count", "name": "One CTA", "points": 1, "selector": "a", "expected_count": 1})),
        ];
        let mut first = Vec::new();
        let mut second = Vec::new();
        for spec in &checks {
            first.push(evaluate_check(&browser, spec, "desktop").await.unwrap());
        }
        for spec in &checks {
            second.push(evaluate_check(&browser, spec, "desktop").await.unwrap());
        }
        assert_eq!(first, second);
        assert!(first.iter().all(Finding::is_pass));
    }
}
