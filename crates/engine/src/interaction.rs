//! Multi-step interaction state machine
//!
//! An interaction runs `Idle -> Setup -> Step(0..n) -> Cleanup -> Done`.
//! A failed setup action aborts without cleanup; a failed step aborts the
//! remaining steps but cleanup still runs. The whole interaction yields one
//! pass/fail verdict plus a step-by-step log.

use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use webgrade_common::check::{
    value_text, Action, ElementQuery, InteractionSpec, InteractionStep, Outcome, OutcomeKind,
    ScrollDirection, SetupAction, AttributeExpectation,
};

use crate::browser::{describe_element, BrowserSession, ElementRef, ELEMENT_KEY};
use crate::error::{EngineError, EngineResult};
use crate::poll::{poll_until, POLL_INTERVAL};
use crate::predicate::{evaluate, Condition, Observation, Predicate};

/// Pause after each setup or cleanup action
pub const SETTLE_PAUSE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionState {
    Idle,
    Setup,
    Step(usize),
    Cleanup,
    Done,
    Aborted,
}

#[derive(Debug, Clone)]
pub struct InteractionResult {
    pub passed: bool,
    pub message: String,
    pub log: Vec<String>,
    pub final_state: InteractionState,
    pub setup_error: Option<String>,
}

impl InteractionResult {
    pub fn data(&self) -> Value {
        match &self.setup_error {
            Some(err) => json!({"setup_error": err}),
            None => json!({"interaction_log": self.log}),
        }
    }
}

pub struct InteractionRunner<'a> {
    session: &'a dyn BrowserSession,
    settle: Duration,
    state: InteractionState,
    log: Vec<String>,
}

impl<'a> InteractionRunner<'a> {
    pub fn new(session: &'a dyn BrowserSession) -> Self {
        Self {
            session,
            settle: SETTLE_PAUSE,
            state: InteractionState::Idle,
            log: Vec::new(),
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    fn transition(&mut self, next: InteractionState) {
        debug!(from = ?self.state, to = ?next, "interaction state");
        self.state = next;
    }

    /// Run to completion. Only session-fatal errors escape as `Err`.
    pub async fn run(mut self, spec: &InteractionSpec) -> EngineResult<InteractionResult> {
        self.transition(InteractionState::Setup);
        for action in &spec.initial_setup {
            if let Err(e) = self.run_page_action(action).await {
                if e.is_session_fatal() {
                    return Err(e);
                }
                self.transition(InteractionState::Aborted);
                return Ok(InteractionResult {
                    passed: false,
                    message: format!("Interaction setup failed: {}", e),
                    log: self.log,
                    final_state: self.state,
                    setup_error: Some(e.to_string()),
                });
            }
        }

        let mut passed = true;
        for (index, step) in spec.sequence.iter().enumerate() {
            self.transition(InteractionState::Step(index));
            let step_passed = match self.run_step(index, step).await {
                Ok(step_passed) => step_passed,
                Err(e) if e.is_session_fatal() => return Err(e),
                Err(e) => {
                    warn!("Interaction step {} failed: {}", index + 1, e);
                    self.log.push(format!("  [FAIL] Step error: {}", e));
                    false
                }
            };
            if !step_passed {
                passed = false;
                break;
            }
        }

        self.transition(InteractionState::Cleanup);
        for action in &spec.final_cleanup {
            if let Err(e) = self.run_page_action(action).await {
                warn!("Interaction cleanup '{}' failed: {}", action.type_name(), e);
                self.log.push(format!("  WARN: Cleanup failed: {}", e));
            }
        }

        self.transition(if passed {
            InteractionState::Done
        } else {
            InteractionState::Aborted
        });
        let message = if passed {
            "All interaction steps/outcomes verified."
        } else {
            "One or more interaction steps/outcomes failed."
        };
        Ok(InteractionResult {
            passed,
            message: message.to_string(),
            log: self.log,
            final_state: self.state,
            setup_error: None,
        })
    }

    async fn run_page_action(&self, action: &SetupAction) -> EngineResult<()> {
        debug!("Setup/cleanup action: {}", action.type_name());
        let session = self.session;
        match action {
            SetupAction::NavigateToUrlFragment { fragment } => {
                let current = session.current_url().await?;
                let base = current.split('#').next().unwrap_or_default();
                session.navigate(&format!("{}#{}", base, fragment)).await?;
            }
            SetupAction::SetCookie { name, value } => {
                session.add_cookie(name, &value_text(value)).await?;
            }
            SetupAction::DeleteCookie { name } => session.delete_cookie(name).await?,
            SetupAction::ExecuteScript { script } => {
                session.execute(script, Vec::new()).await?;
            }
            SetupAction::ClearLocalStorageKey { key } => {
                session
                    .execute("localStorage.removeItem(arguments[0]);", vec![json!(key)])
                    .await?;
            }
            SetupAction::SetLocalStorageKey { key, value } => {
                session
                    .execute(
                        "localStorage.setItem(arguments[0], arguments[1]);",
                        vec![json!(key), json!(value_text(value))],
                    )
                    .await?;
            }
        }
        sleep(self.settle).await;
        Ok(())
    }

    /// Returns whether the step passed
    async fn run_step(&mut self, index: usize, step: &InteractionStep) -> EngineResult<bool> {
        let session = self.session;
        let name = step
            .step_name
            .clone()
            .unwrap_or_else(|| format!("Step {}", index + 1));
        self.log.push(format!("--- Executing Step: {} ---", name));

        let Some(trigger) = session.find_element(&step.trigger_element).await? else {
            self.log
                .push(format!("  [FAIL] Trigger '{}' not found.", step.trigger_element));
            return Ok(false);
        };
        let ready = session.is_displayed(&trigger).await? && session.is_enabled(&trigger).await?;
        if !ready {
            self.log.push("  [FAIL] Trigger not displayed/enabled.".to_string());
            return Ok(false);
        }

        match perform_action(session, &step.action, &trigger).await {
            Ok(()) => {
                let desc = describe_element(session, &trigger).await;
                self.log
                    .push(format!("  Action '{}' on {}.", step.action.type_name(), desc));
            }
            Err(e) if e.is_session_fatal() => return Err(e),
            Err(e) => {
                self.log.push(format!(
                    "  [FAIL] Action '{}' failed: {}",
                    step.action.type_name(),
                    e
                ));
                return Ok(false);
            }
        }

        let budget = Duration::from_millis(step.wait_for_outcome_ms);
        let mut all_passed = true;
        for (o_index, outcome) in step.expected_outcomes.iter().enumerate() {
            let o_name = outcome
                .name
                .clone()
                .unwrap_or_else(|| format!("Outcome {}", o_index + 1));
            let obs = match self.verify_outcome(outcome, &trigger, budget).await {
                Ok(obs) => obs,
                Err(e) if e.is_session_fatal() => return Err(e),
                Err(e) => Observation::fail(format!("Error: {}", e)),
            };
            self.log.push(format!(
                "    [{}] {}: {}",
                if obs.passed { "PASS" } else { "FAIL" },
                o_name,
                obs.message
            ));
            all_passed &= obs.passed;
        }

        if all_passed {
            self.log.push(format!("--- Step {} Passed ---", name));
        }
        Ok(all_passed)
    }

    async fn verify_outcome(
        &self,
        outcome: &Outcome,
        trigger: &ElementRef,
        budget: Duration,
    ) -> EngineResult<Observation> {
        let session = self.session;
        if let OutcomeKind::AnimationOrTransitionEnds { max_wait_ms } = &outcome.kind {
            return wait_for_animation_end(session, outcome.target.query(), *max_wait_ms).await;
        }

        let predicate = match Predicate::for_outcome(outcome) {
            Some(p) => p,
            None => return Ok(Observation::fail("Unsupported outcome type.")),
        };
        let pred = &predicate;
        let obs = poll_until(budget, POLL_INTERVAL, move || evaluate(session, pred, Some(trigger))).await?;
        if obs.passed {
            Ok(obs)
        } else {
            Ok(Observation {
                message: format!("Timeout. Last state: {}", obs.message),
                ..obs
            })
        }
    }
}

async fn wait_for_animation_end(
    session: &dyn BrowserSession,
    target: Option<ElementQuery>,
    max_wait_ms: u64,
) -> EngineResult<Observation> {
    let Some(query) = target else {
        return Ok(Observation::fail("Animation outcome requires element_selector."));
    };
    let Some(el) = session.find_element(&query).await? else {
        return Ok(Observation::fail(format!(
            "Target for animation ('{}') not found.",
            query
        )));
    };

    let flag = format!("data-webgrade-event-ended-{}", chrono::Utc::now().timestamp_millis());
    let listener = "const el = arguments[0], flag = arguments[1]; if (!el) return false; \
        el.setAttribute(flag, 'false'); \
        const h = ev => { if (ev.target === el) { el.setAttribute(flag, 'true'); \
        el.removeEventListener('transitionend', h); el.removeEventListener('animationend', h); } }; \
        el.addEventListener('transitionend', h); el.addEventListener('animationend', h); return true;";
    if let Err(e) = session.execute(listener, vec![el.to_json(), json!(flag)]).await {
        if e.is_session_fatal() {
            return Err(e);
        }
        return Ok(Observation::fail(format!("Could not attach animation listener: {}", e)));
    }

    let predicate = Predicate::new(
        Some(query),
        Condition::Attribute(AttributeExpectation {
            attribute_name: flag.clone(),
            expected_value: json!("true"),
            class_contains_all: false,
            class_contains_any: false,
        }),
    );
    let pred = &predicate;
    let obs = poll_until(
        Duration::from_millis(max_wait_ms),
        Duration::from_millis(50),
        move || evaluate(session, pred, None),
    )
    .await?;

    if let Err(e) = session
        .execute("arguments[0].removeAttribute(arguments[1]);", vec![el.to_json(), json!(flag)])
        .await
    {
        debug!("Could not remove animation flag {}: {}", flag, e);
    }
    if obs.passed {
        Ok(Observation::pass("Animation/Transition event detected.").with_data(json!({"event_attr": flag})))
    } else {
        Ok(Observation::fail("Animation/Transition did not end within max_wait."))
    }
}

fn pointer_actions(steps: Vec<Value>) -> Value {
    json!({
        "actions": [{
            "type": "pointer",
            "id": "mouse",
            "parameters": {"pointerType": "mouse"},
            "actions": steps,
        }]
    })
}

fn move_to(element: &ElementRef) -> Value {
    json!({"type": "pointerMove", "duration": 100, "origin": {ELEMENT_KEY: element.0}, "x": 0, "y": 0})
}

/// Perform one step action on the trigger element
pub async fn perform_action(
    session: &dyn BrowserSession,
    action: &Action,
    element: &ElementRef,
) -> EngineResult<()> {
    let arg = element.to_json();
    match action {
        Action::Click => match session.click(element).await {
            Err(EngineError::ClickIntercepted(_)) | Err(EngineError::NotInteractable(_)) => {
                debug!("Native click intercepted, falling back to script click");
                session.execute("arguments[0].click();", vec![arg]).await?;
            }
            other => other?,
        },
        Action::Hover => session.perform_actions(pointer_actions(vec![move_to(element)])).await?,
        Action::Focus => {
            session.execute("arguments[0].focus();", vec![arg]).await?;
        }
        Action::Blur => {
            session.execute("arguments[0].blur();", vec![arg]).await?;
        }
        Action::TypeText {
            text_to_type,
            key_delay_ms,
            clear_before_type,
        } => {
            if *clear_before_type {
                session.clear(element).await?;
            }
            if *key_delay_ms > 0 {
                for ch in text_to_type.chars() {
                    session.send_keys(element, &ch.to_string()).await?;
                    sleep(Duration::from_millis(*key_delay_ms)).await;
                }
            } else {
                session.send_keys(element, text_to_type).await?;
            }
        }
        Action::SelectOption {
            option_value,
            option_text,
            option_index,
        } => {
            let (mode, needle) = match (option_value, option_text, option_index) {
                (Some(v), _, _) => ("value", json!(value_text(v))),
                (None, Some(t), _) => ("text", json!(t)),
                (None, None, Some(i)) => ("index", json!(i)),
                (None, None, None) => {
                    return Err(EngineError::InvalidCheck(
                        "select_option needs option_value/text/index.".into(),
                    ))
                }
            };
            let script = "const [s, mode, needle] = arguments; const opts = Array.from(s.options || []); \
                const i = opts.findIndex((o, idx) => mode === 'value' ? o.value === needle \
                    : mode === 'text' ? o.text.trim() === needle : idx === needle); \
                if (i < 0) return false; s.selectedIndex = i; \
                s.dispatchEvent(new Event('input', {bubbles: true})); \
                s.dispatchEvent(new Event('change', {bubbles: true})); return true;";
            let selected = session.execute(script, vec![arg, json!(mode), needle.clone()]).await?;
            if selected != Value::Bool(true) {
                return Err(EngineError::InvalidCheck(format!(
                    "No option with {} {}",
                    mode, needle
                )));
            }
        }
        Action::DragAndDrop {
            target_element_selector,
            target_element_selector_type,
        } => {
            let query = ElementQuery {
                selector: target_element_selector.clone(),
                selector_type: *target_element_selector_type,
            };
            let target = session
                .find_element(&query)
                .await?
                .ok_or_else(|| EngineError::NoSuchElement("Drag target not found.".into()))?;
            session
                .perform_actions(pointer_actions(vec![
                    move_to(element),
                    json!({"type": "pointerDown", "button": 0}),
                    move_to(&target),
                    json!({"type": "pointerUp", "button": 0}),
                ]))
                .await?;
            session.release_actions().await?;
        }
        Action::ScrollToElement => {
            session
                .execute("arguments[0].scrollIntoView({block: 'center'});", vec![arg])
                .await?;
        }
        Action::ScrollWindow {
            x_pixels,
            y_pixels,
            direction,
        } => {
            match direction {
                Some(ScrollDirection::Bottom) => {
                    session
                        .execute("window.scrollTo(0, document.body.scrollHeight);", Vec::new())
                        .await?
                }
                Some(ScrollDirection::Top) => session.execute("window.scrollTo(0, 0);", Vec::new()).await?,
                None => {
                    session
                        .execute(
                            "window.scrollBy(arguments[0], arguments[1]);",
                            vec![json!(x_pixels), json!(y_pixels)],
                        )
                        .await?
                }
            };
        }
        Action::SubmitForm => {
            if session.tag_name(element).await?.eq_ignore_ascii_case("form") {
                session
                    .execute(
                        "const f = arguments[0]; if (f.requestSubmit) { f.requestSubmit(); } else { f.submit(); }",
                        vec![arg],
                    )
                    .await?;
            } else {
                session.click(element).await?;
            }
        }
        Action::KeyPress {
            key,
            target_element_selector_config,
        } => {
            let target = match target_element_selector_config {
                Some(query) => session
                    .find_element(query)
                    .await?
                    .ok_or_else(|| EngineError::NoSuchElement(format!("Key target '{}' not found.", query)))?,
                None => element.clone(),
            };
            let chord = parse_chord(key);
            match chord.split_last() {
                Some((last, modifiers)) if !modifiers.is_empty() && modifiers.iter().all(|k| is_modifier(*k)) => {
                    session.execute("arguments[0].focus();", vec![target.to_json()]).await?;
                    session.perform_actions(key_chord_actions(modifiers, *last)).await?;
                    session.release_actions().await?;
                }
                Some(_) => {
                    let text: String = chord.iter().collect();
                    session.send_keys(&target, &text).await?;
                }
                None => return Err(EngineError::InvalidCheck("key_press needs a key.".into())),
            }
        }
        Action::ExecuteScriptOnElement { script } => {
            session.execute(script, vec![arg]).await?;
        }
        Action::Wait { duration_ms } => sleep(Duration::from_millis(*duration_ms)).await,
    }
    Ok(())
}

/// WebDriver code point for a named key
fn key_code(name: &str) -> Option<char> {
    let code = match name {
        "BACKSPACE" | "BACK_SPACE" => '\u{E003}',
        "TAB" => '\u{E004}',
        "RETURN" => '\u{E006}',
        "ENTER" => '\u{E007}',
        "SHIFT" => '\u{E008}',
        "CONTROL" | "CTRL" => '\u{E009}',
        "ALT" => '\u{E00A}',
        "ESCAPE" | "ESC" => '\u{E00C}',
        "SPACE" => '\u{E00D}',
        "PAGE_UP" => '\u{E00E}',
        "PAGE_DOWN" => '\u{E00F}',
        "END" => '\u{E010}',
        "HOME" => '\u{E011}',
        "LEFT" | "ARROW_LEFT" => '\u{E012}',
        "UP" | "ARROW_UP" => '\u{E013}',
        "RIGHT" | "ARROW_RIGHT" => '\u{E014}',
        "DOWN" | "ARROW_DOWN" => '\u{E015}',
        "DELETE" => '\u{E017}',
        "COMMAND" | "META" => '\u{E03D}',
        _ => return None,
    };
    Some(code)
}

fn is_modifier(key: char) -> bool {
    matches!(key, '\u{E008}' | '\u{E009}' | '\u{E00A}' | '\u{E03D}')
}

/// Parse `CONTROL+K` style chords into key code points
pub fn parse_chord(spec: &str) -> Vec<char> {
    spec.split('+')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .flat_map(|part| match key_code(&part.to_uppercase()) {
            Some(code) => vec![code],
            None => part.to_lowercase().chars().collect(),
        })
        .collect()
}

fn key_chord_actions(modifiers: &[char], key: char) -> Value {
    let mut steps: Vec<Value> = modifiers
        .iter()
        .map(|m| json!({"type": "keyDown", "value": m.to_string()}))
        .collect();
    steps.push(json!({"type": "keyDown", "value": key.to_string()}));
    steps.push(json!({"type": "keyUp", "value": key.to_string()}));
    steps.extend(
        modifiers
            .iter()
            .rev()
            .map(|m| json!({"type": "keyUp", "value": m.to_string()})),
    );
    json!({"actions": [{"type": "key", "id": "keyboard", "actions": steps}]})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeBrowser, FakeElement};
    use webgrade_common::check::{OutcomeTarget, Visibility};

    fn menu_interaction(wait_ms: u64) -> InteractionSpec {
        serde_json::from_value(json!({
            "initial_setup": [{"action_type": "set_local_storage_key", "key": "seen", "value": 1}],
            "sequence": [{
                "step_name": "Open menu",
                "trigger_element": {"selector": "#toggle"},
                "action": {"type": "click"},
                "wait_for_outcome_ms": wait_ms,
                "expected_outcomes": [
                    {"name": "Menu shown", "outcome_type": "visibility_change",
                     "element_selector": "#menu", "expected_visibility": "visible"}
                ]
            }],
            "final_cleanup": [{"action_type": "delete_cookie", "name": "session"}]
        }))
        .unwrap()
    }

    fn page(opens_menu: bool) -> FakeBrowser {
        let browser = FakeBrowser::new()
            .with_element(FakeElement::new("toggle", "button").matching("#toggle"))
            .with_element(FakeElement::new("menu", "ul").matching("#menu").hidden());
        if opens_menu {
            browser.on_click("toggle", |dom| {
                if let Some(menu) = dom.element_mut("menu") {
                    menu.displayed = true;
                }
            })
        } else {
            browser
        }
    }

    #[tokio::test]
    async fn test_interaction_reveals_menu() {
        let browser = page(true);
        let result = InteractionRunner::new(&browser)
            .with_settle(Duration::ZERO)
            .run(&menu_interaction(300))
            .await
            .unwrap();

        assert!(result.passed, "{:?}", result.log);
        assert_eq!(result.final_state, InteractionState::Done);
        assert_eq!(browser.dom().clicks, vec!["toggle".to_string()]);
        assert!(result.log.iter().any(|l| l.contains("[PASS] Menu shown")));
        assert!(result.log.iter().any(|l| l == "--- Step Open menu Passed ---"));
    }

    #[tokio::test]
    async fn test_menu_never_appears_fails_after_budget() {
        let browser = page(false);
        browser.dom().cookies.insert("session".into(), "abc".into());
        let start = std::time::Instant::now();
        let result = InteractionRunner::new(&browser)
            .with_settle(Duration::ZERO)
            .run(&menu_interaction(250))
            .await
            .unwrap();

        assert!(!result.passed);
        assert!(start.elapsed() >= Duration::from_millis(250));
        assert_eq!(result.final_state, InteractionState::Aborted);
        let failure = result
            .log
            .iter()
            .find(|l| l.contains("[FAIL] Menu shown"))
            .expect("outcome failure logged");
        assert!(failure.contains("Timeout. Last state: Visibility: Expected 'visible', Actual is_displayed: false"));
        assert!(browser.dom().scripts.iter().any(|s| s.contains("localStorage.setItem")));
        assert!(!browser.dom().cookies.contains_key("session"));
    }

    #[tokio::test]
    async fn test_listener_error_fails_outcome_and_still_cleans_up() {
        let browser = FakeBrowser::new()
            .with_element(FakeElement::new("toggle", "button").matching("#toggle"))
            .with_element(FakeElement::new("panel", "div").matching("#panel"))
            .on_script("addEventListener", |_, _| Err("listener injection failed".into()));
        let spec: InteractionSpec = serde_json::from_value(json!({
            "sequence": [{
                "step_name": "Slide panel",
                "trigger_element": {"selector": "#toggle"},
                "action": {"type": "click"},
                "wait_for_outcome_ms": 100,
                "expected_outcomes": [
                    {"name": "Panel settled", "outcome_type": "animation_or_transition_ends",
                     "element_selector": "#panel", "max_wait_ms": 100}
                ]
            }],
            "final_cleanup": [{"action_type": "execute_script", "script": "cleanupMarker()"}]
        }))
        .unwrap();

        let result = InteractionRunner::new(&browser)
            .with_settle(Duration::ZERO)
            .run(&spec)
            .await
            .unwrap();

        assert!(!result.passed);
        assert_eq!(result.final_state, InteractionState::Aborted);
        assert!(result
            .log
            .iter()
            .any(|l| l.contains("[FAIL] Panel settled") && l.contains("listener injection failed")));
        assert!(browser.dom().scripts.iter().any(|s| s.contains("cleanupMarker")));
    }

    #[tokio::test]
    async fn test_stale_trigger_fails_step_and_still_cleans_up() {
        let browser = page(true);
        browser.dom().cookies.insert("session".into(), "abc".into());
        browser.dom().stale.insert("toggle".into());

        let result = InteractionRunner::new(&browser)
            .with_settle(Duration::ZERO)
            .run(&menu_interaction(100))
            .await
            .unwrap();

        assert!(!result.passed);
        assert_eq!(result.final_state, InteractionState::Aborted);
        assert!(result.log.iter().any(|l| l.contains("[FAIL] Step error")));
        assert!(browser.dom().clicks.is_empty());
        assert!(!browser.dom().cookies.contains_key("session"));
    }

    #[tokio::test]
    async fn test_setup_failure_skips_cleanup() {
        let browser = page(true).on_script("explode", |_, _| Err("boom".into()));
        let spec: InteractionSpec = serde_json::from_value(json!({
            "initial_setup": [{"action_type": "execute_script", "script": "explode()"}],
            "sequence": [],
            "final_cleanup": [{"action_type": "execute_script", "script": "cleanupMarker()"}]
        }))
        .unwrap();

        let result = InteractionRunner::new(&browser)
            .with_settle(Duration::ZERO)
            .run(&spec)
            .await
            .unwrap();

        assert!(!result.passed);
        assert!(result.message.starts_with("Interaction setup failed"));
        assert!(result.data().get("setup_error").is_some());
        assert!(!browser.dom().scripts.iter().any(|s| s.contains("cleanupMarker")));
        assert!(browser.dom().clicks.is_empty());
    }

    #[tokio::test]
    async fn test_missing_trigger_fails_step() {
        let browser = FakeBrowser::new();
        let result = InteractionRunner::new(&browser)
            .with_settle(Duration::ZERO)
            .run(&menu_interaction(100))
            .await
            .unwrap();
        assert!(!result.passed);
        assert!(result.log.iter().any(|l| l.contains("Trigger '#toggle' not found")));
    }

    #[tokio::test]
    async fn test_disabled_trigger_fails_step() {
        let browser = FakeBrowser::new()
            .with_element(FakeElement::new("toggle", "button").matching("#toggle").disabled());
        let result = InteractionRunner::new(&browser)
            .with_settle(Duration::ZERO)
            .run(&menu_interaction(100))
            .await
            .unwrap();
        assert!(!result.passed);
        assert!(result.log.iter().any(|l| l.contains("not displayed/enabled")));
    }

    #[tokio::test]
    async fn test_navigate_to_fragment_replaces_existing_fragment() {
        let browser = FakeBrowser::new();
        browser.dom().url = "file:///page.html#old".into();
        let runner = InteractionRunner::new(&browser).with_settle(Duration::ZERO);
        runner
            .run_page_action(&SetupAction::NavigateToUrlFragment { fragment: "pricing".into() })
            .await
            .unwrap();
        assert_eq!(browser.dom().url, "file:///page.html#pricing");
    }

    #[tokio::test]
    async fn test_type_text_with_clear() {
        let browser = FakeBrowser::new()
            .with_element(FakeElement::new("q", "input").matching("#q").attr("value", "old"));
        let action = Action::TypeText {
            text_to_type: "shoes".into(),
            key_delay_ms: 0,
            clear_before_type: true,
        };
        perform_action(&browser, &action, &ElementRef("q".into())).await.unwrap();
        assert_eq!(browser.dom().element("q").unwrap().attributes["value"], "shoes");
    }

    #[tokio::test]
    async fn test_key_chord_uses_actions() {
        let browser = FakeBrowser::new().with_element(FakeElement::new("body", "body"));
        let action = Action::KeyPress {
            key: "CONTROL+K".into(),
            target_element_selector_config: None,
        };
        perform_action(&browser, &action, &ElementRef("body".into())).await.unwrap();
        let dom = browser.dom();
        let steps = &dom.actions[0]["actions"][0]["actions"];
        assert_eq!(steps.as_array().unwrap().len(), 4);
        assert_eq!(steps[0]["value"], "\u{E009}");
        assert_eq!(steps[1]["value"], "k");
    }

    #[tokio::test]
    async fn test_select_option_without_choice_is_error() {
        let browser = FakeBrowser::new();
        let action = Action::SelectOption {
            option_value: None,
            option_text: None,
            option_index: None,
        };
        let result = perform_action(&browser, &action, &ElementRef("s".into())).await;
        assert!(matches!(result, Err(EngineError::InvalidCheck(_))));
    }

    #[tokio::test]
    async fn test_animation_outcome_detects_event() {
        let browser = FakeBrowser::new()
            .with_element(FakeElement::new("panel", "div").matching("#panel"))
            .on_script("addEventListener", |dom, args| {
                let flag = args[1].as_str().unwrap_or_default().to_string();
                if let Some(panel) = dom.element_mut("panel") {
                    panel.attributes.insert(flag, "true".into());
                }
                Ok(json!(true))
            });
        let outcome = Outcome {
            name: None,
            target: OutcomeTarget {
                element_selector: Some("#panel".into()),
                element_selector_type: None,
            },
            kind: OutcomeKind::AnimationOrTransitionEnds { max_wait_ms: 200 },
        };
        let runner = InteractionRunner::new(&browser);
        let obs = runner
            .verify_outcome(&outcome, &ElementRef("panel".into()), Duration::from_millis(100))
            .await
            .unwrap();
        assert!(obs.passed, "{}", obs.message);
    }

    #[test]
    fn test_parse_chord() {
        assert_eq!(parse_chord("CONTROL+K"), vec!['\u{E009}', 'k']);
        assert_eq!(parse_chord("Enter"), vec!['\u{E007}']);
        assert_eq!(parse_chord("a"), vec!['a']);
        assert!(parse_chord("").is_empty());
    }

    #[test]
    fn test_visibility_outcome_predicate() {
        let outcome: Outcome = serde_json::from_value(json!({
            "outcome_type": "visibility_change", "element_selector": "#m", "expected_visibility": "hidden"
        }))
        .unwrap();
        let pred = Predicate::for_outcome(&outcome).unwrap();
        assert!(matches!(pred.condition, Condition::Visibility(Visibility::Hidden)));
    }
}
