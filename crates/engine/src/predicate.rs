//! Single-shot page predicates
//!
//! Top-level checks and interaction outcomes both reduce to a [`Predicate`]:
//! an optional target element plus the condition it must satisfy. One
//! evaluator serves both, so matching rules live in exactly one place.

use regex::RegexBuilder;
use serde_json::{json, Value};
use webgrade_common::check::{
    AttributeExpectation, CheckKind, CountExpectation, CssExpectation, ElementQuery, Outcome,
    OutcomeKind, TextExpectation, TextMatch, UrlMatch, Visibility,
};

use crate::browser::{truthy, BrowserSession, ElementRef};
use crate::error::{EngineError, EngineResult};

/// Result of evaluating a predicate once
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub passed: bool,
    pub message: String,
    pub data: Option<Value>,
}

impl Observation {
    pub fn new(passed: bool, message: impl Into<String>) -> Self {
        Self {
            passed,
            message: message.into(),
            data: None,
        }
    }

    pub fn pass(message: impl Into<String>) -> Self {
        Self::new(true, message)
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::new(false, message)
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[derive(Debug, Clone)]
pub enum Condition {
    /// Found and displayed
    Visible,
    /// Absent, or present but not displayed
    NotVisible,
    /// In the DOM, optionally with a visibility requirement
    Exists { visibility: Option<Visibility> },
    DoesNotExist,
    Visibility(Visibility),
    Count(CountExpectation),
    ChildCount {
        child: ElementQuery,
        expect: CountExpectation,
    },
    Text(TextExpectation),
    Attribute(AttributeExpectation),
    Class {
        present: Option<String>,
        absent: Option<String>,
    },
    Css(CssExpectation),
    /// Truthy script result. Arguments are `[target]`, or
    /// `[trigger, target]` when `with_trigger` is set.
    Script {
        script: String,
        element_required: bool,
        with_trigger: bool,
    },
    Url {
        expected: String,
        match_type: UrlMatch,
    },
}

#[derive(Debug, Clone)]
pub struct Predicate {
    pub target: Option<ElementQuery>,
    pub condition: Condition,
}

impl Predicate {
    pub fn new(target: Option<ElementQuery>, condition: Condition) -> Self {
        Self { target, condition }
    }

    /// Predicate form of a single-shot check; `None` for checks that need
    /// more than one element or more than one step
    pub fn for_check(kind: &CheckKind) -> Option<Self> {
        let predicate = match kind {
            CheckKind::ElementPresence(p) => Predicate::new(
                Some(p.target.clone()),
                if p.should_not_exist {
                    Condition::NotVisible
                } else {
                    Condition::Visible
                },
            ),
            CheckKind::ElementCount(c) => {
                Predicate::new(Some(c.target.clone()), Condition::Count(c.expect.clone()))
            }
            CheckKind::TextContent(t) => {
                Predicate::new(Some(t.target.clone()), Condition::Text(t.expect.clone()))
            }
            CheckKind::AttributeValue(a) => {
                Predicate::new(Some(a.target.clone()), Condition::Attribute(a.expect.clone()))
            }
            CheckKind::CssProperty(c) => {
                Predicate::new(Some(c.target.clone()), Condition::Css(c.expect.clone()))
            }
            CheckKind::CustomScriptEvaluatesTrue(s) => Predicate::new(
                s.target(),
                Condition::Script {
                    script: s.script.clone().unwrap_or_default(),
                    element_required: s.element_required_for_script,
                    with_trigger: false,
                },
            ),
            CheckKind::ElementOrder(_) | CheckKind::Interaction(_) => return None,
        };
        Some(predicate)
    }

    /// Predicate form of an interaction outcome; `None` for event-based
    /// outcomes that need a listener installed first
    pub fn for_outcome(outcome: &Outcome) -> Option<Self> {
        let target = outcome.target.query();
        let condition = match &outcome.kind {
            OutcomeKind::AttributeChange(a) => Condition::Attribute(a.clone()),
            OutcomeKind::ClassChange {
                expected_class_present,
                expected_class_absent,
            } => Condition::Class {
                present: expected_class_present.clone(),
                absent: expected_class_absent.clone(),
            },
            OutcomeKind::VisibilityChange { expected_visibility } => {
                Condition::Visibility(*expected_visibility)
            }
            OutcomeKind::TextContentChange(t) => Condition::Text(t.clone()),
            OutcomeKind::CssPropertyChange(c) => Condition::Css(c.clone()),
            OutcomeKind::ElementExists { expected_visibility } => Condition::Exists {
                visibility: *expected_visibility,
            },
            OutcomeKind::ElementDoesNotExist => Condition::DoesNotExist,
            OutcomeKind::CustomScriptEvaluatesTrue { script } => Condition::Script {
                script: script.clone(),
                element_required: false,
                with_trigger: true,
            },
            OutcomeKind::NewElementCount {
                child_element_selector,
                child_element_selector_type,
                expect,
            } => Condition::ChildCount {
                child: ElementQuery {
                    selector: child_element_selector.clone(),
                    selector_type: *child_element_selector_type,
                },
                expect: expect.clone(),
            },
            OutcomeKind::UrlChange {
                expected_url_part,
                match_type,
            } => Condition::Url {
                expected: expected_url_part.clone(),
                match_type: *match_type,
            },
            OutcomeKind::AnimationOrTransitionEnds { .. } => return None,
        };
        Some(Predicate::new(target, condition))
    }

    fn required_target(&self) -> EngineResult<&ElementQuery> {
        self.target
            .as_ref()
            .ok_or_else(|| EngineError::InvalidCheck("condition requires a target selector".into()))
    }
}

/// Evaluate once against the live page
pub async fn evaluate(
    session: &dyn BrowserSession,
    predicate: &Predicate,
    trigger: Option<&ElementRef>,
) -> EngineResult<Observation> {
    match &predicate.condition {
        Condition::Visible | Condition::NotVisible => {
            let query = predicate.required_target()?;
            let element = session.find_element(query).await?;
            let present = element.is_some();
            let visible = match &element {
                Some(el) => session.is_displayed(el).await?,
                None => false,
            };
            let data = json!({"selector": query.selector, "is_present": present, "is_visible": visible});
            let obs = if matches!(predicate.condition, Condition::NotVisible) {
                if visible {
                    Observation::fail(format!("Element '{}' unexpectedly visible.", query))
                } else {
                    Observation::pass(format!("Element '{}' correctly not visible/present.", query))
                }
            } else if visible {
                Observation::pass(format!("Element '{}' present and visible.", query))
            } else if present {
                Observation::fail(format!("Element '{}' present but NOT visible.", query))
            } else {
                Observation::fail(format!("Element '{}' NOT found.", query))
            };
            Ok(obs.with_data(data))
        }

        Condition::Exists { visibility } => {
            let query = predicate.required_target()?;
            let element = session.find_element(query).await?;
            let in_dom = element.is_some();
            let mut obs = Observation::new(in_dom, format!("Element '{}' exists in DOM: {}.", query, in_dom));
            if let (Some(el), Some(expected)) = (&element, visibility) {
                let displayed = session.is_displayed(el).await?;
                let vis_ok = visibility_matches(*expected, displayed);
                obs.passed = vis_ok;
                obs.message.push_str(&format!(
                    " Visibility: Expected '{}', Actual is_displayed: {}",
                    visibility_name(*expected),
                    displayed
                ));
            }
            Ok(obs.with_data(json!({"is_in_dom": in_dom})))
        }

        Condition::DoesNotExist => {
            let query = predicate.required_target()?;
            let absent = session.find_element(query).await?.is_none();
            Ok(Observation::new(absent, format!("Element '{}' does not exist in DOM: {}", query, absent))
                .with_data(json!({"is_in_dom": !absent})))
        }

        Condition::Visibility(expected) => {
            let query = predicate.required_target()?;
            let displayed = match session.find_element(query).await? {
                Some(el) => session.is_displayed(&el).await?,
                None => false,
            };
            Ok(Observation::new(
                visibility_matches(*expected, displayed),
                format!(
                    "Visibility: Expected '{}', Actual is_displayed: {}",
                    visibility_name(*expected),
                    displayed
                ),
            )
            .with_data(json!({"is_displayed": displayed})))
        }

        Condition::Count(expect) => {
            let query = predicate.required_target()?;
            let actual = session.find_elements(query).await?.len() as i64;
            let outcome = expect
                .check(actual)
                .ok_or_else(|| EngineError::InvalidCheck("Invalid count parameters.".into()))?;
            Ok(Observation::new(
                outcome.passed,
                format!("Count is {} (Actual: {}, Expected: {}).", actual, actual, outcome.expected),
            )
            .with_data(json!({"actual": actual, "expected_str": outcome.expected})))
        }

        Condition::ChildCount { child, expect } => {
            let query = predicate.required_target()?;
            let Some(parent) = session.find_element(query).await? else {
                return Ok(Observation::fail(format!("Parent ('{}') not found for count.", query)));
            };
            let actual = session.find_elements_in(&parent, child).await?.len() as i64;
            let outcome = expect
                .check(actual)
                .ok_or_else(|| EngineError::InvalidCheck("Invalid count parameters.".into()))?;
            Ok(Observation::new(
                outcome.passed,
                format!("Child count: Actual: {}, Expected: {}", actual, outcome.expected),
            )
            .with_data(json!({"actual_count": actual})))
        }

        Condition::Text(expect) => {
            let query = predicate.required_target()?;
            let Some(el) = session.find_visible(query).await? else {
                return Ok(Observation::fail(format!(
                    "Element '{}' not found/visible for text.",
                    query
                )));
            };
            let actual = session.text(&el).await?.trim().to_string();
            let passed = text_matches(expect, &actual)?;
            let expected = expect.expected_text.trim();
            let message = format!(
                "Text (type: {}{}). Expected '{}...', Actual '{}...'",
                text_match_name(expect.match_type),
                if expect.case_sensitive { "" } else { ",i" },
                truncate(expected, 50),
                truncate(&actual, 50)
            );
            Ok(Observation::new(passed, message).with_data(json!({
                "actual": actual,
                "expected": expected,
                "match_type": text_match_name(expect.match_type),
            })))
        }

        Condition::Attribute(expect) => {
            let query = predicate.required_target()?;
            let Some(el) = session.find_element(query).await? else {
                return Ok(Observation::fail(format!(
                    "Element '{}' not found for attribute.",
                    query
                )));
            };
            let actual = session.attribute(&el, &expect.attribute_name).await?;
            let passed = expect.matches(actual.as_deref());
            let message = format!(
                "Attr '{}'. Expected: '{}', Actual: '{}'.",
                expect.attribute_name,
                expect.expected_value,
                actual.as_deref().unwrap_or("None")
            );
            Ok(Observation::new(passed, message).with_data(json!({
                "actual": actual,
                "expected": expect.expected_value,
                "attr_name": expect.attribute_name,
            })))
        }

        Condition::Class { present, absent } => {
            let query = predicate.required_target()?;
            if present.is_none() && absent.is_none() {
                return Err(EngineError::InvalidCheck("No class condition for class_change.".into()));
            }
            let Some(el) = session.find_element(query).await? else {
                return Ok(Observation::fail(format!(
                    "Target for class_change ('{}') not found.",
                    query
                )));
            };
            let class_attr = session.attribute(&el, "class").await?.unwrap_or_default();
            let mut classes: Vec<&str> = class_attr.split_whitespace().collect();
            classes.sort_unstable();
            classes.dedup();

            let mut passed = true;
            let mut parts = Vec::new();
            if let Some(cls) = present {
                let has = classes.contains(&cls.as_str());
                passed &= has;
                parts.push(format!("Present '{}': {}", cls, has));
            }
            if let Some(cls) = absent {
                let lacks = !classes.contains(&cls.as_str());
                passed &= lacks;
                parts.push(format!("Absent '{}': {}", cls, lacks));
            }
            Ok(Observation::new(
                passed,
                format!("Classes: {}. Current: '{}'", parts.join(", "), classes.join(" ")),
            )
            .with_data(json!({"current_classes": classes})))
        }

        Condition::Css(expect) => {
            let query = predicate.required_target()?;
            let Some(el) = session.find_visible(query).await? else {
                return Ok(Observation::fail(format!(
                    "Element '{}' not found/visible for CSS.",
                    query
                )));
            };
            let actual = session.css_value(&el, &expect.property_name).await?;
            let actual = actual.trim();
            let expected = expect.expected_text();
            Ok(Observation::new(
                expect.matches(actual),
                format!(
                    "CSS '{}'. Expected: '{}', Actual: '{}'.",
                    expect.property_name, expected, actual
                ),
            )
            .with_data(json!({
                "actual": actual,
                "expected": expected,
                "prop_name": expect.property_name,
            })))
        }

        Condition::Script {
            script,
            element_required,
            with_trigger,
        } => {
            if script.trim().is_empty() {
                return Ok(Observation::fail("No script provided for custom script check."));
            }
            let target = match &predicate.target {
                Some(query) => session.find_element(query).await?,
                None => None,
            };
            if target.is_none() && *element_required {
                if let Some(query) = &predicate.target {
                    return Ok(Observation::fail(format!(
                        "Required element '{}' for script not found.",
                        query
                    )));
                }
            }
            let target_arg = target.as_ref().map(ElementRef::to_json).unwrap_or(Value::Null);
            let args = if *with_trigger {
                vec![trigger.map(ElementRef::to_json).unwrap_or(Value::Null), target_arg]
            } else {
                vec![target_arg]
            };
            match session.execute(script, args).await {
                Ok(result) => Ok(Observation::new(
                    truthy(&result),
                    format!("Custom script evaluation result: {} (expected true).", result),
                )
                .with_data(json!({"script_result": result}))),
                Err(e) if e.is_session_fatal() => Err(e),
                Err(e) => Ok(Observation::fail(format!("Custom script execution error: {}", e))),
            }
        }

        Condition::Url { expected, match_type } => {
            let current = session.current_url().await?;
            let passed = url_matches(&current, expected, *match_type)?;
            Ok(Observation::new(
                passed,
                format!(
                    "URL: Actual='{}', Expected {} '{}'",
                    current,
                    url_match_name(*match_type),
                    expected
                ),
            )
            .with_data(json!({"current_url": current})))
        }
    }
}

fn visibility_matches(expected: Visibility, displayed: bool) -> bool {
    match expected {
        Visibility::Visible => displayed,
        Visibility::Hidden => !displayed,
    }
}

fn visibility_name(v: Visibility) -> &'static str {
    match v {
        Visibility::Visible => "visible",
        Visibility::Hidden => "hidden",
    }
}

fn text_match_name(m: TextMatch) -> &'static str {
    match m {
        TextMatch::Exact => "exact",
        TextMatch::Contains => "contains",
        TextMatch::Similar => "similar",
        TextMatch::Regex => "regex",
    }
}

fn url_match_name(m: UrlMatch) -> &'static str {
    match m {
        UrlMatch::Contains => "contains",
        UrlMatch::Exact => "exact",
        UrlMatch::StartsWith => "starts_with",
        UrlMatch::EndsWith => "ends_with",
        UrlMatch::RegexMatchFragment => "regex_match_fragment",
        UrlMatch::RegexMatchPath => "regex_match_path",
        UrlMatch::RegexMatchFull => "regex_match_full",
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Compare rendered text (already trimmed) against an expectation
pub fn text_matches(expect: &TextExpectation, actual: &str) -> EngineResult<bool> {
    let expected = expect.expected_text.trim();
    let (op_actual, op_expected) = if expect.case_sensitive {
        (actual.to_string(), expected.to_string())
    } else {
        (actual.to_lowercase(), expected.to_lowercase())
    };

    let passed = match expect.match_type {
        TextMatch::Exact => op_actual == op_expected,
        TextMatch::Contains => op_actual.contains(&op_expected),
        TextMatch::Similar => {
            f64::from(similar::TextDiff::from_chars(op_actual.as_str(), op_expected.as_str()).ratio()) >= expect.min_similarity
        }
        TextMatch::Regex => RegexBuilder::new(&expect.expected_text)
            .case_insensitive(!expect.case_sensitive)
            .build()
            .map_err(|e| EngineError::InvalidCheck(format!("Invalid regex pattern: {}", e)))?
            .is_match(actual),
    };
    Ok(passed)
}

/// Compare the current URL against an expected part
pub fn url_matches(current: &str, expected: &str, match_type: UrlMatch) -> EngineResult<bool> {
    let regex = || {
        regex::Regex::new(expected)
            .map_err(|e| EngineError::InvalidCheck(format!("Invalid URL regex: {}", e)))
    };
    let passed = match match_type {
        UrlMatch::Contains => current.contains(expected),
        UrlMatch::Exact => current == expected,
        UrlMatch::StartsWith => current.starts_with(expected),
        UrlMatch::EndsWith => current.ends_with(expected),
        UrlMatch::RegexMatchFull => regex()?.is_match(current),
        UrlMatch::RegexMatchFragment | UrlMatch::RegexMatchPath => {
            let parsed = url::Url::parse(current)
                .map_err(|e| EngineError::InvalidCheck(format!("Unparseable URL '{}': {}", current, e)))?;
            let part = if match_type == UrlMatch::RegexMatchFragment {
                parsed.fragment().unwrap_or_default().to_string()
            } else {
                parsed.path().to_string()
            };
            regex()?.is_match(&part)
        }
    };
    Ok(passed)
}
