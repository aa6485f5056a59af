//! Declarative check model
//!
//! Checks arrive as JSON inside a benchmark definition. Each check kind is a
//! closed enum variant with its own parameter struct, so the interpreter can
//! match exhaustively.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::color::Rgba;

/// How a selector string is interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    #[default]
    Css,
    Xpath,
    Id,
    Name,
    ClassName,
    TagName,
    LinkText,
    PartialLinkText,
    #[serde(rename = "data-testid")]
    DataTestId,
}

/// A selector plus its interpretation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementQuery {
    pub selector: String,
    #[serde(default)]
    pub selector_type: Option<SelectorKind>,
}

impl ElementQuery {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            selector_type: Some(SelectorKind::Css),
        }
    }

    pub fn kind(&self) -> SelectorKind {
        self.selector_type.unwrap_or_default()
    }
}

impl fmt::Display for ElementQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            SelectorKind::Css => write!(f, "{}", self.selector),
            kind => write!(f, "{} ({:?})", self.selector, kind),
        }
    }
}

/// One declared check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckSpec {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub points: f64,

    /// Viewport names this check applies to; all viewports when absent
    #[serde(default, rename = "viewports")]
    pub viewport_filter: Option<Vec<String>>,

    #[serde(flatten)]
    pub kind: CheckKind,
}

impl CheckSpec {
    /// Name used in findings and as the adherence dedup key
    pub fn check_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Unnamed {} check", self.kind.type_name()))
    }

    pub fn applies_to(&self, viewport: &str) -> bool {
        match &self.viewport_filter {
            Some(names) if !names.is_empty() => names.iter().any(|n| n == viewport),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckKind {
    ElementPresence(PresenceCheck),
    ElementCount(CountCheck),
    ElementOrder(OrderCheck),
    TextContent(TextCheck),
    AttributeValue(AttributeCheck),
    CssProperty(CssCheck),
    Interaction(InteractionSpec),
    CustomScriptEvaluatesTrue(ScriptCheck),
}

impl CheckKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            CheckKind::ElementPresence(_) => "element_presence",
            CheckKind::ElementCount(_) => "element_count",
            CheckKind::ElementOrder(_) => "element_order",
            CheckKind::TextContent(_) => "text_content",
            CheckKind::AttributeValue(_) => "attribute_value",
            CheckKind::CssProperty(_) => "css_property",
            CheckKind::Interaction(_) => "interaction",
            CheckKind::CustomScriptEvaluatesTrue(_) => "custom_script_evaluates_true",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceCheck {
    #[serde(flatten)]
    pub target: ElementQuery,
    #[serde(default)]
    pub should_not_exist: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountCheck {
    #[serde(flatten)]
    pub target: ElementQuery,
    #[serde(flatten)]
    pub expect: CountExpectation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCheck {
    pub selectors_in_order: Vec<OrderEntry>,
}

/// Order entries may be bare CSS selectors or full queries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderEntry {
    Selector(String),
    Query(ElementQuery),
}

impl OrderEntry {
    pub fn query(&self) -> ElementQuery {
        match self {
            OrderEntry::Selector(s) => ElementQuery::css(s.clone()),
            OrderEntry::Query(q) => q.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextCheck {
    #[serde(flatten)]
    pub target: ElementQuery,
    #[serde(flatten)]
    pub expect: TextExpectation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeCheck {
    #[serde(flatten)]
    pub target: ElementQuery,
    #[serde(flatten)]
    pub expect: AttributeExpectation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CssCheck {
    #[serde(flatten)]
    pub target: ElementQuery,
    #[serde(flatten)]
    pub expect: CssExpectation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptCheck {
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub selector_type: Option<SelectorKind>,
    #[serde(default)]
    pub element_required_for_script: bool,
}

impl ScriptCheck {
    pub fn target(&self) -> Option<ElementQuery> {
        self.selector.as_ref().map(|selector| ElementQuery {
            selector: selector.clone(),
            selector_type: self.selector_type,
        })
    }
}

/// Count comparison operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    #[default]
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterThanOrEquals,
    LessThanOrEquals,
}

impl Comparison {
    pub fn apply(self, actual: i64, expected: i64) -> bool {
        match self {
            Comparison::Equals => actual == expected,
            Comparison::NotEquals => actual != expected,
            Comparison::GreaterThan => actual > expected,
            Comparison::LessThan => actual < expected,
            Comparison::GreaterThanOrEquals => actual >= expected,
            Comparison::LessThanOrEquals => actual <= expected,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Comparison::Equals => "equals",
            Comparison::NotEquals => "not equals",
            Comparison::GreaterThan => "greater than",
            Comparison::LessThan => "less than",
            Comparison::GreaterThanOrEquals => "greater than or equals",
            Comparison::LessThanOrEquals => "less than or equals",
        };
        f.write_str(s)
    }
}

/// Expected element count: a comparison against `expected_count`, or a range
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountExpectation {
    #[serde(default)]
    pub expected_count: Option<i64>,
    #[serde(default)]
    pub comparison: Comparison,
    #[serde(default)]
    pub min_count: Option<i64>,
    #[serde(default)]
    pub max_count: Option<i64>,
}

/// Result of comparing an actual count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountOutcome {
    pub passed: bool,
    pub expected: String,
}

impl CountExpectation {
    /// Compare an actual count; `None` when no bound was declared
    pub fn check(&self, actual: i64) -> Option<CountOutcome> {
        let (passed, expected) = match (self.expected_count, self.min_count, self.max_count) {
            (Some(n), _, _) => (
                self.comparison.apply(actual, n),
                format!("{} {}", self.comparison, n),
            ),
            (None, Some(lo), Some(hi)) => (lo <= actual && actual <= hi, format!("between {}-{}", lo, hi)),
            (None, Some(lo), None) => (actual >= lo, format!(">= {}", lo)),
            (None, None, Some(hi)) => (actual <= hi, format!("<= {}", hi)),
            (None, None, None) => return None,
        };
        Some(CountOutcome { passed, expected })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMatch {
    #[default]
    Exact,
    Contains,
    Similar,
    Regex,
}

fn default_similarity() -> f64 {
    0.85
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextExpectation {
    #[serde(default)]
    pub expected_text: String,
    #[serde(default)]
    pub match_type: TextMatch,
    #[serde(default = "default_similarity")]
    pub min_similarity: f64,
    #[serde(default)]
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeExpectation {
    pub attribute_name: String,
    /// String, number, boolean (presence semantics), list of class tokens,
    /// or `null` for "attribute absent"
    #[serde(default)]
    pub expected_value: Value,
    #[serde(default)]
    pub class_contains_all: bool,
    #[serde(default)]
    pub class_contains_any: bool,
}

impl AttributeExpectation {
    pub fn matches(&self, actual: Option<&str>) -> bool {
        let is_class = self.attribute_name.eq_ignore_ascii_case("class");
        match &self.expected_value {
            Value::Bool(expected) => {
                let present = matches!(actual, Some(v) if v != "false");
                present == *expected
            }
            Value::Null => actual.is_none(),
            expected if is_class && (self.class_contains_all || self.class_contains_any) => {
                let actual_tokens: Vec<&str> = actual.unwrap_or_default().split_whitespace().collect();
                let wanted = class_tokens(expected);
                if self.class_contains_all {
                    wanted.iter().all(|t| actual_tokens.contains(&t.as_str()))
                } else {
                    wanted.iter().any(|t| actual_tokens.contains(&t.as_str()))
                }
            }
            expected => actual.map(|a| a == value_text(expected)).unwrap_or(false),
        }
    }
}

fn class_tokens(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(value_text).collect(),
        other => vec![value_text(other)],
    }
}

/// Render a JSON scalar the way it would appear in a DOM attribute
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CssExpectation {
    pub property_name: String,
    #[serde(default)]
    pub expected_value: Value,
}

impl CssExpectation {
    pub fn expected_text(&self) -> String {
        value_text(&self.expected_value).trim().to_string()
    }

    /// Compare a computed value. Color properties compare parsed RGB with
    /// alpha ignored; `font-weight` treats `normal`/`bold` as 400/700.
    pub fn matches(&self, actual: &str) -> bool {
        let actual = actual.trim();
        let expected = self.expected_text();
        let property = self.property_name.to_ascii_lowercase();

        if property.contains("color") {
            return match (Rgba::parse(actual), Rgba::parse(&expected)) {
                (Some(a), Some(e)) => a.rgb() == e.rgb(),
                _ => actual == expected,
            };
        }
        if property == "font-weight" {
            return normalize_font_weight(actual) == normalize_font_weight(&expected);
        }
        actual == expected
    }
}

fn normalize_font_weight(value: &str) -> &str {
    match value {
        "normal" => "400",
        "bold" => "700",
        other => other,
    }
}

/// Multi-step interaction check
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionSpec {
    #[serde(default)]
    pub initial_setup: Vec<SetupAction>,
    #[serde(default)]
    pub sequence: Vec<InteractionStep>,
    #[serde(default)]
    pub final_cleanup: Vec<SetupAction>,
}

/// Page-level action run before or after an interaction's steps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum SetupAction {
    NavigateToUrlFragment { fragment: String },
    SetCookie { name: String, value: Value },
    DeleteCookie { name: String },
    ExecuteScript { script: String },
    ClearLocalStorageKey { key: String },
    SetLocalStorageKey { key: String, value: Value },
}

impl SetupAction {
    pub fn type_name(&self) -> &'static str {
        match self {
            SetupAction::NavigateToUrlFragment { .. } => "navigate_to_url_fragment",
            SetupAction::SetCookie { .. } => "set_cookie",
            SetupAction::DeleteCookie { .. } => "delete_cookie",
            SetupAction::ExecuteScript { .. } => "execute_script",
            SetupAction::ClearLocalStorageKey { .. } => "clear_local_storage_key",
            SetupAction::SetLocalStorageKey { .. } => "set_local_storage_key",
        }
    }
}

fn default_outcome_wait_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionStep {
    #[serde(default)]
    pub step_name: Option<String>,
    pub trigger_element: ElementQuery,
    pub action: Action,
    #[serde(default = "default_outcome_wait_ms")]
    pub wait_for_outcome_ms: u64,
    #[serde(default)]
    pub expected_outcomes: Vec<Outcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Top,
    Bottom,
}

fn default_wait_ms() -> u64 {
    100
}

/// Exactly one action performed on a step's trigger element
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Click,
    Hover,
    Focus,
    Blur,
    TypeText {
        #[serde(default)]
        text_to_type: String,
        #[serde(default)]
        key_delay_ms: u64,
        #[serde(default)]
        clear_before_type: bool,
    },
    SelectOption {
        #[serde(default)]
        option_value: Option<Value>,
        #[serde(default)]
        option_text: Option<String>,
        #[serde(default)]
        option_index: Option<u32>,
    },
    DragAndDrop {
        target_element_selector: String,
        #[serde(default)]
        target_element_selector_type: Option<SelectorKind>,
    },
    ScrollToElement,
    ScrollWindow {
        #[serde(default)]
        x_pixels: i64,
        #[serde(default)]
        y_pixels: i64,
        #[serde(default)]
        direction: Option<ScrollDirection>,
    },
    SubmitForm,
    KeyPress {
        key: String,
        #[serde(default)]
        target_element_selector_config: Option<ElementQuery>,
    },
    ExecuteScriptOnElement {
        script: String,
    },
    Wait {
        #[serde(default = "default_wait_ms")]
        duration_ms: u64,
    },
}

impl Action {
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::Click => "click",
            Action::Hover => "hover",
            Action::Focus => "focus",
            Action::Blur => "blur",
            Action::TypeText { .. } => "type_text",
            Action::SelectOption { .. } => "select_option",
            Action::DragAndDrop { .. } => "drag_and_drop",
            Action::ScrollToElement => "scroll_to_element",
            Action::ScrollWindow { .. } => "scroll_window",
            Action::SubmitForm => "submit_form",
            Action::KeyPress { .. } => "key_press",
            Action::ExecuteScriptOnElement { .. } => "execute_script_on_element",
            Action::Wait { .. } => "wait",
        }
    }
}

/// Expected state after a step's action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub target: OutcomeTarget,
    #[serde(flatten)]
    pub kind: OutcomeKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutcomeTarget {
    #[serde(default)]
    pub element_selector: Option<String>,
    #[serde(default)]
    pub element_selector_type: Option<SelectorKind>,
}

impl OutcomeTarget {
    pub fn query(&self) -> Option<ElementQuery> {
        self.element_selector.as_ref().map(|selector| ElementQuery {
            selector: selector.clone(),
            selector_type: self.element_selector_type,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlMatch {
    #[default]
    Contains,
    Exact,
    StartsWith,
    EndsWith,
    RegexMatchFragment,
    RegexMatchPath,
    RegexMatchFull,
}

fn default_animation_wait_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome_type", rename_all = "snake_case")]
pub enum OutcomeKind {
    AttributeChange(AttributeExpectation),
    ClassChange {
        #[serde(default)]
        expected_class_present: Option<String>,
        #[serde(default)]
        expected_class_absent: Option<String>,
    },
    VisibilityChange {
        #[serde(default)]
        expected_visibility: Visibility,
    },
    TextContentChange(TextExpectation),
    CssPropertyChange(CssExpectation),
    ElementExists {
        #[serde(default)]
        expected_visibility: Option<Visibility>,
    },
    ElementDoesNotExist,
    CustomScriptEvaluatesTrue {
        script: String,
    },
    NewElementCount {
        child_element_selector: String,
        #[serde(default)]
        child_element_selector_type: Option<SelectorKind>,
        #[serde(flatten)]
        expect: CountExpectation,
    },
    UrlChange {
        #[serde(default)]
        expected_url_part: String,
        #[serde(default)]
        match_type: UrlMatch,
    },
    AnimationOrTransitionEnds {
        #[serde(default = "default_animation_wait_ms")]
        max_wait_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn test_parse_presence_check() {
        let spec: CheckSpec = serde_json::from_value(json!({
            "type": "element_presence",
            "name": "Has hero",
            "points": 5,
            "selector": "hero",
            "selector_type": "data-testid",
            "viewports": ["desktop"]
        }))
        .unwrap();

        assert_eq!(spec.check_name(), "Has hero");
        assert_eq!(spec.points, 5.0);
        assert!(spec.applies_to("desktop"));
        assert!(!spec.applies_to("mobile"));
        match spec.kind {
            CheckKind::ElementPresence(p) => {
                assert_eq!(p.target.kind(), SelectorKind::DataTestId);
                assert!(!p.should_not_exist);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_parse_interaction_check() {
        let spec: CheckSpec = serde_json::from_value(json!({
            "type": "interaction",
            "name": "Menu opens",
            "points": 10,
            "initial_setup": [{"action_type": "execute_script", "script": "window.x = 1;"}],
            "sequence": [{
                "step_name": "Open menu",
                "trigger_element": {"selector": "#menu-toggle"},
                "action": {"type": "click"},
                "wait_for_outcome_ms": 1000,
                "expected_outcomes": [
                    {"outcome_type": "visibility_change", "element_selector": "#menu", "expected_visibility": "visible"},
                    {"outcome_type": "new_element_count", "element_selector": "#list",
                     "child_element_selector": "li", "expected_count": 3, "comparison": "greater_than_or_equals"},
                    {"outcome_type": "url_change", "expected_url_part": "menu", "match_type": "regex_match_fragment"}
                ]
            }],
            "final_cleanup": [{"action_type": "clear_local_storage_key", "key": "menu"}]
        }))
        .unwrap();

        let CheckKind::Interaction(interaction) = spec.kind else {
            panic!("expected interaction");
        };
        assert_eq!(interaction.initial_setup.len(), 1);
        assert_eq!(interaction.final_cleanup.len(), 1);
        let step = &interaction.sequence[0];
        assert_eq!(step.wait_for_outcome_ms, 1000);
        assert!(matches!(step.action, Action::Click));
        assert_eq!(step.expected_outcomes.len(), 3);
        assert_eq!(
            step.expected_outcomes[0].target.query(),
            Some(ElementQuery { selector: "#menu".into(), selector_type: None })
        );
        match &step.expected_outcomes[1].kind {
            OutcomeKind::NewElementCount { child_element_selector, expect, .. } => {
                assert_eq!(child_element_selector, "li");
                assert_eq!(expect.expected_count, Some(3));
                assert_eq!(expect.comparison, Comparison::GreaterThanOrEquals);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_unnamed_check_gets_type_name() {
        let spec: CheckSpec = serde_json::from_value(json!({
            "type": "element_count", "selector": "li", "min_count": 2
        }))
        .unwrap();
        assert_eq!(spec.check_name(), "Unnamed element_count check");
    }

    #[test]
    fn test_unknown_check_type_is_rejected() {
        let result: Result<CheckSpec, _> =
            serde_json::from_value(json!({"type": "screenshot_diff", "points": 1}));
        assert!(result.is_err());
    }

    #[test_case(Some(3), Comparison::Equals, None, None, 3, true ; "equals")]
    #[test_case(Some(3), Comparison::NotEquals, None, None, 3, false ; "not equals")]
    #[test_case(Some(3), Comparison::GreaterThan, None, None, 4, true ; "greater")]
    #[test_case(Some(3), Comparison::LessThanOrEquals, None, None, 4, false ; "less or equal")]
    #[test_case(None, Comparison::Equals, Some(2), Some(4), 5, false ; "outside range")]
    #[test_case(None, Comparison::Equals, Some(2), Some(4), 2, true ; "inside range")]
    #[test_case(None, Comparison::Equals, None, Some(1), 0, true ; "max only")]
    fn test_count_expectation(
        expected_count: Option<i64>,
        comparison: Comparison,
        min_count: Option<i64>,
        max_count: Option<i64>,
        actual: i64,
        passed: bool,
    ) {
        let expect = CountExpectation { expected_count, comparison, min_count, max_count };
        assert_eq!(expect.check(actual).map(|o| o.passed), Some(passed));
    }

    #[test]
    fn test_count_expectation_without_bounds() {
        assert_eq!(CountExpectation::default().check(1), None);
    }

    fn attr(name: &str, expected: Value) -> AttributeExpectation {
        AttributeExpectation {
            attribute_name: name.into(),
            expected_value: expected,
            class_contains_all: false,
            class_contains_any: false,
        }
    }

    #[test]
    fn test_attribute_boolean_semantics() {
        assert!(attr("disabled", json!(true)).matches(Some("")));
        assert!(!attr("disabled", json!(true)).matches(Some("false")));
        assert!(attr("disabled", json!(false)).matches(None));
        assert!(attr("hidden", Value::Null).matches(None));
        assert!(attr("aria-expanded", json!("true")).matches(Some("true")));
        assert!(!attr("aria-expanded", json!("true")).matches(None));
        assert!(attr("tabindex", json!(0)).matches(Some("0")));
    }

    #[test]
    fn test_class_token_sets() {
        let mut all = attr("class", json!(["open", "active"]));
        all.class_contains_all = true;
        assert!(all.matches(Some("menu open active")));
        assert!(!all.matches(Some("menu open")));

        let mut any = attr("class", json!(["open", "active"]));
        any.class_contains_any = true;
        assert!(any.matches(Some("menu open")));
        assert!(!any.matches(Some("menu closed")));
    }

    #[test_case("color", json!("#ff0000"), "rgba(255, 0, 0, 0.4)", true ; "color ignores alpha")]
    #[test_case("background-color", json!("blue"), "rgb(0, 0, 254)", false ; "color mismatch")]
    #[test_case("font-weight", json!("bold"), "700", true ; "bold is 700")]
    #[test_case("font-weight", json!(400), "normal", true ; "numeric weight")]
    #[test_case("display", json!("flex"), "grid", false ; "plain mismatch")]
    fn test_css_expectation(property: &str, expected: Value, actual: &str, passed: bool) {
        let expect = CssExpectation { property_name: property.into(), expected_value: expected };
        assert_eq!(expect.matches(actual), passed);
    }
}
