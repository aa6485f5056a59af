//! Browser automation seam
//!
//! Everything the engine needs from a browser goes through [`BrowserSession`].
//! The production implementation speaks W3C WebDriver
//! ([`crate::webdriver::WebDriverSession`]); tests use an in-memory fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use webgrade_common::check::{ElementQuery, SelectorKind};

use crate::error::EngineResult;

/// W3C web element identifier key
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Opaque reference to an element in the current page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(pub String);

impl ElementRef {
    /// Encode as a script argument
    pub fn to_json(&self) -> Value {
        json!({ ELEMENT_KEY: self.0 })
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| ElementRef(id.to_string()))
    }
}

/// WebDriver location strategy and value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub using: &'static str,
    pub value: String,
}

fn css_attr(name: &str, value: &str) -> String {
    format!("[{}=\"{}\"]", name, value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Translate a selector into a W3C location strategy
pub fn locator(query: &ElementQuery) -> Locator {
    let selector = query.selector.as_str();
    match query.kind() {
        SelectorKind::Css => Locator { using: "css selector", value: selector.to_string() },
        SelectorKind::Xpath => Locator { using: "xpath", value: selector.to_string() },
        SelectorKind::Id => Locator { using: "css selector", value: css_attr("id", selector) },
        SelectorKind::Name => Locator { using: "css selector", value: css_attr("name", selector) },
        SelectorKind::ClassName => Locator { using: "css selector", value: format!(".{}", selector) },
        SelectorKind::TagName => Locator { using: "tag name", value: selector.to_string() },
        SelectorKind::LinkText => Locator { using: "link text", value: selector.to_string() },
        SelectorKind::PartialLinkText => Locator {
            using: "partial link text",
            value: selector.to_string(),
        },
        SelectorKind::DataTestId => Locator {
            using: "css selector",
            value: css_attr("data-testid", selector),
        },
    }
}

/// One browser console entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: String,
    pub message: String,
    #[serde(default)]
    pub timestamp: i64,
}

/// Operations the engine performs against a live page
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> EngineResult<()>;

    async fn current_url(&self) -> EngineResult<String>;

    async fn title(&self) -> EngineResult<String>;

    async fn set_window_size(&self, width: u32, height: u32) -> EngineResult<()>;

    /// All matches in document order; empty when nothing matches
    async fn find_elements(&self, query: &ElementQuery) -> EngineResult<Vec<ElementRef>>;

    /// Matches scoped to the subtree of `parent`
    async fn find_elements_in(
        &self,
        parent: &ElementRef,
        query: &ElementQuery,
    ) -> EngineResult<Vec<ElementRef>>;

    /// Run a synchronous script; element arguments use [`ElementRef::to_json`]
    async fn execute(&self, script: &str, args: Vec<Value>) -> EngineResult<Value>;

    async fn is_displayed(&self, element: &ElementRef) -> EngineResult<bool>;

    async fn is_enabled(&self, element: &ElementRef) -> EngineResult<bool>;

    async fn tag_name(&self, element: &ElementRef) -> EngineResult<String>;

    async fn attribute(&self, element: &ElementRef, name: &str) -> EngineResult<Option<String>>;

    /// Rendered text
    async fn text(&self, element: &ElementRef) -> EngineResult<String>;

    /// Computed style value
    async fn css_value(&self, element: &ElementRef, property: &str) -> EngineResult<String>;

    async fn click(&self, element: &ElementRef) -> EngineResult<()>;

    async fn clear(&self, element: &ElementRef) -> EngineResult<()>;

    async fn send_keys(&self, element: &ElementRef, text: &str) -> EngineResult<()>;

    /// W3C input source actions (`{"actions": [...]}` body)
    async fn perform_actions(&self, actions: Value) -> EngineResult<()>;

    async fn release_actions(&self) -> EngineResult<()>;

    async fn add_cookie(&self, name: &str, value: &str) -> EngineResult<()>;

    async fn delete_cookie(&self, name: &str) -> EngineResult<()>;

    async fn browser_logs(&self) -> EngineResult<Vec<LogEntry>>;

    /// PNG bytes of the viewport
    async fn screenshot(&self) -> EngineResult<Vec<u8>>;

    async fn quit(&self) -> EngineResult<()>;

    async fn find_element(&self, query: &ElementQuery) -> EngineResult<Option<ElementRef>> {
        Ok(self.find_elements(query).await?.into_iter().next())
    }

    /// Found and displayed
    async fn find_visible(&self, query: &ElementQuery) -> EngineResult<Option<ElementRef>> {
        match self.find_element(query).await? {
            Some(el) if self.is_displayed(&el).await? => Ok(Some(el)),
            _ => Ok(None),
        }
    }
}

/// Short description such as `<div id='menu' class='nav open'>`
pub async fn describe_element(session: &dyn BrowserSession, element: &ElementRef) -> String {
    let tag = match session.tag_name(element).await {
        Ok(tag) => tag.to_lowercase(),
        Err(_) => return "<stale_or_invalid_element>".to_string(),
    };
    let mut desc = format!("<{}", tag);
    for attr in ["id", "data-testid"] {
        if let Ok(Some(value)) = session.attribute(element, attr).await {
            if !value.is_empty() {
                desc.push_str(&format!(" {}='{}'", attr, value));
            }
        }
    }
    if let Ok(Some(class)) = session.attribute(element, "class").await {
        if !class.is_empty() {
            let short: String = class.chars().take(30).collect();
            let ellipsis = if class.chars().count() > 30 { "..." } else { "" };
            desc.push_str(&format!(" class='{}{}'", short, ellipsis));
        }
    }
    desc.push('>');
    desc
}

/// Truthiness of a script result
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn query(selector: &str, kind: SelectorKind) -> ElementQuery {
        ElementQuery { selector: selector.into(), selector_type: Some(kind) }
    }

    #[test_case(SelectorKind::Css, "nav > a", "css selector", "nav > a" ; "css")]
    #[test_case(SelectorKind::Id, "menu", "css selector", "[id=\"menu\"]" ; "id")]
    #[test_case(SelectorKind::ClassName, "hero", "css selector", ".hero" ; "class name")]
    #[test_case(SelectorKind::DataTestId, "cta", "css selector", "[data-testid=\"cta\"]" ; "test id")]
    #[test_case(SelectorKind::Xpath, "//main", "xpath", "//main" ; "xpath")]
    #[test_case(SelectorKind::PartialLinkText, "More", "partial link text", "More" ; "partial link")]
    fn test_locator(kind: SelectorKind, selector: &str, using: &str, value: &str) {
        let loc = locator(&query(selector, kind));
        assert_eq!(loc.using, using);
        assert_eq!(loc.value, value);
    }

    #[test]
    fn test_locator_escapes_quotes() {
        let loc = locator(&query("say \"hi\"", SelectorKind::Name));
        assert_eq!(loc.value, "[name=\"say \\\"hi\\\"\"]");
    }

    #[test]
    fn test_element_ref_json() {
        let el = ElementRef("abc".into());
        assert_eq!(ElementRef::from_json(&el.to_json()), Some(el));
        assert_eq!(ElementRef::from_json(&json!({"other": 1})), None);
    }

    #[test_case(json!(null), false ; "null")]
    #[test_case(json!(true), true ; "true")]
    #[test_case(json!(0), false ; "zero")]
    #[test_case(json!(2.5), true ; "number")]
    #[test_case(json!(""), false ; "empty string")]
    #[test_case(json!([]), false ; "empty list")]
    #[test_case(json!({"a": 1}), true ; "object")]
    fn test_truthy(value: Value, expected: bool) {
        assert_eq!(truthy(&value), expected);
    }
}
