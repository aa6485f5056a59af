//! In-memory browser for engine tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use webgrade_common::check::ElementQuery;

use crate::browser::{BrowserSession, ElementRef, LogEntry};
use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub id: String,
    pub tag: String,
    pub selectors: Vec<String>,
    pub parent: Option<String>,
    pub displayed: bool,
    pub enabled: bool,
    pub text: String,
    pub attributes: HashMap<String, String>,
    pub css: HashMap<String, String>,
}

impl FakeElement {
    pub fn new(id: &str, tag: &str) -> Self {
        Self {
            id: id.to_string(),
            tag: tag.to_string(),
            selectors: vec![tag.to_string()],
            displayed: true,
            enabled: true,
            ..Default::default()
        }
    }

    pub fn matching(mut self, selector: &str) -> Self {
        self.selectors.push(selector.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn css(mut self, property: &str, value: &str) -> Self {
        self.css.insert(property.to_string(), value.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn child_of(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }
}

#[derive(Debug, Default)]
pub struct FakeDom {
    pub elements: Vec<FakeElement>,
    pub url: String,
    pub title: String,
    pub logs: Vec<LogEntry>,
    pub cookies: HashMap<String, String>,
    pub window: (u32, u32),
    pub navigations: Vec<String>,
    pub clicks: Vec<String>,
    pub typed: Vec<(String, String)>,
    pub scripts: Vec<String>,
    pub actions: Vec<Value>,
    /// Elements still matched by queries but stale when inspected
    pub stale: HashSet<String>,
}

impl FakeDom {
    pub fn element(&self, id: &str) -> Option<&FakeElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    pub fn element_mut(&mut self, id: &str) -> Option<&mut FakeElement> {
        self.elements.iter_mut().find(|e| e.id == id)
    }
}

type ScriptHandler = Box<dyn Fn(&mut FakeDom, &[Value]) -> Result<Value, String> + Send + Sync>;
type ClickEffect = Box<dyn Fn(&mut FakeDom) + Send + Sync>;

/// Scripted stand-in for a WebDriver session
///
/// Elements match a query when the query's selector string is one of the
/// element's `selectors`. Scripts are answered by the first handler whose
/// key occurs in the script source, otherwise `null`.
#[derive(Default)]
pub struct FakeBrowser {
    dom: Mutex<FakeDom>,
    scripts: Vec<(String, ScriptHandler)>,
    click_effects: HashMap<String, ClickEffect>,
    fail_navigation: Option<String>,
    fail_logs: bool,
    session_lost: bool,
}

impl FakeBrowser {
    pub fn new() -> Self {
        let browser = Self::default();
        browser.dom().url = "file:///page.html".to_string();
        browser.dom().title = "Test Page".to_string();
        browser
    }

    pub fn with_element(self, element: FakeElement) -> Self {
        self.dom().elements.push(element);
        self
    }

    pub fn with_title(self, title: &str) -> Self {
        self.dom().title = title.to_string();
        self
    }

    pub fn with_log(self, level: &str, message: &str) -> Self {
        self.dom().logs.push(LogEntry {
            level: level.to_string(),
            message: message.to_string(),
            timestamp: 0,
        });
        self
    }

    pub fn on_script<F>(mut self, key: &str, handler: F) -> Self
    where
        F: Fn(&mut FakeDom, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.scripts.push((key.to_string(), Box::new(handler)));
        self
    }

    pub fn returning(self, key: &str, value: Value) -> Self {
        self.on_script(key, move |_, _| Ok(value.clone()))
    }

    pub fn on_click<F>(mut self, element_id: &str, effect: F) -> Self
    where
        F: Fn(&mut FakeDom) + Send + Sync + 'static,
    {
        self.click_effects.insert(element_id.to_string(), Box::new(effect));
        self
    }

    pub fn failing_navigation(mut self, reason: &str) -> Self {
        self.fail_navigation = Some(reason.to_string());
        self
    }

    pub fn failing_logs(mut self) -> Self {
        self.fail_logs = true;
        self
    }

    /// Every lookup and script fails as if the browser died
    pub fn lost_session(mut self) -> Self {
        self.session_lost = true;
        self
    }

    fn alive(&self) -> EngineResult<()> {
        if self.session_lost {
            return Err(EngineError::SessionLost("browser closed".into()));
        }
        Ok(())
    }

    pub fn dom(&self) -> MutexGuard<'_, FakeDom> {
        match self.dom.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn with_el<T>(&self, element: &ElementRef, f: impl FnOnce(&FakeElement) -> T) -> EngineResult<T> {
        let dom = self.dom();
        if dom.stale.contains(&element.0) {
            return Err(EngineError::StaleElement(element.0.clone()));
        }
        dom.element(&element.0)
            .map(f)
            .ok_or_else(|| EngineError::StaleElement(element.0.clone()))
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn navigate(&self, url: &str) -> EngineResult<()> {
        if let Some(reason) = &self.fail_navigation {
            return Err(EngineError::Timeout(reason.clone()));
        }
        let mut dom = self.dom();
        dom.url = url.to_string();
        dom.navigations.push(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> EngineResult<String> {
        Ok(self.dom().url.clone())
    }

    async fn title(&self) -> EngineResult<String> {
        Ok(self.dom().title.clone())
    }

    async fn set_window_size(&self, width: u32, height: u32) -> EngineResult<()> {
        self.dom().window = (width, height);
        Ok(())
    }

    async fn find_elements(&self, query: &ElementQuery) -> EngineResult<Vec<ElementRef>> {
        self.alive()?;
        let dom = self.dom();
        Ok(dom
            .elements
            .iter()
            .filter(|e| e.selectors.iter().any(|s| *s == query.selector))
            .map(|e| ElementRef(e.id.clone()))
            .collect())
    }

    async fn find_elements_in(
        &self,
        parent: &ElementRef,
        query: &ElementQuery,
    ) -> EngineResult<Vec<ElementRef>> {
        let dom = self.dom();
        if dom.element(&parent.0).is_none() {
            return Err(EngineError::StaleElement(parent.0.clone()));
        }
        Ok(dom
            .elements
            .iter()
            .filter(|e| e.parent.as_deref() == Some(parent.0.as_str()))
            .filter(|e| e.selectors.iter().any(|s| *s == query.selector))
            .map(|e| ElementRef(e.id.clone()))
            .collect())
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> EngineResult<Value> {
        self.alive()?;
        let mut dom = self.dom();
        dom.scripts.push(script.to_string());
        for (key, handler) in &self.scripts {
            if script.contains(key.as_str()) {
                return handler(&mut dom, &args).map_err(EngineError::Script);
            }
        }
        Ok(Value::Null)
    }

    async fn is_displayed(&self, element: &ElementRef) -> EngineResult<bool> {
        self.with_el(element, |e| e.displayed)
    }

    async fn is_enabled(&self, element: &ElementRef) -> EngineResult<bool> {
        self.with_el(element, |e| e.enabled)
    }

    async fn tag_name(&self, element: &ElementRef) -> EngineResult<String> {
        self.with_el(element, |e| e.tag.clone())
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> EngineResult<Option<String>> {
        self.with_el(element, |e| e.attributes.get(name).cloned())
    }

    async fn text(&self, element: &ElementRef) -> EngineResult<String> {
        self.with_el(element, |e| if e.displayed { e.text.clone() } else { String::new() })
    }

    async fn css_value(&self, element: &ElementRef, property: &str) -> EngineResult<String> {
        self.with_el(element, |e| e.css.get(property).cloned().unwrap_or_default())
    }

    async fn click(&self, element: &ElementRef) -> EngineResult<()> {
        self.with_el(element, |_| ())?;
        let mut dom = self.dom();
        dom.clicks.push(element.0.clone());
        if let Some(effect) = self.click_effects.get(&element.0) {
            effect(&mut dom);
        }
        Ok(())
    }

    async fn clear(&self, element: &ElementRef) -> EngineResult<()> {
        let mut dom = self.dom();
        let el = dom
            .element_mut(&element.0)
            .ok_or_else(|| EngineError::StaleElement(element.0.clone()))?;
        el.attributes.insert("value".to_string(), String::new());
        Ok(())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> EngineResult<()> {
        let mut dom = self.dom();
        let el = dom
            .element_mut(&element.0)
            .ok_or_else(|| EngineError::StaleElement(element.0.clone()))?;
        el.attributes.entry("value".to_string()).or_default().push_str(text);
        dom.typed.push((element.0.clone(), text.to_string()));
        Ok(())
    }

    async fn perform_actions(&self, actions: Value) -> EngineResult<()> {
        self.dom().actions.push(actions);
        Ok(())
    }

    async fn release_actions(&self) -> EngineResult<()> {
        Ok(())
    }

    async fn add_cookie(&self, name: &str, value: &str) -> EngineResult<()> {
        self.dom().cookies.insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn delete_cookie(&self, name: &str) -> EngineResult<()> {
        self.dom().cookies.remove(name);
        Ok(())
    }

    async fn browser_logs(&self) -> EngineResult<Vec<LogEntry>> {
        if self.fail_logs {
            return Err(EngineError::from_webdriver("unknown command", "log endpoint unsupported"));
        }
        Ok(self.dom().logs.clone())
    }

    async fn screenshot(&self) -> EngineResult<Vec<u8>> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn quit(&self) -> EngineResult<()> {
        Ok(())
    }
}
