//! W3C WebDriver client and chromedriver process management

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Method;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;
use webgrade_common::check::ElementQuery;

use crate::browser::{locator, BrowserSession, ElementRef, LogEntry};
use crate::error::{EngineError, EngineResult};

/// Handle to a running chromedriver process
pub struct ChromeDriver {
    child: Child,
    pub base_url: String,
    pub port: u16,
}

impl ChromeDriver {
    /// Spawn chromedriver on a free port and wait until it reports ready
    pub async fn spawn(binary: &Path, startup_timeout: Duration) -> EngineResult<Self> {
        let port = find_free_port()?;
        let base_url = format!("http://127.0.0.1:{}", port);

        debug!("Spawning {} on port {}", binary.display(), port);
        let child = Command::new(binary)
            .arg(format!("--port={}", port))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                EngineError::SessionStart(format!("Failed to spawn {}: {}", binary.display(), e))
            })?;

        let handle = ChromeDriver {
            child,
            base_url,
            port,
        };
        handle.wait_for_ready(startup_timeout).await?;
        info!("chromedriver ready at {}", handle.base_url);
        Ok(handle)
    }

    async fn wait_for_ready(&self, timeout_duration: Duration) -> EngineResult<()> {
        let status_url = format!("{}/status", self.base_url);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;
        while start.elapsed() < timeout_duration {
            attempts += 1;
            match client.get(&status_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let body: Value = resp.json().await.unwrap_or(Value::Null);
                    if body["value"]["ready"].as_bool().unwrap_or(true) {
                        return Ok(());
                    }
                }
                Ok(resp) => warn!("chromedriver status returned {}", resp.status()),
                Err(e) if !e.is_connect() => warn!("chromedriver status error: {}", e),
                Err(_) => {}
            }
            sleep(Duration::from_millis(100)).await;
        }

        Err(EngineError::SessionStart(format!(
            "chromedriver not ready after {} attempts",
            attempts
        )))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stop(&mut self) {
        debug!("Stopping chromedriver (pid: {})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(200));
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn find_free_port() -> EngineResult<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Browser launch options
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub headless: bool,
    pub chrome_binary: Option<PathBuf>,
    pub page_load_timeout: Duration,
    pub script_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_binary: None,
            page_load_timeout: Duration::from_secs(30),
            script_timeout: Duration::from_secs(30),
        }
    }
}

impl SessionOptions {
    /// `POST /session` body
    pub fn capabilities(&self) -> Value {
        let mut args = vec!["--disable-gpu", "--no-sandbox", "--disable-dev-shm-usage"];
        if self.headless {
            args.insert(0, "--headless=new");
        }
        let mut chrome_options = json!({ "args": args });
        if let Some(binary) = &self.chrome_binary {
            chrome_options["binary"] = json!(binary.display().to_string());
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": chrome_options,
                    "goog:loggingPrefs": { "browser": "ALL" },
                    "timeouts": {
                        "pageLoad": self.page_load_timeout.as_millis() as u64,
                        "script": self.script_timeout.as_millis() as u64,
                    }
                }
            }
        })
    }
}

/// One WebDriver session over HTTP
pub struct WebDriverSession {
    client: reqwest::Client,
    session_url: Url,
    session_id: String,
}

impl WebDriverSession {
    /// Create a new browser session on the driver at `driver_url`
    pub async fn start(driver_url: &str, options: &SessionOptions) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.page_load_timeout + options.script_timeout + Duration::from_secs(60))
            .build()?;
        let mut base = Url::parse(driver_url).map_err(|e| EngineError::SessionStart(e.to_string()))?;
        base.path_segments_mut()
            .map_err(|_| EngineError::SessionStart(format!("bad driver URL {}", driver_url)))?
            .pop_if_empty()
            .push("session");

        let resp = client
            .post(base.clone())
            .json(&options.capabilities())
            .send()
            .await
            .map_err(|e| EngineError::SessionStart(e.to_string()))?;
        let value = unwrap_response(resp)
            .await
            .map_err(|e| EngineError::SessionStart(e.to_string()))?;
        let session_id = value["sessionId"]
            .as_str()
            .ok_or_else(|| EngineError::SessionStart("response lacks sessionId".to_string()))?
            .to_string();

        let mut session_url = base;
        session_url
            .path_segments_mut()
            .map_err(|_| EngineError::SessionStart(format!("bad driver URL {}", driver_url)))?
            .push(&session_id);
        debug!("WebDriver session {} started", session_id);

        Ok(Self {
            client,
            session_url,
            session_id,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn endpoint(&self, segments: &[&str]) -> EngineResult<Url> {
        let mut url = self.session_url.clone();
        url.path_segments_mut()
            .map_err(|_| EngineError::SessionLost("session URL cannot be a base".to_string()))?
            .extend(segments);
        Ok(url)
    }

    async fn command(&self, method: Method, segments: &[&str], body: Option<Value>) -> EngineResult<Value> {
        let url = self.endpoint(segments)?;
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let resp = request.send().await.map_err(|e| {
            if e.is_connect() {
                EngineError::SessionLost(e.to_string())
            } else {
                EngineError::Http(e)
            }
        })?;
        unwrap_response(resp).await
    }

    async fn get(&self, segments: &[&str]) -> EngineResult<Value> {
        self.command(Method::GET, segments, None).await
    }

    async fn post(&self, segments: &[&str], body: Value) -> EngineResult<Value> {
        self.command(Method::POST, segments, Some(body)).await
    }

    async fn element_get(&self, element: &ElementRef, segments: &[&str]) -> EngineResult<Value> {
        let mut path = vec!["element", element.0.as_str()];
        path.extend_from_slice(segments);
        self.get(&path).await
    }
}

/// Split a WebDriver response into its `value` or a typed error
async fn unwrap_response(resp: reqwest::Response) -> EngineResult<Value> {
    let status = resp.status();
    let body: Value = resp.json().await?;
    let value = body.get("value").cloned().unwrap_or(Value::Null);
    if let Some(code) = value.get("error").and_then(Value::as_str) {
        let message = value["message"].as_str().unwrap_or_default();
        return Err(EngineError::from_webdriver(code, message));
    }
    if !status.is_success() {
        return Err(EngineError::WebDriver {
            code: status.to_string(),
            message: value.to_string(),
        });
    }
    Ok(value)
}

fn element_list(value: Value) -> Vec<ElementRef> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(ElementRef::from_json).collect())
        .unwrap_or_default()
}

fn string_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> EngineResult<()> {
        self.post(&["url"], json!({ "url": url })).await?;
        Ok(())
    }

    async fn current_url(&self) -> EngineResult<String> {
        Ok(string_value(self.get(&["url"]).await?))
    }

    async fn title(&self) -> EngineResult<String> {
        Ok(string_value(self.get(&["title"]).await?))
    }

    async fn set_window_size(&self, width: u32, height: u32) -> EngineResult<()> {
        self.post(&["window", "rect"], json!({ "width": width, "height": height }))
            .await?;
        Ok(())
    }

    async fn find_elements(&self, query: &ElementQuery) -> EngineResult<Vec<ElementRef>> {
        let loc = locator(query);
        let value = self
            .post(&["elements"], json!({ "using": loc.using, "value": loc.value }))
            .await?;
        Ok(element_list(value))
    }

    async fn find_elements_in(
        &self,
        parent: &ElementRef,
        query: &ElementQuery,
    ) -> EngineResult<Vec<ElementRef>> {
        let loc = locator(query);
        let value = self
            .post(
                &["element", parent.0.as_str(), "elements"],
                json!({ "using": loc.using, "value": loc.value }),
            )
            .await?;
        Ok(element_list(value))
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> EngineResult<Value> {
        self.post(&["execute", "sync"], json!({ "script": script, "args": args }))
            .await
    }

    async fn is_displayed(&self, element: &ElementRef) -> EngineResult<bool> {
        Ok(self.element_get(element, &["displayed"]).await?.as_bool().unwrap_or(false))
    }

    async fn is_enabled(&self, element: &ElementRef) -> EngineResult<bool> {
        Ok(self.element_get(element, &["enabled"]).await?.as_bool().unwrap_or(false))
    }

    async fn tag_name(&self, element: &ElementRef) -> EngineResult<String> {
        Ok(string_value(self.element_get(element, &["name"]).await?))
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> EngineResult<Option<String>> {
        let value = self.element_get(element, &["attribute", name]).await?;
        Ok(match value {
            Value::Null => None,
            other => Some(string_value(other)),
        })
    }

    async fn text(&self, element: &ElementRef) -> EngineResult<String> {
        Ok(string_value(self.element_get(element, &["text"]).await?))
    }

    async fn css_value(&self, element: &ElementRef, property: &str) -> EngineResult<String> {
        Ok(string_value(self.element_get(element, &["css", property]).await?))
    }

    async fn click(&self, element: &ElementRef) -> EngineResult<()> {
        self.post(&["element", element.0.as_str(), "click"], json!({})).await?;
        Ok(())
    }

    async fn clear(&self, element: &ElementRef) -> EngineResult<()> {
        self.post(&["element", element.0.as_str(), "clear"], json!({})).await?;
        Ok(())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> EngineResult<()> {
        self.post(&["element", element.0.as_str(), "value"], json!({ "text": text }))
            .await?;
        Ok(())
    }

    async fn perform_actions(&self, actions: Value) -> EngineResult<()> {
        self.post(&["actions"], actions).await?;
        Ok(())
    }

    async fn release_actions(&self) -> EngineResult<()> {
        self.command(Method::DELETE, &["actions"], None).await?;
        Ok(())
    }

    async fn add_cookie(&self, name: &str, value: &str) -> EngineResult<()> {
        self.post(&["cookie"], json!({ "cookie": { "name": name, "value": value } }))
            .await?;
        Ok(())
    }

    async fn delete_cookie(&self, name: &str) -> EngineResult<()> {
        self.command(Method::DELETE, &["cookie", name], None).await?;
        Ok(())
    }

    async fn browser_logs(&self) -> EngineResult<Vec<LogEntry>> {
        let value = self.post(&["se", "log"], json!({ "type": "browser" })).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn screenshot(&self) -> EngineResult<Vec<u8>> {
        let encoded = string_value(self.get(&["screenshot"]).await?);
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| EngineError::WebDriver {
                code: "invalid screenshot".to_string(),
                message: e.to_string(),
            })
    }

    async fn quit(&self) -> EngineResult<()> {
        let resp = self
            .client
            .delete(self.session_url.clone())
            .send()
            .await?;
        unwrap_response(resp).await?;
        debug!("WebDriver session {} closed", self.session_id);
        Ok(())
    }
}
