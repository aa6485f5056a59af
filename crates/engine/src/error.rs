//! Error types for page analysis

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("WebDriver session failed to start: {0}")]
    SessionStart(String),

    #[error("Browser session lost: {0}")]
    SessionLost(String),

    #[error("Page load failed at {viewport}: {reason}")]
    PageLoad { viewport: String, reason: String },

    #[error("No such element: {0}")]
    NoSuchElement(String),

    #[error("Stale element reference: {0}")]
    StaleElement(String),

    #[error("Element click intercepted: {0}")]
    ClickIntercepted(String),

    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("WebDriver error ({code}): {message}")]
    WebDriver { code: String, message: String },

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Invalid check parameters: {0}")]
    InvalidCheck(String),

    #[error("Audit tool unavailable: {0}")]
    AuditUnavailable(String),

    #[error("Static server failed: {0}")]
    StaticServer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Common(#[from] webgrade_common::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Map a W3C WebDriver error code to a typed error
    pub fn from_webdriver(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "no such element" => EngineError::NoSuchElement(message),
            "stale element reference" => EngineError::StaleElement(message),
            "element click intercepted" => EngineError::ClickIntercepted(message),
            "element not interactable" => EngineError::NotInteractable(message),
            "javascript error" => EngineError::Script(message),
            "timeout" | "script timeout" => EngineError::Timeout(message),
            "invalid session id" | "session not created" | "no such window" => {
                EngineError::SessionLost(message)
            }
            _ => EngineError::WebDriver {
                code: code.to_string(),
                message,
            },
        }
    }

    /// Errors after which the browser session cannot serve further commands
    pub fn is_session_fatal(&self) -> bool {
        match self {
            EngineError::SessionStart(_) | EngineError::SessionLost(_) => true,
            EngineError::Http(e) => e.is_connect(),
            _ => false,
        }
    }
}
