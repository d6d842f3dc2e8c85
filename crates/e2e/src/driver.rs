//! Browser driver seam
//!
//! The suite never talks to a browser engine directly. Page objects, the
//! observability fixture and the lifecycle hooks only see the [`Page`] trait;
//! [`crate::playwright`] provides the production implementation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::E2eResult;

/// How to find an element. Rendered by the driver into its own query API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    Css { selector: String },
    Text { text: String, exact: bool },
    TestId { id: String },
    Role { role: String, name: Option<String> },
    Placeholder { text: String },
    Label { text: String },
    Nth { inner: Box<Locator>, index: usize },
    Filter { inner: Box<Locator>, has_text: String },
    /// `child` searched within matches of `parent`
    Within { parent: Box<Locator>, child: Box<Locator> },
    /// `inner` resolved inside the iframe matched by `frame`
    InFrame { frame: String, inner: Box<Locator> },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css { selector: selector.into() }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Locator::Text { text: text.into(), exact: false }
    }

    pub fn exact_text(text: impl Into<String>) -> Self {
        Locator::Text { text: text.into(), exact: true }
    }

    pub fn test_id(id: impl Into<String>) -> Self {
        Locator::TestId { id: id.into() }
    }

    pub fn role(role: impl Into<String>) -> Self {
        Locator::Role { role: role.into(), name: None }
    }

    pub fn role_named(role: impl Into<String>, name: impl Into<String>) -> Self {
        Locator::Role { role: role.into(), name: Some(name.into()) }
    }

    pub fn placeholder(text: impl Into<String>) -> Self {
        Locator::Placeholder { text: text.into() }
    }

    pub fn label(text: impl Into<String>) -> Self {
        Locator::Label { text: text.into() }
    }

    /// Zero-based match index
    pub fn nth(self, index: usize) -> Self {
        Locator::Nth { inner: Box::new(self), index }
    }

    pub fn first(self) -> Self {
        self.nth(0)
    }

    pub fn locate(self, child: Locator) -> Self {
        Locator::Within { parent: Box::new(self), child: Box::new(child) }
    }

    pub fn in_frame(frame: impl Into<String>, inner: Locator) -> Self {
        Locator::InFrame { frame: frame.into(), inner: Box::new(inner) }
    }

    /// Narrow matches to those containing `text`
    pub fn with_text(self, text: impl Into<String>) -> Self {
        Locator::Filter { inner: Box::new(self), has_text: text.into() }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css { selector } => write!(f, "{}", selector),
            Locator::Text { text, exact: true } => write!(f, "text=\"{}\"", text),
            Locator::Text { text, .. } => write!(f, "text={}", text),
            Locator::TestId { id } => write!(f, "[data-testid=\"{}\"]", id),
            Locator::Role { role, name: Some(name) } => write!(f, "role={}[name=\"{}\"]", role, name),
            Locator::Role { role, name: None } => write!(f, "role={}", role),
            Locator::Placeholder { text } => write!(f, "[placeholder=\"{}\"]", text),
            Locator::Label { text } => write!(f, "label={}", text),
            Locator::Nth { inner, index } => write!(f, "{} >> nth={}", inner, index),
            Locator::Filter { inner, has_text } => write!(f, "{} >> has-text=\"{}\"", inner, has_text),
            Locator::Within { parent, child } => write!(f, "{} >> {}", parent, child),
            Locator::InFrame { frame, inner } => write!(f, "{} >> internal:control=enter-frame >> {}", frame, inner),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleLevel {
    Error,
    Warning,
    Info,
    Log,
    Debug,
}

impl ConsoleLevel {
    /// Map a browser console type (`msg.type()`) onto a level
    pub fn from_browser(kind: &str) -> Self {
        match kind {
            "error" | "assert" => ConsoleLevel::Error,
            "warning" | "warn" => ConsoleLevel::Warning,
            "info" => ConsoleLevel::Info,
            "debug" | "trace" => ConsoleLevel::Debug,
            _ => ConsoleLevel::Log,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    pub level: ConsoleLevel,
    pub text: String,
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Uncaught exception thrown inside the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageErrorEvent {
    pub message: String,
    pub stack: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEvent {
    pub url: String,
    pub method: String,
    pub status: u16,
    /// Only captured for failed responses
    pub body: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageEvent {
    Console(ConsoleMessage),
    PageError(PageErrorEvent),
    Response(ResponseEvent),
}

/// Canned response served by request interception
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl MockResponse {
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json".to_string(),
            body: body.to_string(),
        }
    }
}

/// Raw HTTP request issued from the browser context (shares its cookies)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: "POST".to_string(),
            url: url.into(),
            headers: BTreeMap::new(),
            body: Some(body),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// One isolated browser tab. Every call is a suspension point that resolves
/// when the driver finishes or its own action timeout fires.
#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str) -> E2eResult<()>;
    async fn reload(&self) -> E2eResult<()>;
    async fn url(&self) -> E2eResult<String>;
    async fn title(&self) -> E2eResult<String>;
    async fn wait_for_load(&self) -> E2eResult<()>;

    async fn click(&self, locator: &Locator) -> E2eResult<()>;
    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()>;
    async fn press(&self, locator: &Locator, key: &str) -> E2eResult<()>;
    async fn select_option(&self, locator: &Locator, value: &str) -> E2eResult<()>;
    async fn check(&self, locator: &Locator) -> E2eResult<()>;
    async fn hover(&self, locator: &Locator) -> E2eResult<()>;

    async fn text_content(&self, locator: &Locator) -> E2eResult<Option<String>>;
    async fn inner_texts(&self, locator: &Locator) -> E2eResult<Vec<String>>;
    async fn input_value(&self, locator: &Locator) -> E2eResult<String>;
    async fn get_attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>>;
    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool>;
    async fn count(&self, locator: &Locator) -> E2eResult<usize>;
    async fn wait_for(&self, locator: &Locator, state: WaitState, timeout: Duration) -> E2eResult<()>;

    async fn screenshot(&self, path: &Path, full_page: bool) -> E2eResult<()>;
    /// `script` is a function body run in the page; `arg` is bound to `arg`.
    async fn evaluate(&self, script: &str, arg: serde_json::Value) -> E2eResult<serde_json::Value>;

    async fn route(&self, pattern: &str, response: MockResponse) -> E2eResult<()>;
    async fn unroute(&self, pattern: &str) -> E2eResult<()>;
    async fn request(&self, request: HttpRequest) -> E2eResult<HttpReply>;

    /// Console, page-error and response events from now on
    fn subscribe(&self) -> broadcast::Receiver<PageEvent>;

    /// Resolves once every event already raised in the page has been
    /// delivered to subscribers, including responses whose body is still
    /// being read.
    async fn settle(&self) -> E2eResult<()>;

    async fn close(&self) -> E2eResult<()>;
}

/// Hands out a fresh, isolated page per scenario
#[async_trait]
pub trait PageFactory: Send + Sync {
    async fn new_page(&self) -> E2eResult<Arc<dyn Page>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_display() {
        let row = Locator::css("table tbody tr").with_text("test-key");
        assert_eq!(row.to_string(), "table tbody tr >> has-text=\"test-key\"");
        assert_eq!(
            Locator::role_named("button", "Sign in").to_string(),
            "role=button[name=\"Sign in\"]"
        );
        assert_eq!(Locator::test_id("card").first().to_string(), "[data-testid=\"card\"] >> nth=0");
    }

    #[test]
    fn test_locator_wire_shape() {
        let loc = Locator::role_named("button", "Add card").nth(1);
        let json = serde_json::to_value(&loc).unwrap();
        assert_eq!(json["kind"], "nth");
        assert_eq!(json["index"], 1);
        assert_eq!(json["inner"]["kind"], "role");
        assert_eq!(json["inner"]["name"], "Add card");
    }

    #[test]
    fn test_console_level_mapping() {
        assert_eq!(ConsoleLevel::from_browser("error"), ConsoleLevel::Error);
        assert_eq!(ConsoleLevel::from_browser("warning"), ConsoleLevel::Warning);
        assert_eq!(ConsoleLevel::from_browser("log"), ConsoleLevel::Log);
        assert_eq!(ConsoleLevel::from_browser("table"), ConsoleLevel::Log);
    }
}
