//! Suite configuration
//!
//! Resolution order: built-in defaults, then the YAML file, then
//! `PORTAL_E2E_*` environment variables, then CLI flags (applied by the
//! runner binary).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::playwright::{Browser, PlaywrightConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Portal UI origin
    pub base_url: String,

    /// Backend API origin used for setup and cleanup
    pub api_base_url: String,

    /// Credential / payment test data
    pub fixtures_path: PathBuf,

    /// Results, screenshots and observability attachments
    pub output_dir: PathBuf,

    pub browser: Browser,
    pub headless: bool,
    pub viewport: Viewport,

    /// Default wait for UI assertions, in milliseconds
    pub default_timeout_ms: u64,

    /// Per-action driver timeout, in milliseconds
    pub action_timeout_ms: u64,

    /// Local-storage key the portal reads its session token from
    pub auth_storage_key: String,

    /// Observed events whose text matches any of these are not reported.
    /// Applies to console messages, page errors and failed responses
    /// (`"<status> <method> <url>"`).
    pub ignored_event_patterns: Vec<String>,

    /// Scenarios run concurrently (serial ones always run alone)
    pub workers: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            api_base_url: "http://127.0.0.1:8000/api".to_string(),
            fixtures_path: PathBuf::from("fixtures/test-data.json"),
            output_dir: PathBuf::from("test-results"),
            browser: Browser::Chromium,
            headless: true,
            viewport: Viewport { width: 1280, height: 720 },
            default_timeout_ms: 5_000,
            action_timeout_ms: 30_000,
            auth_storage_key: "token".to_string(),
            ignored_event_patterns: Vec::new(),
            workers: 1,
        }
    }
}

impl SuiteConfig {
    /// Parse a config from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        serde_yaml::from_str(yaml).map_err(E2eError::from)
    }

    /// Load from a file, or use defaults when `path` is None
    pub fn load(path: Option<&Path>) -> E2eResult<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    E2eError::setup(format!("cannot read config {}: {}", path.display(), e))
                })?;
                Self::from_yaml(&content)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `PORTAL_E2E_*` overrides from the given lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> E2eResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PORTAL_E2E_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("PORTAL_E2E_API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = lookup("PORTAL_E2E_FIXTURES") {
            self.fixtures_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("PORTAL_E2E_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("PORTAL_E2E_BROWSER") {
            self.browser = v.parse()?;
        }
        if let Some(v) = lookup("PORTAL_E2E_HEADLESS") {
            self.headless = !matches!(v.as_str(), "0" | "false" | "no");
        }
        if let Some(v) = lookup("PORTAL_E2E_WORKERS") {
            self.workers = v
                .parse()
                .map_err(|_| E2eError::setup(format!("PORTAL_E2E_WORKERS is not a number: {}", v)))?;
        }
        debug!(base_url = %self.base_url, api = %self.api_base_url, "Resolved suite configuration");
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.output_dir.join("screenshots")
    }

    pub fn attachments_dir(&self) -> PathBuf {
        self.output_dir.join("attachments")
    }

    pub fn playwright(&self) -> PlaywrightConfig {
        PlaywrightConfig {
            base_url: self.base_url.clone(),
            browser: self.browser,
            headless: self.headless,
            viewport_width: self.viewport.width,
            viewport_height: self.viewport.height,
            action_timeout: Duration::from_millis(self.action_timeout_ms),
            ..Default::default()
        }
    }
}
