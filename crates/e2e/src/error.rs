//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    /// Environment or configuration problem detected before any assertion ran
    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected browser activity: {0}")]
    UnexpectedEvents(String),

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

impl E2eError {
    pub fn setup(msg: impl Into<String>) -> Self {
        E2eError::Setup(msg.into())
    }

    pub fn assertion(msg: impl Into<String>) -> Self {
        E2eError::AssertionFailed(msg.into())
    }

    /// True for failures caused by the environment rather than by product behavior.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            E2eError::Setup(_)
                | E2eError::PlaywrightNotFound
                | E2eError::UnknownScenario(_)
                | E2eError::Io(_)
                | E2eError::Yaml(_)
                | E2eError::Pattern(_)
        )
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
