//! Per-scenario setup and teardown
//!
//! A [`ScenarioContext`] is handed to every scenario body. It owns the page,
//! the injected test data and configuration, and an API client for setup
//! work that bypasses the UI. Server-side resources a scenario creates are
//! registered with [`ScenarioContext::defer_cleanup`] and removed after the
//! body finishes, whatever its outcome.
//!
//! Cleanup never raises: failures are logged and counted so they cannot
//! replace the scenario's own result.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use regex::Regex;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::ApiClient;
use crate::config::SuiteConfig;
use crate::driver::Page;
use crate::error::{E2eError, E2eResult};
use crate::expect::expect_url_matches;
use crate::fixtures::{Credentials, TestDataSet};
use crate::pages::{LoginPage, Navigable};

/// Post-login landing wait
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(20);

const STORE_TOKEN_SCRIPT: &str = "window.localStorage.setItem(arg.key, arg.token); return true;";

/// How a scenario gets an authenticated session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Fill the sign-in form
    Ui,
    /// Log in over the API and write the token into local storage
    InjectedToken,
}

type CleanupFn = Box<dyn FnOnce(ApiClient) -> BoxFuture<'static, E2eResult<()>> + Send>;

struct Cleanup {
    label: String,
    run: CleanupFn,
}

pub struct ScenarioContext {
    pub name: String,
    pub page: Arc<dyn Page>,
    pub data: Arc<TestDataSet>,
    pub config: Arc<SuiteConfig>,
    pub api: ApiClient,
    cleanups: Vec<Cleanup>,
    /// Used to obtain a fresh token for cleanup
    cleanup_credentials: Option<Credentials>,
}

impl ScenarioContext {
    pub fn new(
        name: impl Into<String>,
        page: Arc<dyn Page>,
        data: Arc<TestDataSet>,
        config: Arc<SuiteConfig>,
    ) -> E2eResult<Self> {
        let api = ApiClient::new(&config.api_base_url)?;
        Ok(Self {
            name: name.into(),
            page,
            data,
            config,
            api,
            cleanups: Vec::new(),
            cleanup_credentials: None,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.config.default_timeout()
    }

    /// Authenticate as the named credential group
    ///
    /// Any failure here is a setup failure: the scenario has not started
    /// testing anything yet.
    pub async fn login(&mut self, mode: AuthMode, group: &str) -> E2eResult<()> {
        let creds = self.data.group(group)?.clone();
        info!(scenario = %self.name, group, ?mode, "Authenticating");

        match mode {
            AuthMode::Ui => {
                let login = LoginPage::new(self.page.clone());
                login
                    .visit()
                    .await
                    .map_err(|e| E2eError::setup(format!("cannot open sign-in page: {}", e)))?;
                login
                    .login(&creds.email, &creds.password)
                    .await
                    .map_err(|e| E2eError::setup(format!("UI login as '{}' failed: {}", group, e)))?;
                let landing = Regex::new(r"/serverless")?;
                expect_url_matches(self.page.as_ref(), &landing, LOGIN_TIMEOUT)
                    .await
                    .map_err(|e| E2eError::setup(format!("UI login as '{}' did not land: {}", group, e)))?;
            }
            AuthMode::InjectedToken => {
                let token = self
                    .api
                    .login(&creds.email, &creds.password)
                    .await
                    .map_err(|e| E2eError::setup(format!("API login as '{}' failed: {}", group, e)))?;
                let inject =
                    |e: E2eError| E2eError::setup(format!("injecting session for '{}' failed: {}", group, e));
                self.page.goto("/").await.map_err(inject)?;
                self.page
                    .evaluate(
                        STORE_TOKEN_SCRIPT,
                        json!({ "key": self.config.auth_storage_key, "token": token }),
                    )
                    .await
                    .map_err(inject)?;
                self.page.reload().await.map_err(inject)?;
                self.api.set_token(token);
            }
        }

        self.cleanup_credentials = Some(creds);
        Ok(())
    }

    /// Register teardown for a server-side resource
    ///
    /// Cleanups run after the body in reverse registration order and
    /// receive an API client holding a freshly obtained token.
    pub fn defer_cleanup<F, Fut>(&mut self, label: impl Into<String>, cleanup: F)
    where
        F: FnOnce(ApiClient) -> Fut + Send + 'static,
        Fut: Future<Output = E2eResult<()>> + Send + 'static,
    {
        let label = label.into();
        debug!(scenario = %self.name, cleanup = %label, "Cleanup registered");
        self.cleanups.push(Cleanup {
            label,
            run: Box::new(move |api| cleanup(api).boxed()),
        });
    }

    pub fn pending_cleanups(&self) -> usize {
        self.cleanups.len()
    }

    /// Run every registered cleanup; returns how many failed
    pub async fn run_cleanups(&mut self) -> usize {
        if self.cleanups.is_empty() {
            return 0;
        }

        let api = match self.cleanup_client().await {
            Ok(api) => api,
            Err(e) => {
                warn!(scenario = %self.name, "Cleanup re-login failed, reusing session: {}", e);
                self.api.clone()
            }
        };

        let mut failures = 0;
        while let Some(cleanup) = self.cleanups.pop() {
            match (cleanup.run)(api.clone()).await {
                Ok(()) => debug!(scenario = %self.name, cleanup = %cleanup.label, "Cleanup done"),
                Err(e) => {
                    failures += 1;
                    warn!(scenario = %self.name, cleanup = %cleanup.label, "Cleanup failed: {}", e);
                }
            }
        }
        failures
    }

    async fn cleanup_client(&self) -> E2eResult<ApiClient> {
        match &self.cleanup_credentials {
            Some(creds) => {
                let mut api = ApiClient::new(&self.config.api_base_url)?;
                api.authenticate(&creds.email, &creds.password).await?;
                Ok(api)
            }
            None => Ok(self.api.clone()),
        }
    }
}

/// Identifier for a shared server-side resource, unique across parallel runs
pub fn unique_name(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix, Utc::now().format("%Y%m%d%H%M%S"), &suffix[..6])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{stub_backend, MockPage};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use parking_lot::Mutex;

    fn context_with(page: Arc<MockPage>, config: SuiteConfig) -> ScenarioContext {
        let data = TestDataSet::from_json(
            r#"{ "valid": { "email": "qa@portal.example", "password": "pw", "username": "qa" } }"#,
        )
        .unwrap();
        ScenarioContext::new("ctx", page, Arc::new(data), Arc::new(config)).unwrap()
    }

    fn context(page: Arc<MockPage>) -> ScenarioContext {
        context_with(page, SuiteConfig::default())
    }

    /// Login succeeds; no teams are listed
    async fn backend_context(page: Arc<MockPage>) -> ScenarioContext {
        let router = Router::new()
            .route("/auth/login", post(|| async { Json(json!({ "data": { "token": "tok-1" } })) }))
            .route("/teams", get(|| async { Json(json!({ "data": [] })) }));
        let config = SuiteConfig {
            api_base_url: stub_backend(router).await,
            ..Default::default()
        };
        context_with(page, config)
    }

    #[tokio::test]
    async fn test_cleanups_run_in_reverse_and_count_failures() {
        let mut ctx = context(MockPage::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order = order.clone();
            ctx.defer_cleanup(label, move |_api| async move {
                order.lock().push(label);
                if label == "second" {
                    Err(E2eError::Api { status: 500, message: "boom".into() })
                } else {
                    Ok(())
                }
            });
        }

        assert_eq!(ctx.pending_cleanups(), 3);
        assert_eq!(ctx.run_cleanups().await, 1);
        assert_eq!(*order.lock(), vec!["third", "second", "first"]);
        assert_eq!(ctx.pending_cleanups(), 0);
        assert_eq!(ctx.run_cleanups().await, 0);
    }

    #[tokio::test]
    async fn test_missing_group_is_setup_failure() {
        let mut ctx = context(MockPage::new());
        let err = ctx.login(AuthMode::InjectedToken, "billing_admin").await.unwrap_err();
        assert!(err.is_setup());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ui_login_that_never_lands_is_setup_failure() {
        let page = MockPage::new();
        let mut ctx = context(page.clone());
        let err = ctx.login(AuthMode::Ui, "valid").await.unwrap_err();
        assert!(err.is_setup());
        assert_eq!(page.fills().len(), 2);
        assert_eq!(page.clicks_on(&LoginPage::submit_button()), 1);
    }

    #[tokio::test]
    async fn test_injected_token_login() {
        let page = MockPage::new();
        let mut ctx = backend_context(page.clone()).await;

        ctx.login(AuthMode::InjectedToken, "valid").await.unwrap();
        assert_eq!(ctx.api.token(), Some("tok-1"));
        assert_eq!(page.url().await.unwrap(), "/");
    }

    #[tokio::test]
    async fn test_injection_failure_is_setup_failure() {
        let page = MockPage::new();
        page.fail_evaluate();
        let mut ctx = backend_context(page).await;

        let err = ctx.login(AuthMode::InjectedToken, "valid").await.unwrap_err();
        assert!(err.is_setup());
        assert!(err.to_string().contains("Execution context was destroyed"));
        assert!(ctx.api.token().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_of_already_deleted_team_is_not_a_failure() {
        let mut ctx = backend_context(MockPage::new()).await;
        ctx.login(AuthMode::InjectedToken, "valid").await.unwrap();

        // the scenario removed the team through the UI already
        ctx.defer_cleanup("delete team e2e-team-1", |api| async move {
            api.delete_team_by_name("e2e-team-1").await
        });
        assert_eq!(ctx.run_cleanups().await, 0);
    }

    #[test]
    fn test_unique_names_differ() {
        let a = unique_name("team");
        let b = unique_name("team");
        assert!(a.starts_with("team-"));
        assert_ne!(a, b);
    }
}
