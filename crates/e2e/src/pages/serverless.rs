//! Serverless model inference dashboard (post-login landing page)

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::Navigable;
use crate::driver::{HttpRequest, Locator, MockResponse, Page};
use crate::error::E2eResult;
use crate::expect::{expect_count, expect_visible};

const MODELS_ROUTE: &str = "**/api/models*";

pub struct ServerlessPage {
    page: Arc<dyn Page>,
}

impl ServerlessPage {
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self { page }
    }

    pub fn heading() -> Locator {
        Locator::role_named("heading", "Serverless")
    }

    pub fn model_cards() -> Locator {
        Locator::css(".model-card")
    }

    /// Serve a fixed model catalogue instead of the live one
    pub async fn stub_models(&self, models: &Value) -> E2eResult<()> {
        let body = serde_json::json!({ "data": models, "message": "ok", "status": 200 });
        self.page.route(MODELS_ROUTE, MockResponse::json(200, &body)).await
    }

    pub async fn clear_stubs(&self) -> E2eResult<()> {
        self.page.unroute(MODELS_ROUTE).await
    }

    /// Call an inference endpoint with an API key; returns the HTTP status
    pub async fn probe_endpoint(&self, url: &str, api_key: &str, prompt: &str) -> E2eResult<u16> {
        let request = HttpRequest::post(url, serde_json::json!({ "prompt": prompt, "max_tokens": 8 }))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json");
        Ok(self.page.request(request).await?.status)
    }

    pub async fn check_ui(&self, timeout: Duration) -> E2eResult<()> {
        expect_visible(self.page.as_ref(), &Self::heading(), timeout).await
    }

    pub async fn check_model_count(&self, expected: usize, timeout: Duration) -> E2eResult<()> {
        expect_count(self.page.as_ref(), &Self::model_cards(), expected, timeout).await
    }
}

impl Navigable for ServerlessPage {
    fn page(&self) -> &dyn Page {
        self.page.as_ref()
    }

    fn path(&self) -> &str {
        "/serverless"
    }
}
