//! Backend API client
//!
//! Direct HTTP access to the portal backend, bypassing the UI. Used for
//! session tokens, fixture setup, verification, and best-effort cleanup.

use std::time::Duration;

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{E2eError, E2eResult};

/// Standard response envelope: `{ data, message, status }`
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    pub page: u32,
    #[serde(alias = "pageSize", alias = "per_page")]
    pub page_size: u32,
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct LoginData {
    #[serde(alias = "access_token", alias = "accessToken")]
    token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub last4: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKey {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub action: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Backends disagree on numeric vs string ids; normalise to string
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unsupported id: {}", other))),
    }
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> E2eResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn authed(&self, method: Method, path: &str) -> E2eResult<RequestBuilder> {
        if self.token.is_none() {
            return Err(E2eError::setup(format!("API call to {} before login", path)));
        }
        Ok(self.request(method, path))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> E2eResult<T> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), "API response");

        if !status.is_success() {
            return Err(E2eError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Exchange credentials for a bearer token
    pub async fn login(&self, email: &str, password: &str) -> E2eResult<String> {
        let envelope: Envelope<LoginData> = self
            .send(
                self.request(Method::POST, "/auth/login")
                    .json(&json!({ "email": email, "password": password })),
            )
            .await?;
        Ok(envelope.data.token)
    }

    /// Log in and keep the token on this client
    pub async fn authenticate(&mut self, email: &str, password: &str) -> E2eResult<()> {
        let token = self.login(email, password).await?;
        self.token = Some(token);
        Ok(())
    }

    pub async fn list_teams(&self) -> E2eResult<Vec<Team>> {
        let envelope: Envelope<Vec<Team>> = self.send(self.authed(Method::GET, "/teams")?).await?;
        Ok(envelope.data)
    }

    pub async fn create_team(&self, name: &str) -> E2eResult<Team> {
        let envelope: Envelope<Team> = self
            .send(self.authed(Method::POST, "/teams")?.json(&json!({ "name": name })))
            .await?;
        Ok(envelope.data)
    }

    pub async fn delete_team(&self, id: &str) -> E2eResult<()> {
        self.send::<Value>(self.authed(Method::DELETE, &format!("/teams/{}", id))?)
            .await
            .map(drop)
    }

    /// Delete the team called `name`; a team that is already gone counts as deleted
    pub async fn delete_team_by_name(&self, name: &str) -> E2eResult<()> {
        match self.list_teams().await?.into_iter().find(|t| t.name == name) {
            Some(team) => self.delete_team(&team.id).await,
            None => {
                debug!(team = name, "Already gone");
                Ok(())
            }
        }
    }

    pub async fn list_api_keys(&self) -> E2eResult<Vec<ApiKey>> {
        let envelope: Envelope<Vec<ApiKey>> = self.send(self.authed(Method::GET, "/api-keys")?).await?;
        Ok(envelope.data)
    }

    pub async fn create_api_key(&self, name: &str) -> E2eResult<ApiKey> {
        let envelope: Envelope<ApiKey> = self
            .send(self.authed(Method::POST, "/api-keys")?.json(&json!({ "name": name })))
            .await?;
        Ok(envelope.data)
    }

    pub async fn delete_api_key(&self, id: &str) -> E2eResult<()> {
        self.send::<Value>(self.authed(Method::DELETE, &format!("/api-keys/{}", id))?)
            .await
            .map(drop)
    }

    pub async fn delete_api_key_by_name(&self, name: &str) -> E2eResult<()> {
        match self.list_api_keys().await?.into_iter().find(|k| k.name == name) {
            Some(key) => self.delete_api_key(&key.id).await,
            None => {
                debug!(api_key = name, "Already gone");
                Ok(())
            }
        }
    }

    pub async fn list_payment_methods(&self) -> E2eResult<Vec<PaymentMethod>> {
        let envelope: Envelope<Vec<PaymentMethod>> =
            self.send(self.authed(Method::GET, "/payment-methods")?).await?;
        Ok(envelope.data)
    }

    pub async fn delete_payment_method(&self, id: &str) -> E2eResult<()> {
        self.send::<Value>(self.authed(Method::DELETE, &format!("/payment-methods/{}", id))?)
            .await
            .map(drop)
    }

    pub async fn list_invoices(&self) -> E2eResult<Vec<Invoice>> {
        let envelope: Envelope<Vec<Invoice>> = self.send(self.authed(Method::GET, "/invoices")?).await?;
        Ok(envelope.data)
    }

    pub async fn list_ssh_keys(&self) -> E2eResult<Vec<SshKey>> {
        let envelope: Envelope<Vec<SshKey>> = self.send(self.authed(Method::GET, "/ssh-keys")?).await?;
        Ok(envelope.data)
    }

    pub async fn delete_ssh_key(&self, id: &str) -> E2eResult<()> {
        self.send::<Value>(self.authed(Method::DELETE, &format!("/ssh-keys/{}", id))?)
            .await
            .map(drop)
    }

    pub async fn delete_ssh_key_by_name(&self, name: &str) -> E2eResult<()> {
        match self.list_ssh_keys().await?.into_iter().find(|k| k.name == name) {
            Some(key) => self.delete_ssh_key(&key.id).await,
            None => {
                debug!(ssh_key = name, "Already gone");
                Ok(())
            }
        }
    }

    pub async fn audit_logs(&self, page: u32, page_size: u32) -> E2eResult<Paginated<AuditLogEntry>> {
        self.send(
            self.authed(Method::GET, "/audit-logs")?
                .query(&[("page", page), ("page_size", page_size)]),
        )
        .await
    }
}

/// Pull the `message` out of an error envelope, falling back to the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| body.chars().take(200).collect())
}
