//! Static test data: credential groups and payment test cards
//!
//! Loaded once per process and passed into scenarios explicitly. A field a
//! scenario asks for but the file lacks is a setup defect and surfaces as
//! `E2eError::Setup`.

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{E2eError, E2eResult};

static SHARED: OnceCell<TestDataSet> = OnceCell::new();

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub username: Option<String>,
    /// Scenario-specific fields such as `new_password`
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Credentials {
    pub fn username(&self) -> E2eResult<&str> {
        self.username
            .as_deref()
            .ok_or_else(|| E2eError::setup("credential set has no username"))
    }

    pub fn extra_str(&self, key: &str) -> E2eResult<&str> {
        self.extra
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| E2eError::setup(format!("credential field '{}' missing", key)))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentData {
    /// Card numbers keyed by decline reason
    #[serde(default)]
    pub declined_cards: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PaymentData {
    pub fn field(&self, key: &str) -> E2eResult<&str> {
        self.extra
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| E2eError::setup(format!("payment field '{}' missing", key)))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestDataSet {
    #[serde(default)]
    pub payment: Option<PaymentData>,
    /// Named credential groups: `valid`, `invalid`, `account`, ...
    #[serde(flatten)]
    pub groups: BTreeMap<String, Credentials>,
}

impl TestDataSet {
    pub fn from_json(json: &str) -> E2eResult<Self> {
        serde_json::from_str(json).map_err(|e| E2eError::setup(format!("invalid test data: {}", e)))
    }

    pub fn load(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| E2eError::setup(format!("cannot read test data {}: {}", path.display(), e)))?;
        let data = Self::from_json(&content)?;
        info!("Loaded {} credential group(s) from {}", data.groups.len(), path.display());
        Ok(data)
    }

    /// Process-wide copy; the first successful load wins
    pub fn shared(path: &Path) -> E2eResult<&'static TestDataSet> {
        SHARED.get_or_try_init(|| Self::load(path))
    }

    pub fn group(&self, name: &str) -> E2eResult<&Credentials> {
        self.groups
            .get(name)
            .ok_or_else(|| E2eError::setup(format!("credential group '{}' missing from test data", name)))
    }

    pub fn payment(&self) -> E2eResult<&PaymentData> {
        self.payment
            .as_ref()
            .ok_or_else(|| E2eError::setup("payment section missing from test data"))
    }

    pub fn declined_card(&self, reason: &str) -> E2eResult<&str> {
        self.payment()?
            .declined_cards
            .get(reason)
            .map(String::as_str)
            .ok_or_else(|| E2eError::setup(format!("no declined card for reason '{}'", reason)))
    }
}
