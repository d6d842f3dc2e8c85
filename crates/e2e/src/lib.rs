//! Compute Portal E2E Test Framework
//!
//! This crate drives the portal UI through Playwright and checks it from
//! the outside:
//! - Scenarios run in isolated browser contexts, in parallel where safe
//! - Page objects wrap each screen's locators and actions
//! - Flaky UI transitions settle inside a bounded retry combinator
//! - Console errors, warnings and failed responses fail a scenario on their own
//! - Server-side resources are removed through the backend API afterwards
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── PageFactory::new_page() -> Arc<dyn Page>             │
//! │    ├── ObservabilityFixture::arm / collect / evaluate       │
//! │    ├── ScenarioDef::run(&mut ScenarioContext)               │
//! │    │     ├── login (UI | injected token)                    │
//! │    │     ├── page objects + retry_until                     │
//! │    │     └── defer_cleanup -> ApiClient                     │
//! │    └── write_results -> test-results.json                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PlaywrightDriver (node bridge, line-delimited JSON)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod driver;
pub mod error;
pub mod expect;
pub mod fixtures;
pub mod lifecycle;
pub mod observe;
pub mod pages;
pub mod playwright;
pub mod retry;
pub mod runner;
pub mod scenarios;

#[cfg(test)]
mod mock;

pub use config::SuiteConfig;
pub use driver::{Locator, Page, PageFactory};
pub use error::{E2eError, E2eResult};
pub use fixtures::TestDataSet;
pub use lifecycle::{AuthMode, ScenarioContext};
pub use playwright::PlaywrightDriver;
pub use retry::{retry_until, RetryPolicy};
pub use runner::{ScenarioDef, TestResult, TestRunner, TestSuiteResult};
