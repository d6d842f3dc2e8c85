//! Main test runner: scenario registry, isolated execution, results

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::SuiteConfig;
use crate::driver::{Page, PageFactory};
use crate::error::{E2eError, E2eResult};
use crate::fixtures::TestDataSet;
use crate::lifecycle::ScenarioContext;
use crate::observe::ObservabilityFixture;

/// Scenario body. Borrows the context so cleanup can run after it returns.
pub type ScenarioFn = for<'a> fn(&'a mut ScenarioContext) -> BoxFuture<'a, E2eResult<()>>;

/// One registered scenario
#[derive(Clone, Copy)]
pub struct ScenarioDef {
    pub name: &'static str,
    pub description: &'static str,
    pub tags: &'static [&'static str],
    /// Touches shared server-side state; never runs alongside others
    pub serial: bool,
    pub run: ScenarioFn,
}

impl ScenarioDef {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| *t == tag)
    }
}

impl std::fmt::Debug for ScenarioDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioDef")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("serial", &self.serial)
            .finish()
    }
}

/// Why a scenario failed, for environment-vs-behavior triage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Setup,
    Behavior,
    Observability,
}

/// Result of running a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub failure_kind: Option<FailureKind>,
    /// Logged only; never affects `success`
    pub cleanup_failures: usize,
    pub observed_events: usize,
    pub attachments: Vec<PathBuf>,
}

impl TestResult {
    fn aborted(name: &str, error: &E2eError, duration_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            duration_ms,
            error: Some(error.to_string()),
            failure_kind: Some(FailureKind::Setup),
            cleanup_failures: 0,
            observed_events: 0,
            attachments: Vec::new(),
        }
    }
}

/// Result of running all tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn from_results(results: Vec<TestResult>, duration_ms: u64) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            duration_ms,
            results,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Main E2E test runner
pub struct TestRunner {
    config: Arc<SuiteConfig>,
    data: Arc<TestDataSet>,
    factory: Arc<dyn PageFactory>,
    scenarios: Vec<ScenarioDef>,
}

impl TestRunner {
    /// Runner over the built-in portal scenarios
    pub fn new(config: SuiteConfig, data: TestDataSet, factory: Arc<dyn PageFactory>) -> Self {
        Self {
            config: Arc::new(config),
            data: Arc::new(data),
            factory,
            scenarios: crate::scenarios::all(),
        }
    }

    pub fn with_scenarios(mut self, scenarios: Vec<ScenarioDef>) -> Self {
        self.scenarios = scenarios;
        self
    }

    pub fn scenarios(&self) -> &[ScenarioDef] {
        &self.scenarios
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub async fn run_all(&self) -> E2eResult<TestSuiteResult> {
        self.run_scenarios(&self.scenarios).await
    }

    /// Run scenarios carrying `tag`
    pub async fn run_tagged(&self, tag: &str) -> E2eResult<TestSuiteResult> {
        let filtered: Vec<ScenarioDef> = self.scenarios.iter().filter(|s| s.has_tag(tag)).copied().collect();
        if filtered.is_empty() {
            warn!("No scenario is tagged '{}'", tag);
        }
        self.run_scenarios(&filtered).await
    }

    /// Run a specific test by name
    pub async fn run_test(&self, name: &str) -> E2eResult<TestResult> {
        let def = self
            .scenarios
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::UnknownScenario(name.to_string()))?;
        Ok(self.run_scenario(def).await)
    }

    /// Parallel scenarios first (bounded by `workers`), then serial ones alone
    pub async fn run_scenarios(&self, defs: &[ScenarioDef]) -> E2eResult<TestSuiteResult> {
        let start = Instant::now();
        let (serial, parallel): (Vec<&ScenarioDef>, Vec<&ScenarioDef>) = defs.iter().partition(|d| d.serial);
        let workers = self.config.workers.max(1);

        info!(
            "Running {} test(s) ({} parallel on {} worker(s), {} serial)...",
            defs.len(),
            parallel.len(),
            workers,
            serial.len()
        );

        let mut results: Vec<TestResult> = stream::iter(parallel)
            .map(|def| self.run_scenario(def))
            .buffered(workers)
            .collect()
            .await;

        for def in serial {
            results.push(self.run_scenario(def).await);
        }

        let suite = TestSuiteResult::from_results(results, start.elapsed().as_millis() as u64);

        info!("");
        info!(
            "Test Results: {} passed, {} failed ({} ms)",
            suite.passed, suite.failed, suite.duration_ms
        );
        Ok(suite)
    }

    /// Run one scenario in a fresh browser context
    pub async fn run_scenario(&self, def: &ScenarioDef) -> TestResult {
        let start = Instant::now();
        debug!("Running test: {}", def.name);

        let result = match self.factory.new_page().await {
            Ok(page) => self.execute(def, page, start).await,
            Err(e) => TestResult::aborted(def.name, &e, start.elapsed().as_millis() as u64),
        };

        if result.success {
            info!("✓ {} ({} ms)", result.name, result.duration_ms);
        } else {
            error!(
                "✗ {} - {}",
                result.name,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        result
    }

    /// Arm observation, run the body, clean up, then judge
    ///
    /// The verdict comes from the body first; a passing body can still fail
    /// on collected console or network problems. Cleanup outcomes are only
    /// counted.
    async fn execute(&self, def: &ScenarioDef, page: Arc<dyn Page>, start: Instant) -> TestResult {
        let elapsed = |start: Instant| start.elapsed().as_millis() as u64;

        let armed = ObservabilityFixture::arm(page.as_ref(), &self.config.ignored_event_patterns)
            .and_then(|fixture| {
                ScenarioContext::new(def.name, page.clone(), self.data.clone(), self.config.clone())
                    .map(|ctx| (fixture, ctx))
            });
        let (mut fixture, mut ctx) = match armed {
            Ok(armed) => armed,
            Err(e) => {
                close_page(def.name, page.as_ref()).await;
                return TestResult::aborted(def.name, &e, elapsed(start));
            }
        };

        let outcome = (def.run)(&mut ctx).await;
        if let Err(e) = page.settle().await {
            warn!("Could not settle page events for {}: {}", def.name, e);
        }
        fixture.collect();

        let cleanup_failures = ctx.run_cleanups().await;
        let report = fixture.evaluate();

        let (error, failure_kind) = match &outcome {
            Err(e) if e.is_setup() => (Some(e.to_string()), Some(FailureKind::Setup)),
            Err(e) => (Some(e.to_string()), Some(FailureKind::Behavior)),
            Ok(()) => match report.assert_clean() {
                Ok(()) => (None, None),
                Err(e) => (Some(e.to_string()), Some(FailureKind::Observability)),
            },
        };

        let mut attachments = Vec::new();
        if report.has_problems() || error.is_some() {
            match report.attach(&self.config.attachments_dir(), def.name) {
                Ok(path) => attachments.push(path),
                Err(e) => warn!("Could not attach observability report for {}: {}", def.name, e),
            }
        }
        if error.is_some() {
            let path = self.config.screenshot_dir().join(format!("{}.png", def.name));
            match page.screenshot(&path, true).await {
                Ok(()) => attachments.push(path),
                Err(e) => warn!("Failure screenshot for {} not taken: {}", def.name, e),
            }
        }

        close_page(def.name, page.as_ref()).await;

        TestResult {
            name: def.name.to_string(),
            success: error.is_none(),
            duration_ms: elapsed(start),
            error,
            failure_kind,
            cleanup_failures,
            observed_events: report.events.len(),
            attachments,
        }
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

async fn close_page(scenario: &str, page: &dyn Page) {
    if let Err(e) = page.close().await {
        warn!("Closing page for {} failed: {}", scenario, e);
    }
}
