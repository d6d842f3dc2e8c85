//! Observability fixture
//!
//! Subscribes to a page's console, page-error and response events for the
//! duration of one scenario. At teardown the buffered events are classified;
//! any console error, console warning, uncaught page error or HTTP response
//! with status >= 400 fails the scenario, even when its own assertions passed.
//! So does losing events to a full buffer: a dropped error cannot be told
//! apart from one that never happened.
//!
//! ```text
//! Armed ──collect()──> Collecting ──evaluate()──> Evaluating ──> Passed | Failed
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::driver::{ConsoleLevel, Page, PageEvent};
use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ConsoleError,
    ConsoleWarning,
    ConsoleOther,
    PageError,
    HttpFailure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedEvent {
    pub kind: EventKind,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl ObservedEvent {
    /// Classify a raw page event. Successful responses are not recorded.
    pub fn classify(event: PageEvent) -> Option<Self> {
        match event {
            PageEvent::Console(msg) => Some(Self {
                kind: match msg.level {
                    ConsoleLevel::Error => EventKind::ConsoleError,
                    ConsoleLevel::Warning => EventKind::ConsoleWarning,
                    _ => EventKind::ConsoleOther,
                },
                text: msg.text,
                timestamp: msg.timestamp,
                url: msg.location,
                status: None,
                body: None,
            }),
            PageEvent::PageError(err) => Some(Self {
                kind: EventKind::PageError,
                text: match err.stack {
                    Some(stack) if !stack.is_empty() => stack,
                    _ => err.message,
                },
                timestamp: err.timestamp,
                url: None,
                status: None,
                body: None,
            }),
            PageEvent::Response(res) if res.status >= 400 => Some(Self {
                kind: EventKind::HttpFailure,
                text: format!("{} {} {}", res.status, res.method, res.url),
                timestamp: res.timestamp,
                url: Some(res.url),
                status: Some(res.status),
                body: res.body,
            }),
            PageEvent::Response(_) => None,
        }
    }

    pub fn is_problem(&self) -> bool {
        self.kind != EventKind::ConsoleOther
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureState {
    Armed,
    Collecting,
    Evaluating,
    Passed,
    Failed,
}

/// Per-scenario event collector
pub struct ObservabilityFixture {
    receiver: broadcast::Receiver<PageEvent>,
    events: Vec<ObservedEvent>,
    ignored: Vec<Regex>,
    state: FixtureState,
    lagged: u64,
}

impl ObservabilityFixture {
    /// Subscribe to `page`. Patterns select console/network noise to ignore.
    pub fn arm(page: &dyn Page, ignored_patterns: &[String]) -> E2eResult<Self> {
        let ignored = ignored_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            receiver: page.subscribe(),
            events: Vec::new(),
            ignored,
            state: FixtureState::Armed,
            lagged: 0,
        })
    }

    pub fn state(&self) -> FixtureState {
        self.state
    }

    /// Everything recorded so far, in arrival order
    pub fn events(&self) -> &[ObservedEvent] {
        &self.events
    }

    /// Drain pending events into the buffer; returns how many were recorded
    pub fn collect(&mut self) -> usize {
        if self.state == FixtureState::Armed {
            self.state = FixtureState::Collecting;
        }

        let before = self.events.len();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if let Some(observed) = ObservedEvent::classify(event) {
                        debug!(kind = ?observed.kind, "{}", observed.text);
                        self.events.push(observed);
                    }
                }
                Err(TryRecvError::Lagged(n)) => {
                    warn!("Observability buffer overflowed, {} event(s) lost", n);
                    self.lagged += n;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        self.events.len() - before
    }

    /// Final drain and classification; moves the fixture to Passed or Failed
    pub fn evaluate(&mut self) -> ObservationReport {
        self.collect();
        self.state = FixtureState::Evaluating;

        let mut report = ObservationReport {
            events: self.events.clone(),
            lagged: self.lagged,
            ..Default::default()
        };

        for event in self.events.iter().filter(|e| e.is_problem()) {
            if self.ignored.iter().any(|re| re.is_match(&event.text)) {
                report.ignored += 1;
                continue;
            }
            match event.kind {
                EventKind::ConsoleError => report.console_errors.push(event.clone()),
                EventKind::ConsoleWarning => report.console_warnings.push(event.clone()),
                EventKind::PageError => report.page_errors.push(event.clone()),
                EventKind::HttpFailure => report.http_failures.push(event.clone()),
                EventKind::ConsoleOther => {}
            }
        }

        self.state = if report.has_problems() {
            FixtureState::Failed
        } else {
            FixtureState::Passed
        };
        report
    }
}

/// Outcome of one scenario's observation window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservationReport {
    pub console_errors: Vec<ObservedEvent>,
    pub console_warnings: Vec<ObservedEvent>,
    pub page_errors: Vec<ObservedEvent>,
    pub http_failures: Vec<ObservedEvent>,
    /// Full event log, including ignored and informational messages
    pub events: Vec<ObservedEvent>,
    pub ignored: usize,
    pub lagged: u64,
}

impl ObservationReport {
    pub fn has_problems(&self) -> bool {
        self.lagged > 0
            || !(self.console_errors.is_empty()
                && self.console_warnings.is_empty()
                && self.page_errors.is_empty()
                && self.http_failures.is_empty())
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} console error(s), {} console warning(s), {} page error(s), {} failed response(s)",
            self.console_errors.len(),
            self.console_warnings.len(),
            self.page_errors.len(),
            self.http_failures.len()
        );
        if self.lagged > 0 {
            summary.push_str(&format!(", {} event(s) lost", self.lagged));
        }
        summary
    }

    /// The post-hoc check: every problem collection must be empty
    pub fn assert_clean(&self) -> E2eResult<()> {
        if !self.has_problems() {
            return Ok(());
        }
        let first = self
            .console_errors
            .iter()
            .chain(&self.page_errors)
            .chain(&self.http_failures)
            .chain(&self.console_warnings)
            .next()
            .map(|e| e.text.lines().next().unwrap_or_default().to_string())
            .unwrap_or_else(|| "event buffer overflowed".to_string());
        Err(E2eError::UnexpectedEvents(format!("{}; first: {}", self.summary(), first)))
    }

    /// Write the report as `<scenario>-observability.json` under `dir`
    pub fn attach(&self, dir: &Path, scenario: &str) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}-observability.json", scenario));
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        info!("Observability report attached: {}", path.display());
        Ok(path)
    }
}
