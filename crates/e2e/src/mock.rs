//! Scripted in-memory page for unit tests

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::driver::{
    ConsoleLevel, ConsoleMessage, HttpReply, HttpRequest, Locator, MockResponse, Page, PageEvent,
    PageFactory, ResponseEvent, WaitState,
};
use crate::error::{E2eError, E2eResult};

#[derive(Default)]
struct State {
    url: String,
    visible: HashSet<String>,
    texts: HashMap<String, Vec<String>>,
    counts: HashMap<String, usize>,
    attributes: HashMap<(String, String), String>,
    /// trigger -> (clicks needed, locator revealed)
    reveals: HashMap<String, (usize, String)>,
    clicks: Vec<String>,
    fills: Vec<(String, String)>,
    routes: Vec<String>,
    screenshots: Vec<PathBuf>,
    reply: Option<HttpReply>,
    /// url -> events emitted when it is visited
    on_goto: Vec<(String, PageEvent)>,
    /// held back until the page is settled, like a response body still being read
    late: Vec<PageEvent>,
    settles: usize,
    fail_evaluate: bool,
    closed: bool,
}

pub(crate) struct MockPage {
    events: broadcast::Sender<PageEvent>,
    state: Mutex<State>,
}

impl MockPage {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            events,
            state: Mutex::new(State {
                url: "about:blank".to_string(),
                ..Default::default()
            }),
        })
    }

    pub fn console(&self, level: ConsoleLevel, text: &str) {
        let _ = self.events.send(console_event(level, text));
    }

    pub fn response(&self, url: &str, status: u16, body: Option<&str>) {
        let _ = self.events.send(response_event(url, status, body));
    }

    /// Emit `event` every time `url` is visited
    pub fn emit_on_goto(&self, url: &str, event: PageEvent) {
        self.state.lock().on_goto.push((url.to_string(), event));
    }

    /// Emit `event` only once the page is settled
    pub fn emit_late(&self, event: PageEvent) {
        self.state.lock().late.push(event);
    }

    pub fn settles(&self) -> usize {
        self.state.lock().settles
    }

    pub fn fail_evaluate(&self) {
        self.state.lock().fail_evaluate = true;
    }

    pub fn set_attribute(&self, locator: &Locator, name: &str, value: &str) {
        self.state
            .lock()
            .attributes
            .insert((locator.to_string(), name.to_string()), value.to_string());
    }

    pub fn set_visible(&self, locator: &Locator, visible: bool) {
        let mut state = self.state.lock();
        if visible {
            state.visible.insert(locator.to_string());
        } else {
            state.visible.remove(&locator.to_string());
        }
    }

    pub fn set_texts(&self, locator: &Locator, texts: &[&str]) {
        self.state
            .lock()
            .texts
            .insert(locator.to_string(), texts.iter().map(|t| t.to_string()).collect());
    }

    pub fn set_count(&self, locator: &Locator, count: usize) {
        self.state.lock().counts.insert(locator.to_string(), count);
    }

    pub fn set_url(&self, url: &str) {
        self.state.lock().url = url.to_string();
    }

    pub fn set_reply(&self, reply: HttpReply) {
        self.state.lock().reply = Some(reply);
    }

    /// `target` becomes visible once `trigger` has been clicked `clicks` times
    pub fn reveal_after(&self, trigger: &Locator, clicks: usize, target: &Locator) {
        self.state
            .lock()
            .reveals
            .insert(trigger.to_string(), (clicks, target.to_string()));
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().clicks.clone()
    }

    pub fn clicks_on(&self, locator: &Locator) -> usize {
        let key = locator.to_string();
        self.state.lock().clicks.iter().filter(|c| **c == key).count()
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.state.lock().fills.clone()
    }

    pub fn routes(&self) -> Vec<String> {
        self.state.lock().routes.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.state.lock().screenshots.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[async_trait]
impl Page for MockPage {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        let scripted: Vec<PageEvent> = {
            let mut state = self.state.lock();
            state.url = url.to_string();
            state
                .on_goto
                .iter()
                .filter(|(u, _)| u == url)
                .map(|(_, e)| e.clone())
                .collect()
        };
        for event in scripted {
            let _ = self.events.send(event);
        }
        Ok(())
    }

    async fn reload(&self) -> E2eResult<()> {
        Ok(())
    }

    async fn url(&self) -> E2eResult<String> {
        Ok(self.state.lock().url.clone())
    }

    async fn title(&self) -> E2eResult<String> {
        Ok("Compute Portal".to_string())
    }

    async fn wait_for_load(&self) -> E2eResult<()> {
        Ok(())
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        let key = locator.to_string();
        let mut state = self.state.lock();
        state.clicks.push(key.clone());
        let clicked = state.clicks.iter().filter(|c| **c == key).count();
        if let Some((needed, target)) = state.reveals.get(&key).cloned() {
            if clicked >= needed {
                state.visible.insert(target);
            }
        }
        Ok(())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.state.lock().fills.push((locator.to_string(), value.to_string()));
        Ok(())
    }

    async fn press(&self, _locator: &Locator, _key: &str) -> E2eResult<()> {
        Ok(())
    }

    async fn select_option(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.fill(locator, value).await
    }

    async fn check(&self, locator: &Locator) -> E2eResult<()> {
        self.click(locator).await
    }

    async fn hover(&self, _locator: &Locator) -> E2eResult<()> {
        Ok(())
    }

    async fn text_content(&self, locator: &Locator) -> E2eResult<Option<String>> {
        Ok(self.state.lock().texts.get(&locator.to_string()).map(|t| t.join("")))
    }

    async fn inner_texts(&self, locator: &Locator) -> E2eResult<Vec<String>> {
        Ok(self.state.lock().texts.get(&locator.to_string()).cloned().unwrap_or_default())
    }

    async fn input_value(&self, locator: &Locator) -> E2eResult<String> {
        let key = locator.to_string();
        Ok(self
            .state
            .lock()
            .fills
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_default())
    }

    async fn get_attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>> {
        Ok(self
            .state
            .lock()
            .attributes
            .get(&(locator.to_string(), name.to_string()))
            .cloned())
    }

    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool> {
        Ok(self.state.lock().visible.contains(&locator.to_string()))
    }

    async fn count(&self, locator: &Locator) -> E2eResult<usize> {
        let key = locator.to_string();
        let state = self.state.lock();
        Ok(state
            .counts
            .get(&key)
            .copied()
            .unwrap_or_else(|| usize::from(state.visible.contains(&key))))
    }

    async fn wait_for(&self, locator: &Locator, state: WaitState, _timeout: Duration) -> E2eResult<()> {
        let visible = self.is_visible(locator).await?;
        let satisfied = match state {
            WaitState::Visible | WaitState::Attached => visible,
            WaitState::Hidden | WaitState::Detached => !visible,
        };
        if satisfied {
            Ok(())
        } else {
            Err(E2eError::Timeout(format!("{} to be {}", locator, state.as_str())))
        }
    }

    async fn screenshot(&self, path: &Path, _full_page: bool) -> E2eResult<()> {
        self.state.lock().screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn evaluate(&self, _script: &str, _arg: Value) -> E2eResult<Value> {
        if self.state.lock().fail_evaluate {
            return Err(E2eError::Driver("Execution context was destroyed".into()));
        }
        Ok(Value::Null)
    }

    async fn route(&self, pattern: &str, _response: MockResponse) -> E2eResult<()> {
        self.state.lock().routes.push(pattern.to_string());
        Ok(())
    }

    async fn unroute(&self, pattern: &str) -> E2eResult<()> {
        self.state.lock().routes.retain(|r| r != pattern);
        Ok(())
    }

    async fn request(&self, _request: HttpRequest) -> E2eResult<HttpReply> {
        Ok(self
            .state
            .lock()
            .reply
            .clone()
            .unwrap_or(HttpReply { status: 200, body: String::new() }))
    }

    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    async fn settle(&self) -> E2eResult<()> {
        let late = {
            let mut state = self.state.lock();
            state.settles += 1;
            std::mem::take(&mut state.late)
        };
        for event in late {
            let _ = self.events.send(event);
        }
        Ok(())
    }

    async fn close(&self) -> E2eResult<()> {
        self.state.lock().closed = true;
        Ok(())
    }
}

pub(crate) fn console_event(level: ConsoleLevel, text: &str) -> PageEvent {
    PageEvent::Console(ConsoleMessage {
        level,
        text: text.to_string(),
        location: None,
        timestamp: Utc::now(),
    })
}

pub(crate) fn response_event(url: &str, status: u16, body: Option<&str>) -> PageEvent {
    PageEvent::Response(ResponseEvent {
        url: url.to_string(),
        method: "GET".to_string(),
        status,
        body: body.map(String::from),
        timestamp: Utc::now(),
    })
}

/// Hands out mock pages and keeps them for inspection
#[derive(Default)]
pub(crate) struct MockPageFactory {
    pub pages: Mutex<Vec<Arc<MockPage>>>,
    /// Scripted onto every page handed out
    pub on_goto: Vec<(String, PageEvent)>,
    /// Emitted only when the page is settled
    pub late: Vec<PageEvent>,
    pub fail: bool,
}

#[async_trait]
impl PageFactory for MockPageFactory {
    async fn new_page(&self) -> E2eResult<Arc<dyn Page>> {
        if self.fail {
            return Err(E2eError::Playwright("browser context could not be created".into()));
        }
        let page = MockPage::new();
        for (url, event) in &self.on_goto {
            page.emit_on_goto(url, event.clone());
        }
        for event in &self.late {
            page.emit_late(event.clone());
        }
        self.pages.lock().push(page.clone());
        Ok(page)
    }
}

/// Serve `router` on an ephemeral local port; returns its base URL
pub(crate) async fn stub_backend(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{}", addr)
}
