//! Playwright browser automation
//!
//! A long-lived `node` process runs an embedded bridge script that owns the
//! browser. Commands and replies travel as line-delimited JSON over
//! stdin/stdout; browser events (console, page errors, responses) are pushed
//! on the same stream and fanned out to each page's broadcast channel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command as TokioCommand};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use crate::driver::{
    ConsoleLevel, ConsoleMessage, HttpReply, HttpRequest, Locator, MockResponse, Page,
    PageErrorEvent, PageEvent, PageFactory, ResponseEvent, WaitState,
};
use crate::error::{E2eError, E2eResult};

const EVENT_CAPACITY: usize = 1024;

const BRIDGE_SCRIPT: &str = r#"
const readline = require('readline');
const playwright = require('playwright');

let browser = null;
let actionTimeout = 30000;
const pages = new Map();
// page id -> response handlers still reading a body
const inflight = new Map();
let nextPage = 0;

function emit(obj) {
  process.stdout.write(JSON.stringify(obj) + '\n');
}

function build(root, loc) {
  switch (loc.kind) {
    case 'css': return root.locator(loc.selector);
    case 'text': return root.getByText(loc.text, { exact: !!loc.exact });
    case 'test_id': return root.getByTestId(loc.id);
    case 'role': return root.getByRole(loc.role, loc.name ? { name: loc.name } : {});
    case 'placeholder': return root.getByPlaceholder(loc.text);
    case 'label': return root.getByLabel(loc.text);
    case 'nth': return build(root, loc.inner).nth(loc.index);
    case 'filter': return build(root, loc.inner).filter({ hasText: loc.has_text });
    case 'within': return build(build(root, loc.parent), loc.child);
    case 'in_frame': return build(root.frameLocator(loc.frame), loc.inner);
    default: throw new Error('unknown locator kind: ' + loc.kind);
  }
}

function attach(id, page) {
  const reading = new Set();
  inflight.set(id, reading);
  page.on('console', msg => emit({
    event: 'console', page: id,
    data: { level: msg.type(), text: msg.text(), location: msg.location().url || null },
  }));
  page.on('pageerror', err => emit({
    event: 'page_error', page: id,
    data: { message: err.message, stack: err.stack || null },
  }));
  page.on('response', res => {
    const task = (async () => {
      const status = res.status();
      let body = null;
      if (status >= 400) {
        try { body = await res.text(); } catch (_) { body = null; }
      }
      emit({
        event: 'response', page: id,
        data: { url: res.url(), method: res.request().method(), status, body },
      });
    })();
    reading.add(task);
    task.finally(() => reading.delete(task));
  });
}

const ops = {
  async launch(a) {
    actionTimeout = a.action_timeout_ms;
    browser = await playwright[a.browser].launch({ headless: a.headless });
    return null;
  },
  async new_page(a) {
    const context = await browser.newContext({
      viewport: { width: a.width, height: a.height },
      baseURL: a.base_url,
    });
    context.setDefaultTimeout(actionTimeout);
    const page = await context.newPage();
    const id = 'p' + (++nextPage);
    pages.set(id, page);
    attach(id, page);
    return id;
  },
  async settle(a) {
    await Promise.allSettled([...(inflight.get(a.page_id) || [])]);
    return null;
  },
  async close_page(a, page) {
    await page.context().close();
    pages.delete(a.page_id);
    inflight.delete(a.page_id);
    return null;
  },
  async goto(a, page) { await page.goto(a.url); return null; },
  async reload(a, page) { await page.reload(); return null; },
  async url(a, page) { return page.url(); },
  async title(a, page) { return await page.title(); },
  async wait_for_load(a, page) { await page.waitForLoadState('networkidle'); return null; },
  async click(a, page) { await build(page, a.locator).click(); return null; },
  async fill(a, page) { await build(page, a.locator).fill(a.value); return null; },
  async press(a, page) { await build(page, a.locator).press(a.key); return null; },
  async select_option(a, page) { await build(page, a.locator).selectOption(a.value); return null; },
  async check(a, page) { await build(page, a.locator).check(); return null; },
  async hover(a, page) { await build(page, a.locator).hover(); return null; },
  async text_content(a, page) { return await build(page, a.locator).textContent(); },
  async inner_texts(a, page) { return await build(page, a.locator).allInnerTexts(); },
  async input_value(a, page) { return await build(page, a.locator).inputValue(); },
  async get_attribute(a, page) { return await build(page, a.locator).getAttribute(a.name); },
  async is_visible(a, page) { return await build(page, a.locator).isVisible(); },
  async count(a, page) { return await build(page, a.locator).count(); },
  async wait_for(a, page) {
    await build(page, a.locator).first().waitFor({ state: a.state, timeout: a.timeout_ms });
    return null;
  },
  async screenshot(a, page) { await page.screenshot({ path: a.path, fullPage: a.full_page }); return null; },
  async evaluate(a, page) {
    const fn = new Function('arg', a.script);
    return (await page.evaluate(fn, a.arg)) ?? null;
  },
  async route(a, page) {
    await page.route(a.pattern, route => route.fulfill({
      status: a.status, contentType: a.content_type, body: a.body,
    }));
    return null;
  },
  async unroute(a, page) { await page.unroute(a.pattern); return null; },
  async request(a, page) {
    const res = await page.request.fetch(a.url, {
      method: a.method, headers: a.headers, data: a.body ?? undefined,
    });
    return { status: res.status(), body: await res.text() };
  },
  async shutdown() {
    if (browser) await browser.close();
    setImmediate(() => process.exit(0));
    return null;
  },
};

readline.createInterface({ input: process.stdin }).on('line', async line => {
  let msg;
  try { msg = JSON.parse(line); } catch (_) { return; }
  try {
    let page = null;
    if (msg.page) {
      page = pages.get(msg.page);
      if (!page) throw new Error('unknown page ' + msg.page);
    }
    const value = await ops[msg.op](msg.args || {}, page);
    emit({ id: msg.id, ok: true, value: value === undefined ? null : value });
  } catch (e) {
    emit({ id: msg.id, ok: false, error: e.message, timeout: e.name === 'TimeoutError' });
  }
});
"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::setup(format!("unknown browser: {}", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Driver-side timeout for each click/fill/query
    pub action_timeout: Duration,
    /// Upper bound on one bridge round trip
    pub command_timeout: Duration,
    pub node_binary: PathBuf,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            action_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(150),
            node_binary: PathBuf::from("node"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BridgeReply {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    timeout: bool,
}

impl BridgeReply {
    fn into_result(self, op: &str) -> E2eResult<Value> {
        if self.ok {
            return Ok(self.value);
        }
        let message = self.error.unwrap_or_else(|| format!("{} failed", op));
        if self.timeout {
            Err(E2eError::Timeout(message))
        } else {
            Err(E2eError::Driver(message))
        }
    }
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<BridgeReply>>>>;
type Channels = Arc<Mutex<HashMap<String, broadcast::Sender<PageEvent>>>>;

/// The node process and its plumbing
struct Bridge {
    stdin: tokio::sync::Mutex<ChildStdin>,
    child: tokio::sync::Mutex<Child>,
    pending: Pending,
    channels: Channels,
    next_id: AtomicU64,
    command_timeout: Duration,
    _script_dir: tempfile::TempDir,
}

impl Bridge {
    async fn spawn(config: &PlaywrightConfig) -> E2eResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        debug!("Starting Playwright bridge: {}", script_path.display());

        let mut child = TokioCommand::new(&config.node_binary)
            .arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Playwright(format!("failed to spawn node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdout unavailable".into()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "playwright", "{}", line);
                }
            });
        }

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let channels: Channels = Arc::new(Mutex::new(HashMap::new()));

        {
            let pending = pending.clone();
            let channels = channels.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    route_line(&line, &pending, &channels);
                }
                // dropping the senders fails every waiting caller
                pending.lock().clear();
                warn!("Playwright bridge exited");
            });
        }

        Ok(Self {
            stdin: tokio::sync::Mutex::new(stdin),
            child: tokio::sync::Mutex::new(child),
            pending,
            channels,
            next_id: AtomicU64::new(1),
            command_timeout: config.command_timeout,
            _script_dir: script_dir,
        })
    }

    async fn call(&self, page: Option<&str>, op: &str, args: Value) -> E2eResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let mut line = serde_json::to_string(&json!({
            "id": id,
            "op": op,
            "page": page,
            "args": args,
        }))?;
        line.push('\n');

        {
            let mut stdin = self.stdin.lock().await;
            if let Err(e) = stdin.write_all(line.as_bytes()).await {
                self.pending.lock().remove(&id);
                return Err(E2eError::Playwright(format!("bridge write failed: {}", e)));
            }
            stdin.flush().await?;
        }

        match tokio::time::timeout(self.command_timeout, rx).await {
            Ok(Ok(reply)) => reply.into_result(op),
            Ok(Err(_)) => Err(E2eError::Playwright(format!("bridge closed during {}", op))),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(E2eError::Timeout(format!("bridge command {}", op)))
            }
        }
    }

    async fn stop(&self) -> E2eResult<()> {
        let _ = tokio::time::timeout(Duration::from_secs(5), self.call(None, "shutdown", json!({}))).await;

        let mut child = self.child.lock().await;
        if let Ok(Ok(_)) = tokio::time::timeout(Duration::from_secs(2), child.wait()).await {
            return Ok(());
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                    && tokio::time::timeout(Duration::from_millis(500), child.wait()).await.is_ok()
                {
                    return Ok(());
                }
            }
        }

        // Force kill if still running
        let _ = child.kill().await;
        Ok(())
    }
}

/// Dispatch one bridge stdout line to its waiting caller or event channel
fn route_line(line: &str, pending: &Pending, channels: &Channels) {
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(_) => {
            debug!(target: "playwright", "{}", line);
            return;
        }
    };

    if let Some(kind) = value.get("event").and_then(Value::as_str) {
        let page = value.get("page").and_then(Value::as_str).unwrap_or_default();
        let data = value.get("data").cloned().unwrap_or(Value::Null);
        if let Some(event) = parse_event(kind, &data) {
            if let Some(tx) = channels.lock().get(page) {
                // no subscribers is fine
                let _ = tx.send(event);
            }
        }
        return;
    }

    if let Some(id) = value.get("id").and_then(Value::as_u64) {
        match serde_json::from_value::<BridgeReply>(value) {
            Ok(reply) => {
                if let Some(tx) = pending.lock().remove(&id) {
                    let _ = tx.send(reply);
                }
            }
            Err(e) => warn!("Malformed bridge reply {}: {}", id, e),
        }
    }
}

/// Turn a bridge event payload into a [`PageEvent`], stamped on arrival
pub(crate) fn parse_event(kind: &str, data: &Value) -> Option<PageEvent> {
    let text = |key: &str| data.get(key).and_then(Value::as_str).map(String::from);
    let timestamp = Utc::now();

    match kind {
        "console" => Some(PageEvent::Console(ConsoleMessage {
            level: ConsoleLevel::from_browser(data.get("level").and_then(Value::as_str).unwrap_or("log")),
            text: text("text").unwrap_or_default(),
            location: text("location"),
            timestamp,
        })),
        "page_error" => Some(PageEvent::PageError(PageErrorEvent {
            message: text("message").unwrap_or_default(),
            stack: text("stack"),
            timestamp,
        })),
        "response" => Some(PageEvent::Response(ResponseEvent {
            url: text("url").unwrap_or_default(),
            method: text("method").unwrap_or_else(|| "GET".to_string()),
            status: data.get("status").and_then(Value::as_u64).unwrap_or(0) as u16,
            body: text("body"),
            timestamp,
        })),
        _ => None,
    }
}

/// Playwright browser handle; one per worker process
pub struct PlaywrightDriver {
    config: PlaywrightConfig,
    bridge: Arc<Bridge>,
}

impl PlaywrightDriver {
    /// Spawn the bridge and launch the configured browser
    pub async fn launch(config: PlaywrightConfig) -> E2eResult<Self> {
        check_playwright_installed()?;

        let bridge = Arc::new(Bridge::spawn(&config).await?);
        bridge
            .call(
                None,
                "launch",
                json!({
                    "browser": config.browser.as_str(),
                    "headless": config.headless,
                    "action_timeout_ms": config.action_timeout.as_millis() as u64,
                }),
            )
            .await?;

        info!("Launched {} (headless: {})", config.browser.as_str(), config.headless);
        Ok(Self { config, bridge })
    }

    pub async fn shutdown(&self) -> E2eResult<()> {
        info!("Stopping Playwright bridge");
        self.bridge.stop().await
    }
}

#[async_trait]
impl PageFactory for PlaywrightDriver {
    async fn new_page(&self) -> E2eResult<Arc<dyn Page>> {
        let id = self
            .bridge
            .call(
                None,
                "new_page",
                json!({
                    "width": self.config.viewport_width,
                    "height": self.config.viewport_height,
                    "base_url": self.config.base_url,
                }),
            )
            .await?
            .as_str()
            .map(String::from)
            .ok_or_else(|| E2eError::Playwright("new_page returned no id".into()))?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        self.bridge.channels.lock().insert(id.clone(), events.clone());

        Ok(Arc::new(PlaywrightPage {
            id,
            bridge: self.bridge.clone(),
            events,
        }))
    }
}

/// A page living in its own browser context
pub struct PlaywrightPage {
    id: String,
    bridge: Arc<Bridge>,
    events: broadcast::Sender<PageEvent>,
}

impl PlaywrightPage {
    async fn call(&self, op: &str, args: Value) -> E2eResult<Value> {
        self.bridge.call(Some(&self.id), op, args).await
    }

    async fn call_on(&self, op: &str, locator: &Locator, mut extra: Value) -> E2eResult<Value> {
        if let Value::Object(map) = &mut extra {
            map.insert("locator".to_string(), serde_json::to_value(locator)?);
        }
        self.call(op, extra).await
    }
}

#[async_trait]
impl Page for PlaywrightPage {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.call("goto", json!({ "url": url })).await.map(drop)
    }

    async fn reload(&self) -> E2eResult<()> {
        self.call("reload", json!({})).await.map(drop)
    }

    async fn url(&self) -> E2eResult<String> {
        Ok(self.call("url", json!({})).await?.as_str().unwrap_or_default().to_string())
    }

    async fn title(&self) -> E2eResult<String> {
        Ok(self.call("title", json!({})).await?.as_str().unwrap_or_default().to_string())
    }

    async fn wait_for_load(&self) -> E2eResult<()> {
        self.call("wait_for_load", json!({})).await.map(drop)
    }

    async fn click(&self, locator: &Locator) -> E2eResult<()> {
        self.call_on("click", locator, json!({})).await.map(drop)
    }

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.call_on("fill", locator, json!({ "value": value })).await.map(drop)
    }

    async fn press(&self, locator: &Locator, key: &str) -> E2eResult<()> {
        self.call_on("press", locator, json!({ "key": key })).await.map(drop)
    }

    async fn select_option(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.call_on("select_option", locator, json!({ "value": value })).await.map(drop)
    }

    async fn check(&self, locator: &Locator) -> E2eResult<()> {
        self.call_on("check", locator, json!({})).await.map(drop)
    }

    async fn hover(&self, locator: &Locator) -> E2eResult<()> {
        self.call_on("hover", locator, json!({})).await.map(drop)
    }

    async fn text_content(&self, locator: &Locator) -> E2eResult<Option<String>> {
        Ok(self.call_on("text_content", locator, json!({})).await?.as_str().map(String::from))
    }

    async fn inner_texts(&self, locator: &Locator) -> E2eResult<Vec<String>> {
        Ok(serde_json::from_value(self.call_on("inner_texts", locator, json!({})).await?)?)
    }

    async fn input_value(&self, locator: &Locator) -> E2eResult<String> {
        Ok(self.call_on("input_value", locator, json!({})).await?.as_str().unwrap_or_default().to_string())
    }

    async fn get_attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>> {
        Ok(self
            .call_on("get_attribute", locator, json!({ "name": name }))
            .await?
            .as_str()
            .map(String::from))
    }

    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool> {
        Ok(self.call_on("is_visible", locator, json!({})).await?.as_bool().unwrap_or(false))
    }

    async fn count(&self, locator: &Locator) -> E2eResult<usize> {
        Ok(self.call_on("count", locator, json!({})).await?.as_u64().unwrap_or(0) as usize)
    }

    async fn wait_for(&self, locator: &Locator, state: WaitState, timeout: Duration) -> E2eResult<()> {
        self.call_on(
            "wait_for",
            locator,
            json!({ "state": state.as_str(), "timeout_ms": timeout.as_millis() as u64 }),
        )
        .await
        .map(drop)
    }

    async fn screenshot(&self, path: &Path, full_page: bool) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.call(
            "screenshot",
            json!({ "path": path.to_string_lossy(), "full_page": full_page }),
        )
        .await
        .map(drop)
    }

    async fn evaluate(&self, script: &str, arg: Value) -> E2eResult<Value> {
        self.call("evaluate", json!({ "script": script, "arg": arg })).await
    }

    async fn route(&self, pattern: &str, response: MockResponse) -> E2eResult<()> {
        self.call(
            "route",
            json!({
                "pattern": pattern,
                "status": response.status,
                "content_type": response.content_type,
                "body": response.body,
            }),
        )
        .await
        .map(drop)
    }

    async fn unroute(&self, pattern: &str) -> E2eResult<()> {
        self.call("unroute", json!({ "pattern": pattern })).await.map(drop)
    }

    async fn request(&self, request: HttpRequest) -> E2eResult<HttpReply> {
        let reply = self.call("request", serde_json::to_value(&request)?).await?;
        Ok(serde_json::from_value(reply)?)
    }

    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    /// Events precede the reply on the bridge's stdout, so they are
    /// broadcast before this returns.
    async fn settle(&self) -> E2eResult<()> {
        self.call("settle", json!({ "page_id": self.id })).await.map(drop)
    }

    async fn close(&self) -> E2eResult<()> {
        let result = self.call("close_page", json!({ "page_id": self.id })).await;
        self.bridge.channels.lock().remove(&self.id);
        result.map(drop)
    }
}

/// Check if Playwright is installed
pub fn check_playwright_installed() -> E2eResult<()> {
    let output = Command::new("npx")
        .args(["playwright", "--version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match output {
        Ok(status) if status.success() => Ok(()),
        _ => Err(E2eError::PlaywrightNotFound),
    }
}
