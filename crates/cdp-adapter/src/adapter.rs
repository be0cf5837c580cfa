//! The adapter proper: target bookkeeping, the event loop, and page-level operations.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use dashmap::DashMap;
use mapsync_core_types::{Key, Locator, Point};
use request_tap::{RequestSubscription, RequestTap, ResponseRewrite, RewriteTable, UrlPattern};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex};
use tokio::task::{spawn, JoinHandle};
use tokio::time::{sleep, Instant};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::dom::{decode_snapshot, resolver_expression, ElementSnapshot};
use crate::error::{AdapterError, AdapterErrorKind};
use crate::events::RawEvent;
use crate::ids::{BrowserId, PageId};
use crate::metrics;
use crate::registry::Registry;
use crate::transport::{ChromiumTransport, CdpTransport, CommandTarget, NoopTransport, TransportEvent};
use crate::{chrome_mode, resolve_chrome_path, AdapterMode, EventBus};

const POLL: Duration = Duration::from_millis(50);
const ATTACH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct CdpAdapter {
    pub browser_id: BrowserId,
    pub cfg: CdpConfig,
    pub bus: EventBus,
    registry: Arc<Registry>,
    mode: AdapterMode,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    transport: Arc<dyn CdpTransport>,
    tap: Arc<RequestTap>,
    rewrites: DashMap<PageId, Arc<RewriteTable>>,
}

impl CdpAdapter {
    /// Picks a transport from configuration and environment. Falls back to a browserless stub
    /// unless `MAPSYNC_USE_REAL_CHROME` demands a real browser.
    pub fn new(mut cfg: CdpConfig, bus: EventBus) -> Result<Self, AdapterError> {
        let forced = chrome_mode();
        let detected = resolve_chrome_path(&cfg);
        let attach = cfg.websocket_url.is_some();

        let use_real = match forced {
            Some(false) => false,
            Some(true) | None if attach => true,
            Some(true) => {
                let path = detected.ok_or_else(|| {
                    AdapterError::new(AdapterErrorKind::CdpIo)
                        .with_hint("MAPSYNC_USE_REAL_CHROME is set but no chrome executable was found")
                })?;
                cfg.executable = path;
                true
            }
            None => match detected {
                Some(path) => {
                    cfg.executable = path;
                    true
                }
                None => false,
            },
        };

        let (transport, mode) = if use_real {
            info!(target: "cdp-adapter", attach, "using chromium transport");
            (
                Arc::new(ChromiumTransport::new(cfg.clone())) as Arc<dyn CdpTransport>,
                AdapterMode::Real,
            )
        } else {
            warn!(
                target: "cdp-adapter",
                mode = AdapterMode::Stub.as_str(),
                remediation = "install chrome/chromium or set MAPSYNC_CHROME / MAPSYNC_WS_URL",
                "no browser available; element queries and input will fail"
            );
            (Arc::new(NoopTransport) as Arc<dyn CdpTransport>, AdapterMode::Stub)
        };
        let mut adapter = Self::with_transport(cfg, bus, transport);
        adapter.mode = mode;
        Ok(adapter)
    }

    pub fn with_transport(cfg: CdpConfig, bus: EventBus, transport: Arc<dyn CdpTransport>) -> Self {
        Self {
            browser_id: BrowserId::new(),
            cfg,
            bus,
            registry: Arc::new(Registry::new()),
            mode: AdapterMode::Real,
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            transport,
            tap: Arc::new(RequestTap::new()),
            rewrites: DashMap::new(),
        }
    }

    pub fn mode(&self) -> AdapterMode {
        self.mode
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn request_tap(&self) -> Arc<RequestTap> {
        Arc::clone(&self.tap)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RawEvent> {
        self.bus.subscribe()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Starts the transport and the event loop. Calling it twice is harmless.
    pub async fn start(self: Arc<Self>) -> Result<(), AdapterError> {
        if !self.tasks.lock().await.is_empty() {
            return Ok(());
        }
        self.transport.start().await?;
        let event_loop = spawn(Self::event_loop(Arc::clone(&self)));
        self.tasks.lock().await.push(event_loop);
        info!(target: "cdp-adapter", browser = %self.browser_id.0, "event loop started");
        if self.cfg.websocket_url.is_none() && self.mode == AdapterMode::Real {
            self.ensure_initial_page().await?;
        }
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let mut handles = self.tasks.lock().await;
        while let Some(handle) = handles.pop() {
            let _ = handle.await;
        }
    }

    pub fn register_page(&self, page: PageId, target_id: Option<String>, cdp_session: Option<String>) {
        self.registry.insert_page(page, target_id, cdp_session);
        self.tap.enable(page.into());
    }

    pub async fn create_page(&self, url: &str) -> Result<PageId, AdapterError> {
        let response = self
            .send_command("Target.createTarget", json!({ "url": url }))
            .await?;
        let target_id = response
            .get("targetId")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::internal("createTarget response missing targetId"))?
            .to_string();

        let deadline = Instant::now() + ATTACH_TIMEOUT;
        loop {
            let attached = self
                .registry
                .page_for_target(&target_id)
                .filter(|page| self.registry.cdp_session(page).is_some());
            if let Some(page) = attached {
                return Ok(page);
            }
            if Instant::now() >= deadline {
                return Err(AdapterError::internal(format!(
                    "timed out waiting for target {target_id} to attach"
                )));
            }
            sleep(POLL).await;
        }
    }

    /// First page with a live CDP session, waiting up to `timeout` for one to attach.
    pub async fn attached_page(&self, timeout: Duration) -> Result<PageId, AdapterError> {
        let deadline = Instant::now() + timeout;
        loop {
            let ready = self
                .registry
                .pages()
                .into_iter()
                .find(|page| self.registry.cdp_session(page).is_some());
            if let Some(page) = ready {
                return Ok(page);
            }
            if Instant::now() >= deadline {
                return Err(AdapterError::new(AdapterErrorKind::TargetNotFound)
                    .with_hint("no page attached"));
            }
            sleep(POLL).await;
        }
    }

    async fn ensure_initial_page(&self) -> Result<(), AdapterError> {
        if self.registry.pages().iter().any(|page| self.registry.cdp_session(page).is_some()) {
            return Ok(());
        }
        self.send_command("Target.createTarget", json!({ "url": "about:blank" }))
            .await
            .map(|_| ())
    }

    async fn event_loop(self: Arc<Self>) {
        const MIN_BACKOFF: Duration = Duration::from_millis(100);
        const MAX_BACKOFF: Duration = Duration::from_secs(5);
        let mut backoff = MIN_BACKOFF;

        loop {
            select! {
                _ = self.shutdown.cancelled() => break,
                event = self.transport.next_event() => match event {
                    Some(event) => {
                        backoff = MIN_BACKOFF;
                        if let Err(err) = self.process_event(event).await {
                            let _ = self.bus.send(RawEvent::Error {
                                page: None,
                                message: format!("cdp event handling error: {err}"),
                            });
                        }
                    }
                    None => {
                        if self.shutdown.is_cancelled() {
                            break;
                        }
                        self.handle_transport_disconnect();
                        if let Err(err) = self.transport.start().await {
                            warn!(target: "cdp-adapter", ?err, "transport restart failed");
                        }
                        sleep(backoff).await;
                        backoff = (backoff + MIN_BACKOFF).min(MAX_BACKOFF);
                    }
                }
            }
        }
        debug!(target: "cdp-adapter", "event loop exiting");
    }

    fn handle_transport_disconnect(&self) {
        let pages = self.registry.pages();
        warn!(target: "cdp-adapter", pages = pages.len(), "transport stream ended; resetting pages");
        for page in pages {
            self.forget_page(page);
        }
        let _ = self.bus.send(RawEvent::Error {
            page: None,
            message: "cdp transport restarted".to_string(),
        });
    }

    fn forget_page(&self, page: PageId) {
        self.registry.remove_page(&page);
        self.rewrites.remove(&page);
        let _ = self.tap.disable(page.into());
        self.emit_lifecycle(page, "closed", timestamp_now());
    }

    async fn process_event(&self, event: TransportEvent) -> Result<(), AdapterError> {
        metrics::record_event();
        match event.method.as_str() {
            "Target.targetCreated" => self.on_target_created(event.params),
            "Target.targetDestroyed" => self.on_target_destroyed(event.params),
            "Target.attachedToTarget" => self.on_target_attached(event.params).await,
            "Page.lifecycleEvent" => self.on_page_lifecycle(event),
            "Page.frameNavigated" => self.on_frame_navigated(event),
            "Network.requestWillBeSent" => self.on_request(event),
            "Fetch.requestPaused" => self.on_request_paused(event).await,
            other => {
                debug!(target: "cdp-adapter", method = other, "unhandled cdp event");
                Ok(())
            }
        }
    }

    fn on_target_created(&self, params: Value) -> Result<(), AdapterError> {
        let payload: TargetEnvelope = decode(params)?;
        if payload.target_info.target_type != "page" {
            return Ok(());
        }
        let page = PageId::new();
        self.register_page(page, Some(payload.target_info.target_id), None);
        if let Some(url) = payload.target_info.url.filter(|url| !url.is_empty()) {
            self.registry.set_recent_url(&page, url);
        }
        self.emit_lifecycle(page, "opened", timestamp_now());
        Ok(())
    }

    fn on_target_destroyed(&self, params: Value) -> Result<(), AdapterError> {
        let payload: TargetDestroyed = decode(params)?;
        if let Some(page) = self.registry.page_for_target(&payload.target_id) {
            self.forget_page(page);
        }
        Ok(())
    }

    async fn on_target_attached(&self, params: Value) -> Result<(), AdapterError> {
        let payload: AttachedToTarget = decode(params)?;
        if payload.target_info.target_type != "page" {
            return Ok(());
        }
        let Some(page) = self.registry.page_for_target(&payload.target_info.target_id) else {
            return Ok(());
        };
        self.registry.set_cdp_session(&page, payload.session_id);
        self.prepare_page(page).await?;
        self.emit_lifecycle(page, "attached", timestamp_now());
        Ok(())
    }

    fn on_page_lifecycle(&self, event: TransportEvent) -> Result<(), AdapterError> {
        let payload: Lifecycle = decode(event.params)?;
        if let Some(page) = self.page_from_session(event.session_id.as_deref()) {
            let ts = payload
                .timestamp
                .map(|secs| (secs * 1_000.0) as u64)
                .unwrap_or_else(timestamp_now);
            self.emit_lifecycle(page, &payload.name.to_ascii_lowercase(), ts);
        }
        Ok(())
    }

    fn on_frame_navigated(&self, event: TransportEvent) -> Result<(), AdapterError> {
        let payload: FrameNavigated = decode(event.params)?;
        if payload.frame.parent_id.is_some() {
            return Ok(());
        }
        if let Some(page) = self.page_from_session(event.session_id.as_deref()) {
            self.registry.set_recent_url(&page, payload.frame.url.clone());
            let _ = self.bus.send(RawEvent::PageNavigated {
                page,
                url: payload.frame.url,
                ts: timestamp_now(),
            });
        }
        Ok(())
    }

    fn on_request(&self, event: TransportEvent) -> Result<(), AdapterError> {
        let payload: RequestWillBeSent = decode(event.params)?;
        let Some(page) = self.page_from_session(event.session_id.as_deref()) else {
            return Ok(());
        };
        metrics::record_request();
        self.tap
            .record(page.into(), &payload.request.url, &payload.request.method);
        Ok(())
    }

    async fn on_request_paused(&self, event: TransportEvent) -> Result<(), AdapterError> {
        let payload: RequestPaused = decode(event.params)?;
        let Some(page) = self.page_from_session(event.session_id.as_deref()) else {
            return Ok(());
        };
        let rule = self
            .rewrites
            .get(&page)
            .and_then(|table| table.find(&payload.request.url));

        let fulfilled = match (rule, payload.response_status_code) {
            (Some(rule), Some(status)) => self.fulfill_rewritten(page, &payload, &rule, status).await,
            _ => Ok(false),
        };
        match fulfilled {
            Ok(true) => Ok(()),
            Ok(false) => self.continue_request(page, &payload.request_id).await,
            Err(err) => {
                warn!(target: "cdp-adapter", url = %payload.request.url, ?err, "response rewrite failed; passing through");
                self.continue_request(page, &payload.request_id).await
            }
        }
    }

    async fn fulfill_rewritten(
        &self,
        page: PageId,
        paused: &RequestPaused,
        rule: &ResponseRewrite,
        status: u16,
    ) -> Result<bool, AdapterError> {
        let body: ResponseBody = decode(
            self.send_page_command(
                page,
                "Fetch.getResponseBody",
                json!({ "requestId": paused.request_id }),
            )
            .await?,
        )?;
        let raw = if body.base64_encoded {
            BASE64
                .decode(body.body.as_bytes())
                .map_err(|err| AdapterError::internal(format!("bad response body encoding: {err}")))?
        } else {
            body.body.into_bytes()
        };
        let rewritten = rule
            .apply(&raw)
            .map_err(|err| AdapterError::internal(err.to_string()))?;

        let headers: Vec<&Header> = paused
            .response_headers
            .iter()
            .filter(|header| !header.name.eq_ignore_ascii_case("content-length"))
            .collect();
        self.send_page_command(
            page,
            "Fetch.fulfillRequest",
            json!({
                "requestId": paused.request_id,
                "responseCode": status,
                "responseHeaders": headers,
                "body": BASE64.encode(rewritten),
            }),
        )
        .await?;

        metrics::record_rewrite();
        info!(target: "cdp-adapter", url = %paused.request.url, pattern = %rule.pattern, "response rewritten");
        let _ = self.bus.send(RawEvent::ResponseRewritten {
            page,
            url: paused.request.url.clone(),
        });
        Ok(true)
    }

    async fn continue_request(&self, page: PageId, request_id: &str) -> Result<(), AdapterError> {
        self.send_page_command(page, "Fetch.continueRequest", json!({ "requestId": request_id }))
            .await
            .map(|_| ())
    }

    fn page_from_session(&self, session: Option<&str>) -> Option<PageId> {
        session.and_then(|sid| self.registry.page_for_session(sid))
    }

    fn emit_lifecycle(&self, page: PageId, phase: &str, ts: u64) {
        let _ = self.bus.send(RawEvent::PageLifecycle {
            page,
            phase: phase.to_string(),
            ts,
        });
    }

    async fn prepare_page(&self, page: PageId) -> Result<(), AdapterError> {
        for method in ["Page.enable", "Network.enable", "Runtime.enable"] {
            self.send_page_command(page, method, json!({})).await?;
        }
        self.send_page_command(
            page,
            "Page.setLifecycleEventsEnabled",
            json!({ "enabled": true }),
        )
        .await?;
        Ok(())
    }

    async fn send_command(&self, method: &str, params: Value) -> Result<Value, AdapterError> {
        self.dispatch(CommandTarget::Browser, method, params).await
    }

    async fn send_page_command(
        &self,
        page: PageId,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let session = self.registry.cdp_session(&page).ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::TargetNotFound)
                .with_hint(format!("no cdp session for page {}", page.0))
        })?;
        self.dispatch(CommandTarget::Session(session), method, params)
            .await
    }

    async fn dispatch(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let start = Instant::now();
        let result = self.transport.send_command(target, method, params).await;
        metrics::record_command(method, start.elapsed(), result.is_ok());
        result
    }

    // ---- request stream & response rewriting -------------------------------------------------

    pub fn subscribe_requests(
        &self,
        page: PageId,
        pattern: UrlPattern,
    ) -> Result<RequestSubscription, AdapterError> {
        self.tap.subscribe(page.into(), pattern).map_err(|err| {
            AdapterError::new(AdapterErrorKind::TargetNotFound).with_hint(err.to_string())
        })
    }

    pub async fn add_rewrite(&self, page: PageId, rule: ResponseRewrite) -> Result<(), AdapterError> {
        self.rewrites.entry(page).or_default().push(rule);
        self.sync_interception(page).await
    }

    pub async fn clear_rewrites(&self, page: PageId) -> Result<(), AdapterError> {
        if let Some(table) = self.rewrites.get(&page) {
            table.clear();
        }
        self.sync_interception(page).await
    }

    async fn sync_interception(&self, page: PageId) -> Result<(), AdapterError> {
        let patterns: Vec<Value> = self
            .rewrites
            .get(&page)
            .map(|table| table.patterns())
            .unwrap_or_default()
            .iter()
            .map(|pattern| {
                json!({ "urlPattern": pattern.interception_glob(), "requestStage": "Response" })
            })
            .collect();
        let intercepting = self
            .registry
            .get(&page)
            .map(|ctx| ctx.intercepting)
            .unwrap_or(false);

        if patterns.is_empty() {
            if intercepting {
                self.send_page_command(page, "Fetch.disable", json!({})).await?;
                self.registry.set_intercepting(&page, false);
            }
            return Ok(());
        }
        self.send_page_command(page, "Fetch.enable", json!({ "patterns": patterns }))
            .await?;
        self.registry.set_intercepting(&page, true);
        Ok(())
    }

    // ---- page operations ----------------------------------------------------------------------

    /// Navigates and waits until the document is at least interactive.
    pub async fn navigate(&self, page: PageId, url: &str, deadline: Duration) -> Result<(), AdapterError> {
        let response = self
            .send_page_command(page, "Page.navigate", json!({ "url": url }))
            .await?;
        if let Some(error) = response.get("errorText").and_then(Value::as_str) {
            return Err(AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!("navigation to {url} failed: {error}")));
        }
        self.registry.set_recent_url(&page, url.to_string());
        self.wait_for_dom_ready(page, Instant::now() + deadline).await
    }

    async fn wait_for_dom_ready(&self, page: PageId, deadline: Instant) -> Result<(), AdapterError> {
        loop {
            let state = self.evaluate(page, "document.readyState").await?;
            if matches!(state.as_str(), Some("interactive" | "complete")) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AdapterError::new(AdapterErrorKind::NavTimeout)
                    .with_hint("document never became ready")
                    .retriable(true));
            }
            sleep(Duration::from_millis(100)).await;
        }
    }

    /// Evaluates `expression` in the page and returns its value.
    pub async fn evaluate(&self, page: PageId, expression: &str) -> Result<Value, AdapterError> {
        let response = self
            .send_page_command(
                page,
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        if let Some(details) = response.get("exceptionDetails") {
            let text = details
                .pointer("/exception/description")
                .or_else(|| details.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("script exception");
            return Err(AdapterError::internal(text.to_string()).with_data(details.clone()));
        }
        Ok(response
            .pointer("/result/value")
            .cloned()
            .unwrap_or(Value::Null))
    }

    pub async fn probe_element(
        &self,
        page: PageId,
        target: &Locator,
        attribute: Option<&str>,
        scroll: bool,
    ) -> Result<ElementSnapshot, AdapterError> {
        target.validate().map_err(|err| {
            AdapterError::new(AdapterErrorKind::InvalidSelector).with_hint(format!("{target}: {err}"))
        })?;
        let value = self
            .evaluate(page, &resolver_expression(target, attribute, scroll))
            .await?;
        decode_snapshot(target, value)
    }

    pub async fn current_url(&self, page: PageId) -> Result<String, AdapterError> {
        match self.evaluate(page, "location.href").await? {
            Value::String(url) => Ok(url),
            other => Err(AdapterError::internal(format!("location.href returned {other}"))),
        }
    }

    async fn actionable_center(&self, page: PageId, target: &Locator) -> Result<Point, AdapterError> {
        let snapshot = self.probe_element(page, target, None, true).await?;
        match snapshot.center {
            Some(center) if snapshot.visible => Ok(center),
            _ => Err(AdapterError::new(AdapterErrorKind::TargetNotFound).with_hint(format!(
                "{target} not actionable ({} matches, visible: {})",
                snapshot.count, snapshot.visible
            ))),
        }
    }

    pub async fn click(&self, page: PageId, target: &Locator) -> Result<(), AdapterError> {
        let at = self.actionable_center(page, target).await?;
        self.move_pointer(page, at).await?;
        for phase in ["mousePressed", "mouseReleased"] {
            self.dispatch_mouse(
                page,
                json!({
                    "type": phase,
                    "x": at.x,
                    "y": at.y,
                    "button": "left",
                    "buttons": 1,
                    "clickCount": 1,
                    "pointerType": "mouse",
                }),
            )
            .await?;
        }
        Ok(())
    }

    pub async fn hover(&self, page: PageId, target: &Locator) -> Result<(), AdapterError> {
        let at = self.actionable_center(page, target).await?;
        self.move_pointer(page, at).await
    }

    pub async fn move_pointer(&self, page: PageId, to: Point) -> Result<(), AdapterError> {
        self.dispatch_mouse(
            page,
            json!({ "type": "mouseMoved", "x": to.x, "y": to.y, "pointerType": "mouse" }),
        )
        .await
    }

    pub async fn press_key(&self, page: PageId, key: Key) -> Result<(), AdapterError> {
        for phase in ["keyDown", "keyUp"] {
            self.send_page_command(
                page,
                "Input.dispatchKeyEvent",
                json!({
                    "type": phase,
                    "key": key.dom_key(),
                    "code": key.dom_key(),
                    "windowsVirtualKeyCode": key.key_code(),
                }),
            )
            .await?;
        }
        Ok(())
    }

    async fn dispatch_mouse(&self, page: PageId, payload: Value) -> Result<(), AdapterError> {
        self.send_page_command(page, "Input.dispatchMouseEvent", payload)
            .await
            .map(|_| ())
    }
}

fn decode<T: for<'de> Deserialize<'de>>(params: Value) -> Result<T, AdapterError> {
    serde_json::from_value(params).map_err(|err| AdapterError::internal(err.to_string()))
}

fn timestamp_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetInfo {
    target_id: String,
    #[serde(rename = "type")]
    target_type: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetEnvelope {
    target_info: TargetInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetDestroyed {
    target_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachedToTarget {
    session_id: String,
    target_info: TargetInfo,
}

#[derive(Debug, Deserialize)]
struct Lifecycle {
    name: String,
    #[serde(default)]
    timestamp: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Frame {
    url: String,
    #[serde(default)]
    parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FrameNavigated {
    frame: Frame,
}

#[derive(Debug, Deserialize)]
struct RequestInfo {
    url: String,
    #[serde(default = "default_method")]
    method: String,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Deserialize)]
struct RequestWillBeSent {
    request: RequestInfo,
}

#[derive(Debug, Deserialize, serde::Serialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestPaused {
    request_id: String,
    request: RequestInfo,
    #[serde(default)]
    response_status_code: Option<u16>,
    #[serde(default)]
    response_headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseBody {
    body: String,
    #[serde(default)]
    base64_encoded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    struct MockTransport {
        starts: AtomicUsize,
        drop_first_stream: bool,
        polls: AtomicUsize,
        rx: Mutex<mpsc::Receiver<TransportEvent>>,
        commands: Mutex<Vec<(CommandTarget, String, Value)>>,
        responses: Mutex<HashMap<String, VecDeque<Value>>>,
    }

    impl MockTransport {
        fn new_pair() -> (Arc<Self>, mpsc::Sender<TransportEvent>) {
            Self::build(false)
        }

        fn build(drop_first_stream: bool) -> (Arc<Self>, mpsc::Sender<TransportEvent>) {
            let (tx, rx) = mpsc::channel(16);
            let transport = Self {
                starts: AtomicUsize::new(0),
                drop_first_stream,
                polls: AtomicUsize::new(0),
                rx: Mutex::new(rx),
                commands: Mutex::new(Vec::new()),
                responses: Mutex::new(HashMap::new()),
            };
            (Arc::new(transport), tx)
        }

        async fn respond(&self, method: &str, value: Value) {
            self.responses
                .lock()
                .await
                .entry(method.to_string())
                .or_default()
                .push_back(value);
        }

        async fn sent(&self, method: &str) -> Vec<Value> {
            self.commands
                .lock()
                .await
                .iter()
                .filter(|(_, name, _)| name == method)
                .map(|(_, _, params)| params.clone())
                .collect()
        }

        async fn methods(&self) -> Vec<String> {
            self.commands
                .lock()
                .await
                .iter()
                .map(|(_, name, _)| name.clone())
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl CdpTransport for MockTransport {
        async fn start(&self) -> Result<(), AdapterError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn next_event(&self) -> Option<TransportEvent> {
            if self.drop_first_stream && self.polls.fetch_add(1, Ordering::SeqCst) == 0 {
                return None;
            }
            self.rx.lock().await.recv().await
        }

        async fn send_command(
            &self,
            target: CommandTarget,
            method: &str,
            params: Value,
        ) -> Result<Value, AdapterError> {
            self.commands
                .lock()
                .await
                .push((target, method.to_string(), params));
            Ok(self
                .responses
                .lock()
                .await
                .get_mut(method)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Value::Null))
        }
    }

    fn event(method: &str, session: Option<&str>, params: Value) -> TransportEvent {
        TransportEvent {
            method: method.to_string(),
            params,
            session_id: session.map(str::to_string),
        }
    }

    async fn started() -> (Arc<CdpAdapter>, Arc<MockTransport>, mpsc::Sender<TransportEvent>) {
        let (bus, _rx) = crate::event_bus(32);
        let (transport, tx) = MockTransport::new_pair();
        let mut cfg = CdpConfig::default();
        cfg.websocket_url = Some("ws://mock".into());
        let adapter = Arc::new(CdpAdapter::with_transport(
            cfg,
            bus,
            transport.clone() as Arc<dyn CdpTransport>,
        ));
        Arc::clone(&adapter).start().await.expect("start");
        (adapter, transport, tx)
    }

    async fn attach(adapter: &CdpAdapter, tx: &mpsc::Sender<TransportEvent>) -> PageId {
        let info = json!({ "targetId": "T1", "type": "page", "url": "about:blank" });
        tx.send(event("Target.targetCreated", None, json!({ "targetInfo": info.clone() })))
            .await
            .unwrap();
        tx.send(event(
            "Target.attachedToTarget",
            None,
            json!({ "sessionId": "S1", "targetInfo": info }),
        ))
        .await
        .unwrap();
        adapter
            .attached_page(Duration::from_secs(1))
            .await
            .expect("page attaches")
    }

    #[tokio::test]
    async fn attaching_a_target_prepares_the_page() {
        let (adapter, transport, tx) = started().await;
        let page = attach(&adapter, &tx).await;

        assert_eq!(adapter.registry().cdp_session(&page).as_deref(), Some("S1"));
        assert!(adapter.request_tap().is_enabled(page.into()));
        timeout(Duration::from_secs(1), async {
            while !transport.methods().await.contains(&"Page.setLifecycleEventsEnabled".to_string()) {
                sleep(POLL).await;
            }
        })
        .await
        .expect("page prepared");
        let methods = transport.methods().await;
        assert!(methods.contains(&"Network.enable".to_string()));
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn ignores_unknown_events() {
        let (adapter, _transport, tx) = started().await;
        tx.send(event("Custom.event", None, json!({}))).await.unwrap();
        sleep(Duration::from_millis(100)).await;
        assert!(adapter.registry().is_empty());
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn outbound_requests_reach_the_tap() {
        let (adapter, _transport, tx) = started().await;
        let page = attach(&adapter, &tx).await;
        let mut sub = adapter
            .subscribe_requests(page, UrlPattern::contains("/api/layers"))
            .unwrap();

        for url in ["https://maps.test/tiles/1.png", "https://maps.test/api/layers?x=1"] {
            tx.send(event(
                "Network.requestWillBeSent",
                Some("S1"),
                json!({ "requestId": "1", "request": { "url": url, "method": "GET" } }),
            ))
            .await
            .unwrap();
        }

        let seen = timeout(Duration::from_secs(1), sub.next())
            .await
            .expect("request forwarded")
            .expect("stream open");
        assert_eq!(seen.url, "https://maps.test/api/layers?x=1");
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn paused_responses_are_rewritten() {
        let (adapter, transport, tx) = started().await;
        let page = attach(&adapter, &tx).await;
        let rule = ResponseRewrite::remove_key(UrlPattern::glob("**/api/assets*").unwrap(), "schools");
        adapter.add_rewrite(page, rule).await.unwrap();

        let enabled = transport.sent("Fetch.enable").await;
        assert_eq!(enabled[0]["patterns"][0]["requestStage"], "Response");

        let body = json!({ "schools": [1, 2], "parks": [3] }).to_string();
        transport
            .respond(
                "Fetch.getResponseBody",
                json!({ "body": BASE64.encode(body), "base64Encoded": true }),
            )
            .await;
        tx.send(event(
            "Fetch.requestPaused",
            Some("S1"),
            json!({
                "requestId": "R9",
                "request": { "url": "https://maps.test/api/assets?bbox=1", "method": "GET" },
                "responseStatusCode": 200,
                "responseHeaders": [
                    { "name": "Content-Type", "value": "application/json" },
                    { "name": "Content-Length", "value": "31" }
                ]
            }),
        ))
        .await
        .unwrap();

        let fulfilled = timeout(Duration::from_secs(1), async {
            loop {
                if let Some(params) = transport.sent("Fetch.fulfillRequest").await.pop() {
                    return params;
                }
                sleep(POLL).await;
            }
        })
        .await
        .expect("request fulfilled");

        assert_eq!(fulfilled["requestId"], "R9");
        assert_eq!(fulfilled["responseCode"], 200);
        assert_eq!(fulfilled["responseHeaders"].as_array().unwrap().len(), 1);
        let sent = BASE64.decode(fulfilled["body"].as_str().unwrap()).unwrap();
        let sent: Value = serde_json::from_slice(&sent).unwrap();
        assert_eq!(sent, json!({ "parks": [3] }));
        assert!(transport.sent("Fetch.continueRequest").await.is_empty());

        adapter.clear_rewrites(page).await.unwrap();
        assert_eq!(transport.sent("Fetch.disable").await.len(), 1);
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn unmatched_paused_requests_continue() {
        let (adapter, transport, tx) = started().await;
        let _page = attach(&adapter, &tx).await;
        tx.send(event(
            "Fetch.requestPaused",
            Some("S1"),
            json!({
                "requestId": "R1",
                "request": { "url": "https://maps.test/api/other" },
                "responseStatusCode": 200
            }),
        ))
        .await
        .unwrap();

        timeout(Duration::from_secs(1), async {
            while transport.sent("Fetch.continueRequest").await.is_empty() {
                sleep(POLL).await;
            }
        })
        .await
        .expect("request continued");
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn click_presses_at_element_center() {
        let (adapter, transport, tx) = started().await;
        let page = attach(&adapter, &tx).await;
        transport
            .respond(
                "Runtime.evaluate",
                json!({ "result": { "value": { "count": 1, "visible": true, "text": "Zoom in", "x": 40.0, "y": 12.0 } } }),
            )
            .await;

        adapter
            .click(page, &Locator::css(r#"button[aria-label="Zoom in"]"#))
            .await
            .unwrap();

        let mouse = transport.sent("Input.dispatchMouseEvent").await;
        let phases: Vec<&str> = mouse.iter().map(|m| m["type"].as_str().unwrap()).collect();
        assert_eq!(phases, vec!["mouseMoved", "mousePressed", "mouseReleased"]);
        assert_eq!(mouse[1]["x"], 40.0);
        assert_eq!(mouse[1]["y"], 12.0);
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn hidden_elements_are_not_clicked() {
        let (adapter, transport, tx) = started().await;
        let page = attach(&adapter, &tx).await;
        transport
            .respond(
                "Runtime.evaluate",
                json!({ "result": { "value": { "count": 1, "visible": false, "x": 0.0, "y": 0.0 } } }),
            )
            .await;

        let err = adapter.click(page, &Locator::css("#menu")).await.unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::TargetNotFound);
        assert!(transport.sent("Input.dispatchMouseEvent").await.is_empty());
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn escape_is_sent_as_key_down_and_up() {
        let (adapter, transport, tx) = started().await;
        let page = attach(&adapter, &tx).await;
        adapter.press_key(page, Key::Escape).await.unwrap();

        let keys = transport.sent("Input.dispatchKeyEvent").await;
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0]["type"], "keyDown");
        assert_eq!(keys[1]["type"], "keyUp");
        assert_eq!(keys[0]["key"], "Escape");
        assert_eq!(keys[0]["windowsVirtualKeyCode"], 27);
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn script_exceptions_become_errors() {
        let (adapter, transport, tx) = started().await;
        let page = attach(&adapter, &tx).await;
        transport
            .respond(
                "Runtime.evaluate",
                json!({ "exceptionDetails": { "text": "Uncaught", "exception": { "description": "ReferenceError: nope" } } }),
            )
            .await;
        let err = adapter.evaluate(page, "nope").await.unwrap_err();
        assert_eq!(err.hint.as_deref(), Some("ReferenceError: nope"));
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn restarts_transport_when_stream_ends() {
        let (bus, mut rx) = crate::event_bus(8);
        let (transport, _tx) = MockTransport::build(true);
        let mut cfg = CdpConfig::default();
        cfg.websocket_url = Some("ws://mock".into());
        let adapter = Arc::new(CdpAdapter::with_transport(
            cfg,
            bus,
            transport.clone() as Arc<dyn CdpTransport>,
        ));
        Arc::clone(&adapter).start().await.unwrap();

        let notice = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("restart notice")
            .unwrap();
        assert!(matches!(notice, RawEvent::Error { page: None, .. }));
        timeout(Duration::from_secs(1), async {
            while transport.starts.load(Ordering::SeqCst) < 2 {
                sleep(POLL).await;
            }
        })
        .await
        .expect("transport restarted");
        adapter.shutdown().await;
    }
}
