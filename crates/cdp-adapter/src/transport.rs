use std::collections::HashMap;
use std::convert::TryInto;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::async_process::Child;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::target::SessionId as CdpSessionId;
use chromiumoxide::cdp::events::CdpEventMessage;
use chromiumoxide::conn::Connection;
use chromiumoxide::error::CdpError;
use chromiumoxide_types::{CallId, CdpJsonEventMessage, Message, MethodId, Response};
use futures::{future::BoxFuture, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::{flag_value, CdpConfig};
use crate::error::{AdapterError, AdapterErrorKind};
use crate::util::extract_ws_url;

/// Protocol event as delivered by the browser, before the adapter interprets it.
#[derive(Clone, Debug)]
pub struct TransportEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandTarget {
    Browser,
    Session(String),
}

#[async_trait]
pub trait CdpTransport: Send + Sync {
    async fn start(&self) -> Result<(), AdapterError>;
    async fn next_event(&self) -> Option<TransportEvent>;
    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError>;
}

/// Transport used when no browser is available. Every command fails.
#[derive(Default)]
pub struct NoopTransport;

#[async_trait]
impl CdpTransport for NoopTransport {
    async fn start(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        None
    }

    async fn send_command(
        &self,
        _target: CommandTarget,
        method: &str,
        _params: Value,
    ) -> Result<Value, AdapterError> {
        Err(AdapterError::internal(format!(
            "no browser attached, cannot send {method}"
        )))
    }
}

type Responder = oneshot::Sender<Result<Value, AdapterError>>;

type RuntimeFactory = Arc<
    dyn Fn(CdpConfig) -> BoxFuture<'static, Result<Arc<BrowserRuntime>, AdapterError>>
        + Send
        + Sync,
>;

/// Transport backed by a launched (or attached) Chromium instance.
///
/// The runtime is created lazily and recreated when its connection loop has died.
#[derive(Clone)]
pub struct ChromiumTransport {
    cfg: CdpConfig,
    state: Arc<OnceCell<Mutex<Option<Arc<BrowserRuntime>>>>>,
    factory: RuntimeFactory,
}

impl ChromiumTransport {
    pub fn new(cfg: CdpConfig) -> Self {
        let factory: RuntimeFactory = Arc::new(|cfg: CdpConfig| {
            Box::pin(async move { BrowserRuntime::start(cfg).await.map(Arc::new) })
        });
        Self::with_factory(cfg, factory)
    }

    fn with_factory(cfg: CdpConfig, factory: RuntimeFactory) -> Self {
        Self {
            cfg,
            state: Arc::new(OnceCell::new()),
            factory,
        }
    }

    fn deadline(&self) -> Duration {
        Duration::from_millis(self.cfg.default_deadline_ms)
    }

    async fn runtime(&self) -> Result<Arc<BrowserRuntime>, AdapterError> {
        let cell = self.state.get_or_init(|| async { Mutex::new(None) }).await;
        let mut guard = cell.lock().await;

        if let Some(rt) = guard.as_ref().filter(|rt| rt.is_alive()) {
            return Ok(rt.clone());
        }
        if guard.is_some() {
            warn!(target: "cdp-transport", "browser runtime died, relaunching");
        }

        let runtime = (self.factory)(self.cfg.clone()).await?;
        *guard = Some(runtime.clone());
        Ok(runtime)
    }
}

#[async_trait]
impl CdpTransport for ChromiumTransport {
    async fn start(&self) -> Result<(), AdapterError> {
        let runtime = self.runtime().await?;
        let deadline = self.deadline();

        runtime
            .call(
                CommandTarget::Browser,
                "Target.setDiscoverTargets",
                json!({ "discover": true }),
                deadline,
            )
            .await?;
        runtime
            .call(
                CommandTarget::Browser,
                "Target.setAutoAttach",
                json!({
                    "autoAttach": true,
                    "waitForDebuggerOnStart": false,
                    "flatten": true,
                }),
                deadline,
            )
            .await?;
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        match self.runtime().await {
            Ok(runtime) => runtime.next_event().await,
            Err(err) => {
                warn!(target: "cdp-transport", ?err, "transport not ready");
                None
            }
        }
    }

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let runtime = self.runtime().await?;
        runtime.call(target, method, params, self.deadline()).await
    }
}

struct PendingCommand {
    target: CommandTarget,
    method: String,
    params: Value,
    responder: Responder,
}

struct BrowserRuntime {
    command_tx: mpsc::Sender<PendingCommand>,
    events_rx: Mutex<mpsc::Receiver<TransportEvent>>,
    loop_task: JoinHandle<()>,
    heartbeat_task: Option<JoinHandle<()>>,
    child: Mutex<Option<Child>>,
    alive: Arc<AtomicBool>,
}

impl BrowserRuntime {
    async fn start(cfg: CdpConfig) -> Result<Self, AdapterError> {
        let (child, ws_url) = match cfg.websocket_url.clone() {
            Some(url) => (None, url),
            None => Self::launch_browser(Self::browser_config(&cfg)?).await?,
        };

        let conn = Connection::<CdpEventMessage>::connect(&ws_url)
            .await
            .map_err(|err| AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string()))?;

        let (command_tx, command_rx) = mpsc::channel(128);
        let (events_tx, events_rx) = mpsc::channel(1024);
        let alive = Arc::new(AtomicBool::new(true));

        let loop_alive = alive.clone();
        let loop_task = tokio::spawn(async move {
            let result = Self::run_loop(conn, command_rx, events_tx).await;
            loop_alive.store(false, Ordering::Relaxed);
            if let Err(err) = result {
                error!(target: "cdp-transport", ?err, "connection loop terminated");
            }
        });

        let heartbeat_task = Self::spawn_heartbeat(
            command_tx.clone(),
            alive.clone(),
            Duration::from_millis(cfg.heartbeat_interval_ms),
        );

        info!(target: "cdp-transport", url = %ws_url, "chromium connection established");

        Ok(Self {
            command_tx,
            events_rx: Mutex::new(events_rx),
            loop_task,
            heartbeat_task,
            child: Mutex::new(child),
            alive,
        })
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    async fn call(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<Value, AdapterError> {
        let (responder, response) = oneshot::channel();
        self.command_tx
            .send(PendingCommand {
                target,
                method: method.to_string(),
                params,
                responder,
            })
            .await
            .map_err(|err| AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string()))?;

        match tokio::time::timeout(deadline, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!("{method}: response channel closed"))),
            Err(_) => Err(AdapterError::new(AdapterErrorKind::NavTimeout)
                .with_hint(format!("{method} timed out"))
                .retriable(true)),
        }
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        self.events_rx.lock().await.recv().await
    }

    fn spawn_heartbeat(
        sender: mpsc::Sender<PendingCommand>,
        alive: Arc<AtomicBool>,
        every: Duration,
    ) -> Option<JoinHandle<()>> {
        if every.is_zero() {
            return None;
        }

        Some(tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // first tick fires immediately
            ticker.tick().await;

            while alive.load(Ordering::Relaxed) {
                ticker.tick().await;
                let (responder, response) = oneshot::channel();
                let ping = PendingCommand {
                    target: CommandTarget::Browser,
                    method: "Browser.getVersion".to_string(),
                    params: json!({}),
                    responder,
                };
                if sender.send(ping).await.is_err() {
                    debug!(target: "cdp-transport", "heartbeat channel closed");
                    break;
                }
                match tokio::time::timeout(Duration::from_secs(5), response).await {
                    Ok(Ok(Ok(_))) => {}
                    Ok(Ok(Err(err))) => {
                        warn!(target: "cdp-transport", ?err, "heartbeat failed");
                        break;
                    }
                    Ok(Err(_)) => break,
                    Err(_) => {
                        warn!(target: "cdp-transport", "heartbeat timed out");
                        break;
                    }
                }
            }
        }))
    }

    fn profile_dir(cfg: &CdpConfig) -> Result<PathBuf, AdapterError> {
        let dir = if cfg.user_data_dir.is_absolute() {
            cfg.user_data_dir.clone()
        } else {
            std::env::current_dir()
                .map_err(|err| AdapterError::internal(format!("cannot resolve cwd: {err}")))?
                .join(&cfg.user_data_dir)
        };
        fs::create_dir_all(&dir).map_err(|err| {
            AdapterError::internal(format!("cannot create profile {}: {err}", dir.display()))
        })?;
        Ok(dir)
    }

    fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
        if !cfg.executable.as_os_str().is_empty() && !cfg.executable.exists() {
            return Err(AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!(
                    "chrome executable not found at {}",
                    cfg.executable.display()
                ))
                .with_data(json!({
                    "expected": cfg.executable,
                    "hint": "Set MAPSYNC_CHROME to the full path of chrome/chromium."
                })));
        }

        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_millis(cfg.default_deadline_ms))
            .launch_timeout(Duration::from_secs(20))
            .user_data_dir(Self::profile_dir(cfg)?);

        if !cfg.headless {
            builder = builder.with_head();
        }

        let sandbox_off = cfg.no_sandbox
            || std::env::var("MAPSYNC_DISABLE_SANDBOX")
                .ok()
                .and_then(|value| flag_value(&value))
                .unwrap_or(false);
        if sandbox_off {
            builder = builder.no_sandbox();
        }

        let mut args = vec![
            "--disable-background-networking",
            "--disable-background-timer-throttling",
            "--disable-breakpad",
            "--disable-component-update",
            "--disable-default-apps",
            "--disable-dev-shm-usage",
            "--disable-extensions",
            "--disable-popup-blocking",
            "--disable-sync",
            "--no-first-run",
            "--no-default-browser-check",
            "--password-store=basic",
            "--remote-allow-origins=*",
            "--use-mock-keychain",
            // canvas map rendering
            "--use-gl=swiftshader",
            "--window-size=1920,1080",
        ];
        if cfg.headless {
            args.push("--headless=new");
            args.push("--hide-scrollbars");
            args.push("--mute-audio");
        }
        builder = builder.args(args);

        if !cfg.executable.as_os_str().is_empty() {
            builder = builder.chrome_executable(cfg.executable.clone());
        }

        builder
            .build()
            .map_err(|err| AdapterError::internal(format!("browser config error: {err}")))
    }

    async fn launch_browser(
        config: BrowserConfig,
    ) -> Result<(Option<Child>, String), AdapterError> {
        let mut child = config
            .launch()
            .map_err(|err| AdapterError::internal(format!("failed to launch chromium: {err}")))?;

        let ws_url = extract_ws_url(&mut child)
            .await
            .map_err(|err| AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string()))?;

        Ok((Some(child), ws_url))
    }

    async fn run_loop(
        mut conn: Connection<CdpEventMessage>,
        mut command_rx: mpsc::Receiver<PendingCommand>,
        events_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<(), AdapterError> {
        let mut inflight: HashMap<CallId, Responder> = HashMap::new();

        loop {
            tokio::select! {
                Some(cmd) = command_rx.recv() => {
                    Self::submit(&mut conn, cmd, &mut inflight)?;
                }
                message = conn.next() => match message {
                    Some(Ok(Message::Response(resp))) => {
                        if let Some(responder) = inflight.remove(&resp.id) {
                            let _ = responder.send(Self::extract_payload(resp));
                        }
                    }
                    Some(Ok(Message::Event(event))) => {
                        if let Err(err) = Self::forward_event(event, &events_tx).await {
                            warn!(target: "cdp-transport", ?err, "failed to forward event");
                        }
                    }
                    Some(Err(err)) => {
                        let err = Self::map_cdp_error(err);
                        Self::fail_all(&mut inflight, &err);
                        return Err(err);
                    }
                    None => {
                        let err = AdapterError::new(AdapterErrorKind::CdpIo)
                            .with_hint("cdp connection closed");
                        Self::fail_all(&mut inflight, &err);
                        return Ok(());
                    }
                }
            }
        }
    }

    fn fail_all(inflight: &mut HashMap<CallId, Responder>, err: &AdapterError) {
        for (_, responder) in inflight.drain() {
            let _ = responder.send(Err(err.clone()));
        }
    }

    fn submit(
        conn: &mut Connection<CdpEventMessage>,
        cmd: PendingCommand,
        inflight: &mut HashMap<CallId, Responder>,
    ) -> Result<(), AdapterError> {
        let session = match cmd.target {
            CommandTarget::Browser => None,
            CommandTarget::Session(id) => Some(CdpSessionId::from(id)),
        };
        let method: MethodId = cmd.method.into();
        match conn.submit_command(method, session, cmd.params) {
            Ok(call_id) => {
                inflight.insert(call_id, cmd.responder);
                Ok(())
            }
            Err(err) => {
                let err = AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string());
                let _ = cmd.responder.send(Err(err.clone()));
                Err(err)
            }
        }
    }

    async fn forward_event(
        event: CdpEventMessage,
        events_tx: &mpsc::Sender<TransportEvent>,
    ) -> Result<(), AdapterError> {
        let raw: CdpJsonEventMessage = event
            .try_into()
            .map_err(|err| AdapterError::internal(format!("failed to decode cdp event: {err}")))?;

        events_tx
            .send(TransportEvent {
                method: raw.method.into_owned(),
                params: raw.params,
                session_id: raw.session_id,
            })
            .await
            .map_err(|err| AdapterError::internal(err.to_string()))
    }

    fn extract_payload(resp: Response) -> Result<Value, AdapterError> {
        match (resp.result, resp.error) {
            (Some(result), _) => Ok(result),
            (None, Some(error)) => Err(AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!("cdp error {}: {}", error.code, error.message))
                .retriable(error.code >= 500)),
            (None, None) => Err(AdapterError::internal("empty cdp response")),
        }
    }

    fn map_cdp_error(err: CdpError) -> AdapterError {
        let hint = err.to_string();
        let kind = match err {
            CdpError::Timeout => AdapterErrorKind::NavTimeout,
            CdpError::Serde(_) | CdpError::JavascriptException(_) => {
                return AdapterError::internal(hint);
            }
            _ => AdapterErrorKind::CdpIo,
        };
        AdapterError::new(kind).with_hint(hint).retriable(true)
    }

    #[cfg(test)]
    fn idle() -> (Arc<Self>, Arc<AtomicBool>) {
        let (command_tx, _command_rx) = mpsc::channel(8);
        let (_events_tx, events_rx) = mpsc::channel(8);
        let alive = Arc::new(AtomicBool::new(true));
        let runtime = Self {
            command_tx,
            events_rx: Mutex::new(events_rx),
            loop_task: tokio::spawn(futures::future::pending::<()>()),
            heartbeat_task: None,
            child: Mutex::new(None),
            alive: alive.clone(),
        };
        (Arc::new(runtime), alive)
    }
}

impl Drop for BrowserRuntime {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
        self.loop_task.abort();
        if let Some(handle) = &self.heartbeat_task {
            handle.abort();
        }

        let Ok(mut guard) = self.child.try_lock() else {
            return;
        };
        if let Some(mut child) = guard.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(err) = child.kill().await {
                            warn!(target: "cdp-transport", ?err, "failed to kill chromium");
                        }
                    });
                }
                Err(_) => debug!(target: "cdp-transport", "no runtime to reap chromium child"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn relaunches_after_runtime_dies() {
        let launches = Arc::new(AtomicUsize::new(0));
        let flags: Arc<Mutex<Vec<Arc<AtomicBool>>>> = Arc::default();

        let factory: RuntimeFactory = {
            let launches = launches.clone();
            let flags = flags.clone();
            Arc::new(move |_cfg: CdpConfig| {
                let launches = launches.clone();
                let flags = flags.clone();
                Box::pin(async move {
                    launches.fetch_add(1, Ordering::SeqCst);
                    let (runtime, alive) = BrowserRuntime::idle();
                    flags.lock().await.push(alive);
                    Ok(runtime)
                })
            })
        };

        let transport = ChromiumTransport::with_factory(CdpConfig::default(), factory);
        let first = transport.runtime().await.expect("first runtime");
        let again = transport.runtime().await.expect("cached runtime");
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(launches.load(Ordering::SeqCst), 1);

        flags.lock().await[0].store(false, Ordering::SeqCst);
        let second = transport.runtime().await.expect("relaunched runtime");
        assert_eq!(launches.load(Ordering::SeqCst), 2);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn noop_transport_rejects_commands() {
        let err = NoopTransport
            .send_command(CommandTarget::Browser, "Page.navigate", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::Internal);
        assert!(err.hint.unwrap().contains("Page.navigate"));
    }
}
