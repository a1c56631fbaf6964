use std::collections::HashMap;
use std::convert::TryInto;
use std::fs;
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
use tracing::{debug, error, info, warn};

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::util::extract_ws_url;

/// Raw protocol event as delivered by the browser.
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

    /// Whether this transport can reach a real browser at all.
    fn is_live(&self) -> bool {
        true
    }
}

/// Transport used when no browser is available.
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
        Err(AdapterError::new(AdapterErrorKind::NoSession)
            .with_hint(format!("no browser behind transport for {method}")))
    }

    fn is_live(&self) -> bool {
        false
    }
}

type LinkFactory =
    Arc<dyn Fn(CdpConfig) -> BoxFuture<'static, Result<Arc<Link>, AdapterError>> + Send + Sync>;

/// Transport speaking to a real Chromium, either launched locally or reached through
/// `websocket_url`. The connection is established lazily and re-established when it dies.
#[derive(Clone)]
pub struct ChromiumTransport {
    cfg: CdpConfig,
    link: Arc<OnceCell<Mutex<Option<Arc<Link>>>>>,
    factory: LinkFactory,
}

impl ChromiumTransport {
    pub fn new(cfg: CdpConfig) -> Self {
        let factory: LinkFactory = Arc::new(|cfg: CdpConfig| {
            Box::pin(async move { Ok(Arc::new(Link::open(cfg).await?)) })
        });
        Self {
            cfg,
            link: Arc::new(OnceCell::new()),
            factory,
        }
    }

    fn deadline(&self) -> Duration {
        Duration::from_millis(self.cfg.default_deadline_ms)
    }

    async fn link(&self) -> Result<Arc<Link>, AdapterError> {
        let cell = self.link.get_or_init(|| async { Mutex::new(None) }).await;
        let mut guard = cell.lock().await;

        if let Some(link) = guard.as_ref().filter(|link| link.is_alive()) {
            return Ok(link.clone());
        }

        let link = (self.factory)(self.cfg.clone()).await?;
        *guard = Some(link.clone());
        Ok(link)
    }

    #[cfg(test)]
    fn with_factory(cfg: CdpConfig, factory: LinkFactory) -> Self {
        Self {
            cfg,
            link: Arc::new(OnceCell::new()),
            factory,
        }
    }
}

#[async_trait]
impl CdpTransport for ChromiumTransport {
    async fn start(&self) -> Result<(), AdapterError> {
        let link = self.link().await?;
        link.call(
            CommandTarget::Browser,
            "Target.setDiscoverTargets",
            json!({ "discover": true }),
            self.deadline(),
        )
        .await?;
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        match self.link().await {
            Ok(link) => link.next_event().await,
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
        let link = self.link().await?;
        link.call(target, method, params, self.deadline()).await
    }
}

type Responder = oneshot::Sender<Result<Value, AdapterError>>;

struct Outgoing {
    target: CommandTarget,
    method: String,
    params: Value,
    responder: Responder,
}

/// One live websocket connection plus the task pumping it.
struct Link {
    outgoing: mpsc::Sender<Outgoing>,
    events: Mutex<mpsc::Receiver<TransportEvent>>,
    pump: JoinHandle<()>,
    child: Mutex<Option<Child>>,
    alive: Arc<AtomicBool>,
}

impl Link {
    async fn open(cfg: CdpConfig) -> Result<Self, AdapterError> {
        let (child, ws_url) = match cfg.websocket_url.clone() {
            Some(url) => (None, url),
            None => {
                let launched = Self::launch(&cfg).await?;
                (Some(launched.0), launched.1)
            }
        };

        let conn = Connection::<CdpEventMessage>::connect(&ws_url)
            .await
            .map_err(|err| AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string()))?;

        let (outgoing, outgoing_rx) = mpsc::channel(128);
        let (events_tx, events_rx) = mpsc::channel(512);
        let alive = Arc::new(AtomicBool::new(true));
        let pump_alive = alive.clone();

        let pump = tokio::spawn(async move {
            let result = Self::pump(conn, outgoing_rx, events_tx).await;
            pump_alive.store(false, Ordering::Relaxed);
            if let Err(err) = result {
                error!(target: "cdp-transport", ?err, "connection pump stopped with error");
            }
        });

        info!(target: "cdp-transport", url = %ws_url, "connected to chromium");

        Ok(Self {
            outgoing,
            events: Mutex::new(events_rx),
            pump,
            child: Mutex::new(child),
            alive,
        })
    }

    #[cfg(test)]
    fn detached() -> (Arc<Self>, Arc<AtomicBool>) {
        let (outgoing, _outgoing_rx) = mpsc::channel(8);
        let (_events_tx, events_rx) = mpsc::channel(8);
        let alive = Arc::new(AtomicBool::new(true));
        let pump = tokio::spawn(futures::future::pending::<()>());
        (
            Arc::new(Self {
                outgoing,
                events: Mutex::new(events_rx),
                pump,
                child: Mutex::new(None),
                alive: alive.clone(),
            }),
            alive,
        )
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
        self.outgoing
            .send(Outgoing {
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
                .with_hint(format!("{method}: response channel dropped"))),
            Err(_) => Err(AdapterError::new(AdapterErrorKind::NavTimeout)
                .with_hint(format!("{method}: no response within {}ms", deadline.as_millis()))
                .retriable(true)),
        }
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        self.events.lock().await.recv().await
    }

    async fn launch(cfg: &CdpConfig) -> Result<(Child, String), AdapterError> {
        let browser_cfg = Self::browser_config(cfg)?;
        let mut child = browser_cfg.launch().map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("failed to launch chromium: {err}"))
        })?;
        let ws_url = extract_ws_url(&mut child, Duration::from_millis(cfg.launch_timeout_ms))
            .await
            .map_err(|err| AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string()))?;
        Ok((child, ws_url))
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
                    "hint": "Set CDP_DOWNLOAD_CHROME to the full path of chrome/chromium."
                })));
        }

        let profile_dir = if cfg.user_data_dir.is_absolute() {
            cfg.user_data_dir.clone()
        } else {
            std::env::current_dir()
                .map_err(|err| {
                    AdapterError::new(AdapterErrorKind::Internal)
                        .with_hint(format!("cannot resolve cwd for user-data-dir: {err}"))
                })?
                .join(&cfg.user_data_dir)
        };
        fs::create_dir_all(&profile_dir).map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("cannot create user-data-dir: {err}"))
        })?;

        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_millis(cfg.default_deadline_ms))
            .launch_timeout(Duration::from_millis(cfg.launch_timeout_ms));
        if !cfg.headless {
            builder = builder.with_head();
        }

        let mut args = vec![
            "--disable-background-networking",
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
        ];
        if cfg.headless {
            args.push("--headless=new");
        }
        builder = builder.args(args);

        if !cfg.executable.as_os_str().is_empty() {
            builder = builder.chrome_executable(cfg.executable.clone());
        }

        builder.user_data_dir(profile_dir).build().map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("browser config error: {err}"))
        })
    }

    async fn pump(
        mut conn: Connection<CdpEventMessage>,
        mut outgoing: mpsc::Receiver<Outgoing>,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), AdapterError> {
        let mut inflight: HashMap<CallId, Responder> = HashMap::new();

        loop {
            tokio::select! {
                Some(cmd) = outgoing.recv() => {
                    Self::submit(&mut conn, cmd, &mut inflight)?;
                }
                message = conn.next() => match message {
                    Some(Ok(Message::Response(resp))) => {
                        if let Some(responder) = inflight.remove(&resp.id) {
                            let _ = responder.send(Self::payload(resp));
                        }
                    }
                    Some(Ok(Message::Event(event))) => {
                        if let Err(err) = Self::forward(event, &events).await {
                            warn!(target: "cdp-transport", ?err, "dropping undeliverable event");
                        }
                    }
                    Some(Err(err)) => {
                        let err = Self::map_cdp_error(err);
                        for (_, responder) in inflight.drain() {
                            let _ = responder.send(Err(err.clone()));
                        }
                        return Err(err);
                    }
                    None => {
                        let err = AdapterError::new(AdapterErrorKind::CdpIo)
                            .with_hint("cdp connection closed");
                        for (_, responder) in inflight.drain() {
                            let _ = responder.send(Err(err.clone()));
                        }
                        return Ok(());
                    }
                }
            }
        }
    }

    fn submit(
        conn: &mut Connection<CdpEventMessage>,
        cmd: Outgoing,
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

    async fn forward(
        event: CdpEventMessage,
        events: &mpsc::Sender<TransportEvent>,
    ) -> Result<(), AdapterError> {
        let raw: CdpJsonEventMessage = event.try_into().map_err(|err| {
            AdapterError::new(AdapterErrorKind::Protocol)
                .with_hint(format!("undecodable cdp event: {err}"))
        })?;
        events
            .send(TransportEvent {
                method: raw.method.into_owned(),
                params: raw.params,
                session_id: raw.session_id,
            })
            .await
            .map_err(|err| AdapterError::new(AdapterErrorKind::Internal).with_hint(err.to_string()))
    }

    fn payload(resp: Response) -> Result<Value, AdapterError> {
        match (resp.result, resp.error) {
            (Some(result), _) => Ok(result),
            (None, Some(error)) => Err(AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!("cdp error {}: {}", error.code, error.message))
                .retriable(error.code >= 500)),
            (None, None) => {
                Err(AdapterError::new(AdapterErrorKind::Protocol).with_hint("empty cdp response"))
            }
        }
    }

    fn map_cdp_error(err: CdpError) -> AdapterError {
        let hint = err.to_string();
        match err {
            CdpError::Timeout => AdapterError::new(AdapterErrorKind::NavTimeout)
                .with_hint(hint)
                .retriable(true),
            CdpError::Serde(_) | CdpError::DecodeError(_) => {
                AdapterError::new(AdapterErrorKind::Protocol).with_hint(hint)
            }
            _ => AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(hint)
                .retriable(true),
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
        self.pump.abort();

        let Ok(mut guard) = self.child.try_lock() else {
            return;
        };
        let Some(mut child) = guard.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = child.kill().await {
                        warn!(target: "cdp-transport", ?err, "failed to kill chromium child");
                    }
                });
            }
            Err(_) => debug!(target: "cdp-transport", "no runtime left to reap chromium child"),
        }
    }
}
