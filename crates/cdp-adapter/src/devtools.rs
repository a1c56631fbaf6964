//! DevTools session: command routing plus event fan-out to registered listeners.
//!
//! One dispatcher task per session pulls events off the transport and hands each one to every
//! listener registered for its method. Listeners run inline on that task, so they must not
//! block. Errors they return are logged and counted, never dropped silently.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex as SyncMutex, RwLock};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::commands::{AttachToTarget, Command, CreateTarget, GetTargets, Scope, TargetInfo};
use crate::config::BrowserEngine;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::events::ProtocolEvent;
use crate::metrics;
use crate::transport::{CdpTransport, CommandTarget, TransportEvent};

pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Callback invoked for every decoded event of type `E`.
pub trait Listener<E: ProtocolEvent>: fmt::Display + Send + Sync + 'static {
    fn accept(&self, event: E) -> Result<(), ListenerError>;
}

type Handler = Box<dyn Fn(&TransportEvent) -> Result<(), ListenerError> + Send + Sync>;

struct Registered {
    method: &'static str,
    label: String,
    handler: Handler,
}

pub struct DevTools {
    transport: Arc<dyn CdpTransport>,
    engine: BrowserEngine,
    session: Mutex<Option<String>>,
    listeners: Arc<RwLock<Vec<Registered>>>,
    dispatcher: SyncMutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl DevTools {
    pub fn new(transport: Arc<dyn CdpTransport>, engine: BrowserEngine) -> Self {
        Self {
            transport,
            engine,
            session: Mutex::new(None),
            listeners: Arc::new(RwLock::new(Vec::new())),
            dispatcher: SyncMutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    /// Session bound to a page the caller already attached to.
    pub fn attached(
        transport: Arc<dyn CdpTransport>,
        engine: BrowserEngine,
        session_id: impl Into<String>,
    ) -> Self {
        let mut devtools = Self::new(transport, engine);
        *devtools.session.get_mut() = Some(session_id.into());
        devtools
    }

    pub fn engine(&self) -> BrowserEngine {
        self.engine
    }

    pub async fn session_id(&self) -> Option<String> {
        self.session.lock().await.clone()
    }

    /// Validate the engine, attach to a page if not attached yet and start event dispatch.
    pub async fn open_session(&self) -> Result<String, AdapterError> {
        if !self.engine.supports_devtools() {
            return Err(AdapterError::new(AdapterErrorKind::Unsupported).with_hint(format!(
                "the browser you selected \"{}\" doesn't have Chrome DevTools protocol functionality",
                self.engine
            )));
        }
        if !self.transport.is_live() {
            return Err(AdapterError::new(AdapterErrorKind::NoSession)
                .with_hint("transport is not connected to a browser"));
        }

        let session = {
            let mut guard = self.session.lock().await;
            match guard.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    self.transport.start().await?;
                    let created = self.attach_to_page().await?;
                    info!(target: "cdp-adapter", session = %created, "devtools session created");
                    *guard = Some(created.clone());
                    created
                }
            }
        };

        self.ensure_dispatcher();
        Ok(session)
    }

    async fn attach_to_page(&self) -> Result<String, AdapterError> {
        let targets = self
            .call(CommandTarget::Browser, GetTargets::METHOD, json!({}))
            .await?;
        let infos: Vec<TargetInfo> = match targets.get("targetInfos") {
            Some(list) => serde_json::from_value(list.clone()).map_err(AdapterError::protocol)?,
            None => Vec::new(),
        };

        let target_id = match infos.into_iter().find(|info| info.target_type == "page") {
            Some(info) => info.target_id,
            None => {
                let params = serde_json::to_value(CreateTarget {
                    url: "about:blank".to_string(),
                })
                .map_err(AdapterError::protocol)?;
                let created = self
                    .call(CommandTarget::Browser, CreateTarget::METHOD, params)
                    .await?;
                string_field(&created, "targetId")?
            }
        };

        let params = serde_json::to_value(AttachToTarget {
            target_id,
            flatten: true,
        })
        .map_err(AdapterError::protocol)?;
        let attached = self
            .call(CommandTarget::Browser, AttachToTarget::METHOD, params)
            .await?;
        string_field(&attached, "sessionId")
    }

    pub async fn send<C: Command>(&self, command: &C) -> Result<Value, AdapterError> {
        let target = match C::SCOPE {
            Scope::Browser => CommandTarget::Browser,
            Scope::Page => {
                let session = self.session.lock().await.clone().ok_or_else(|| {
                    AdapterError::new(AdapterErrorKind::NoSession)
                        .with_hint(format!("{} needs an attached page session", C::METHOD))
                })?;
                CommandTarget::Session(session)
            }
        };
        let params = serde_json::to_value(command).map_err(AdapterError::protocol)?;
        self.call(target, C::METHOD, params).await
    }

    async fn call(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let started = Instant::now();
        let result = self.transport.send_command(target, method, params).await;
        metrics::record_command(method, started.elapsed(), result.is_ok());
        if let Err(err) = &result {
            debug!(target: "cdp-adapter", method, %err, "command failed");
        }
        result
    }

    pub fn add_listener<E, L>(&self, listener: L)
    where
        E: ProtocolEvent,
        L: Listener<E>,
    {
        let label = listener.to_string();
        debug!(target: "cdp-adapter", listener = %label, method = E::METHOD, "add devtools listener");
        let handler: Handler = Box::new(move |event| {
            let decoded = E::decode(event)?;
            listener.accept(decoded)
        });
        self.listeners.write().push(Registered {
            method: E::METHOD,
            label,
            handler,
        });
    }

    pub fn clear_listeners(&self) {
        let mut guard = self.listeners.write();
        if !guard.is_empty() {
            debug!(target: "cdp-adapter", count = guard.len(), "clear devtools listeners");
        }
        guard.clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Hand one event to the matching listeners on the current thread.
    pub fn deliver(&self, event: &TransportEvent) {
        dispatch(&self.listeners, event);
    }

    fn ensure_dispatcher(&self) {
        let mut guard = self.dispatcher.lock();
        if guard.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let transport = Arc::clone(&self.transport);
        let listeners = Arc::clone(&self.listeners);
        let shutdown = self.shutdown.clone();
        *guard = Some(tokio::spawn(dispatch_loop(transport, listeners, shutdown)));
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(handle) = self.dispatcher.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for DevTools {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn dispatch_loop(
    transport: Arc<dyn CdpTransport>,
    listeners: Arc<RwLock<Vec<Registered>>>,
    shutdown: CancellationToken,
) {
    debug!(target: "cdp-adapter", "event dispatcher started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = transport.next_event() => match event {
                Some(event) => dispatch(&listeners, &event),
                None => {
                    debug!(target: "cdp-adapter", "event stream ended");
                    break;
                }
            }
        }
    }
    debug!(target: "cdp-adapter", "event dispatcher exiting");
}

fn dispatch(listeners: &RwLock<Vec<Registered>>, event: &TransportEvent) {
    metrics::record_event();
    let guard = listeners.read();
    for registered in guard.iter().filter(|l| l.method == event.method) {
        if let Err(err) = (registered.handler)(event) {
            metrics::record_listener_failure(registered.method);
            warn!(
                target: "cdp-adapter",
                listener = %registered.label,
                method = registered.method,
                error = %err,
                "listener raised"
            );
        }
    }
}

fn string_field(value: &Value, field: &str) -> Result<String, AdapterError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::Protocol).with_hint(format!("response missing '{field}'"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::PageEnable;
    use crate::events::DownloadWillBegin;
    use crate::transport::NoopTransport;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct ChannelTransport {
        events: Mutex<mpsc::UnboundedReceiver<TransportEvent>>,
        sent: SyncMutex<Vec<(CommandTarget, String)>>,
    }

    impl ChannelTransport {
        fn new() -> (Arc<Self>, mpsc::UnboundedSender<TransportEvent>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let transport = Arc::new(Self {
                events: Mutex::new(rx),
                sent: SyncMutex::new(Vec::new()),
            });
            (transport, tx)
        }
    }

    #[async_trait]
    impl CdpTransport for ChannelTransport {
        async fn start(&self) -> Result<(), AdapterError> {
            Ok(())
        }

        async fn next_event(&self) -> Option<TransportEvent> {
            self.events.lock().await.recv().await
        }

        async fn send_command(
            &self,
            target: CommandTarget,
            method: &str,
            _params: Value,
        ) -> Result<Value, AdapterError> {
            self.sent.lock().push((target, method.to_string()));
            Ok(match method {
                "Target.getTargets" => json!({ "targetInfos": [
                    { "targetId": "T-worker", "type": "service_worker", "url": "" },
                    { "targetId": "T-page", "type": "page", "url": "about:blank" }
                ]}),
                "Target.attachToTarget" => json!({ "sessionId": "S-1" }),
                _ => json!({}),
            })
        }
    }

    struct Counting(Arc<AtomicUsize>);

    impl fmt::Display for Counting {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("Counting")
        }
    }

    impl Listener<DownloadWillBegin> for Counting {
        fn accept(&self, _event: DownloadWillBegin) -> Result<(), ListenerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn will_begin(guid: &str) -> TransportEvent {
        TransportEvent {
            method: "Browser.downloadWillBegin".to_string(),
            params: json!({
                "frameId": "F", "guid": guid, "url": "https://x/y", "suggestedFilename": "y"
            }),
            session_id: None,
        }
    }

    #[tokio::test]
    async fn attaches_to_first_page_target() {
        let (transport, _tx) = ChannelTransport::new();
        let devtools = DevTools::new(transport.clone(), BrowserEngine::Chromium);
        let session = devtools.open_session().await.unwrap();
        assert_eq!(session, "S-1");

        devtools.send(&PageEnable::default()).await.unwrap();
        let sent = transport.sent.lock().clone();
        assert_eq!(
            sent.last(),
            Some(&(CommandTarget::Session("S-1".to_string()), "Page.enable".to_string()))
        );
    }

    #[tokio::test]
    async fn rejects_engines_without_devtools() {
        let (transport, _tx) = ChannelTransport::new();
        let devtools = DevTools::new(transport, BrowserEngine::Firefox);
        let err = devtools.open_session().await.unwrap_err();
        assert!(err.is(AdapterErrorKind::Unsupported));
        assert!(err.to_string().contains("firefox"));
    }

    #[tokio::test]
    async fn rejects_transport_without_browser() {
        let devtools = DevTools::new(Arc::new(NoopTransport), BrowserEngine::Chromium);
        let err = devtools.open_session().await.unwrap_err();
        assert!(err.is(AdapterErrorKind::NoSession));
    }

    #[tokio::test]
    async fn page_commands_need_a_session() {
        let (transport, _tx) = ChannelTransport::new();
        let devtools = DevTools::new(transport, BrowserEngine::Chromium);
        let err = devtools.send(&PageEnable::default()).await.unwrap_err();
        assert!(err.is(AdapterErrorKind::NoSession));
    }

    #[tokio::test]
    async fn dispatches_until_listeners_cleared() {
        let (transport, tx) = ChannelTransport::new();
        let devtools = DevTools::new(transport, BrowserEngine::Chromium);
        devtools.open_session().await.unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        devtools.add_listener::<DownloadWillBegin, _>(Counting(seen.clone()));
        assert_eq!(devtools.listener_count(), 1);

        tx.send(will_begin("g1")).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        devtools.clear_listeners();
        assert_eq!(devtools.listener_count(), 0);
        tx.send(will_begin("g2")).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn undecodable_payload_counts_as_listener_failure() {
        let (transport, _tx) = ChannelTransport::new();
        let devtools = DevTools::new(transport, BrowserEngine::Chromium);
        let seen = Arc::new(AtomicUsize::new(0));
        devtools.add_listener::<DownloadWillBegin, _>(Counting(seen.clone()));

        let before = metrics::snapshot().listener_failures;
        devtools.deliver(&TransportEvent {
            method: "Browser.downloadWillBegin".to_string(),
            params: json!({ "guid": 42 }),
            session_id: None,
        });
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert!(metrics::snapshot().listener_failures > before);
    }
}
