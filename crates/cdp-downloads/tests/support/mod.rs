//! In-memory DevTools transport for exercising download sessions without a browser.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use cdp_adapter::{
    AdapterError, AdapterErrorKind, Anchor, BrowserEngine, CdpTransport, CommandTarget, DevTools,
    ElementSource, TransportEvent,
};
use cdp_downloads::{DownloadConfig, DownloadSession, FsRelocator, StaticDownloadsFolder};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;

#[derive(Clone, Debug)]
pub struct SentCommand {
    pub target: CommandTarget,
    pub method: String,
    pub params: Value,
}

pub struct ScriptedTransport {
    events: tokio::sync::Mutex<mpsc::UnboundedReceiver<TransportEvent>>,
    sent: Mutex<Vec<SentCommand>>,
}

impl ScriptedTransport {
    pub fn new() -> (Arc<Self>, EventFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            events: tokio::sync::Mutex::new(rx),
            sent: Mutex::new(Vec::new()),
        });
        (transport, EventFeed { tx })
    }

    pub fn sent(&self) -> Vec<SentCommand> {
        self.sent.lock().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.sent.lock().iter().map(|c| c.method.clone()).collect()
    }
}

#[async_trait]
impl CdpTransport for ScriptedTransport {
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
        params: Value,
    ) -> Result<Value, AdapterError> {
        self.sent.lock().push(SentCommand {
            target,
            method: method.to_string(),
            params,
        });
        Ok(match method {
            "Target.getTargets" => json!({ "targetInfos": [
                { "targetId": "T-1", "type": "page", "url": "https://files.example/" }
            ]}),
            "Target.attachToTarget" => json!({ "sessionId": "S-1" }),
            _ => json!({}),
        })
    }
}

/// Pushes download events into the scripted transport.
#[derive(Clone)]
pub struct EventFeed {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl EventFeed {
    fn push(&self, method: &str, params: Value) {
        let _ = self.tx.send(TransportEvent {
            method: method.to_string(),
            params,
            session_id: None,
        });
    }

    pub fn will_begin(&self, guid: &str, file_name: &str) {
        self.push(
            "Browser.downloadWillBegin",
            json!({
                "frameId": "F-1",
                "guid": guid,
                "url": format!("https://files.example/{file_name}"),
                "suggestedFilename": file_name,
            }),
        );
    }

    pub fn progress(&self, guid: &str, state: &str, received: f64, total: f64) {
        self.push(
            "Browser.downloadProgress",
            json!({
                "guid": guid,
                "totalBytes": total,
                "receivedBytes": received,
                "state": state,
            }),
        );
    }

    pub fn in_progress(&self, guid: &str) {
        self.progress(guid, "inProgress", 10.0, 100.0);
    }

    pub fn completed(&self, guid: &str) {
        self.progress(guid, "completed", 100.0, 100.0);
    }

    pub fn canceled(&self, guid: &str) {
        self.progress(guid, "canceled", 10.0, 100.0);
    }
}

/// Element that always resolves to the same point.
pub struct FixedElement;

#[async_trait]
impl ElementSource for FixedElement {
    async fn resolve(&self, _devtools: &DevTools) -> Result<Anchor, AdapterError> {
        Ok(Anchor {
            backend_node_id: None,
            x: 10.0,
            y: 20.0,
        })
    }

    fn description(&self) -> String {
        "#download".to_string()
    }
}

/// Element lookup that never succeeds.
pub struct MissingElement;

#[async_trait]
impl ElementSource for MissingElement {
    async fn resolve(&self, _devtools: &DevTools) -> Result<Anchor, AdapterError> {
        Err(AdapterError::new(AdapterErrorKind::TargetNotFound).with_hint("element '#nope' not found"))
    }

    fn description(&self) -> String {
        "#nope".to_string()
    }
}

pub struct Harness {
    pub transport: Arc<ScriptedTransport>,
    pub feed: EventFeed,
    pub session: DownloadSession,
    pub downloads: PathBuf,
    pub reports: PathBuf,
    _root: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_engine(BrowserEngine::Chromium)
    }

    pub fn with_engine(engine: BrowserEngine) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let downloads = root.path().join("downloads");
        let reports = root.path().join("reports");
        std::fs::create_dir_all(&downloads).expect("downloads dir");
        Self::build(engine, StaticDownloadsFolder::new(&downloads), root, downloads, reports)
    }

    pub fn without_folder() -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let downloads = root.path().join("downloads");
        let reports = root.path().join("reports");
        Self::build(
            BrowserEngine::Chromium,
            StaticDownloadsFolder::unconfigured(),
            root,
            downloads,
            reports,
        )
    }

    fn build(
        engine: BrowserEngine,
        folders: StaticDownloadsFolder,
        root: TempDir,
        downloads: PathBuf,
        reports: PathBuf,
    ) -> Self {
        let (transport, feed) = ScriptedTransport::new();
        let devtools = Arc::new(DevTools::new(transport.clone(), engine));
        let config = DownloadConfig {
            downloads_folder: Some(downloads.clone()),
            reports_folder: reports.clone(),
            polling_interval_ms: 100,
            ..DownloadConfig::default()
        };
        let session = DownloadSession::new(
            devtools,
            Arc::new(folders),
            Arc::new(FsRelocator::new(&reports)),
            config,
        );
        Self {
            transport,
            feed,
            session,
            downloads,
            reports,
            _root: root,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.session.devtools().listener_count()
    }
}

pub fn write_file(folder: &Path, name: &str, body: &str) {
    std::fs::write(folder.join(name), body).expect("write download");
}
