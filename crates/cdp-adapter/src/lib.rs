//! Chromium DevTools Protocol plumbing for download coordination.
//!
//! The crate owns three layers: a [`CdpTransport`] that moves raw JSON messages to and from a
//! browser, a [`DevTools`] session that multiplexes protocol events onto registered listeners,
//! and typed [`events`] / [`commands`] for the slice of the protocol the download engine needs.

use std::{env, path::PathBuf};
use which::which;

pub mod error {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use thiserror::Error;

    /// High-level error categories surfaced by the adapter.
    #[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
    pub enum AdapterErrorKind {
        #[error("command timed out")]
        NavTimeout,
        #[error("cdp i/o failure")]
        CdpIo,
        #[error("devtools protocol unsupported")]
        Unsupported,
        #[error("no live devtools session")]
        NoSession,
        #[error("target element not found")]
        TargetNotFound,
        #[error("unexpected protocol payload")]
        Protocol,
        #[error("internal error")]
        Internal,
    }

    /// Enriched error metadata passed back to higher layers.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct AdapterError {
        pub kind: AdapterErrorKind,
        pub hint: Option<String>,
        pub retriable: bool,
        pub data: Option<serde_json::Value>,
    }

    impl fmt::Display for AdapterError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.kind)?;
            if let Some(hint) = &self.hint {
                write!(f, ": {}", hint)?;
            }
            Ok(())
        }
    }

    impl std::error::Error for AdapterError {}

    impl AdapterError {
        pub fn new(kind: AdapterErrorKind) -> Self {
            Self {
                kind,
                hint: None,
                retriable: false,
                data: None,
            }
        }

        pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
            self.hint = Some(hint.into());
            self
        }

        pub fn retriable(mut self, flag: bool) -> Self {
            self.retriable = flag;
            self
        }

        pub fn with_data(mut self, data: serde_json::Value) -> Self {
            self.data = Some(data);
            self
        }

        pub fn protocol(err: serde_json::Error) -> Self {
            Self::new(AdapterErrorKind::Protocol).with_hint(err.to_string())
        }

        pub fn is(&self, kind: AdapterErrorKind) -> bool {
            self.kind == kind
        }
    }
}

pub mod config {
    use crate::detect_chrome_executable;
    use serde::{Deserialize, Serialize};
    use std::{
        env, fmt,
        path::{Path, PathBuf},
    };

    /// Browser engine behind the transport. Only Chromium speaks the DevTools protocol.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum BrowserEngine {
        #[default]
        Chromium,
        Firefox,
        Webkit,
    }

    impl BrowserEngine {
        pub fn supports_devtools(&self) -> bool {
            matches!(self, BrowserEngine::Chromium)
        }

        pub fn as_str(&self) -> &'static str {
            match self {
                BrowserEngine::Chromium => "chromium",
                BrowserEngine::Firefox => "firefox",
                BrowserEngine::Webkit => "webkit",
            }
        }
    }

    impl fmt::Display for BrowserEngine {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    /// Configuration for launching or connecting to the browser.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct CdpConfig {
        pub engine: BrowserEngine,
        pub executable: PathBuf,
        pub user_data_dir: PathBuf,
        pub headless: bool,
        pub default_deadline_ms: u64,
        pub launch_timeout_ms: u64,
        pub websocket_url: Option<String>,
    }

    impl Default for CdpConfig {
        fn default() -> Self {
            Self {
                engine: BrowserEngine::Chromium,
                executable: default_chrome_path(),
                user_data_dir: default_profile_dir(),
                headless: resolve_headless_default(),
                default_deadline_ms: 30_000,
                launch_timeout_ms: 20_000,
                websocket_url: None,
            }
        }
    }

    fn resolve_headless_default() -> bool {
        // "0", "false", "no" and "off" mean headful
        match env::var("CDP_DOWNLOAD_HEADLESS") {
            Ok(value) => {
                let lower = value.to_ascii_lowercase();
                !matches!(lower.as_str(), "0" | "false" | "no" | "off")
            }
            Err(_) => true,
        }
    }

    fn default_chrome_path() -> PathBuf {
        detect_chrome_executable().unwrap_or_default()
    }

    fn default_profile_dir() -> PathBuf {
        if let Ok(path) = env::var("CDP_DOWNLOAD_CHROME_PROFILE") {
            return PathBuf::from(path);
        }
        Path::new("./.cdp-download-profile").into()
    }
}

pub mod events {
    use serde::{de::DeserializeOwned, Deserialize, Serialize};
    use std::fmt;

    use crate::error::AdapterError;
    use crate::transport::TransportEvent;

    /// A protocol event that can be decoded from a [`TransportEvent`].
    pub trait ProtocolEvent: DeserializeOwned + Send + 'static {
        const METHOD: &'static str;

        fn decode(event: &TransportEvent) -> Result<Self, AdapterError> {
            serde_json::from_value(event.params.clone()).map_err(AdapterError::protocol)
        }
    }

    /// `Browser.downloadWillBegin`: the browser picked a guid and a file name.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DownloadWillBegin {
        pub frame_id: String,
        pub guid: String,
        pub url: String,
        pub suggested_filename: String,
    }

    impl ProtocolEvent for DownloadWillBegin {
        const METHOD: &'static str = "Browser.downloadWillBegin";
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub enum DownloadState {
        InProgress,
        Completed,
        Canceled,
        #[serde(other)]
        Unknown,
    }

    impl fmt::Display for DownloadState {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let label = match self {
                DownloadState::InProgress => "inProgress",
                DownloadState::Completed => "completed",
                DownloadState::Canceled => "canceled",
                DownloadState::Unknown => "unknown",
            };
            f.write_str(label)
        }
    }

    /// `Browser.downloadProgress`. Byte counters are doubles on the wire.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DownloadProgress {
        pub guid: String,
        #[serde(default)]
        pub total_bytes: f64,
        #[serde(default)]
        pub received_bytes: f64,
        pub state: DownloadState,
    }

    impl ProtocolEvent for DownloadProgress {
        const METHOD: &'static str = "Browser.downloadProgress";
    }
}

fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("CDP_DOWNLOAD_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    let skip_defaults = env::var("CDP_DOWNLOAD_SKIP_OS_PATHS")
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false);
    if skip_defaults {
        return None;
    }

    os_specific_chrome_paths()
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}

fn os_specific_chrome_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/chromium"),
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "freebsd")))]
    {
        Vec::new()
    }
}


pub mod commands;
pub mod devtools;
pub mod element;
pub mod metrics;
pub mod transport;
pub mod util;

pub use commands::*;
pub use config::{BrowserEngine, CdpConfig};
pub use devtools::{DevTools, Listener, ListenerError};
pub use element::{ElementSource, LazyElementSnapshot, SelectorElement};
pub use error::{AdapterError, AdapterErrorKind};
pub use events::{DownloadProgress, DownloadState, DownloadWillBegin, ProtocolEvent};
pub use metrics::AdapterMetricsSnapshot;
pub use transport::{CdpTransport, ChromiumTransport, CommandTarget, NoopTransport, TransportEvent};
