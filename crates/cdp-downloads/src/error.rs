//! Download error types

use std::path::PathBuf;

use cdp_adapter::AdapterError;
use thiserror::Error;

/// Every way a CDP-coordinated download can fail.
///
/// Messages carry the filter description, the configured timeout and the elapsed or idle time
/// so that "close but not matching" failures can be diagnosed from the message alone.
#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// No downloads folder could be resolved; raised before any listener is armed.
    #[error("Downloads folder is not configured: {0}")]
    Configuration(String),

    /// The browser cannot speak the DevTools protocol or has no live session.
    #[error("{0}")]
    UnsupportedEngine(String),

    /// The browser reported the download as canceled.
    #[error(
        "File download is canceled (received bytes: {received_bytes:.0}, total bytes: {total_bytes:.0}, guid: {guid}, timeout: {timeout_ms} ms)"
    )]
    Cancelled {
        guid: String,
        received_bytes: f64,
        total_bytes: f64,
        timeout_ms: u64,
    },

    /// No tracked download made progress within the stall window.
    #[error(
        "Failed to download file{filter} in {timeout_ms} ms: files in {folder} haven't been modified for {idle_ms} ms. (lastUpdate: {last_activity_ms}, now: {now_ms}, incrementTimeout: {stall_timeout_ms})"
    )]
    Stalled {
        filter: String,
        timeout_ms: u64,
        folder: String,
        idle_ms: u64,
        last_activity_ms: u64,
        now_ms: u64,
        stall_timeout_ms: u64,
    },

    /// The absolute deadline passed without a completed, matching download.
    #[error("Failed to download file{filter} in {timeout_ms} ms. (waited {elapsed_ms} ms)")]
    Timeout {
        filter: String,
        timeout_ms: u64,
        elapsed_ms: u64,
    },

    /// A completed download failed the filter once its full metadata was known.
    #[error("Failed to download file{filter} in {timeout_ms} ms; actually downloaded: {}", .actual.display())]
    FilterMismatch {
        filter: String,
        timeout_ms: u64,
        actual: PathBuf,
    },

    /// The triggering action failed.
    #[error("Download action failed: {0}")]
    Action(String),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// Moving the downloaded file into its target folder failed.
    #[error("Failed to relocate downloaded file: {0}")]
    Io(String),
}

impl DownloadError {
    /// Timeout and final filter mismatch are reported the same way.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            DownloadError::Timeout { .. } | DownloadError::FilterMismatch { .. }
        )
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            DownloadError::Configuration(_) => "configuration",
            DownloadError::UnsupportedEngine(_) => "unsupported_engine",
            DownloadError::Cancelled { .. } => "cancelled",
            DownloadError::Stalled { .. } => "stalled",
            DownloadError::Timeout { .. } => "timeout",
            DownloadError::FilterMismatch { .. } => "filter_mismatch",
            DownloadError::Action(_) => "action",
            DownloadError::Adapter(_) => "adapter",
            DownloadError::Io(_) => "io",
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(err: std::io::Error) -> Self {
        DownloadError::Io(err.to_string())
    }
}
