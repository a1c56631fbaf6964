//! DevTools listeners feeding one session's [`DownloadSet`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cdp_adapter::{DownloadProgress, DownloadState, DownloadWillBegin, Listener, ListenerError};
use tracing::{debug, warn};

use crate::abort::AbortSignal;
use crate::error::DownloadError;
use crate::metrics;
use crate::registry::DownloadSet;
use crate::stall::millis;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn next_id() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::Relaxed) + 1
}

/// Registers each announced download in the set.
pub struct WillBeginListener {
    id: u64,
    downloads: Arc<DownloadSet>,
}

impl WillBeginListener {
    pub fn new(downloads: Arc<DownloadSet>) -> Self {
        Self {
            id: next_id(),
            downloads,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for WillBeginListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WillBeginListener#{}", self.id)
    }
}

impl Listener<DownloadWillBegin> for WillBeginListener {
    fn accept(&self, event: DownloadWillBegin) -> Result<(), ListenerError> {
        debug!(
            listener = %self,
            guid = %event.guid,
            file = %event.suggested_filename,
            url = %event.url,
            frame = %event.frame_id,
            "download will begin"
        );
        if !self
            .downloads
            .add_file_with_url(&event.guid, &event.suggested_filename, Some(&event.url))
        {
            debug!(listener = %self, guid = %event.guid, "download already tracked");
        }
        Ok(())
    }
}

/// Applies progress to the set and raises the abort signal on cancellation.
pub struct ProgressListener {
    id: u64,
    downloads: Arc<DownloadSet>,
    abort: AbortSignal,
    timeout: Duration,
}

impl ProgressListener {
    pub fn new(downloads: Arc<DownloadSet>, abort: AbortSignal, timeout: Duration) -> Self {
        Self {
            id: next_id(),
            downloads,
            abort,
            timeout,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    fn untracked(&self, event: &DownloadProgress) {
        metrics::record_untracked_progress();
        warn!(
            listener = %self,
            guid = %event.guid,
            state = %event.state,
            "progress for a download that was never announced"
        );
    }
}

impl fmt::Display for ProgressListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProgressListener#{}", self.id)
    }
}

impl Listener<DownloadProgress> for ProgressListener {
    fn accept(&self, event: DownloadProgress) -> Result<(), ListenerError> {
        debug!(
            listener = %self,
            guid = %event.guid,
            state = %event.state,
            received = event.received_bytes,
            total = event.total_bytes,
            "download progress"
        );
        match event.state {
            DownloadState::Canceled => {
                let err = DownloadError::Cancelled {
                    guid: event.guid,
                    received_bytes: event.received_bytes,
                    total_bytes: event.total_bytes,
                    timeout_ms: millis(self.timeout),
                };
                self.abort.fail(err.clone());
                return Err(Box::new(err));
            }
            DownloadState::Completed => {
                if !self.downloads.mark_completed(&event.guid) {
                    self.untracked(&event);
                }
            }
            DownloadState::InProgress | DownloadState::Unknown => {
                if !self.downloads.mark_in_progress(&event.guid) {
                    self.untracked(&event);
                }
            }
        }
        Ok(())
    }
}
