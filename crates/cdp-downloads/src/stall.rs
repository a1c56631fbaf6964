use std::time::{Duration, Instant};

use crate::error::DownloadError;
use crate::filter::FileFilter;
use crate::registry::DownloadSet;

/// Fails a wait once no tracked download has shown activity for `stall_timeout`.
///
/// Idle time is measured from the latest activity or from the start of the wait,
/// whichever is later, so an empty registry stalls `stall_timeout` after start.
#[derive(Clone, Copy, Debug)]
pub struct StallDetector {
    started_at: Instant,
    timeout: Duration,
    stall_timeout: Duration,
}

impl StallDetector {
    pub fn new(started_at: Instant, timeout: Duration, stall_timeout: Duration) -> Self {
        Self {
            started_at,
            timeout,
            stall_timeout,
        }
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn idle(&self, downloads: &DownloadSet, now: Instant) -> Duration {
        let last = downloads
            .last_activity(self.started_at)
            .max(self.started_at);
        now.saturating_duration_since(last)
    }

    pub fn check(&self, downloads: &DownloadSet, filter: &dyn FileFilter) -> Result<(), DownloadError> {
        self.check_at(downloads, filter, Instant::now())
    }

    pub fn check_at(
        &self,
        downloads: &DownloadSet,
        filter: &dyn FileFilter,
        now: Instant,
    ) -> Result<(), DownloadError> {
        let idle = self.idle(downloads, now);
        if idle <= self.stall_timeout {
            return Ok(());
        }

        let last = downloads
            .last_activity(self.started_at)
            .max(self.started_at);
        Err(DownloadError::Stalled {
            filter: filter.description(),
            timeout_ms: millis(self.timeout),
            folder: downloads.folder().to_string(),
            idle_ms: millis(idle),
            last_activity_ms: millis(last.duration_since(self.started_at)),
            now_ms: millis(now.saturating_duration_since(self.started_at)),
            stall_timeout_ms: millis(self.stall_timeout),
        })
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
