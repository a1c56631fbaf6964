//! One CDP-coordinated download: arm listeners, trigger the action, wait, relocate.
//!
//! ```text
//! Init -> Armed -> Waiting -> Succeeded
//!   \        \         \
//!    `--------`---------`--> Failed
//! ```
//!
//! Listeners registered while armed are removed on every exit path, including panics
//! and a dropped future, through [`ListenerGuard`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cdp_adapter::{
    AdapterError, AdapterErrorKind, DevTools, DownloadBehavior, DownloadProgress,
    DownloadWillBegin, ElementSource, PageEnable, SetDownloadBehavior,
};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::abort::AbortSignal;
use crate::action::DownloadAction;
use crate::config::DownloadConfig;
use crate::error::DownloadError;
use crate::filter::FileFilter;
use crate::folder::{DownloadsFolder, DownloadsFolderProvider};
use crate::listeners::{ProgressListener, WillBeginListener};
use crate::metrics;
use crate::registry::{DownloadRecord, DownloadSet};
use crate::relocation::Relocator;
use crate::stall::{millis, StallDetector};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Init,
    Armed,
    Waiting,
    Succeeded,
    Failed,
}

/// Clears the DevTools listeners when dropped.
pub struct ListenerGuard<'a> {
    devtools: &'a DevTools,
}

impl<'a> ListenerGuard<'a> {
    fn new(devtools: &'a DevTools) -> Self {
        Self { devtools }
    }
}

impl Drop for ListenerGuard<'_> {
    fn drop(&mut self) {
        self.devtools.clear_listeners();
    }
}

/// Everything one download needs besides the per-call arguments.
pub struct DownloadSession {
    devtools: Arc<DevTools>,
    folders: Arc<dyn DownloadsFolderProvider>,
    relocator: Arc<dyn Relocator>,
    config: DownloadConfig,
}

impl DownloadSession {
    pub fn new(
        devtools: Arc<DevTools>,
        folders: Arc<dyn DownloadsFolderProvider>,
        relocator: Arc<dyn Relocator>,
        config: DownloadConfig,
    ) -> Self {
        Self {
            devtools,
            folders,
            relocator,
            config,
        }
    }

    pub fn devtools(&self) -> &Arc<DevTools> {
        &self.devtools
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Download with the configured timeouts.
    pub async fn download_with_defaults(
        &self,
        target: &dyn ElementSource,
        filter: &dyn FileFilter,
        action: &dyn DownloadAction,
    ) -> Result<PathBuf, DownloadError> {
        let timeout = self.config.timeout();
        let stall_timeout = self.config.stall_timeout();
        self.download(target, timeout, stall_timeout, filter, action)
            .await
    }

    /// Trigger `action` on `target` and return the relocated file of the first completed
    /// download accepted by `filter`.
    pub async fn download(
        &self,
        target: &dyn ElementSource,
        timeout: Duration,
        stall_timeout: Duration,
        filter: &dyn FileFilter,
        action: &dyn DownloadAction,
    ) -> Result<PathBuf, DownloadError> {
        metrics::record_started();
        let started = Instant::now();
        let result = self
            .run(target, timeout, stall_timeout, filter, action)
            .await;

        match &result {
            Ok(path) => {
                metrics::record_completed(started.elapsed());
                enter(SessionPhase::Succeeded);
                info!(
                    file = %path.display(),
                    elapsed_ms = millis(started.elapsed()),
                    "download finished"
                );
            }
            Err(err) => {
                metrics::record_failure(err.kind_label());
                enter(SessionPhase::Failed);
                warn!(reason = err.kind_label(), error = %err, "download failed");
            }
        }
        result
    }

    async fn run(
        &self,
        target: &dyn ElementSource,
        timeout: Duration,
        stall_timeout: Duration,
        filter: &dyn FileFilter,
        action: &dyn DownloadAction,
    ) -> Result<PathBuf, DownloadError> {
        enter(SessionPhase::Init);
        let folder = self.folders.current_downloads_folder().ok_or_else(|| {
            DownloadError::Configuration(
                "set a downloads folder before downloading with CDP".to_string(),
            )
        })?;

        let downloads = Arc::new(DownloadSet::new(folder.clone()));
        let abort = AbortSignal::new();
        let _guard = self.arm(&folder, &downloads, &abort, timeout).await?;
        enter(SessionPhase::Armed);

        action.perform(&self.devtools, target).await?;

        enter(SessionPhase::Waiting);
        let record = self
            .wait_until_completed(&downloads, &abort, timeout, stall_timeout, filter)
            .await?;

        let downloaded = downloads.downloaded_file(&record);
        if !filter.matches(&downloaded) {
            return Err(DownloadError::FilterMismatch {
                filter: filter.description(),
                timeout_ms: millis(timeout),
                actual: downloaded.path().to_path_buf(),
            });
        }

        self.archive(&downloads.file_of(&record), &record.file_name)
            .await
    }

    async fn arm<'a>(
        &'a self,
        folder: &DownloadsFolder,
        downloads: &Arc<DownloadSet>,
        abort: &AbortSignal,
        timeout: Duration,
    ) -> Result<ListenerGuard<'a>, DownloadError> {
        self.devtools
            .open_session()
            .await
            .map_err(unsupported_engine)?;
        self.devtools.send(&PageEnable::default()).await?;

        // `default` keeps the folder the browser was launched with.
        let download_path = match self.config.download_behavior {
            DownloadBehavior::Default => None,
            _ => Some(folder.path().to_string_lossy().into_owned()),
        };
        let behavior =
            SetDownloadBehavior::with_events(self.config.download_behavior, download_path);
        self.devtools.send(&behavior).await?;

        self.devtools.clear_listeners();
        let guard = ListenerGuard::new(&self.devtools);
        self.devtools
            .add_listener::<DownloadWillBegin, _>(WillBeginListener::new(Arc::clone(downloads)));
        self.devtools.add_listener::<DownloadProgress, _>(ProgressListener::new(
            Arc::clone(downloads),
            abort.clone(),
            timeout,
        ));
        debug!(folder = %folder, "download listeners armed");
        Ok(guard)
    }

    async fn wait_until_completed(
        &self,
        downloads: &DownloadSet,
        abort: &AbortSignal,
        timeout: Duration,
        stall_timeout: Duration,
        filter: &dyn FileFilter,
    ) -> Result<DownloadRecord, DownloadError> {
        let interval = self.config.polling_interval();
        let stall = StallDetector::new(Instant::now(), timeout, stall_timeout);
        let deadline = stall.started_at() + timeout;

        loop {
            if let Some(failure) = abort.failure() {
                return Err(failure);
            }
            if let Some(record) = downloads.find_matching(filter) {
                debug!(
                    guid = %record.id,
                    file = %record.file_name,
                    elapsed_ms = millis(stall.started_at().elapsed()),
                    "download completed"
                );
                return Ok(record);
            }
            stall.check(downloads, filter)?;

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::select! {
                _ = sleep(interval.min(deadline - now)) => {}
                failure = abort.wait() => return Err(failure),
            }
        }

        Err(DownloadError::Timeout {
            filter: filter.description(),
            timeout_ms: millis(timeout),
            elapsed_ms: millis(stall.started_at().elapsed()),
        })
    }

    async fn archive(
        &self,
        source: &Path,
        file_name: &str,
    ) -> Result<PathBuf, DownloadError> {
        let folder = self.relocator.prepare_unique_target_folder().await?;
        let target = folder.join(file_name);
        self.relocator.move_file(source, &target).await?;
        debug!(from = %source.display(), to = %target.display(), "download relocated");
        Ok(target)
    }
}

fn enter(phase: SessionPhase) {
    debug!(?phase, "download session phase");
}

fn unsupported_engine(err: AdapterError) -> DownloadError {
    if err.is(AdapterErrorKind::Unsupported) || err.is(AdapterErrorKind::NoSession) {
        DownloadError::UnsupportedEngine(err.to_string())
    } else {
        DownloadError::Adapter(err)
    }
}
