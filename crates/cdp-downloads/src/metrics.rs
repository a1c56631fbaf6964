use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{
    core::Collector, histogram_opts, Histogram, IntCounter, IntCounterVec, Registry,
};
use tracing::error;

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DownloadMetricsSnapshot {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub untracked_progress: u64,
}

static STARTED: AtomicU64 = AtomicU64::new(0);
static COMPLETED: AtomicU64 = AtomicU64::new(0);
static FAILED: AtomicU64 = AtomicU64::new(0);
static UNTRACKED_PROGRESS: AtomicU64 = AtomicU64::new(0);

lazy_static! {
    static ref DOWNLOADS_STARTED_TOTAL: IntCounter = IntCounter::new(
        "cdp_download_downloads_started_total",
        "Download sessions started"
    )
    .unwrap();
    static ref DOWNLOADS_COMPLETED_TOTAL: IntCounter = IntCounter::new(
        "cdp_download_downloads_completed_total",
        "Download sessions that produced a file"
    )
    .unwrap();
    static ref DOWNLOADS_FAILED_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "cdp_download_downloads_failed_total",
            "Download sessions that failed, by reason"
        ),
        &["reason"]
    )
    .unwrap();
    static ref UNTRACKED_PROGRESS_TOTAL: IntCounter = IntCounter::new(
        "cdp_download_untracked_progress_total",
        "Progress events for downloads that were never announced"
    )
    .unwrap();
    static ref DOWNLOAD_DURATION: Histogram = Histogram::with_opts(histogram_opts!(
        "cdp_download_download_duration_seconds",
        "Time from arming listeners to a relocated file",
        vec![0.1, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0]
    ))
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register download metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, DOWNLOADS_STARTED_TOTAL.clone());
    register(registry, DOWNLOADS_COMPLETED_TOTAL.clone());
    register(registry, DOWNLOADS_FAILED_TOTAL.clone());
    register(registry, UNTRACKED_PROGRESS_TOTAL.clone());
    register(registry, DOWNLOAD_DURATION.clone());
}

pub fn record_started() {
    STARTED.fetch_add(1, Ordering::Relaxed);
    DOWNLOADS_STARTED_TOTAL.inc();
}

pub fn record_completed(duration: Duration) {
    COMPLETED.fetch_add(1, Ordering::Relaxed);
    DOWNLOADS_COMPLETED_TOTAL.inc();
    DOWNLOAD_DURATION.observe(duration.as_secs_f64());
}

pub fn record_failure(reason: &str) {
    FAILED.fetch_add(1, Ordering::Relaxed);
    DOWNLOADS_FAILED_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_untracked_progress() {
    UNTRACKED_PROGRESS.fetch_add(1, Ordering::Relaxed);
    UNTRACKED_PROGRESS_TOTAL.inc();
}

pub fn snapshot() -> DownloadMetricsSnapshot {
    DownloadMetricsSnapshot {
        started: STARTED.load(Ordering::Relaxed),
        completed: COMPLETED.load(Ordering::Relaxed),
        failed: FAILED.load(Ordering::Relaxed),
        untracked_progress: UNTRACKED_PROGRESS.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    STARTED.store(0, Ordering::Relaxed);
    COMPLETED.store(0, Ordering::Relaxed);
    FAILED.store(0, Ordering::Relaxed);
    UNTRACKED_PROGRESS.store(0, Ordering::Relaxed);
}
