use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{
    core::Collector, histogram_opts, HistogramVec, IntCounter, IntCounterVec, Registry,
};
use tracing::error;

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdapterMetricsSnapshot {
    pub commands: u64,
    pub command_failures: u64,
    pub events: u64,
    pub listener_failures: u64,
}

static COMMANDS: AtomicU64 = AtomicU64::new(0);
static COMMAND_FAILURES: AtomicU64 = AtomicU64::new(0);
static EVENTS: AtomicU64 = AtomicU64::new(0);
static LISTENER_FAILURES: AtomicU64 = AtomicU64::new(0);

lazy_static! {
    static ref CDP_COMMANDS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("cdp_download_commands_total", "DevTools commands sent"),
        &["method"]
    )
    .unwrap();
    static ref CDP_COMMAND_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "cdp_download_command_failures_total",
            "DevTools commands answered with an error"
        ),
        &["method"]
    )
    .unwrap();
    static ref CDP_COMMAND_DURATION: HistogramVec = HistogramVec::new(
        histogram_opts!(
            "cdp_download_command_duration_seconds",
            "DevTools command round trip",
            vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]
        ),
        &["method"]
    )
    .unwrap();
    static ref CDP_EVENTS_TOTAL: IntCounter =
        IntCounter::new("cdp_download_events_total", "DevTools events dispatched").unwrap();
    static ref CDP_LISTENER_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "cdp_download_listener_failures_total",
            "Errors raised by event listeners"
        ),
        &["method"]
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register cdp metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, CDP_COMMANDS_TOTAL.clone());
    register(registry, CDP_COMMAND_FAILURES_TOTAL.clone());
    register(registry, CDP_COMMAND_DURATION.clone());
    register(registry, CDP_EVENTS_TOTAL.clone());
    register(registry, CDP_LISTENER_FAILURES_TOTAL.clone());
}

pub fn record_command(method: &str, duration: Duration, ok: bool) {
    COMMANDS.fetch_add(1, Ordering::Relaxed);
    CDP_COMMANDS_TOTAL.with_label_values(&[method]).inc();
    CDP_COMMAND_DURATION
        .with_label_values(&[method])
        .observe(duration.as_secs_f64());
    if !ok {
        COMMAND_FAILURES.fetch_add(1, Ordering::Relaxed);
        CDP_COMMAND_FAILURES_TOTAL.with_label_values(&[method]).inc();
    }
}

pub fn record_event() {
    EVENTS.fetch_add(1, Ordering::Relaxed);
    CDP_EVENTS_TOTAL.inc();
}

pub fn record_listener_failure(method: &str) {
    LISTENER_FAILURES.fetch_add(1, Ordering::Relaxed);
    CDP_LISTENER_FAILURES_TOTAL.with_label_values(&[method]).inc();
}

pub fn snapshot() -> AdapterMetricsSnapshot {
    AdapterMetricsSnapshot {
        commands: COMMANDS.load(Ordering::Relaxed),
        command_failures: COMMAND_FAILURES.load(Ordering::Relaxed),
        events: EVENTS.load(Ordering::Relaxed),
        listener_failures: LISTENER_FAILURES.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    COMMANDS.store(0, Ordering::Relaxed);
    COMMAND_FAILURES.store(0, Ordering::Relaxed);
    EVENTS.store(0, Ordering::Relaxed);
    LISTENER_FAILURES.store(0, Ordering::Relaxed);
}
