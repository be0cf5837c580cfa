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
    pub command_latency_total_us: u64,
    pub events: u64,
    pub requests_observed: u64,
    pub responses_rewritten: u64,
}

static COMMANDS: AtomicU64 = AtomicU64::new(0);
static COMMAND_FAILURES: AtomicU64 = AtomicU64::new(0);
static COMMAND_LATENCY_TOTAL_US: AtomicU64 = AtomicU64::new(0);
static EVENTS: AtomicU64 = AtomicU64::new(0);
static REQUESTS_OBSERVED: AtomicU64 = AtomicU64::new(0);
static RESPONSES_REWRITTEN: AtomicU64 = AtomicU64::new(0);

lazy_static! {
    static ref CDP_COMMANDS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("mapsync_cdp_commands_total", "CDP commands sent"),
        &["method"]
    )
    .unwrap();
    static ref CDP_COMMAND_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("mapsync_cdp_command_failures_total", "CDP commands that failed"),
        &["method"]
    )
    .unwrap();
    static ref CDP_COMMAND_DURATION: HistogramVec = HistogramVec::new(
        histogram_opts!(
            "mapsync_cdp_command_duration_seconds",
            "CDP command latency",
            vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]
        ),
        &["method"]
    )
    .unwrap();
    static ref CDP_EVENTS_TOTAL: IntCounter =
        IntCounter::new("mapsync_cdp_events_total", "CDP events processed").unwrap();
    static ref CDP_REQUESTS_TOTAL: IntCounter = IntCounter::new(
        "mapsync_cdp_requests_observed_total",
        "Outbound page requests recorded into the request tap",
    )
    .unwrap();
    static ref CDP_REWRITES_TOTAL: IntCounter = IntCounter::new(
        "mapsync_cdp_responses_rewritten_total",
        "Intercepted responses fulfilled with a rewritten body",
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector)) {
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
    register(registry, CDP_REQUESTS_TOTAL.clone());
    register(registry, CDP_REWRITES_TOTAL.clone());
}

pub fn record_command(method: &str, elapsed: Duration, ok: bool) {
    COMMANDS.fetch_add(1, Ordering::Relaxed);
    CDP_COMMANDS_TOTAL.with_label_values(&[method]).inc();
    let micros = elapsed.as_micros().min(u64::MAX as u128) as u64;
    COMMAND_LATENCY_TOTAL_US.fetch_add(micros, Ordering::Relaxed);
    CDP_COMMAND_DURATION
        .with_label_values(&[method])
        .observe(elapsed.as_secs_f64());
    if !ok {
        COMMAND_FAILURES.fetch_add(1, Ordering::Relaxed);
        CDP_COMMAND_FAILURES_TOTAL.with_label_values(&[method]).inc();
    }
}

pub fn record_event() {
    EVENTS.fetch_add(1, Ordering::Relaxed);
    CDP_EVENTS_TOTAL.inc();
}

pub fn record_request() {
    REQUESTS_OBSERVED.fetch_add(1, Ordering::Relaxed);
    CDP_REQUESTS_TOTAL.inc();
}

pub fn record_rewrite() {
    RESPONSES_REWRITTEN.fetch_add(1, Ordering::Relaxed);
    CDP_REWRITES_TOTAL.inc();
}

pub fn snapshot() -> AdapterMetricsSnapshot {
    AdapterMetricsSnapshot {
        commands: COMMANDS.load(Ordering::Relaxed),
        command_failures: COMMAND_FAILURES.load(Ordering::Relaxed),
        command_latency_total_us: COMMAND_LATENCY_TOTAL_US.load(Ordering::Relaxed),
        events: EVENTS.load(Ordering::Relaxed),
        requests_observed: REQUESTS_OBSERVED.load(Ordering::Relaxed),
        responses_rewritten: RESPONSES_REWRITTEN.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    for counter in [
        &COMMANDS,
        &COMMAND_FAILURES,
        &COMMAND_LATENCY_TOTAL_US,
        &EVENTS,
        &REQUESTS_OBSERVED,
        &RESPONSES_REWRITTEN,
    ] {
        counter.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_outcomes_accumulate() {
        let before = snapshot();
        record_command("Page.navigate", Duration::from_micros(150), true);
        record_command("Page.navigate", Duration::from_micros(50), false);
        let after = snapshot();
        assert!(after.commands >= before.commands + 2);
        assert!(after.command_failures >= before.command_failures + 1);
        assert!(after.command_latency_total_us >= before.command_latency_total_us + 200);
    }

    #[test]
    fn registers_once() {
        let registry = Registry::new();
        register_metrics(&registry);
        register_metrics(&registry);
        record_request();
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"mapsync_cdp_requests_observed_total".to_string()));
    }
}
