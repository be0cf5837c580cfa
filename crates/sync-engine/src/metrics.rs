use std::sync::atomic::{AtomicU64, Ordering};

use lazy_static::lazy_static;
use prometheus::{core::Collector, IntCounterVec, Registry};
use tracing::error;

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncMetricsSnapshot {
    pub loaded: u64,
    pub never_started: u64,
    pub timed_out: u64,
    pub controller_success: u64,
    pub controller_failures: u64,
}

static LOADED: AtomicU64 = AtomicU64::new(0);
static NEVER_STARTED: AtomicU64 = AtomicU64::new(0);
static TIMED_OUT: AtomicU64 = AtomicU64::new(0);
static CONTROLLER_SUCCESS: AtomicU64 = AtomicU64::new(0);
static CONTROLLER_FAILURES: AtomicU64 = AtomicU64::new(0);

lazy_static! {
    static ref QUIESCENCE_VERDICTS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "mapsync_quiescence_verdicts_total",
            "Quiescence detection runs by verdict"
        ),
        &["verdict"]
    )
    .unwrap();
    static ref CONTROLLER_OUTCOMES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "mapsync_controller_outcomes_total",
            "Controller operations by controller and outcome"
        ),
        &["controller", "outcome"]
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register sync metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, QUIESCENCE_VERDICTS_TOTAL.clone());
    register(registry, CONTROLLER_OUTCOMES_TOTAL.clone());
}

pub fn record_verdict(verdict: &str) {
    let counter = match verdict {
        "loaded" => &LOADED,
        "never_started" => &NEVER_STARTED,
        _ => &TIMED_OUT,
    };
    counter.fetch_add(1, Ordering::Relaxed);
    QUIESCENCE_VERDICTS_TOTAL
        .with_label_values(&[verdict])
        .inc();
}

/// `outcome` is `"ok"` or a [`SyncError::kind`](crate::SyncError::kind) label.
pub fn record_controller(controller: &str, outcome: &str) {
    if outcome == "ok" {
        CONTROLLER_SUCCESS.fetch_add(1, Ordering::Relaxed);
    } else {
        CONTROLLER_FAILURES.fetch_add(1, Ordering::Relaxed);
    }
    CONTROLLER_OUTCOMES_TOTAL
        .with_label_values(&[controller, outcome])
        .inc();
}

pub(crate) fn observe<T>(
    controller: &str,
    result: Result<T, crate::SyncError>,
) -> Result<T, crate::SyncError> {
    match &result {
        Ok(_) => record_controller(controller, "ok"),
        Err(err) => record_controller(controller, err.kind()),
    }
    result
}

pub fn snapshot() -> SyncMetricsSnapshot {
    SyncMetricsSnapshot {
        loaded: LOADED.load(Ordering::Relaxed),
        never_started: NEVER_STARTED.load(Ordering::Relaxed),
        timed_out: TIMED_OUT.load(Ordering::Relaxed),
        controller_success: CONTROLLER_SUCCESS.load(Ordering::Relaxed),
        controller_failures: CONTROLLER_FAILURES.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    LOADED.store(0, Ordering::Relaxed);
    NEVER_STARTED.store(0, Ordering::Relaxed);
    TIMED_OUT.store(0, Ordering::Relaxed);
    CONTROLLER_SUCCESS.store(0, Ordering::Relaxed);
    CONTROLLER_FAILURES.store(0, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_verdicts_and_outcomes() {
        let before = snapshot();
        record_verdict("never_started");
        record_controller("toggle", "ok");
        record_controller("toggle", "toggle");
        let after = snapshot();
        assert!(after.never_started > before.never_started);
        assert!(after.controller_success > before.controller_success);
        assert!(after.controller_failures > before.controller_failures);

        let registry = Registry::new();
        register_metrics(&registry);
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"mapsync_quiescence_verdicts_total".to_string()));
        assert!(names.contains(&"mapsync_controller_outcomes_total".to_string()));
    }
}
