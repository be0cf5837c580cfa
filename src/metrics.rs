use std::path::Path;

use anyhow::{Context, Result};
use cdp_adapter::metrics as cdp_metrics;
use once_cell::sync::{Lazy, OnceCell};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use sync_engine::metrics as sync_metrics;
use tracing::{error, info};

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static REGISTER_ONCE: OnceCell<()> = OnceCell::new();

static SCENARIO_OUTCOMES_TOTAL: Lazy<Option<IntCounterVec>> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mapsync_scenario_outcomes_total",
            "Scenario runs by scenario and outcome",
        ),
        &["scenario", "outcome"],
    )
    .map_err(|err| error!(?err, "failed to build scenario counter"))
    .ok()
});

pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}

pub fn register_metrics() {
    REGISTER_ONCE.get_or_init(|| {
        let registry = global_registry();
        cdp_metrics::register_metrics(registry);
        sync_metrics::register_metrics(registry);
        if let Some(counter) = SCENARIO_OUTCOMES_TOTAL.as_ref() {
            if let Err(err) = registry.register(Box::new(counter.clone())) {
                error!(?err, "failed to register scenario counter");
            }
        }
    });
}

pub fn record_scenario(scenario: &str, outcome: &str) {
    if let Some(counter) = SCENARIO_OUTCOMES_TOTAL.as_ref() {
        counter.with_label_values(&[scenario, outcome]).inc();
    }
}

/// Text exposition of every registered metric.
pub fn render_text() -> Result<String> {
    register_metrics();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&global_registry().gather(), &mut buffer)
        .context("encoding prometheus metrics")?;
    String::from_utf8(buffer).context("metrics exposition is not utf-8")
}

pub async fn write_metrics(path: &Path) -> Result<()> {
    let body = render_text()?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "metrics written");
    Ok(())
}
