use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Args;
use map_widgets::AppUi;
use sync_engine::Session;
use tracing::{info, warn};

use crate::bridge::CdpInterface;
use crate::cli::context::CliContext;
use crate::cli::output::render_structured;
use crate::metrics;
use crate::report::RunSummary;
use crate::scenarios::{self, ScenarioRunner};

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Scenario name fragments to run (all scenarios when omitted)
    pub scenarios: Vec<String>,

    /// Override the application base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Attach to an already running browser instead of launching one
    #[arg(long, value_name = "WS_URL")]
    pub ws_url: Option<String>,

    /// Stop after the first failing scenario
    #[arg(long)]
    pub fail_fast: bool,

    /// Write the run summary as JSON
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Write prometheus metrics in text format after the run
    #[arg(long, value_name = "FILE")]
    pub metrics_out: Option<PathBuf>,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext) -> Result<()> {
    let selected = scenarios::select(&args.scenarios);
    if selected.is_empty() {
        bail!("no scenario matches {:?}", args.scenarios);
    }
    metrics::register_metrics();

    let config = ctx.config();
    let base_url = args
        .base_url
        .clone()
        .unwrap_or_else(|| config.target.base_url.clone());
    let mut cdp = config.browser.cdp_config();
    if args.headed {
        cdp.headless = false;
    }
    if let Some(url) = &args.ws_url {
        cdp.websocket_url = Some(url.clone());
    }

    let started_at = Utc::now();
    let interface = CdpInterface::connect(cdp)
        .await
        .context("starting browser")?;
    let browser_mode = interface.adapter().mode().as_str();
    let session = Session::new(Arc::new(interface.clone()), config.sync.clone());
    let runner = ScenarioRunner::new(AppUi::new(&config.target.map_targets()), base_url.clone());
    info!(scenarios = selected.len(), %base_url, mode = browser_mode, "running scenarios");

    let mut reports = Vec::with_capacity(selected.len());
    for scenario in selected {
        let report = runner.run(&session, scenario).await;
        let failed = !report.passed();
        reports.push(report);
        if failed && args.fail_fast {
            warn!(%scenario, "stopping after first failure");
            break;
        }
    }
    interface.shutdown().await;

    let summary = RunSummary::new(started_at, base_url, browser_mode, reports);
    match render_structured(&summary, ctx.output())? {
        Some(rendered) => println!("{}", rendered),
        None => println!("{}", summary.render_human()),
    }
    if let Some(path) = &args.report {
        summary.write_json(path).await?;
        info!(path = %path.display(), "run summary written");
    }
    if let Some(path) = &args.metrics_out {
        metrics::write_metrics(path).await?;
    }

    if !summary.all_passed() {
        bail!("{} of {} scenarios failed", summary.failed, summary.scenarios.len());
    }
    Ok(())
}
