//! mapsync library
//!
//! Binds the synchronization engine to Chromium and runs the map application's smoke
//! scenarios. Exposed as a library for integration testing.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod metrics;
pub mod report;
pub mod scenarios;

pub use bridge::CdpInterface;
pub use config::AppConfig;
pub use report::RunSummary;
pub use scenarios::{Outcome, Scenario, ScenarioReport, ScenarioRunner};
