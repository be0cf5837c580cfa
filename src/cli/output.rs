use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

/// Serialize `value` for the machine-readable formats. `None` for [`OutputFormat::Human`],
/// which every command renders itself.
pub fn render_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<Option<String>> {
    match format {
        OutputFormat::Human => Ok(None),
        OutputFormat::Json => serde_json::to_string_pretty(value)
            .map(Some)
            .context("serializing json output"),
        OutputFormat::Yaml => serde_yaml::to_string(value)
            .map(Some)
            .context("serializing yaml output"),
    }
}
