use std::path::{Path, PathBuf};

use crate::cli::context::CliContext;
use crate::config::{default_config_path, parse_config, save_config, AppConfig};
use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde_json::{Map, Value as JsonValue};
use tokio::fs;
use tracing::info;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Write a configuration file populated with the defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Get configuration value
    Get {
        /// Dotted key, e.g. sync.settle_ms
        key: String,
    },

    /// Set configuration value
    Set {
        /// Dotted key, e.g. target.base_url
        key: String,

        /// Configuration value (JSON literal or plain string)
        value: String,
    },

    /// Validate configuration
    Validate,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            match ctx.config_path() {
                Some(path) => println!("Current configuration ({}):", path.display()),
                None => println!("Current configuration (defaults):"),
            }
            println!("{}", serde_yaml::to_string(ctx.config())?);
        }
        ConfigAction::Path => {
            println!("{}", target_path(ctx)?.display());
        }
        ConfigAction::Init { force } => {
            let path = target_path(ctx)?;
            if fs::try_exists(&path).await? && !force {
                bail!(
                    "{} already exists; pass --force to overwrite it",
                    path.display()
                );
            }
            save_config(&path, &AppConfig::default()).await?;
            info!(path = %path.display(), "configuration initialized");
            println!("Wrote default configuration to {}", path.display());
        }
        ConfigAction::Get { key } => {
            let json = serde_json::to_value(ctx.config())?;
            let segments = split_key(&key)?;
            match get_json_value(&json, &segments) {
                Some(value) => println!("{}", serde_yaml::to_string(value)?),
                None => bail!("{} not found in configuration", key),
            }
        }
        ConfigAction::Set { key, value } => {
            let path = target_path(ctx)?;
            let mut json = serde_json::to_value(load_config_file(&path).await?)?;
            let segments = split_key(&key)?;
            set_json_value(&mut json, &segments, parse_cli_value(&value))?;
            let config: AppConfig = serde_json::from_value(json)
                .with_context(|| format!("{} = {} is not a valid setting", key, value))?;
            save_config(&path, &config).await?;
            info!("Updated configuration key {}", key);
            println!("Saved configuration to {}", path.display());
        }
        ConfigAction::Validate => {
            let path = target_path(ctx)?;
            if fs::try_exists(&path).await? {
                load_config_file(&path).await?;
                println!("Configuration file {} is valid", path.display());
            } else {
                println!(
                    "No configuration file at {}; defaults are valid",
                    path.display()
                );
            }
        }
    }

    Ok(())
}

fn target_path(ctx: &CliContext) -> Result<PathBuf> {
    ctx.config_path()
        .map(Path::to_path_buf)
        .or_else(default_config_path)
        .context("Failed to get config directory")
}

async fn load_config_file(path: &Path) -> Result<AppConfig> {
    if fs::try_exists(path).await? {
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        parse_config(&raw).with_context(|| format!("parsing {}", path.display()))
    } else {
        Ok(AppConfig::default())
    }
}

fn parse_cli_value(raw: &str) -> JsonValue {
    serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
}

fn split_key(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        bail!("configuration key cannot be empty");
    }
    Ok(segments)
}

fn set_json_value(target: &mut JsonValue, path: &[&str], value: JsonValue) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        bail!("configuration key cannot be empty");
    };
    let mut current = target;
    for segment in parents {
        current = ensure_object(current, segment)?
            .entry((*segment).to_string())
            .or_insert(JsonValue::Null);
    }
    ensure_object(current, last)?.insert((*last).to_string(), value);
    Ok(())
}

fn ensure_object<'a>(
    value: &'a mut JsonValue,
    segment: &str,
) -> Result<&'a mut Map<String, JsonValue>> {
    if value.is_null() {
        *value = JsonValue::Object(Map::new());
    }
    match value {
        JsonValue::Object(map) => Ok(map),
        _ => bail!(
            "{} resolves to a non-object value; cannot assign nested configuration",
            segment
        ),
    }
}

fn get_json_value<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let mut current = value;
    for segment in path {
        match current {
            JsonValue::Object(map) => {
                current = map.get(*segment)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_and_get_nested_keys() {
        let mut doc = serde_json::to_value(AppConfig::default()).unwrap();
        set_json_value(&mut doc, &["sync", "settle_ms"], JsonValue::from(250)).unwrap();
        set_json_value(&mut doc, &["browser", "headless"], JsonValue::Bool(false)).unwrap();
        assert_eq!(
            get_json_value(&doc, &["sync", "settle_ms"]),
            Some(&JsonValue::from(250))
        );

        let config: AppConfig = serde_json::from_value(doc).unwrap();
        assert_eq!(config.sync.settle_ms, 250);
        assert_eq!(config.browser.headless, Some(false));
    }

    #[test]
    fn scalar_parent_is_rejected() {
        let mut doc = json!({ "target": "flat" });
        let err = set_json_value(&mut doc, &["target", "base_url"], json!("x")).unwrap_err();
        assert!(err.to_string().contains("non-object"));
    }

    #[test]
    fn cli_values_fall_back_to_strings() {
        assert_eq!(parse_cli_value("500"), JsonValue::from(500));
        assert_eq!(parse_cli_value("true"), JsonValue::Bool(true));
        assert_eq!(
            parse_cli_value("**/tiles/**"),
            JsonValue::String("**/tiles/**".into())
        );
    }
}
