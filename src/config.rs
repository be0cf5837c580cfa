//! Configuration management module
//!
//! One YAML document holds the target application, the browser launch settings and the
//! synchronization policy. Every section is optional; missing keys fall back to defaults.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cdp_adapter::CdpConfig;
use map_widgets::MapTargets;
use serde::{Deserialize, Serialize};
use sync_engine::{SyncPolicy, UrlPattern};
use tracing::{debug, warn};

pub const APP_DIR: &str = "mapsync";
pub const CONFIG_FILE: &str = "config.yaml";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub target: TargetConfig,
    pub browser: BrowserSettings,
    pub sync: SyncPolicy,
}

/// The application under test.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub base_url: String,
    /// Endpoint listing the dataset categories
    pub datasets: UrlPattern,
    /// Requests the map issues while drawing its layers
    pub map_data: UrlPattern,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/".to_string(),
            datasets: UrlPattern::contains("/api/datasets"),
            map_data: UrlPattern::contains("/geoserver/"),
        }
    }
}

impl TargetConfig {
    pub fn map_targets(&self) -> MapTargets {
        MapTargets {
            datasets: self.datasets.clone(),
            map_data: self.map_data.clone(),
        }
    }
}

/// Browser launch settings. Unset fields keep the adapter's environment-derived defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: Option<bool>,
    pub executable: Option<PathBuf>,
    pub websocket_url: Option<String>,
    pub user_data_dir: Option<PathBuf>,
    pub default_deadline_ms: Option<u64>,
    pub no_sandbox: Option<bool>,
}

impl BrowserSettings {
    pub fn cdp_config(&self) -> CdpConfig {
        let mut cfg = CdpConfig::default();
        if let Some(headless) = self.headless {
            cfg.headless = headless;
        }
        if let Some(executable) = &self.executable {
            cfg.executable = executable.clone();
        }
        if let Some(url) = &self.websocket_url {
            cfg.websocket_url = Some(url.clone());
        }
        if let Some(dir) = &self.user_data_dir {
            cfg.user_data_dir = dir.clone();
        }
        if let Some(deadline) = self.default_deadline_ms {
            cfg.default_deadline_ms = deadline;
        }
        if let Some(no_sandbox) = self.no_sandbox {
            cfg.no_sandbox = no_sandbox;
        }
        cfg
    }
}

/// `--config` wins, then `./config/config.yaml`, then the per-user config directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("config").join(CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    default_config_path()
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

pub fn parse_config(raw: &str) -> Result<AppConfig> {
    if raw.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    serde_yaml::from_str(raw).context("parsing configuration")
}

pub async fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let Some(path) = resolve_config_path(explicit) else {
        warn!("no configuration directory available; using defaults");
        return Ok(AppConfig::default());
    };
    if !path.exists() {
        warn!(path = %path.display(), "configuration file not found; using defaults");
        return Ok(AppConfig::default());
    }
    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let config = parse_config(&raw).with_context(|| format!("loading {}", path.display()))?;
    debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

pub async fn save_config(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let raw = serde_yaml::to_string(config).context("serializing configuration")?;
    tokio::fs::write(path, raw)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

/// `MAPSYNC_BASE_URL` and `MAPSYNC_HEADLESS` override the file.
pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(url) = env::var("MAPSYNC_BASE_URL") {
        let url = url.trim();
        if !url.is_empty() {
            config.target.base_url = url.to_string();
        }
    }
    if let Ok(raw) = env::var("MAPSYNC_HEADLESS") {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => config.browser.headless = Some(true),
            "0" | "false" | "no" | "off" => config.browser.headless = Some(false),
            other => warn!(value = other, "ignoring unrecognized MAPSYNC_HEADLESS"),
        }
    }
}
