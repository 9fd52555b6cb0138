use std::path::PathBuf;
use std::time::Duration;

use caseflow_runtime::{RuntimeConfig, WatcherConfig};
use serde::{Deserialize, Serialize};

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawCaseflowConfig {
    #[serde(default)]
    pub plugins: RawPluginsConfig,

    #[serde(default)]
    pub registry: RawRegistryConfig,
}

/// Plugin directory settings as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPluginsConfig {
    pub dir: Option<PathBuf>,
    pub creation_delay_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub rewatch_interval_ms: Option<u64>,
}

/// Package registry settings as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawRegistryConfig {
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub fetch_on_start: Option<bool>,
    pub sync_interval_secs: Option<u64>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CaseflowConfig {
    #[serde(default)]
    pub plugins: PluginsConfig,

    #[serde(default)]
    pub registry: RegistryConfig,
}

impl CaseflowConfig {
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            watcher: self.plugins.watcher_config(),
            registry_url: self.registry.url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Directory holding `<name>-<version>` logic packages
    pub dir: PathBuf,

    /// Wait after a version directory is created before loading it
    pub creation_delay_ms: u64,

    /// Poll the plugin directory instead of using native notifications
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,

    /// Retry period while the plugin directory is missing
    pub rewatch_interval_ms: u64,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            dir: caseflow_paths::plugin_dir(),
            creation_delay_ms: DEFAULT_CREATION_DELAY_MS,
            poll_interval_ms: None,
            rewatch_interval_ms: DEFAULT_REWATCH_INTERVAL_MS,
        }
    }
}

impl PluginsConfig {
    pub fn watcher_config(&self) -> WatcherConfig {
        let config = WatcherConfig::new(&self.dir)
            .with_creation_delay(Duration::from_millis(self.creation_delay_ms))
            .with_rewatch_interval(Duration::from_millis(self.rewatch_interval_ms));
        match self.poll_interval_ms {
            Some(ms) => config.with_poll_interval(Duration::from_millis(ms)),
            None => config,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub scheme: String,
    pub host: String,
    pub port: u16,

    /// Fetch the latest packages when `serve` starts
    pub fetch_on_start: bool,

    /// Re-fetch periodically while serving
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_interval_secs: Option<u64>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            fetch_on_start: false,
            sync_interval_secs: None,
        }
    }
}

impl RegistryConfig {
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Default package registry scheme
pub const DEFAULT_SCHEME: &str = "http";
/// Default package registry host
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default package registry port
pub const DEFAULT_PORT: u16 = 9292;
pub const DEFAULT_CREATION_DELAY_MS: u64 = 1000;
pub const DEFAULT_REWATCH_INTERVAL_MS: u64 = 5000;
