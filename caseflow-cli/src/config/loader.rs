use super::types::{
    CaseflowConfig, DEFAULT_CREATION_DELAY_MS, DEFAULT_HOST, DEFAULT_PORT,
    DEFAULT_REWATCH_INTERVAL_MS, DEFAULT_SCHEME, PluginsConfig, RawCaseflowConfig,
    RawPluginsConfig, RawRegistryConfig, RegistryConfig,
};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<CaseflowConfig> {
        let mut raw = RawCaseflowConfig::default();

        // Layer 1: User config
        let user_path = Self::user_config_path();
        if user_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(&user_path)?);
        }

        // Layer 2: Project config
        let project_path = Self::project_config_path();
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(&project_path)?);
        }

        Ok(Self::finalize(raw))
    }

    /// Get user config path (`$XDG_CONFIG_HOME/caseflow/config.toml`)
    pub fn user_config_path() -> PathBuf {
        caseflow_paths::config_dir().join("config.toml")
    }

    /// Get project config path
    /// Can be overridden with CASEFLOW_PROJECT_CONFIG_DIR env var (useful for isolated tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("CASEFLOW_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".caseflow/config.toml")
        }
    }

    fn read_raw(path: &Path) -> Result<RawCaseflowConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawCaseflowConfig, overlay: RawCaseflowConfig) -> RawCaseflowConfig {
        RawCaseflowConfig {
            plugins: RawPluginsConfig {
                dir: overlay.plugins.dir.or(base.plugins.dir),
                creation_delay_ms: overlay
                    .plugins
                    .creation_delay_ms
                    .or(base.plugins.creation_delay_ms),
                poll_interval_ms: overlay
                    .plugins
                    .poll_interval_ms
                    .or(base.plugins.poll_interval_ms),
                rewatch_interval_ms: overlay
                    .plugins
                    .rewatch_interval_ms
                    .or(base.plugins.rewatch_interval_ms),
            },
            registry: RawRegistryConfig {
                scheme: overlay.registry.scheme.or(base.registry.scheme),
                host: overlay.registry.host.or(base.registry.host),
                port: overlay.registry.port.or(base.registry.port),
                fetch_on_start: overlay
                    .registry
                    .fetch_on_start
                    .or(base.registry.fetch_on_start),
                sync_interval_secs: overlay
                    .registry
                    .sync_interval_secs
                    .or(base.registry.sync_interval_secs),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawCaseflowConfig) -> CaseflowConfig {
        CaseflowConfig {
            plugins: PluginsConfig {
                dir: raw.plugins.dir.unwrap_or_else(caseflow_paths::plugin_dir),
                creation_delay_ms: raw
                    .plugins
                    .creation_delay_ms
                    .unwrap_or(DEFAULT_CREATION_DELAY_MS),
                poll_interval_ms: raw.plugins.poll_interval_ms,
                rewatch_interval_ms: raw
                    .plugins
                    .rewatch_interval_ms
                    .unwrap_or(DEFAULT_REWATCH_INTERVAL_MS),
            },
            registry: RegistryConfig {
                scheme: raw
                    .registry
                    .scheme
                    .unwrap_or_else(|| DEFAULT_SCHEME.to_string()),
                host: raw
                    .registry
                    .host
                    .unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: raw.registry.port.unwrap_or(DEFAULT_PORT),
                fetch_on_start: raw.registry.fetch_on_start.unwrap_or(false),
                sync_interval_secs: raw.registry.sync_interval_secs,
            },
        }
    }

    /// Load config from a specific path (for testing)
    #[cfg(test)]
    pub fn load_from_path(path: &Path) -> Result<CaseflowConfig> {
        if path.exists() {
            Ok(Self::finalize(Self::read_raw(path)?))
        } else {
            Ok(Self::finalize(RawCaseflowConfig::default()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nonexistent.toml");

        let config = ConfigLoader::load_from_path(&path).unwrap();

        assert_eq!(config.registry.port, 9292);
        assert_eq!(config.plugins.creation_delay_ms, 1000);
        assert!(!config.registry.fetch_on_start);
    }

    #[test]
    fn test_load_from_valid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[plugins]
dir = "/srv/caseflow/plugins"
poll_interval_ms = 1500

[registry]
host = "packages.internal"
fetch_on_start = true
"#
        )
        .unwrap();

        let config = ConfigLoader::load_from_path(&path).unwrap();

        assert_eq!(config.plugins.dir, PathBuf::from("/srv/caseflow/plugins"));
        assert_eq!(config.plugins.poll_interval_ms, Some(1500));
        assert_eq!(config.plugins.rewatch_interval_ms, 5000);
        assert_eq!(config.registry.host, "packages.internal");
        assert_eq!(config.registry.port, 9292);
        assert!(config.registry.fetch_on_start);
    }

    #[test]
    fn test_load_invalid_toml_returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("invalid.toml");

        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "this is not valid toml {{{{").unwrap();

        let result = ConfigLoader::load_from_path(&path);
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_raw_overlay_overrides_base() {
        let base = RawCaseflowConfig {
            plugins: RawPluginsConfig {
                dir: Some(PathBuf::from("/base/plugins")),
                creation_delay_ms: Some(500),
                ..Default::default()
            },
            registry: RawRegistryConfig {
                host: Some("base.internal".to_string()),
                port: Some(9000),
                ..Default::default()
            },
        };

        let overlay = RawCaseflowConfig {
            plugins: RawPluginsConfig {
                dir: Some(PathBuf::from("/project/plugins")),
                ..Default::default()
            },
            registry: RawRegistryConfig {
                port: Some(8080),
                fetch_on_start: Some(true),
                ..Default::default()
            },
        };

        let merged = ConfigLoader::merge_raw(base, overlay);

        assert_eq!(merged.plugins.dir, Some(PathBuf::from("/project/plugins")));
        // overlay's None falls through to base value via .or()
        assert_eq!(merged.plugins.creation_delay_ms, Some(500));
        assert_eq!(merged.registry.host, Some("base.internal".to_string()));
        assert_eq!(merged.registry.port, Some(8080));
        assert_eq!(merged.registry.fetch_on_start, Some(true));
    }

    #[test]
    fn test_user_config_path_is_under_config_dir() {
        let path = ConfigLoader::user_config_path();
        assert_eq!(path, caseflow_paths::config_dir().join("config.toml"));
        assert!(path.to_string_lossy().contains("caseflow"));
    }

    #[test]
    #[serial]
    fn test_project_config_path() {
        // SAFETY: serialized with other tests touching this variable
        unsafe { std::env::remove_var("CASEFLOW_PROJECT_CONFIG_DIR") };
        let path = ConfigLoader::project_config_path();
        assert_eq!(path, PathBuf::from(".caseflow/config.toml"));
    }

    #[test]
    #[serial]
    fn test_project_config_dir_override() {
        let temp_dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(temp_dir.path().join("config.toml")).unwrap();
        writeln!(file, "[registry]\nport = 7777").unwrap();

        // SAFETY: serialized with other tests touching this variable
        unsafe { std::env::set_var("CASEFLOW_PROJECT_CONFIG_DIR", temp_dir.path()) };
        let path = ConfigLoader::project_config_path();
        let config = ConfigLoader::load();
        unsafe { std::env::remove_var("CASEFLOW_PROJECT_CONFIG_DIR") };

        assert_eq!(path, temp_dir.path().join("config.toml"));
        assert_eq!(config.unwrap().registry.port, 7777);
    }
}
