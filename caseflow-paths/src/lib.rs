//! XDG Base Directory paths for caseflow.
//!
//! The service keeps its configuration under the XDG config home and its
//! installed business-logic packages under the XDG data home, the same way on
//! every platform.

use std::path::PathBuf;

/// Get the caseflow config directory.
///
/// Returns `$XDG_CONFIG_HOME/caseflow` if set, otherwise `~/.config/caseflow`.
///
/// # Examples
///
/// ```
/// use caseflow_paths::config_dir;
///
/// let config = config_dir();
/// let file = config.join("config.toml");
/// ```
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join("caseflow")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config/caseflow")
    } else {
        PathBuf::from(".config/caseflow")
    }
}

/// Get the caseflow data directory.
///
/// Returns `$XDG_DATA_HOME/caseflow` if set, otherwise `~/.local/share/caseflow`.
pub fn data_dir() -> PathBuf {
    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data).join("caseflow")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".local/share/caseflow")
    } else {
        PathBuf::from(".local/share/caseflow")
    }
}

/// Default plugin directory: `<data_dir>/plugins`.
///
/// Versioned logic packages are installed here as `<name>-<version>/`.
pub fn plugin_dir() -> PathBuf {
    data_dir().join("plugins")
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both env-var tests mutate process state; keep them in one test so they
    // never interleave.
    #[test]
    fn test_dirs_respect_xdg_env() {
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", "/tmp/test-config");
            std::env::set_var("XDG_DATA_HOME", "/tmp/test-data");
        }
        assert_eq!(config_dir(), PathBuf::from("/tmp/test-config/caseflow"));
        assert_eq!(data_dir(), PathBuf::from("/tmp/test-data/caseflow"));
        assert_eq!(
            plugin_dir(),
            PathBuf::from("/tmp/test-data/caseflow/plugins")
        );
        unsafe {
            std::env::remove_var("XDG_CONFIG_HOME");
            std::env::remove_var("XDG_DATA_HOME");
        }
    }

    #[test]
    fn test_plugin_dir_ends_with_plugins() {
        let path = plugin_dir();
        assert!(path.ends_with("plugins"));
    }
}
