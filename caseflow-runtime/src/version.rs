//! Version directory naming and the reload decision
//!
//! Installed units live in `<plugin_dir>/<name>-<version>/`. Versions are
//! compared as plain strings, so `"10"` sorts before `"9"`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::module_info::ModuleInfo;

/// Latest on-disk version per unit name
pub type VersionMap = BTreeMap<String, String>;

static DIR_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z][a-z0-9_]*)-([0-9.]*)$").expect("directory name pattern is valid")
});

/// Split a version directory name into `(name, version)`
pub fn parse_dir_name(dir_name: &str) -> Option<(String, String)> {
    let caps = DIR_NAME.captures(dir_name)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// Same as [`parse_dir_name`], applied to the last path component
pub fn parse_dir_path(path: &Path) -> Option<(String, String)> {
    parse_dir_name(path.file_name()?.to_str()?)
}

/// Whether `candidate` should replace the `recorded` version
pub fn is_newer(candidate: &str, recorded: Option<&str>) -> bool {
    recorded.is_none_or(|recorded| candidate > recorded)
}

fn version_dirs(plugin_dir: &Path) -> Vec<(String, String)> {
    let Ok(entries) = fs::read_dir(plugin_dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| parse_dir_name(entry.file_name().to_str()?))
        .collect()
}

/// Rescan the plugin directory, keeping the greatest version per name
pub fn scan_versions(plugin_dir: &Path) -> VersionMap {
    let mut versions = VersionMap::new();
    for (name, version) in version_dirs(plugin_dir) {
        if is_newer(&version, versions.get(&name).map(String::as_str)) {
            versions.insert(name, version);
        }
    }
    versions
}

/// Greatest version directory on disk for one name
pub fn greatest_version(plugin_dir: &Path, name: &str) -> Option<String> {
    version_dirs(plugin_dir)
        .into_iter()
        .filter(|(dir_name, _)| dir_name == name)
        .map(|(_, version)| version)
        .max()
}

/// Whether the plugin root's mtime is later than `since`
///
/// An unreadable directory counts as unmodified.
pub fn directory_modified_since(plugin_dir: &Path, since: DateTime<Utc>) -> bool {
    match fs::metadata(plugin_dir).and_then(|meta| meta.modified()) {
        Ok(mtime) => DateTime::<Utc>::from(mtime) > since,
        Err(_) => false,
    }
}

/// Whether the greatest version on disk is non-empty and differs from `recorded`
pub fn newer_version_on_disk(plugin_dir: &Path, name: &str, recorded: &str) -> bool {
    greatest_version(plugin_dir, name).is_some_and(|v| !v.is_empty() && v != recorded)
}

/// Decide whether `name` has to be (re)loaded
///
/// With nothing loaded the answer is whether any version is installed.
/// Otherwise the root must have changed since the load and carry a
/// different greatest version.
pub fn reload_due(plugin_dir: &Path, name: &str, current: Option<&ModuleInfo>) -> bool {
    match current {
        None => greatest_version(plugin_dir, name).is_some_and(|v| !v.is_empty()),
        Some(info) => {
            directory_modified_since(plugin_dir, info.loaded_at())
                && newer_version_on_disk(plugin_dir, name, info.version())
        }
    }
}

/// `<plugin_dir>/<name>-<version>`
pub fn version_dir(plugin_dir: &Path, name: &str, version: &str) -> PathBuf {
    plugin_dir.join(format!("{name}-{version}"))
}

/// `<plugin_dir>/<name>-<version>/lib/<name>.<extension>`
pub fn entry_file_path(plugin_dir: &Path, name: &str, version: &str, extension: &str) -> PathBuf {
    version_dir(plugin_dir, name, version)
        .join("lib")
        .join(format!("{name}.{extension}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mkdirs(root: &Path, names: &[&str]) {
        for name in names {
            fs::create_dir_all(root.join(name)).unwrap();
        }
    }

    #[test]
    fn test_parse_dir_name_accepts_valid_names() {
        assert_eq!(
            parse_dir_name("case_intake-1.2.0"),
            Some(("case_intake".to_string(), "1.2.0".to_string()))
        );
        assert_eq!(
            parse_dir_name("foo-"),
            Some(("foo".to_string(), String::new()))
        );
    }

    #[test]
    fn test_parse_dir_name_rejects_invalid_names() {
        assert_eq!(parse_dir_name("Foo-1.0"), None);
        assert_eq!(parse_dir_name("1foo-1.0"), None);
        assert_eq!(parse_dir_name("foo-1.0-beta"), None);
        assert_eq!(parse_dir_name("foo"), None);
        assert_eq!(parse_dir_name(".staging-abc"), None);
        assert_eq!(parse_dir_name("foo-bar-1.0"), None);
    }

    #[test]
    fn test_is_newer_compares_strings() {
        assert!(is_newer("0.0.2", Some("0.0.1")));
        assert!(!is_newer("0.0.1", Some("0.0.1")));
        assert!(is_newer("0.0.1", None));
        assert!(!is_newer("10", Some("9")));
    }

    #[test]
    fn test_scan_versions_keeps_greatest_per_name() {
        let dir = TempDir::new().unwrap();
        mkdirs(
            dir.path(),
            &["foo-0.0.1", "foo-0.0.2", "bar-1.0", "Not-valid", "baz"],
        );
        fs::write(dir.path().join("qux-1.0"), b"a file, not a directory").unwrap();

        let versions = scan_versions(dir.path());

        assert_eq!(versions.len(), 2);
        assert_eq!(versions["foo"], "0.0.2");
        assert_eq!(versions["bar"], "1.0");
    }

    #[test]
    fn test_scan_versions_of_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(scan_versions(&dir.path().join("missing")).is_empty());
    }

    #[test]
    fn test_greatest_version_is_lexicographic() {
        let dir = TempDir::new().unwrap();
        mkdirs(dir.path(), &["foo-9", "foo-10"]);

        assert_eq!(greatest_version(dir.path(), "foo").as_deref(), Some("9"));
        assert_eq!(greatest_version(dir.path(), "bar"), None);
    }

    #[test]
    fn test_directory_modified_since_compares_mtime() {
        let dir = TempDir::new().unwrap();
        let long_ago = DateTime::<Utc>::from(std::time::UNIX_EPOCH);

        assert!(directory_modified_since(dir.path(), long_ago));
        assert!(!directory_modified_since(
            dir.path(),
            Utc::now() + chrono::Duration::hours(1)
        ));
        assert!(!directory_modified_since(
            &dir.path().join("missing"),
            long_ago
        ));
    }

    #[test]
    fn test_newer_version_on_disk_ignores_empty_and_equal() {
        let dir = TempDir::new().unwrap();
        mkdirs(dir.path(), &["foo-", "bar-1.0"]);

        assert!(!newer_version_on_disk(dir.path(), "foo", "0.1"));
        assert!(!newer_version_on_disk(dir.path(), "bar", "1.0"));
        assert!(newer_version_on_disk(dir.path(), "bar", "0.9"));
    }

    #[test]
    fn test_reload_due_without_module_info_checks_disk() {
        let dir = TempDir::new().unwrap();
        assert!(!reload_due(dir.path(), "foo", None));

        mkdirs(dir.path(), &["foo-0.1"]);
        assert!(reload_due(dir.path(), "foo", None));
    }

    #[test]
    fn test_entry_file_path_layout() {
        let path = entry_file_path(Path::new("/plugins"), "foo", "0.0.2", "so");
        assert_eq!(path, PathBuf::from("/plugins/foo-0.0.2/lib/foo.so"));
    }
}
