//! Fetcher - downloads logic packages from the package registry
//!
//! Endpoints, relative to the registry URL:
//! - `GET /index.json[?name=<name>]`: JSON array of `{ "name", "version" }`
//! - `GET /packages/<name>-<version>.tar`: the package archive
//!
//! The fetcher only writes version directories; picking them up is the
//! watcher's job.

pub mod archive;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::version::{self, VersionMap};

/// One `(name, version)` pair published by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub name: String,
    pub version: String,
}

impl PackageRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Fetcher configuration
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Base URL of the package registry, e.g. `http://127.0.0.1:9292`
    pub registry_url: String,
    /// Where version directories are installed
    pub plugin_dir: PathBuf,
}

impl FetcherConfig {
    pub fn new(registry_url: impl Into<String>, plugin_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry_url: registry_url.into().trim_end_matches('/').to_string(),
            plugin_dir: plugin_dir.into(),
        }
    }
}

pub struct Fetcher {
    config: FetcherConfig,
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(config: FetcherConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    pub fn with_client(config: FetcherConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    pub fn index_url(&self) -> String {
        format!("{}/index.json", self.config.registry_url)
    }

    pub fn package_url(&self, name: &str, version: &str) -> String {
        format!("{}/packages/{name}-{version}.tar", self.config.registry_url)
    }

    /// Ask the registry which packages it publishes, optionally for one name
    pub async fn index(&self, name: Option<&str>) -> Result<Vec<PackageRef>, FetchError> {
        let url = self.index_url();
        let mut request = self.client.get(&url);
        if let Some(name) = name {
            request = request.query(&[("name", name)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url, status });
        }

        let packages: Vec<PackageRef> = response.json().await?;
        debug!(count = packages.len(), "Fetched package index");
        Ok(packages)
    }

    /// Greatest published version per name
    pub fn latest_versions(packages: impl IntoIterator<Item = PackageRef>) -> VersionMap {
        let mut latest = VersionMap::new();
        for package in packages {
            if version::is_newer(&package.version, latest.get(&package.name).map(String::as_str)) {
                latest.insert(package.name, package.version);
            }
        }
        latest
    }

    /// Bring the plugin directory up to date with the registry
    ///
    /// - no name: install the latest version of every package that is
    ///   missing or older on disk
    /// - name and version: install exactly that version
    /// - name only: install the latest published version of that name
    ///
    /// Returns `true` only if every required install succeeded. Installs that
    /// did succeed are kept either way.
    pub async fn fetch(&self, name: Option<&str>, version: Option<&str>) -> bool {
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        let version = version.map(str::trim).filter(|v| !v.is_empty());

        match (name, version) {
            (None, _) => self.fetch_all().await,
            (Some(name), Some(version)) => self.try_install(name, version).await,
            (Some(name), None) => match self.latest_version(name).await {
                Ok(latest) => self.try_install(name, &latest).await,
                Err(e) => {
                    warn!(package = %name, error = %e, "Cannot resolve latest version");
                    false
                }
            },
        }
    }

    async fn fetch_all(&self) -> bool {
        let packages = match self.index(None).await {
            Ok(packages) => packages,
            Err(e) => {
                warn!(url = %self.index_url(), error = %e, "Cannot fetch package index");
                return false;
            }
        };

        let installed = version::scan_versions(&self.config.plugin_dir);
        let mut all_installed = true;
        for (name, latest) in Self::latest_versions(packages) {
            if !version::is_newer(&latest, installed.get(&name).map(String::as_str)) {
                debug!(package = %name, version = %latest, "Package up to date");
                continue;
            }
            if !self.try_install(&name, &latest).await {
                all_installed = false;
            }
        }
        all_installed
    }

    async fn latest_version(&self, name: &str) -> Result<String, FetchError> {
        self.index(Some(name))
            .await?
            .into_iter()
            .filter(|package| package.name == name)
            .map(|package| package.version)
            .max()
            .ok_or_else(|| FetchError::NoVersions {
                name: name.to_string(),
            })
    }

    async fn try_install(&self, name: &str, version: &str) -> bool {
        match self.install(name, version).await {
            Ok(path) => {
                info!(package = %name, version = %version, path = %path.display(), "Package installed");
                true
            }
            Err(e) => {
                warn!(package = %name, version = %version, error = %e, "Package install failed");
                false
            }
        }
    }

    /// Download one package and install its `lib/` files
    pub async fn install(&self, name: &str, version: &str) -> Result<PathBuf, FetchError> {
        if version::parse_dir_name(&format!("{name}-{version}")).is_none() {
            return Err(FetchError::InvalidPackage {
                name: name.to_string(),
                version: version.to_string(),
            });
        }

        let url = self.package_url(name, version);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url, status });
        }
        let bytes = response.bytes().await?;

        let plugin_dir = self.config.plugin_dir.clone();
        let (name, version) = (name.to_string(), version.to_string());
        tokio::task::spawn_blocking(move || {
            archive::install_package(&bytes, &plugin_dir, &name, &version)
        })
        .await
        .map_err(|e| FetchError::Task(e.to_string()))?
    }
}
