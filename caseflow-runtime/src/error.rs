//! Error types for caseflow-runtime

use std::path::PathBuf;

use caseflow_logic_api::LogicError;
use thiserror::Error;

/// Errors raised while turning an installed package into an active unit
#[derive(Error, Debug)]
pub enum LoadError {
    /// No `<name>-<version>` directory exists for the name
    #[error("No installed version of '{name}' in {dir}")]
    NotInstalled { name: String, dir: PathBuf },

    /// The version directory has no entry file
    #[error("Entry file not found: {path}")]
    EntryMissing { path: PathBuf },

    /// Failed to open the shared library or resolve a symbol
    #[error("Failed to load logic library: {0}")]
    Library(#[from] libloading::Error),

    /// API version mismatch between caseflow and the unit
    #[error("API version mismatch: caseflow expects {expected}, unit has {found}")]
    ApiVersionMismatch { expected: u32, found: u32 },

    /// The entry point handed back a null unit
    #[error("Entry point in {path} returned no logic unit")]
    NullInstance { path: PathBuf },

    /// The entry file produced a unit with a different name
    #[error("No logic named '{name}' in {path} (unit declares '{found}')")]
    NameMismatch {
        name: String,
        found: String,
        path: PathBuf,
    },

    /// No in-process factory is registered for the name
    #[error("No builtin logic registered for '{name}'")]
    UnknownBuiltin { name: String },

    /// The loader panicked
    #[error("Loading {path} panicked")]
    Panicked { path: PathBuf },
}

/// Errors raised while downloading or installing a package
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The registry answered with a non-success status
    #[error("Registry returned {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The index lists no version for the name
    #[error("Registry lists no versions of '{name}'")]
    NoVersions { name: String },

    /// Name or version would not form a valid package directory
    #[error("Invalid package reference '{name}-{version}'")]
    InvalidPackage { name: String, version: String },

    /// The package has no inner data archive
    #[error("Package {name}-{version} has no data.tar.gz entry")]
    MissingDataArchive { name: String, version: String },

    /// The package installs nothing under lib/
    #[error("Package {name}-{version} contains no lib/ files")]
    EmptyPackage { name: String, version: String },

    /// Corrupt tar or gzip stream
    #[error("Archive error: {0}")]
    Archive(#[source] std::io::Error),

    /// Extraction task failed to complete
    #[error("Install task failed: {0}")]
    Task(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced to callers invoking logic by name
#[derive(Error, Debug)]
pub enum DispatchError {
    /// No unit is (or can be) loaded for the name
    #[error("No such logic: '{name}'")]
    LogicNotFound { name: String },

    /// The unit's function returned an error
    #[error("Logic '{name}' failed in '{function}': {source}")]
    Invocation {
        name: String,
        function: String,
        #[source]
        source: LogicError,
    },

    /// The unit's function panicked
    #[error("Logic '{name}' panicked in '{function}'")]
    Panicked { name: String, function: String },
}

/// Errors from the directory watcher
#[derive(Error, Debug)]
pub enum WatchError {
    /// The plugin directory does not exist
    #[error("Plugin directory not found: {path}")]
    DirMissing { path: PathBuf },

    /// The filesystem notification backend failed
    #[error("Watch error: {0}")]
    Notify(#[from] notify::Error),

    /// `start` was called twice on the same watcher
    #[error("Watcher already started")]
    AlreadyStarted,

    /// The watcher thread could not be started
    #[error("Failed to start watcher thread: {0}")]
    Spawn(#[source] std::io::Error),
}
