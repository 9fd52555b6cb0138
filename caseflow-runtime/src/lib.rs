//! caseflow-runtime - hot-swappable business logic for caseflow
//!
//! Logic units are installed as versioned directories in a plugin directory:
//!
//! ```text
//! <plugin_dir>/<name>-<version>/lib/<name>.<ext>
//! ```
//!
//! The [`Fetcher`] downloads packages into that directory, the
//! [`DirectoryWatcher`] notices new and removed versions, and the
//! [`LogicRegistry`] hands out the active unit for a name, swapping in a newer
//! version the next time it is asked for after one appears.

pub mod dispatch;
pub mod error;
pub mod fetcher;
pub mod loader;
pub mod module_info;
pub mod registry;
pub mod runtime;
pub mod version;
pub mod watcher;

pub use dispatch::LogicDispatcher;
pub use error::{DispatchError, FetchError, LoadError, WatchError};
pub use fetcher::{Fetcher, FetcherConfig, PackageRef};
pub use loader::{BuiltinLoader, DylibLoader, LoadedLogic, LogicFactory, LogicHandle, LogicLoader};
pub use module_info::ModuleInfo;
pub use registry::LogicRegistry;
pub use runtime::{LogicRuntime, RuntimeConfig};
pub use version::VersionMap;
pub use watcher::{DirectoryWatcher, WatchEvent, WatcherConfig, WatcherHandle};
