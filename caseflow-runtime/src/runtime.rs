//! Wiring of registry, watcher and fetcher

use std::sync::Arc;

use crate::dispatch::LogicDispatcher;
use crate::error::WatchError;
use crate::fetcher::{Fetcher, FetcherConfig};
use crate::loader::LogicLoader;
use crate::registry::LogicRegistry;
use crate::version::VersionMap;
use crate::watcher::{DirectoryWatcher, WatcherConfig, WatcherHandle};

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub watcher: WatcherConfig,
    /// Base URL of the package registry
    pub registry_url: String,
}

/// A running logic runtime
///
/// Dropping it stops the watcher thread; active units stay loaded until the
/// registry itself is dropped.
pub struct LogicRuntime {
    registry: Arc<LogicRegistry>,
    fetcher: Fetcher,
    watcher: WatcherHandle,
}

impl LogicRuntime {
    /// Load everything installed and start watching the plugin directory
    ///
    /// A missing plugin directory is not an error; it is picked up once it
    /// appears.
    pub fn start(config: RuntimeConfig, loader: Arc<dyn LogicLoader>) -> Result<Self, WatchError> {
        let plugin_dir = config.watcher.plugin_dir.clone();
        let registry = Arc::new(LogicRegistry::new(&plugin_dir, loader));
        let watcher = Arc::new(DirectoryWatcher::new(config.watcher, Arc::clone(&registry)));
        let watcher = watcher.start()?;
        let fetcher = Fetcher::new(FetcherConfig::new(config.registry_url, plugin_dir));

        Ok(Self {
            registry,
            fetcher,
            watcher,
        })
    }

    pub fn registry(&self) -> &Arc<LogicRegistry> {
        &self.registry
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn dispatcher(&self) -> LogicDispatcher {
        LogicDispatcher::new(Arc::clone(&self.registry))
    }

    pub fn version_map(&self) -> VersionMap {
        self.watcher.watcher().version_map()
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.watcher().is_watching()
    }

    /// Stop watching and unload every unit
    pub fn shutdown(self) {
        self.watcher.stop();
        self.registry.unload_all();
        tracing::info!("Logic runtime stopped");
    }
}
