//! Directory watcher for installed logic versions
//!
//! Watches the plugin root non-recursively. Version directories appearing or
//! disappearing update the [`VersionMap`] and drive the registry; losing the
//! root itself triggers a full rescan.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use notify::event::{ModifyKind, RemoveKind, RenameMode};
use notify::{EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info, warn};

use crate::error::WatchError;
use crate::registry::LogicRegistry;
use crate::version::{self, VersionMap};

/// Watcher configuration
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Directory holding `<name>-<version>` subdirectories
    pub plugin_dir: PathBuf,
    /// Wait after a directory is created before loading from it
    pub creation_delay: Duration,
    /// Poll the directory at this period instead of using native events
    pub poll_interval: Option<Duration>,
    /// How often to retry watching while the plugin directory is missing
    pub rewatch_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            plugin_dir: caseflow_paths::plugin_dir(),
            creation_delay: Duration::from_secs(1),
            poll_interval: None,
            rewatch_interval: Duration::from_secs(5),
        }
    }
}

impl WatcherConfig {
    pub fn new(plugin_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_creation_delay(mut self, delay: Duration) -> Self {
        self.creation_delay = delay;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn with_rewatch_interval(mut self, interval: Duration) -> Self {
        self.rewatch_interval = interval;
        self
    }
}

/// Filesystem change relevant to the plugin root
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The plugin root was deleted or moved away
    RootRemoved,
    /// A child was created
    Created(PathBuf),
    /// A child was moved into the root
    RenamedIn(PathBuf),
    /// A child was deleted
    Removed(PathBuf),
    /// A child was moved out of the root
    RenamedOut(PathBuf),
}

impl WatchEvent {
    /// Map a raw notification onto watch events for `root`
    ///
    /// Only direct children are considered. File creations and removals are
    /// dropped; kinds the backend cannot classify are kept and sorted out
    /// when processed.
    pub fn from_notify(root: &Path, event: &notify::Event) -> Vec<WatchEvent> {
        let is_child = |path: &Path| path.parent() == Some(root);
        let mut events = Vec::new();

        for path in &event.paths {
            if path == root {
                if matches!(
                    event.kind,
                    EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
                ) {
                    events.push(WatchEvent::RootRemoved);
                }
                continue;
            }
            if !is_child(path) {
                continue;
            }

            let mapped = match event.kind {
                EventKind::Create(notify::event::CreateKind::File) => None,
                EventKind::Create(_) => Some(WatchEvent::Created(path.clone())),
                EventKind::Remove(RemoveKind::File) => None,
                EventKind::Remove(_) => Some(WatchEvent::Removed(path.clone())),
                EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                    Some(WatchEvent::RenamedOut(path.clone()))
                }
                EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                    Some(WatchEvent::RenamedIn(path.clone()))
                }
                // Backends that cannot pair renames report one side only
                EventKind::Modify(ModifyKind::Name(RenameMode::Any | RenameMode::Other)) => {
                    if path.exists() {
                        Some(WatchEvent::RenamedIn(path.clone()))
                    } else {
                        Some(WatchEvent::RenamedOut(path.clone()))
                    }
                }
                // inotify repeats paired renames as From + To first
                _ => None,
            };
            events.extend(mapped);
        }

        events
    }
}

enum Signal {
    Fs(notify::Result<notify::Event>),
    Shutdown,
}

/// Keeps the registry in step with the plugin directory
pub struct DirectoryWatcher {
    config: WatcherConfig,
    registry: Arc<LogicRegistry>,
    versions: RwLock<VersionMap>,
    subscription: Mutex<Option<Box<dyn Watcher + Send>>>,
    running: AtomicBool,
    signal_tx: Sender<Signal>,
    signal_rx: Mutex<Option<Receiver<Signal>>>,
}

impl DirectoryWatcher {
    /// Create a watcher; the version map starts from a scan of the directory
    pub fn new(config: WatcherConfig, registry: Arc<LogicRegistry>) -> Self {
        let (signal_tx, signal_rx) = mpsc::channel();
        let versions = version::scan_versions(&config.plugin_dir);

        Self {
            config,
            registry,
            versions: RwLock::new(versions),
            subscription: Mutex::new(None),
            running: AtomicBool::new(false),
            signal_tx,
            signal_rx: Mutex::new(Some(signal_rx)),
        }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<LogicRegistry> {
        &self.registry
    }

    /// Snapshot of the recorded latest versions
    pub fn version_map(&self) -> VersionMap {
        self.versions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a filesystem subscription is currently active
    pub fn is_watching(&self) -> bool {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Subscribe, load everything installed and spawn the watcher thread
    ///
    /// Can only be started once.
    pub fn start(self: &Arc<Self>) -> Result<WatcherHandle, WatchError> {
        let rx = self
            .signal_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(WatchError::AlreadyStarted)?;

        self.running.store(true, Ordering::SeqCst);
        self.reload_all();

        let watcher = Arc::clone(self);
        let thread = thread::Builder::new()
            .name("caseflow-watcher".to_string())
            .spawn(move || watcher.run(rx))
            .map_err(WatchError::Spawn)?;

        info!(dir = %self.config.plugin_dir.display(), "Watching plugin directory");
        Ok(WatcherHandle {
            watcher: Arc::clone(self),
            signal_tx: self.signal_tx.clone(),
            thread: Some(thread),
        })
    }

    /// React to one filesystem change
    pub fn process(&self, event: WatchEvent) {
        match event {
            WatchEvent::RootRemoved => {
                info!(
                    dir = %self.config.plugin_dir.display(),
                    "Plugin directory removed or moved, rescanning"
                );
                self.reload_all();
            }
            WatchEvent::Created(path) => self.on_appeared(&path, self.config.creation_delay),
            WatchEvent::RenamedIn(path) => self.on_appeared(&path, Duration::ZERO),
            WatchEvent::Removed(path) | WatchEvent::RenamedOut(path) => self.on_disappeared(&path),
        }
    }

    /// Unload everything, rescan, resubscribe and load every name found
    pub fn reload_all(&self) {
        self.registry.unload_all();

        let versions = version::scan_versions(&self.config.plugin_dir);
        *self.versions.write().unwrap_or_else(PoisonError::into_inner) = versions.clone();

        self.resubscribe();

        for name in versions.keys() {
            self.resolve(name);
        }
        info!(count = versions.len(), "Rescanned plugin directory");
    }

    fn on_appeared(&self, path: &Path, delay: Duration) {
        if !path.is_dir() {
            debug!(path = %path.display(), "Ignoring non-directory entry");
            return;
        }
        let Some((name, found)) = version::parse_dir_path(path) else {
            debug!(path = %path.display(), "Ignoring unrecognized directory");
            return;
        };

        {
            let mut versions = self.versions.write().unwrap_or_else(PoisonError::into_inner);
            if version::is_newer(&found, versions.get(&name).map(String::as_str)) {
                versions.insert(name.clone(), found.clone());
            }
        }
        debug!(logic = %name, version = %found, "Version directory appeared");

        if !delay.is_zero() {
            thread::sleep(delay);
        }
        self.resolve(&name);
    }

    fn on_disappeared(&self, path: &Path) {
        let Some((name, gone)) = version::parse_dir_path(path) else {
            return;
        };

        let recorded = self
            .versions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name)
            .cloned();
        if recorded.as_deref() != Some(gone.as_str()) {
            debug!(logic = %name, version = %gone, "Superseded version removed");
            return;
        }

        self.registry.unload(&name);
        self.versions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&name);

        match version::greatest_version(&self.config.plugin_dir, &name) {
            Some(remaining) => {
                info!(logic = %name, removed = %gone, next = %remaining, "Falling back to remaining version");
                self.versions
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(name.clone(), remaining);
                self.resolve(&name);
            }
            None => {
                info!(logic = %name, version = %gone, "Last installed version removed");
            }
        }
    }

    fn resolve(&self, name: &str) {
        if self.registry.logic(name).is_none() {
            debug!(logic = %name, "Logic not resolved");
        }
    }

    fn resubscribe(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        let mut subscription = self.subscription.lock().unwrap_or_else(PoisonError::into_inner);
        // Drop the old subscription before creating a new one
        *subscription = None;
        match self.subscribe() {
            Ok(watcher) => *subscription = Some(watcher),
            Err(e) => {
                error!(
                    dir = %self.config.plugin_dir.display(),
                    error = %e,
                    "Cannot watch plugin directory, will retry"
                );
            }
        }
    }

    fn subscribe(&self) -> Result<Box<dyn Watcher + Send>, WatchError> {
        let root = &self.config.plugin_dir;
        if !root.is_dir() {
            return Err(WatchError::DirMissing { path: root.clone() });
        }

        let tx = self.signal_tx.clone();
        let handler = move |res: notify::Result<notify::Event>| {
            let _ = tx.send(Signal::Fs(res));
        };

        let mut watcher: Box<dyn Watcher + Send> = match self.config.poll_interval {
            Some(interval) => Box::new(PollWatcher::new(
                handler,
                notify::Config::default().with_poll_interval(interval),
            )?),
            None => Box::new(RecommendedWatcher::new(handler, notify::Config::default())?),
        };
        watcher.watch(root, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    }

    fn run(&self, rx: Receiver<Signal>) {
        loop {
            let signal = if self.is_watching() {
                rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
            } else {
                rx.recv_timeout(self.config.rewatch_interval)
            };

            match signal {
                Ok(Signal::Fs(Ok(event))) => {
                    for change in WatchEvent::from_notify(&self.config.plugin_dir, &event) {
                        self.process(change);
                    }
                }
                Ok(Signal::Fs(Err(e))) => warn!(error = %e, "Filesystem watch error"),
                Ok(Signal::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    if self.config.plugin_dir.is_dir() {
                        info!(
                            dir = %self.config.plugin_dir.display(),
                            "Plugin directory is back, rescanning"
                        );
                        self.reload_all();
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        *self.subscription.lock().unwrap_or_else(PoisonError::into_inner) = None;
        debug!("Watcher thread stopped");
    }
}

/// Owns the watcher thread; stops it on drop
pub struct WatcherHandle {
    watcher: Arc<DirectoryWatcher>,
    signal_tx: Sender<Signal>,
    thread: Option<JoinHandle<()>>,
}

impl WatcherHandle {
    pub fn watcher(&self) -> &Arc<DirectoryWatcher> {
        &self.watcher
    }

    /// Stop the thread and drop the subscription; loaded units stay loaded
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.signal_tx.send(Signal::Shutdown);
        if thread.join().is_err() {
            error!("Watcher thread panicked");
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::BuiltinLoader;
    use caseflow_logic_api::{Logic, LogicManifest};
    use notify::event::CreateKind;
    use std::fs;
    use tempfile::TempDir;

    struct Named(&'static str);

    impl Logic for Named {
        fn manifest(&self) -> LogicManifest {
            LogicManifest {
                name: self.0.to_string(),
                ..Default::default()
            }
        }
    }

    fn install(root: &Path, name: &str, version: &str) -> PathBuf {
        let entry = version::entry_file_path(root, name, version, BuiltinLoader::DEFAULT_EXTENSION);
        fs::create_dir_all(entry.parent().unwrap()).unwrap();
        fs::write(&entry, b"").unwrap();
        version::version_dir(root, name, version)
    }

    fn watcher(root: &Path) -> DirectoryWatcher {
        let loader = BuiltinLoader::new();
        loader.register("foo", || Box::new(Named("foo")));
        let registry = Arc::new(LogicRegistry::new(root, Arc::new(loader)));
        DirectoryWatcher::new(
            WatcherConfig::new(root).with_creation_delay(Duration::ZERO),
            registry,
        )
    }

    fn event(kind: EventKind, paths: &[&Path]) -> notify::Event {
        paths
            .iter()
            .fold(notify::Event::new(kind), |ev, p| ev.add_path(p.to_path_buf()))
    }

    #[test]
    fn test_from_notify_maps_child_events() {
        let root = Path::new("/plugins");
        let child = root.join("foo-1.0");

        let created = event(EventKind::Create(CreateKind::Folder), &[&child]);
        assert_eq!(
            WatchEvent::from_notify(root, &created),
            vec![WatchEvent::Created(child.clone())]
        );

        let removed = event(EventKind::Remove(RemoveKind::Folder), &[&child]);
        assert_eq!(
            WatchEvent::from_notify(root, &removed),
            vec![WatchEvent::Removed(child.clone())]
        );

        let moved_in = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &[&child],
        );
        assert_eq!(
            WatchEvent::from_notify(root, &moved_in),
            vec![WatchEvent::RenamedIn(child.clone())]
        );

        let moved_out = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &[&child],
        );
        assert_eq!(
            WatchEvent::from_notify(root, &moved_out),
            vec![WatchEvent::RenamedOut(child)]
        );
    }

    #[test]
    fn test_from_notify_drops_files_and_grandchildren() {
        let root = Path::new("/plugins");

        let file = event(
            EventKind::Create(CreateKind::File),
            &[&root.join("foo-1.0")],
        );
        assert!(WatchEvent::from_notify(root, &file).is_empty());

        let nested = event(
            EventKind::Create(CreateKind::Folder),
            &[&root.join("foo-1.0").join("lib")],
        );
        assert!(WatchEvent::from_notify(root, &nested).is_empty());

        let paired = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &[&root.join("a-1"), &root.join("a-2")],
        );
        assert!(WatchEvent::from_notify(root, &paired).is_empty());
    }

    #[test]
    fn test_from_notify_detects_root_removal() {
        let root = Path::new("/plugins");

        let deleted = event(EventKind::Remove(RemoveKind::Folder), &[root]);
        assert_eq!(
            WatchEvent::from_notify(root, &deleted),
            vec![WatchEvent::RootRemoved]
        );

        let moved = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Any)),
            &[root],
        );
        assert_eq!(
            WatchEvent::from_notify(root, &moved),
            vec![WatchEvent::RootRemoved]
        );
    }

    #[test]
    fn test_new_scans_existing_versions() {
        let dir = TempDir::new().unwrap();
        install(dir.path(), "foo", "0.0.1");
        install(dir.path(), "foo", "0.0.2");

        let watcher = watcher(dir.path());

        assert_eq!(watcher.version_map()["foo"], "0.0.2");
        assert!(!watcher.is_watching());
    }

    #[test]
    fn test_created_directory_is_loaded() {
        let dir = TempDir::new().unwrap();
        let watcher = watcher(dir.path());
        let path = install(dir.path(), "foo", "1.0");

        watcher.process(WatchEvent::Created(path));

        assert_eq!(watcher.version_map()["foo"], "1.0");
        assert!(watcher.registry().module_info("foo").is_some());
    }

    #[test]
    fn test_unrecognized_directory_is_ignored() {
        let dir = TempDir::new().unwrap();
        let watcher = watcher(dir.path());
        let path = dir.path().join("Not-A-Version");
        fs::create_dir(&path).unwrap();

        watcher.process(WatchEvent::RenamedIn(path));

        assert!(watcher.version_map().is_empty());
    }

    #[test]
    fn test_removed_last_version_unloads() {
        let dir = TempDir::new().unwrap();
        let path = install(dir.path(), "foo", "1.0");
        let watcher = watcher(dir.path());
        watcher.registry().logic("foo").unwrap();

        fs::remove_dir_all(&path).unwrap();
        watcher.process(WatchEvent::Removed(path));

        assert!(watcher.version_map().is_empty());
        assert!(watcher.registry().loaded_names().is_empty());
    }

    #[test]
    fn test_reload_all_without_subscription_rebuilds_state() {
        let dir = TempDir::new().unwrap();
        let watcher = watcher(dir.path());
        install(dir.path(), "foo", "2.0");

        watcher.reload_all();

        assert_eq!(watcher.version_map()["foo"], "2.0");
        assert_eq!(watcher.registry().loaded_names(), vec!["foo".to_string()]);
        assert!(!watcher.is_watching());
    }
}
