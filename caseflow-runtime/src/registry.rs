//! LogicRegistry - name to active unit, with on-demand hot swap

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use caseflow_logic_api::normalize_identifier;
use chrono::Utc;

use crate::error::LoadError;
use crate::loader::{LogicHandle, LogicLoader};
use crate::module_info::ModuleInfo;
use crate::version;

/// Normalize a caller-supplied name into a registry key
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace('-', "_")
}

#[derive(Debug, Clone, Copy)]
enum Hook {
    Load,
    Unload,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Load => write!(f, "on_load"),
            Hook::Unload => write!(f, "on_unload"),
        }
    }
}

/// Active logic units keyed by name
///
/// `logic` and `unload` serialize per name; different names never wait on
/// each other, and snapshot reads never wait on a load in progress.
pub struct LogicRegistry {
    plugin_dir: PathBuf,
    loader: Arc<dyn LogicLoader>,
    modules: RwLock<HashMap<String, ModuleInfo>>,
    name_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LogicRegistry {
    pub fn new(plugin_dir: impl Into<PathBuf>, loader: Arc<dyn LogicLoader>) -> Self {
        Self {
            plugin_dir: plugin_dir.into(),
            loader,
            modules: RwLock::new(HashMap::new()),
            name_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    /// Resolve `name` to its active unit, loading or hot-swapping as needed
    ///
    /// Returns `None` when no version is installed or the first load fails.
    /// A failed reload keeps returning the previous unit.
    pub fn logic(&self, name: &str) -> Option<LogicHandle> {
        let name = normalize_name(name);
        if name.is_empty() {
            return None;
        }

        self.with_name_lock(&name, || {
            let current = self.modules_read().get(&name).cloned();
            match current {
                None => self.activate(&name),
                Some(current) => {
                    if version::reload_due(&self.plugin_dir, &name, Some(&current)) {
                        Some(self.hot_swap(&name, current))
                    } else {
                        Some(current.handle().clone())
                    }
                }
            }
        })
    }

    /// Snapshot of every active unit
    pub fn loaded_logics(&self) -> Vec<LogicHandle> {
        self.modules_read()
            .values()
            .map(|info| info.handle().clone())
            .collect()
    }

    /// Names of every active unit, sorted
    pub fn loaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules_read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn module_info(&self, name: &str) -> Option<ModuleInfo> {
        self.modules_read().get(&normalize_name(name)).cloned()
    }

    /// Fire the unit's unload hook and forget it
    ///
    /// Returns whether a unit was active.
    pub fn unload(&self, name: &str) -> bool {
        let name = normalize_name(name);
        self.with_name_lock(&name, || {
            let Some(info) = self.modules_write().remove(&name) else {
                return false;
            };
            run_hook(&name, &info, Hook::Unload);
            tracing::info!(logic = %name, version = %info.version(), "Logic unloaded");
            true
        })
    }

    pub fn unload_all(&self) {
        for name in self.loaded_names() {
            self.unload(&name);
        }
    }

    fn activate(&self, name: &str) -> Option<LogicHandle> {
        match self.load_fresh(name) {
            Ok(info) => {
                run_hook(name, &info, Hook::Load);
                let handle = info.handle().clone();
                tracing::info!(
                    logic = %name,
                    version = %info.version(),
                    path = %info.entry_path().display(),
                    "Logic loaded"
                );
                self.modules_write().insert(name.to_string(), info);
                Some(handle)
            }
            Err(LoadError::NotInstalled { .. }) => {
                tracing::warn!(logic = %name, "No such logic");
                None
            }
            Err(e) => {
                tracing::warn!(logic = %name, error = %e, "Failed to load logic");
                None
            }
        }
    }

    fn hot_swap(&self, name: &str, current: ModuleInfo) -> LogicHandle {
        let next = match self.load_fresh(name) {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(
                    logic = %name,
                    version = %current.version(),
                    error = %e,
                    "Reload failed, keeping active logic"
                );
                return current.handle().clone();
            }
        };

        // The old entry stays current until the insert below replaces it
        run_hook(name, &current, Hook::Unload);
        run_hook(name, &next, Hook::Load);

        let handle = next.handle().clone();
        tracing::info!(
            logic = %name,
            from = %current.version(),
            to = %next.version(),
            "Logic hot-swapped"
        );
        self.modules_write().insert(name.to_string(), next);
        handle
    }

    fn load_fresh(&self, name: &str) -> Result<ModuleInfo, LoadError> {
        let loaded_at = Utc::now();
        let version = version::greatest_version(&self.plugin_dir, name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| LoadError::NotInstalled {
                name: name.to_string(),
                dir: self.plugin_dir.clone(),
            })?;
        let entry =
            version::entry_file_path(&self.plugin_dir, name, &version, self.loader.extension());
        if !entry.is_file() {
            return Err(LoadError::EntryMissing { path: entry });
        }

        let loaded = panic::catch_unwind(AssertUnwindSafe(|| self.loader.load(&entry)))
            .map_err(|_| LoadError::Panicked {
                path: entry.clone(),
            })??;

        if normalize_identifier(loaded.name()) != normalize_identifier(name) {
            return Err(LoadError::NameMismatch {
                name: name.to_string(),
                found: loaded.name().to_string(),
                path: entry,
            });
        }

        Ok(ModuleInfo::new(version, loaded_at, entry, Arc::new(loaded)))
    }

    /// Run `f` holding the lock for `name`
    ///
    /// The lock entry is dropped again once no other caller holds or waits
    /// on it, so unknown names do not accumulate.
    fn with_name_lock<R>(&self, name: &str, f: impl FnOnce() -> R) -> R {
        let lock = self
            .name_locks()
            .entry(name.to_string())
            .or_default()
            .clone();

        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        // Clones are only taken and dropped under `name_locks`
        let mut locks = self.name_locks();
        if Arc::strong_count(&lock) == 2 {
            locks.remove(name);
        }
        drop(lock);
        result
    }

    fn name_locks(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
        self.name_locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn modules_read(&self) -> RwLockReadGuard<'_, HashMap<String, ModuleInfo>> {
        self.modules.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn modules_write(&self) -> RwLockWriteGuard<'_, HashMap<String, ModuleInfo>> {
        self.modules.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Run a lifecycle hook; failures and panics are logged, never propagated
fn run_hook(name: &str, info: &ModuleInfo, hook: Hook) {
    let unit = info.handle();
    let result = panic::catch_unwind(AssertUnwindSafe(|| match hook {
        Hook::Load => unit.on_load(),
        Hook::Unload => unit.on_unload(),
    }));

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(
                logic = %name,
                version = %info.version(),
                hook = %hook,
                error = %e,
                "Logic hook failed"
            );
        }
        Err(_) => {
            tracing::error!(
                logic = %name,
                version = %info.version(),
                hook = %hook,
                "Logic hook panicked"
            );
        }
    }
}
