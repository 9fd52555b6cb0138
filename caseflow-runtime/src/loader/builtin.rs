//! In-process units, for statically linked logic and tests

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use caseflow_logic_api::{Logic, normalize_identifier};

use super::{LoadedLogic, LogicLoader};
use crate::error::LoadError;

/// Builds a fresh unit instance
pub type LogicFactory = Arc<dyn Fn() -> Box<dyn Logic> + Send + Sync>;

/// Loader backed by registered factories
///
/// The entry file still has to exist in the version directory, it only
/// selects the factory by its file stem. Installing and removing version
/// directories therefore drives activation exactly as for shared libraries.
pub struct BuiltinLoader {
    extension: String,
    factories: RwLock<HashMap<String, LogicFactory>>,
}

impl BuiltinLoader {
    pub const DEFAULT_EXTENSION: &'static str = "logic";

    pub fn new() -> Self {
        Self::with_extension(Self::DEFAULT_EXTENSION)
    }

    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Register a factory, replacing any previous one for the name
    pub fn register<F>(&self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Logic> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize_identifier(name), Arc::new(factory));
    }

    /// Returns whether a factory was registered
    pub fn unregister(&self, name: &str) -> bool {
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&normalize_identifier(name))
            .is_some()
    }

    fn factory(&self, name: &str) -> Option<LogicFactory> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize_identifier(name))
            .cloned()
    }
}

impl Default for BuiltinLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicLoader for BuiltinLoader {
    fn extension(&self) -> &str {
        &self.extension
    }

    fn load(&self, entry: &Path) -> Result<LoadedLogic, LoadError> {
        if !entry.is_file() {
            return Err(LoadError::EntryMissing {
                path: entry.to_path_buf(),
            });
        }
        let name = entry
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        let factory = self.factory(name).ok_or_else(|| LoadError::UnknownBuiltin {
            name: name.to_string(),
        })?;
        Ok(LoadedLogic::new(factory(), entry))
    }
}
