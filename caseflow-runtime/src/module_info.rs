//! Bookkeeping for one active logic unit

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::loader::LogicHandle;

/// The currently active unit for one name
///
/// Cloning is cheap: the handle is reference counted. A `ModuleInfo` never
/// changes after construction, a hot swap replaces it whole.
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    version: String,
    loaded_at: DateTime<Utc>,
    entry_path: PathBuf,
    handle: LogicHandle,
}

impl ModuleInfo {
    pub fn new(
        version: impl Into<String>,
        loaded_at: DateTime<Utc>,
        entry_path: impl Into<PathBuf>,
        handle: LogicHandle,
    ) -> Self {
        Self {
            version: version.into(),
            loaded_at,
            entry_path: entry_path.into(),
            handle,
        }
    }

    /// Version directory the unit was loaded from
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Taken when the load started, before the entry file was read
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn entry_path(&self) -> &Path {
        &self.entry_path
    }

    pub fn handle(&self) -> &LogicHandle {
        &self.handle
    }
}
