//! Turning an entry file into a live logic unit

mod builtin;
mod dylib;

pub use builtin::{BuiltinLoader, LogicFactory};
pub use dylib::DylibLoader;

use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use caseflow_logic_api::{Logic, LogicError, LogicManifest, Value};
use libloading::Library;

use crate::error::LoadError;

/// Strategy for loading entry files of one kind
pub trait LogicLoader: Send + Sync {
    /// Extension of the entry files this loader understands, without the dot
    fn extension(&self) -> &str;

    /// Load the unit defined by `entry`
    fn load(&self, entry: &Path) -> Result<LoadedLogic, LoadError>;
}

/// Shared handle to an active unit
pub type LogicHandle = Arc<LoadedLogic>;

/// Destructor exported by a shared library as `_caseflow_logic_destroy`
pub(crate) type DestroyFn = extern "C" fn(*mut dyn Logic);

/// Owns a unit instance and frees it where it was allocated
struct Instance {
    logic: ManuallyDrop<Box<dyn Logic>>,
    destroy: Option<DestroyFn>,
}

impl Drop for Instance {
    fn drop(&mut self) {
        // SAFETY: `logic` is never touched again after this point.
        let logic = unsafe { ManuallyDrop::take(&mut self.logic) };
        match self.destroy {
            Some(destroy) => destroy(Box::into_raw(logic)),
            None => drop(logic),
        }
    }
}

/// A loaded unit together with whatever keeps its code mapped
pub struct LoadedLogic {
    // Field order matters: the instance must drop before its library
    instance: Instance,
    manifest: LogicManifest,
    source: PathBuf,
    _library: Option<Library>,
}

impl LoadedLogic {
    /// Wrap an in-process instance
    pub fn new(instance: Box<dyn Logic>, source: impl Into<PathBuf>) -> Self {
        Self::with_destructor(instance, None, source)
    }

    fn with_destructor(
        instance: Box<dyn Logic>,
        destroy: Option<DestroyFn>,
        source: impl Into<PathBuf>,
    ) -> Self {
        let manifest = instance.manifest();
        Self {
            instance: Instance {
                logic: ManuallyDrop::new(instance),
                destroy,
            },
            manifest,
            source: source.into(),
            _library: None,
        }
    }

    /// Wrap an instance created by `library`, released through its `destroy`
    pub(crate) fn with_library(
        instance: Box<dyn Logic>,
        destroy: DestroyFn,
        source: impl Into<PathBuf>,
        library: Library,
    ) -> Self {
        Self {
            _library: Some(library),
            ..Self::with_destructor(instance, Some(destroy), source)
        }
    }

    /// Name the unit declares in its manifest
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    /// Manifest captured at load time
    pub fn manifest(&self) -> &LogicManifest {
        &self.manifest
    }

    /// Entry file the unit was loaded from
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Call `function` if the unit exposes it
    ///
    /// Returns `None` when the function is absent.
    pub fn call(&self, function: &str, args: Value) -> Option<Result<Value, LogicError>> {
        if !self.responds_to(function) {
            tracing::debug!(
                logic = %self.manifest.name,
                function = %function,
                "Logic does not expose function"
            );
            return None;
        }
        Some(self.invoke(function, args))
    }
}

impl Deref for LoadedLogic {
    type Target = dyn Logic;

    fn deref(&self) -> &Self::Target {
        &**self.instance.logic
    }
}

impl fmt::Debug for LoadedLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedLogic")
            .field("name", &self.manifest.name)
            .field("version", &self.manifest.version)
            .field("source", &self.source)
            .field("dynamic", &self._library.is_some())
            .finish()
    }
}
