//! Shared-library units built with `export_logic!`

use std::path::Path;

use caseflow_logic_api::{API_VERSION, Logic};
use libloading::Library;

use super::{DestroyFn, LoadedLogic, LogicLoader};
use crate::error::LoadError;

/// Loads `lib/<name>.<DLL_EXTENSION>` entry files
#[derive(Debug, Default, Clone, Copy)]
pub struct DylibLoader;

impl LogicLoader for DylibLoader {
    fn extension(&self) -> &str {
        std::env::consts::DLL_EXTENSION
    }

    fn load(&self, entry: &Path) -> Result<LoadedLogic, LoadError> {
        // SAFETY: Only libraries installed into the plugin directory are
        // opened, and they are expected to be built against caseflow-logic-api.
        let library = unsafe { Library::new(entry)? };

        // SAFETY: We're calling a C function exported by the unit.
        let api_version_fn: libloading::Symbol<extern "C" fn() -> u32> =
            unsafe { library.get(b"_caseflow_logic_api_version")? };

        let found = api_version_fn();
        if found != API_VERSION {
            return Err(LoadError::ApiVersionMismatch {
                expected: API_VERSION,
                found,
            });
        }

        // SAFETY: The destroy function takes back a pointer from the create
        // function; it stays valid while `library` is loaded.
        let destroy_fn: DestroyFn = unsafe {
            *library.get::<DestroyFn>(b"_caseflow_logic_destroy")?
        };

        // SAFETY: The create function hands over a pointer obtained from
        // Box::into_raw, which we take ownership of exactly once.
        let create_fn: libloading::Symbol<extern "C" fn() -> *mut dyn Logic> =
            unsafe { library.get(b"_caseflow_logic_create")? };

        let raw = create_fn();
        if raw.is_null() {
            return Err(LoadError::NullInstance {
                path: entry.to_path_buf(),
            });
        }
        let instance = unsafe { Box::from_raw(raw) };

        tracing::debug!(path = %entry.display(), "Opened logic library");
        Ok(LoadedLogic::with_library(instance, destroy_fn, entry, library))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extension_matches_platform() {
        assert_eq!(DylibLoader.extension(), std::env::consts::DLL_EXTENSION);
    }

    #[test]
    fn test_load_of_missing_library_fails() {
        let dir = TempDir::new().unwrap();
        let entry = dir.path().join("lib").join("missing.so");

        let result = DylibLoader.load(&entry);

        assert!(matches!(result, Err(LoadError::Library(_))));
    }

    #[test]
    fn test_load_of_garbage_file_fails() {
        let dir = TempDir::new().unwrap();
        let entry = dir.path().join("garbage.so");
        std::fs::write(&entry, b"definitely not an object file").unwrap();

        assert!(DylibLoader.load(&entry).is_err());
    }
}
