//! caseflow-logic-api - API for caseflow business-logic units
//!
//! Case, document and request handling in caseflow delegates every
//! domain-specific decision (status transitions, validation, side effects) to
//! logic units. A unit is a native Rust dynamic library installed as a
//! versioned package; the runtime loads it, hot-swaps it when a newer version
//! appears, and lets callers invoke its functions by name.
//!
//! # Example
//!
//! ```ignore
//! use caseflow_logic_api::{FunctionSpec, Logic, LogicError, LogicManifest, export_logic};
//! use serde_json::{Value, json};
//!
//! #[derive(Default)]
//! pub struct CaseIntake;
//!
//! impl Logic for CaseIntake {
//!     fn manifest(&self) -> LogicManifest {
//!         LogicManifest {
//!             name: "case_intake".to_string(),
//!             version: "0.1.0".to_string(),
//!             functions: vec![FunctionSpec::new("register", "Register a case")],
//!             ..Default::default()
//!         }
//!     }
//!
//!     fn invoke(&self, function: &str, args: Value) -> Result<Value, LogicError> {
//!         match function {
//!             "register" => Ok(json!({ "status": "registered", "case": args })),
//!             other => Err(LogicError::UnknownFunction(other.to_string())),
//!         }
//!     }
//! }
//!
//! export_logic!(CaseIntake);
//! ```

pub mod error;
pub mod types;

pub use error::LogicError;
pub use types::*;

pub use serde_json::Value;

/// Current logic API version. Units must match this exactly.
pub const API_VERSION: u32 = 1;

/// The core trait every business-logic unit implements.
///
/// Only [`manifest`](Logic::manifest) is required. Lifecycle hooks default to
/// no-ops and optional capabilities default to absent, so a unit implements
/// just the behavior it has.
///
/// Handles are shared between caller threads, so every method takes `&self`;
/// units that keep state use interior mutability.
pub trait Logic: Send + Sync {
    /// Return unit metadata
    fn manifest(&self) -> LogicManifest;

    /// Called once when the unit becomes the active unit for its name.
    fn on_load(&self) -> Result<(), LogicError> {
        Ok(())
    }

    /// Called once when the unit stops being the active unit for its name.
    fn on_unload(&self) -> Result<(), LogicError> {
        Ok(())
    }

    /// Invoke a named function.
    fn invoke(&self, function: &str, _args: Value) -> Result<Value, LogicError> {
        Err(LogicError::UnknownFunction(function.to_string()))
    }

    /// Response-handling capability, if the unit has one.
    fn response_handler(&self) -> Option<&dyn ResponseHandler> {
        None
    }

    /// Whether the unit exports `function`
    fn responds_to(&self, function: &str) -> bool {
        self.manifest().has_function(function)
    }
}

/// Optional capability: react to responses from external services.
///
/// The runtime offers every response to all loaded units that expose this
/// capability through [`Logic::response_handler`].
pub trait ResponseHandler: Send + Sync {
    fn on_response(&self, response: &LogicResponse) -> Result<(), LogicError>;
}

/// Normalize a unit identifier for matching: lowercase, separators removed.
///
/// `CaseIntake`, `case_intake` and `case-intake` all normalize to
/// `caseintake`.
pub fn normalize_identifier(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-') && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Export a logic type for dynamic loading.
///
/// The type must implement [`Logic`] and [`Default`].
///
/// # Generated Functions
///
/// - `_caseflow_logic_create()`: Creates a new unit instance
/// - `_caseflow_logic_api_version()`: Returns the API version
/// - `_caseflow_logic_destroy()`: Destroys a unit instance
#[macro_export]
macro_rules! export_logic {
    ($logic_type:ty) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn _caseflow_logic_create() -> *mut dyn $crate::Logic {
            let logic: Box<dyn $crate::Logic> = Box::new(<$logic_type>::default());
            Box::into_raw(logic)
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn _caseflow_logic_api_version() -> u32 {
            $crate::API_VERSION
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn _caseflow_logic_destroy(ptr: *mut dyn $crate::Logic) {
            if !ptr.is_null() {
                unsafe {
                    drop(Box::from_raw(ptr));
                }
            }
        }
    };
}
