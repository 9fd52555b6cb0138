//! Case intake - an example business-logic unit for caseflow
//!
//! This unit demonstrates:
//! - Exporting a unit with the `export_logic!` macro
//! - Declaring callable functions in the manifest
//! - Lifecycle hooks (`on_load`, `on_unload`)
//! - Receiving responses through the `ResponseHandler` capability
//!
//! ## Building
//!
//! ```bash
//! cargo build --release
//! ```
//!
//! ## Packaging
//!
//! The entry file must be named after the unit, inside `lib/`:
//!
//! ```bash
//! mkdir -p pkg/lib
//! cp target/release/libcase_intake.so pkg/lib/case_intake.so
//! tar -czf data.tar.gz -C pkg lib
//! tar -cf case_intake-0.1.0.tar data.tar.gz
//! ```
//!
//! Publish the tar on the package registry and run `caseflow fetch case_intake`,
//! or unpack `lib/` into `<plugin_dir>/case_intake-0.1.0/` by hand.

use std::sync::atomic::{AtomicU64, Ordering};

use caseflow_logic_api::{
    FunctionSpec, Logic, LogicError, LogicManifest, LogicResponse, ResponseHandler,
    ResponseStatus, Value, export_logic,
};
use serde_json::json;

/// Routes new cases to a work queue by category.
#[derive(Default)]
pub struct CaseIntake {
    registered: AtomicU64,
    acknowledged: AtomicU64,
    failed: AtomicU64,
}

impl CaseIntake {
    fn queue_for(category: &str) -> &'static str {
        match category {
            "billing" | "refund" => "finance",
            "outage" | "bug" => "engineering",
            "complaint" => "escalations",
            _ => "general",
        }
    }

    fn register(&self, args: &Value) -> Result<Value, LogicError> {
        let case_id = args
            .get("case_id")
            .and_then(Value::as_str)
            .ok_or_else(|| LogicError::invalid_input("case_id is required"))?;
        let category = args
            .get("category")
            .and_then(Value::as_str)
            .unwrap_or("general");

        self.registered.fetch_add(1, Ordering::Relaxed);
        Ok(json!({
            "case_id": case_id,
            "queue": Self::queue_for(category),
            "status": "registered",
        }))
    }

    fn stats(&self) -> Value {
        json!({
            "registered": self.registered.load(Ordering::Relaxed),
            "acknowledged": self.acknowledged.load(Ordering::Relaxed),
            "failed": self.failed.load(Ordering::Relaxed),
        })
    }
}

impl Logic for CaseIntake {
    fn manifest(&self) -> LogicManifest {
        LogicManifest {
            name: "case_intake".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Registers new cases and routes them to a queue".to_string(),
            functions: vec![
                FunctionSpec::new("register", "Register a case and pick its queue"),
                FunctionSpec::new("route", "Queue for a category"),
                FunctionSpec::new("stats", "Counters since load"),
            ],
            ..Default::default()
        }
    }

    fn on_unload(&self) -> Result<(), LogicError> {
        // Counters are in-memory only; nothing to flush
        Ok(())
    }

    fn invoke(&self, function: &str, args: Value) -> Result<Value, LogicError> {
        match function {
            "register" => self.register(&args),
            "route" => {
                let category = args.as_str().unwrap_or("general");
                Ok(json!(Self::queue_for(category)))
            }
            "stats" => Ok(self.stats()),
            other => Err(LogicError::UnknownFunction(other.to_string())),
        }
    }

    fn response_handler(&self) -> Option<&dyn ResponseHandler> {
        Some(self)
    }
}

impl ResponseHandler for CaseIntake {
    fn on_response(&self, response: &LogicResponse) -> Result<(), LogicError> {
        match &response.status {
            ResponseStatus::Ok => self.acknowledged.fetch_add(1, Ordering::Relaxed),
            ResponseStatus::Failed { .. } => self.failed.fetch_add(1, Ordering::Relaxed),
        };
        Ok(())
    }
}

export_logic!(CaseIntake);
