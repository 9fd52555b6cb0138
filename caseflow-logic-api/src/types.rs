//! Logic unit metadata and message types

use serde::{Deserialize, Serialize};

/// Manifest describing a business-logic unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicManifest {
    /// Logical name the unit answers to (e.g. `case_intake`)
    pub name: String,
    /// Package version the unit was built as
    pub version: String,
    /// API version this unit was built against
    pub api_version: u32,
    /// Human-readable description
    pub description: String,
    /// Functions callers may invoke by name
    #[serde(default)]
    pub functions: Vec<FunctionSpec>,
}

impl LogicManifest {
    /// Check whether the manifest lists a function
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.iter().any(|f| f.name == name)
    }
}

impl Default for LogicManifest {
    fn default() -> Self {
        Self {
            name: String::new(),
            version: "0.0.1".to_string(),
            api_version: crate::API_VERSION,
            description: String::new(),
            functions: Vec::new(),
        }
    }
}

/// Specification for a function a unit exports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    /// Function name (e.g. `transition`)
    pub name: String,
    /// What the function does
    #[serde(default)]
    pub description: String,
}

impl FunctionSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Outcome reported by an external service for an earlier request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResponseStatus {
    /// The request was processed
    Ok,
    /// The request failed on the remote side
    Failed {
        /// Error message from the remote side
        message: String,
    },
}

/// A response message routed back to the logic units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicResponse {
    /// Identifier of the request this answers
    pub request_id: String,
    /// Outcome of the request
    #[serde(flatten)]
    pub status: ResponseStatus,
    /// Response body
    #[serde(default)]
    pub payload: serde_json::Value,
}
