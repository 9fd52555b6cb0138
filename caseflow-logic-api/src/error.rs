//! Error types for logic unit authors

use thiserror::Error;

/// Errors that logic units can return
#[derive(Error, Debug)]
pub enum LogicError {
    /// The unit does not export the requested function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Arguments did not match what the function expects
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A lifecycle hook failed
    #[error("Hook failed: {0}")]
    Hook(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Custom error with message
    #[error("{0}")]
    Custom(String),
}

impl LogicError {
    /// Create a custom error with a message
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a hook error
    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook(message.into())
    }
}
