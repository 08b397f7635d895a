//! Tool-specific error types.

use thiserror::Error;

use crate::domains::registry::RegistryError;

/// Errors that can occur during tool operations.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Invalid arguments were provided to the tool.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The registry operation behind the tool failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The tool output could not be serialized.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToolError {
    /// Create a new "invalid arguments" error.
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArguments(_) => "InvalidArguments",
            Self::Registry(e) => e.kind(),
            Self::Serialization(_) => "UNKNOWN",
        }
    }

    /// `KIND: message` as shown to MCP clients.
    pub fn client_message(&self) -> String {
        match self {
            // Sync errors already render as `KIND: message`.
            Self::Registry(RegistryError::Sync(e)) => e.to_string(),
            other => format!("{}: {}", other.kind(), other),
        }
    }
}
