//! Registry read-path error types.

use thiserror::Error;

use super::storage::StorageError;
use crate::domains::sync::SyncError;

/// Errors returned by [`super::RegistryAccessor`].
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No entry with this id.
    #[error("Prompt not found: {0}")]
    NotFound(String),

    /// The entry exists but not at the requested version.
    #[error("Version '{version}' of prompt '{id}' not found")]
    VersionNotFound { id: String, version: String },

    /// Placeholders left after interpolation.
    #[error("Prompt '{id}' is missing variables: {}", .variables.join(", "))]
    MissingVariables { id: String, variables: Vec<String> },

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RegistryError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn version_not_found(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self::VersionNotFound {
            id: id.into(),
            version: version.into(),
        }
    }

    /// Machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::VersionNotFound { .. } => "VersionNotFound",
            Self::MissingVariables { .. } => "MissingVariables",
            Self::Sync(e) => e.kind.as_str(),
            Self::Storage(_) => "UNKNOWN",
        }
    }
}
