//! Prompt-specific error types.

use thiserror::Error;

use crate::domains::registry::RegistryError;

/// Errors that can occur while rendering or serving prompts.
#[derive(Debug, Error)]
pub enum PromptError {
    /// Invalid argument value.
    #[error("Invalid argument value for '{0}': {1}")]
    InvalidArgument(String, String),

    /// Error from the registry read path.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl PromptError {
    /// Create a new "invalid argument" error.
    pub fn invalid_argument(arg: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument(arg.into(), reason.into())
    }

    /// Machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(..) => "InvalidArgument",
            Self::Registry(e) => e.kind(),
        }
    }
}
