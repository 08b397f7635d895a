//! Tool definitions module.
//!
//! This module exports all available tool definitions.
//! Each tool is defined in its own file for better maintainability.

pub mod common;
pub mod prompt;
pub mod registry;

pub use prompt::{PromptGetParams, PromptGetTool, PromptSearchParams, PromptSearchTool};
pub use registry::{RegistryStatusTool, RegistrySyncParams, RegistrySyncTool};
