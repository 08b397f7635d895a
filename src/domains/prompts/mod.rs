//! Prompts domain module.
//!
//! Prompts are the registry's versioned templates, served to MCP clients and
//! rendered by literal `{{variable}}` substitution.
//!
//! ## Architecture
//!
//! - `templates.rs` - Placeholder discovery, interpolation and variant selection
//! - `service.rs` - MCP prompt listing and rendering over the registry

mod error;
mod service;
pub mod templates;

pub use error::PromptError;
pub use service::{MODEL_ARGUMENT, PromptService, VERSION_ARGUMENT};
