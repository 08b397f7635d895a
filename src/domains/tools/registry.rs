//! Tool Registry - the names of every tool the server exposes.

use super::definitions::{PromptGetTool, PromptSearchTool, RegistryStatusTool, RegistrySyncTool};

/// Tool registry - single list of tool names, checked against the router.
pub struct ToolRegistry;

impl ToolRegistry {
    /// Get all tool names.
    pub fn tool_names() -> Vec<&'static str> {
        vec![
            PromptGetTool::NAME,
            PromptSearchTool::NAME,
            RegistrySyncTool::NAME,
            RegistryStatusTool::NAME,
        ]
    }
}
