//! Tool Router - builds the rmcp ToolRouter from the tool definitions.
//!
//! Each tool knows how to create its own route; they all share the same
//! registry accessor.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;

use crate::domains::registry::RegistryAccessor;

use super::definitions::{PromptGetTool, PromptSearchTool, RegistryStatusTool, RegistrySyncTool};

/// Build the tool router with all registered tools.
pub fn build_tool_router<S>(accessor: Arc<RegistryAccessor>) -> ToolRouter<S>
where
    S: Send + Sync + 'static,
{
    ToolRouter::new()
        .with_route(PromptGetTool::create_route(accessor.clone()))
        .with_route(PromptSearchTool::create_route(accessor.clone()))
        .with_route(RegistrySyncTool::create_route(accessor.clone()))
        .with_route(RegistryStatusTool::create_route(accessor))
}
