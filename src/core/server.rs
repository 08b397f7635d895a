//! MCP Server implementation and lifecycle management.
//!
//! This module contains the main server handler that implements the MCP
//! protocol by delegating to domain-specific services.
//!
//! ## Tool Architecture
//!
//! Tools are defined in `domains/tools/definitions/` with one file per tool.
//! Each tool defines:
//! - Parameters struct (for rmcp)
//! - `execute()` method (core logic)
//! - `create_route()` method (registers it on the ToolRouter)
//!
//! The ToolRouter is built dynamically in `domains/tools/router.rs`.
//! **Adding a new tool does NOT require modifying this file!**

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler, handler::server::tool::ToolRouter, model::*,
    service::RequestContext, tool_handler,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::config::Config;
use crate::domains::{
    prompts::PromptService,
    registry::RegistryAccessor,
    tools::{ToolRegistry, build_tool_router},
};

/// The main MCP server handler.
///
/// Cloned once per session; every clone shares the same registry accessor.
#[derive(Clone)]
pub struct McpServer {
    /// Server configuration.
    config: Arc<Config>,

    /// Shared access to the local registry and its sync machinery.
    accessor: Arc<RegistryAccessor>,

    /// Service for handling prompt-related requests.
    prompt_service: Arc<PromptService>,

    /// Tool router for handling tool calls.
    tool_router: ToolRouter<Self>,
}

impl McpServer {
    /// Create a new MCP server over an already loaded registry.
    pub fn new(config: Config, accessor: RegistryAccessor) -> Self {
        let config = Arc::new(config);
        let accessor = Arc::new(accessor);
        let prompt_service = Arc::new(PromptService::new(accessor.clone()));

        Self {
            tool_router: build_tool_router::<Self>(accessor.clone()),
            config,
            accessor,
            prompt_service,
        }
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    /// Get the server version.
    pub fn version(&self) -> &str {
        &self.config.server.version
    }

    pub fn accessor(&self) -> &Arc<RegistryAccessor> {
        &self.accessor
    }

    fn instructions(&self) -> String {
        format!(
            "{} serves a versioned prompt registry synchronized from a trusted remote source. \
             Tools: {}. Every registry prompt is also exposed as an MCP prompt; pass `version` \
             to pin a version and `model` to pick a model-specific variant.",
            self.name(),
            ToolRegistry::tool_names().join(", ")
        )
    }
}

/// ServerHandler implementation with tool_handler macro for automatic tool routing.
#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(self.instructions()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .build(),
            server_info: Implementation {
                name: self.name().to_string(),
                version: self.version().to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[instrument(skip(self, _context))]
    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        info!("Listing prompts");
        let prompts = self.prompt_service.list_prompts().await;
        Ok(ListPromptsResult {
            prompts,
            next_cursor: None,
            meta: None,
        })
    }

    #[instrument(skip(self, _context))]
    async fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        info!("Getting prompt: {}", request.name);
        self.prompt_service
            .get_prompt(&request.name, request.arguments)
            .await
            .map_err(|e| {
                warn!("Prompt {} failed: {}", request.name, e);
                McpError::invalid_params(format!("{}: {}", e.kind(), e), None)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::definitions::testing::test_accessor;

    fn server() -> McpServer {
        McpServer::new(Config::default(), test_accessor())
    }

    #[test]
    fn test_info_advertises_tools_and_prompts() {
        let info = server().get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.prompts.is_some());
        assert!(info.capabilities.resources.is_none());
        assert_eq!(info.server_info.name, "prompt-registry");

        let instructions = info.instructions.unwrap();
        for name in ToolRegistry::tool_names() {
            assert!(instructions.contains(name), "missing {name}");
        }
    }

    #[tokio::test]
    async fn test_clones_share_registry() {
        let server = server();
        let clone = server.clone();
        assert!(Arc::ptr_eq(server.accessor(), clone.accessor()));
        assert_eq!(clone.accessor().list_latest().await.len(), 2);
    }
}
