//! Registry status tool definition.

use futures::FutureExt;
use rmcp::{
    ErrorData as McpError,
    handler::server::tool::{ToolCallContext, ToolRoute, cached_schema_for_type},
    model::{CallToolResult, Tool},
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::domains::registry::RegistryAccessor;
use crate::domains::tools::definitions::common::tool_result;

/// The status tool takes no parameters.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct RegistryStatusParams {}

pub struct RegistryStatusTool;

impl RegistryStatusTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "registry_status";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str = "Show the local registry's prompt count, versions, sync source, last sync time and staleness.";

    pub async fn execute(accessor: &RegistryAccessor) -> CallToolResult {
        info!("Registry status tool called");
        tool_result(Ok(accessor.status().await))
    }

    /// Create a Tool model for this tool (metadata).
    pub fn to_tool() -> Tool {
        Tool {
            name: Self::NAME.into(),
            description: Some(Self::DESCRIPTION.into()),
            input_schema: cached_schema_for_type::<RegistryStatusParams>(),
            annotations: None,
            output_schema: None,
            icons: None,
            meta: None,
            title: None,
        }
    }

    /// Create a ToolRoute for STDIO/TCP transport.
    pub fn create_route<S>(accessor: Arc<RegistryAccessor>) -> ToolRoute<S>
    where
        S: Send + Sync + 'static,
    {
        ToolRoute::new_dyn(Self::to_tool(), move |_ctx: ToolCallContext<'_, S>| {
            let accessor = accessor.clone();
            async move { Ok::<_, McpError>(Self::execute(&accessor).await) }.boxed()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::definitions::common::testing::*;
    use crate::domains::tools::definitions::testing::test_accessor;

    #[tokio::test]
    async fn test_status_before_sync() {
        let result = RegistryStatusTool::execute(&test_accessor()).await;
        let body = json_of(&result);

        assert_eq!(body["prompts"], 2);
        assert_eq!(body["stale"], true);
        assert!(body["lastSync"].is_null());
    }
}
