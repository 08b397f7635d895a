//! Prompt retrieval tool definition.
//!
//! Renders one registry prompt with the caller's variables.

use futures::FutureExt;
use rmcp::{
    ErrorData as McpError,
    handler::server::tool::{ToolCallContext, ToolRoute, cached_schema_for_type},
    model::{CallToolResult, Tool},
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::domains::registry::{GetOptions, RegistryAccessor};
use crate::domains::tools::definitions::common::tool_result;

// ============================================================================
// Tool Parameters
// ============================================================================

/// Parameters for the prompt get tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PromptGetParams {
    /// Prompt id, optionally with a version suffix (`review@1.2.0`).
    pub id: String,

    /// Values for the template's `{{placeholders}}`.
    #[serde(default)]
    pub variables: HashMap<String, Value>,

    /// Target model, used to pick a model-specific variant.
    #[serde(default)]
    pub model: Option<String>,
}

// ============================================================================
// Tool Definition
// ============================================================================

pub struct PromptGetTool;

impl PromptGetTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "prompt_get";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str = "Render a prompt from the registry. Use 'id@version' to pin a version; every {{placeholder}} in the template must be supplied in 'variables'.";

    #[instrument(skip_all, fields(id = %params.id))]
    pub async fn execute(params: &PromptGetParams, accessor: &RegistryAccessor) -> CallToolResult {
        info!("Prompt get tool called for '{}'", params.id);

        let options = GetOptions {
            model: params.model.clone(),
            ..GetOptions::default()
        };

        tool_result(
            accessor
                .get(&params.id, &params.variables, &options)
                .await
                .map_err(Into::into),
        )
    }

    /// Create a Tool model for this tool (metadata).
    pub fn to_tool() -> Tool {
        Tool {
            name: Self::NAME.into(),
            description: Some(Self::DESCRIPTION.into()),
            input_schema: cached_schema_for_type::<PromptGetParams>(),
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
        ToolRoute::new_dyn(Self::to_tool(), move |ctx: ToolCallContext<'_, S>| {
            let args = ctx.arguments.clone().unwrap_or_default();
            let accessor = accessor.clone();
            async move {
                let params: PromptGetParams = serde_json::from_value(Value::Object(args))
                    .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
                Ok(Self::execute(&params, &accessor).await)
            }
            .boxed()
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
