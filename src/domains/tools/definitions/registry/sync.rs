//! Registry sync tool definition.
//!
//! Pulls the remote registry into the local one, in the foreground or as a
//! background task.

use futures::FutureExt;
use rmcp::{
    ErrorData as McpError,
    handler::server::tool::{ToolCallContext, ToolRoute, cached_schema_for_type},
    model::{CallToolResult, Tool},
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::domains::registry::RegistryAccessor;
use crate::domains::sync::{ErrorPolicy, MergeStrategy, SyncOptions, SyncOutcome};
use crate::domains::tools::ToolError;
use crate::domains::tools::definitions::common::tool_result;

/// Parameters for the registry sync tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct RegistrySyncParams {
    /// Source URL; defaults to the configured one.
    #[serde(default)]
    pub url: Option<String>,

    /// Ignore the cached copy of the remote document.
    #[serde(default)]
    pub force: bool,

    /// Merge strategy for this run.
    #[serde(default)]
    pub strategy: Option<MergeStrategy>,

    /// Return immediately with a task id.
    #[serde(default)]
    pub background: bool,
}

impl RegistrySyncParams {
    fn to_options(&self) -> SyncOptions {
        let mut options = SyncOptions::new()
            .force(self.force)
            .background(self.background)
            .error_policy(ErrorPolicy::Throw);
        if let Some(url) = &self.url {
            options = options.url(url.clone());
        }
        if let Some(strategy) = self.strategy {
            options = options.merge_strategy(strategy);
        }
        options
    }
}

pub struct RegistrySyncTool;

impl RegistrySyncTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "registry_sync";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str = "Synchronize the local prompt registry with its remote source. Only trusted HTTPS sources are accepted. Strategy is 'prefer-local' (default), 'prefer-remote' or 'interactive'.";

    #[instrument(skip_all, fields(force = params.force, background = params.background))]
    pub async fn execute(params: &RegistrySyncParams, accessor: &RegistryAccessor) -> CallToolResult {
        info!("Registry sync tool called");

        let outcome = accessor
            .sync(params.to_options())
            .await
            .map_err(ToolError::from)
            .and_then(|outcome| match outcome {
                SyncOutcome::Completed(report) => Ok(serde_json::to_value(report)?),
                SyncOutcome::Background(id) => Ok(json!({
                    "background": true,
                    "taskId": id.to_string(),
                })),
            });

        tool_result(outcome)
    }

    /// Create a Tool model for this tool (metadata).
    pub fn to_tool() -> Tool {
        Tool {
            name: Self::NAME.into(),
            description: Some(Self::DESCRIPTION.into()),
            input_schema: cached_schema_for_type::<RegistrySyncParams>(),
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
                let params: RegistrySyncParams = serde_json::from_value(Value::Object(args))
                    .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
                Ok(Self::execute(&params, &accessor).await)
            }
            .boxed()
        })
    }
}
