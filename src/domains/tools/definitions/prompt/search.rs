//! Prompt search tool definition.

use futures::FutureExt;
use rmcp::{
    ErrorData as McpError,
    handler::server::tool::{ToolCallContext, ToolRoute, cached_schema_for_type},
    model::{CallToolResult, Tool},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::domains::registry::{
    RegistryAccessor, SearchFilter, SearchOptions, SearchQuery, SearchResult,
};
use crate::domains::tools::ToolError;
use crate::domains::tools::definitions::common::tool_result;

/// Parameters for the prompt search tool.
///
/// Either `query` or any of the filters, not both. With nothing set every
/// prompt is returned.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct PromptSearchParams {
    /// Case-insensitive text matched against id, description, category and tags.
    #[serde(default)]
    pub query: Option<String>,

    /// Exact category.
    #[serde(default)]
    pub category: Option<String>,

    /// Tags that must all be present.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Exact prompt id.
    #[serde(default)]
    pub id: Option<String>,
}

impl PromptSearchParams {
    pub fn to_query(&self) -> Result<SearchQuery, ToolError> {
        let filtered = self.category.is_some() || !self.tags.is_empty() || self.id.is_some();
        match &self.query {
            Some(_) if filtered => Err(ToolError::invalid_arguments(
                "'query' cannot be combined with 'category', 'tags' or 'id'",
            )),
            Some(text) => Ok(SearchQuery::Text(text.clone())),
            None => Ok(SearchQuery::Filter(SearchFilter {
                category: self.category.clone(),
                tags: self.tags.clone(),
                id: self.id.clone(),
            })),
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchOutput {
    count: usize,
    results: Vec<SearchResult>,
}

pub struct PromptSearchTool;

impl PromptSearchTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "prompt_search";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str = "Search registry prompts by free text, or filter by exact category, tags (all must match) and id. Results include the last sync time and whether the registry is stale.";

    #[instrument(skip_all)]
    pub async fn execute(params: &PromptSearchParams, accessor: &RegistryAccessor) -> CallToolResult {
        info!("Prompt search tool called: {:?}", params);

        let outcome = match params.to_query() {
            Ok(query) => accessor
                .search(&query, &SearchOptions::default())
                .await
                .map(|results| SearchOutput {
                    count: results.len(),
                    results,
                })
                .map_err(ToolError::from),
            Err(e) => Err(e),
        };

        tool_result(outcome)
    }

    /// Create a Tool model for this tool (metadata).
    pub fn to_tool() -> Tool {
        Tool {
            name: Self::NAME.into(),
            description: Some(Self::DESCRIPTION.into()),
            input_schema: cached_schema_for_type::<PromptSearchParams>(),
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
                let params: PromptSearchParams = serde_json::from_value(Value::Object(args))
                    .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
                Ok(Self::execute(&params, &accessor).await)
            }
            .boxed()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::definitions::common::testing::*;
    use crate::domains::tools::definitions::testing::test_accessor;

    #[tokio::test]
    async fn test_text_query() {
        let params = PromptSearchParams {
            query: Some("DIFF".to_string()),
            ..Default::default()
        };
        let result = PromptSearchTool::execute(&params, &test_accessor()).await;
        let body = json_of(&result);

        assert_eq!(body["count"], 1);
        assert_eq!(body["results"][0]["id"], "review");
        assert_eq!(body["results"][0]["stale"], true);
    }

    #[tokio::test]
    async fn test_no_arguments_lists_everything() {
        let result =
            PromptSearchTool::execute(&PromptSearchParams::default(), &test_accessor()).await;
        assert_eq!(json_of(&result)["count"], 2);
    }

    #[tokio::test]
    async fn test_tag_filter() {
        let params = PromptSearchParams {
            tags: vec!["greeting".to_string()],
            ..Default::default()
        };
        let result = PromptSearchTool::execute(&params, &test_accessor()).await;
        let body = json_of(&result);
        assert_eq!(body["count"], 1);
        assert_eq!(body["results"][0]["id"], "greet");
    }

    #[tokio::test]
    async fn test_query_with_filter_rejected() {
        let params = PromptSearchParams {
            query: Some("x".to_string()),
            category: Some("coding".to_string()),
            ..Default::default()
        };
        let result = PromptSearchTool::execute(&params, &test_accessor()).await;
        assert_eq!(result.is_error, Some(true));
        assert!(text_of(&result).starts_with("InvalidArguments:"));
    }
}
