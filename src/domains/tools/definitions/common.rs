//! Result helpers shared by the registry tools.

use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::domains::tools::ToolError;

/// Convert a tool outcome into an MCP result.
///
/// Success carries the value as pretty JSON text plus structured content;
/// failure is an error result with `KIND: message`.
pub fn tool_result<T: Serialize>(outcome: Result<T, ToolError>) -> CallToolResult {
    match outcome.and_then(|value| serde_json::to_value(value).map_err(ToolError::from)) {
        Ok(value) => json_result(value),
        Err(e) => error_result(&e),
    }
}

/// Success result from an already serialized value.
pub fn json_result(value: Value) -> CallToolResult {
    let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
    CallToolResult {
        content: vec![Content::text(text)],
        structured_content: Some(value),
        is_error: Some(false),
        meta: None,
    }
}

pub fn error_result(error: &ToolError) -> CallToolResult {
    let message = error.client_message();
    warn!("{}", message);
    CallToolResult::error(vec![Content::text(message)])
}

#[cfg(test)]
pub(crate) mod testing {
    use rmcp::model::{CallToolResult, RawContent};
    use serde_json::Value;

    /// Text of the first content item.
    pub fn text_of(result: &CallToolResult) -> &str {
        match &result.content[0].raw {
            RawContent::Text(text) => &text.text,
            _ => panic!("Expected text content"),
        }
    }

    pub fn json_of(result: &CallToolResult) -> Value {
        serde_json::from_str(text_of(result)).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::domains::registry::RegistryError;
    use crate::domains::sync::SyncError;
    use serde_json::json;

    #[test]
    fn test_success_is_json() {
        let result = tool_result(Ok(json!({"a": 1})));
        assert_eq!(result.is_error, Some(false));
        assert_eq!(json_of(&result)["a"], 1);
        assert_eq!(result.structured_content, Some(json!({"a": 1})));
    }

    #[test]
    fn test_error_messages_carry_kind() {
        let result = tool_result::<Value>(Err(RegistryError::not_found("x").into()));
        assert_eq!(result.is_error, Some(true));
        assert_eq!(text_of(&result), "NotFound: Prompt not found: x");

        let sync: ToolError = RegistryError::from(SyncError::timeout("too slow")).into();
        assert_eq!(error_result(&sync).is_error, Some(true));
        assert_eq!(sync.client_message(), "TIMEOUT: too slow");
    }
}
