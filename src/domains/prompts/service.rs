//! Prompt service implementation.
//!
//! Exposes every registry entry as an MCP prompt. The prompt arguments are
//! the placeholders of the entry's latest template plus two optional
//! selectors: `version` pins a version and `model` picks a variant.

use rmcp::model::{GetPromptResult, JsonObject, Prompt, PromptArgument, PromptMessage, PromptMessageRole};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::error::PromptError;
use super::templates::placeholders;
use crate::domains::registry::{GetOptions, RegistryAccessor};

/// Argument selecting the version to render.
pub const VERSION_ARGUMENT: &str = "version";

/// Argument selecting the target model.
pub const MODEL_ARGUMENT: &str = "model";

/// Service for listing and rendering registry prompts.
pub struct PromptService {
    accessor: Arc<RegistryAccessor>,
}

impl PromptService {
    pub fn new(accessor: Arc<RegistryAccessor>) -> Self {
        info!("Initializing PromptService");
        Self { accessor }
    }

    /// List all available prompts.
    pub async fn list_prompts(&self) -> Vec<Prompt> {
        self.accessor
            .list_latest()
            .await
            .into_iter()
            .map(|(id, record)| {
                let mut arguments: Vec<PromptArgument> = placeholders(&record.prompt)
                    .into_iter()
                    .filter(|name| name != VERSION_ARGUMENT && name != MODEL_ARGUMENT)
                    .map(|name| PromptArgument {
                        description: Some(format!("Value for {{{{{name}}}}}")),
                        name,
                        title: None,
                        required: Some(true),
                    })
                    .collect();
                arguments.push(selector(
                    VERSION_ARGUMENT,
                    format!("Version to render (latest is {})", record.version),
                ));
                arguments.push(selector(
                    MODEL_ARGUMENT,
                    "Target model, selects a model-specific variant".to_string(),
                ));

                Prompt {
                    name: id,
                    title: None,
                    description: Some(record.description).filter(|d| !d.is_empty()),
                    arguments: Some(arguments),
                    icons: None,
                    meta: None,
                }
            })
            .collect()
    }

    /// Render prompt `name` with the MCP request arguments.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<GetPromptResult, PromptError> {
        let mut variables: HashMap<String, Value> =
            arguments.unwrap_or_default().into_iter().collect();

        let version = take_string(&mut variables, VERSION_ARGUMENT)?;
        let options = GetOptions {
            model: take_string(&mut variables, MODEL_ARGUMENT)?,
            ..GetOptions::default()
        };

        let identifier = match version {
            Some(version) => format!("{name}@{version}"),
            None => name.to_string(),
        };
        debug!("Rendering {} with {} variables", identifier, variables.len());

        let rendered = self.accessor.get(&identifier, &variables, &options).await?;

        Ok(GetPromptResult {
            description: Some(rendered.description).filter(|d| !d.is_empty()),
            messages: vec![PromptMessage::new_text(
                PromptMessageRole::User,
                rendered.text,
            )],
        })
    }
}

fn selector(name: &str, description: String) -> PromptArgument {
    PromptArgument {
        name: name.to_string(),
        title: None,
        description: Some(description),
        required: Some(false),
    }
}

/// Remove a selector argument; empty strings count as unset.
fn take_string(
    variables: &mut HashMap<String, Value>,
    key: &str,
) -> Result<Option<String>, PromptError> {
    match variables.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(PromptError::invalid_argument(
            key,
            format!("expected a string, got {other}"),
        )),
    }
}
