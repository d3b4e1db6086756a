//! Tool exposure
//!
//! [`Client::tools`] lists every tool the server offers and wraps each one
//! in an [`McpTool`]: a name, a description, an input schema ready for a
//! tool-calling model, and an [`execute`](McpTool::execute) method that
//! issues `tools/call`.

use std::collections::{HashMap, HashSet};

use mcplink_protocol::types::{CallToolResult, Content, PaginatedRequestParams};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::client::Client;
use crate::config::RequestOptions;
use crate::error::{Error, Result};

/// Where tool input schemas come from
#[derive(Debug, Clone, Default)]
pub enum ToolSchemas {
    /// Use every server tool with its own schema, closed to extra properties
    #[default]
    Automatic,
    /// Use only the named tools, with the caller's schemas as written
    Explicit(HashMap<String, Value>),
}

/// A server tool bound to the client that lists it
#[derive(Debug, Clone)]
pub struct McpTool {
    /// Tool name
    pub name: String,
    /// Human-readable description
    pub description: Option<String>,
    /// JSON Schema of the tool's arguments
    pub input_schema: Value,
    /// JSON Schema of the tool's structured output
    pub output_schema: Option<Value>,
    client: Client,
}

/// What a tool call produced
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// The result's `structuredContent`
    Structured(Value),
    /// The first text part, parsed as JSON
    Text(Value),
    /// The full result, when neither of the above applies
    Result(CallToolResult),
}

impl ToolOutput {
    /// Convert to a plain JSON value.
    pub fn into_value(self) -> Value {
        match self {
            Self::Structured(value) | Self::Text(value) => value,
            Self::Result(result) => serde_json::to_value(result).unwrap_or(Value::Null),
        }
    }

    fn from_result(result: CallToolResult, output_schema: Option<&Value>) -> Self {
        if let CallToolResult::Content(content) = &result {
            if let Some(structured) = &content.structured_content
                && conforms(output_schema, structured)
            {
                return Self::Structured(structured.clone());
            }
            if let Some(text) = content.content.first().and_then(Content::as_text)
                && let Ok(value) = serde_json::from_str(text)
            {
                return Self::Text(value);
            }
        }
        Self::Result(result)
    }
}

impl McpTool {
    /// Invoke the tool with `arguments`.
    pub async fn execute(&self, arguments: Value, options: &RequestOptions) -> Result<ToolOutput> {
        if options.is_cancelled() {
            return Err(Error::Aborted);
        }
        let result = self
            .client
            .call_tool(&self.name, Some(arguments), options)
            .await?;
        Ok(ToolOutput::from_result(result, self.output_schema.as_ref()))
    }
}

impl Client {
    /// List every tool, following pagination, keyed by name.
    pub async fn tools(
        &self,
        schemas: &ToolSchemas,
        options: &RequestOptions,
    ) -> Result<HashMap<String, McpTool>> {
        let mut tools = HashMap::new();
        let mut seen_cursors = HashSet::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .list_tools(cursor.take().map(PaginatedRequestParams::with_cursor), options)
                .await?;

            for tool in page.tools {
                let input_schema = match schemas {
                    ToolSchemas::Automatic => normalize_input_schema(&tool.input_schema),
                    ToolSchemas::Explicit(explicit) => match explicit.get(&tool.name) {
                        Some(schema) => schema.clone(),
                        None => continue,
                    },
                };
                tools.insert(
                    tool.name.clone(),
                    McpTool {
                        name: tool.name,
                        description: tool.description,
                        input_schema,
                        output_schema: tool.output_schema,
                        client: self.clone(),
                    },
                );
            }

            match page.next_cursor {
                Some(next) if seen_cursors.insert(next.clone()) => cursor = Some(next),
                Some(next) => {
                    warn!("Server repeated tools/list cursor {}", next);
                    break;
                }
                None => break,
            }
        }

        debug!("Loaded {} tools", tools.len());
        Ok(tools)
    }
}

/// Default a missing `properties` to `{}` and forbid additional properties.
pub fn normalize_input_schema(schema: &Value) -> Value {
    let mut object = match schema {
        Value::Object(object) => object.clone(),
        _ => Map::new(),
    };
    if !matches!(object.get("properties"), Some(Value::Object(_))) {
        object.insert("properties".to_string(), Value::Object(Map::new()));
    }
    object.insert("additionalProperties".to_string(), Value::Bool(false));
    Value::Object(object)
}

/// Whether `value` validates against the tool's output schema. A schema
/// that does not compile accepts nothing.
fn conforms(schema: Option<&Value>, value: &Value) -> bool {
    let Some(schema) = schema else {
        return true;
    };

    match jsonschema::validator_for(schema) {
        Ok(validator) => validator.is_valid(value),
        Err(e) => {
            warn!("Could not compile tool output schema: {}", e);
            false
        }
    }
}
