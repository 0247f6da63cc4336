// Core types for the tool system
//
// A ToolDescriptor is immutable identity and schema, owned by the tool
// implementation itself. ToolDefinition/ToolInputSchema are the wire
// format sent to generation backends.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

/// Permission required to run a tool. Ordered: a filter ceiling of
/// `Elevated` admits `Basic` and `Elevated` tools but not `Full`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Basic,
    Elevated,
    Full,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &str {
        match self {
            PermissionLevel::Basic => "basic",
            PermissionLevel::Elevated => "elevated",
            PermissionLevel::Full => "full",
        }
    }
}

/// One parameter in a tool's schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    /// JSON type name ("string", "integer", ...).
    pub param_type: String,
    pub required: bool,
    pub example: String,
    pub description: String,
}

impl ParamSpec {
    pub fn required(name: &str, param_type: &str, example: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type: param_type.to_string(),
            required: true,
            example: example.to_string(),
            description: description.to_string(),
        }
    }

    pub fn optional(name: &str, param_type: &str, example: &str, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, example, description)
        }
    }
}

/// Immutable identity, classification, and schema for one tool.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    /// Unique id; also the name backends use in tool calls.
    pub id: String,
    pub name: String,
    pub description: String,
    /// Classification tag ("calendar", "courses", "reminders").
    pub domain: String,
    pub trigger_keywords: Vec<String>,
    pub required_permission: PermissionLevel,
    pub parameters: Vec<ParamSpec>,
}

impl ToolDescriptor {
    /// Wire-format definition advertised to generation backends.
    pub fn to_definition(&self) -> ToolDefinition {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            properties.insert(
                param.name.clone(),
                serde_json::json!({
                    "type": param.param_type,
                    "description": param.description,
                    "example": param.example,
                }),
            );
            if param.required {
                required.push(param.name.clone());
            }
        }

        ToolDefinition {
            name: self.id.clone(),
            description: self.description.clone(),
            input_schema: ToolInputSchema {
                schema_type: "object".to_string(),
                properties: Value::Object(properties),
                required,
            },
        }
    }
}

/// Tool definition as sent to a backend alongside the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
}

/// JSON Schema for tool input parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: Value,
    pub required: Vec<String>,
}

/// A tool invocation proposed by a backend: name plus raw JSON arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Decode raw backend arguments into a tool's typed input.
pub fn decode_input<T: DeserializeOwned>(tool: &str, input: Value) -> Result<T, ToolError> {
    // A backend may omit arguments entirely; treat null as an empty object
    // so tools with all-optional inputs still decode.
    let input = match input {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    serde_json::from_value(input).map_err(|e| ToolError::ArgumentDecode {
        tool: tool.to_string(),
        source: e,
    })
}
