// Error taxonomy for the chat engine
//
// Misses are not errors: a message that fails to vectorize or a tool name
// the registry doesn't know both degrade to plain conversation. Everything
// here is fatal to the turn it occurs in.

use thiserror::Error;

/// Failures raised while dispatching a tool call.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The backend's proposed arguments don't match the tool's input shape.
    #[error("invalid arguments for tool '{tool}': {source}")]
    ArgumentDecode {
        tool: String,
        #[source]
        source: serde_json::Error,
    },

    /// The tool ran and failed (permission denied, service unreachable, ...).
    #[error("tool '{tool}' failed: {source}")]
    Execution {
        tool: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ToolError {
    /// Name of the tool the failure belongs to.
    pub fn tool(&self) -> &str {
        match self {
            ToolError::ArgumentDecode { tool, .. } => tool,
            ToolError::Execution { tool, .. } => tool,
        }
    }
}

/// Failures raised by a generation backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered but the response cannot be read as the
    /// expected result shape.
    #[error("unexpected backend response: {0}")]
    UnexpectedShape(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Terminal error for one streaming chat turn.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("turn cancelled")]
    Cancelled,
}
