// Tool dispatch
//
// Bridges a backend's proposed tool call to an executed tool. Unknown
// tool names are skipped (the caller falls through to plain-text
// handling); decode and execution failures are fatal to the turn.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::error::ToolError;
use crate::tools::registry::ToolRegistry;
use crate::tools::types::ToolCall;

pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Execute one proposed tool call. `Ok(None)` means the tool name is
    /// unknown and the turn should continue as plain text.
    #[instrument(skip(self, arguments), fields(tool = %name))]
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<Option<String>, ToolError> {
        let tool = match self.registry.get(name).await {
            Some(tool) => tool,
            None => {
                warn!("unknown tool requested; skipping dispatch");
                return Ok(None);
            }
        };

        info!("dispatching tool");
        let output = tool.execute(arguments).await?;
        Ok(Some(output))
    }

    /// Execute only the first of a backend's proposed calls.
    ///
    /// Policy: backends occasionally propose several calls in one turn;
    /// only calls[0] runs and the rest are dropped for this turn. Returns
    /// the executed tool's name and output.
    pub async fn dispatch_first(
        &self,
        calls: &[ToolCall],
    ) -> Result<Option<(String, String)>, ToolError> {
        let first = match calls.first() {
            Some(call) => call,
            None => return Ok(None),
        };

        if calls.len() > 1 {
            warn!(
                dropped = calls.len() - 1,
                tool = %first.name,
                "multiple tool calls proposed; executing only the first"
            );
        }

        let output = self.dispatch(&first.name, first.arguments.clone()).await?;
        Ok(output.map(|text| (first.name.clone(), text)))
    }
}
