// Generation backend abstraction
//
// A Backend turns a conversation (plus optional tool definitions) into
// generated text, reporting progress through a callback. Backends enforce
// their own single-flight discipline; callers treat `generate` as a
// suspension point.

use async_trait::async_trait;

use crate::chat::ChatMessage;
use crate::error::BackendError;
use crate::tools::ToolDefinition;

pub mod remote;

pub use remote::RemoteBackend;

/// Progress callback. Receives the CUMULATIVE generated text after each
/// emitted token or segment (callers diff consecutive values to recover
/// deltas). May be invoked from the backend's delivery context, so it must
/// be `Send + Sync`.
pub type ProgressFn = dyn Fn(&str) + Send + Sync;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Generate a response for the conversation. When `tools` is set, the
    /// definitions are forwarded to the model so it may propose tool
    /// calls. Returns the complete final text.
    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        on_progress: &ProgressFn,
    ) -> Result<String, BackendError>;
}
