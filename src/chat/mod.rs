// Chat message and stream types
//
// A ChatMessage is mutated in place while a response streams: text is
// appended, the pending flag flips on the first chunk, and the tool name
// is set at most once.

use serde::{Deserialize, Serialize};

pub mod orchestrator;

pub use orchestrator::StreamOrchestrator;

/// Speaker role for a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,

    /// True while the assistant response is still streaming.
    #[serde(default)]
    pub pending: bool,

    /// Name of the tool that produced this message, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<String>,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            pending: false,
            tool_call: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// An empty assistant message awaiting its first streamed chunk.
    pub fn pending_assistant() -> Self {
        Self {
            role: Role::Assistant,
            text: String::new(),
            pending: true,
            tool_call: None,
        }
    }

    /// Append streamed text; the first chunk clears the pending flag.
    pub fn append_text(&mut self, delta: &str) {
        self.text.push_str(delta);
        self.pending = false;
    }

    /// Record the tool that answered this turn. First writer wins.
    pub fn set_tool_call(&mut self, name: impl Into<String>) {
        if self.tool_call.is_none() {
            self.tool_call = Some(name.into());
        }
    }
}

/// One unit of caller-visible streamed output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub text: String,

    /// Set on exactly one chunk per turn when a tool answered; absent on
    /// every chunk of a plain-text turn.
    pub tool_call: Option<String>,
}

impl StreamChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_call: None,
        }
    }

    pub fn tool(text: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_call: Some(tool.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_clears_pending() {
        let mut msg = ChatMessage::pending_assistant();
        assert!(msg.pending);
        msg.append_text("Hel");
        assert!(!msg.pending);
        msg.append_text("lo");
        assert_eq!(msg.text, "Hello");
    }

    #[test]
    fn test_tool_call_set_once() {
        let mut msg = ChatMessage::pending_assistant();
        msg.set_tool_call("get_courses");
        msg.set_tool_call("get_grades");
        assert_eq!(msg.tool_call.as_deref(), Some("get_courses"));
    }

    #[test]
    fn test_role_serialization() {
        let msg = ChatMessage::user("hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        // tool_call is omitted when absent
        assert!(!json.contains("tool_call"));
    }

    #[test]
    fn test_stream_chunk_constructors() {
        let plain = StreamChunk::text("hi");
        assert!(plain.tool_call.is_none());

        let tool = StreamChunk::tool("done", "add_reminder");
        assert_eq!(tool.tool_call.as_deref(), Some("add_reminder"));
    }
}
