// HTTP backend for OpenAI-compatible chat-completions endpoints
//
// Streams server-sent events, accumulating delta content and reporting
// cumulative text through the progress callback.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{Backend, ProgressFn};
use crate::chat::ChatMessage;
use crate::error::BackendError;
use crate::tools::ToolDefinition;

const REQUEST_TIMEOUT_SECS: u64 = 120;

pub struct RemoteBackend {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl RemoteBackend {
    pub fn new(endpoint: String, model: String, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            model,
            api_key,
        })
    }

    fn request_body(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": m.text,
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });

        if let Some(tools) = tools {
            let tools: Vec<serde_json::Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.input_schema,
                        },
                    })
                })
                .collect();
            body["tools"] = serde_json::Value::Array(tools);
        }

        body
    }
}

/// One parsed server-sent event from the stream.
#[derive(Debug, Deserialize)]
struct StreamEvent {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// Extract the text delta from one `data:` payload. `None` for events
/// without content (role announcements, finish markers).
fn delta_from_event(payload: &str) -> Result<Option<String>, BackendError> {
    let event: StreamEvent = serde_json::from_str(payload).map_err(|e| {
        BackendError::UnexpectedShape(format!("bad stream event: {e}: {payload}"))
    })?;

    Ok(event
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content))
}

#[async_trait]
impl Backend for RemoteBackend {
    fn name(&self) -> &str {
        "remote"
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        on_progress: &ProgressFn,
    ) -> Result<String, BackendError> {
        let body = self.request_body(messages, tools);
        tracing::debug!(endpoint = %self.endpoint, model = %self.model, "sending generation request");

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Inference(format!(
                "request failed with status {status}: {body}"
            )));
        }

        let mut stream = response.bytes_stream();
        let mut pending = String::new();
        let mut cumulative = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            pending.push_str(&String::from_utf8_lossy(&chunk));

            // Process every complete line; keep the partial tail for the
            // next network chunk.
            while let Some(newline) = pending.find('\n') {
                let line: String = pending.drain(..=newline).collect();
                let line = line.trim();

                let payload = match line.strip_prefix("data:") {
                    Some(payload) => payload.trim(),
                    None => continue,
                };
                if payload.is_empty() || payload == "[DONE]" {
                    continue;
                }

                if let Some(delta) = delta_from_event(payload)? {
                    cumulative.push_str(&delta);
                    on_progress(&cumulative);
                }
            }
        }

        tracing::debug!(chars = cumulative.len(), "generation complete");
        Ok(cumulative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatMessage;
    use crate::tools::{ParamSpec, PermissionLevel, ToolDescriptor};

    #[test]
    fn test_delta_from_content_event() {
        let payload = r#"{"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(delta_from_event(payload).unwrap().unwrap(), "Hel");
    }

    #[test]
    fn test_delta_from_role_event_is_none() {
        let payload = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert!(delta_from_event(payload).unwrap().is_none());
    }

    #[test]
    fn test_delta_from_finish_event_is_none() {
        let payload = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert!(delta_from_event(payload).unwrap().is_none());
    }

    #[test]
    fn test_delta_from_garbage_is_unexpected_shape() {
        let err = delta_from_event("not json").unwrap_err();
        assert!(matches!(err, BackendError::UnexpectedShape(_)));
    }

    #[test]
    fn test_request_body_without_tools() {
        let backend = RemoteBackend::new(
            "http://localhost:11434/v1/chat/completions".to_string(),
            "qwen2.5:3b".to_string(),
            None,
        )
        .unwrap();

        let body = backend.request_body(&[ChatMessage::user("hi")], None);
        assert_eq!(body["model"], "qwen2.5:3b");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_request_body_with_tools() {
        let backend = RemoteBackend::new(
            "http://localhost:11434/v1/chat/completions".to_string(),
            "qwen2.5:3b".to_string(),
            Some("secret".to_string()),
        )
        .unwrap();

        let descriptor = ToolDescriptor {
            id: "get_grades".to_string(),
            name: "Get Grades".to_string(),
            description: "Grades".to_string(),
            domain: "courses".to_string(),
            trigger_keywords: vec!["grades".to_string()],
            required_permission: PermissionLevel::Basic,
            parameters: vec![ParamSpec::optional("q", "string", "x", "query")],
        };

        let body = backend.request_body(
            &[ChatMessage::user("grades?")],
            Some(&[descriptor.to_definition()]),
        );
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "get_grades");
    }
}
