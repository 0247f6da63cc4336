// Stream orchestrator - drives one chat turn end to end
//
// Turn lifecycle: Sending -> Streaming -> {PlainTextDone | ToolCallAccumulating
// -> Dispatching -> Summarizing} -> Done, with Error reachable from any
// non-terminal state.
//
// Two streaming modes keep tool-call syntax away from the caller. A turn
// that carries tool definitions buffers the whole response until completion
// and resolves to either plain text or exactly one tool-named chunk, so
// visible prose and a tool resolution never mix in one turn. A turn without
// tool definitions forwards each delta immediately; marker-looking content
// on such a turn was never a sanctioned call, so it is suppressed without
// dispatch and only the prose before it is delivered.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::chat::{ChatMessage, Role, StreamChunk};
use crate::error::{BackendError, ChatError};
use crate::tools::{ToolCall, ToolDispatcher, ToolFilter, ToolRegistry};
use crate::trigger::TriggerEngine;
use crate::tools::PermissionLevel;

/// Literal substrings that mark the start of structured tool-call content.
const TOOL_CALL_MARKERS: &[&str] = &["<tool_call>", "\"function_call\"", "\"tool_calls\""];

/// Bare function-call object: `{"name": ...`.
static NAME_OBJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\{\s*"name"\s*:"#).expect("static regex"));

/// Fallback extraction of a `name` field when strict decoding fails.
static NAME_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""name"\s*:\s*"([^"]+)""#).expect("static regex"));

/// Longest marker prefix we hold back from forwarding while it could still
/// turn into a full marker.
const MAX_MARKER_LOOKBACK: usize = 24;

pub struct StreamOrchestrator {
    backend: Arc<dyn Backend>,
    trigger: Arc<TriggerEngine>,
    registry: Arc<ToolRegistry>,
    dispatcher: Arc<ToolDispatcher>,
    max_permission: PermissionLevel,
}

impl Clone for StreamOrchestrator {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            trigger: Arc::clone(&self.trigger),
            registry: Arc::clone(&self.registry),
            dispatcher: Arc::clone(&self.dispatcher),
            max_permission: self.max_permission,
        }
    }
}

impl StreamOrchestrator {
    pub fn new(
        backend: Arc<dyn Backend>,
        trigger: Arc<TriggerEngine>,
        registry: Arc<ToolRegistry>,
        max_permission: PermissionLevel,
    ) -> Self {
        let dispatcher = Arc::new(ToolDispatcher::new(Arc::clone(&registry)));
        Self {
            backend,
            trigger,
            registry,
            dispatcher,
            max_permission,
        }
    }

    /// Run one chat turn. Chunks arrive on the returned receiver; the
    /// stream ends with channel closure (normal completion) or one `Err`.
    /// Cancelling the token stops forwarding and guarantees no tool
    /// dispatch happens for a turn cancelled before its completion signal.
    pub fn stream_turn(
        &self,
        history: Vec<ChatMessage>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<Result<StreamChunk, ChatError>> {
        let (tx, rx) = mpsc::channel(32);
        let this = self.clone();
        tokio::spawn(async move {
            this.run_turn(history, cancel, tx).await;
        });
        rx
    }

    async fn run_turn(
        &self,
        history: Vec<ChatMessage>,
        cancel: CancellationToken,
        tx: mpsc::Sender<Result<StreamChunk, ChatError>>,
    ) {
        let user_text = match history.iter().rev().find(|m| m.role == Role::User) {
            Some(message) => message.text.clone(),
            None => {
                warn!("turn started with no user message; nothing to do");
                return;
            }
        };

        // Sending: decide whether tool definitions ride along.
        let tool_defs = if self.trigger.should_attach_tools(&user_text) {
            let defs = self
                .registry
                .definitions(&ToolFilter::new().with_max_permission(self.max_permission))
                .await;
            info!(tools = defs.len(), "attaching tool definitions to request");
            Some(defs)
        } else {
            debug!("no tool trigger; plain generation");
            None
        };

        let (prog_tx, mut prog_rx) = mpsc::unbounded_channel::<String>();
        let backend = Arc::clone(&self.backend);
        let gen_messages = history.clone();
        let gen_tools = tool_defs.clone();
        let generation = tokio::spawn(async move {
            // The callback may fire on the backend's delivery context;
            // deltas cross into this task through the channel.
            let on_progress = move |cumulative: &str| {
                let _ = prog_tx.send(cumulative.to_string());
            };
            backend
                .generate(&gen_messages, gen_tools.as_deref(), &on_progress)
                .await
        });

        // Streaming. With tool definitions attached the model may answer
        // with a call at any point, so nothing is forwarded until the
        // response is complete; without them, deltas stream immediately.
        let buffering = tool_defs.is_some();
        let mut suppressing = false;
        let mut forwarded = 0usize;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    generation.abort();
                    debug!("turn cancelled mid-stream");
                    let _ = tx.send(Err(ChatError::Cancelled)).await;
                    return;
                }
                update = prog_rx.recv() => {
                    let Some(cumulative) = update else { break };
                    if buffering || suppressing {
                        continue;
                    }
                    if contains_tool_marker(&cumulative) {
                        debug!("unsolicited tool-call syntax detected; suppressing");
                        suppressing = true;
                        continue;
                    }
                    // Hold back any tail that could still grow into a marker.
                    let safe_end = cumulative.len() - holdback_len(&cumulative);
                    if safe_end > forwarded {
                        let delta = cumulative[forwarded..safe_end].to_string();
                        forwarded = safe_end;
                        if tx.send(Ok(StreamChunk::text(delta))).await.is_err() {
                            generation.abort();
                            return;
                        }
                    }
                }
            }
        }

        let final_text = match generation.await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                let _ = tx.send(Err(ChatError::Backend(e))).await;
                return;
            }
            Err(e) => {
                let _ = tx
                    .send(Err(ChatError::Backend(BackendError::Inference(format!(
                        "generation task failed: {e}"
                    )))))
                    .await;
                return;
            }
        };

        // A cancel racing the completion signal still means no dispatch.
        if cancel.is_cancelled() {
            let _ = tx.send(Err(ChatError::Cancelled)).await;
            return;
        }

        if !buffering {
            // No tool definitions were offered, so marker-looking content is
            // not a sanctioned call: deliver the prose before it and drop
            // the rest rather than dispatching.
            match marker_start(&final_text) {
                Some(start) => {
                    warn!("unsolicited structured content in plain turn; dropped without dispatch");
                    if start > forwarded {
                        let prose = final_text[forwarded..start].to_string();
                        let _ = tx.send(Ok(StreamChunk::text(prose))).await;
                    }
                }
                None => {
                    // PlainTextDone: flush whatever the holdback kept.
                    if final_text.len() > forwarded {
                        let tail = final_text[forwarded..].to_string();
                        let _ = tx.send(Ok(StreamChunk::text(tail))).await;
                    }
                }
            }
            return;
        }

        if !contains_tool_marker(&final_text) {
            // PlainTextDone: the whole buffered response is ordinary prose.
            if !final_text.is_empty() {
                let _ = tx.send(Ok(StreamChunk::text(final_text))).await;
            }
            return;
        }

        // ToolCallAccumulating -> Dispatching.
        let calls = parse_tool_calls(&final_text);
        if calls.is_empty() {
            let _ = tx
                .send(Err(ChatError::Backend(BackendError::UnexpectedShape(
                    "tool-call marker present but no tool name could be extracted".to_string(),
                ))))
                .await;
            return;
        }

        let (tool_name, raw_output) = match self.dispatcher.dispatch_first(&calls).await {
            Ok(Some(result)) => result,
            Ok(None) => {
                // Unknown tool: nothing to show, and the buffered text is
                // structured syntax we must not leak.
                warn!("proposed tool is not registered; ending turn without output");
                return;
            }
            Err(e) => {
                let _ = tx.send(Err(ChatError::Tool(e))).await;
                return;
            }
        };

        // Summarizing: a second, tool-free pass phrases the raw result.
        debug!(tool = %tool_name, "summarizing tool output");
        let messages = summary_messages(&history, &tool_name, &raw_output);
        let phrased = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = tx.send(Err(ChatError::Cancelled)).await;
                return;
            }
            result = self.backend.generate(&messages, None, &noop_progress) => match result {
                Ok(text) => text,
                Err(e) => {
                    let _ = tx.send(Err(ChatError::Backend(e))).await;
                    return;
                }
            }
        };

        info!(tool = %tool_name, "turn completed via tool");
        let _ = tx.send(Ok(StreamChunk::tool(phrased, tool_name))).await;
    }
}

fn noop_progress(_: &str) {}

/// Prompt for the tool-free summarization pass.
fn summary_messages(history: &[ChatMessage], tool: &str, output: &str) -> Vec<ChatMessage> {
    let mut messages = history.to_vec();
    messages.push(ChatMessage::system(format!(
        "The user's request was answered by the '{tool}' tool. Raw tool output:\n\n\
         {output}\n\n\
         Rephrase this result for the user in a short, natural reply. \
         Do not mention the tool and do not show raw data structures."
    )));
    messages
}

/// Has structured tool-call content started anywhere in the text?
fn contains_tool_marker(text: &str) -> bool {
    marker_start(text).is_some()
}

/// Byte offset where structured tool-call content begins, if any.
fn marker_start(text: &str) -> Option<usize> {
    let literal = TOOL_CALL_MARKERS.iter().filter_map(|m| text.find(m)).min();
    let pattern = NAME_OBJECT_RE.find(text).map(|m| m.start());
    match (literal, pattern) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Bytes at the end of `text` that could still grow into a marker and must
/// not be forwarded yet.
fn holdback_len(text: &str) -> usize {
    let start = text.len().saturating_sub(MAX_MARKER_LOOKBACK);
    for i in start..text.len() {
        if !text.is_char_boundary(i) {
            continue;
        }
        if could_be_marker_prefix(&text[i..]) {
            return text.len() - i;
        }
    }
    0
}

fn could_be_marker_prefix(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    if TOOL_CALL_MARKERS
        .iter()
        .any(|m| s.len() < m.len() && m.starts_with(s))
    {
        return true;
    }
    is_name_object_prefix(s)
}

/// Is `s` a prefix of `{ "name":`?
fn is_name_object_prefix(s: &str) -> bool {
    let rest = match s.strip_prefix('{') {
        Some(rest) => rest.trim_start(),
        None => return false,
    };
    if rest.is_empty() {
        return true;
    }
    const KEY: &str = "\"name\"";
    if KEY.starts_with(rest) {
        return true;
    }
    match rest.strip_prefix(KEY) {
        Some(after) => {
            let after = after.trim_start();
            after.is_empty() || after.starts_with(':')
        }
        None => false,
    }
}

/// Two-stage tool-call extraction: strict JSON decoding of the buffered
/// payload first, pattern extraction of `name` fields only as a fallback.
fn parse_tool_calls(text: &str) -> Vec<ToolCall> {
    if let Some(inner) = extract_tagged(text, "<tool_call>", "</tool_call>") {
        if let Some(calls) = parse_json_calls(inner) {
            return calls;
        }
    }

    if let Some(start) = text.find(['{', '[']) {
        if let Some(calls) = parse_json_calls(&text[start..]) {
            return calls;
        }
    }

    NAME_FIELD_RE
        .captures_iter(text)
        .map(|c| ToolCall::new(c[1].to_string(), Value::Null))
        .collect()
}

fn extract_tagged<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let rest = &text[start..];
    let end = rest.find(close).unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// Strictly decode the first JSON value in `s` into tool calls.
fn parse_json_calls(s: &str) -> Option<Vec<ToolCall>> {
    let mut values = serde_json::Deserializer::from_str(s).into_iter::<Value>();
    let value = values.next()?.ok()?;
    let calls = calls_from_value(&value);
    if calls.is_empty() {
        None
    } else {
        Some(calls)
    }
}

fn calls_from_value(value: &Value) -> Vec<ToolCall> {
    match value {
        Value::Array(items) => items.iter().flat_map(calls_from_value).collect(),
        Value::Object(map) => {
            if let Some(inner) = map.get("function_call").or_else(|| map.get("function")) {
                return calls_from_value(inner);
            }
            if let Some(inner) = map.get("tool_calls") {
                return calls_from_value(inner);
            }
            if let Some(Value::String(name)) = map.get("name") {
                let arguments = map
                    .get("arguments")
                    .or_else(|| map.get("parameters"))
                    .cloned()
                    .unwrap_or(Value::Null);
                return vec![ToolCall::new(name.clone(), normalize_arguments(arguments))];
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

/// Some backends encode arguments as a JSON string instead of an object.
fn normalize_arguments(arguments: Value) -> Value {
    match arguments {
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::Null),
        other => other,
    }
}
