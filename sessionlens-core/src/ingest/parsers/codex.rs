//! OpenAI Codex CLI JSONL parser
//!
//! Parses session logs from `~/.codex/sessions/YYYY/MM/DD/rollout-*.jsonl`.
//!
//! Every line is an envelope `{timestamp, type, payload}`:
//!
//! - `session_meta`: supplies the session id (`payload.id`), emits nothing.
//! - `response_item`: the conversation itself, see below.
//! - `event_msg`, `turn_context`: UI echoes and settings, emit nothing.
//!
//! `response_item` payloads map by `payload.type`:
//!
//! | `payload.type` | Emits |
//! |----------------|-------|
//! | `message` | `user` / `command` / `assistant` / `meta` by role |
//! | `function_call`, `custom_tool_call` | `tool_use` (id = `call_id`) |
//! | `function_call_output`, `custom_tool_call_output` | `tool_result` linked to `call_id` |
//! | `reasoning` | nothing |
//!
//! Codex injects environment and instruction blocks as `user` messages;
//! those become `meta` rather than human input.

use crate::ingest::content::{classify_user_texts, extract_text_content, generate_message_id};
use crate::ingest::parser::{
    sample_objects, LineContext, LineResult, SessionParser, Skip, DETECTION_SAMPLE_LINES,
};
use crate::types::{MessageContent, MessageType, ParsedMessage, RawLogMessage, ToolResult, ToolUse};
use crate::ingest::content::lenient;
use serde::Deserialize;
use serde_json::{Map, Value};

const CODEX_ENVELOPE_TYPES: &[&str] = &["session_meta", "response_item", "event_msg", "turn_context"];

/// Parser for OpenAI Codex CLI JSONL logs.
#[derive(Debug, Default)]
pub struct CodexParser;

impl CodexParser {
    pub fn new() -> Self {
        Self
    }
}

/// Detect system-injected context in `user` role messages.
///
/// These are sent as `user` but are CLI context, not human input.
fn is_system_injected_context(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with("<environment_context>")
        || trimmed.starts_with("<user_shell_command>")
        || trimmed.starts_with("<INSTRUCTIONS>")
        || trimmed.starts_with("<user_instructions>")
        || trimmed.starts_with("<system")
        || trimmed.starts_with("# AGENTS.md instructions for")
}

/// Decode tool-call arguments. Invalid JSON becomes an empty object.
fn decode_arguments(arguments: Option<&Value>) -> Value {
    match arguments {
        Some(Value::String(s)) => {
            serde_json::from_str(s).unwrap_or_else(|_| Value::Object(Map::new()))
        }
        Some(Value::Object(o)) => Value::Object(o.clone()),
        _ => Value::Object(Map::new()),
    }
}

// ============================================
// Raw JSONL record types (serde deserialization)
// ============================================

/// Top-level event container for Codex JSONL records.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawEvent {
    #[serde(rename = "type")]
    #[serde(deserialize_with = "lenient")]
    event_type: Option<String>,
    payload: Value,
}

/// Response item payload subtypes.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ResponseItemPayload {
    #[serde(rename = "type")]
    #[serde(deserialize_with = "lenient")]
    item_type: Option<String>,
    #[serde(deserialize_with = "lenient")]
    id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    role: Option<String>,
    content: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    name: Option<String>,
    arguments: Option<Value>,
    input: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    call_id: Option<String>,
    output: Option<Value>,
}

impl SessionParser for CodexParser {
    fn name(&self) -> &str {
        "Codex"
    }

    fn provider_name(&self) -> &str {
        "codex"
    }

    fn can_parse(&self, content: &str) -> bool {
        sample_objects(content, DETECTION_SAMPLE_LINES)
            .iter()
            .any(|raw| {
                raw.record_type()
                    .is_some_and(|t| CODEX_ENVELOPE_TYPES.contains(&t))
                    && raw.get("payload").is_some_and(Value::is_object)
            })
    }

    /// The session id lives in the `session_meta` payload.
    fn extract_session_id(&self, raw: &RawLogMessage) -> Option<String> {
        if raw.record_type() != Some("session_meta") {
            return None;
        }
        raw.get("payload")?
            .get("id")?
            .as_str()
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }

    fn parse_message(&self, raw: &RawLogMessage, ctx: &LineContext) -> LineResult {
        let event: RawEvent = raw
            .deserialize()
            .map_err(|e| Skip::Malformed(e.to_string()))?;

        match event.event_type.as_deref() {
            Some("response_item") => {}
            Some("session_meta") | Some("event_msg") | Some("turn_context") => return Ok(Vec::new()),
            Some(other) => return Err(Skip::Unsupported(other.to_string())),
            None => return Err(Skip::Malformed("missing type".to_string())),
        }

        let payload: ResponseItemPayload = serde_json::from_value(event.payload)
            .map_err(|e| Skip::Malformed(e.to_string()))?;
        let generated = || generate_message_id(ctx.message_index, ctx.timestamp);

        let message = match payload.item_type.as_deref() {
            Some("message") => {
                let text = payload
                    .content
                    .as_ref()
                    .map(extract_text_content)
                    .unwrap_or_default();
                let role = payload.role.as_deref().unwrap_or("user");
                let message_type = match role {
                    "assistant" => MessageType::Assistant,
                    "user" if is_system_injected_context(&text) => MessageType::Meta,
                    "user" => classify_user_texts([text.as_str()]),
                    _ => MessageType::Meta,
                };
                ParsedMessage::new(
                    payload.id.clone().unwrap_or_else(generated),
                    ctx.timestamp,
                    message_type,
                    MessageContent::Text(text),
                )
                .with_metadata("role", role)
            }
            Some("function_call") | Some("custom_tool_call") => {
                let tool = ToolUse {
                    id: payload.call_id.clone().unwrap_or_else(generated),
                    name: payload.name.clone().unwrap_or_default(),
                    input: match (&payload.arguments, &payload.input) {
                        (Some(arguments), _) => decode_arguments(Some(arguments)),
                        // Freeform tools (apply_patch) send raw text.
                        (None, Some(Value::String(text))) => serde_json::json!({ "input": text }),
                        (None, input) => decode_arguments(input.as_ref()),
                    },
                };
                ParsedMessage::tool_use(tool, ctx.timestamp).with_metadata("role", "assistant")
            }
            Some("function_call_output") | Some("custom_tool_call_output") => {
                let Some(call_id) = payload.call_id.clone() else {
                    return Err(Skip::Malformed("tool output without call_id".to_string()));
                };
                let result = ToolResult {
                    tool_use_id: call_id.clone(),
                    content: payload.output.clone().unwrap_or(Value::Null),
                    is_error: false,
                };
                ParsedMessage::tool_result(format!("{}_output", call_id), result, ctx.timestamp)
                    .with_metadata("role", "tool")
            }
            Some("reasoning") => return Ok(Vec::new()),
            Some(other) => return Err(Skip::Unsupported(format!("response_item/{}", other))),
            None => return Err(Skip::Malformed("response_item without payload type".to_string())),
        };

        Ok(vec![message])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::content::parse_timestamp;
    use serde_json::json;

    fn ctx() -> LineContext {
        LineContext {
            line_number: 1,
            message_index: 3,
            timestamp: parse_timestamp(Some(&json!("2025-10-02T09:00:00.000Z"))).unwrap(),
        }
    }

    fn raw(value: Value) -> RawLogMessage {
        RawLogMessage::from_value(value).unwrap()
    }

    fn item(payload: Value) -> RawLogMessage {
        raw(json!({"timestamp": "2025-10-02T09:00:00.000Z", "type": "response_item", "payload": payload}))
    }

    #[test]
    fn test_is_system_injected_context() {
        assert!(is_system_injected_context("<environment_context>\n  <cwd>/repo</cwd>"));
        assert!(is_system_injected_context("  <user_instructions>be brief"));
        assert!(is_system_injected_context("# AGENTS.md instructions for /repo"));
        assert!(!is_system_injected_context("fix the failing test"));
    }

    #[test]
    fn test_can_parse_envelope() {
        let parser = CodexParser::new();
        assert!(parser.can_parse(
            r#"{"timestamp":"2025-10-02T09:00:00Z","type":"session_meta","payload":{"id":"abc"}}"#
        ));
        assert!(!parser.can_parse(r#"{"timestamp":"2025-10-02T09:00:00Z","type":"session_meta"}"#));
        assert!(!parser.can_parse(r#"{"type":"user","text":"hi"}"#));
    }

    #[test]
    fn test_session_id_from_session_meta() {
        let parser = CodexParser::new();
        let meta = raw(json!({"type": "session_meta", "payload": {"id": "0199a-session"}}));
        let other = raw(json!({"type": "response_item", "payload": {"id": "x"}}));
        assert_eq!(parser.extract_session_id(&meta).as_deref(), Some("0199a-session"));
        assert_eq!(parser.extract_session_id(&other), None);
    }

    #[test]
    fn test_reasoning_yields_nothing() {
        let parser = CodexParser::new();
        let line = item(json!({"type": "reasoning", "summary": [{"type": "summary_text", "text": "thinking"}]}));
        assert_eq!(parser.parse_message(&line, &ctx()), Ok(Vec::new()));
    }

    #[test]
    fn test_messages_by_role() {
        let parser = CodexParser::new();
        let user = item(json!({"type": "message", "role": "user",
            "content": [{"type": "input_text", "text": "add a README"}]}));
        let context = item(json!({"type": "message", "role": "user",
            "content": [{"type": "input_text", "text": "<environment_context>cwd</environment_context>"}]}));
        let assistant = item(json!({"type": "message", "role": "assistant",
            "content": [{"type": "output_text", "text": "Done."}]}));

        let messages = parser.parse_message(&user, &ctx()).unwrap();
        assert_eq!(messages[0].message_type, MessageType::User);
        assert_eq!(messages[0].text(), "add a README");
        assert_eq!(messages[0].id, "msg_1759395600000_3");
        assert_eq!(parser.parse_message(&context, &ctx()).unwrap()[0].message_type, MessageType::Meta);
        assert_eq!(
            parser.parse_message(&assistant, &ctx()).unwrap()[0].message_type,
            MessageType::Assistant
        );
    }

    #[test]
    fn test_function_call_and_output_link() {
        let parser = CodexParser::new();
        let call = item(json!({"type": "function_call", "name": "shell",
            "arguments": "{\"command\":[\"ls\"]}", "call_id": "call_1"}));
        let output = item(json!({"type": "function_call_output", "call_id": "call_1",
            "output": "{\"output\":\"README.md\\n\"}"}));

        let tool_use = &parser.parse_message(&call, &ctx()).unwrap()[0];
        assert_eq!(tool_use.message_type, MessageType::ToolUse);
        assert_eq!(tool_use.id, "call_1");
        assert_eq!(tool_use.content.tool_uses()[0].input["command"][0], "ls");

        let tool_result = &parser.parse_message(&output, &ctx()).unwrap()[0];
        assert_eq!(tool_result.message_type, MessageType::ToolResult);
        assert_eq!(tool_result.id, "call_1_output");
        assert_eq!(tool_result.linked_to.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_invalid_arguments_become_empty_object() {
        let parser = CodexParser::new();
        let call = item(json!({"type": "function_call", "name": "shell",
            "arguments": "{\"command\": [", "call_id": "call_2"}));
        let messages = parser.parse_message(&call, &ctx()).unwrap();
        assert_eq!(messages[0].content.tool_uses()[0].input, json!({}));
    }

    #[test]
    fn test_custom_tool_call() {
        let parser = CodexParser::new();
        let call = item(json!({"type": "custom_tool_call", "name": "apply_patch",
            "input": "*** Begin Patch", "call_id": "call_3"}));
        let messages = parser.parse_message(&call, &ctx()).unwrap();
        assert_eq!(messages[0].id, "call_3");
        assert_eq!(messages[0].content.tool_uses()[0].name, "apply_patch");
        assert_eq!(messages[0].content.tool_uses()[0].input["input"], "*** Begin Patch");
    }

    #[test]
    fn test_bookkeeping_events_yield_nothing() {
        let parser = CodexParser::new();
        for event_type in ["session_meta", "event_msg", "turn_context"] {
            let line = raw(json!({"timestamp": "2025-10-02T09:00:00Z", "type": event_type, "payload": {}}));
            assert_eq!(parser.parse_message(&line, &ctx()), Ok(Vec::new()));
        }
    }
}
