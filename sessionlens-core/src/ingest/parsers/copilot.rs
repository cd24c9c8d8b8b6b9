//! GitHub Copilot CLI JSONL parser
//!
//! Copilot logs are flat event records keyed by `type`:
//!
//! | `type` | Emits |
//! |--------|-------|
//! | `user` | `user` / `command` / `interruption` |
//! | `copilot` | `assistant` |
//! | `info` | `meta` |
//! | `tool_call_requested` | one `tool_use` |
//! | `tool_call_completed` | a `tool_use` and its linked `tool_result` |
//!
//! Copilot reports a finished call as a single event carrying both the
//! request and the result, so the completed event yields both halves of the
//! pair. Ids derive from `callId`: the completed event's tool use takes the
//! bare call id and its result `<callId>_result`; a separate request event
//! takes `<callId>_request`.
//!
//! The logs carry no session id, so sessions default to `copilot-<epoch-ms>`.

use crate::ingest::content::{classify_user_texts, extract_text_content, generate_message_id};
use crate::ingest::parser::{
    sample_objects, LineContext, LineResult, SessionParser, Skip, DETECTION_SAMPLE_LINES,
};
use crate::types::{
    MessageContent, MessageType, ParsedMessage, RawLogMessage, ToolResult, ToolUse,
};
use chrono::{DateTime, Utc};
use crate::ingest::content::lenient;
use serde::Deserialize;
use serde_json::{Map, Value};

const COPILOT_EVENT_TYPES: &[&str] = &[
    "user",
    "copilot",
    "info",
    "tool_call_requested",
    "tool_call_completed",
];

/// Parser for GitHub Copilot CLI session logs.
#[derive(Debug, Default)]
pub struct CopilotParser;

impl CopilotParser {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawEvent {
    #[serde(deserialize_with = "lenient")]
    id: Option<String>,
    #[serde(rename = "type")]
    #[serde(deserialize_with = "lenient")]
    event_type: Option<String>,
    text: Option<Value>,
    content: Option<Value>,
    message: Option<Value>,

    #[serde(deserialize_with = "lenient")]
    call_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    tool_name: Option<String>,
    arguments: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    intention_summary: Option<String>,
    result: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    success: Option<bool>,
    error: Option<Value>,
}

impl RawEvent {
    fn body_text(&self) -> String {
        self.text
            .as_ref()
            .or(self.content.as_ref())
            .or(self.message.as_ref())
            .map(extract_text_content)
            .unwrap_or_default()
    }

    fn tool_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.tool_name.clone())
            .unwrap_or_default()
    }

    /// Arguments may arrive as an object or as a JSON-encoded string.
    fn tool_input(&self) -> Value {
        match &self.arguments {
            Some(Value::String(s)) => {
                serde_json::from_str(s).unwrap_or_else(|_| Value::Object(Map::new()))
            }
            Some(other) => other.clone(),
            None => Value::Object(Map::new()),
        }
    }

    fn is_error(&self) -> bool {
        self.success == Some(false) || self.error.as_ref().is_some_and(|e| !e.is_null())
    }
}

impl SessionParser for CopilotParser {
    fn name(&self) -> &str {
        "GitHub Copilot"
    }

    fn provider_name(&self) -> &str {
        "github-copilot"
    }

    /// Copilot events are flat: a known `type` with no nested chat `message`
    /// object and no `uuid`, which tells them apart from Claude and OpenCode
    /// lines that share the `user` type.
    fn can_parse(&self, content: &str) -> bool {
        sample_objects(content, DETECTION_SAMPLE_LINES)
            .iter()
            .any(|raw| {
                raw.record_type()
                    .is_some_and(|t| COPILOT_EVENT_TYPES.contains(&t))
                    && !raw.get("message").is_some_and(Value::is_object)
                    && raw.get("uuid").is_none()
            })
    }

    fn fallback_session_id(&self, now: DateTime<Utc>) -> String {
        format!("copilot-{}", now.timestamp_millis())
    }

    fn parse_message(&self, raw: &RawLogMessage, ctx: &LineContext) -> LineResult {
        let event: RawEvent = raw
            .deserialize()
            .map_err(|e| Skip::Malformed(e.to_string()))?;
        let generated = || generate_message_id(ctx.message_index, ctx.timestamp);

        let messages = match event.event_type.as_deref() {
            Some("user") => {
                let text = event.body_text();
                let message_type = classify_user_texts([text.as_str()]);
                vec![ParsedMessage::new(
                    event.id.clone().unwrap_or_else(generated),
                    ctx.timestamp,
                    message_type,
                    MessageContent::Text(text),
                )
                .with_metadata("role", "user")]
            }
            Some("copilot") => vec![ParsedMessage::new(
                event.id.clone().unwrap_or_else(generated),
                ctx.timestamp,
                MessageType::Assistant,
                MessageContent::Text(event.body_text()),
            )
            .with_metadata("role", "assistant")],
            Some("info") => vec![ParsedMessage::new(
                event.id.clone().unwrap_or_else(generated),
                ctx.timestamp,
                MessageType::Meta,
                MessageContent::Text(event.body_text()),
            )
            .with_metadata("role", "system")],
            Some("tool_call_requested") => {
                let id = match &event.call_id {
                    Some(call_id) => format!("{}_request", call_id),
                    None => generated(),
                };
                let tool = ToolUse {
                    id,
                    name: event.tool_name(),
                    input: event.tool_input(),
                };
                vec![tool_message(ParsedMessage::tool_use(tool, ctx.timestamp), &event)]
            }
            Some("tool_call_completed") => {
                let call_id = event.call_id.clone().unwrap_or_else(generated);
                let tool = ToolUse {
                    id: call_id.clone(),
                    name: event.tool_name(),
                    input: event.tool_input(),
                };
                let result = ToolResult {
                    tool_use_id: call_id.clone(),
                    content: event
                        .result
                        .clone()
                        .or_else(|| event.error.clone())
                        .unwrap_or(Value::Null),
                    is_error: event.is_error(),
                };
                vec![
                    tool_message(ParsedMessage::tool_use(tool, ctx.timestamp), &event),
                    tool_message(
                        ParsedMessage::tool_result(format!("{}_result", call_id), result, ctx.timestamp),
                        &event,
                    ),
                ]
            }
            Some(other) => return Err(Skip::Unsupported(other.to_string())),
            None => return Err(Skip::Malformed("missing type".to_string())),
        };

        Ok(messages)
    }
}

/// Attach the Copilot-specific call metadata.
fn tool_message(message: ParsedMessage, event: &RawEvent) -> ParsedMessage {
    let mut message = message;
    if let Some(call_id) = &event.call_id {
        message = message.with_metadata("callId", call_id.as_str());
    }
    if let Some(summary) = &event.intention_summary {
        message = message.with_metadata("intentionSummary", summary.as_str());
    }
    let role = if message.message_type == MessageType::ToolResult {
        "tool"
    } else {
        "assistant"
    };
    message.with_metadata("role", role)
}
