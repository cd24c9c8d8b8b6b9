//! OpenCode JSONL parser
//!
//! OpenCode writes the simplest shape of all providers:
//!
//! ```json
//! {"sessionId":"ses_1","timestamp":"...","type":"message","message":{"role":"user","content":"..."}}
//! ```
//!
//! `content` is a string or a block array. Tool blocks pass straight through
//! as `tool_use` / `tool_result` messages.

use crate::ingest::content::{classify_user_texts, content_parts, generate_message_id};
use crate::ingest::parser::{
    sample_objects, LineContext, LineResult, SessionParser, Skip, DETECTION_SAMPLE_LINES,
};
use crate::ingest::parsers::split_parts;
use crate::types::{ContentPart, MessageType, RawLogMessage};
use crate::ingest::content::lenient;
use serde::Deserialize;
use serde_json::Value;

/// Parser for OpenCode session logs.
#[derive(Debug, Default)]
pub struct OpenCodeParser;

impl OpenCodeParser {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawRecord {
    #[serde(deserialize_with = "lenient")]
    id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawMessage {
    #[serde(deserialize_with = "lenient")]
    id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    role: Option<String>,
    content: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    model: Option<String>,
}

impl SessionParser for OpenCodeParser {
    fn name(&self) -> &str {
        "OpenCode"
    }

    fn provider_name(&self) -> &str {
        "opencode"
    }

    fn can_parse(&self, content: &str) -> bool {
        sample_objects(content, DETECTION_SAMPLE_LINES)
            .iter()
            .any(|raw| {
                (raw.get("sessionId").is_some() || raw.get("sessionID").is_some())
                    && raw.get("timestamp").is_some()
                    && raw
                        .get("message")
                        .and_then(|m| m.get("role"))
                        .is_some_and(Value::is_string)
            })
    }

    fn parse_message(&self, raw: &RawLogMessage, ctx: &LineContext) -> LineResult {
        let record: RawRecord = raw
            .deserialize()
            .map_err(|e| Skip::Malformed(e.to_string()))?;
        let Some(message) = record.message else {
            return Err(Skip::Malformed("missing message".to_string()));
        };

        let id = message
            .id
            .or(record.id)
            .unwrap_or_else(|| generate_message_id(ctx.message_index, ctx.timestamp));
        let parts = message
            .content
            .as_ref()
            .map(|c| content_parts(c, &id))
            .unwrap_or_default();

        let role = message.role.unwrap_or_else(|| "user".to_string());
        let primary = match role.as_str() {
            "assistant" => MessageType::Assistant,
            "user" => classify_user_texts(parts.iter().filter_map(ContentPart::as_text)),
            _ => MessageType::Meta,
        };

        Ok(split_parts(&id, parts, primary, ctx.timestamp)
            .into_iter()
            .map(|m| {
                let m = m.with_metadata("role", role.as_str());
                match &message.model {
                    Some(model) => m.with_metadata("model", model.as_str()),
                    None => m,
                }
            })
            .collect())
    }
}
