//! Gemini CLI JSONL parser
//!
//! Gemini lines carry a `type` (`user`, `gemini`, `tool_use`, `tool_result`,
//! `info`, `error`) and content that is a string, an array of typed blocks,
//! or Gemini API parts (`{"text"}`, `{"functionCall"}`, `{"functionResponse"}`),
//! possibly inside a `{"parts": [...]}` wrapper serialized to a string.
//!
//! Model turns keep Gemini-specific extras in metadata: `thoughts`, `tokens`,
//! `model` and `cwd`.

use super::split_parts;
use crate::ingest::content::{
    classify_user_texts, content_parts, extract_text_from_parts, generate_message_id,
};
use crate::ingest::parser::{
    sample_objects, LineContext, LineResult, SessionParser, Skip, DETECTION_SAMPLE_LINES,
};
use crate::types::{
    Metadata, MessageContent, MessageType, ParsedMessage, RawLogMessage, ToolResult, ToolUse,
};
use crate::ingest::content::lenient;
use serde::Deserialize;
use serde_json::Value;

/// Parser for Gemini CLI session logs.
#[derive(Debug, Default)]
pub struct GeminiParser;

impl GeminiParser {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawRecord {
    #[serde(deserialize_with = "lenient")]
    id: Option<String>,
    #[serde(rename = "type")]
    #[serde(deserialize_with = "lenient")]
    record_type: Option<String>,
    #[serde(deserialize_with = "lenient")]
    role: Option<String>,
    content: Option<Value>,
    message: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    text: Option<String>,

    #[serde(deserialize_with = "lenient")]
    gemini_model: Option<String>,
    #[serde(deserialize_with = "lenient")]
    model: Option<String>,
    gemini_thoughts: Option<Value>,
    thoughts: Option<Value>,
    tokens: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    cwd: Option<String>,

    // top-level tool records
    #[serde(deserialize_with = "lenient")]
    name: Option<String>,
    input: Option<Value>,
    args: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    tool_use_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    is_error: Option<bool>,
    output: Option<Value>,
}

impl RawRecord {
    /// Content may sit in `content`, in `message.content`, in `message` itself, or in `text`.
    fn content_value(&self) -> Option<Value> {
        if let Some(content) = &self.content {
            return Some(content.clone());
        }
        match &self.message {
            Some(Value::Object(obj)) => obj.get("content").or_else(|| obj.get("parts")).cloned(),
            Some(other @ Value::String(_)) => Some(other.clone()),
            _ => self.text.clone().map(Value::String),
        }
    }

    fn role(&self) -> Option<&str> {
        self.role.as_deref().or_else(|| {
            self.message
                .as_ref()
                .and_then(|m| m.get("role"))
                .and_then(Value::as_str)
        })
    }

    fn model(&self) -> Option<&str> {
        self.gemini_model.as_deref().or(self.model.as_deref())
    }

    fn thoughts(&self) -> Option<&Value> {
        self.gemini_thoughts.as_ref().or(self.thoughts.as_ref())
    }
}

enum Turn {
    User,
    Model,
    ToolUse,
    ToolResult,
    Meta,
}

fn classify_turn(record: &RawRecord) -> Option<Turn> {
    match (record.record_type.as_deref(), record.role()) {
        (Some("user"), _) | (None, Some("user")) => Some(Turn::User),
        (Some("gemini" | "model" | "assistant"), _) | (None, Some("model" | "assistant")) => {
            Some(Turn::Model)
        }
        (Some("tool_use"), _) => Some(Turn::ToolUse),
        (Some("tool_result"), _) => Some(Turn::ToolResult),
        (Some("info" | "error" | "warning" | "system"), _) => Some(Turn::Meta),
        _ => None,
    }
}

impl SessionParser for GeminiParser {
    fn name(&self) -> &str {
        "Gemini"
    }

    fn provider_name(&self) -> &str {
        "gemini-cli"
    }

    fn can_parse(&self, content: &str) -> bool {
        sample_objects(content, DETECTION_SAMPLE_LINES)
            .iter()
            .any(|raw| {
                raw.get("gemini_model").is_some()
                    || raw.get("gemini_thoughts").is_some()
                    || raw.record_type() == Some("gemini")
            })
    }

    fn parse_message(&self, raw: &RawLogMessage, ctx: &LineContext) -> LineResult {
        let record: RawRecord = raw
            .deserialize()
            .map_err(|e| Skip::Malformed(e.to_string()))?;
        let turn = classify_turn(&record).ok_or_else(|| {
            Skip::Unsupported(record.record_type.clone().unwrap_or_else(|| "unknown".to_string()))
        })?;
        let id = record
            .id
            .clone()
            .unwrap_or_else(|| generate_message_id(ctx.message_index, ctx.timestamp));

        let mut shared = Metadata::new();
        if let Some(model) = record.model() {
            shared.insert("model".to_string(), Value::String(model.to_string()));
        }
        if let Some(cwd) = &record.cwd {
            shared.insert("cwd".to_string(), Value::String(cwd.clone()));
        }

        let messages = match turn {
            Turn::ToolUse => {
                let tool = ToolUse {
                    id: id.clone(),
                    name: record.name.clone().unwrap_or_default(),
                    input: record
                        .input
                        .clone()
                        .or_else(|| record.args.clone())
                        .unwrap_or(Value::Null),
                };
                vec![ParsedMessage::tool_use(tool, ctx.timestamp).with_metadata("role", "assistant")]
            }
            Turn::ToolResult => {
                let tool_use_id = record
                    .tool_use_id
                    .clone()
                    .ok_or_else(|| Skip::Malformed("tool_result without tool_use_id".to_string()))?;
                let result = ToolResult {
                    tool_use_id,
                    content: record
                        .content_value()
                        .or_else(|| record.output.clone())
                        .unwrap_or(Value::Null),
                    is_error: record.is_error.unwrap_or(false),
                };
                vec![ParsedMessage::tool_result(id, result, ctx.timestamp).with_metadata("role", "tool")]
            }
            Turn::Meta => {
                let parts = record
                    .content_value()
                    .map(|c| content_parts(&c, &id))
                    .unwrap_or_default();
                vec![ParsedMessage::new(
                    id,
                    ctx.timestamp,
                    MessageType::Meta,
                    MessageContent::Text(extract_text_from_parts(&parts)),
                )
                .with_metadata("role", "system")]
            }
            Turn::User | Turn::Model => {
                let parts = record
                    .content_value()
                    .map(|c| content_parts(&c, &id))
                    .unwrap_or_default();
                let (primary, role) = if matches!(turn, Turn::User) {
                    (
                        classify_user_texts(parts.iter().filter_map(|p| p.as_text())),
                        "user",
                    )
                } else {
                    (MessageType::Assistant, "assistant")
                };
                let mut messages = split_parts(&id, parts, primary, ctx.timestamp);
                if let Some(first) = messages.first_mut() {
                    if let Some(thoughts) = record.thoughts() {
                        first.metadata.insert("thoughts".to_string(), thoughts.clone());
                    }
                    if let Some(tokens) = &record.tokens {
                        first.metadata.insert("tokens".to_string(), tokens.clone());
                    }
                }
                messages
                    .into_iter()
                    .map(|m| m.with_metadata("role", role))
                    .collect()
            }
        };

        Ok(messages
            .into_iter()
            .map(|m| m.with_shared_metadata(&shared))
            .collect())
    }
}
