//! Claude Code JSONL parser
//!
//! Parses session logs written to `~/.claude/projects/[encoded-path]/*.jsonl`.
//!
//! Each line is a record with a `type` of `user`, `assistant`, `summary`,
//! `system` or bookkeeping types such as `file-history-snapshot`. Chat
//! records carry a `message` whose `content` is either a string or an array
//! of content blocks.
//!
//! # Splitting rules
//!
//! - **Assistant with tool use**: one text message (only if there is text),
//!   then one `tool_use` message per `tool_use` block. Each tool use has
//!   `parent_id` set to the record's `uuid`.
//! - **User with tool results**: one `tool_result` message per block, each
//!   with `linked_to` set to the block's `tool_use_id`. Any text alongside
//!   the results becomes an extra `user` message.
//! - **Plain user**: reclassified as `interruption`, `command`,
//!   `command_output` or `user` by inspecting the text.
//! - **`isMeta` records**: dropped.
//! - **`summary`**: a `compact` message, when the record has a timestamp.
//! - **`system`**: a `meta` message.

use crate::ingest::content::{
    classify_user_texts, content_parts, extract_text_content, generate_message_id,
};
use crate::ingest::parser::{
    sample_objects, LineContext, LineResult, SessionParser, Skip, DETECTION_SAMPLE_LINES,
};
use crate::types::{
    ContentPart, Metadata, MessageContent, MessageType, ParsedMessage, RawLogMessage,
    StructuredMessageContent,
};
use crate::ingest::content::lenient;
use serde::Deserialize;
use serde_json::{json, Value};

/// Parser for Claude Code JSONL logs.
#[derive(Debug, Default)]
pub struct ClaudeCodeParser;

impl ClaudeCodeParser {
    pub fn new() -> Self {
        Self
    }
}

// ============================================
// Raw JSONL record types (serde deserialization)
// ============================================

/// Represents a single line from Claude Code JSONL.
///
/// Uses `#[serde(default)]` liberally to handle missing fields gracefully,
/// and `lenient` so a field whose type drifted is dropped on its own.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawRecord {
    #[serde(deserialize_with = "lenient")]
    uuid: Option<String>,
    #[serde(deserialize_with = "lenient")]
    parent_uuid: Option<String>,
    #[serde(deserialize_with = "lenient")]
    session_id: Option<String>,
    #[serde(rename = "type")]
    #[serde(deserialize_with = "lenient")]
    record_type: Option<String>,
    #[serde(deserialize_with = "lenient")]
    cwd: Option<String>,
    #[serde(deserialize_with = "lenient")]
    git_branch: Option<String>,
    #[serde(deserialize_with = "lenient")]
    version: Option<String>,
    #[serde(deserialize_with = "lenient")]
    is_sidechain: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    is_compact_summary: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    request_id: Option<String>,
    #[serde(deserialize_with = "lenient")]
    subtype: Option<String>,

    #[serde(deserialize_with = "lenient")]
    message: Option<RawMessage>,

    // summary records
    #[serde(deserialize_with = "lenient")]
    summary: Option<String>,
    #[serde(deserialize_with = "lenient")]
    leaf_uuid: Option<String>,

    // system records
    content: Option<Value>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawMessage {
    #[serde(deserialize_with = "lenient")]
    role: Option<String>,
    #[serde(deserialize_with = "lenient")]
    model: Option<String>,
    #[serde(deserialize_with = "lenient")]
    id: Option<String>,
    content: Option<Value>,
    usage: Option<Value>,
}

impl SessionParser for ClaudeCodeParser {
    fn name(&self) -> &str {
        "Claude Code"
    }

    fn provider_name(&self) -> &str {
        "claude-code"
    }

    fn can_parse(&self, content: &str) -> bool {
        sample_objects(content, DETECTION_SAMPLE_LINES)
            .iter()
            .any(|raw| {
                raw.get("uuid").is_some()
                    && raw.get("timestamp").is_some()
                    && raw.get("message").is_some()
                    && matches!(raw.record_type(), Some("user") | Some("assistant"))
            })
    }

    fn parse_message(&self, raw: &RawLogMessage, ctx: &LineContext) -> LineResult {
        if raw.flag("isMeta") {
            return Ok(Vec::new());
        }

        let record: RawRecord = raw
            .deserialize()
            .map_err(|e| Skip::Malformed(e.to_string()))?;
        let id = record
            .uuid
            .clone()
            .unwrap_or_else(|| generate_message_id(ctx.message_index, ctx.timestamp));
        let shared = shared_metadata(&record);

        let messages = match record.record_type.as_deref() {
            Some("assistant") => assistant_messages(&record, id, ctx),
            Some("user") => user_messages(&record, id, ctx),
            Some("summary") => {
                let id = record.leaf_uuid.clone().unwrap_or(id);
                let text = record.summary.clone().unwrap_or_default();
                vec![ParsedMessage::new(
                    id,
                    ctx.timestamp,
                    MessageType::Compact,
                    MessageContent::Text(text),
                )]
            }
            Some("system") => {
                let text = record
                    .content
                    .as_ref()
                    .map(extract_text_content)
                    .unwrap_or_default();
                let mut message =
                    ParsedMessage::new(id, ctx.timestamp, MessageType::Meta, MessageContent::Text(text));
                if let Some(subtype) = &record.subtype {
                    message = message.with_metadata("subtype", subtype.as_str());
                }
                vec![message]
            }
            Some(other) => return Err(Skip::Unsupported(other.to_string())),
            None => return Err(Skip::Malformed("missing type".to_string())),
        };

        Ok(messages
            .into_iter()
            .map(|m| m.with_shared_metadata(&shared))
            .collect())
    }
}

/// Metadata every message from a record carries.
fn shared_metadata(record: &RawRecord) -> Metadata {
    let mut metadata = Metadata::new();
    let role = record
        .message
        .as_ref()
        .and_then(|m| m.role.clone())
        .or_else(|| record.record_type.clone());
    let fields = [
        ("role", role),
        ("sessionId", record.session_id.clone()),
        ("parentUuid", record.parent_uuid.clone()),
        ("cwd", record.cwd.clone()),
        ("gitBranch", record.git_branch.clone()),
        ("version", record.version.clone()),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            metadata.insert(key.to_string(), Value::String(value));
        }
    }
    if record.is_sidechain == Some(true) {
        metadata.insert("isSidechain".to_string(), Value::Bool(true));
    }
    metadata
}

fn assistant_messages(record: &RawRecord, id: String, ctx: &LineContext) -> Vec<ParsedMessage> {
    let Some(msg) = &record.message else {
        return Vec::new();
    };
    let parts = msg
        .content
        .as_ref()
        .map(|c| content_parts(c, &id))
        .unwrap_or_default();

    let tool_use_count = parts.iter().filter(|p| p.is_tool_use()).count();
    let mut metadata = Metadata::new();
    if let Some(model) = &msg.model {
        metadata.insert("model".to_string(), json!(model));
    }
    if let Some(usage) = &msg.usage {
        metadata.insert("usage".to_string(), usage.clone());
    }
    if let Some(request_id) = &record.request_id {
        metadata.insert("requestId".to_string(), json!(request_id));
    }
    if let Some(message_id) = &msg.id {
        metadata.insert("messageId".to_string(), json!(message_id));
    }
    metadata.insert("toolUseCount".to_string(), json!(tool_use_count));

    if tool_use_count == 0 {
        let content = StructuredMessageContent::from_parts(parts);
        let mut message = ParsedMessage::new(
            id,
            ctx.timestamp,
            MessageType::Assistant,
            MessageContent::Structured(content),
        );
        message.metadata = metadata;
        return vec![message];
    }

    let (tool_parts, other_parts): (Vec<ContentPart>, Vec<ContentPart>) =
        parts.into_iter().partition(ContentPart::is_tool_use);

    let mut messages = Vec::with_capacity(tool_parts.len() + 1);
    let has_text = other_parts
        .iter()
        .filter_map(ContentPart::as_text)
        .any(|t| !t.trim().is_empty());
    if has_text {
        let content = StructuredMessageContent::from_parts(other_parts);
        let mut message = ParsedMessage::new(
            id.clone(),
            ctx.timestamp,
            MessageType::Assistant,
            MessageContent::Structured(content),
        );
        message.metadata = metadata.clone();
        messages.push(message);
    }

    for (index, part) in tool_parts.iter().enumerate() {
        if let Some(mut tool) = part.to_tool_use() {
            if tool.id.is_empty() {
                tool.id = format!("{}_tool_{}", id, index);
            }
            let mut message = ParsedMessage::tool_use(tool, ctx.timestamp).with_parent(id.clone());
            for key in ["model", "requestId"] {
                if let Some(value) = metadata.get(key) {
                    message.metadata.insert(key.to_string(), value.clone());
                }
            }
            messages.push(message);
        }
    }

    messages
}

fn user_messages(record: &RawRecord, id: String, ctx: &LineContext) -> Vec<ParsedMessage> {
    let Some(msg) = &record.message else {
        return Vec::new();
    };
    let Some(content) = &msg.content else {
        return Vec::new();
    };

    if record.is_compact_summary == Some(true) {
        return vec![ParsedMessage::new(
            id,
            ctx.timestamp,
            MessageType::Compact,
            MessageContent::Text(extract_text_content(content)),
        )];
    }

    if let Value::String(text) = content {
        let message_type = classify_user_texts([text.as_str()]);
        return vec![ParsedMessage::new(
            id,
            ctx.timestamp,
            message_type,
            MessageContent::Text(text.clone()),
        )];
    }

    let parts = content_parts(content, &id);
    let (result_parts, other_parts): (Vec<ContentPart>, Vec<ContentPart>) =
        parts.into_iter().partition(ContentPart::is_tool_result);

    if result_parts.is_empty() {
        let message_type = classify_user_texts(other_parts.iter().filter_map(ContentPart::as_text));
        let content = StructuredMessageContent::from_parts(other_parts);
        return vec![ParsedMessage::new(
            id,
            ctx.timestamp,
            message_type,
            MessageContent::Structured(content),
        )];
    }

    let mut messages = Vec::with_capacity(result_parts.len() + 1);
    for (index, part) in result_parts.iter().enumerate() {
        if let Some(result) = part.to_tool_result() {
            let result_id = if result.tool_use_id.is_empty() {
                format!("{}_result_{}", id, index)
            } else {
                format!("{}_result", result.tool_use_id)
            };
            messages.push(ParsedMessage::tool_result(result_id, result, ctx.timestamp).with_parent(id.clone()));
        }
    }

    let has_text = other_parts
        .iter()
        .filter_map(ContentPart::as_text)
        .any(|t| !t.trim().is_empty());
    if has_text {
        let message_type = classify_user_texts(other_parts.iter().filter_map(ContentPart::as_text));
        let content = StructuredMessageContent::from_parts(other_parts);
        messages.push(ParsedMessage::new(
            id,
            ctx.timestamp,
            message_type,
            MessageContent::Structured(content),
        ));
    }

    messages
}
