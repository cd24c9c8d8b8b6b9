//! Canonical data model for normalized sessions
//!
//! Every provider parser turns its native JSONL events into these types, so
//! downstream consumers (metric processors, timeline renderers) can treat
//! Claude Code, Gemini, Copilot, Codex and OpenCode sessions uniformly.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Session** | One transcript, bounded by its first and last timestamped event |
//! | **Provider** | The assistant product that wrote the log (`claude-code`, `codex`, ...) |
//! | **Raw message** | One provider-native JSON object, one per JSONL line |
//! | **Content part** | A typed fragment of message content (text, tool use, ...) |
//! | **Parsed message** | The canonical unit of conversation |
//!
//! Serialized field names are camelCase, which is the shape the dashboard
//! front end consumes.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Open-ended, provider-specific metadata attached to messages.
///
/// Known keys (not exhaustive):
/// - all providers: `role`, `sessionId`
/// - Claude Code: `parentUuid`, `model`, `usage`, `requestId`, `toolUseCount`, `cwd`, `gitBranch`
/// - Gemini: `thoughts`, `tokens`, `model`, `cwd`
/// - Copilot: `callId`, `intentionSummary`
/// - OpenCode: `model`
/// - tool messages: `toolName`, `toolUseId`, `isError`
pub type Metadata = Map<String, Value>;

// ============================================
// Raw log lines
// ============================================

/// A provider-native JSON object read from one JSONL line.
///
/// Always wraps a JSON object; lines holding arrays or scalars never become
/// a `RawLogMessage`. Lives only for the duration of one line's parse.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLogMessage(Value);

impl RawLogMessage {
    /// Wrap a JSON value, returning `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        if value.is_object() {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Look up a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up a top-level string field.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// The `type` discriminator most providers put on every line.
    pub fn record_type(&self) -> Option<&str> {
        self.str_field("type")
    }

    /// The raw `timestamp` field, if any.
    pub fn timestamp(&self) -> Option<&Value> {
        self.0.get("timestamp")
    }

    /// Whether a top-level boolean flag is set to `true`.
    pub fn flag(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Deserialize the line into a provider-specific record type.
    pub fn deserialize<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.0)
    }

    /// The underlying JSON object.
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

// ============================================
// Content
// ============================================

/// A single semantic fragment of message content.
///
/// Unrecognized block types deserialize as [`ContentPart::Unknown`] instead
/// of failing the whole content array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default)]
        tool_use_id: String,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: bool,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    Image {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<Value>,
        /// Inline payload. Usually base64 and large.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl ContentPart {
    /// Text carried by a `text` part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn to_tool_use(&self) -> Option<ToolUse> {
        match self {
            ContentPart::ToolUse { id, name, input } => Some(ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            }),
            _ => None,
        }
    }

    pub fn to_tool_result(&self) -> Option<ToolResult> {
        match self {
            ContentPart::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => Some(ToolResult {
                tool_use_id: tool_use_id.clone(),
                content: content.clone(),
                is_error: *is_error,
            }),
            _ => None,
        }
    }

    pub fn is_tool_use(&self) -> bool {
        matches!(self, ContentPart::ToolUse { .. })
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, ContentPart::ToolResult { .. })
    }
}

/// An assistant's request to run a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: Value,
}

impl ToolUse {
    pub fn to_part(&self) -> ContentPart {
        ContentPart::ToolUse {
            id: self.id.clone(),
            name: self.name.clone(),
            input: self.input.clone(),
        }
    }
}

/// The output a tool produced for a [`ToolUse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub tool_use_id: String,
    pub content: Value,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn to_part(&self) -> ContentPart {
        ContentPart::ToolResult {
            tool_use_id: self.tool_use_id.clone(),
            content: self.content.clone(),
            is_error: self.is_error,
        }
    }
}

/// Content that carries more than plain text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredMessageContent {
    pub text: String,
    #[serde(default)]
    pub tool_uses: Vec<ToolUse>,
    #[serde(default)]
    pub tool_results: Vec<ToolResult>,
    #[serde(default)]
    pub structured: Vec<ContentPart>,
}

impl StructuredMessageContent {
    /// Build from parts: text parts are joined with newlines, tool parts are
    /// collected, and the parts themselves are kept in `structured`.
    pub fn from_parts(parts: Vec<ContentPart>) -> Self {
        let text = parts
            .iter()
            .filter_map(ContentPart::as_text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        let tool_uses = parts.iter().filter_map(ContentPart::to_tool_use).collect();
        let tool_results = parts
            .iter()
            .filter_map(ContentPart::to_tool_result)
            .collect();

        Self {
            text,
            tool_uses,
            tool_results,
            structured: parts,
        }
    }
}

/// Message content: plain text or a structured record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Structured(StructuredMessageContent),
}

impl MessageContent {
    /// The human-readable text, whatever the shape.
    pub fn text(&self) -> &str {
        match self {
            MessageContent::Text(text) => text,
            MessageContent::Structured(s) => &s.text,
        }
    }

    pub fn tool_uses(&self) -> &[ToolUse] {
        match self {
            MessageContent::Text(_) => &[],
            MessageContent::Structured(s) => &s.tool_uses,
        }
    }

    pub fn tool_results(&self) -> &[ToolResult] {
        match self {
            MessageContent::Text(_) => &[],
            MessageContent::Structured(s) => &s.tool_results,
        }
    }
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

// ============================================
// Messages
// ============================================

/// Unified message type across all providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Human input
    User,
    /// Assistant prose
    Assistant,
    /// Assistant invoking a tool
    ToolUse,
    /// Output returned by a tool
    ToolResult,
    /// Slash command typed by the human
    Command,
    /// Output of a local command
    CommandOutput,
    /// Human cancelling an in-progress action
    Interruption,
    /// Context compaction summary
    Compact,
    /// System/meta records that are not conversation
    Meta,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::User => "user",
            MessageType::Assistant => "assistant",
            MessageType::ToolUse => "tool_use",
            MessageType::ToolResult => "tool_result",
            MessageType::Command => "command",
            MessageType::CommandOutput => "command_output",
            MessageType::Interruption => "interruption",
            MessageType::Compact => "compact",
            MessageType::Meta => "meta",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" | "user_input" => Ok(MessageType::User),
            "assistant" => Ok(MessageType::Assistant),
            "tool_use" => Ok(MessageType::ToolUse),
            "tool_result" => Ok(MessageType::ToolResult),
            "command" => Ok(MessageType::Command),
            "command_output" => Ok(MessageType::CommandOutput),
            "interruption" => Ok(MessageType::Interruption),
            "compact" => Ok(MessageType::Compact),
            "meta" => Ok(MessageType::Meta),
            _ => Err(format!("unknown message type: {}", s)),
        }
    }
}

/// The canonical unit of conversation.
///
/// `parent_id` and `linked_to` are weak references by id: a split-off tool
/// use points at the message it came from, a tool result points at the
/// tool use it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_to: Option<String>,
}

impl ParsedMessage {
    pub fn new(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        message_type: MessageType,
        content: MessageContent,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            message_type,
            content,
            metadata: Metadata::new(),
            parent_id: None,
            linked_to: None,
        }
    }

    /// A `tool_use` message whose id is the tool use's own id.
    pub fn tool_use(tool: ToolUse, timestamp: DateTime<Utc>) -> Self {
        let part = tool.to_part();
        let id = tool.id.clone();
        let name = tool.name.clone();
        let content = StructuredMessageContent {
            text: String::new(),
            tool_uses: vec![tool],
            tool_results: Vec::new(),
            structured: vec![part],
        };

        Self::new(
            id.clone(),
            timestamp,
            MessageType::ToolUse,
            MessageContent::Structured(content),
        )
        .with_metadata("toolName", name)
        .with_metadata("toolUseId", id)
    }

    /// A `tool_result` message linked to the tool use it answers.
    pub fn tool_result(id: impl Into<String>, result: ToolResult, timestamp: DateTime<Utc>) -> Self {
        let part = result.to_part();
        let linked = result.tool_use_id.clone();
        let is_error = result.is_error;
        let content = StructuredMessageContent {
            text: crate::ingest::content::extract_text_content(&result.content),
            tool_uses: Vec::new(),
            tool_results: vec![result],
            structured: vec![part],
        };

        let mut message = Self::new(
            id,
            timestamp,
            MessageType::ToolResult,
            MessageContent::Structured(content),
        )
        .with_metadata("toolUseId", linked.clone())
        .with_metadata("isError", is_error);
        message.linked_to = Some(linked);
        message
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Merge a set of shared metadata keys; keys already present win.
    pub fn with_shared_metadata(mut self, shared: &Metadata) -> Self {
        for (key, value) in shared {
            self.metadata
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_link(mut self, linked_to: impl Into<String>) -> Self {
        self.linked_to = Some(linked_to.into());
        self
    }

    /// Shorthand for the message's text content.
    pub fn text(&self) -> &str {
        self.content.text()
    }
}

// ============================================
// Sessions
// ============================================

/// Bookkeeping about one `parse_session` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    /// Number of emitted messages
    pub message_count: usize,
    /// Number of non-blank input lines
    pub line_count: usize,
    /// Non-blank lines that contributed nothing
    pub skipped_lines: usize,
    /// Display name of the parser that produced the session
    pub parser_name: String,
}

/// Aggregate root for one parsed transcript.
///
/// Messages keep source order; the pipeline never re-sorts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSession {
    pub session_id: String,
    pub provider: String,
    pub messages: Vec<ParsedMessage>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// `end_time - start_time` in milliseconds, never negative
    #[serde(rename = "duration")]
    pub duration_ms: i64,
    pub metadata: SessionMetadata,
}

impl ParsedSession {
    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.duration_ms)
    }

    /// Messages of one type, in source order.
    pub fn messages_of_type(&self, message_type: MessageType) -> impl Iterator<Item = &ParsedMessage> {
        self.messages
            .iter()
            .filter(move |m| m.message_type == message_type)
    }

    pub fn find_message(&self, id: &str) -> Option<&ParsedMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Message counts keyed by type name.
    pub fn count_by_type(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for message in &self.messages {
            *counts.entry(message.message_type.as_str()).or_insert(0) += 1;
        }
        counts
    }
}
