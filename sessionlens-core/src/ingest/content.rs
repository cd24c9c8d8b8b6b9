//! Content helpers shared by all provider parsers
//!
//! Providers disagree on how content is shaped: a bare string, an array of
//! typed blocks, an array of untyped Gemini API parts, or a `{"parts": [...]}`
//! wrapper that may itself be serialized into a string. These helpers fold
//! all of those into [`ContentPart`]s and plain text, and never fail: shapes
//! they do not understand degrade to empty text or [`ContentPart::Unknown`].

use crate::types::{ContentPart, MessageType, RawLogMessage};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Markers Claude Code (and Copilot) write when the human cancels a turn.
pub const INTERRUPTION_MARKERS: &[&str] = &[
    "[Request interrupted by user]",
    "[Request interrupted by user for tool use]",
    "[Request cancelled by user]",
];

const COMMAND_NAME_TAG: &str = "<command-name>";
const COMMAND_STDOUT_TAG: &str = "<local-command-stdout>";

/// Object keys that hold readable text, in lookup order. Tool outputs use
/// `output` (Codex), `log` (Copilot) or `result`.
const TEXT_BEARING_KEYS: &[&str] = &["text", "parts", "content", "output", "log", "result"];

/// Parse a raw timestamp field.
///
/// Accepts RFC 3339 strings, naive ISO-8601 strings (read as UTC) and epoch
/// milliseconds, either numeric or as a digit string. Returns `None` for
/// anything else.
pub fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis);
    }

    None
}

/// Synthesize a message id: `msg_<epoch-ms>_<index>`.
pub fn generate_message_id(index: usize, timestamp: DateTime<Utc>) -> String {
    format!("msg_{}_{}", timestamp.timestamp_millis(), index)
}

/// Session id from the `sessionId` / `sessionID` fields most providers share.
pub fn session_id_field(raw: &RawLogMessage) -> Option<String> {
    raw.str_field("sessionId")
        .or_else(|| raw.str_field("sessionID"))
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Field deserializer that degrades a wrong-typed value to `None`.
///
/// Providers change incidental field types between releases (a numeric
/// `version`, an object where a string was); only that field is lost, not
/// the whole record.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// Detect a `{"parts": [...]}` wrapper.
///
/// The wrapper may arrive as an object or serialized into a string. Strings
/// that are not valid JSON are not a wrapper.
pub fn parse_parts_content(value: &Value) -> Option<Vec<Value>> {
    let decoded;
    let object = match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if !trimmed.starts_with('{') {
                return None;
            }
            decoded = serde_json::from_str::<Value>(trimmed).ok()?;
            &decoded
        }
        Value::Object(_) => value,
        _ => return None,
    };

    object.get("parts")?.as_array().cloned()
}

/// Normalize any content shape into parts.
///
/// `id_prefix` seeds ids for Gemini function calls that carry none, so
/// synthesized ids stay unique within a session.
pub fn content_parts(value: &Value, id_prefix: &str) -> Vec<ContentPart> {
    if let Some(parts) = parse_parts_content(value) {
        return normalize_parts(&parts, id_prefix);
    }

    match value {
        Value::Array(items) => normalize_parts(items, id_prefix),
        Value::String(text) => vec![ContentPart::Text { text: text.clone() }],
        Value::Object(_) => normalize_parts(std::slice::from_ref(value), id_prefix),
        _ => Vec::new(),
    }
}

fn normalize_parts(items: &[Value], id_prefix: &str) -> Vec<ContentPart> {
    let mut parts: Vec<ContentPart> = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let part = normalize_part(item, index, id_prefix, &parts);
        parts.push(part);
    }
    parts
}

fn normalize_part(item: &Value, index: usize, id_prefix: &str, earlier: &[ContentPart]) -> ContentPart {
    let object = match item {
        Value::String(text) => return ContentPart::Text { text: text.clone() },
        Value::Object(object) => object,
        _ => return ContentPart::Unknown,
    };

    // Typed block (Claude, OpenCode, Codex)
    if object.get("type").and_then(Value::as_str).is_some() {
        let part = serde_json::from_value::<ContentPart>(item.clone()).unwrap_or(ContentPart::Unknown);
        if part == ContentPart::Unknown {
            // input_text / output_text and friends
            if let Some(text) = object.get("text").and_then(Value::as_str) {
                return ContentPart::Text {
                    text: text.to_string(),
                };
            }
        }
        return part;
    }

    // Untyped Gemini API parts
    if let Some(text) = object.get("text").and_then(Value::as_str) {
        if object.get("thought").and_then(Value::as_bool).unwrap_or(false) {
            return ContentPart::Thinking {
                thinking: text.to_string(),
            };
        }
        return ContentPart::Text {
            text: text.to_string(),
        };
    }

    if let Some(call) = object.get("functionCall") {
        let name = call.get("name").and_then(Value::as_str).unwrap_or_default();
        let id = call
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_{}_{}", id_prefix, name, index));
        return ContentPart::ToolUse {
            id,
            name: name.to_string(),
            input: call.get("args").cloned().unwrap_or(Value::Null),
        };
    }

    if let Some(response) = object.get("functionResponse") {
        let name = response.get("name").and_then(Value::as_str).unwrap_or_default();
        let tool_use_id = response
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| matching_call_id(earlier, name))
            .unwrap_or_else(|| format!("{}_{}_{}", id_prefix, name, index));
        return ContentPart::ToolResult {
            tool_use_id,
            content: response.get("response").cloned().unwrap_or(Value::Null),
            is_error: false,
        };
    }

    if let Some(inline) = object.get("inlineData") {
        return ContentPart::Image {
            source: inline.get("mimeType").cloned(),
            data: inline.get("data").and_then(Value::as_str).map(str::to_string),
        };
    }

    ContentPart::Unknown
}

/// Id of the nearest earlier tool use with the given name.
fn matching_call_id(earlier: &[ContentPart], name: &str) -> Option<String> {
    earlier.iter().rev().find_map(|part| match part {
        ContentPart::ToolUse { id, name: n, .. } if n == name => Some(id.clone()),
        _ => None,
    })
}

/// Join the non-empty text parts with newlines.
pub fn extract_text_from_parts(parts: &[ContentPart]) -> String {
    parts
        .iter()
        .filter_map(ContentPart::as_text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Recursively pull readable text out of a string, array, or parts shape.
pub fn extract_text_content(value: &Value) -> String {
    match value {
        Value::String(s) => match parse_parts_content(value) {
            Some(parts) => join_texts(parts.iter().map(extract_text_content)),
            None => s.clone(),
        },
        Value::Array(items) => join_texts(items.iter().map(extract_text_content)),
        Value::Object(object) => TEXT_BEARING_KEYS
            .iter()
            .find_map(|key| object.get(*key))
            .map(extract_text_content)
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn join_texts(texts: impl Iterator<Item = String>) -> String {
    texts
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether text is an interruption marker.
pub fn is_interruption_content(text: &str) -> bool {
    INTERRUPTION_MARKERS.iter().any(|m| text.contains(m))
}

/// Whether text is a slash command.
pub fn is_command_content(text: &str) -> bool {
    text.trim_start().starts_with('/') || text.contains(COMMAND_NAME_TAG)
}

/// Whether text is captured output of a local command.
pub fn is_command_output_content(text: &str) -> bool {
    text.contains(COMMAND_STDOUT_TAG)
}

/// Classify human-authored text parts.
///
/// A message with at least one text part, where every part is empty or an
/// interruption marker, is an interruption. If every non-empty part is
/// command output or a command, it is that; otherwise it is ordinary user
/// input. No text parts at all is ordinary user input.
pub fn classify_user_texts<'a>(texts: impl IntoIterator<Item = &'a str>) -> MessageType {
    let texts: Vec<&str> = texts.into_iter().map(str::trim).collect();
    if texts.is_empty() {
        return MessageType::User;
    }
    if texts
        .iter()
        .all(|t| t.is_empty() || is_interruption_content(t))
    {
        return MessageType::Interruption;
    }

    let non_empty: Vec<&str> = texts.into_iter().filter(|t| !t.is_empty()).collect();
    if non_empty.iter().all(|t| is_command_output_content(t)) {
        return MessageType::CommandOutput;
    }
    if non_empty.iter().all(|t| is_command_content(t)) {
        return MessageType::Command;
    }
    MessageType::User
}
