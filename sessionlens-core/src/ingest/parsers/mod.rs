//! Provider-specific parsers
//!
//! Each supported provider has a parser module that implements
//! the [`SessionParser`](super::SessionParser) trait.
//!
//! ## Supported Providers
//!
//! | Provider | Module | Canonical name | Alias |
//! |----------|--------|----------------|-------|
//! | Claude Code | [`claude`] | `claude-code` | `claude` |
//! | Gemini CLI | [`gemini`] | `gemini-cli` | `gemini` |
//! | GitHub Copilot CLI | [`copilot`] | `github-copilot` | `copilot` |
//! | Codex | [`codex`] | `codex` | |
//! | OpenCode | [`opencode`] | `opencode` | |

mod claude;
mod codex;
mod copilot;
mod gemini;
mod opencode;

pub use claude::ClaudeCodeParser;
pub use codex::CodexParser;
pub use copilot::CopilotParser;
pub use gemini::GeminiParser;
pub use opencode::OpenCodeParser;

use super::content::extract_text_from_parts;
use super::SessionParser;
use crate::types::{
    ContentPart, MessageContent, MessageType, ParsedMessage, StructuredMessageContent,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Create all available parsers, in registration (and detection) order.
///
/// Claude Code comes first because its detection is the strictest; OpenCode
/// comes last because its line shape is the most generic.
pub fn create_all_parsers() -> Vec<Arc<dyn SessionParser>> {
    vec![
        Arc::new(ClaudeCodeParser::new()),
        Arc::new(GeminiParser::new()),
        Arc::new(CopilotParser::new()),
        Arc::new(CodexParser::new()),
        Arc::new(OpenCodeParser::new()),
    ]
}

/// Split one message's parts into a primary message plus tool messages.
///
/// The primary message (typed `primary`) holds the non-tool parts and is
/// emitted unless the line is tools only. Every tool use becomes a
/// `tool_use` message and every tool result a `tool_result` message linked
/// to its tool use; both point back at `id` through `parent_id`.
pub(crate) fn split_parts(
    id: &str,
    parts: Vec<ContentPart>,
    primary: MessageType,
    timestamp: DateTime<Utc>,
) -> Vec<ParsedMessage> {
    let (tool_parts, other_parts): (Vec<ContentPart>, Vec<ContentPart>) = parts
        .into_iter()
        .partition(|p| p.is_tool_use() || p.is_tool_result());

    let has_text = other_parts
        .iter()
        .filter_map(ContentPart::as_text)
        .any(|t| !t.trim().is_empty());

    let mut messages = Vec::with_capacity(tool_parts.len() + 1);

    if tool_parts.is_empty() || has_text {
        let content = if tool_parts.is_empty() && other_parts.iter().all(|p| p.as_text().is_some()) {
            MessageContent::Text(extract_text_from_parts(&other_parts))
        } else {
            MessageContent::Structured(StructuredMessageContent::from_parts(other_parts))
        };
        messages.push(ParsedMessage::new(id, timestamp, primary, content));
    }

    for (index, part) in tool_parts.iter().enumerate() {
        if let Some(mut tool) = part.to_tool_use() {
            if tool.id.is_empty() {
                tool.id = format!("{}_tool_{}", id, index);
            }
            messages.push(ParsedMessage::tool_use(tool, timestamp).with_parent(id));
        } else if let Some(result) = part.to_tool_result() {
            let result_id = if result.tool_use_id.is_empty() {
                format!("{}_result_{}", id, index)
            } else {
                format!("{}_result", result.tool_use_id)
            };
            messages.push(ParsedMessage::tool_result(result_id, result, timestamp).with_parent(id));
        }
    }

    messages
}
