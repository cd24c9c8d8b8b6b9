//! Parser trait abstraction
//!
//! All provider parsers implement the [`SessionParser`] trait. The trait's
//! provided methods own everything that is not provider-specific: content
//! validation, line splitting, session-id discovery, timestamp bounds and
//! session assembly. A provider only says whether it recognizes some content
//! ([`SessionParser::can_parse`]) and how one raw line becomes messages
//! ([`SessionParser::parse_message`]).
//!
//! ## Design Principles
//!
//! 1. **Tolerance**: a line that fails to parse is skipped, never fatal. Only
//!    content with no usable JSON at all is an error.
//! 2. **Line purity**: a line's messages depend only on that line. The only
//!    state carried across lines is the session id and time bounds.
//! 3. **Explicit skips**: the per-line step returns [`LineResult`], so the
//!    reason a line contributed nothing is visible and testable.

use crate::error::{Error, Result};
use crate::ingest::clock::{Clock, SystemClock};
use crate::ingest::content::{parse_timestamp, session_id_field};
use crate::types::{ParsedMessage, ParsedSession, RawLogMessage, SessionMetadata};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Number of non-blank lines inspected when validating content.
pub const VALIDATION_SAMPLE_LINES: usize = 3;

/// Number of non-blank lines inspected by format detection.
pub const DETECTION_SAMPLE_LINES: usize = 5;

/// Why a line contributed no messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    /// Line is not valid JSON
    InvalidJson(String),
    /// Line is JSON but not an object
    NotAnObject,
    /// Timestamp is missing or unparsable
    MissingTimestamp,
    /// Line has the right shape but unusable fields
    Malformed(String),
    /// Record kind this parser does not turn into messages
    Unsupported(String),
}

impl std::fmt::Display for Skip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Skip::InvalidJson(e) => write!(f, "invalid JSON: {}", e),
            Skip::NotAnObject => write!(f, "not a JSON object"),
            Skip::MissingTimestamp => write!(f, "missing or invalid timestamp"),
            Skip::Malformed(reason) => write!(f, "malformed record: {}", reason),
            Skip::Unsupported(kind) => write!(f, "unsupported record type: {}", kind),
        }
    }
}

/// Outcome of transforming one line.
pub type LineResult = std::result::Result<Vec<ParsedMessage>, Skip>;

/// Per-line information handed to [`SessionParser::parse_message`].
#[derive(Debug, Clone, Copy)]
pub struct LineContext {
    /// 1-based line number in the input, blank lines included
    pub line_number: usize,
    /// Number of messages emitted before this line
    pub message_index: usize,
    /// The line's parsed timestamp
    pub timestamp: DateTime<Utc>,
}

/// Parse the first `limit` non-blank lines that are JSON objects.
///
/// Used by format detection; lines that fail to parse are passed over but
/// still count toward the limit.
pub fn sample_objects(content: &str, limit: usize) -> Vec<RawLogMessage> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(limit)
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(RawLogMessage::from_value)
        .collect()
}

/// Reject content that is empty or has no valid JSON in its first lines.
pub fn validate_content(content: &str, provider: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(Error::EmptyContent);
    }

    let has_json = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(VALIDATION_SAMPLE_LINES)
        .any(|line| serde_json::from_str::<Value>(line).is_ok());

    if !has_json {
        tracing::warn!(provider, "content has no valid JSON lines");
        return Err(Error::NoValidJsonLines {
            provider: provider.to_string(),
        });
    }

    Ok(())
}

/// Trait implemented by all provider parsers.
///
/// Parsers hold no per-call state, so one instance can parse many sessions,
/// including concurrently.
///
/// ## Example
///
/// ```rust,ignore
/// use sessionlens_core::ingest::{SessionParser, LineContext, LineResult};
///
/// struct MyParser;
///
/// impl SessionParser for MyParser {
///     fn name(&self) -> &str { "My Assistant" }
///     fn provider_name(&self) -> &str { "my-assistant" }
///     // ... implement can_parse and parse_message
/// }
/// ```
pub trait SessionParser: Send + Sync {
    /// Display name, e.g. "Claude Code"
    fn name(&self) -> &str;

    /// Canonical provider identifier, e.g. "claude-code"
    fn provider_name(&self) -> &str;

    /// Sniff the first few lines for this provider's distinguishing fields.
    fn can_parse(&self, content: &str) -> bool;

    /// Transform one raw line into zero or more messages.
    fn parse_message(&self, raw: &RawLogMessage, ctx: &LineContext) -> LineResult;

    /// Session id carried by a line, if any.
    fn extract_session_id(&self, raw: &RawLogMessage) -> Option<String> {
        session_id_field(raw)
    }

    /// Session id used when no line carries one.
    fn fallback_session_id(&self, now: DateTime<Utc>) -> String {
        format!("session_{}", now.timestamp_millis())
    }

    /// Reject content that cannot possibly yield a session.
    fn validate_content(&self, content: &str) -> Result<()> {
        validate_content(content, self.provider_name())
    }

    /// Parse a whole JSONL transcript using the system clock for fallbacks.
    fn parse_session(&self, content: &str) -> Result<ParsedSession> {
        self.parse_session_with_clock(content, &SystemClock)
    }

    /// Parse a whole JSONL transcript.
    ///
    /// ## Error Handling
    ///
    /// - Empty content, or content whose first lines hold no valid JSON,
    ///   returns `Err`.
    /// - Any single line that is not JSON, is not an object, lacks a valid
    ///   timestamp, or is rejected by [`Self::parse_message`] is skipped and
    ///   counted in `metadata.skipped_lines`.
    fn parse_session_with_clock(&self, content: &str, clock: &dyn Clock) -> Result<ParsedSession> {
        self.validate_content(content)?;

        let provider = self.provider_name();
        let mut session_id: Option<String> = None;
        let mut start_time: Option<DateTime<Utc>> = None;
        let mut end_time: Option<DateTime<Utc>> = None;
        let mut messages: Vec<ParsedMessage> = Vec::new();
        let mut line_count = 0usize;
        let mut skipped_lines = 0usize;

        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            line_count += 1;
            let line_number = index + 1;

            let outcome = parse_line(self, line, line_number, messages.len(), &mut session_id)
                .and_then(|(raw, ctx)| {
                    start_time = Some(start_time.map_or(ctx.timestamp, |t| t.min(ctx.timestamp)));
                    end_time = Some(end_time.map_or(ctx.timestamp, |t| t.max(ctx.timestamp)));
                    self.parse_message(&raw, &ctx)
                });

            match outcome {
                Ok(parsed) => messages.extend(parsed),
                Err(skip) => {
                    skipped_lines += 1;
                    tracing::debug!(provider, line = line_number, reason = %skip, "skipping line");
                }
            }
        }

        let now = clock.now();
        let session_id = session_id.unwrap_or_else(|| self.fallback_session_id(now));
        let start_time = start_time.unwrap_or(now);
        let end_time = end_time.unwrap_or(start_time);
        let duration_ms = (end_time - start_time).num_milliseconds();

        tracing::debug!(
            provider,
            session_id = %session_id,
            messages = messages.len(),
            lines = line_count,
            skipped = skipped_lines,
            "parsed session"
        );

        Ok(ParsedSession {
            session_id,
            provider: provider.to_string(),
            metadata: SessionMetadata {
                message_count: messages.len(),
                line_count,
                skipped_lines,
                parser_name: self.name().to_string(),
            },
            messages,
            start_time,
            end_time,
            duration_ms,
        })
    }
}

/// Decode one line and build its context.
///
/// The session id is taken from the first line that carries one, even when
/// that line is later skipped for lacking a timestamp.
fn parse_line<P: SessionParser + ?Sized>(
    parser: &P,
    line: &str,
    line_number: usize,
    message_index: usize,
    session_id: &mut Option<String>,
) -> std::result::Result<(RawLogMessage, LineContext), Skip> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| Skip::InvalidJson(e.to_string()))?;
    let raw = RawLogMessage::from_value(value).ok_or(Skip::NotAnObject)?;

    if session_id.is_none() {
        *session_id = parser.extract_session_id(&raw);
    }

    let timestamp = parse_timestamp(raw.timestamp()).ok_or(Skip::MissingTimestamp)?;

    Ok((
        raw,
        LineContext {
            line_number,
            message_index,
            timestamp,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::clock::FixedClock;
    use crate::types::{MessageContent, MessageType};

    /// Emits one user message per line carrying a `text` field.
    struct EchoParser;

    impl SessionParser for EchoParser {
        fn name(&self) -> &str {
            "Echo"
        }

        fn provider_name(&self) -> &str {
            "echo"
        }

        fn can_parse(&self, content: &str) -> bool {
            sample_objects(content, DETECTION_SAMPLE_LINES)
                .iter()
                .any(|raw| raw.get("text").is_some())
        }

        fn parse_message(&self, raw: &RawLogMessage, ctx: &LineContext) -> LineResult {
            let text = raw
                .str_field("text")
                .ok_or_else(|| Skip::Malformed("no text".to_string()))?;
            Ok(vec![ParsedMessage::new(
                format!("m{}", ctx.line_number),
                ctx.timestamp,
                MessageType::User,
                MessageContent::Text(text.to_string()),
            )])
        }
    }

    #[test]
    fn test_empty_content_is_error() {
        assert!(matches!(EchoParser.parse_session(""), Err(Error::EmptyContent)));
        assert!(matches!(EchoParser.parse_session("  \n\n"), Err(Error::EmptyContent)));
    }

    #[test]
    fn test_no_valid_json_is_error() {
        let err = EchoParser.parse_session("nope\nstill nope\n").unwrap_err();
        assert!(matches!(err, Error::NoValidJsonLines { .. }));
    }

    #[test]
    fn test_only_first_three_lines_are_validated() {
        let content = "a\nb\nc\n{\"timestamp\":\"2025-01-01T00:00:00Z\",\"text\":\"hi\"}";
        assert!(EchoParser.parse_session(content).is_err());
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let content = concat!(
            "{\"timestamp\":\"2025-01-01T00:00:00Z\",\"text\":\"one\"}\n",
            "not json\n",
            "[1,2,3]\n",
            "{\"text\":\"no timestamp\"}\n",
            "{\"timestamp\":\"garbage\",\"text\":\"bad timestamp\"}\n",
            "{\"timestamp\":\"2025-01-01T00:00:05Z\"}\n",
            "\n",
            "{\"timestamp\":\"2025-01-01T00:00:10Z\",\"text\":\"two\"}\n",
        );
        let session = EchoParser.parse_session(content).unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.metadata.line_count, 7);
        assert_eq!(session.metadata.skipped_lines, 5);
        assert_eq!(session.messages[1].id, "m8");
    }

    #[test]
    fn test_bounds_include_lines_rejected_by_parse_message() {
        let content = concat!(
            "{\"timestamp\":\"2025-01-01T00:00:05Z\",\"text\":\"one\"}\n",
            "{\"timestamp\":\"2025-01-01T00:00:00Z\"}\n",
            "{\"timestamp\":\"2025-01-01T00:00:30Z\"}\n",
        );
        let session = EchoParser.parse_session(content).unwrap();
        assert_eq!(session.duration_ms, 30_000);
        assert!(session.start_time <= session.end_time);
        assert_eq!(
            session.duration_ms,
            (session.end_time - session.start_time).num_milliseconds()
        );
    }

    #[test]
    fn test_defaults_without_timestamps() {
        let clock = FixedClock::from_millis(1_700_000_000_000);
        let session = EchoParser
            .parse_session_with_clock("{\"text\":\"hi\"}", &clock)
            .unwrap();
        assert!(session.messages.is_empty());
        assert_eq!(session.start_time, clock.0);
        assert_eq!(session.end_time, clock.0);
        assert_eq!(session.duration_ms, 0);
        assert_eq!(session.session_id, "session_1700000000000");
    }

    #[test]
    fn test_session_id_from_first_line_that_has_one() {
        let content = concat!(
            "{\"timestamp\":\"2025-01-01T00:00:00Z\",\"text\":\"a\"}\n",
            "{\"sessionId\":\"first\"}\n",
            "{\"timestamp\":\"2025-01-01T00:00:01Z\",\"text\":\"b\",\"sessionId\":\"second\"}\n",
        );
        let session = EchoParser.parse_session(content).unwrap();
        assert_eq!(session.session_id, "first");
        assert_eq!(session.metadata.parser_name, "Echo");
        assert_eq!(session.provider, "echo");
    }

    #[test]
    fn test_skip_display() {
        assert_eq!(Skip::MissingTimestamp.to_string(), "missing or invalid timestamp");
        assert_eq!(
            Skip::Unsupported("summary".to_string()).to_string(),
            "unsupported record type: summary"
        );
    }
}
