//! # sessionlens-core
//!
//! Core library for sessionlens: normalizes AI coding-assistant transcripts
//! into one canonical session model.
//!
//! This library provides:
//! - Domain types for sessions and messages
//! - One parser per provider (Claude Code, Gemini CLI, GitHub Copilot CLI,
//!   Codex, OpenCode) behind the [`SessionParser`] trait
//! - A [`ParserRegistry`] for lookup by name and format auto-detection
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Tolerant parsing
//!
//! Only two conditions fail a parse: empty content, and content whose first
//! lines hold no valid JSON. Every other bad line is skipped and counted in
//! [`SessionMetadata::skipped_lines`].
//!
//! ## Example
//!
//! ```rust
//! use sessionlens_core::{MessageType, ParserRegistry};
//!
//! let jsonl = concat!(
//!     r#"{"uuid":"a1","sessionId":"s1","timestamp":"2025-01-01T00:00:00Z","type":"assistant","#,
//!     r#""message":{"role":"assistant","content":[{"type":"tool_use","id":"t1","name":"Bash","input":{}}]}}"#,
//! );
//! let session = ParserRegistry::global().parse(jsonl, Some("claude")).unwrap();
//! assert_eq!(session.session_id, "s1");
//! assert_eq!(session.messages[0].message_type, MessageType::ToolUse);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use ingest::{ParserRegistry, SessionParser};
pub use types::*;

// Public modules
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod types;
