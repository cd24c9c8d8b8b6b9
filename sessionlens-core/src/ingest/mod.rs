//! Ingestion layer: provider JSONL in, canonical sessions out
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌─────────────────┐
//! │  JSONL content  │ ──► │  ParserRegistry  │ ──► │  ParsedSession  │
//! │ (one provider)  │     │ (lookup/detect)  │     │ (messages, ...) │
//! └─────────────────┘     └──────────────────┘     └─────────────────┘
//!                               │
//!                               ▼
//!                    ┌──────────────────────┐
//!                    │  SessionParser       │
//!                    │  ├─ ClaudeCodeParser │
//!                    │  ├─ GeminiParser     │
//!                    │  ├─ CopilotParser    │
//!                    │  ├─ CodexParser      │
//!                    │  └─ OpenCodeParser   │
//!                    └──────────────────────┘
//! ```
//!
//! Parsing never touches the filesystem: callers read the file and hand the
//! text in. A session parse is a pure function of the content and the
//! [`Clock`](clock::Clock) used for fallbacks.
//!
//! ## Usage
//!
//! ```rust
//! use sessionlens_core::ingest::ParserRegistry;
//!
//! let content = r#"{"uuid":"1","timestamp":"2025-01-01T00:00:00Z","type":"user","message":{"role":"user","content":"hi"}}"#;
//! let session = ParserRegistry::global().parse(content, None).unwrap();
//! assert_eq!(session.provider, "claude-code");
//! ```

pub mod clock;
pub mod content;
mod parser;
pub mod parsers;
pub mod registry;

pub use clock::{Clock, FixedClock, SystemClock};
pub use parser::{
    sample_objects, validate_content, LineContext, LineResult, SessionParser, Skip,
    DETECTION_SAMPLE_LINES, VALIDATION_SAMPLE_LINES,
};
pub use registry::ParserRegistry;
