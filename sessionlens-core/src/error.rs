//! Error types for sessionlens-core

use thiserror::Error;

/// Main error type for the sessionlens-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Content handed to a parser was empty or whitespace only
    #[error("empty content: nothing to parse")]
    EmptyContent,

    /// None of the sampled lines were valid JSON
    #[error("no valid JSON lines found in {provider} content")]
    NoValidJsonLines { provider: String },

    /// No parser is registered under the requested name
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// No registered parser recognized the content
    #[error("unrecognized session format: no registered parser accepts this content")]
    UnrecognizedFormat,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for sessionlens-core
pub type Result<T> = std::result::Result<T, Error>;
