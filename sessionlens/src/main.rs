//! sessionlens-parse - normalize AI coding-assistant session logs
//!
//! Parses provider JSONL logs and prints the canonical session as JSON.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use sessionlens_core::{
    logging, Config, Error, ParsedSession, ParserRegistry, SessionMetadata, SessionParser,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sessionlens-parse")]
#[command(about = "Parse AI coding-assistant session logs and output the unified format")]
#[command(version)]
struct Args {
    /// Path(s) to JSONL file(s) to parse
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Provider name or alias (default: auto-detect)
    #[arg(short, long)]
    provider: Option<String>,

    /// Compact JSON output (default: pretty)
    #[arg(long)]
    compact: bool,

    /// Show only summary statistics (no messages)
    #[arg(long)]
    summary: bool,

    /// Verbose output (debug logging)
    #[arg(short, long)]
    verbose: bool,

    /// Log to the rolling file under $XDG_STATE_HOME/sessionlens/ instead of stderr
    #[arg(long)]
    log_file: bool,

    /// Config file (default: $XDG_CONFIG_HOME/sessionlens/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Full session output for one file
#[derive(Serialize)]
struct SessionOutput {
    file: String,
    #[serde(flatten)]
    session: ParsedSession,
}

/// Summary output for one file
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryOutput {
    file: String,
    session_id: String,
    provider: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    duration: i64,
    metadata: SessionMetadata,
    by_type: BTreeMap<&'static str, usize>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum FileOutput {
    Session(Box<SessionOutput>),
    Summary(SummaryOutput),
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };

    let mut logging_config = config.logging.clone();
    if args.verbose {
        logging_config.level = "debug".to_string();
    }
    // Held until exit so buffered file logs are flushed.
    let _log_guard = if args.log_file {
        Some(logging::init(&logging_config).context("Failed to initialize logging")?)
    } else {
        logging::init_stderr(&logging_config.level);
        None
    };

    let registry =
        ParserRegistry::from_config(&config.registry).context("Invalid [registry] config")?;

    let mut outputs = Vec::new();

    for file in &args.files {
        if !file.exists() {
            eprintln!("Warning: File not found: {}", file.display());
            continue;
        }

        match parse_file(&registry, &args, &config, file) {
            Ok(session) => outputs.push(build_output(&args, file, session)),
            Err(e) => eprintln!("Warning: Failed to parse {}: {:#}", file.display(), e),
        }
    }

    if outputs.is_empty() {
        anyhow::bail!("No files were successfully parsed");
    }

    // Output: single object for one file, array for multiple
    if outputs.len() == 1 {
        if args.compact {
            println!("{}", serde_json::to_string(&outputs[0])?);
        } else {
            println!("{}", serde_json::to_string_pretty(&outputs[0])?);
        }
    } else if args.compact {
        println!("{}", serde_json::to_string(&outputs)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    }

    Ok(())
}

/// Read and parse one file.
///
/// An explicit `--provider` wins; otherwise the format is detected, falling
/// back to `[registry] default_provider`.
fn parse_file(
    registry: &ParserRegistry,
    args: &Args,
    config: &Config,
    file: &Path,
) -> Result<ParsedSession> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;

    let parser = match &args.provider {
        Some(name) => registry
            .get_parser(name)
            .ok_or_else(|| Error::UnknownProvider(name.clone()))?,
        None => match registry.detect_parser(&content) {
            Some(parser) => parser,
            None => {
                let fallback = config
                    .registry
                    .default_provider
                    .as_deref()
                    .and_then(|name| registry.get_parser(name));
                match fallback {
                    Some(parser) => {
                        tracing::info!(
                            file = %file.display(),
                            provider = parser.provider_name(),
                            "format not detected, using default provider"
                        );
                        parser
                    }
                    None if content.trim().is_empty() => return Err(Error::EmptyContent.into()),
                    None => return Err(Error::UnrecognizedFormat.into()),
                }
            }
        },
    };

    tracing::debug!(file = %file.display(), parser = parser.name(), "parsing");
    Ok(parser.parse_session(&content)?)
}

fn build_output(args: &Args, file: &Path, session: ParsedSession) -> FileOutput {
    let file = file.display().to_string();
    if args.summary {
        FileOutput::Summary(SummaryOutput {
            file,
            by_type: session.count_by_type(),
            session_id: session.session_id,
            provider: session.provider,
            start_time: session.start_time,
            end_time: session.end_time,
            duration: session.duration_ms,
            metadata: session.metadata,
        })
    } else {
        FileOutput::Session(Box::new(SessionOutput { file, session }))
    }
}
