//! Parser lookup and format detection
//!
//! The registry maps names to shared parser instances. Each parser is stored
//! under its display name and its provider name; aliases point at the same
//! instance. Keys are trimmed and lowercased.
//!
//! Order matters: [`ParserRegistry::detect_parser`] and the substring
//! fallback in [`ParserRegistry::get_parser`] both return the first match in
//! registration order.

use super::parser::SessionParser;
use super::parsers::create_all_parsers;
use crate::config::RegistryConfig;
use crate::error::{Error, Result};
use crate::types::ParsedSession;
use std::sync::{Arc, OnceLock};

/// Short names registered by default, as `(alias, provider)`.
pub const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("claude", "claude-code"),
    ("gemini", "gemini-cli"),
    ("copilot", "github-copilot"),
];

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Name → parser lookup table.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    entries: Vec<(String, Arc<dyn SessionParser>)>,
}

impl ParserRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in parser and the default aliases.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for parser in create_all_parsers() {
            registry.register(parser);
        }
        for (alias, provider) in DEFAULT_ALIASES {
            if let Some(parser) = registry.get_exact(provider) {
                registry.insert(normalize(alias), parser);
            }
        }
        registry
    }

    /// Build the default registry plus the aliases from `[registry]` config.
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let mut registry = Self::with_defaults();
        for (alias, provider) in &config.aliases {
            registry.register_alias(alias, provider).map_err(|_| {
                Error::Config(format!(
                    "alias '{}' points at unknown provider '{}'",
                    alias, provider
                ))
            })?;
        }
        if let Some(default) = &config.default_provider {
            if registry.get_parser(default).is_none() {
                return Err(Error::Config(format!(
                    "default_provider '{}' is not a registered parser",
                    default
                )));
            }
        }
        Ok(registry)
    }

    /// Process-wide registry with the built-in parsers, built on first use.
    pub fn global() -> &'static ParserRegistry {
        static GLOBAL: OnceLock<ParserRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ParserRegistry::with_defaults)
    }

    /// Register a parser under its display name and provider name.
    ///
    /// Re-registering a key replaces the parser but keeps the key's position.
    pub fn register(&mut self, parser: Arc<dyn SessionParser>) {
        let name = normalize(parser.name());
        let provider = normalize(parser.provider_name());
        self.insert(name.clone(), Arc::clone(&parser));
        if provider != name {
            self.insert(provider, parser);
        }
    }

    /// Point `alias` at the parser currently registered as `provider`.
    pub fn register_alias(&mut self, alias: &str, provider: &str) -> Result<()> {
        let parser = self
            .get_exact(provider)
            .ok_or_else(|| Error::UnknownProvider(provider.to_string()))?;
        self.insert(normalize(alias), parser);
        Ok(())
    }

    fn insert(&mut self, key: String, parser: Arc<dyn SessionParser>) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = parser,
            None => self.entries.push((key, parser)),
        }
    }

    fn get_exact(&self, provider: &str) -> Option<Arc<dyn SessionParser>> {
        let key = normalize(provider);
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, p)| Arc::clone(p))
    }

    /// Look up a parser by name.
    ///
    /// Exact (case-insensitive, trimmed) match first. Failing that, the first
    /// key that contains the query or is contained in it wins. The fallback
    /// is best effort: short queries can match more than one key.
    pub fn get_parser(&self, provider: &str) -> Option<Arc<dyn SessionParser>> {
        let key = normalize(provider);
        if key.is_empty() {
            return None;
        }
        self.get_exact(&key).or_else(|| {
            self.entries
                .iter()
                .find(|(k, _)| k.contains(&key) || key.contains(k.as_str()))
                .map(|(_, p)| Arc::clone(p))
        })
    }

    /// First parser, in registration order, whose sniffing accepts `content`.
    pub fn detect_parser(&self, content: &str) -> Option<Arc<dyn SessionParser>> {
        let detected = self.parsers().into_iter().find(|p| p.can_parse(content));
        match &detected {
            Some(parser) => tracing::debug!(provider = parser.provider_name(), "detected format"),
            None => tracing::debug!("no parser recognized content"),
        }
        detected
    }

    /// Unique parser instances in registration order.
    pub fn parsers(&self) -> Vec<Arc<dyn SessionParser>> {
        let mut unique: Vec<Arc<dyn SessionParser>> = Vec::new();
        for (_, parser) in &self.entries {
            if !unique.iter().any(|p| Arc::ptr_eq(p, parser)) {
                unique.push(Arc::clone(parser));
            }
        }
        unique
    }

    /// Registered keys (names, provider names and aliases) in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Parse with the named parser, or auto-detect when `provider` is `None`.
    pub fn parse(&self, content: &str, provider: Option<&str>) -> Result<ParsedSession> {
        let parser = match provider {
            Some(name) => self
                .get_parser(name)
                .ok_or_else(|| Error::UnknownProvider(name.to_string()))?,
            None => {
                if content.trim().is_empty() {
                    return Err(Error::EmptyContent);
                }
                self.detect_parser(content).ok_or(Error::UnrecognizedFormat)?
            }
        };
        parser.parse_session(content)
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, p)| (k, p.provider_name())))
            .finish()
    }
}
