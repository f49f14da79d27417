//! Parser capability and registry
//!
//! A parser turns raw record text into a [`ParseTree`]. Parsers are registered
//! under one or more content-type or extension keys; resolution never fails
//! because unknown types degrade to the plain-text parser.

pub mod plain;
pub mod wikitext;

pub use plain::PlainTextParser;
pub use wikitext::WikiTextParser;

use crate::tree::ParseTree;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Content type key the plain-text fallback is looked up under
pub const PLAIN_TEXT_TYPE: &str = "text/plain";

/// Content type of the wikitext dialect
pub const WIKITEXT_TYPE: &str = "text/x-tiddlywiki";

/// Turns raw text into a parse tree
pub trait Parser: Send + Sync {
    fn parse(&self, text: &str) -> ParseTree;
}

impl<F> Parser for F
where
    F: Fn(&str) -> ParseTree + Send + Sync,
{
    fn parse(&self, text: &str) -> ParseTree {
        self(text)
    }
}

/// Content type / extension key → parser
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn Parser>>,
    fallback: Arc<dyn Parser>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
            fallback: Arc::new(PlainTextParser),
        }
    }

    /// Register `parser` under every key; later registrations win
    pub fn register<I, S>(&mut self, keys: I, parser: Arc<dyn Parser>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for key in keys {
            let key = key.into();
            if self.parsers.insert(key.clone(), parser.clone()).is_some() {
                tracing::debug!(key = %key, "parser registration replaced");
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.parsers.contains_key(key)
    }

    /// Exact key, then extension key, then the plain-text parser
    pub fn resolve(&self, content_type: &str) -> Arc<dyn Parser> {
        if let Some(parser) = self.parsers.get(content_type) {
            return parser.clone();
        }

        if let Some(parser) = extension_key(content_type).and_then(|ext| self.parsers.get(&ext)) {
            return parser.clone();
        }

        tracing::trace!(content_type, "no parser registered, using plain text");
        self.parsers
            .get(PLAIN_TEXT_TYPE)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

/// `image/photo.PNG` → `.png`
fn extension_key(content_type: &str) -> Option<String> {
    let dot = content_type.rfind('.')?;
    let ext = &content_type[dot..];
    if ext.len() < 2 || ext.contains('/') {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
