//! Shared types for tiddle
//!
//! This crate provides the value types passed between the store, the render
//! engine and their listeners: record titles, the records themselves
//! ("tiddlers"), and the batched change maps emitted at each flush.

mod change;
mod tiddler;

pub use change::{ChangeKind, ChangeMap};
pub use tiddler::{format_tags, parse_tags, Tiddler, TiddlerDate};

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Record title, the unique key of a tiddler
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Title(String);

impl Title {
    pub fn new(title: impl Into<String>) -> Self {
        Self(title.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for Title {
    fn from(title: &str) -> Self {
        Title(title.to_string())
    }
}

impl From<String> for Title {
    fn from(title: String) -> Self {
        Title(title)
    }
}

impl From<&Title> for Title {
    fn from(title: &Title) -> Self {
        title.clone()
    }
}

impl Borrow<str> for Title {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Title {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Title {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Title {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
