//! Error types for the store, the engine and configuration loading.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tiddle_types::Title;

/// Errors raised while expanding a macro
///
/// None of these abort a render pass: the engine turns each one into an
/// [`ErrorNode`](crate::tree::ErrorNode) at the point of use so the rest of the
/// tree still renders.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum RenderError {
    #[error("Unknown macro <<{name}>>")]
    UnknownMacro { name: String },

    #[error("Missing required parameter '{param}' for <<{macro_name}>>")]
    MissingParameter { macro_name: String, param: String },

    #[error("Unknown parameter '{param}' for <<{macro_name}>>")]
    UnknownParameter { macro_name: String, param: String },

    #[error("Unexpected positional parameter '{value}' for <<{macro_name}>>")]
    UnexpectedPositional { macro_name: String, value: String },

    #[error("Transclusion recursion: '{title}' is already being rendered")]
    TransclusionRecursion { title: Title },

    #[error("<<{macro_name}>> failed: {message}")]
    MacroFailed { macro_name: String, message: String },
}

impl RenderError {
    /// True for errors caused by the parameters written at the call site
    pub fn is_binding_error(&self) -> bool {
        matches!(
            self,
            RenderError::MissingParameter { .. }
                | RenderError::UnknownParameter { .. }
                | RenderError::UnexpectedPositional { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Adding this fallback store would create a resolution cycle")]
    FallbackCycle,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidField { field: String, message: String },
}
