//! Configuration parsing and management.

use crate::error::ConfigError;
use crate::parser::WIKITEXT_TYPE;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration struct matching the tiddle.yml schema
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

/// Settings consumed by the store and the render engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Content type assumed for records that carry no `type`
    #[serde(default = "default_content_type")]
    pub default_type: String,

    /// Class set on every transclusion wrapper
    #[serde(default = "default_frame_class")]
    pub frame_class: String,

    /// Class added to a transclusion wrapper whose target does not resolve
    #[serde(default = "default_missing_class")]
    pub missing_class: String,
}

fn default_content_type() -> String {
    WIKITEXT_TYPE.to_string()
}

fn default_frame_class() -> String {
    String::from("tw-tiddler-frame")
}

fn default_missing_class() -> String {
    String::from("tw-tiddler-missing")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_type: default_content_type(),
            frame_class: default_frame_class(),
            missing_class: default_missing_class(),
        }
    }
}

/// Settings for the CLI's live re-render loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Record rendered when no title is given on the command line
    #[serde(default = "default_root_title")]
    pub root_title: String,

    /// Record rewritten on every tick
    #[serde(default = "default_clock_title")]
    pub clock_title: String,

    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_root_title() -> String {
    String::from("PageTemplate")
}

fn default_clock_title() -> String {
    String::from("ClockTiddler")
}

fn default_interval_ms() -> u64 {
    3000
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root_title: default_root_title(),
            clock_title: default_clock_title(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    /// Load from a file if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.default_type.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "engine.default_type".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.watch.interval_ms == 0 {
            return Err(ConfigError::InvalidField {
                field: "watch.interval_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.engine.default_type, "text/x-tiddlywiki");
        assert_eq!(config.engine.missing_class, "tw-tiddler-missing");
        assert_eq!(config.watch.interval_ms, 3000);
    }

    #[test]
    fn test_partial_yaml() {
        let config = Config::from_yaml(
            r#"
engine:
  default_type: text/plain
watch:
  root_title: WindowTitle
"#,
        )
        .unwrap();

        assert_eq!(config.engine.default_type, "text/plain");
        assert_eq!(config.engine.frame_class, "tw-tiddler-frame");
        assert_eq!(config.watch.root_title, "WindowTitle");
        assert_eq!(config.watch.clock_title, "ClockTiddler");
    }

    #[test]
    fn test_rejects_zero_interval() {
        let err = Config::from_yaml("watch:\n  interval_ms: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { .. }));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "engine:\n  missing_class: missing").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.engine.missing_class, "missing");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("tiddle.yml")).unwrap();
        assert_eq!(config.watch.root_title, "PageTemplate");
    }
}
