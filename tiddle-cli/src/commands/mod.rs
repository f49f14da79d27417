//! CLI command implementations.

pub mod list;
pub mod render;
pub mod watch;

pub use list::list_titles;
pub use render::render_record;
pub use watch::{watch_record, WatchOptions};

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tiddle_core::{builtins, Config, WikiStore};
use tiddle_types::Tiddler;

/// A configured store with the shadow records and any loaded records
pub struct Session {
    pub config: Config,
    pub store: Arc<WikiStore>,
}

impl Session {
    pub fn open(config_path: &Path, load: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path).context("Failed to load configuration")?;

        let store = Arc::new(WikiStore::with_config(config.engine.clone()));
        builtins::install(&store);
        store
            .add_fallback(builtins::shadow_store())
            .context("Failed to attach shadow records")?;

        if let Some(path) = load {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read records from {:?}", path))?;
            let tiddlers: Vec<Tiddler> = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse records in {:?}", path))?;
            tracing::debug!(count = tiddlers.len(), path = ?path, "loading records");
            for tiddler in tiddlers {
                store.add(tiddler);
            }
        }

        // The initial load is not a change anyone needs to hear about
        store.clear_events();

        Ok(Self { config, store })
    }

    /// `title`, or the configured root title
    pub fn title_or_root<'a>(&'a self, title: Option<&'a str>) -> &'a str {
        title.unwrap_or(self.config.watch.root_title.as_str())
    }
}
