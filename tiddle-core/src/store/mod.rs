//! Overlay record store
//!
//! A [`WikiStore`] owns a primary map of records and an ordered list of
//! fallback stores consulted on a miss. The CLI uses a single fallback to
//! hold built-in "shadow" records that user records can override without
//! touching them.

mod events;

pub use events::{EventFilter, ListenerCallback, ListenerId};

use crate::config::EngineConfig;
use crate::engine::RenderTree;
use crate::error::StoreError;
use crate::macros::{Macro, MacroRegistry};
use crate::parser::{Parser, ParserRegistry};
use crate::tree::{MacroNode, Param, ParseTree};
use events::EventBus;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};
use tiddle_types::{ChangeKind, ChangeMap, Tiddler, Title};

/// Which level of the overlay a title resolves from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "origin", rename_all = "lowercase")]
pub enum Origin {
    Primary,
    /// `depth` 1 is a direct fallback of the queried store
    Fallback { depth: usize },
}

impl Origin {
    pub fn is_primary(&self) -> bool {
        matches!(self, Origin::Primary)
    }

    fn deeper(self) -> Origin {
        match self {
            Origin::Primary => Origin::Fallback { depth: 1 },
            Origin::Fallback { depth } => Origin::Fallback { depth: depth + 1 },
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Primary => write!(f, "primary"),
            Origin::Fallback { depth } => write!(f, "fallback:{}", depth),
        }
    }
}

type CachedParse = (Arc<Tiddler>, Arc<ParseTree>);

pub struct WikiStore {
    tiddlers: RwLock<BTreeMap<Title, Arc<Tiddler>>>,
    fallbacks: RwLock<Vec<Arc<WikiStore>>>,
    /// Stores that use this one as a fallback
    overlays: RwLock<Vec<Weak<WikiStore>>>,
    parsers: RwLock<ParserRegistry>,
    macros: RwLock<MacroRegistry>,
    /// Parse trees keyed by title, valid while the cached record is the one
    /// that currently resolves
    parse_cache: Mutex<HashMap<Title, CachedParse>>,
    events: EventBus,
    config: EngineConfig,
}

impl WikiStore {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            tiddlers: RwLock::new(BTreeMap::new()),
            fallbacks: RwLock::new(Vec::new()),
            overlays: RwLock::new(Vec::new()),
            parsers: RwLock::new(ParserRegistry::new()),
            macros: RwLock::new(MacroRegistry::new()),
            parse_cache: Mutex::new(HashMap::new()),
            events: EventBus::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Overlay
    // ========================================================================

    /// Append a fallback store, consulted after the primary map and after
    /// every previously added fallback
    ///
    /// Later edits to the fallback are also enqueued here, unless this store's
    /// primary map overrides the edited title.
    pub fn add_fallback(self: &Arc<Self>, fallback: Arc<WikiStore>) -> Result<(), StoreError> {
        if fallback.reaches(self) {
            return Err(StoreError::FallbackCycle);
        }
        {
            let mut overlays = fallback.overlays.write();
            overlays.retain(|overlay| overlay.strong_count() > 0);
            overlays.push(Arc::downgrade(self));
        }
        self.fallbacks.write().push(fallback);
        Ok(())
    }

    fn reaches(&self, target: &WikiStore) -> bool {
        std::ptr::eq(self, target) || self.fallbacks.read().iter().any(|fb| fb.reaches(target))
    }

    /// Resolve a title: primary first, then each fallback in order
    pub fn get(&self, title: &str) -> Option<Arc<Tiddler>> {
        if let Some(tiddler) = self.tiddlers.read().get(title) {
            return Some(tiddler.clone());
        }
        self.fallbacks.read().iter().find_map(|fb| fb.get(title))
    }

    pub fn exists(&self, title: &str) -> bool {
        self.origin(title).is_some()
    }

    /// The level `title` resolves from, if any
    pub fn origin(&self, title: &str) -> Option<Origin> {
        if self.tiddlers.read().contains_key(title) {
            return Some(Origin::Primary);
        }
        self.fallbacks
            .read()
            .iter()
            .find_map(|fb| fb.origin(title).map(Origin::deeper))
    }

    /// True if `title` resolves from the primary map while a fallback also
    /// holds a record under the same title
    pub fn is_shadowed(&self, title: &str) -> bool {
        self.tiddlers.read().contains_key(title) && self.fallbacks.read().iter().any(|fb| fb.exists(title))
    }

    /// Every resolvable title, once, attributed to the level that wins
    pub fn titles(&self) -> BTreeMap<Title, Origin> {
        let mut titles: BTreeMap<Title, Origin> = self
            .tiddlers
            .read()
            .keys()
            .map(|t| (t.clone(), Origin::Primary))
            .collect();
        for fallback in self.fallbacks.read().iter() {
            for (title, origin) in fallback.titles() {
                titles.entry(title).or_insert(origin.deeper());
            }
        }
        titles
    }

    /// Resolvable records carrying `tag`
    pub fn tagged(&self, tag: &str) -> Vec<Arc<Tiddler>> {
        self.titles()
            .keys()
            .filter_map(|t| self.get(t.as_str()))
            .filter(|t| t.has_tag(tag))
            .collect()
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Insert or replace a primary record
    pub fn add(&self, tiddler: Tiddler) {
        let title = tiddler.title().clone();
        let previous = self.tiddlers.write().insert(title.clone(), Arc::new(tiddler));
        let kind = if previous.is_some() {
            ChangeKind::Modified
        } else {
            ChangeKind::Added
        };
        self.parse_cache.lock().remove(&title);
        tracing::debug!(title = %title, kind = kind.as_str(), "store record written");
        self.events.enqueue(&title, kind);
        self.forward_to_overlays(&title, kind);
    }

    /// Remove a primary record
    ///
    /// Always enqueues Deleted, even if the primary map had no such record or
    /// a fallback still resolves it.
    pub fn delete(&self, title: &str) {
        let title = Title::new(title);
        let removed = self.tiddlers.write().remove(&title);
        self.parse_cache.lock().remove(&title);
        tracing::debug!(title = %title, existed = removed.is_some(), "store record deleted");
        self.events.enqueue(&title, ChangeKind::Deleted);
        self.forward_to_overlays(&title, ChangeKind::Deleted);
    }

    fn forward_to_overlays(&self, title: &Title, kind: ChangeKind) {
        let overlays: Vec<Arc<WikiStore>> = self.overlays.read().iter().filter_map(Weak::upgrade).collect();
        for overlay in overlays {
            if overlay.tiddlers.read().contains_key(title) {
                continue;
            }
            tracing::trace!(title = %title, kind = kind.as_str(), "fallback change forwarded");
            overlay.events.enqueue(title, kind);
            overlay.forward_to_overlays(title, kind);
        }
    }

    // ========================================================================
    // Parsers and macros
    // ========================================================================

    pub fn register_parser<I, S>(&self, keys: I, parser: Arc<dyn Parser>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parsers.write().register(keys, parser);
        // Cached trees may have come from the parser just replaced
        self.parse_cache.lock().clear();
    }

    pub fn install_macro(&self, mac: Arc<dyn Macro>) {
        self.macros.write().install(mac);
    }

    pub fn macro_named(&self, name: &str) -> Option<Arc<dyn Macro>> {
        self.macros.read().get(name)
    }

    pub fn macro_names(&self) -> Vec<String> {
        self.macros.read().names().into_iter().map(str::to_string).collect()
    }

    /// Parse `text` with the parser registered for `content_type`
    ///
    /// A missing or empty type means the configured default type. Never fails:
    /// unknown types parse as plain text.
    pub fn parse_text(&self, content_type: Option<&str>, text: &str) -> ParseTree {
        let content_type = match content_type {
            Some(ty) if !ty.is_empty() => ty,
            _ => self.config.default_type.as_str(),
        };
        let parser = self.parsers.read().resolve(content_type);
        parser.parse(text)
    }

    /// Parse tree of the record `title` resolves to, cached until that
    /// record is superseded
    pub fn parse_tiddler(&self, title: &str) -> Option<Arc<ParseTree>> {
        let tiddler = self.get(title)?;

        if let Some((cached, tree)) = self.parse_cache.lock().get(title) {
            if Arc::ptr_eq(cached, &tiddler) {
                return Some(tree.clone());
            }
        }

        let tree = Arc::new(self.parse_text(tiddler.content_type(), tiddler.text()));
        self.parse_cache
            .lock()
            .insert(Title::new(title), (tiddler, tree.clone()));
        Some(tree)
    }

    // ========================================================================
    // Change events
    // ========================================================================

    pub fn clear_events(&self) {
        self.events.clear();
    }

    /// Changes enqueued since the last flush, without dispatching them
    pub fn pending_changes(&self) -> ChangeMap {
        self.events.pending()
    }

    pub fn has_pending_changes(&self) -> bool {
        self.events.has_pending()
    }

    /// Register a callback for flushed change batches
    ///
    /// An error or panic from the callback is logged and does not stop other
    /// listeners from receiving the same batch.
    pub fn add_event_listener<F>(&self, filter: impl Into<EventFilter>, callback: F) -> ListenerId
    where
        F: FnMut(&ChangeMap) -> anyhow::Result<()> + Send + 'static,
    {
        self.events.subscribe(filter.into(), Box::new(callback))
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Deliver every pending change to the listeners as one map
    pub fn flush_events(&self) -> ChangeMap {
        self.events.flush()
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Execute a root macro invocation with an empty ancestor chain
    pub fn render_macro(self: &Arc<Self>, name: &str, params: Vec<Param>) -> RenderTree {
        RenderTree::render(self.clone(), MacroNode::new(name, params))
    }

    /// Render a record through the `tiddler` macro
    pub fn render_tiddler(self: &Arc<Self>, title: &str) -> RenderTree {
        self.render_macro("tiddler", vec![Param::positional(title)])
    }
}

impl Default for WikiStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WikiStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WikiStore")
            .field("tiddlers", &self.tiddlers.read().len())
            .field("fallbacks", &self.fallbacks.read().len())
            .field("parsers", &*self.parsers.read())
            .field("macros", &*self.macros.read())
            .field("events", &self.events)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shadowed() -> (Arc<WikiStore>, Arc<WikiStore>) {
        let shadows = Arc::new(WikiStore::new());
        shadows.add(Tiddler::new("SiteTitle", "My Wiki"));
        shadows.add(Tiddler::new("SiteSubtitle", "a notebook"));

        let store = Arc::new(WikiStore::new());
        store.add_fallback(shadows.clone()).unwrap();
        (store, shadows)
    }

    #[test]
    fn test_add_get_delete() {
        let store = WikiStore::new();
        store.add(Tiddler::new("A", "one"));

        assert_eq!(store.get("A").map(|t| t.text().to_string()), Some("one".to_string()));
        assert!(store.exists("A"));

        store.delete("A");
        assert!(store.get("A").is_none());
        assert!(!store.exists("A"));
    }

    #[test]
    fn test_overlay_precedence() {
        let (store, shadows) = shadowed();
        store.add(Tiddler::new("SiteTitle", "Override"));

        assert_eq!(store.get("SiteTitle").unwrap().text(), "Override");
        assert_eq!(shadows.get("SiteTitle").unwrap().text(), "My Wiki");
        assert!(store.is_shadowed("SiteTitle"));
        assert!(!store.is_shadowed("SiteSubtitle"));

        store.delete("SiteTitle");
        assert_eq!(store.get("SiteTitle").unwrap().text(), "My Wiki");
    }

    #[test]
    fn test_titles_report_winning_level() {
        let (store, _shadows) = shadowed();
        store.add(Tiddler::new("SiteTitle", "Override"));
        store.add(Tiddler::new("Journal", ""));

        let titles = store.titles();
        assert_eq!(titles.len(), 3);
        assert_eq!(titles.get("SiteTitle"), Some(&Origin::Primary));
        assert_eq!(titles.get("SiteSubtitle"), Some(&Origin::Fallback { depth: 1 }));
        assert_eq!(store.origin("Journal"), Some(Origin::Primary));
        assert_eq!(store.origin("Nope"), None);
    }

    #[test]
    fn test_nested_fallback_depth() {
        let base = Arc::new(WikiStore::new());
        base.add(Tiddler::new("Deep", ""));
        let middle = Arc::new(WikiStore::new());
        middle.add_fallback(base).unwrap();
        let store = Arc::new(WikiStore::new());
        store.add_fallback(middle).unwrap();

        assert_eq!(store.origin("Deep"), Some(Origin::Fallback { depth: 2 }));
    }

    #[test]
    fn test_fallback_cycle_rejected() {
        let a = Arc::new(WikiStore::new());
        let b = Arc::new(WikiStore::new());
        a.add_fallback(b.clone()).unwrap();

        assert!(matches!(b.add_fallback(a.clone()), Err(StoreError::FallbackCycle)));
        assert!(matches!(a.add_fallback(a.clone()), Err(StoreError::FallbackCycle)));
    }

    #[test]
    fn test_fallback_edits_are_forwarded_unless_overridden() {
        let (store, shadows) = shadowed();
        store.add(Tiddler::new("SiteTitle", "Override"));
        store.clear_events();

        shadows.add(Tiddler::new("SiteTitle", "New shadow"));
        shadows.delete("SiteSubtitle");

        let pending = store.pending_changes();
        assert_eq!(pending.get("SiteSubtitle"), Some(ChangeKind::Deleted));
        assert!(!pending.contains("SiteTitle"));
        assert_eq!(shadows.pending_changes().len(), 2);
    }

    #[test]
    fn test_dropped_overlay_is_forgotten() {
        let shadows = Arc::new(WikiStore::new());
        {
            let store = Arc::new(WikiStore::new());
            store.add_fallback(shadows.clone()).unwrap();
        }
        shadows.add(Tiddler::new("A", ""));

        let other = Arc::new(WikiStore::new());
        other.add_fallback(shadows.clone()).unwrap();
        assert_eq!(shadows.overlays.read().len(), 1);
    }

    #[test]
    fn test_change_kinds_coalesce() {
        let store = WikiStore::new();
        store.add(Tiddler::new("A", "1"));
        store.add(Tiddler::new("A", "2"));
        store.add(Tiddler::new("B", ""));
        store.delete("B");

        let pending = store.pending_changes();
        assert_eq!(pending.get("A"), Some(ChangeKind::Modified));
        assert_eq!(pending.get("B"), Some(ChangeKind::Deleted));
    }

    #[test]
    fn test_add_then_modify_in_one_flush() {
        let store = WikiStore::new();
        store.add(Tiddler::new("A", "1"));
        store.flush_events();
        store.add(Tiddler::new("A", "2"));
        store.add(Tiddler::new("A", "3"));

        let flushed = store.flush_events();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed.get("A"), Some(ChangeKind::Modified));
        assert!(!store.has_pending_changes());
    }

    #[test]
    fn test_delete_of_unknown_title_still_enqueues() {
        let store = WikiStore::new();
        store.delete("Ghost");
        assert_eq!(store.pending_changes().get("Ghost"), Some(ChangeKind::Deleted));
    }

    #[test]
    fn test_parse_cache_follows_resolution() {
        let (store, _shadows) = shadowed();
        let first = store.parse_tiddler("SiteTitle").unwrap();
        let again = store.parse_tiddler("SiteTitle").unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        store.add(Tiddler::new("SiteTitle", "Override").with_type("text/plain"));
        let replaced = store.parse_tiddler("SiteTitle").unwrap();
        assert!(!Arc::ptr_eq(&first, &replaced));
        assert!(store.parse_tiddler("Missing").is_none());
    }

    #[test]
    fn test_tagged() {
        let store = WikiStore::new();
        store.add(Tiddler::new("A", "").with_tags(["journal"]));
        store.add(Tiddler::new("B", "").with_tags(["other", "journal"]));
        store.add(Tiddler::new("C", ""));

        let titles: Vec<String> = store
            .tagged("journal")
            .iter()
            .map(|t| t.title().to_string())
            .collect();
        assert_eq!(titles, vec!["A", "B"]);
    }
}
