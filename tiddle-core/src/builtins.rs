//! Built-in parsers, macros and shadow records

use crate::macros::{EchoMacro, TiddlerMacro, VersionMacro, ViewMacro};
use crate::parser::plain::PlainTextParser;
use crate::parser::wikitext::WikiTextParser;
use crate::parser::{PLAIN_TEXT_TYPE, WIKITEXT_TYPE};
use crate::store::WikiStore;
use std::sync::Arc;
use tiddle_types::Tiddler;

/// Register the built-in parsers and install the built-in macros
pub fn install(store: &WikiStore) {
    store.register_parser([WIKITEXT_TYPE, ".tid"], Arc::new(WikiTextParser));
    store.register_parser([PLAIN_TEXT_TYPE, ".txt"], Arc::new(PlainTextParser));

    store.install_macro(Arc::new(TiddlerMacro::new()));
    store.install_macro(Arc::new(ViewMacro::new()));
    store.install_macro(Arc::new(EchoMacro::new()));
    store.install_macro(Arc::new(VersionMacro::default()));
}

/// Records every notebook starts with; user records of the same title
/// override them
pub fn shadow_tiddlers() -> Vec<Tiddler> {
    vec![
        Tiddler::new("SiteTitle", "My Notebook"),
        Tiddler::new("SiteSubtitle", "a reusable non-linear personal notebook"),
        Tiddler::new("WindowTitle", "<<tiddler SiteTitle>> - <<tiddler SiteSubtitle>>"),
        Tiddler::new(
            "PageTemplate",
            "<<tiddler WindowTitle>>\n<<tiddler ClockTiddler>>\n<<tiddler DefaultTiddlers>>",
        ),
        Tiddler::new("DefaultTiddlers", "<<tiddler GettingStarted>>"),
        Tiddler::new(
            "GettingStarted",
            "Edit ''SiteTitle'' and ''SiteSubtitle'' to name this notebook.",
        ),
        Tiddler::new("VersionInfo", "tiddle <<version>>"),
    ]
}

/// A store holding [`shadow_tiddlers`], with the built-ins installed
pub fn shadow_store() -> Arc<WikiStore> {
    let shadows = Arc::new(WikiStore::new());
    install(&shadows);
    for tiddler in shadow_tiddlers() {
        shadows.add(tiddler);
    }
    shadows.clear_events();
    shadows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_registers_everything() {
        let store = WikiStore::new();
        install(&store);

        assert_eq!(store.macro_names(), vec!["echo", "tiddler", "version", "view"]);
    }

    #[test]
    fn test_shadow_store_is_quiet() {
        let shadows = shadow_store();
        assert!(!shadows.has_pending_changes());
        assert!(shadows.exists("PageTemplate"));
    }
}
