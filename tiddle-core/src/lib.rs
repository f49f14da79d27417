//! Tiddle core: overlay store and incremental render engine
//!
//! This crate holds a notebook of small, uniquely titled records
//! ("tiddlers") and renders them through pluggable parsers and macros,
//! re-rendering only what a batch of record changes actually affects.
//!
//! # Architecture
//!
//! ```text
//! add/delete ──► WikiStore ──flush──► listeners ──► RenderTree::refresh ──► OutputSink
//!                   │                                     ▲
//!                   └── parse_text / macros ──► engine ───┘
//! ```
//!
//! - **Store**: a primary record map chained to fallback ("shadow") stores,
//!   with a pending change queue that is delivered as one batch per flush.
//! - **Engine**: expands a root macro invocation into a render tree. Every
//!   macro node records its dependencies and the transclusion path that led
//!   to it, which is how recursive transclusion is cut off.
//! - **Refresh**: walks a live render tree with a change map, re-executing
//!   only the macro nodes whose dependencies intersect the changes.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tiddle_core::{builtins, NullSink, Tiddler, WikiStore};
//!
//! let store = Arc::new(WikiStore::new());
//! builtins::install(&store);
//! store.add(Tiddler::new("Greeting", "Hello ''world''"));
//! store.clear_events();
//!
//! let mut tree = store.render_tiddler("Greeting");
//! tree.mount(&mut NullSink);
//! assert_eq!(tree.render_text(), "Hello world");
//!
//! store.add(Tiddler::new("Greeting", "Goodbye"));
//! let changes = store.flush_events();
//! let report = tree.refresh(&changes, &mut NullSink);
//! assert_eq!(report.reexecuted, 1);
//! assert_eq!(tree.render_text(), "Goodbye");
//! ```

#![warn(missing_debug_implementations)]

pub mod builtins;
pub mod config;
pub mod dependencies;
pub mod engine;
pub mod error;
pub mod macros;
pub mod metrics;
pub mod parser;
pub mod refresh;
pub mod sink;
pub mod store;
pub mod tree;

pub use config::{Config, EngineConfig, WatchConfig};
pub use dependencies::{AncestorChain, Dependencies};
pub use engine::{ExecContext, RenderTree};
pub use error::{ConfigError, RenderError, StoreError};
pub use macros::{BoundParams, Macro, MacroRegistry, ParamDef, ParamKind, ParamSpec};
pub use metrics::{MetricsSnapshot, RenderMetrics};
pub use parser::{Parser, ParserRegistry};
pub use refresh::RefreshReport;
pub use sink::{NullSink, OutputSink, RecordingSink, SinkEvent};
pub use store::{EventFilter, ListenerId, Origin, WikiStore};
pub use tiddle_types::{ChangeKind, ChangeMap, Tiddler, Title};
pub use tree::{Attributes, ElementNode, ErrorNode, MacroCall, MacroNode, Node, NodeId, Param, ParamValue, ParseTree};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::builtins;
    pub use crate::sink::{NullSink, OutputSink, RecordingSink};
    pub use crate::store::{EventFilter, WikiStore};
    pub use crate::tree::{Node, Param};
    pub use tiddle_types::{ChangeKind, ChangeMap, Tiddler, Title};
}
