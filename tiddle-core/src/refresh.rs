//! Refresh scheduler
//!
//! Walks a live render tree with one change batch. A macro node whose
//! dependencies intersect the batch re-executes with the parameters, ancestor
//! chain and record scope it was first executed with, and only its own
//! children are replaced. Every other node forwards the batch downwards.

use crate::engine::{execute_macro, ExecContext};
use crate::sink::OutputSink;
use crate::tree::{MacroNode, Node};
use serde::Serialize;
use tiddle_types::ChangeMap;

/// What one refresh pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Macro nodes re-executed
    pub reexecuted: usize,
    /// Macro nodes that passed the batch on to their children
    pub forwarded: usize,
}

impl RefreshReport {
    pub fn is_noop(&self) -> bool {
        self.reexecuted == 0
    }
}

pub(crate) fn refresh_nodes(
    nodes: &mut [Node],
    changes: &ChangeMap,
    ctx: &ExecContext<'_>,
    sink: &mut dyn OutputSink,
    report: &mut RefreshReport,
) {
    for node in nodes {
        match node {
            Node::Macro(mac) => refresh_macro(mac, changes, ctx, sink, report),
            Node::Element(element) => refresh_nodes(&mut element.children, changes, ctx, sink, report),
            Node::Text { .. } | Node::Error(_) => {}
        }
    }
}

fn refresh_macro(
    node: &mut MacroNode,
    changes: &ChangeMap,
    ctx: &ExecContext<'_>,
    sink: &mut dyn OutputSink,
    report: &mut RefreshReport,
) {
    let scope = ctx.scoped(node.parents.clone(), node.tiddler_title.clone());
    let stale = node
        .dependencies
        .as_ref()
        .map_or(true, |deps| deps.has_changed(changes));

    if stale {
        tracing::trace!(node = node.id.0, macro_name = %node.name, "re-executing macro");
        for child in &node.content {
            sink.unmount(child);
        }
        execute_macro(node, &scope);
        for child in &node.content {
            sink.mount(Some(node.id), child);
        }
        ctx.metrics().record_reexecution();
        report.reexecuted += 1;
        return;
    }

    if let Some(mac) = ctx.store().macro_named(&node.name) {
        mac.refresh(node, changes, &scope, sink);
    }
    ctx.metrics().record_forward();
    report.forwarded += 1;
    refresh_nodes(&mut node.content, changes, ctx, sink, report);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::sink::{RecordingSink, SinkEvent};
    use crate::store::WikiStore;
    use std::sync::Arc;
    use tiddle_types::{ChangeKind, Tiddler, Title};

    fn changes(titles: &[&str]) -> ChangeMap {
        titles
            .iter()
            .map(|t| (Title::new(*t), ChangeKind::Modified))
            .collect()
    }

    #[test]
    fn test_unrelated_change_forwards_only() {
        let store = Arc::new(WikiStore::new());
        builtins::install(&store);
        store.add(Tiddler::new("Y", "why"));

        let mut tree = store.render_tiddler("Y");
        let mut sink = RecordingSink::new();
        let report = tree.refresh(&changes(&["X"]), &mut sink);

        assert_eq!(report.reexecuted, 0);
        assert_eq!(report.forwarded, 1);
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_reexecution_replaces_children_only() {
        let store = Arc::new(WikiStore::new());
        builtins::install(&store);
        store.add(Tiddler::new("Y", "before"));

        let mut tree = store.render_tiddler("Y");
        let root_id = tree.root().id();
        store.add(Tiddler::new("Y", "after"));

        let mut sink = RecordingSink::new();
        let report = tree.refresh(&changes(&["Y"]), &mut sink);

        assert_eq!(report.reexecuted, 1);
        assert_eq!(tree.root().id(), root_id);
        assert_eq!(tree.render_text(), "after");
        assert!(matches!(sink.events.as_slice(), [SinkEvent::Unmount { .. }, SinkEvent::Mount { parent, .. }] if *parent == root_id));
    }
}
