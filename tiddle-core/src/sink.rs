//! Output sinks
//!
//! The engine never touches a concrete output. A mounted render tree reports
//! every structural change to an [`OutputSink`], which keeps whatever handles
//! it needs keyed by [`NodeId`].

use crate::tree::{self, Node, NodeId};
use serde::Serialize;
use tiddle_types::{ChangeMap, Title};

/// Receiver of render tree changes
///
/// `mount` and `unmount` cover the node's whole subtree.
pub trait OutputSink {
    /// `node` was created under `parent`; `None` for a tree root
    fn mount(&mut self, parent: Option<NodeId>, node: &Node);

    /// `node` kept its identity but its presentation may have changed
    fn refresh(&mut self, node: &Node, changes: &ChangeMap);

    fn unmount(&mut self, node: &Node);
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn mount(&mut self, _parent: Option<NodeId>, _node: &Node) {}

    fn refresh(&mut self, _node: &Node, _changes: &ChangeMap) {}

    fn unmount(&mut self, _node: &Node) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum SinkEvent {
    Mount {
        parent: Option<NodeId>,
        node: Option<NodeId>,
        text: String,
    },
    Refresh {
        node: Option<NodeId>,
        changes: Vec<Title>,
    },
    Unmount {
        node: Option<NodeId>,
    },
}

/// Keeps a log of every call
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub events: Vec<SinkEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&mut self) -> Vec<SinkEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn mounts(&self) -> usize {
        self.count(|e| matches!(e, SinkEvent::Mount { .. }))
    }

    pub fn refreshes(&self) -> usize {
        self.count(|e| matches!(e, SinkEvent::Refresh { .. }))
    }

    pub fn unmounts(&self) -> usize {
        self.count(|e| matches!(e, SinkEvent::Unmount { .. }))
    }

    fn count(&self, pred: impl Fn(&SinkEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl OutputSink for RecordingSink {
    fn mount(&mut self, parent: Option<NodeId>, node: &Node) {
        self.events.push(SinkEvent::Mount {
            parent,
            node: node.id(),
            text: tree::render_text(std::slice::from_ref(node)),
        });
    }

    fn refresh(&mut self, node: &Node, changes: &ChangeMap) {
        self.events.push(SinkEvent::Refresh {
            node: node.id(),
            changes: changes.titles().cloned().collect(),
        });
    }

    fn unmount(&mut self, node: &Node) {
        self.events.push(SinkEvent::Unmount { node: node.id() });
    }
}
