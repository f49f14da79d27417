//! Macro execution engine
//!
//! [`RenderTree::render`] executes a root macro node. Executing a node binds
//! its parameters, evaluates its dependencies, runs the macro and numbers the
//! produced content; nested macros are executed by the macro itself through
//! [`ExecContext::execute_nodes`]. Failures, panics included, become error
//! nodes in place.

use crate::dependencies::{AncestorChain, Dependencies};
use crate::error::RenderError;
use crate::metrics::RenderMetrics;
use crate::refresh::{refresh_nodes, RefreshReport};
use crate::sink::OutputSink;
use crate::store::WikiStore;
use crate::tree::{self, MacroNode, Node, NodeIds};
use serde::{Serialize, Serializer};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tiddle_types::{ChangeMap, Title};

/// What a macro sees while it executes
///
/// The store is reached through the context, never through a global. The
/// ancestor chain and the record in scope are fixed per context; nested
/// expansions derive a new context instead of mutating this one.
#[derive(Debug, Clone)]
pub struct ExecContext<'a> {
    store: &'a WikiStore,
    ids: &'a NodeIds,
    metrics: &'a RenderMetrics,
    tiddler_title: Option<Title>,
    parents: AncestorChain,
}

impl<'a> ExecContext<'a> {
    pub fn new(store: &'a WikiStore, ids: &'a NodeIds, metrics: &'a RenderMetrics) -> Self {
        Self {
            store,
            ids,
            metrics,
            tiddler_title: None,
            parents: AncestorChain::new(),
        }
    }

    /// Same store and tree, different scope
    pub fn scoped(&self, parents: AncestorChain, tiddler_title: Option<Title>) -> ExecContext<'a> {
        ExecContext {
            store: self.store,
            ids: self.ids,
            metrics: self.metrics,
            tiddler_title,
            parents,
        }
    }

    pub fn store(&self) -> &'a WikiStore {
        self.store
    }

    /// Record whose fields are in scope
    pub fn tiddler_title(&self) -> Option<&Title> {
        self.tiddler_title.as_ref()
    }

    pub fn parents(&self) -> &AncestorChain {
        &self.parents
    }

    pub fn metrics(&self) -> &'a RenderMetrics {
        self.metrics
    }

    /// Number and execute freshly parsed nodes under a new scope
    pub fn execute_nodes(&self, nodes: &mut [Node], parents: AncestorChain, tiddler_title: Option<Title>) {
        let scope = self.scoped(parents, tiddler_title);
        scope.execute_in_scope(nodes);
    }

    fn execute_in_scope(&self, nodes: &mut [Node]) {
        for node in nodes {
            match node {
                Node::Element(element) => {
                    if !element.id.is_assigned() {
                        element.id = self.ids.next();
                    }
                    self.execute_in_scope(&mut element.children);
                }
                Node::Macro(mac) => execute_macro(mac, self),
                Node::Text { .. } | Node::Error(_) => {}
            }
        }
    }
}

/// Execute one macro node in `ctx`, replacing its content
pub(crate) fn execute_macro(node: &mut MacroNode, ctx: &ExecContext<'_>) {
    node.parents = ctx.parents.clone();
    node.tiddler_title = ctx.tiddler_title.clone();
    if !node.id.is_assigned() {
        node.id = ctx.ids.next();
    }
    ctx.metrics.record_execution();

    tracing::trace!(
        node = node.id.0,
        macro_name = %node.name,
        depth = ctx.parents.len(),
        "executing macro"
    );

    let (dependencies, content) = match run_macro(node, ctx) {
        Ok(done) => done,
        Err((dependencies, err)) => {
            if err.is_binding_error() {
                tracing::warn!(macro_name = %node.name, error = %err, "macro parameters did not bind");
            } else {
                tracing::debug!(macro_name = %node.name, error = %err, "macro produced an error node");
            }
            ctx.metrics.record_error();
            (dependencies, vec![Node::error(err)])
        }
    };

    node.dependencies = Some(dependencies);
    node.content = content;
}

type MacroOutcome = Result<(Dependencies, Vec<Node>), (Dependencies, RenderError)>;

fn run_macro(node: &MacroNode, ctx: &ExecContext<'_>) -> MacroOutcome {
    let Some(mac) = ctx.store.macro_named(&node.name) else {
        return Err((
            Dependencies::none(),
            RenderError::UnknownMacro {
                name: node.name.clone(),
            },
        ));
    };

    let spec = mac.params();
    let mut params = spec
        .bind(&node.name, &node.params)
        .map_err(|err| (Dependencies::none(), err))?;

    // A dependency-relevant value produced by a nested call is unknown until
    // it runs, and may differ on every run
    let dynamic = spec
        .params
        .iter()
        .any(|def| def.affects_dependencies() && params.is_call(&def.name));
    let mut dependencies = if dynamic {
        Dependencies::all()
    } else {
        mac.evaluate_dependencies(&params, ctx)
    };

    // Whatever a nested call read is read by this node too
    let mut nested_dependencies = Dependencies::none();
    params.resolve_calls(|call| {
        let mut nested = MacroNode::from(call.clone());
        execute_macro(&mut nested, ctx);
        if let Some(deps) = nested.dependencies.take() {
            nested_dependencies.merge(deps);
        }
        tree::render_text(&nested.content)
    });
    dependencies.merge(nested_dependencies);

    match catch_unwind(AssertUnwindSafe(|| mac.execute(&params, ctx))) {
        Ok(Ok(mut content)) => {
            ctx.ids.assign(&mut content);
            Ok((dependencies, content))
        }
        Ok(Err(err)) => Err((dependencies, err)),
        Err(payload) => Err((
            dependencies,
            RenderError::MacroFailed {
                macro_name: node.name.clone(),
                message: panic_message(payload.as_ref()),
            },
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "macro panicked".to_string()
    }
}

/// A live render tree rooted at one macro invocation
#[derive(Debug)]
pub struct RenderTree {
    store: Arc<WikiStore>,
    root: Node,
    ids: NodeIds,
    metrics: RenderMetrics,
}

impl RenderTree {
    /// Execute `root` with an empty ancestor chain and no record in scope
    pub fn render(store: Arc<WikiStore>, mut root: MacroNode) -> Self {
        let ids = NodeIds::new();
        let metrics = RenderMetrics::new();
        {
            let ctx = ExecContext::new(&store, &ids, &metrics);
            execute_macro(&mut root, &ctx);
        }
        tracing::debug!(
            macro_name = %root.name,
            executions = metrics.snapshot().executions,
            "render tree built"
        );

        Self {
            store,
            root: Node::Macro(root),
            ids,
            metrics,
        }
    }

    pub fn store(&self) -> &Arc<WikiStore> {
        &self.store
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// The root as a one-node slice, for the free functions in [`tree`]
    pub fn nodes(&self) -> &[Node] {
        std::slice::from_ref(&self.root)
    }

    pub fn render_text(&self) -> String {
        tree::render_text(self.nodes())
    }

    pub fn errors(&self) -> Vec<&RenderError> {
        tree::errors(self.nodes())
    }

    pub fn metrics(&self) -> &RenderMetrics {
        &self.metrics
    }

    pub fn mount(&self, sink: &mut dyn OutputSink) {
        sink.mount(None, &self.root);
    }

    /// Bring the tree up to date with one change batch
    ///
    /// Only macro nodes whose dependencies intersect `changes` re-execute; an
    /// empty batch does nothing and never touches the sink.
    pub fn refresh(&mut self, changes: &ChangeMap, sink: &mut dyn OutputSink) -> RefreshReport {
        let mut report = RefreshReport::default();
        if changes.is_empty() {
            return report;
        }

        let ctx = ExecContext::new(&self.store, &self.ids, &self.metrics);
        refresh_nodes(std::slice::from_mut(&mut self.root), changes, &ctx, sink, &mut report);

        tracing::debug!(
            changes = changes.len(),
            reexecuted = report.reexecuted,
            forwarded = report.forwarded,
            "render tree refreshed"
        );
        report
    }

    pub fn unmount(&self, sink: &mut dyn OutputSink) {
        sink.unmount(&self.root);
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.root)
    }
}

impl Serialize for RenderTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::tree::{MacroCall, Param};
    use tiddle_types::Tiddler;

    fn store() -> Arc<WikiStore> {
        let store = Arc::new(WikiStore::new());
        builtins::install(&store);
        store
    }

    fn root(tree: &RenderTree) -> &MacroNode {
        tree.root().as_macro().unwrap()
    }

    #[test]
    fn test_root_has_empty_chain() {
        let store = store();
        store.add(Tiddler::new("A", "text"));

        let tree = store.render_tiddler("A");
        assert!(root(&tree).parents.is_empty());
        assert_eq!(root(&tree).dependencies, Some(Dependencies::title("A")));
        assert_eq!(tree.render_text(), "text");
    }

    #[test]
    fn test_unknown_macro_is_error_node() {
        let store = store();
        let tree = store.render_macro("nope", vec![]);

        assert_eq!(
            tree.errors(),
            vec![&RenderError::UnknownMacro {
                name: "nope".to_string()
            }]
        );
        assert_eq!(root(&tree).dependencies, Some(Dependencies::none()));
        assert_eq!(tree.metrics().snapshot().errors, 1);
    }

    #[test]
    fn test_missing_parameter_is_error_node() {
        let store = store();
        let tree = store.render_macro("view", vec![]);

        assert!(matches!(
            tree.errors().as_slice(),
            [RenderError::MissingParameter { param, .. }] if param == "field"
        ));
    }

    #[test]
    fn test_nested_call_value() {
        let store = store();
        let call = MacroCall::new("echo", vec![Param::positional("nested")]);
        let tree = store.render_macro("echo", vec![Param::call(None, call)]);

        assert_eq!(tree.render_text(), "nested");
        assert_eq!(tree.metrics().snapshot().executions, 2);
    }

    #[test]
    fn test_call_in_reference_param_depends_on_all() {
        let store = store();
        store.add(Tiddler::new("Target", "hi"));
        let call = MacroCall::new("echo", vec![Param::positional("Target")]);
        let tree = store.render_macro("tiddler", vec![Param::call(None, call)]);

        assert_eq!(tree.render_text(), "hi");
        assert_eq!(root(&tree).dependencies, Some(Dependencies::All));
    }

    #[test]
    fn test_panicking_macro_becomes_error_node() {
        use crate::macros::{BoundParams, Macro, ParamSpec};

        #[derive(Debug, Default)]
        struct Exploding {
            spec: ParamSpec,
        }

        impl Macro for Exploding {
            fn name(&self) -> &str {
                "explode"
            }

            fn params(&self) -> &ParamSpec {
                &self.spec
            }

            fn evaluate_dependencies(&self, _params: &BoundParams, _ctx: &ExecContext<'_>) -> Dependencies {
                Dependencies::title("Fuse")
            }

            fn execute(&self, _params: &BoundParams, _ctx: &ExecContext<'_>) -> Result<Vec<Node>, RenderError> {
                panic!("boom")
            }
        }

        let store = store();
        store.install_macro(Arc::new(Exploding::default()));
        store.add(Tiddler::new("Page", "a <<explode>> b"));
        let tree = store.render_tiddler("Page");

        assert_eq!(
            tree.errors(),
            vec![&RenderError::MacroFailed {
                macro_name: "explode".to_string(),
                message: "boom".to_string()
            }]
        );
        assert!(tree.render_text().ends_with(" b"));
    }

    #[test]
    fn test_nested_call_dependencies_are_merged() {
        let store = store();
        store.add(Tiddler::new("Foo", "foo"));
        let call = MacroCall::new("tiddler", vec![Param::positional("Foo")]);
        let tree = store.render_macro("echo", vec![Param::call(None, call)]);

        assert_eq!(tree.render_text(), "foo");
        assert_eq!(root(&tree).dependencies, Some(Dependencies::title("Foo")));
    }

    #[test]
    fn test_ids_are_unique() {
        let store = store();
        store.add(Tiddler::new("A", "x <<echo a>> <<echo b>> ''y''"));
        let tree = store.render_tiddler("A");

        let mut ids = Vec::new();
        tree::walk(tree.nodes(), &mut |node| ids.extend(node.id()));
        let count = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), count);
        assert!(ids.iter().all(|id| id.is_assigned()));
    }

    #[test]
    fn test_json_output() {
        let store = store();
        let tree = store.render_macro("echo", vec![Param::positional("hi")]);
        let json: serde_json::Value = serde_json::from_str(&tree.to_json().unwrap()).unwrap();

        assert_eq!(json["kind"], "macro");
        assert_eq!(json["name"], "echo");
        assert_eq!(json["content"][0]["text"], "hi");
    }
}
