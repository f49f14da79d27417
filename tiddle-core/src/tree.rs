//! Parse and render trees
//!
//! Parsers produce a [`ParseTree`] of [`Node`]s in which macro calls are still
//! unexpanded. The engine deep-copies those nodes into a render tree and fills
//! each [`MacroNode`] with its bound dependencies, ancestor chain and produced
//! content.

use crate::dependencies::{AncestorChain, Dependencies};
use crate::error::RenderError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tiddle_types::Title;

/// Identity of an element or macro node within one render tree
///
/// Nodes fresh out of a parser are unassigned; the engine numbers them as it
/// splices them into a render tree, and output sinks key their handles on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    pub const UNASSIGNED: NodeId = NodeId(0);

    pub fn is_assigned(&self) -> bool {
        *self != Self::UNASSIGNED
    }
}

/// Allocates node ids for one render tree
#[derive(Debug)]
pub struct NodeIds(AtomicU64);

impl NodeIds {
    pub fn new() -> Self {
        NodeIds(AtomicU64::new(1))
    }

    pub fn next(&self) -> NodeId {
        NodeId(self.0.fetch_add(1, Ordering::Relaxed))
    }

    /// Number every unassigned element and macro node in `nodes`
    pub fn assign(&self, nodes: &mut [Node]) {
        for node in nodes {
            match node {
                Node::Element(element) => {
                    if !element.id.is_assigned() {
                        element.id = self.next();
                    }
                    self.assign(&mut element.children);
                }
                Node::Macro(mac) => {
                    if !mac.id.is_assigned() {
                        mac.id = self.next();
                    }
                    self.assign(&mut mac.content);
                }
                Node::Text { .. } | Node::Error(_) => {}
            }
        }
    }
}

impl Default for NodeIds {
    fn default() -> Self {
        Self::new()
    }
}

/// Attributes for element nodes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Attributes {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,

    #[serde(flatten)]
    pub other: BTreeMap<String, String>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.other.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.other.get(key).map(String::as_str)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Add or remove a class; returns whether anything changed
    pub fn toggle_class(&mut self, class: &str, on: bool) -> bool {
        match (self.has_class(class), on) {
            (false, true) => {
                self.classes.push(class.to_string());
                true
            }
            (true, false) => {
                self.classes.retain(|c| c != class);
                true
            }
            _ => false,
        }
    }
}

/// A macro parameter as written at the call site
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Param {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub value: ParamValue,
}

impl Param {
    pub fn positional(value: impl Into<String>) -> Self {
        Self {
            name: None,
            value: ParamValue::Literal(value.into()),
        }
    }

    pub fn named(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            value: ParamValue::Literal(value.into()),
        }
    }

    pub fn call(name: Option<String>, call: MacroCall) -> Self {
        Self {
            name,
            value: ParamValue::Call(call),
        }
    }
}

/// The value of a parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamValue {
    /// Statically known text
    Literal(String),
    /// A nested macro call whose rendered text becomes the value
    Call(MacroCall),
}

impl ParamValue {
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            ParamValue::Literal(s) => Some(s),
            ParamValue::Call(_) => None,
        }
    }
}

/// An unexpanded macro invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MacroCall {
    pub name: String,
    pub params: Vec<Param>,
}

impl MacroCall {
    pub fn new(name: impl Into<String>, params: Vec<Param>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementNode {
    #[serde(skip_serializing_if = "is_unassigned")]
    pub id: NodeId,
    pub tag: String,
    pub attributes: Attributes,
    pub children: Vec<Node>,
}

/// A macro invocation and, once executed, what it produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MacroNode {
    #[serde(skip_serializing_if = "is_unassigned")]
    pub id: NodeId,
    pub name: String,
    pub params: Vec<Param>,

    /// Set by the engine after execution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Dependencies>,

    /// Transclusion path in effect when this node executed
    #[serde(skip)]
    pub parents: AncestorChain,

    /// Record whose fields are in scope for this node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiddler_title: Option<Title>,

    pub content: Vec<Node>,
}

impl MacroNode {
    pub fn new(name: impl Into<String>, params: Vec<Param>) -> Self {
        Self {
            id: NodeId::UNASSIGNED,
            name: name.into(),
            params,
            dependencies: None,
            parents: AncestorChain::new(),
            tiddler_title: None,
            content: Vec::new(),
        }
    }

    pub fn is_executed(&self) -> bool {
        self.dependencies.is_some()
    }
}

impl From<MacroCall> for MacroNode {
    fn from(call: MacroCall) -> Self {
        MacroNode::new(call.name, call.params)
    }
}

/// Inline marker for a macro that could not be expanded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorNode {
    pub error: RenderError,
}

/// A node of a parse or render tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Text { text: String },
    Element(ElementNode),
    Macro(MacroNode),
    Error(ErrorNode),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Node {
        Node::Text { text: text.into() }
    }

    pub fn element(tag: impl Into<String>, attributes: Attributes, children: Vec<Node>) -> Node {
        Node::Element(ElementNode {
            id: NodeId::UNASSIGNED,
            tag: tag.into(),
            attributes,
            children,
        })
    }

    pub fn macro_call(name: impl Into<String>, params: Vec<Param>) -> Node {
        Node::Macro(MacroNode::new(name, params))
    }

    pub fn error(error: RenderError) -> Node {
        Node::Error(ErrorNode { error })
    }

    /// Id of element and macro nodes; text and error leaves have none
    pub fn id(&self) -> Option<NodeId> {
        match self {
            Node::Element(e) => Some(e.id),
            Node::Macro(m) => Some(m.id),
            Node::Text { .. } | Node::Error(_) => None,
        }
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_macro(&self) -> Option<&MacroNode> {
        match self {
            Node::Macro(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&RenderError> {
        match self {
            Node::Error(e) => Some(&e.error),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element(e) => &e.children,
            Node::Macro(m) => &m.content,
            Node::Text { .. } | Node::Error(_) => &[],
        }
    }
}

/// The output of a parser
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseTree {
    pub nodes: Vec<Node>,
}

impl ParseTree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }
}

fn is_unassigned(id: &NodeId) -> bool {
    !id.is_assigned()
}

/// Visit every node depth-first, parents before children
pub fn walk<'a>(nodes: &'a [Node], visit: &mut dyn FnMut(&'a Node)) {
    for node in nodes {
        visit(node);
        walk(node.children(), visit);
    }
}

/// All error leaves in `nodes`
pub fn errors(nodes: &[Node]) -> Vec<&RenderError> {
    let mut found = Vec::new();
    walk(nodes, &mut |node| {
        if let Some(err) = node.as_error() {
            found.push(err);
        }
    });
    found
}

/// Render nodes as plain text
pub fn render_text(nodes: &[Node]) -> String {
    let mut out = String::new();
    write_text(nodes, &mut out);
    out
}

fn write_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text { text } => out.push_str(text),
            Node::Element(e) if e.tag == "br" => out.push('\n'),
            Node::Element(e) => write_text(&e.children, out),
            Node::Macro(m) => write_text(&m.content, out),
            Node::Error(e) => out.push_str(&e.error.to_string()),
        }
    }
}
