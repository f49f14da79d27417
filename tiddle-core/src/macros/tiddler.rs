//! The `tiddler` macro: transclusion
//!
//! ```text
//! <<tiddler Foo>>                       render Foo, with Foo's fields in scope
//! <<tiddler template:Foo>>              render Foo's text, with the current record's fields in scope
//! <<tiddler target:Foo template:Bar>>   render Bar's text, with Foo's fields in scope
//! <<tiddler template:Bar with:a b>>     substitute $1=a, $2=b into Bar's raw text first
//! ```
//!
//! `with` substitution happens on the raw text, before parsing, so substituted
//! characters are interpreted as markup. Values are not escaped.

use super::{BoundParams, Macro, ParamDef, ParamKind, ParamSpec};
use crate::dependencies::Dependencies;
use crate::engine::ExecContext;
use crate::error::RenderError;
use crate::sink::OutputSink;
use crate::tree::{Attributes, MacroNode, Node};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tiddle_types::{ChangeMap, Title};

pub const TARGET_ATTR: &str = "data-tiddler-target";
pub const TEMPLATE_ATTR: &str = "data-tiddler-template";

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(\d+)").expect("placeholder pattern is valid"));

/// Replace `$1`, `$2`, … in `text` with `values`
///
/// Placeholders beyond the supplied values are left as written.
pub fn substitute_placeholders(text: &str, values: &[&str]) -> String {
    PLACEHOLDER_RE
        .replace_all(text, |caps: &Captures| {
            let index = caps[1].parse::<usize>().unwrap_or(0);
            match index.checked_sub(1).and_then(|i| values.get(i)) {
                Some(value) => (*value).to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[derive(Debug)]
pub struct TiddlerMacro {
    spec: ParamSpec,
}

impl TiddlerMacro {
    pub fn new() -> Self {
        Self {
            spec: ParamSpec::new()
                .cascading()
                .param(ParamDef::named("target", ParamKind::TiddlerReference).positional())
                .param(ParamDef::named("template", ParamKind::TiddlerReference))
                .param(ParamDef::named("with", ParamKind::Callable)),
        }
    }
}

impl Default for TiddlerMacro {
    fn default() -> Self {
        Self::new()
    }
}

impl Macro for TiddlerMacro {
    fn name(&self) -> &str {
        "tiddler"
    }

    fn params(&self) -> &ParamSpec {
        &self.spec
    }

    fn evaluate_dependencies(&self, params: &BoundParams, ctx: &ExecContext<'_>) -> Dependencies {
        let template = params
            .literal("template")
            .or_else(|| params.literal("target"))
            .map(Title::from)
            .or_else(|| ctx.tiddler_title().cloned());

        match template {
            Some(title) => Dependencies::title(title),
            None => Dependencies::none(),
        }
    }

    fn execute(&self, params: &BoundParams, ctx: &ExecContext<'_>) -> Result<Vec<Node>, RenderError> {
        let store = ctx.store();
        let render_title = params
            .get("target")
            .map(Title::from)
            .or_else(|| ctx.tiddler_title().cloned());
        let render_template = params
            .get("template")
            .map(Title::from)
            .or_else(|| render_title.clone());

        let content = match &render_template {
            Some(template) if ctx.parents().contains(template.as_str()) => {
                tracing::debug!(
                    template = %template,
                    via = ?ctx.parents().innermost(),
                    depth = ctx.parents().len(),
                    "transclusion recursion cut off"
                );
                ctx.metrics().record_recursion();
                vec![Node::error(RenderError::TransclusionRecursion {
                    title: template.clone(),
                })]
            }
            Some(template) => {
                let mut nodes = if params.contains("with") {
                    match store.get(template.as_str()) {
                        Some(tiddler) => {
                            let text = substitute_placeholders(tiddler.text(), &params.get_all("with"));
                            store.parse_text(tiddler.content_type(), &text).nodes
                        }
                        None => Vec::new(),
                    }
                } else {
                    store
                        .parse_tiddler(template.as_str())
                        .map(|tree| tree.nodes.clone())
                        .unwrap_or_default()
                };
                ctx.execute_nodes(&mut nodes, ctx.parents().push(template.clone()), render_title.clone());
                nodes
            }
            None => Vec::new(),
        };

        let config = store.config();
        let missing = render_title.as_ref().map_or(true, |t| !store.exists(t.as_str()));
        let mut attributes = Attributes::new()
            .with_class(config.frame_class.clone())
            .with_attr(TARGET_ATTR, render_title.as_ref().map(Title::as_str).unwrap_or_default())
            .with_attr(TEMPLATE_ATTR, render_template.as_ref().map(Title::as_str).unwrap_or_default());
        if missing {
            attributes = attributes.with_class(config.missing_class.clone());
        }

        Ok(vec![Node::element("div", attributes, content)])
    }

    fn refresh(
        &self,
        node: &mut MacroNode,
        changes: &ChangeMap,
        ctx: &ExecContext<'_>,
        sink: &mut dyn OutputSink,
    ) {
        let store = ctx.store();
        let missing_class = store.config().missing_class.clone();

        let Some(Node::Element(frame)) = node.content.first_mut() else {
            return;
        };
        let missing = match frame.attributes.get(TARGET_ATTR) {
            Some(target) if !target.is_empty() => !store.exists(target),
            _ => true,
        };
        if frame.attributes.toggle_class(&missing_class, missing) {
            tracing::trace!(node = ?frame.id, missing, "transclusion frame missing marker changed");
            if let Some(frame) = node.content.first() {
                sink.refresh(frame, changes);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_in_order() {
        assert_eq!(
            substitute_placeholders("$1 and $2, again $1", &["a", "b"]),
            "a and b, again a"
        );
    }

    #[test]
    fn test_substitute_leaves_unknown_placeholders() {
        assert_eq!(substitute_placeholders("$0 $1 $2 $10", &["x"]), "$0 x $2 $10");
    }

    #[test]
    fn test_substitute_is_raw() {
        assert_eq!(
            substitute_placeholders("Hello $1!", &["''World''"]),
            "Hello ''World''!"
        );
    }
}
