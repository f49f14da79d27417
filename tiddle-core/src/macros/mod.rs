//! Macro capability, parameter binding and the macro registry
//!
//! A macro is a named directive expanded by the engine. Each macro declares a
//! [`ParamSpec`]; the engine binds call-site parameters against it, asks the
//! macro for its [`Dependencies`], then executes it.

pub mod echo;
pub mod tiddler;
pub mod version;
pub mod view;

pub use echo::EchoMacro;
pub use tiddler::{substitute_placeholders, TiddlerMacro};
pub use version::VersionMacro;
pub use view::ViewMacro;

use crate::dependencies::Dependencies;
use crate::engine::ExecContext;
use crate::error::RenderError;
use crate::sink::OutputSink;
use crate::tree::{MacroCall, MacroNode, Node, Param, ParamValue};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tiddle_types::ChangeMap;

/// Semantic type of a parameter, used only to guide dependency evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Names a record the macro reads
    TiddlerReference,
    /// Plain text; a nested call here only contributes its own dependencies
    Text,
    /// Text that shapes what the macro reads, such as `with` substitutions;
    /// a nested call here makes the node depend on everything
    Callable,
}

/// Declaration of one parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDef {
    pub name: String,
    pub kind: ParamKind,
    /// May be filled by an anonymous value, in declaration order
    pub positional: bool,
    pub required: bool,
    pub default: Option<String>,
}

impl ParamDef {
    pub fn named(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            positional: false,
            required: false,
            default: None,
        }
    }

    pub fn positional(mut self) -> Self {
        self.positional = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Whether a non-literal value hides the node's real dependencies
    pub fn affects_dependencies(&self) -> bool {
        matches!(self.kind, ParamKind::TiddlerReference | ParamKind::Callable)
    }
}

/// A macro's declared parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamSpec {
    pub params: Vec<ParamDef>,
    /// Anonymous values following a named one take that name
    pub cascade: bool,
}

impl ParamSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, def: ParamDef) -> Self {
        self.params.push(def);
        self
    }

    pub fn cascading(mut self) -> Self {
        self.cascade = true;
        self
    }

    pub fn def(&self, name: &str) -> Option<&ParamDef> {
        self.params.iter().find(|d| d.name == name)
    }

    /// Bind call-site parameters against this spec
    pub fn bind(&self, macro_name: &str, supplied: &[Param]) -> Result<BoundParams, RenderError> {
        let mut values: BTreeMap<String, Vec<BoundValue>> = BTreeMap::new();
        let mut last_named: Option<&str> = None;

        for param in supplied {
            let name = match (&param.name, last_named) {
                (Some(name), _) => {
                    if self.def(name).is_none() {
                        return Err(RenderError::UnknownParameter {
                            macro_name: macro_name.to_string(),
                            param: name.clone(),
                        });
                    }
                    last_named = Some(name.as_str());
                    name.clone()
                }
                (None, Some(previous)) if self.cascade => previous.to_string(),
                (None, _) => {
                    let slot = self
                        .params
                        .iter()
                        .find(|d| d.positional && !values.contains_key(&d.name));
                    match slot {
                        Some(def) => def.name.clone(),
                        None => {
                            return Err(RenderError::UnexpectedPositional {
                                macro_name: macro_name.to_string(),
                                value: describe(&param.value),
                            })
                        }
                    }
                }
            };
            values
                .entry(name)
                .or_default()
                .push(BoundValue::new(param.value.clone()));
        }

        for def in &self.params {
            if values.contains_key(&def.name) {
                continue;
            }
            if let Some(default) = &def.default {
                values.insert(
                    def.name.clone(),
                    vec![BoundValue::new(ParamValue::Literal(default.clone()))],
                );
            } else if def.required {
                return Err(RenderError::MissingParameter {
                    macro_name: macro_name.to_string(),
                    param: def.name.clone(),
                });
            }
        }

        Ok(BoundParams { values })
    }
}

fn describe(value: &ParamValue) -> String {
    match value {
        ParamValue::Literal(s) => s.clone(),
        ParamValue::Call(call) => format!("{{{{{}}}}}", call.name),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BoundValue {
    source: ParamValue,
    text: Option<String>,
}

impl BoundValue {
    fn new(source: ParamValue) -> Self {
        let text = source.as_literal().map(str::to_string);
        Self { source, text }
    }
}

/// Parameters bound to their declared names
///
/// Literal values are available immediately. Values written as nested macro
/// calls are filled in by the engine before `execute` runs; during dependency
/// evaluation they read as absent and [`is_call`](BoundParams::is_call) is true.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundParams {
    values: BTreeMap<String, Vec<BoundValue>>,
}

impl BoundParams {
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// First value of `name`, once resolved
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name)?.first()?.text.as_deref()
    }

    /// Every resolved value bound to `name`, in call-site order
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.values
            .get(name)
            .map(|vals| vals.iter().filter_map(|v| v.text.as_deref()).collect())
            .unwrap_or_default()
    }

    /// First value of `name` if it was written as a literal
    pub fn literal(&self, name: &str) -> Option<&str> {
        self.values.get(name)?.first()?.source.as_literal()
    }

    /// Whether any value of `name` is a nested macro call
    pub fn is_call(&self, name: &str) -> bool {
        self.values
            .get(name)
            .is_some_and(|vals| vals.iter().any(|v| matches!(v.source, ParamValue::Call(_))))
    }

    /// Fill in the text of every nested-call value
    pub fn resolve_calls(&mut self, mut evaluate: impl FnMut(&MacroCall) -> String) {
        for value in self.values.values_mut().flatten() {
            if let ParamValue::Call(call) = &value.source {
                value.text = Some(evaluate(call));
            }
        }
    }
}

/// A macro capability
pub trait Macro: Send + Sync {
    fn name(&self) -> &str;

    fn params(&self) -> &ParamSpec;

    /// Titles whose change requires this invocation to re-execute
    ///
    /// Only called when every dependency-relevant parameter is a literal; the
    /// engine already answers [`Dependencies::All`] otherwise.
    fn evaluate_dependencies(&self, params: &BoundParams, ctx: &ExecContext<'_>) -> Dependencies;

    /// Produce this invocation's content
    ///
    /// Nested macro nodes in the returned content must already be executed,
    /// typically through [`ExecContext::execute_nodes`].
    fn execute(&self, params: &BoundParams, ctx: &ExecContext<'_>) -> Result<Vec<Node>, RenderError>;

    /// Called when a refresh reaches this node but its dependencies are
    /// unaffected, before the refresh is forwarded to its children
    fn refresh(
        &self,
        _node: &mut MacroNode,
        _changes: &ChangeMap,
        _ctx: &ExecContext<'_>,
        _sink: &mut dyn OutputSink,
    ) {
    }
}

/// Name → macro
#[derive(Default)]
pub struct MacroRegistry {
    macros: HashMap<String, Arc<dyn Macro>>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a macro under its own name; returns the one it replaced
    pub fn install(&mut self, mac: Arc<dyn Macro>) -> Option<Arc<dyn Macro>> {
        let name = mac.name().to_string();
        let previous = self.macros.insert(name.clone(), mac);
        if previous.is_some() {
            tracing::debug!(macro_name = %name, "macro registration replaced");
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Macro>> {
        self.macros.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.macros.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for MacroRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacroRegistry")
            .field("macros", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiddler_spec() -> ParamSpec {
        ParamSpec::new()
            .cascading()
            .param(ParamDef::named("target", ParamKind::TiddlerReference).positional())
            .param(ParamDef::named("template", ParamKind::TiddlerReference))
            .param(ParamDef::named("with", ParamKind::Callable))
    }

    #[test]
    fn test_positional_binding() {
        let bound = tiddler_spec().bind("tiddler", &[Param::positional("Foo")]).unwrap();

        assert_eq!(bound.get("target"), Some("Foo"));
        assert!(!bound.contains("template"));
    }

    #[test]
    fn test_cascading_binding() {
        let params = [
            Param::named("template", "Tpl"),
            Param::named("with", "one"),
            Param::positional("two"),
        ];
        let bound = tiddler_spec().bind("tiddler", &params).unwrap();

        assert_eq!(bound.get("template"), Some("Tpl"));
        assert_eq!(bound.get_all("with"), vec!["one", "two"]);
        assert!(!bound.contains("target"));
    }

    #[test]
    fn test_without_cascade_anonymous_fills_slots() {
        let spec = ParamSpec::new()
            .param(ParamDef::named("a", ParamKind::Text).positional())
            .param(ParamDef::named("b", ParamKind::Text).positional());
        let bound = spec
            .bind("m", &[Param::named("b", "B"), Param::positional("A")])
            .unwrap();

        assert_eq!(bound.get("a"), Some("A"));
        assert_eq!(bound.get("b"), Some("B"));
    }

    #[test]
    fn test_missing_required_parameter() {
        let spec = ParamSpec::new().param(ParamDef::named("field", ParamKind::Text).positional().required());
        let err = spec.bind("view", &[]).unwrap_err();

        assert_eq!(
            err,
            RenderError::MissingParameter {
                macro_name: "view".to_string(),
                param: "field".to_string(),
            }
        );
        assert!(err.is_binding_error());
    }

    #[test]
    fn test_default_fills_missing() {
        let spec = ParamSpec::new().param(
            ParamDef::named("field", ParamKind::Text)
                .required()
                .with_default("text"),
        );
        let bound = spec.bind("view", &[]).unwrap();

        assert_eq!(bound.literal("field"), Some("text"));
    }

    #[test]
    fn test_unknown_and_extra_parameters() {
        let spec = ParamSpec::new().param(ParamDef::named("only", ParamKind::Text).positional());

        assert!(matches!(
            spec.bind("m", &[Param::named("other", "x")]),
            Err(RenderError::UnknownParameter { .. })
        ));
        assert!(matches!(
            spec.bind("m", &[Param::positional("1"), Param::positional("2")]),
            Err(RenderError::UnexpectedPositional { .. })
        ));
    }

    #[test]
    fn test_calls_resolve_later() {
        let call = MacroCall::new("echo", vec![Param::positional("Foo")]);
        let mut bound = tiddler_spec()
            .bind("tiddler", &[Param::call(None, call)])
            .unwrap();

        assert!(bound.is_call("target"));
        assert_eq!(bound.get("target"), None);
        assert_eq!(bound.literal("target"), None);

        bound.resolve_calls(|call| format!("resolved {}", call.name));
        assert_eq!(bound.get("target"), Some("resolved echo"));
    }
}
