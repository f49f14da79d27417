//! The `view` macro: renders one field of the record in scope.

use super::{BoundParams, Macro, ParamDef, ParamKind, ParamSpec};
use crate::dependencies::Dependencies;
use crate::engine::ExecContext;
use crate::error::RenderError;
use crate::tree::Node;

#[derive(Debug)]
pub struct ViewMacro {
    spec: ParamSpec,
}

impl ViewMacro {
    pub fn new() -> Self {
        Self {
            spec: ParamSpec::new()
                .param(ParamDef::named("field", ParamKind::Text).positional().required()),
        }
    }
}

impl Default for ViewMacro {
    fn default() -> Self {
        Self::new()
    }
}

impl Macro for ViewMacro {
    fn name(&self) -> &str {
        "view"
    }

    fn params(&self) -> &ParamSpec {
        &self.spec
    }

    fn evaluate_dependencies(&self, _params: &BoundParams, ctx: &ExecContext<'_>) -> Dependencies {
        match ctx.tiddler_title() {
            Some(title) => Dependencies::title(title.clone()),
            None => Dependencies::none(),
        }
    }

    fn execute(&self, params: &BoundParams, ctx: &ExecContext<'_>) -> Result<Vec<Node>, RenderError> {
        let field = params.get("field").unwrap_or("text");
        let value = ctx
            .tiddler_title()
            .and_then(|title| ctx.store().get(title.as_str()))
            .and_then(|tiddler| tiddler.field(field).map(str::to_string));

        Ok(value.map(Node::text).into_iter().collect())
    }
}
