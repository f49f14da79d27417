//! The `echo` macro: renders its parameter as text.

use super::{BoundParams, Macro, ParamDef, ParamKind, ParamSpec};
use crate::dependencies::Dependencies;
use crate::engine::ExecContext;
use crate::error::RenderError;
use crate::tree::Node;

#[derive(Debug)]
pub struct EchoMacro {
    spec: ParamSpec,
}

impl EchoMacro {
    pub fn new() -> Self {
        Self {
            spec: ParamSpec::new()
                .cascading()
                .param(ParamDef::named("text", ParamKind::Text).positional().required()),
        }
    }
}

impl Default for EchoMacro {
    fn default() -> Self {
        Self::new()
    }
}

impl Macro for EchoMacro {
    fn name(&self) -> &str {
        "echo"
    }

    fn params(&self) -> &ParamSpec {
        &self.spec
    }

    fn evaluate_dependencies(&self, _params: &BoundParams, _ctx: &ExecContext<'_>) -> Dependencies {
        Dependencies::none()
    }

    fn execute(&self, params: &BoundParams, _ctx: &ExecContext<'_>) -> Result<Vec<Node>, RenderError> {
        Ok(vec![Node::text(params.get_all("text").join(" "))])
    }
}
