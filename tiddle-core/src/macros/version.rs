use super::{BoundParams, Macro, ParamSpec};
use crate::dependencies::Dependencies;
use crate::engine::ExecContext;
use crate::error::RenderError;
use crate::tree::Node;

/// Renders the engine version
#[derive(Debug, Default)]
pub struct VersionMacro {
    spec: ParamSpec,
}

impl Macro for VersionMacro {
    fn name(&self) -> &str {
        "version"
    }

    fn params(&self) -> &ParamSpec {
        &self.spec
    }

    fn evaluate_dependencies(&self, _params: &BoundParams, _ctx: &ExecContext<'_>) -> Dependencies {
        Dependencies::none()
    }

    fn execute(&self, _params: &BoundParams, _ctx: &ExecContext<'_>) -> Result<Vec<Node>, RenderError> {
        Ok(vec![Node::text(env!("CARGO_PKG_VERSION"))])
    }
}
