use serde_json::Value;

use crate::action::{ActionContext, ActionDefinition, ActionError, ActionOutput};
use crate::constraint::{Constraint, ConstraintContext};
use crate::reserved::REST_ACTION;

/// Does nothing. Always available, also the fallback for unknown keys.
pub struct Rest;

impl ActionDefinition for Rest {
    type Args = ();

    fn key(&self) -> &'static str {
        REST_ACTION
    }

    fn parse_args(&self, _raw: &Value) -> Option<()> {
        Some(())
    }

    fn build_constraints(&self, _ctx: &ConstraintContext, _args: &()) -> Vec<Box<dyn Constraint>> {
        Vec::new()
    }

    fn resolve(
        &self,
        _ctx: &mut ActionContext<'_>,
        _args: &(),
    ) -> Result<ActionOutput, ActionError> {
        Ok(ActionOutput::new())
    }
}
