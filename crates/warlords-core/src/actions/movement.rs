use serde_json::Value;

use warlords_protocol::CityId;

use crate::action::{ActionContext, ActionDefinition, ActionError, ActionOutput, ActionTarget};
use crate::constraint::{
    Constraint, ConstraintContext, ConstraintError, ConstraintOutcome, ExistsDestCity,
    RequirementKey, ReqGeneralGold, StateView,
};
use crate::effect::LogEntry;

use super::id_arg;

pub const MOVE_COST: i64 = 20;

/// March to another city.
pub struct Move;

/// Destination differs from where the actor stands.
struct NotSameCity;

impl Constraint for NotSameCity {
    fn name(&self) -> &str {
        "NotSameCity"
    }

    fn requires(&self, _ctx: &ConstraintContext) -> Vec<RequirementKey> {
        Vec::new()
    }

    fn test(
        &self,
        ctx: &ConstraintContext,
        _view: &dyn StateView,
    ) -> Result<ConstraintOutcome, ConstraintError> {
        if ctx.dest_city_id == Some(ctx.city_id) {
            Ok(ConstraintOutcome::Deny("You are already there.".into()))
        } else {
            Ok(ConstraintOutcome::Allow)
        }
    }
}

impl ActionDefinition for Move {
    type Args = CityId;

    fn key(&self) -> &'static str {
        "move"
    }

    fn parse_args(&self, raw: &Value) -> Option<CityId> {
        id_arg(raw, "destCityId").map(CityId)
    }

    fn target(&self, dest: &CityId) -> ActionTarget {
        ActionTarget {
            dest_city_id: Some(*dest),
            ..Default::default()
        }
    }

    fn build_min_constraints(&self, _ctx: &ConstraintContext) -> Vec<Box<dyn Constraint>> {
        vec![Box::new(ReqGeneralGold(MOVE_COST))]
    }

    fn build_constraints(&self, _ctx: &ConstraintContext, _dest: &CityId) -> Vec<Box<dyn Constraint>> {
        vec![
            Box::new(ExistsDestCity),
            Box::new(NotSameCity),
            Box::new(ReqGeneralGold(MOVE_COST)),
        ]
    }

    fn build_context<'w>(
        &self,
        base: ActionContext<'w>,
        _dest: &CityId,
    ) -> Option<ActionContext<'w>> {
        base.dest_city?;
        Some(base)
    }

    fn resolve(&self, ctx: &mut ActionContext<'_>, dest: &CityId) -> Result<ActionOutput, ActionError> {
        let Some(city) = ctx.dest_city else {
            return Err(ActionError::resolver(self.key(), format!("city {dest} vanished")));
        };
        let general = &mut ctx.general;
        general.city_id = city.id;
        general.gold -= MOVE_COST;
        general.atmos = (general.atmos - 5).max(0);
        general.experience += 50;

        let mut output = ActionOutput::new();
        output.log(LogEntry::general_action(
            general.id,
            format!("Moved to {}.", city.name),
        ));
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{resolve_action, Rejection, ResolveOutcome};
    use crate::actions::fixture;
    use serde_json::json;
    use warlords_protocol::GeneralId;

    #[test]
    fn relocates_the_actor() {
        let world = fixture::world();
        let outcome = resolve_action(
            &Move,
            &world,
            GeneralId(2),
            &fixture::schedule(),
            &json!({"destCityId": 1}),
        )
        .unwrap();
        let ResolveOutcome::Resolved(resolution) = outcome else {
            panic!("move should resolve");
        };
        assert_eq!(resolution.general.city_id, CityId(1));
        assert_eq!(resolution.general.gold, 1_000 - MOVE_COST);
        assert_eq!(resolution.logs[0].text, "Moved to Xuchang.");
    }

    #[test]
    fn missing_destination_aborts_silently() {
        let world = fixture::world();
        let outcome = resolve_action(
            &Move,
            &world,
            GeneralId(2),
            &fixture::schedule(),
            &json!({"destCityId": 99}),
        )
        .unwrap();
        assert_eq!(outcome, ResolveOutcome::Rejected(Rejection::MissingReference));
    }

    #[test]
    fn staying_put_is_denied() {
        let world = fixture::world();
        let outcome = resolve_action(
            &Move,
            &world,
            GeneralId(2),
            &fixture::schedule(),
            &json!({"destCityId": 2}),
        )
        .unwrap();
        assert_eq!(
            outcome,
            ResolveOutcome::Rejected(Rejection::Denied {
                constraint: "NotSameCity".into(),
                reason: "You are already there.".into()
            })
        );
    }
}
