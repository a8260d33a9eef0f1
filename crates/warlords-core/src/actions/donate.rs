use serde_json::Value;

use crate::action::{ActionContext, ActionDefinition, ActionError, ActionOutput};
use crate::constraint::{
    Constraint, ConstraintContext, NotNeutral, NotWandering, OccupiedCity, ReqGeneralGold,
    ReqGeneralRice, SuppliedCity,
};
use crate::effect::{Effect, LogEntry, NationPatch};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DonateArgs {
    pub is_gold: bool,
    pub amount: i64,
}

/// Hand gold or rice over to the nation treasury.
pub struct Donate;

impl ActionDefinition for Donate {
    type Args = DonateArgs;

    fn key(&self) -> &'static str {
        "donate"
    }

    fn parse_args(&self, raw: &Value) -> Option<DonateArgs> {
        let is_gold = raw.get("isGold")?.as_bool()?;
        let amount = raw.get("amount")?.as_i64().filter(|a| *a > 0)?;
        Some(DonateArgs { is_gold, amount })
    }

    fn build_min_constraints(&self, _ctx: &ConstraintContext) -> Vec<Box<dyn Constraint>> {
        vec![Box::new(NotNeutral), Box::new(NotWandering)]
    }

    fn build_constraints(
        &self,
        _ctx: &ConstraintContext,
        args: &DonateArgs,
    ) -> Vec<Box<dyn Constraint>> {
        let funds: Box<dyn Constraint> = if args.is_gold {
            Box::new(ReqGeneralGold(args.amount))
        } else {
            Box::new(ReqGeneralRice(args.amount))
        };
        vec![
            Box::new(NotNeutral),
            Box::new(NotWandering),
            Box::new(OccupiedCity),
            Box::new(SuppliedCity),
            funds,
        ]
    }

    fn resolve(
        &self,
        ctx: &mut ActionContext<'_>,
        args: &DonateArgs,
    ) -> Result<ActionOutput, ActionError> {
        let Some(nation) = ctx.nation else {
            return Err(ActionError::resolver(self.key(), "actor has no nation record"));
        };

        let mut patch = NationPatch::default();
        let resource = if args.is_gold {
            ctx.general.gold -= args.amount;
            patch.gold = Some(nation.gold + args.amount);
            "gold"
        } else {
            ctx.general.rice -= args.amount;
            patch.rice = Some(nation.rice + args.amount);
            "rice"
        };
        ctx.general.experience += 70;
        ctx.general.dedication += 100;

        let mut output = ActionOutput::new();
        output.push(Effect::nation(nation.id, patch));
        output.log(LogEntry::general_action(
            ctx.general.id,
            format!("Donated {} {resource} to {}.", args.amount, nation.name),
        ));
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{resolve_action, Rejection, ResolveOutcome};
    use crate::actions::fixture;
    use crate::world::WorldRef;
    use serde_json::json;
    use warlords_protocol::{GeneralId, NationId};

    #[test]
    fn moves_funds_into_the_treasury() {
        let mut world = fixture::world();
        let outcome = resolve_action(
            &Donate,
            &world,
            GeneralId(2),
            &fixture::schedule(),
            &json!({"isGold": false, "amount": 400}),
        )
        .unwrap();
        let ResolveOutcome::Resolved(resolution) = outcome else {
            panic!("donation should resolve");
        };
        assert_eq!(resolution.general.rice, 600);

        world.commit(resolution).unwrap();
        assert_eq!(world.get_nation_by_id(NationId(1)).unwrap().rice, 10_400);
        assert_eq!(world.get_general_by_id(GeneralId(2)).unwrap().rice, 600);
    }

    #[test]
    fn rejects_bad_amounts_and_overdrafts() {
        let world = fixture::world();
        let schedule = fixture::schedule();
        assert_eq!(
            resolve_action(&Donate, &world, GeneralId(2), &schedule, &json!({"amount": 10}))
                .unwrap(),
            ResolveOutcome::Rejected(Rejection::InvalidArguments)
        );
        assert_eq!(
            resolve_action(
                &Donate,
                &world,
                GeneralId(2),
                &schedule,
                &json!({"isGold": true, "amount": 5_000})
            )
            .unwrap(),
            ResolveOutcome::Rejected(Rejection::Denied {
                constraint: "ReqGeneralGold".into(),
                reason: "Not enough gold.".into()
            })
        );
    }
}
