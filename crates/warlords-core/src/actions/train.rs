use serde_json::Value;

use crate::action::{ActionContext, ActionDefinition, ActionError, ActionOutput};
use crate::constraint::{Constraint, ConstraintContext, NotNeutral, OccupiedCity, ReqGeneralCrew};
use crate::effect::LogEntry;

pub const MAX_TRAIN: i32 = 100;

/// Drill the general's soldiers. Touches only the actor.
pub struct Train;

impl ActionDefinition for Train {
    type Args = ();

    fn key(&self) -> &'static str {
        "train"
    }

    fn parse_args(&self, _raw: &Value) -> Option<()> {
        Some(())
    }

    fn build_min_constraints(&self, _ctx: &ConstraintContext) -> Vec<Box<dyn Constraint>> {
        vec![Box::new(NotNeutral), Box::new(ReqGeneralCrew(1))]
    }

    fn build_constraints(&self, _ctx: &ConstraintContext, _args: &()) -> Vec<Box<dyn Constraint>> {
        vec![
            Box::new(NotNeutral),
            Box::new(OccupiedCity),
            Box::new(ReqGeneralCrew(1)),
        ]
    }

    fn resolve(&self, ctx: &mut ActionContext<'_>, _args: &()) -> Result<ActionOutput, ActionError> {
        let general = &mut ctx.general;
        let gain = (general.leadership / 5).max(1);
        let before = general.train;
        general.train = (general.train + gain).min(MAX_TRAIN);
        // Hard drilling wears on morale.
        general.atmos = (general.atmos - gain / 4).max(0);
        general.experience += 100;
        general.dedication += 70;
        general.bump_meta("leadership_exp", 1);

        let mut output = ActionOutput::new();
        output.log(LogEntry::general_action(
            general.id,
            format!("Trained the troops ({} -> {}).", before, general.train),
        ));
        Ok(output)
    }
}
