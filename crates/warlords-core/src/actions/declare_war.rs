use serde_json::Value;

use warlords_protocol::NationId;

use crate::action::{ActionContext, ActionDefinition, ActionError, ActionOutput, ActionTarget};
use crate::constraint::{
    BeChief, Constraint, ConstraintContext, DifferentDestNation, ExistsDestNation, NotAtWarWith,
    NotNeutral, NotWandering,
};
use crate::effect::{DiplomacyPatch, Effect, LogCategory, LogEntry, LogFormat, LogScope};
use crate::entities::DiplomacyState;

use super::id_arg;

/// Ticks between the declaration and open war.
pub const DECLARATION_TERM: u32 = 24;

/// Nation action: announce war on another nation.
pub struct DeclareWar;

impl ActionDefinition for DeclareWar {
    type Args = NationId;

    fn key(&self) -> &'static str {
        "declare_war"
    }

    fn parse_args(&self, raw: &Value) -> Option<NationId> {
        id_arg(raw, "destNationId").map(NationId)
    }

    fn target(&self, dest: &NationId) -> ActionTarget {
        ActionTarget {
            dest_nation_id: Some(*dest),
            ..Default::default()
        }
    }

    fn build_min_constraints(&self, _ctx: &ConstraintContext) -> Vec<Box<dyn Constraint>> {
        vec![Box::new(BeChief), Box::new(NotWandering)]
    }

    fn build_constraints(&self, _ctx: &ConstraintContext, _dest: &NationId) -> Vec<Box<dyn Constraint>> {
        vec![
            Box::new(NotNeutral),
            Box::new(BeChief),
            Box::new(NotWandering),
            Box::new(ExistsDestNation),
            Box::new(DifferentDestNation),
            Box::new(NotAtWarWith),
        ]
    }

    fn build_context<'w>(
        &self,
        base: ActionContext<'w>,
        _dest: &NationId,
    ) -> Option<ActionContext<'w>> {
        base.dest_nation?;
        Some(base)
    }

    fn resolve(
        &self,
        ctx: &mut ActionContext<'_>,
        dest: &NationId,
    ) -> Result<ActionOutput, ActionError> {
        let (Some(own), Some(enemy)) = (ctx.nation, ctx.dest_nation) else {
            return Err(ActionError::resolver(
                self.key(),
                format!("nation pair {} -> {dest} incomplete", ctx.general.nation_id),
            ));
        };

        let declared = DiplomacyPatch {
            state: Some(DiplomacyState::Declared),
            term: Some(DECLARATION_TERM),
            ..Default::default()
        };
        ctx.general.experience += 50;
        ctx.general.dedication += 50;

        let mut output = ActionOutput::new();
        output.push(Effect::diplomacy(own.id, enemy.id, declared.clone()));
        output.push(Effect::diplomacy(enemy.id, own.id, declared));
        output.log(LogEntry::nation_history(
            own.id,
            format!("{} declared war on {}.", ctx.general.name, enemy.name),
        ));
        output.log(LogEntry::nation_history(
            enemy.id,
            format!("{} declared war on us.", own.name),
        ));
        output.log(
            LogEntry::new(
                LogScope::Global,
                LogCategory::Diplomacy,
                format!("{} has declared war on {}.", own.name, enemy.name),
            )
            .with_format(LogFormat::YearMonth),
        );
        Ok(output)
    }
}
