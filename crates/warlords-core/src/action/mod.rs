//! Action resolution pipeline.
//!
//! An action turns raw, untrusted arguments into effects in four steps:
//! parse, hydrate context, check constraints, resolve. Only the last step
//! may change anything, and even then only the acting general's own record
//! is written directly; everything else leaves as patch effects.

mod registry;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use warlords_protocol::{CityId, GeneralId, NationId};

use crate::constraint::{
    evaluate_constraints, Constraint, ConstraintContext, ConstraintError, ConstraintMode, Verdict,
    WorldStateView,
};
use crate::effect::{Effect, LogEntry, NewEntity};
use crate::entities::{City, General, Nation};
use crate::world::WorldRef;

pub use registry::{ActionKind, ActionRegistry};

/// When the resolution happens, in wall-clock and game time.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduleContext {
    pub turn_time: DateTime<Utc>,
    pub year: i32,
    pub month: u8,
    pub env: Map<String, Value>,
}

/// Destination ids an action's arguments point at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActionTarget {
    pub dest_general_id: Option<GeneralId>,
    pub dest_city_id: Option<CityId>,
    pub dest_nation_id: Option<NationId>,
}

/// Everything a resolver may read, plus the actor it may write.
pub struct ActionContext<'w> {
    pub general: General,
    pub city: Option<&'w City>,
    pub nation: Option<&'w Nation>,
    pub dest_general: Option<&'w General>,
    pub dest_city: Option<&'w City>,
    pub dest_nation: Option<&'w Nation>,
    pub schedule: &'w ScheduleContext,
    pub world: &'w dyn WorldRef,
}

impl<'w> ActionContext<'w> {
    /// Base context: the actor's own city and nation plus whatever `target` names.
    pub fn hydrate(
        world: &'w dyn WorldRef,
        general: General,
        schedule: &'w ScheduleContext,
        target: ActionTarget,
    ) -> Self {
        Self {
            city: world.get_city_by_id(general.city_id),
            nation: world.get_nation_by_id(general.nation_id),
            dest_general: target
                .dest_general_id
                .and_then(|id| world.get_general_by_id(id)),
            dest_city: target.dest_city_id.and_then(|id| world.get_city_by_id(id)),
            dest_nation: target
                .dest_nation_id
                .and_then(|id| world.get_nation_by_id(id)),
            general,
            schedule,
            world,
        }
    }
}

#[derive(Debug, Default)]
pub struct ActionOutput {
    pub effects: Vec<Effect>,
    pub created: Vec<NewEntity>,
}

impl ActionOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn log(&mut self, entry: LogEntry) {
        self.effects.push(Effect::Log(entry));
    }

    pub fn create(&mut self, entity: NewEntity) {
        self.created.push(entity);
    }
}

/// A resolved action, committed as one unit by [`crate::World::commit`].
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    /// Acting general after the resolver's changes
    pub general: General,
    /// Patch effects in emission order
    pub effects: Vec<Effect>,
    pub logs: Vec<LogEntry>,
    pub created: Vec<NewEntity>,
}

/// Expected ways an attempt ends without effects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    InvalidArguments,
    Denied { constraint: String, reason: String },
    /// The actor or the action's target no longer exists
    MissingReference,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArguments => f.write_str("invalid arguments"),
            Self::Denied { reason, .. } => f.write_str(reason),
            Self::MissingReference => f.write_str("target no longer exists"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ResolveOutcome {
    Resolved(Resolution),
    Rejected(Rejection),
}

/// Faults that are bugs in content, never business outcomes.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Constraint(#[from] ConstraintError),
    #[error("action {action} failed: {message}")]
    Resolver { action: String, message: String },
}

impl ActionError {
    pub fn resolver(action: &str, message: impl Into<String>) -> Self {
        Self::Resolver {
            action: action.to_string(),
            message: message.into(),
        }
    }
}

/// Contract implemented by every action module.
pub trait ActionDefinition: Send + Sync {
    type Args;

    fn key(&self) -> &'static str;

    /// `None` for malformed input.
    fn parse_args(&self, raw: &Value) -> Option<Self::Args>;

    fn target(&self, _args: &Self::Args) -> ActionTarget {
        ActionTarget::default()
    }

    /// Cheap checks over actor-local facts, used for listings.
    fn build_min_constraints(&self, _ctx: &ConstraintContext) -> Vec<Box<dyn Constraint>> {
        Vec::new()
    }

    fn build_constraints(
        &self,
        ctx: &ConstraintContext,
        args: &Self::Args,
    ) -> Vec<Box<dyn Constraint>>;

    /// Hydrate action-specific data. `None` aborts silently.
    fn build_context<'w>(
        &self,
        base: ActionContext<'w>,
        _args: &Self::Args,
    ) -> Option<ActionContext<'w>> {
        Some(base)
    }

    fn resolve(
        &self,
        ctx: &mut ActionContext<'_>,
        args: &Self::Args,
    ) -> Result<ActionOutput, ActionError>;
}

/// Run the pipeline for `actor` against `raw` arguments.
///
/// Rejections come back as [`ResolveOutcome::Rejected`] with no effects;
/// `Err` is reserved for content bugs.
pub fn resolve_action<D>(
    definition: &D,
    world: &dyn WorldRef,
    actor: GeneralId,
    schedule: &ScheduleContext,
    raw: &Value,
) -> Result<ResolveOutcome, ActionError>
where
    D: ActionDefinition + ?Sized,
{
    let Some(args) = definition.parse_args(raw) else {
        return Ok(ResolveOutcome::Rejected(Rejection::InvalidArguments));
    };
    let Some(general) = world.get_general_by_id(actor) else {
        return Ok(ResolveOutcome::Rejected(Rejection::MissingReference));
    };

    let target = definition.target(&args);
    let base = ActionContext::hydrate(world, general.clone(), schedule, target);
    let Some(mut context) = definition.build_context(base, &args) else {
        tracing::debug!(general_id = %actor, action = definition.key(), "Context builder aborted");
        return Ok(ResolveOutcome::Rejected(Rejection::MissingReference));
    };

    let mut constraint_ctx = ConstraintContext::for_general(general, ConstraintMode::Full)
        .with_args(raw.clone())
        .with_env(schedule.env.clone());
    constraint_ctx.dest_general_id = target.dest_general_id;
    constraint_ctx.dest_city_id = target.dest_city_id;
    constraint_ctx.dest_nation_id = target.dest_nation_id;

    let constraints = definition.build_constraints(&constraint_ctx, &args);
    let view = WorldStateView::new(world, &constraint_ctx.env, &constraint_ctx.args);
    if let Verdict::Deny { constraint, reason } =
        evaluate_constraints(&constraints, &constraint_ctx, &view)?
    {
        return Ok(ResolveOutcome::Rejected(Rejection::Denied { constraint, reason }));
    }

    let output = definition.resolve(&mut context, &args)?;
    let (logs, effects): (Vec<Effect>, Vec<Effect>) =
        output.effects.into_iter().partition(Effect::is_log);
    let logs = logs
        .into_iter()
        .filter_map(|effect| match effect {
            Effect::Log(entry) => Some(entry),
            _ => None,
        })
        .collect();

    Ok(ResolveOutcome::Resolved(Resolution {
        general: context.general,
        effects,
        logs,
        created: output.created,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{ConstraintOutcome, ReqGeneralGold, StateView};
    use crate::effect::{GeneralPatch, LogEntry};
    use crate::world::World;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn schedule() -> ScheduleContext {
        ScheduleContext {
            turn_time: Utc.with_ymd_and_hms(2026, 1, 2, 2, 0, 0).unwrap(),
            year: 180,
            month: 1,
            env: Map::new(),
        }
    }

    fn world() -> World {
        let mut world = World::new();
        let at = schedule().turn_time;
        world.insert_general(General::new(GeneralId(1), "Dian Wei", NationId(1), CityId(1), at));
        world.insert_general(General::new(GeneralId(2), "Xu Chu", NationId(1), CityId(1), at));
        world
    }

    /// Pays `amount` gold to general 2.
    #[derive(Default)]
    struct Gift {
        resolves: AtomicUsize,
    }

    impl ActionDefinition for Gift {
        type Args = i64;

        fn key(&self) -> &'static str {
            "gift"
        }

        fn parse_args(&self, raw: &Value) -> Option<i64> {
            raw.get("amount")?.as_i64().filter(|amount| *amount > 0)
        }

        fn target(&self, _args: &i64) -> ActionTarget {
            ActionTarget {
                dest_general_id: Some(GeneralId(2)),
                ..Default::default()
            }
        }

        fn build_constraints(
            &self,
            _ctx: &ConstraintContext,
            amount: &i64,
        ) -> Vec<Box<dyn Constraint>> {
            vec![Box::new(ReqGeneralGold(*amount))]
        }

        fn build_context<'w>(
            &self,
            base: ActionContext<'w>,
            _args: &i64,
        ) -> Option<ActionContext<'w>> {
            base.dest_general.is_some().then_some(base)
        }

        fn resolve(
            &self,
            ctx: &mut ActionContext<'_>,
            amount: &i64,
        ) -> Result<ActionOutput, ActionError> {
            self.resolves.fetch_add(1, Ordering::SeqCst);
            let Some(dest) = ctx.dest_general else {
                return Err(ActionError::resolver(self.key(), "destination vanished"));
            };
            ctx.general.gold -= amount;
            let mut output = ActionOutput::new();
            output.push(Effect::general(
                dest.id,
                GeneralPatch {
                    gold: Some(dest.gold + amount),
                    ..Default::default()
                },
            ));
            output.log(LogEntry::general_action(ctx.general.id, "Sent a gift"));
            Ok(output)
        }
    }

    #[test]
    fn resolves_into_actor_patch_and_logs() {
        let world = world();
        let gift = Gift::default();
        let outcome =
            resolve_action(&gift, &world, GeneralId(1), &schedule(), &json!({"amount": 300}))
                .unwrap();

        let ResolveOutcome::Resolved(resolution) = outcome else {
            panic!("expected resolution");
        };
        assert_eq!(resolution.general.gold, 700);
        assert_eq!(resolution.effects.len(), 1);
        assert_eq!(resolution.logs.len(), 1);
        // Nothing was written to the world itself.
        assert_eq!(world.get_general_by_id(GeneralId(2)).unwrap().gold, 1_000);
    }

    #[test]
    fn malformed_arguments_never_reach_the_resolver() {
        let world = world();
        let gift = Gift::default();
        for raw in [json!(null), json!({"amount": "lots"}), json!({"amount": -5})] {
            let outcome = resolve_action(&gift, &world, GeneralId(1), &schedule(), &raw).unwrap();
            assert_eq!(outcome, ResolveOutcome::Rejected(Rejection::InvalidArguments));
        }
        assert_eq!(gift.resolves.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn denial_carries_first_reason() {
        let world = world();
        let gift = Gift::default();
        let outcome =
            resolve_action(&gift, &world, GeneralId(1), &schedule(), &json!({"amount": 5000}))
                .unwrap();
        assert_eq!(
            outcome,
            ResolveOutcome::Rejected(Rejection::Denied {
                constraint: "ReqGeneralGold".into(),
                reason: "Not enough gold.".into()
            })
        );
        assert_eq!(gift.resolves.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn vanished_target_is_missing_reference() {
        let mut world = World::new();
        let at = schedule().turn_time;
        world.insert_general(General::new(GeneralId(1), "Dian Wei", NationId(1), CityId(1), at));
        let gift = Gift::default();

        let outcome =
            resolve_action(&gift, &world, GeneralId(1), &schedule(), &json!({"amount": 1}))
                .unwrap();
        assert_eq!(outcome, ResolveOutcome::Rejected(Rejection::MissingReference));

        let outcome =
            resolve_action(&gift, &world, GeneralId(9), &schedule(), &json!({"amount": 1}))
                .unwrap();
        assert_eq!(outcome, ResolveOutcome::Rejected(Rejection::MissingReference));
    }

    struct Exploding;

    impl Constraint for Exploding {
        fn name(&self) -> &str {
            "Exploding"
        }

        fn requires(&self, _ctx: &ConstraintContext) -> Vec<crate::RequirementKey> {
            Vec::new()
        }

        fn test(
            &self,
            _ctx: &ConstraintContext,
            _view: &dyn StateView,
        ) -> Result<ConstraintOutcome, ConstraintError> {
            Err(ConstraintError::Failed {
                constraint: "Exploding".into(),
                message: "table missing".into(),
            })
        }
    }

    struct Broken;

    impl ActionDefinition for Broken {
        type Args = ();

        fn key(&self) -> &'static str {
            "broken"
        }

        fn parse_args(&self, _raw: &Value) -> Option<()> {
            Some(())
        }

        fn build_constraints(&self, _ctx: &ConstraintContext, _args: &()) -> Vec<Box<dyn Constraint>> {
            vec![Box::new(Exploding)]
        }

        fn resolve(&self, _ctx: &mut ActionContext<'_>, _args: &()) -> Result<ActionOutput, ActionError> {
            Ok(ActionOutput::new())
        }
    }

    #[test]
    fn constraint_faults_propagate() {
        let world = world();
        let err = resolve_action(&Broken, &world, GeneralId(1), &schedule(), &json!({})).unwrap_err();
        assert!(matches!(err, ActionError::Constraint(ConstraintError::Failed { .. })));
    }
}
