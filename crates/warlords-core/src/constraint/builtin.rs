//! Constraints shared by action content.

use super::{
    Constraint, ConstraintContext, ConstraintError, ConstraintOutcome, RequirementKey, StateView,
};
use crate::entities::General;

/// Turn a fact that `requires` promised into a hard error when it is absent.
fn fact<T>(value: Option<T>, constraint: &str, key: RequirementKey) -> Result<T, ConstraintError> {
    value.ok_or_else(|| ConstraintError::MissingFact {
        constraint: constraint.to_string(),
        key,
    })
}

fn actor<'v>(
    view: &'v dyn StateView,
    ctx: &ConstraintContext,
    constraint: &str,
) -> Result<&'v General, ConstraintError> {
    fact(
        view.general(ctx.actor_id),
        constraint,
        RequirementKey::General(ctx.actor_id),
    )
}

fn verdict(ok: bool, reason: impl Into<String>) -> ConstraintOutcome {
    if ok {
        ConstraintOutcome::Allow
    } else {
        ConstraintOutcome::Deny(reason.into())
    }
}

// ============================================================================
// ACTOR
// ============================================================================

pub struct NotNeutral;

impl Constraint for NotNeutral {
    fn name(&self) -> &str {
        "NotNeutral"
    }

    fn requires(&self, ctx: &ConstraintContext) -> Vec<RequirementKey> {
        vec![RequirementKey::General(ctx.actor_id)]
    }

    fn test(
        &self,
        ctx: &ConstraintContext,
        view: &dyn StateView,
    ) -> Result<ConstraintOutcome, ConstraintError> {
        let general = actor(view, ctx, self.name())?;
        Ok(verdict(
            !general.nation_id.is_neutral(),
            "You do not serve any nation.",
        ))
    }
}

pub struct BeChief;

impl Constraint for BeChief {
    fn name(&self) -> &str {
        "BeChief"
    }

    fn requires(&self, ctx: &ConstraintContext) -> Vec<RequirementKey> {
        vec![RequirementKey::General(ctx.actor_id)]
    }

    fn test(
        &self,
        ctx: &ConstraintContext,
        view: &dyn StateView,
    ) -> Result<ConstraintOutcome, ConstraintError> {
        let general = actor(view, ctx, self.name())?;
        Ok(verdict(general.is_chief(), "Only the ruler's court may do this."))
    }
}

/// Actor must hold at least this much gold.
pub struct ReqGeneralGold(pub i64);

impl Constraint for ReqGeneralGold {
    fn name(&self) -> &str {
        "ReqGeneralGold"
    }

    fn requires(&self, ctx: &ConstraintContext) -> Vec<RequirementKey> {
        vec![RequirementKey::General(ctx.actor_id)]
    }

    fn test(
        &self,
        ctx: &ConstraintContext,
        view: &dyn StateView,
    ) -> Result<ConstraintOutcome, ConstraintError> {
        let general = actor(view, ctx, self.name())?;
        Ok(verdict(general.gold >= self.0, "Not enough gold."))
    }
}

pub struct ReqGeneralRice(pub i64);

impl Constraint for ReqGeneralRice {
    fn name(&self) -> &str {
        "ReqGeneralRice"
    }

    fn requires(&self, ctx: &ConstraintContext) -> Vec<RequirementKey> {
        vec![RequirementKey::General(ctx.actor_id)]
    }

    fn test(
        &self,
        ctx: &ConstraintContext,
        view: &dyn StateView,
    ) -> Result<ConstraintOutcome, ConstraintError> {
        let general = actor(view, ctx, self.name())?;
        Ok(verdict(general.rice >= self.0, "Not enough rice."))
    }
}

pub struct ReqGeneralCrew(pub i64);

impl Constraint for ReqGeneralCrew {
    fn name(&self) -> &str {
        "ReqGeneralCrew"
    }

    fn requires(&self, ctx: &ConstraintContext) -> Vec<RequirementKey> {
        vec![RequirementKey::General(ctx.actor_id)]
    }

    fn test(
        &self,
        ctx: &ConstraintContext,
        view: &dyn StateView,
    ) -> Result<ConstraintOutcome, ConstraintError> {
        let general = actor(view, ctx, self.name())?;
        Ok(verdict(general.crew >= self.0, "You have no soldiers."))
    }
}

// ============================================================================
// NATION AND CITY
// ============================================================================

pub struct NotWandering;

impl Constraint for NotWandering {
    fn name(&self) -> &str {
        "NotWandering"
    }

    fn requires(&self, ctx: &ConstraintContext) -> Vec<RequirementKey> {
        vec![RequirementKey::Nation(ctx.nation_id)]
    }

    fn test(
        &self,
        ctx: &ConstraintContext,
        view: &dyn StateView,
    ) -> Result<ConstraintOutcome, ConstraintError> {
        let nation = fact(
            view.nation(ctx.nation_id),
            self.name(),
            RequirementKey::Nation(ctx.nation_id),
        )?;
        Ok(verdict(
            !nation.is_wandering(),
            "Not possible while wandering.",
        ))
    }

    fn fallback_reason(&self) -> String {
        "You do not serve any nation.".to_string()
    }
}

/// Actor stands in a city held by its own nation.
pub struct OccupiedCity;

impl Constraint for OccupiedCity {
    fn name(&self) -> &str {
        "OccupiedCity"
    }

    fn requires(&self, ctx: &ConstraintContext) -> Vec<RequirementKey> {
        vec![
            RequirementKey::General(ctx.actor_id),
            RequirementKey::City(ctx.city_id),
        ]
    }

    fn test(
        &self,
        ctx: &ConstraintContext,
        view: &dyn StateView,
    ) -> Result<ConstraintOutcome, ConstraintError> {
        let general = actor(view, ctx, self.name())?;
        let city = fact(
            view.city(ctx.city_id),
            self.name(),
            RequirementKey::City(ctx.city_id),
        )?;
        Ok(verdict(
            !general.nation_id.is_neutral() && city.nation_id == general.nation_id,
            "This city is not held by your nation.",
        ))
    }
}

pub struct SuppliedCity;

impl Constraint for SuppliedCity {
    fn name(&self) -> &str {
        "SuppliedCity"
    }

    fn requires(&self, ctx: &ConstraintContext) -> Vec<RequirementKey> {
        vec![RequirementKey::City(ctx.city_id)]
    }

    fn test(
        &self,
        ctx: &ConstraintContext,
        view: &dyn StateView,
    ) -> Result<ConstraintOutcome, ConstraintError> {
        let city = fact(
            view.city(ctx.city_id),
            self.name(),
            RequirementKey::City(ctx.city_id),
        )?;
        Ok(verdict(city.supply, "This city is cut off from supply."))
    }
}

// ============================================================================
// DESTINATIONS
// ============================================================================

pub struct ExistsDestGeneral;

impl Constraint for ExistsDestGeneral {
    fn name(&self) -> &str {
        "ExistsDestGeneral"
    }

    fn requires(&self, ctx: &ConstraintContext) -> Vec<RequirementKey> {
        ctx.dest_general_id
            .map(RequirementKey::DestGeneral)
            .into_iter()
            .collect()
    }

    fn test(
        &self,
        ctx: &ConstraintContext,
        _view: &dyn StateView,
    ) -> Result<ConstraintOutcome, ConstraintError> {
        Ok(verdict(
            ctx.dest_general_id.is_some(),
            "No target general was given.",
        ))
    }

    fn fallback_reason(&self) -> String {
        "The target general no longer exists.".to_string()
    }
}

pub struct ExistsDestCity;

impl Constraint for ExistsDestCity {
    fn name(&self) -> &str {
        "ExistsDestCity"
    }

    fn requires(&self, ctx: &ConstraintContext) -> Vec<RequirementKey> {
        ctx.dest_city_id
            .map(RequirementKey::DestCity)
            .into_iter()
            .collect()
    }

    fn test(
        &self,
        ctx: &ConstraintContext,
        _view: &dyn StateView,
    ) -> Result<ConstraintOutcome, ConstraintError> {
        Ok(verdict(ctx.dest_city_id.is_some(), "No target city was given."))
    }

    fn fallback_reason(&self) -> String {
        "The target city does not exist.".to_string()
    }
}

pub struct ExistsDestNation;

impl Constraint for ExistsDestNation {
    fn name(&self) -> &str {
        "ExistsDestNation"
    }

    fn requires(&self, ctx: &ConstraintContext) -> Vec<RequirementKey> {
        ctx.dest_nation_id
            .map(RequirementKey::DestNation)
            .into_iter()
            .collect()
    }

    fn test(
        &self,
        ctx: &ConstraintContext,
        _view: &dyn StateView,
    ) -> Result<ConstraintOutcome, ConstraintError> {
        Ok(verdict(
            ctx.dest_nation_id.is_some(),
            "No target nation was given.",
        ))
    }

    fn fallback_reason(&self) -> String {
        "The target nation has fallen.".to_string()
    }
}

pub struct DifferentDestNation;

impl Constraint for DifferentDestNation {
    fn name(&self) -> &str {
        "DifferentDestNation"
    }

    fn requires(&self, _ctx: &ConstraintContext) -> Vec<RequirementKey> {
        Vec::new()
    }

    fn test(
        &self,
        ctx: &ConstraintContext,
        _view: &dyn StateView,
    ) -> Result<ConstraintOutcome, ConstraintError> {
        Ok(verdict(
            ctx.dest_nation_id != Some(ctx.nation_id),
            "The target is your own nation.",
        ))
    }
}

/// Target general serves the actor's nation.
pub struct FriendlyDestGeneral;

impl Constraint for FriendlyDestGeneral {
    fn name(&self) -> &str {
        "FriendlyDestGeneral"
    }

    fn requires(&self, ctx: &ConstraintContext) -> Vec<RequirementKey> {
        ctx.dest_general_id
            .map(RequirementKey::DestGeneral)
            .into_iter()
            .collect()
    }

    fn test(
        &self,
        ctx: &ConstraintContext,
        view: &dyn StateView,
    ) -> Result<ConstraintOutcome, ConstraintError> {
        let Some(dest_id) = ctx.dest_general_id else {
            return Ok(ConstraintOutcome::Deny("No target general was given.".into()));
        };
        let dest = fact(
            view.dest_general(dest_id),
            self.name(),
            RequirementKey::DestGeneral(dest_id),
        )?;
        Ok(verdict(
            dest.nation_id == ctx.nation_id,
            "The target serves another nation.",
        ))
    }
}

/// No war, declared or fought, between the actor's nation and the target.
pub struct NotAtWarWith;

impl Constraint for NotAtWarWith {
    fn name(&self) -> &str {
        "NotAtWarWith"
    }

    fn requires(&self, ctx: &ConstraintContext) -> Vec<RequirementKey> {
        ctx.dest_nation_id
            .map(|dest| RequirementKey::Diplomacy {
                src: ctx.nation_id,
                dest,
            })
            .into_iter()
            .collect()
    }

    fn test(
        &self,
        ctx: &ConstraintContext,
        view: &dyn StateView,
    ) -> Result<ConstraintOutcome, ConstraintError> {
        let Some(dest) = ctx.dest_nation_id else {
            return Ok(ConstraintOutcome::Deny("No target nation was given.".into()));
        };
        let relation = fact(
            view.diplomacy(ctx.nation_id, dest),
            self.name(),
            RequirementKey::Diplomacy {
                src: ctx.nation_id,
                dest,
            },
        )?;
        Ok(verdict(
            !relation.state.is_hostile(),
            "You are already at war with them.",
        ))
    }
}

// ============================================================================
// ENVIRONMENT AND ARGUMENTS
// ============================================================================

/// A boolean env entry must be true. Absent in min mode reads as allowed.
pub struct EnvFlag {
    pub key: String,
    pub reason: String,
}

impl EnvFlag {
    pub fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl Constraint for EnvFlag {
    fn name(&self) -> &str {
        "EnvFlag"
    }

    fn requires(&self, _ctx: &ConstraintContext) -> Vec<RequirementKey> {
        vec![RequirementKey::Env(self.key.clone())]
    }

    fn test(
        &self,
        _ctx: &ConstraintContext,
        view: &dyn StateView,
    ) -> Result<ConstraintOutcome, ConstraintError> {
        match view.env(&self.key) {
            Some(value) => Ok(verdict(value.as_bool() == Some(true), self.reason.clone())),
            None => Ok(ConstraintOutcome::Unknown {
                missing: vec![RequirementKey::Env(self.key.clone())],
                reason: self.reason.clone(),
            }),
        }
    }

    fn fallback_reason(&self) -> String {
        self.reason.clone()
    }
}

/// Raw argument `key` must be present.
pub struct ReqArg(pub String);

impl Constraint for ReqArg {
    fn name(&self) -> &str {
        "ReqArg"
    }

    fn requires(&self, _ctx: &ConstraintContext) -> Vec<RequirementKey> {
        vec![RequirementKey::Arg(self.0.clone())]
    }

    fn test(
        &self,
        _ctx: &ConstraintContext,
        view: &dyn StateView,
    ) -> Result<ConstraintOutcome, ConstraintError> {
        Ok(verdict(
            view.arg(&self.0).is_some_and(|v| !v.is_null()),
            format!("Missing argument {}.", self.0),
        ))
    }

    fn fallback_reason(&self) -> String {
        format!("Missing argument {}.", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{evaluate_constraints, ConstraintMode, Verdict, WorldStateView};
    use crate::entities::{City, DiplomacyState, Nation};
    use crate::world::{World, WorldRef};
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};
    use warlords_protocol::{CityId, GeneralId, NationId};

    fn world() -> World {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut world = World::new();
        world.insert_nation(Nation::new(NationId(1), "Wei"));
        world.insert_nation(Nation::new(NationId(2), "Shu"));
        world.insert_city(City::new(CityId(1), "Xuchang", NationId(1)));
        world.insert_city(City::new(CityId(2), "Chengdu", NationId(2)));
        let mut cao = General::new(GeneralId(1), "Cao Cao", NationId(1), CityId(1), at);
        cao.officer_level = 12;
        world.insert_general(cao);
        world.insert_general(General::new(GeneralId(2), "Liu Bei", NationId(2), CityId(1), at));
        world.insert_general(General::new(GeneralId(3), "Wanderer", NationId(0), CityId(2), at));
        world
    }

    fn check(
        world: &World,
        actor: GeneralId,
        constraint: Box<dyn Constraint>,
        tweak: impl FnOnce(&mut ConstraintContext),
    ) -> Verdict {
        let general = world.get_general_by_id(actor).unwrap();
        let mut ctx = ConstraintContext::for_general(general, ConstraintMode::Full);
        tweak(&mut ctx);
        let view = WorldStateView::new(world, &ctx.env, &ctx.args);
        evaluate_constraints(&[constraint], &ctx, &view).unwrap()
    }

    fn reason(verdict: Verdict) -> String {
        match verdict {
            Verdict::Deny { reason, .. } => reason,
            Verdict::Allow => String::new(),
        }
    }

    #[test]
    fn actor_constraints() {
        let world = world();
        assert!(check(&world, GeneralId(1), Box::new(NotNeutral), |_| {}).is_allowed());
        assert_eq!(
            reason(check(&world, GeneralId(3), Box::new(NotNeutral), |_| {})),
            "You do not serve any nation."
        );
        assert!(check(&world, GeneralId(1), Box::new(BeChief), |_| {}).is_allowed());
        assert!(!check(&world, GeneralId(2), Box::new(BeChief), |_| {}).is_allowed());
        assert!(check(&world, GeneralId(1), Box::new(ReqGeneralGold(1_000)), |_| {}).is_allowed());
        assert_eq!(
            reason(check(&world, GeneralId(1), Box::new(ReqGeneralGold(1_001)), |_| {})),
            "Not enough gold."
        );
        assert!(!check(&world, GeneralId(1), Box::new(ReqGeneralCrew(1)), |_| {}).is_allowed());
    }

    #[test]
    fn city_constraints() {
        let world = world();
        assert!(check(&world, GeneralId(1), Box::new(OccupiedCity), |_| {}).is_allowed());
        // Liu Bei stands in a Wei city.
        assert!(!check(&world, GeneralId(2), Box::new(OccupiedCity), |_| {}).is_allowed());
        assert!(check(&world, GeneralId(1), Box::new(SuppliedCity), |_| {}).is_allowed());
        // Neutral nation 0 has no record, full mode falls back.
        assert_eq!(
            reason(check(&world, GeneralId(3), Box::new(NotWandering), |_| {})),
            "You do not serve any nation."
        );
    }

    #[test]
    fn destination_constraints() {
        let world = world();
        assert_eq!(
            reason(check(&world, GeneralId(1), Box::new(ExistsDestCity), |ctx| {
                ctx.dest_city_id = Some(CityId(9));
            })),
            "The target city does not exist."
        );
        assert!(
            !check(&world, GeneralId(1), Box::new(ExistsDestCity), |_| {}).is_allowed()
        );
        assert!(check(&world, GeneralId(1), Box::new(ExistsDestNation), |ctx| {
            ctx.dest_nation_id = Some(NationId(2));
        })
        .is_allowed());
        assert!(!check(&world, GeneralId(1), Box::new(DifferentDestNation), |ctx| {
            ctx.dest_nation_id = Some(NationId(1));
        })
        .is_allowed());
        assert!(!check(&world, GeneralId(1), Box::new(FriendlyDestGeneral), |ctx| {
            ctx.dest_general_id = Some(GeneralId(2));
        })
        .is_allowed());
        assert!(check(&world, GeneralId(1), Box::new(ExistsDestGeneral), |ctx| {
            ctx.dest_general_id = Some(GeneralId(2));
        })
        .is_allowed());
    }

    #[test]
    fn war_constraint_reads_diplomacy() {
        let mut world = world();
        assert!(check(&world, GeneralId(1), Box::new(NotAtWarWith), |ctx| {
            ctx.dest_nation_id = Some(NationId(2));
        })
        .is_allowed());

        let mut relation = world.get_diplomacy(NationId(1), NationId(2)).unwrap().clone();
        relation.state = DiplomacyState::War;
        world.insert_diplomacy(relation);
        assert_eq!(
            reason(check(&world, GeneralId(1), Box::new(NotAtWarWith), |ctx| {
                ctx.dest_nation_id = Some(NationId(2));
            })),
            "You are already at war with them."
        );
    }

    #[test]
    fn env_flag_and_args() {
        let world = world();
        let flag = || Box::new(EnvFlag::new("warAllowed", "War is not allowed yet."));
        assert_eq!(
            reason(check(&world, GeneralId(1), flag(), |_| {})),
            "War is not allowed yet."
        );
        assert!(check(&world, GeneralId(1), flag(), |ctx| {
            ctx.env.insert("warAllowed".into(), Value::Bool(true));
        })
        .is_allowed());
        assert!(check(&world, GeneralId(1), flag(), |ctx| {
            ctx.mode = ConstraintMode::Min;
        })
        .is_allowed());

        assert!(check(&world, GeneralId(1), Box::new(ReqArg("amount".into())), |ctx| {
            ctx.args = json!({ "amount": 10 });
        })
        .is_allowed());
        assert!(!check(&world, GeneralId(1), Box::new(ReqArg("amount".into())), |ctx| {
            ctx.args = json!({ "amount": null });
        })
        .is_allowed());
    }
}
