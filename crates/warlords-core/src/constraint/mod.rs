//! Lazy constraint evaluation.
//!
//! A constraint declares the facts it needs as [`RequirementKey`]s and reads
//! them through a [`StateView`]; the caller never assembles a denormalized
//! context up front. Evaluation runs in declaration order and stops at the
//! first denial.

mod builtin;
mod view;

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use warlords_protocol::{CityId, GeneralId, NationId};

use crate::entities::{City, Diplomacy, General, Nation};

pub use builtin::{
    BeChief, DifferentDestNation, EnvFlag, ExistsDestCity, ExistsDestGeneral, ExistsDestNation,
    FriendlyDestGeneral, NotAtWarWith, NotNeutral, NotWandering, OccupiedCity, ReqArg,
    ReqGeneralCrew, ReqGeneralGold, ReqGeneralRice, SuppliedCity,
};
pub use view::WorldStateView;

// ============================================================================
// KEYS AND FACTS
// ============================================================================

/// Identifies one fact a constraint depends on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RequirementKey {
    General(GeneralId),
    City(CityId),
    Nation(NationId),
    DestGeneral(GeneralId),
    DestNation(NationId),
    DestCity(CityId),
    Diplomacy { src: NationId, dest: NationId },
    DiplomacyList,
    GeneralList,
    NationList,
    Env(String),
    Arg(String),
}

impl fmt::Display for RequirementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::General(id) => write!(f, "general({id})"),
            Self::City(id) => write!(f, "city({id})"),
            Self::Nation(id) => write!(f, "nation({id})"),
            Self::DestGeneral(id) => write!(f, "destGeneral({id})"),
            Self::DestNation(id) => write!(f, "destNation({id})"),
            Self::DestCity(id) => write!(f, "destCity({id})"),
            Self::Diplomacy { src, dest } => write!(f, "diplomacy({src},{dest})"),
            Self::DiplomacyList => f.write_str("diplomacyList"),
            Self::GeneralList => f.write_str("generalList"),
            Self::NationList => f.write_str("nationList"),
            Self::Env(key) => write!(f, "env({key})"),
            Self::Arg(key) => write!(f, "arg({key})"),
        }
    }
}

/// A resolved fact, borrowed from wherever the view keeps it.
#[derive(Clone, Debug)]
pub enum Fact<'a> {
    General(&'a General),
    City(&'a City),
    Nation(&'a Nation),
    Diplomacy(&'a Diplomacy),
    Generals(Vec<&'a General>),
    Nations(Vec<&'a Nation>),
    DiplomacyList(Vec<&'a Diplomacy>),
    Value(&'a Value),
}

/// Fact provider the evaluator queries; live world, snapshot or fixture.
pub trait StateView {
    fn get(&self, key: &RequirementKey) -> Option<Fact<'_>>;

    fn has(&self, key: &RequirementKey) -> bool {
        self.get(key).is_some()
    }

    fn general(&self, id: GeneralId) -> Option<&General> {
        match self.get(&RequirementKey::General(id)) {
            Some(Fact::General(general)) => Some(general),
            _ => None,
        }
    }

    fn city(&self, id: CityId) -> Option<&City> {
        match self.get(&RequirementKey::City(id)) {
            Some(Fact::City(city)) => Some(city),
            _ => None,
        }
    }

    fn nation(&self, id: NationId) -> Option<&Nation> {
        match self.get(&RequirementKey::Nation(id)) {
            Some(Fact::Nation(nation)) => Some(nation),
            _ => None,
        }
    }

    fn dest_general(&self, id: GeneralId) -> Option<&General> {
        match self.get(&RequirementKey::DestGeneral(id)) {
            Some(Fact::General(general)) => Some(general),
            _ => None,
        }
    }

    fn dest_city(&self, id: CityId) -> Option<&City> {
        match self.get(&RequirementKey::DestCity(id)) {
            Some(Fact::City(city)) => Some(city),
            _ => None,
        }
    }

    fn dest_nation(&self, id: NationId) -> Option<&Nation> {
        match self.get(&RequirementKey::DestNation(id)) {
            Some(Fact::Nation(nation)) => Some(nation),
            _ => None,
        }
    }

    fn diplomacy(&self, src: NationId, dest: NationId) -> Option<&Diplomacy> {
        match self.get(&RequirementKey::Diplomacy { src, dest }) {
            Some(Fact::Diplomacy(diplomacy)) => Some(diplomacy),
            _ => None,
        }
    }

    fn env(&self, key: &str) -> Option<&Value> {
        match self.get(&RequirementKey::Env(key.to_string())) {
            Some(Fact::Value(value)) => Some(value),
            _ => None,
        }
    }

    fn arg(&self, key: &str) -> Option<&Value> {
        match self.get(&RequirementKey::Arg(key.to_string())) {
            Some(Fact::Value(value)) => Some(value),
            _ => None,
        }
    }
}

// ============================================================================
// CONTEXT AND OUTCOMES
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConstraintMode {
    /// Cheap availability check for listings; missing facts are optimistic
    Min,
    /// Check right before resolving; missing facts deny
    #[default]
    Full,
}

/// Who is acting and against what. Built once per resolution attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintContext {
    pub actor_id: GeneralId,
    pub city_id: CityId,
    pub nation_id: NationId,
    pub dest_nation_id: Option<NationId>,
    pub dest_general_id: Option<GeneralId>,
    pub dest_city_id: Option<CityId>,
    pub args: Value,
    pub env: Map<String, Value>,
    pub mode: ConstraintMode,
}

impl ConstraintContext {
    pub fn for_general(general: &General, mode: ConstraintMode) -> Self {
        Self {
            actor_id: general.id,
            city_id: general.city_id,
            nation_id: general.nation_id,
            dest_nation_id: None,
            dest_general_id: None,
            dest_city_id: None,
            args: Value::Null,
            env: Map::new(),
            mode,
        }
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    pub fn with_env(mut self, env: Map<String, Value>) -> Self {
        self.env = env;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConstraintOutcome {
    Allow,
    Deny(String),
    /// Optional data was not available
    Unknown {
        missing: Vec<RequirementKey>,
        reason: String,
    },
}

/// Final result of a constraint list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny { constraint: String, reason: String },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// A constraint that could not be evaluated. Always a content bug.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConstraintError {
    #[error("constraint {constraint} read undeclared or absent fact {key}")]
    MissingFact {
        constraint: String,
        key: RequirementKey,
    },
    #[error("constraint {constraint} failed: {message}")]
    Failed { constraint: String, message: String },
}

/// A named precondition with lazily fetched dependencies.
pub trait Constraint {
    fn name(&self) -> &str;

    /// Facts `test` will read. Consulted before `test` runs.
    fn requires(&self, ctx: &ConstraintContext) -> Vec<RequirementKey>;

    fn test(
        &self,
        ctx: &ConstraintContext,
        view: &dyn StateView,
    ) -> Result<ConstraintOutcome, ConstraintError>;

    /// Denial reason used when a required fact cannot be resolved in full mode.
    fn fallback_reason(&self) -> String {
        format!("{}: required information is unavailable", self.name())
    }
}

/// Run `constraints` in order and return the first denial.
///
/// Under [`ConstraintMode::Full`] an unresolvable requirement or an
/// `Unknown` outcome denies; under [`ConstraintMode::Min`] both are treated
/// as allowed. Errors from `test` propagate untouched.
pub fn evaluate_constraints(
    constraints: &[Box<dyn Constraint>],
    ctx: &ConstraintContext,
    view: &dyn StateView,
) -> Result<Verdict, ConstraintError> {
    for constraint in constraints {
        let unresolved = constraint
            .requires(ctx)
            .into_iter()
            .any(|key| !view.has(&key));
        if unresolved {
            match ctx.mode {
                ConstraintMode::Full => {
                    return Ok(Verdict::Deny {
                        constraint: constraint.name().to_string(),
                        reason: constraint.fallback_reason(),
                    })
                }
                ConstraintMode::Min => continue,
            }
        }

        match constraint.test(ctx, view)? {
            ConstraintOutcome::Allow => {}
            ConstraintOutcome::Deny(reason) => {
                return Ok(Verdict::Deny {
                    constraint: constraint.name().to_string(),
                    reason,
                })
            }
            ConstraintOutcome::Unknown { missing, reason } => match ctx.mode {
                ConstraintMode::Full => {
                    tracing::debug!(
                        constraint = constraint.name(),
                        missing = missing.len(),
                        "Unknown outcome denies in full mode"
                    );
                    return Ok(Verdict::Deny {
                        constraint: constraint.name().to_string(),
                        reason,
                    });
                }
                ConstraintMode::Min => {}
            },
        }
    }
    Ok(Verdict::Allow)
}
