use std::collections::HashMap;

use serde_json::{Map, Value};

use warlords_protocol::GeneralId;

use super::{resolve_action, ActionDefinition, ActionError, ResolveOutcome, ScheduleContext};
use crate::actions::{DeclareWar, Donate, Move, Rest, Train};
use crate::constraint::{
    evaluate_constraints, ConstraintContext, ConstraintMode, WorldStateView,
};
use crate::reserved::REST_ACTION;
use crate::world::WorldRef;

/// Which reserved-turn table an action is drawn from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    General,
    Nation,
}

/// Object-safe face of [`ActionDefinition`], so definitions with different
/// argument types share one map.
trait ErasedAction: Send + Sync {
    fn key(&self) -> &'static str;

    fn resolve(
        &self,
        world: &dyn WorldRef,
        actor: GeneralId,
        schedule: &ScheduleContext,
        raw: &Value,
    ) -> Result<ResolveOutcome, ActionError>;

    fn is_available(
        &self,
        world: &dyn WorldRef,
        actor: GeneralId,
        env: &Map<String, Value>,
    ) -> Result<bool, ActionError>;
}

impl<D: ActionDefinition> ErasedAction for D {
    fn key(&self) -> &'static str {
        ActionDefinition::key(self)
    }

    fn resolve(
        &self,
        world: &dyn WorldRef,
        actor: GeneralId,
        schedule: &ScheduleContext,
        raw: &Value,
    ) -> Result<ResolveOutcome, ActionError> {
        resolve_action(self, world, actor, schedule, raw)
    }

    fn is_available(
        &self,
        world: &dyn WorldRef,
        actor: GeneralId,
        env: &Map<String, Value>,
    ) -> Result<bool, ActionError> {
        let Some(general) = world.get_general_by_id(actor) else {
            return Ok(false);
        };
        let ctx = ConstraintContext::for_general(general, ConstraintMode::Min).with_env(env.clone());
        let constraints = self.build_min_constraints(&ctx);
        let view = WorldStateView::new(world, &ctx.env, &ctx.args);
        Ok(evaluate_constraints(&constraints, &ctx, &view)?.is_allowed())
    }
}

/// Action modules keyed by name, built once at startup.
pub struct ActionRegistry {
    general: HashMap<&'static str, Box<dyn ErasedAction>>,
    nation: HashMap<&'static str, Box<dyn ErasedAction>>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRegistry {
    /// Empty registry holding only the rest action in both tables.
    pub fn new() -> Self {
        let mut registry = Self {
            general: HashMap::new(),
            nation: HashMap::new(),
        };
        registry.register(ActionKind::General, Rest);
        registry.register(ActionKind::Nation, Rest);
        registry
    }

    /// Registry with every built-in action.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(ActionKind::General, Train);
        registry.register(ActionKind::General, Donate);
        registry.register(ActionKind::General, Move);
        registry.register(ActionKind::Nation, DeclareWar);
        registry
    }

    pub fn register<D: ActionDefinition + 'static>(&mut self, kind: ActionKind, definition: D) {
        let key = ActionDefinition::key(&definition);
        self.table_mut(kind).insert(key, Box::new(definition));
    }

    pub fn contains(&self, kind: ActionKind, key: &str) -> bool {
        self.table(kind).contains_key(key)
    }

    pub fn keys(&self, kind: ActionKind) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.table(kind).keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Resolve `key` for `actor`; unknown keys run the rest action.
    pub fn resolve(
        &self,
        kind: ActionKind,
        key: &str,
        world: &dyn WorldRef,
        actor: GeneralId,
        schedule: &ScheduleContext,
        raw: &Value,
    ) -> Result<ResolveOutcome, ActionError> {
        self.lookup(kind, key).resolve(world, actor, schedule, raw)
    }

    /// Min-mode check: is `key` plausibly available to `actor` right now.
    pub fn min_availability(
        &self,
        kind: ActionKind,
        key: &str,
        world: &dyn WorldRef,
        actor: GeneralId,
        env: &Map<String, Value>,
    ) -> Result<bool, ActionError> {
        match self.table(kind).get(key) {
            Some(action) => action.is_available(world, actor, env),
            None => Ok(false),
        }
    }

    fn lookup(&self, kind: ActionKind, key: &str) -> &dyn ErasedAction {
        let table = self.table(kind);
        match table.get(key).or_else(|| table.get(REST_ACTION)) {
            Some(action) => action.as_ref(),
            None => &Rest,
        }
    }

    fn table(&self, kind: ActionKind) -> &HashMap<&'static str, Box<dyn ErasedAction>> {
        match kind {
            ActionKind::General => &self.general,
            ActionKind::Nation => &self.nation,
        }
    }

    fn table_mut(&mut self, kind: ActionKind) -> &mut HashMap<&'static str, Box<dyn ErasedAction>> {
        match kind {
            ActionKind::General => &mut self.general,
            ActionKind::Nation => &mut self.nation,
        }
    }
}
