//! Warlords Core - turn resolution engine.
//!
//! This crate holds the single-writer world model, the lazy constraint
//! evaluator, the action resolution pipeline and the turn processor that
//! drains due generals under a budget. Everything here is synchronous; the
//! daemon crate owns scheduling and I/O.

pub mod action;
pub mod actions;
pub mod calendar;
pub mod constraint;
pub mod effect;
pub mod entities;
pub mod processor;
pub mod reserved;
pub mod world;

pub use action::{
    resolve_action, ActionContext, ActionDefinition, ActionError, ActionKind, ActionOutput,
    ActionRegistry, ActionTarget, Rejection, Resolution, ResolveOutcome, ScheduleContext,
};
pub use calendar::{compute_run_deadline, get_next_tick_time, TurnCalendar};
pub use constraint::{
    evaluate_constraints, Constraint, ConstraintContext, ConstraintError, ConstraintMode,
    ConstraintOutcome, Fact, RequirementKey, StateView, Verdict, WorldStateView,
};
pub use effect::{
    CityPatch, DiplomacyPatch, Effect, GeneralPatch, LogCategory, LogEntry, LogFormat, LogScope,
    NationPatch, NewEntity,
};
pub use entities::{City, Diplomacy, DiplomacyState, General, Nation, TriggerState, Troop};
pub use processor::{
    NoHooks, ProcessOutcome, ProcessRequest, ProcessorError, TurnHooks, TurnLog, TurnProcessor,
};
pub use reserved::{ReservedTurn, ReservedTurnError, ReservedTurnStore, ReservedTurns};
pub use world::{World, WorldError, WorldRef};

pub use warlords_protocol::{Budget, Checkpoint, CityId, GeneralId, NationId, TroopId};
