//! Turn processor - drains due generals tick by tick under a budget.

use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use warlords_protocol::{Budget, Checkpoint, GeneralId};

use crate::action::{ActionError, ActionKind, ActionRegistry, Rejection, ResolveOutcome, ScheduleContext};
use crate::calendar::TurnCalendar;
use crate::effect::LogEntry;
use crate::reserved::{ReservedTurn, ReservedTurnStore};
use crate::world::{World, WorldError, WorldRef};

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("general {general} failed resolving {action}: {source}")]
    Action {
        general: GeneralId,
        action: String,
        #[source]
        source: ActionError,
    },
    #[error("commit failed: {0}")]
    World(#[from] WorldError),
}

/// Input for one processor invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessRequest {
    pub target_time: DateTime<Utc>,
    /// Last fully committed tick boundary
    pub last_turn_time: DateTime<Utc>,
    pub checkpoint: Option<Checkpoint>,
    pub budget: Budget,
}

/// A log entry stamped with the game date it happened on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnLog {
    pub year: i32,
    pub month: u8,
    pub general_id: GeneralId,
    pub entry: LogEntry,
}

impl TurnLog {
    pub fn rendered(&self) -> String {
        self.entry.render(self.year, self.month)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProcessOutcome {
    pub last_turn_time: DateTime<Utc>,
    /// Position of the last committed actor inside an unfinished tick
    pub checkpoint: Option<Checkpoint>,
    /// Budget ran out before every due actor was handled
    pub partial: bool,
    pub processed_generals: usize,
    pub completed_ticks: u32,
    pub logs: Vec<TurnLog>,
}

/// Content callbacks around the batch. Every hook defaults to a no-op.
pub trait TurnHooks: Send {
    /// A tick boundary was crossed and committed.
    fn on_tick_boundary(&mut self, _world: &mut World, _tick: DateTime<Utc>, _year: i32, _month: u8) {}

    /// A general's turn (nation slot included) was committed.
    fn after_general(&mut self, _world: &World, _general: GeneralId) {}
}

/// Hooks that do nothing.
pub struct NoHooks;

impl TurnHooks for NoHooks {}

pub struct TurnProcessor {
    registry: ActionRegistry,
    calendar: TurnCalendar,
    env: Map<String, Value>,
    hooks: Box<dyn TurnHooks>,
}

impl TurnProcessor {
    pub fn new(registry: ActionRegistry, calendar: TurnCalendar) -> Self {
        Self {
            registry,
            calendar,
            env: Map::new(),
            hooks: Box::new(NoHooks),
        }
    }

    pub fn with_env(mut self, env: Map<String, Value>) -> Self {
        self.env = env;
        self
    }

    pub fn with_hooks(mut self, hooks: impl TurnHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn calendar(&self) -> &TurnCalendar {
        &self.calendar
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Resolve every general due up to `request.target_time`.
    ///
    /// Generals run strictly one after another in `(turn_time, id)` order so
    /// each sees the commits of those before it. Budget limits are checked
    /// between generals only.
    pub fn process(
        &mut self,
        world: &mut World,
        reserved: &mut dyn ReservedTurnStore,
        request: &ProcessRequest,
    ) -> Result<ProcessOutcome, ProcessorError> {
        let started = Instant::now();
        let time_budget = StdDuration::from_millis(request.budget.budget_ms);
        let target = request.target_time;

        let mut outcome = ProcessOutcome {
            last_turn_time: request.last_turn_time,
            checkpoint: request.checkpoint.clone(),
            partial: false,
            processed_generals: 0,
            completed_ticks: 0,
            logs: Vec::new(),
        };

        'ticks: loop {
            let boundary = self.calendar.next_tick(outcome.last_turn_time);
            let (year, month) = self.calendar.year_month(outcome.last_turn_time);

            let queue: Vec<(DateTime<Utc>, GeneralId)> = world
                .due_generals(boundary)
                .into_iter()
                .filter(|(due, id)| {
                    *due <= target
                        && !outcome
                            .checkpoint
                            .as_ref()
                            .is_some_and(|cp| cp.covers(*due, *id))
                })
                .collect();

            for (due, id) in queue {
                // At least one general per call, whatever the clock says.
                if outcome.processed_generals >= request.budget.max_generals
                    || (outcome.processed_generals > 0 && started.elapsed() >= time_budget)
                {
                    outcome.partial = true;
                    break 'ticks;
                }

                let schedule = ScheduleContext {
                    turn_time: due,
                    year,
                    month,
                    env: self.env.clone(),
                };
                self.run_general(world, reserved, id, &schedule, &mut outcome.logs)?;
                outcome.processed_generals += 1;
                outcome.checkpoint = Some(Checkpoint {
                    turn_time: due,
                    general_id: id,
                    year,
                    month,
                });
            }

            if boundary > target {
                break;
            }

            outcome.last_turn_time = boundary;
            outcome.completed_ticks += 1;
            outcome.checkpoint = None;
            let (year, month) = self.calendar.year_month(boundary);
            self.hooks.on_tick_boundary(world, boundary, year, month);
            tracing::info!(tick = %boundary, year, month, "Tick committed");

            if boundary == target {
                break;
            }
            if outcome.completed_ticks >= request.budget.catch_up_cap.max(1) {
                let next_tick = self.calendar.next_tick(boundary);
                let actor_waiting = world
                    .next_actor_turn_time()
                    .is_some_and(|due| due <= target);
                outcome.partial = next_tick <= target || actor_waiting;
                break;
            }
        }

        Ok(outcome)
    }

    fn run_general(
        &mut self,
        world: &mut World,
        reserved: &mut dyn ReservedTurnStore,
        id: GeneralId,
        schedule: &ScheduleContext,
        logs: &mut Vec<TurnLog>,
    ) -> Result<(), ProcessorError> {
        let Some(general) = world.get_general_by_id(id) else {
            return Ok(());
        };
        let nation_id = general.nation_id;
        let chief = general.is_chief() && world.get_nation_by_id(nation_id).is_some();

        if chief {
            let turn = reserved.pop_nation_turn(nation_id);
            self.run_turn(world, ActionKind::Nation, &turn, id, schedule, logs)?;
        }
        let turn = reserved.pop_general_turn(id);
        self.run_turn(world, ActionKind::General, &turn, id, schedule, logs)?;

        let term = self.calendar.term();
        if let Some(general) = world.general_mut(id) {
            general.turn_time = schedule.turn_time + term;
        }
        self.hooks.after_general(world, id);
        Ok(())
    }

    fn run_turn(
        &self,
        world: &mut World,
        kind: ActionKind,
        turn: &ReservedTurn,
        id: GeneralId,
        schedule: &ScheduleContext,
        logs: &mut Vec<TurnLog>,
    ) -> Result<(), ProcessorError> {
        if !self.registry.contains(kind, &turn.action) {
            tracing::warn!(general_id = %id, action = %turn.action, ?kind, "Unknown reserved action, resting");
        }

        let outcome = self
            .registry
            .resolve(kind, &turn.action, &*world, id, schedule, &turn.args)
            .map_err(|source| ProcessorError::Action {
                general: id,
                action: turn.action.clone(),
                source,
            })?;

        let stamp = |entry: LogEntry| TurnLog {
            year: schedule.year,
            month: schedule.month,
            general_id: id,
            entry,
        };

        match outcome {
            ResolveOutcome::Resolved(resolution) => {
                let entries = world.commit(resolution)?;
                tracing::debug!(general_id = %id, action = %turn.action, logs = entries.len(), "Resolved");
                logs.extend(entries.into_iter().map(stamp));
            }
            ResolveOutcome::Rejected(Rejection::MissingReference) => {
                tracing::debug!(general_id = %id, action = %turn.action, "Target gone, skipped");
            }
            ResolveOutcome::Rejected(rejection) => {
                tracing::warn!(general_id = %id, action = %turn.action, %rejection, "Reserved action rejected");
                logs.push(stamp(LogEntry::general_action(
                    id,
                    format!("Could not carry out {}: {rejection}", turn.action),
                )));
            }
        }
        Ok(())
    }
}
