//! Reserved turns: per-general and per-nation queues of planned actions.
//!
//! The API tier writes slots; the processor pops slot 0 when the owner
//! becomes due. Queues always hold exactly their table's slot count.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use warlords_protocol::{GeneralId, NationId};

pub const GENERAL_TURN_SLOTS: usize = 30;
pub const NATION_TURN_SLOTS: usize = 12;
pub const REST_ACTION: &str = "rest";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReservedTurnError {
    #[error("slot {slot} is outside a queue of {len}")]
    SlotOutOfRange { slot: usize, len: usize },
    #[error("action key is empty")]
    EmptyAction,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReservedTurn {
    pub action: String,
    #[serde(default)]
    pub args: Value,
}

impl ReservedTurn {
    pub fn new(action: impl Into<String>, args: Value) -> Self {
        Self {
            action: action.into(),
            args,
        }
    }

    pub fn rest() -> Self {
        Self::new(REST_ACTION, Value::Null)
    }

    pub fn is_rest(&self) -> bool {
        self.action == REST_ACTION
    }
}

impl Default for ReservedTurn {
    fn default() -> Self {
        Self::rest()
    }
}

/// Storage for reserved turns, read by the processor and written by the API tier.
pub trait ReservedTurnStore {
    /// Full-length queue; a general without entries reads as all rest.
    fn general_turns(&self, general: GeneralId) -> Vec<ReservedTurn>;

    fn set_general_turn(
        &mut self,
        general: GeneralId,
        slot: usize,
        turn: ReservedTurn,
    ) -> Result<(), ReservedTurnError>;

    /// Positive `amount` pushes rest in at the front; negative pulls slots forward.
    fn shift_general_turns(&mut self, general: GeneralId, amount: i32);

    /// Take slot 0, refilling the back with rest.
    fn pop_general_turn(&mut self, general: GeneralId) -> ReservedTurn;

    fn nation_turns(&self, nation: NationId) -> Vec<ReservedTurn>;

    fn set_nation_turn(
        &mut self,
        nation: NationId,
        slot: usize,
        turn: ReservedTurn,
    ) -> Result<(), ReservedTurnError>;

    fn shift_nation_turns(&mut self, nation: NationId, amount: i32);

    fn pop_nation_turn(&mut self, nation: NationId) -> ReservedTurn;
}

/// Fixed-length queue of turns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
struct TurnQueue(VecDeque<ReservedTurn>);

impl TurnQueue {
    fn filled(len: usize) -> Self {
        Self((0..len).map(|_| ReservedTurn::rest()).collect())
    }

    fn normalize(&mut self, len: usize) {
        self.0.resize_with(len, ReservedTurn::rest);
    }

    fn set(&mut self, slot: usize, turn: ReservedTurn) -> Result<(), ReservedTurnError> {
        if turn.action.trim().is_empty() {
            return Err(ReservedTurnError::EmptyAction);
        }
        let len = self.0.len();
        let target = self
            .0
            .get_mut(slot)
            .ok_or(ReservedTurnError::SlotOutOfRange { slot, len })?;
        *target = turn;
        Ok(())
    }

    fn shift(&mut self, amount: i32) {
        let len = self.0.len();
        let steps = (amount.unsigned_abs() as usize).min(len);
        for _ in 0..steps {
            if amount > 0 {
                self.0.pop_back();
                self.0.push_front(ReservedTurn::rest());
            } else {
                self.0.pop_front();
                self.0.push_back(ReservedTurn::rest());
            }
        }
    }

    fn pop(&mut self) -> ReservedTurn {
        let turn = self.0.pop_front().unwrap_or_default();
        self.0.push_back(ReservedTurn::rest());
        turn
    }
}

/// In-memory store, persisted as part of the daemon's shard snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReservedTurns {
    general: BTreeMap<GeneralId, TurnQueue>,
    nation: BTreeMap<NationId, TurnQueue>,
}

impl ReservedTurns {
    pub fn new() -> Self {
        Self::default()
    }

    fn general_queue(&mut self, general: GeneralId) -> &mut TurnQueue {
        let queue = self
            .general
            .entry(general)
            .or_insert_with(|| TurnQueue::filled(GENERAL_TURN_SLOTS));
        queue.normalize(GENERAL_TURN_SLOTS);
        queue
    }

    fn nation_queue(&mut self, nation: NationId) -> &mut TurnQueue {
        let queue = self
            .nation
            .entry(nation)
            .or_insert_with(|| TurnQueue::filled(NATION_TURN_SLOTS));
        queue.normalize(NATION_TURN_SLOTS);
        queue
    }
}

fn snapshot(queue: Option<&TurnQueue>, len: usize) -> Vec<ReservedTurn> {
    let mut turns: Vec<ReservedTurn> = queue.map(|q| q.0.iter().cloned().collect()).unwrap_or_default();
    turns.resize_with(len, ReservedTurn::rest);
    turns
}

impl ReservedTurnStore for ReservedTurns {
    fn general_turns(&self, general: GeneralId) -> Vec<ReservedTurn> {
        snapshot(self.general.get(&general), GENERAL_TURN_SLOTS)
    }

    fn set_general_turn(
        &mut self,
        general: GeneralId,
        slot: usize,
        turn: ReservedTurn,
    ) -> Result<(), ReservedTurnError> {
        self.general_queue(general).set(slot, turn)
    }

    fn shift_general_turns(&mut self, general: GeneralId, amount: i32) {
        self.general_queue(general).shift(amount);
    }

    fn pop_general_turn(&mut self, general: GeneralId) -> ReservedTurn {
        match self.general.get_mut(&general) {
            Some(queue) => {
                queue.normalize(GENERAL_TURN_SLOTS);
                queue.pop()
            }
            None => ReservedTurn::rest(),
        }
    }

    fn nation_turns(&self, nation: NationId) -> Vec<ReservedTurn> {
        snapshot(self.nation.get(&nation), NATION_TURN_SLOTS)
    }

    fn set_nation_turn(
        &mut self,
        nation: NationId,
        slot: usize,
        turn: ReservedTurn,
    ) -> Result<(), ReservedTurnError> {
        self.nation_queue(nation).set(slot, turn)
    }

    fn shift_nation_turns(&mut self, nation: NationId, amount: i32) {
        self.nation_queue(nation).shift(amount);
    }

    fn pop_nation_turn(&mut self, nation: NationId) -> ReservedTurn {
        match self.nation.get_mut(&nation) {
            Some(queue) => {
                queue.normalize(NATION_TURN_SLOTS);
                queue.pop()
            }
            None => ReservedTurn::rest(),
        }
    }
}
