//! Warlords Protocol - shared ids and control-channel wire types.
//!
//! Everything that crosses a process boundary lives here: entity ids, the
//! batch checkpoint, processor budgets, daemon commands and the envelopes
//! they travel in. No I/O happens in this crate.

pub mod command;
pub mod envelope;
pub mod ids;
pub mod schedule;

pub use command::{CommandResult, TurnDaemonCommand};
pub use envelope::{
    decode_command, decode_event, encode_command, encode_event, BatchSummary, CommandEnvelope,
    DaemonEvent, DaemonStatus, DecodeError, EventEnvelope, LoopState,
};
pub use ids::{CityId, GeneralId, NationId, TroopId};
pub use schedule::{Budget, Checkpoint};
