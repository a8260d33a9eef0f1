//! Envelopes for the inbound command log and the outbound event log.
//!
//! Both logs are newline-delimited JSON. One envelope per line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Checkpoint, CommandResult, TurnDaemonCommand};

/// Inbound envelope. `requestId` is required; anything else is dropped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    pub request_id: String,
    pub sent_at: DateTime<Utc>,
    pub command: TurnDaemonCommand,
}

impl CommandEnvelope {
    pub fn new(request_id: impl Into<String>, command: TurnDaemonCommand) -> Self {
        Self {
            request_id: request_id.into(),
            sent_at: Utc::now(),
            command,
        }
    }

    /// Request id used to correlate the reply. A `getStatus` carrying its own
    /// id wins over the envelope's.
    pub fn reply_id(&self) -> &str {
        match &self.command {
            TurnDaemonCommand::GetStatus {
                request_id: Some(id),
            } => id,
            _ => &self.request_id,
        }
    }
}

/// Outbound envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub event: DaemonEvent,
}

impl EventEnvelope {
    pub fn new(request_id: Option<String>, event: DaemonEvent) -> Self {
        Self {
            request_id,
            sent_at: Utc::now(),
            event,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DaemonEvent {
    Status { status: DaemonStatus },
    CommandResult { result: CommandResult },
}

/// Top-level state of the scheduling loop
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoopState {
    #[default]
    Idle,
    Waiting,
    Running,
    Paused,
    Stopped,
}

/// Snapshot of the daemon answered to `getStatus`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonStatus {
    pub profile: String,
    pub state: LoopState,
    pub paused: bool,
    pub last_turn_time: DateTime<Utc>,
    pub year: i32,
    pub month: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<Checkpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_batch: Option<BatchSummary>,
    #[serde(default)]
    pub pending_mutations: usize,
}

/// What the most recent processor invocation did.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub target_time: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub processed_generals: usize,
    pub completed_ticks: u32,
    pub partial: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("empty envelope")]
    Empty,

    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode one inbound line.
pub fn decode_command(line: &str) -> Result<CommandEnvelope, DecodeError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(serde_json::from_str(line)?)
}

/// Decode one outbound line.
pub fn decode_event(line: &str) -> Result<EventEnvelope, DecodeError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(serde_json::from_str(line)?)
}

pub fn encode_command(envelope: &CommandEnvelope) -> Result<String, serde_json::Error> {
    serde_json::to_string(envelope)
}

pub fn encode_event(envelope: &EventEnvelope) -> Result<String, serde_json::Error> {
    serde_json::to_string(envelope)
}
