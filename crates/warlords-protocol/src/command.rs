//! Commands accepted by the turn daemon.

use serde::{Deserialize, Serialize};

use crate::{GeneralId, TroopId};

/// Control command carried by the inbound log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TurnDaemonCommand {
    /// Force an immediate cycle regardless of the computed deadline
    Run,
    /// Suspend scheduling until `Resume`
    Pause,
    Resume,
    /// Leave the loop at the next suspension point
    Shutdown,
    /// Reply with the current status over the event log
    #[serde(rename_all = "camelCase")]
    GetStatus {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    TroopJoin {
        general_id: GeneralId,
        troop_id: TroopId,
    },
    #[serde(rename_all = "camelCase")]
    TroopExit { general_id: GeneralId },
}

impl TurnDaemonCommand {
    /// Wire name of the command type
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Shutdown => "shutdown",
            Self::GetStatus { .. } => "getStatus",
            Self::TroopJoin { .. } => "troopJoin",
            Self::TroopExit { .. } => "troopExit",
        }
    }

    /// World mutations applied out-of-band before the next batch
    pub fn is_world_mutation(&self) -> bool {
        matches!(self, Self::TroopJoin { .. } | Self::TroopExit { .. })
    }
}

/// Outcome of a command, published back on the event log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub command: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CommandResult {
    pub fn accepted(command: &TurnDaemonCommand) -> Self {
        Self {
            command: command.kind().to_string(),
            ok: true,
            detail: None,
        }
    }

    pub fn failed(command: &TurnDaemonCommand, detail: impl Into<String>) -> Self {
        Self {
            command: command.kind().to_string(),
            ok: false,
            detail: Some(detail.into()),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
