//! Durable state owned by the scheduling loop.
//!
//! The loop itself only needs `{last_turn_time, checkpoint}`. The file store
//! also keeps a snapshot of the shard (world + reserved turns) and an
//! append-only history of turn logs.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use warlords_core::{ReservedTurns, TurnLog, World};
use warlords_protocol::Checkpoint;

#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("state file {path} is corrupt: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The pair persisted after every batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnState {
    #[serde(default)]
    pub last_turn_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub checkpoint: Option<Checkpoint>,
}

/// Everything the daemon mutates, as persisted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Shard {
    pub world: World,
    pub reserved: ReservedTurns,
}

#[derive(Serialize)]
struct ShardRef<'a> {
    world: &'a World,
    reserved: &'a ReservedTurns,
}

pub trait TurnStateStore: Send {
    fn load_last_turn_time(&self) -> Result<Option<DateTime<Utc>>, StateStoreError>;

    fn save_last_turn_time(&mut self, at: DateTime<Utc>) -> Result<(), StateStoreError>;

    fn load_checkpoint(&self) -> Result<Option<Checkpoint>, StateStoreError>;

    /// `None` clears the checkpoint.
    fn save_checkpoint(&mut self, checkpoint: Option<&Checkpoint>) -> Result<(), StateStoreError>;

    /// Persist both halves of the resume point.
    fn save_progress(
        &mut self,
        last_turn_time: DateTime<Utc>,
        checkpoint: Option<&Checkpoint>,
    ) -> Result<(), StateStoreError> {
        self.save_last_turn_time(last_turn_time)?;
        self.save_checkpoint(checkpoint)
    }

    /// Snapshot hook, called before `save_progress`.
    fn save_world(
        &mut self,
        _world: &World,
        _reserved: &ReservedTurns,
    ) -> Result<(), StateStoreError> {
        Ok(())
    }

    fn load_world(&self) -> Result<Option<Shard>, StateStoreError> {
        Ok(None)
    }

    fn append_history(&mut self, _logs: &[TurnLog]) -> Result<(), StateStoreError> {
        Ok(())
    }
}

/// JSON files under the state directory, keyed by profile.
pub struct FileStateStore {
    turn_state_path: PathBuf,
    shard_path: PathBuf,
    history_path: PathBuf,
    state: TurnState,
}

impl FileStateStore {
    pub fn open(state_dir: &Path, profile: &str) -> Result<Self, StateStoreError> {
        std::fs::create_dir_all(state_dir).map_err(|source| StateStoreError::Io {
            path: state_dir.to_path_buf(),
            source,
        })?;
        let turn_state_path = state_dir.join(format!("{profile}.turn_state.json"));
        let state = read_json(&turn_state_path)?.unwrap_or_default();
        Ok(Self {
            turn_state_path,
            shard_path: state_dir.join(format!("{profile}.shard.json")),
            history_path: state_dir.join(format!("{profile}.history.jsonl")),
            state,
        })
    }

    pub fn turn_state(&self) -> &TurnState {
        &self.state
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    fn flush(&self) -> Result<(), StateStoreError> {
        write_json_atomic(&self.turn_state_path, &self.state)
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, StateStoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StateStoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| StateStoreError::Json {
            path: path.to_path_buf(),
            source,
        })
}

/// Write to a sibling temp file, then rename over the target.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StateStoreError> {
    let json = serde_json::to_vec_pretty(value).map_err(|source| StateStoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    let io_err = |source| StateStoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    std::fs::write(&tmp, json).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)
}

impl TurnStateStore for FileStateStore {
    fn load_last_turn_time(&self) -> Result<Option<DateTime<Utc>>, StateStoreError> {
        Ok(self.state.last_turn_time)
    }

    fn save_last_turn_time(&mut self, at: DateTime<Utc>) -> Result<(), StateStoreError> {
        self.state.last_turn_time = Some(at);
        self.flush()
    }

    fn load_checkpoint(&self) -> Result<Option<Checkpoint>, StateStoreError> {
        Ok(self.state.checkpoint.clone())
    }

    fn save_checkpoint(&mut self, checkpoint: Option<&Checkpoint>) -> Result<(), StateStoreError> {
        self.state.checkpoint = checkpoint.cloned();
        self.flush()
    }

    fn save_progress(
        &mut self,
        last_turn_time: DateTime<Utc>,
        checkpoint: Option<&Checkpoint>,
    ) -> Result<(), StateStoreError> {
        // One write so the pair never tears.
        self.state = TurnState {
            last_turn_time: Some(last_turn_time),
            checkpoint: checkpoint.cloned(),
        };
        self.flush()
    }

    fn save_world(&mut self, world: &World, reserved: &ReservedTurns) -> Result<(), StateStoreError> {
        write_json_atomic(&self.shard_path, &ShardRef { world, reserved })
    }

    fn load_world(&self) -> Result<Option<Shard>, StateStoreError> {
        read_json(&self.shard_path)
    }

    fn append_history(&mut self, logs: &[TurnLog]) -> Result<(), StateStoreError> {
        if logs.is_empty() {
            return Ok(());
        }
        let io_err = |source| StateStoreError::Io {
            path: self.history_path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.history_path)
            .map_err(io_err)?;
        for log in logs {
            let line = serde_json::to_string(log).map_err(|source| StateStoreError::Json {
                path: self.history_path.clone(),
                source,
            })?;
            writeln!(file, "{}", line).map_err(io_err)?;
        }
        Ok(())
    }
}

/// Store kept in memory; for tests and throwaway shards.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    pub state: TurnState,
    pub shard: Option<Shard>,
    pub history: Vec<TurnLog>,
    /// Number of `save_progress` calls
    pub saves: usize,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(last_turn_time: DateTime<Utc>, checkpoint: Option<Checkpoint>) -> Self {
        Self {
            state: TurnState {
                last_turn_time: Some(last_turn_time),
                checkpoint,
            },
            ..Self::default()
        }
    }
}

impl TurnStateStore for MemoryStateStore {
    fn load_last_turn_time(&self) -> Result<Option<DateTime<Utc>>, StateStoreError> {
        Ok(self.state.last_turn_time)
    }

    fn save_last_turn_time(&mut self, at: DateTime<Utc>) -> Result<(), StateStoreError> {
        self.state.last_turn_time = Some(at);
        Ok(())
    }

    fn load_checkpoint(&self) -> Result<Option<Checkpoint>, StateStoreError> {
        Ok(self.state.checkpoint.clone())
    }

    fn save_checkpoint(&mut self, checkpoint: Option<&Checkpoint>) -> Result<(), StateStoreError> {
        self.state.checkpoint = checkpoint.cloned();
        Ok(())
    }

    fn save_progress(
        &mut self,
        last_turn_time: DateTime<Utc>,
        checkpoint: Option<&Checkpoint>,
    ) -> Result<(), StateStoreError> {
        self.saves += 1;
        self.state = TurnState {
            last_turn_time: Some(last_turn_time),
            checkpoint: checkpoint.cloned(),
        };
        Ok(())
    }

    fn save_world(&mut self, world: &World, reserved: &ReservedTurns) -> Result<(), StateStoreError> {
        self.shard = Some(Shard {
            world: world.clone(),
            reserved: reserved.clone(),
        });
        Ok(())
    }

    fn load_world(&self) -> Result<Option<Shard>, StateStoreError> {
        Ok(self.shard.clone())
    }

    fn append_history(&mut self, logs: &[TurnLog]) -> Result<(), StateStoreError> {
        self.history.extend_from_slice(logs);
        Ok(())
    }
}
