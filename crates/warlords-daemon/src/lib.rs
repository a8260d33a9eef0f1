//! Warlords Daemon - scheduling loop and control channel.
//!
//! Hosts the per-profile turn loop around `warlords_core::TurnProcessor`:
//! - `config` - `.warlords/daemon.yaml`
//! - `state_store` - durable `{lastTurnTime, checkpoint}` and shard snapshots
//! - `channel` - append-only JSONL command and event logs
//! - `daemon` - the loop itself

pub mod channel;
pub mod config;
pub mod daemon;
pub mod state_store;

pub use channel::{
    ChannelError, CommandSource, CommandWriter, EventReader, EventSink, FileCommandSource,
    FileEventSink, LogPaths, ReceivedCommand,
};
pub use config::{DaemonConfig, CONFIG_PATH};
pub use daemon::{DaemonError, TurnDaemon};
pub use state_store::{
    FileStateStore, MemoryStateStore, Shard, StateStoreError, TurnState, TurnStateStore,
};
