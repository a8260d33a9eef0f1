//! End-to-end runs of the turn daemon over the file-backed channel.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::json;
use tokio::task::JoinHandle;

use warlords_core::{
    get_next_tick_time, ActionRegistry, City, General, Nation, ReservedTurn, ReservedTurnStore,
    ReservedTurns, TurnProcessor, World, WorldRef,
};
use warlords_daemon::{
    CommandSource, CommandWriter, DaemonConfig, DaemonError, EventReader, FileCommandSource,
    FileEventSink, FileStateStore, LogPaths, TurnDaemon, TurnStateStore,
};
use warlords_protocol::{
    CityId, DaemonEvent, DaemonStatus, EventEnvelope, GeneralId, LoopState, NationId, TroopId,
    TurnDaemonCommand,
};

type FileDaemon = TurnDaemon<FileStateStore, FileCommandSource, FileEventSink>;

const POLL: Duration = Duration::from_millis(10);
const REPLY: Duration = Duration::from_secs(5);

fn config(root: &Path, start_time: DateTime<Utc>) -> DaemonConfig {
    let mut config = DaemonConfig {
        profile: "shard".to_string(),
        start_time,
        poll_interval_ms: 10,
        ..DaemonConfig::default()
    };
    config.resolve_paths(root);
    config
}

fn world(turn_time: DateTime<Utc>) -> World {
    let mut world = World::new();
    world.insert_nation(Nation::new(NationId(1), "Wei"));
    world.insert_city(City::new(CityId(1), "Xuchang", NationId(1)));
    for (id, name) in [(1, "Cao Cao"), (2, "Xun Yu")] {
        let mut general = General::new(GeneralId(id), name, NationId(1), CityId(1), turn_time);
        general.crew = 500;
        world.insert_general(general);
    }
    world
}

fn reserved() -> ReservedTurns {
    let mut reserved = ReservedTurns::new();
    reserved
        .set_general_turn(GeneralId(1), 0, ReservedTurn::new("train", json!({})))
        .unwrap();
    reserved
}

async fn build(config: &DaemonConfig, world: World, reserved: ReservedTurns) -> FileDaemon {
    let store = FileStateStore::open(&config.state_dir, &config.profile).unwrap();
    let paths = LogPaths::for_profile(&config.channel_dir, &config.profile);
    let source = FileCommandSource::open(paths.clone(), POLL).await.unwrap();
    let sink = FileEventSink::new(&paths);
    let processor = TurnProcessor::new(ActionRegistry::standard(), config.calendar());
    TurnDaemon::new(config, processor, world, reserved, store, source, sink).unwrap()
}

fn spawn(mut daemon: FileDaemon) -> JoinHandle<Result<FileDaemon, DaemonError>> {
    tokio::spawn(async move {
        daemon.run().await?;
        Ok(daemon)
    })
}

struct Client {
    writer: CommandWriter,
    reader: EventReader,
}

impl Client {
    fn new(config: &DaemonConfig) -> Self {
        let paths = LogPaths::for_profile(&config.channel_dir, &config.profile);
        Self {
            writer: CommandWriter::new(&paths),
            reader: EventReader::from_start(&paths, POLL),
        }
    }

    async fn request(&mut self, command: TurnDaemonCommand) -> EventEnvelope {
        let id = self.writer.send(command).await.unwrap();
        self.reader
            .wait_for(&id, REPLY)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("no reply to {id}"))
    }

    async fn status(&mut self) -> DaemonStatus {
        match self
            .request(TurnDaemonCommand::GetStatus { request_id: None })
            .await
            .event
        {
            DaemonEvent::Status { status } => status,
            other => panic!("expected status, got {other:?}"),
        }
    }

    async fn ok(&mut self, command: TurnDaemonCommand) -> bool {
        match self.request(command).await.event {
            DaemonEvent::CommandResult { result } => result.ok,
            other => panic!("expected command result, got {other:?}"),
        }
    }
}

fn current_tick() -> DateTime<Utc> {
    get_next_tick_time(Utc::now() - ChronoDuration::minutes(10), 10)
}

#[tokio::test]
async fn answers_control_commands_over_the_logs() {
    let dir = tempfile::tempdir().unwrap();
    let start = current_tick();
    let config = config(dir.path(), start);
    let future = get_next_tick_time(Utc::now(), 10) + ChronoDuration::minutes(5);
    let handle = spawn(build(&config, world(future), reserved()).await);
    let mut client = Client::new(&config);

    let status = client.status().await;
    assert_eq!(status.profile, "shard");
    assert_eq!(status.last_turn_time, start);
    assert_eq!(status.state, LoopState::Waiting);
    assert!(status.next_deadline.is_some());

    assert!(client.ok(TurnDaemonCommand::Pause).await);
    assert!(client.status().await.paused);
    assert!(!client.ok(TurnDaemonCommand::Run).await);
    assert!(client.ok(TurnDaemonCommand::Resume).await);
    assert!(client.ok(TurnDaemonCommand::Shutdown).await);

    let daemon = handle.await.unwrap().unwrap();
    assert_eq!(daemon.status().state, LoopState::Stopped);
    assert_eq!(daemon.store().turn_state().last_turn_time, Some(start));
}

#[tokio::test]
async fn backlog_is_processed_and_resumed_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let start = current_tick() - ChronoDuration::minutes(60);
    let config = config(dir.path(), start);
    let handle = spawn(build(&config, world(start + ChronoDuration::minutes(1)), reserved()).await);
    let mut client = Client::new(&config);

    let mut caught_up = false;
    for _ in 0..100 {
        let status = client.status().await;
        if status.last_turn_time >= current_tick() && status.state == LoopState::Waiting {
            caught_up = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(caught_up, "daemon never caught up");
    assert!(client.ok(TurnDaemonCommand::Shutdown).await);
    let daemon = handle.await.unwrap().unwrap();
    let last = daemon.last_turn_time();
    drop(daemon);

    let store = FileStateStore::open(&config.state_dir, &config.profile).unwrap();
    assert_eq!(store.load_last_turn_time().unwrap(), Some(last));
    let history = std::fs::read_to_string(store.history_path()).unwrap();
    assert!(history.lines().count() >= 1);

    let shard = store.load_world().unwrap().unwrap();
    let cao = shard.world.get_general_by_id(GeneralId(1)).unwrap();
    assert!(cao.train > 0);
    assert!(cao.turn_time > last - ChronoDuration::minutes(10));

    // A new process picks up where the old one stopped, not at start_time.
    let restarted = build(&config, shard.world, shard.reserved).await;
    assert_eq!(restarted.last_turn_time(), last);
}

#[tokio::test]
async fn malformed_lines_do_not_stall_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), current_tick());
    let paths = LogPaths::for_profile(&config.channel_dir, &config.profile);
    std::fs::create_dir_all(&config.channel_dir).unwrap();
    std::fs::write(
        &paths.commands,
        concat!(
            "not json\n",
            "{\"sentAt\":\"2026-01-01T00:00:00Z\",\"command\":{\"type\":\"pause\"}}\n",
            "{\"requestId\":\"x\",\"sentAt\":\"2026-01-01T00:00:00Z\",\"command\":{\"type\":\"explode\"}}\n",
        ),
    )
    .unwrap();

    let future = get_next_tick_time(Utc::now(), 10) + ChronoDuration::minutes(5);
    let handle = spawn(build(&config, world(future), reserved()).await);
    let mut client = Client::new(&config);

    let status = client.status().await;
    assert!(!status.paused);
    assert!(client.ok(TurnDaemonCommand::Shutdown).await);
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn troop_join_is_answered_after_the_forced_batch() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), current_tick());
    let future = get_next_tick_time(Utc::now(), 10) + ChronoDuration::minutes(5);
    let mut world = world(future);
    world.create_troop(GeneralId(1), "Tiger Cavalry").unwrap();
    let handle = spawn(build(&config, world, reserved()).await);
    let mut client = Client::new(&config);

    let join = client
        .writer
        .send(TurnDaemonCommand::TroopJoin {
            general_id: GeneralId(2),
            troop_id: TroopId(1),
        })
        .await
        .unwrap();
    assert_eq!(client.status().await.pending_mutations, 1);
    assert!(client.ok(TurnDaemonCommand::Run).await);

    let reply = client.reader.wait_for(&join, REPLY).await.unwrap().unwrap();
    match reply.event {
        DaemonEvent::CommandResult { result } => {
            assert!(result.ok);
            assert_eq!(result.command, "troopJoin");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(client.ok(TurnDaemonCommand::Shutdown).await);

    let daemon = handle.await.unwrap().unwrap();
    let xun_yu = daemon.world().get_general_by_id(GeneralId(2)).unwrap();
    assert_eq!(xun_yu.troop_id, Some(TroopId(1)));

    // Every command was handled, so a restart sees nothing left to redeliver.
    let paths = LogPaths::for_profile(&config.channel_dir, &config.profile);
    let mut source = FileCommandSource::open(paths, POLL).await.unwrap();
    assert!(source.drain().await.unwrap().is_empty());
}
