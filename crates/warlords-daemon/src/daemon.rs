//! The scheduling loop.
//!
//! One cooperative loop per profile. The only suspension point is the wait on
//! the control channel; batches run synchronously between waits.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use warlords_core::{
    compute_run_deadline, ProcessRequest, ProcessorError, ReservedTurns, TurnProcessor, World,
};
use warlords_protocol::{
    BatchSummary, Budget, Checkpoint, CommandResult, DaemonEvent, DaemonStatus, EventEnvelope,
    LoopState, TurnDaemonCommand,
};

use crate::channel::{ChannelError, CommandSource, EventSink, ReceivedCommand};
use crate::config::DaemonConfig;
use crate::state_store::{StateStoreError, TurnStateStore};

/// Upper bound on a single wait while paused, so read errors get retried.
const PAUSED_WAIT: Duration = Duration::from_secs(3600);

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("invalid daemon config: {0}")]
    Config(String),
    #[error(transparent)]
    Store(#[from] StateStoreError),
    #[error(transparent)]
    Processor(#[from] ProcessorError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Remembers the last `capacity` request ids.
struct RecentIds {
    order: VecDeque<String>,
    seen: HashSet<String>,
    capacity: usize,
}

impl RecentIds {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// False when `id` was already seen.
    fn insert(&mut self, id: &str) -> bool {
        if self.capacity == 0 {
            return true;
        }
        if self.seen.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.seen.insert(id.to_string());
        true
    }
}

pub struct TurnDaemon<S, C, E> {
    profile: String,
    processor: TurnProcessor,
    world: World,
    reserved: ReservedTurns,
    store: S,
    source: C,
    sink: E,
    budget: Budget,
    poll_interval: Duration,

    last_turn_time: DateTime<Utc>,
    checkpoint: Option<Checkpoint>,
    state: LoopState,
    paused: bool,
    force_run: bool,
    stop: bool,
    next_deadline: Option<DateTime<Utc>>,
    last_batch: Option<BatchSummary>,

    /// Troop commands waiting for the next batch
    pending: Vec<ReceivedCommand>,
    /// Handled commands whose ack waits for the next persistence point
    unacked: VecDeque<ReceivedCommand>,
    /// Replies not yet published; an entry leaves only once written
    outbox: VecDeque<EventEnvelope>,
    recent: RecentIds,
}

impl<S, C, E> TurnDaemon<S, C, E>
where
    S: TurnStateStore,
    C: CommandSource,
    E: EventSink,
{
    /// Build the daemon, resuming from whatever the store last persisted.
    pub fn new(
        config: &DaemonConfig,
        processor: TurnProcessor,
        world: World,
        reserved: ReservedTurns,
        store: S,
        source: C,
        sink: E,
    ) -> Result<Self, DaemonError> {
        config
            .validate()
            .map_err(|e| DaemonError::Config(format!("{e:#}")))?;
        let last_turn_time = store.load_last_turn_time()?.unwrap_or(config.start_time);
        let checkpoint = store.load_checkpoint()?;

        Ok(Self {
            profile: config.profile.clone(),
            processor,
            world,
            reserved,
            store,
            source,
            sink,
            budget: config.budget,
            poll_interval: config.poll_interval(),
            last_turn_time,
            checkpoint,
            state: LoopState::Idle,
            paused: false,
            force_run: false,
            stop: false,
            next_deadline: None,
            last_batch: None,
            pending: Vec::new(),
            unacked: VecDeque::new(),
            outbox: VecDeque::new(),
            recent: RecentIds::new(config.dedupe_window),
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn reserved(&self) -> &ReservedTurns {
        &self.reserved
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn source(&self) -> &C {
        &self.source
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    pub fn last_turn_time(&self) -> DateTime<Utc> {
        self.last_turn_time
    }

    pub fn checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoint.as_ref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Queue a command as if it had arrived on the channel.
    pub fn enqueue(&mut self, command: ReceivedCommand) {
        self.source.enqueue(command);
    }

    pub fn status(&self) -> DaemonStatus {
        let (year, month) = self.processor.calendar().year_month(self.last_turn_time);
        DaemonStatus {
            profile: self.profile.clone(),
            state: self.state,
            paused: self.paused,
            last_turn_time: self.last_turn_time,
            year,
            month,
            next_deadline: self.next_deadline,
            checkpoint: self.checkpoint.clone(),
            last_batch: self.last_batch.clone(),
            pending_mutations: self.pending.len(),
        }
    }

    /// Earliest of the next tick boundary and the next due general.
    pub fn compute_deadline(&self) -> DateTime<Utc> {
        compute_run_deadline(
            self.last_turn_time,
            self.processor.calendar().tick_term_minutes,
            self.world.next_actor_turn_time(),
        )
    }

    /// Run until `shutdown`, then flush pending work.
    pub async fn run(&mut self) -> Result<(), DaemonError> {
        info!(
            profile = %self.profile,
            last_turn_time = %self.last_turn_time,
            resuming = self.checkpoint.is_some(),
            "Turn daemon started"
        );

        while !self.stop {
            if self.paused {
                self.state = LoopState::Paused;
                self.next_deadline = None;
                self.wait_for_command(Instant::now() + PAUSED_WAIT).await;
                continue;
            }

            if self.force_run {
                self.force_run = false;
                // Stay responsive between back-to-back batches.
                self.drain_commands().await;
                if self.stop || self.paused {
                    continue;
                }
                self.run_cycle(Utc::now()).await?;
                continue;
            }

            let deadline = self.compute_deadline();
            let now = Utc::now();
            self.next_deadline = Some(deadline);
            self.state = LoopState::Waiting;

            let wait = (deadline - now).to_std().unwrap_or(Duration::ZERO);
            if self.wait_for_command(Instant::now() + wait).await {
                continue;
            }

            // Behind schedule: take everything due up to now and let the
            // catch-up cap bound the batch.
            let target = if deadline <= now { now } else { deadline };
            self.run_cycle(target).await?;
        }

        self.finish().await
    }

    /// Apply queued troop commands and persist. Called on every exit path,
    /// including after the `run` future was dropped mid-await.
    pub async fn finish(&mut self) -> Result<(), DaemonError> {
        self.apply_pending_mutations();
        self.store.save_world(&self.world, &self.reserved)?;
        self.store
            .save_progress(self.last_turn_time, self.checkpoint.as_ref())?;
        self.flush().await;
        self.state = LoopState::Stopped;
        self.next_deadline = None;
        info!(profile = %self.profile, last_turn_time = %self.last_turn_time, "Turn daemon stopped");
        Ok(())
    }

    /// True when a command arrived before `deadline`.
    async fn wait_for_command(&mut self, deadline: Instant) -> bool {
        match self.source.wait_until(deadline).await {
            Ok(Some(command)) => {
                self.handle(command).await;
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Control channel read failed");
                tokio::time::sleep(self.poll_interval).await;
                true
            }
        }
    }

    async fn drain_commands(&mut self) {
        match self.source.drain().await {
            Ok(commands) => {
                for command in commands {
                    self.handle(command).await;
                }
            }
            Err(e) => warn!(error = %e, "Control channel read failed"),
        }
    }

    /// Handle one control command.
    ///
    /// State changes happen before the first await, so dropping this future
    /// never loses a decision; the reply and ack stay queued for `flush`.
    pub async fn handle(&mut self, received: ReceivedCommand) {
        self.decide(received);
        self.flush().await;
    }

    fn decide(&mut self, received: ReceivedCommand) {
        if !self.recent.insert(&received.request_id) {
            debug!(request_id = %received.request_id, "Skipping redelivered command");
            self.unacked.push_back(received);
            return;
        }

        debug!(request_id = %received.request_id, command = received.command.kind(), "Command received");
        let command = received.command.clone();
        let event = match &command {
            TurnDaemonCommand::TroopJoin { .. } | TurnDaemonCommand::TroopExit { .. } => {
                self.pending.push(received);
                return;
            }
            TurnDaemonCommand::GetStatus { .. } => DaemonEvent::Status {
                status: self.status(),
            },
            TurnDaemonCommand::Run if self.paused => DaemonEvent::CommandResult {
                result: CommandResult::failed(&command, "daemon is paused"),
            },
            TurnDaemonCommand::Run => {
                self.force_run = true;
                DaemonEvent::CommandResult {
                    result: CommandResult::accepted(&command),
                }
            }
            TurnDaemonCommand::Pause => {
                if !self.paused {
                    info!(profile = %self.profile, "Scheduling paused");
                }
                self.paused = true;
                DaemonEvent::CommandResult {
                    result: CommandResult::accepted(&command),
                }
            }
            TurnDaemonCommand::Resume => {
                if self.paused {
                    info!(profile = %self.profile, "Scheduling resumed");
                }
                self.paused = false;
                DaemonEvent::CommandResult {
                    result: CommandResult::accepted(&command),
                }
            }
            TurnDaemonCommand::Shutdown => {
                info!(profile = %self.profile, "Shutdown requested");
                self.stop = true;
                DaemonEvent::CommandResult {
                    result: CommandResult::accepted(&command),
                }
            }
        };

        self.outbox
            .push_back(EventEnvelope::new(Some(received.reply_id.clone()), event));
        self.unacked.push_back(received);
    }

    /// Publish queued replies, then acknowledge handled commands unless a
    /// troop command ahead of them is still unapplied.
    async fn flush(&mut self) {
        while let Some(envelope) = self.outbox.front().cloned() {
            if let Err(e) = self.sink.publish(envelope).await {
                warn!(error = %e, "Failed to publish reply");
            }
            self.outbox.pop_front();
        }

        if !self.pending.is_empty() {
            return;
        }
        while let Some(received) = self.unacked.front() {
            if let Err(e) = self.source.ack(received).await {
                warn!(error = %e, "Failed to acknowledge command");
            }
            self.unacked.pop_front();
        }
    }

    /// Apply every queued troop command. Synchronous, so it runs to completion.
    fn apply_pending_mutations(&mut self) {
        for received in std::mem::take(&mut self.pending) {
            let command = &received.command;
            let result = match *command {
                TurnDaemonCommand::TroopJoin {
                    general_id,
                    troop_id,
                } => match self.world.join_troop(general_id, troop_id) {
                    Ok(()) => {
                        info!(general_id = %general_id, troop_id = %troop_id, "General joined troop");
                        CommandResult::accepted(command)
                    }
                    Err(e) => CommandResult::failed(command, e.to_string()),
                },
                TurnDaemonCommand::TroopExit { general_id } => {
                    match self.world.exit_troop(general_id) {
                        Ok(true) => {
                            info!(general_id = %general_id, "Troop disbanded");
                            CommandResult::accepted(command).with_detail("troop disbanded")
                        }
                        Ok(false) => CommandResult::accepted(command),
                        Err(e) => CommandResult::failed(command, e.to_string()),
                    }
                }
                _ => continue,
            };
            if !result.ok {
                warn!(request_id = %received.request_id, detail = ?result.detail, "Troop command failed");
            }
            self.outbox.push_back(EventEnvelope::new(
                Some(received.reply_id.clone()),
                DaemonEvent::CommandResult { result },
            ));
            self.unacked.push_back(received);
        }
    }

    async fn run_cycle(&mut self, target: DateTime<Utc>) -> Result<(), DaemonError> {
        self.state = LoopState::Running;
        self.next_deadline = None;
        self.apply_pending_mutations();

        let request = ProcessRequest {
            target_time: target,
            last_turn_time: self.last_turn_time,
            checkpoint: self.checkpoint.clone(),
            budget: self.budget,
        };
        debug!(target = %target, last_turn_time = %self.last_turn_time, "Batch started");

        let outcome = match self
            .processor
            .process(&mut self.world, &mut self.reserved, &request)
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, target = %target, "Turn processor failed");
                return Err(e.into());
            }
        };

        if !outcome.logs.is_empty() {
            if let Err(e) = self.store.append_history(&outcome.logs) {
                warn!(error = %e, "Failed to append turn history");
            }
        }
        self.store.save_world(&self.world, &self.reserved)?;
        self.store
            .save_progress(outcome.last_turn_time, outcome.checkpoint.as_ref())?;

        self.last_turn_time = outcome.last_turn_time;
        self.checkpoint = outcome.checkpoint;
        self.force_run = outcome.partial;
        let summary = BatchSummary {
            target_time: target,
            finished_at: Utc::now(),
            processed_generals: outcome.processed_generals,
            completed_ticks: outcome.completed_ticks,
            partial: outcome.partial,
        };
        info!(
            processed = summary.processed_generals,
            ticks = summary.completed_ticks,
            partial = summary.partial,
            last_turn_time = %self.last_turn_time,
            "Batch finished"
        );
        self.last_batch = Some(summary);
        self.flush().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use warlords_core::{
        get_next_tick_time, ActionRegistry, City, General, Nation, ReservedTurn, ReservedTurnStore,
        WorldRef,
    };
    use warlords_protocol::{CityId, DaemonEvent, EventEnvelope, GeneralId, NationId, TroopId};

    use crate::state_store::MemoryStateStore;

    /// Replays a fixed list, then asks the loop to stop once it would block.
    #[derive(Default)]
    struct Script {
        queue: VecDeque<ReceivedCommand>,
        acked: Vec<String>,
    }

    impl Script {
        fn new(commands: Vec<(&str, TurnDaemonCommand)>) -> Self {
            Self {
                queue: commands
                    .into_iter()
                    .map(|(id, command)| ReceivedCommand::local(id, command))
                    .collect(),
                acked: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl CommandSource for Script {
        fn enqueue(&mut self, command: ReceivedCommand) {
            self.queue.push_back(command);
        }

        async fn drain(&mut self) -> Result<Vec<ReceivedCommand>, ChannelError> {
            Ok(self.queue.drain(..).collect())
        }

        async fn wait_until(
            &mut self,
            deadline: Instant,
        ) -> Result<Option<ReceivedCommand>, ChannelError> {
            if let Some(command) = self.queue.pop_front() {
                return Ok(Some(command));
            }
            if deadline <= Instant::now() {
                return Ok(None);
            }
            Ok(Some(ReceivedCommand::local("end", TurnDaemonCommand::Shutdown)))
        }

        async fn ack(&mut self, command: &ReceivedCommand) -> Result<(), ChannelError> {
            self.acked.push(command.request_id.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<EventEnvelope>,
        /// Next publish never completes
        stall_once: bool,
    }

    impl Recorder {
        fn result_for(&self, id: &str) -> Option<CommandResult> {
            self.events.iter().find_map(|e| match &e.event {
                DaemonEvent::CommandResult { result } if e.request_id.as_deref() == Some(id) => {
                    Some(result.clone())
                }
                _ => None,
            })
        }
    }

    #[async_trait]
    impl EventSink for Recorder {
        async fn publish(&mut self, envelope: EventEnvelope) -> Result<(), ChannelError> {
            if std::mem::take(&mut self.stall_once) {
                std::future::pending::<()>().await;
            }
            self.events.push(envelope);
            Ok(())
        }
    }

    fn aligned_past(minutes_ago: i64) -> DateTime<Utc> {
        get_next_tick_time(Utc::now() - ChronoDuration::minutes(minutes_ago + 10), 10)
    }

    fn world(turn_time: DateTime<Utc>) -> World {
        let mut world = World::new();
        world.insert_nation(Nation::new(NationId(1), "Wei"));
        world.insert_city(City::new(CityId(1), "Xuchang", NationId(1)));
        let mut cao = General::new(GeneralId(1), "Cao Cao", NationId(1), CityId(1), turn_time);
        cao.crew = 1000;
        world.insert_general(cao);
        world.insert_general(General::new(
            GeneralId(2),
            "Xun Yu",
            NationId(1),
            CityId(1),
            turn_time + ChronoDuration::minutes(1),
        ));
        world
    }

    fn daemon(
        last_turn_time: DateTime<Utc>,
        script: Script,
    ) -> TurnDaemon<MemoryStateStore, Script, Recorder> {
        let config = DaemonConfig {
            dedupe_window: 8,
            ..DaemonConfig::default()
        };
        let processor = TurnProcessor::new(ActionRegistry::standard(), config.calendar());
        let mut reserved = ReservedTurns::new();
        reserved
            .set_general_turn(GeneralId(1), 0, ReservedTurn::new("train", json!({})))
            .unwrap();
        TurnDaemon::new(
            &config,
            processor,
            world(last_turn_time + ChronoDuration::minutes(1)),
            reserved,
            MemoryStateStore::with_state(last_turn_time, None),
            script,
            Recorder::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn backlog_drains_then_waits() {
        let last = aligned_past(60);
        let mut daemon = daemon(last, Script::default());
        daemon.run().await.unwrap();

        let now = Utc::now();
        assert!(daemon.last_turn_time() > now - ChronoDuration::minutes(10));
        assert!(daemon.last_turn_time() <= now);
        assert!(daemon.store().saves >= 2);
        assert!(!daemon.store().history.is_empty());
        assert_eq!(daemon.status().state, LoopState::Stopped);
        let trained = daemon.world().get_general_by_id(GeneralId(1)).unwrap().train;
        assert!(trained > 0);
    }

    #[tokio::test]
    async fn status_replies_under_reply_id() {
        let script = Script::new(vec![(
            "env",
            TurnDaemonCommand::GetStatus {
                request_id: Some("asked".into()),
            },
        )]);
        let mut daemon = daemon(get_next_tick_time(Utc::now(), 10), script);
        daemon.run().await.unwrap();

        let status = daemon.sink().events.iter().find_map(|e| match &e.event {
            DaemonEvent::Status { status } => Some((e.request_id.clone(), status.clone())),
            _ => None,
        });
        let (id, status) = status.unwrap();
        assert_eq!(id.as_deref(), Some("asked"));
        assert_eq!(status.profile, "default");
        assert!(daemon.source().acked.contains(&"env".to_string()));
    }

    #[tokio::test]
    async fn run_is_refused_while_paused() {
        let script = Script::new(vec![
            ("p", TurnDaemonCommand::Pause),
            ("r", TurnDaemonCommand::Run),
            ("u", TurnDaemonCommand::Resume),
        ]);
        let future = get_next_tick_time(Utc::now(), 10) + ChronoDuration::minutes(10);
        let mut daemon = daemon(future, script);
        daemon.run().await.unwrap();

        let sink = daemon.sink();
        assert!(sink.result_for("p").unwrap().ok);
        let refused = sink.result_for("r").unwrap();
        assert!(!refused.ok);
        assert_eq!(refused.detail.as_deref(), Some("daemon is paused"));
        assert!(sink.result_for("u").unwrap().ok);
        assert!(!daemon.is_paused());
        assert_eq!(daemon.store().saves, 1);
    }

    #[tokio::test]
    async fn redelivered_request_is_handled_once() {
        let script = Script::new(vec![
            ("same", TurnDaemonCommand::Pause),
            ("same", TurnDaemonCommand::Pause),
            ("resume", TurnDaemonCommand::Resume),
        ]);
        let future = get_next_tick_time(Utc::now(), 10) + ChronoDuration::minutes(10);
        let mut daemon = daemon(future, script);
        daemon.run().await.unwrap();

        let replies = daemon
            .sink()
            .events
            .iter()
            .filter(|e| e.request_id.as_deref() == Some("same"))
            .count();
        assert_eq!(replies, 1);
        let acks = daemon.source().acked.iter().filter(|id| *id == "same").count();
        assert_eq!(acks, 2);
    }

    #[tokio::test]
    async fn troop_commands_apply_before_the_batch() {
        let last = aligned_past(10);
        let mut daemon = daemon(last, Script::default());
        daemon
            .world
            .create_troop(GeneralId(1), "Tiger Cavalry")
            .unwrap();
        daemon.enqueue(ReceivedCommand::local(
            "join",
            TurnDaemonCommand::TroopJoin {
                general_id: GeneralId(2),
                troop_id: TroopId(1),
            },
        ));
        daemon.enqueue(ReceivedCommand::local(
            "bad",
            TurnDaemonCommand::TroopJoin {
                general_id: GeneralId(9),
                troop_id: TroopId(1),
            },
        ));
        daemon.enqueue(ReceivedCommand::local(
            "status",
            TurnDaemonCommand::GetStatus { request_id: None },
        ));
        daemon.run().await.unwrap();

        let joined = daemon.world().get_general_by_id(GeneralId(2)).unwrap();
        assert_eq!(joined.troop_id, Some(TroopId(1)));
        assert!(daemon.sink().result_for("join").unwrap().ok);
        assert!(!daemon.sink().result_for("bad").unwrap().ok);

        assert!(daemon.store().saves >= 2);

        // Status answered at once, its ack held until the queued joins were persisted.
        let events = &daemon.sink().events;
        let index = |id: &str| {
            events
                .iter()
                .position(|e| e.request_id.as_deref() == Some(id))
                .unwrap()
        };
        assert!(index("status") < index("join"));
        let acked = &daemon.source().acked;
        for id in ["join", "bad", "status"] {
            assert!(acked.iter().any(|a| a == id), "{id} not acknowledged");
        }
    }

    #[tokio::test]
    async fn interrupted_run_keeps_queued_troop_commands() {
        let script = Script::new(vec![
            (
                "join",
                TurnDaemonCommand::TroopJoin {
                    general_id: GeneralId(2),
                    troop_id: TroopId(1),
                },
            ),
            (
                "exit",
                TurnDaemonCommand::TroopExit {
                    general_id: GeneralId(1),
                },
            ),
            ("pause", TurnDaemonCommand::Pause),
        ]);
        let future = get_next_tick_time(Utc::now(), 10) + ChronoDuration::minutes(10);
        let mut daemon = daemon(future, script);
        daemon
            .world
            .create_troop(GeneralId(1), "Tiger Cavalry")
            .unwrap();
        daemon.sink.stall_once = true;

        // Dropped while the pause reply is being written.
        let interrupted = tokio::time::timeout(Duration::from_millis(50), daemon.run()).await;
        assert!(interrupted.is_err());
        assert!(daemon.source().acked.is_empty());
        assert_eq!(daemon.status().pending_mutations, 2);

        daemon.finish().await.unwrap();
        assert!(daemon.world().get_troop_by_id(TroopId(1)).is_none());
        assert!(daemon.store().shard.is_some());

        let sink = daemon.sink();
        assert!(sink.result_for("pause").unwrap().ok);
        assert!(sink.result_for("join").unwrap().ok);
        let exit = sink.result_for("exit").unwrap();
        assert_eq!(exit.detail.as_deref(), Some("troop disbanded"));
        assert_eq!(daemon.source().acked, vec!["pause", "join", "exit"]);
    }

    #[test]
    fn refuses_a_config_that_would_spin() {
        let mut config = DaemonConfig::default();
        config.budget.budget_ms = 0;
        let processor = TurnProcessor::new(ActionRegistry::standard(), config.calendar());
        let built = TurnDaemon::new(
            &config,
            processor,
            World::new(),
            ReservedTurns::new(),
            MemoryStateStore::new(),
            Script::default(),
            Recorder::default(),
        );
        assert!(matches!(built, Err(DaemonError::Config(_))));
    }

    #[test]
    fn recent_ids_forget_the_oldest() {
        let mut recent = RecentIds::new(2);
        assert!(recent.insert("a"));
        assert!(recent.insert("b"));
        assert!(!recent.insert("a"));
        assert!(recent.insert("c"));
        assert!(recent.insert("a"));
    }
}
