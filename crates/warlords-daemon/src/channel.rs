//! Control channel over append-only JSONL logs.
//!
//! Each profile owns two logs: commands flowing into the daemon and events
//! flowing out. The consumer remembers the byte offset of the last command
//! it finished handling (`ack`), so after a crash anything read but not yet
//! handled is delivered again. Delivery is at-least-once.

use std::collections::VecDeque;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::time::Instant;
use tracing::warn;

use warlords_protocol::{
    decode_command, decode_event, encode_command, encode_event, CommandEnvelope, CommandResult,
    DaemonEvent, DaemonStatus, EventEnvelope, TurnDaemonCommand,
};

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
}

fn io_error(path: &Path) -> impl Fn(std::io::Error) -> ChannelError + '_ {
    move |source| ChannelError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A decoded command plus what is needed to answer and acknowledge it.
#[derive(Clone, Debug, PartialEq)]
pub struct ReceivedCommand {
    pub request_id: String,
    /// Id the reply is published under
    pub reply_id: String,
    pub command: TurnDaemonCommand,
    /// Offset just past this command in the shared log; `None` when enqueued locally
    pub position: Option<u64>,
}

impl ReceivedCommand {
    pub fn local(request_id: impl Into<String>, command: TurnDaemonCommand) -> Self {
        let envelope = CommandEnvelope::new(request_id, command);
        Self {
            reply_id: envelope.reply_id().to_string(),
            request_id: envelope.request_id,
            command: envelope.command,
            position: None,
        }
    }
}

/// Consumer side of the channel.
#[async_trait]
pub trait CommandSource: Send {
    /// Queue a command that originated in this process.
    fn enqueue(&mut self, command: ReceivedCommand);

    /// Everything pending right now, local first. Never blocks on arrivals.
    async fn drain(&mut self) -> Result<Vec<ReceivedCommand>, ChannelError>;

    /// Next command, or `None` once `deadline` passes without one.
    async fn wait_until(&mut self, deadline: Instant) -> Result<Option<ReceivedCommand>, ChannelError>;

    /// Mark `command` handled; it will not be delivered again after a restart.
    async fn ack(&mut self, command: &ReceivedCommand) -> Result<(), ChannelError>;
}

/// Producer/responder side of the channel.
#[async_trait]
pub trait EventSink: Send {
    async fn publish(&mut self, envelope: EventEnvelope) -> Result<(), ChannelError>;

    async fn publish_status(
        &mut self,
        request_id: Option<String>,
        status: DaemonStatus,
    ) -> Result<(), ChannelError> {
        self.publish(EventEnvelope::new(request_id, DaemonEvent::Status { status }))
            .await
    }

    async fn publish_command_result(
        &mut self,
        request_id: Option<String>,
        result: CommandResult,
    ) -> Result<(), ChannelError> {
        self.publish(EventEnvelope::new(
            request_id,
            DaemonEvent::CommandResult { result },
        ))
        .await
    }
}

/// File locations for one profile's channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogPaths {
    pub commands: PathBuf,
    pub events: PathBuf,
    /// Acknowledged offset into `commands`
    pub cursor: PathBuf,
}

impl LogPaths {
    pub fn for_profile(channel_dir: &Path, profile: &str) -> Self {
        Self {
            commands: channel_dir.join(format!("{profile}.commands.jsonl")),
            events: channel_dir.join(format!("{profile}.events.jsonl")),
            cursor: channel_dir.join(format!("{profile}.commands.cursor")),
        }
    }
}

async fn ensure_parent(path: &Path) -> Result<(), ChannelError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(io_error(parent))?;
    }
    Ok(())
}

async fn append_line(path: &Path, line: &str) -> Result<(), ChannelError> {
    ensure_parent(path).await?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(io_error(path))?;
    let mut buf = Vec::with_capacity(line.len() + 1);
    buf.extend_from_slice(line.as_bytes());
    buf.push(b'\n');
    file.write_all(&buf).await.map_err(io_error(path))?;
    file.flush().await.map_err(io_error(path))
}

#[derive(Debug, Default)]
struct LineBatch {
    /// `(line, end_offset)` pairs
    lines: Vec<(String, u64)>,
    /// The log was shorter than the offset and was reread from the start
    restarted: bool,
}

/// Read complete lines appended after `offset`.
///
/// A trailing partial line is left for the next read.
async fn read_lines_from(path: &Path, offset: &mut u64) -> Result<LineBatch, ChannelError> {
    let mut file = match fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LineBatch::default()),
        Err(e) => return Err(io_error(path)(e)),
    };
    let len = file.metadata().await.map_err(io_error(path))?.len();
    let mut batch = LineBatch::default();
    if len < *offset {
        warn!(path = %path.display(), offset = *offset, len, "Log shrank, rereading from start");
        *offset = 0;
        batch.restarted = true;
    }
    if len == *offset {
        return Ok(batch);
    }

    file.seek(SeekFrom::Start(*offset))
        .await
        .map_err(io_error(path))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).await.map_err(io_error(path))?;

    let mut start = 0usize;
    while let Some(newline) = buf[start..].iter().position(|b| *b == b'\n') {
        let end = start + newline;
        let line = String::from_utf8_lossy(&buf[start..end]).into_owned();
        start = end + 1;
        batch.lines.push((line, *offset + start as u64));
    }
    *offset += start as u64;
    Ok(batch)
}

/// File-backed consumer.
pub struct FileCommandSource {
    paths: LogPaths,
    local: VecDeque<ReceivedCommand>,
    read_offset: u64,
    acked: u64,
    poll_interval: Duration,
}

impl FileCommandSource {
    /// Open the consumer, resuming after the last acknowledged command.
    pub async fn open(paths: LogPaths, poll_interval: Duration) -> Result<Self, ChannelError> {
        ensure_parent(&paths.commands).await?;
        let acked = match fs::read_to_string(&paths.cursor).await {
            Ok(content) => content.trim().parse::<u64>().unwrap_or_else(|_| {
                warn!(path = %paths.cursor.display(), "Unreadable cursor, starting from 0");
                0
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(io_error(&paths.cursor)(e)),
        };
        Ok(Self {
            paths,
            local: VecDeque::new(),
            read_offset: acked,
            acked,
            poll_interval,
        })
    }

    pub fn acked_offset(&self) -> u64 {
        self.acked
    }

    async fn write_cursor(&mut self, position: u64) -> Result<(), ChannelError> {
        let tmp = self.paths.cursor.with_extension("cursor.tmp");
        fs::write(&tmp, position.to_string())
            .await
            .map_err(io_error(&tmp))?;
        fs::rename(&tmp, &self.paths.cursor)
            .await
            .map_err(io_error(&self.paths.cursor))?;
        self.acked = position;
        Ok(())
    }

    /// Decode whatever was appended since the last read. Malformed lines are dropped.
    async fn read_new(&mut self) -> Result<Vec<ReceivedCommand>, ChannelError> {
        let batch = read_lines_from(&self.paths.commands, &mut self.read_offset).await?;
        if batch.restarted {
            // Offsets from the old log mean nothing in the new one.
            self.write_cursor(0).await?;
        }
        let mut commands = Vec::with_capacity(batch.lines.len());
        for (line, end) in batch.lines {
            if line.trim().is_empty() {
                continue;
            }
            match decode_command(&line) {
                Ok(envelope) => commands.push(ReceivedCommand {
                    reply_id: envelope.reply_id().to_string(),
                    request_id: envelope.request_id,
                    command: envelope.command,
                    position: Some(end),
                }),
                Err(e) => warn!(offset = end, error = %e, "Dropping malformed command envelope"),
            }
        }
        Ok(commands)
    }
}

#[async_trait]
impl CommandSource for FileCommandSource {
    fn enqueue(&mut self, command: ReceivedCommand) {
        self.local.push_back(command);
    }

    async fn drain(&mut self) -> Result<Vec<ReceivedCommand>, ChannelError> {
        let mut pending: Vec<ReceivedCommand> = self.local.drain(..).collect();
        pending.extend(self.read_new().await?);
        Ok(pending)
    }

    async fn wait_until(&mut self, deadline: Instant) -> Result<Option<ReceivedCommand>, ChannelError> {
        loop {
            if let Some(command) = self.local.pop_front() {
                return Ok(Some(command));
            }

            let mut batch = self.read_new().await?.into_iter();
            if let Some(first) = batch.next() {
                self.local.extend(batch);
                return Ok(Some(first));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn ack(&mut self, command: &ReceivedCommand) -> Result<(), ChannelError> {
        let Some(position) = command.position else {
            return Ok(());
        };
        if position <= self.acked {
            return Ok(());
        }
        self.write_cursor(position).await
    }
}

/// File-backed responder.
pub struct FileEventSink {
    path: PathBuf,
}

impl FileEventSink {
    pub fn new(paths: &LogPaths) -> Self {
        Self {
            path: paths.events.clone(),
        }
    }
}

#[async_trait]
impl EventSink for FileEventSink {
    async fn publish(&mut self, envelope: EventEnvelope) -> Result<(), ChannelError> {
        let line = encode_event(&envelope)?;
        append_line(&self.path, &line).await
    }
}

/// Appends command envelopes for a running daemon to pick up.
pub struct CommandWriter {
    path: PathBuf,
}

impl CommandWriter {
    pub fn new(paths: &LogPaths) -> Self {
        Self {
            path: paths.commands.clone(),
        }
    }

    /// Send `command` under a fresh request id and return the id.
    pub async fn send(&self, command: TurnDaemonCommand) -> Result<String, ChannelError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.send_envelope(&CommandEnvelope::new(request_id.clone(), command))
            .await?;
        Ok(request_id)
    }

    pub async fn send_envelope(&self, envelope: &CommandEnvelope) -> Result<(), ChannelError> {
        let line = encode_command(envelope)?;
        append_line(&self.path, &line).await
    }
}

/// Unclaimed events kept by an `EventReader`; older ones are dropped first.
const MAX_UNCLAIMED: usize = 1024;

/// Tails the event log.
pub struct EventReader {
    path: PathBuf,
    offset: u64,
    poll_interval: Duration,
    /// Read but not yet claimed by `wait_for`
    unclaimed: Vec<EventEnvelope>,
}

impl EventReader {
    /// Start at the current end of the log, ignoring older events.
    pub async fn from_end(paths: &LogPaths, poll_interval: Duration) -> Result<Self, ChannelError> {
        let offset = match fs::metadata(&paths.events).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(io_error(&paths.events)(e)),
        };
        Ok(Self {
            path: paths.events.clone(),
            offset,
            poll_interval,
            unclaimed: Vec::new(),
        })
    }

    pub fn from_start(paths: &LogPaths, poll_interval: Duration) -> Self {
        Self {
            path: paths.events.clone(),
            offset: 0,
            poll_interval,
            unclaimed: Vec::new(),
        }
    }

    pub async fn read_new(&mut self) -> Result<Vec<EventEnvelope>, ChannelError> {
        let batch = read_lines_from(&self.path, &mut self.offset).await?;
        Ok(batch
            .lines
            .into_iter()
            .filter_map(|(line, end)| match decode_event(&line) {
                Ok(envelope) => Some(envelope),
                Err(e) => {
                    warn!(offset = end, error = %e, "Skipping malformed event envelope");
                    None
                }
            })
            .collect())
    }

    /// Wait up to `timeout` for the event answering `request_id`.
    ///
    /// Other events read on the way are kept for later calls, up to
    /// `MAX_UNCLAIMED` of the most recent.
    pub async fn wait_for(
        &mut self,
        request_id: &str,
        timeout: Duration,
    ) -> Result<Option<EventEnvelope>, ChannelError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(index) = self
                .unclaimed
                .iter()
                .position(|envelope| envelope.request_id.as_deref() == Some(request_id))
            {
                return Ok(Some(self.unclaimed.remove(index)));
            }
            if self.unclaimed.len() > MAX_UNCLAIMED {
                let excess = self.unclaimed.len() - MAX_UNCLAIMED;
                self.unclaimed.drain(..excess);
            }
            let fresh = self.read_new().await?;
            if !fresh.is_empty() {
                self.unclaimed.extend(fresh);
                continue;
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}
