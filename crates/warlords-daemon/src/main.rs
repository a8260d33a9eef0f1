//! Warlords CLI.
//!
//! - `warlords init` - write the default config (and optionally a sample shard)
//! - `warlords run` - run the turn daemon for the configured profile
//! - `warlords send` / `status` / `troop` - talk to a running daemon

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};

use warlords_core::{
    get_next_tick_time, ActionRegistry, City, General, Nation, ReservedTurn, ReservedTurnStore,
    ReservedTurns, TurnProcessor, World,
};
use warlords_daemon::{
    CommandWriter, DaemonConfig, EventReader, FileCommandSource, FileEventSink, FileStateStore,
    LogPaths, TurnDaemon, TurnStateStore, CONFIG_PATH,
};
use warlords_protocol::{CityId, DaemonEvent, GeneralId, NationId, TroopId, TurnDaemonCommand};

#[derive(Parser)]
#[command(name = "warlords")]
#[command(about = "Turn scheduling daemon", version)]
struct Cli {
    /// Project root directory
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write .warlords/daemon.yaml
    Init {
        /// Also seed a small shard to play with
        #[arg(long)]
        sample: bool,
    },

    /// Run the turn daemon
    Run,

    /// Send a control command to a running daemon
    Send {
        #[arg(value_enum)]
        command: ControlCommand,
    },

    /// Ask a running daemon for its status
    Status {
        /// How long to wait for the reply
        #[arg(long, default_value_t = 3000)]
        timeout_ms: u64,
    },

    /// Troop membership
    Troop {
        #[command(subcommand)]
        command: TroopCommands,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ControlCommand {
    Run,
    Pause,
    Resume,
    Shutdown,
}

impl From<ControlCommand> for TurnDaemonCommand {
    fn from(command: ControlCommand) -> Self {
        match command {
            ControlCommand::Run => Self::Run,
            ControlCommand::Pause => Self::Pause,
            ControlCommand::Resume => Self::Resume,
            ControlCommand::Shutdown => Self::Shutdown,
        }
    }
}

#[derive(Subcommand)]
enum TroopCommands {
    /// Add a general to a troop
    Join { general_id: u32, troop_id: u32 },
    /// Remove a general from its troop
    Exit { general_id: u32 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    if cli.log_json {
        fmt().json().with_env_filter(filter).with_target(false).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }

    let project_root = match cli.project {
        Some(root) => root,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match cli.command {
        Commands::Init { sample } => init_project(&project_root, sample),
        Commands::Run => run_daemon(&project_root).await,
        Commands::Send { command } => send(&project_root, command.into()).await,
        Commands::Status { timeout_ms } => show_status(&project_root, timeout_ms).await,
        Commands::Troop { command } => {
            let command = match command {
                TroopCommands::Join {
                    general_id,
                    troop_id,
                } => TurnDaemonCommand::TroopJoin {
                    general_id: GeneralId(general_id),
                    troop_id: TroopId(troop_id),
                },
                TroopCommands::Exit { general_id } => TurnDaemonCommand::TroopExit {
                    general_id: GeneralId(general_id),
                },
            };
            send(&project_root, command).await
        }
    }
}

fn load_config(project_root: &Path) -> Result<DaemonConfig> {
    let mut config = DaemonConfig::load_from_project(project_root)?;
    config.resolve_paths(project_root);
    Ok(config)
}

async fn run_daemon(project_root: &Path) -> Result<()> {
    let config = load_config(project_root)?;
    tracing::info!(project = %project_root.display(), profile = %config.profile, "Starting turn daemon");

    let store = FileStateStore::open(&config.state_dir, &config.profile)?;
    let (world, reserved) = match store.load_world()? {
        Some(shard) => (shard.world, shard.reserved),
        None => {
            tracing::warn!("No shard snapshot found, starting with an empty world");
            (World::new(), ReservedTurns::new())
        }
    };

    let paths = LogPaths::for_profile(&config.channel_dir, &config.profile);
    let source = FileCommandSource::open(paths.clone(), config.poll_interval()).await?;
    let sink = FileEventSink::new(&paths);
    let processor = TurnProcessor::new(ActionRegistry::standard(), config.calendar())
        .with_env(config.env.clone());

    let mut daemon = TurnDaemon::new(&config, processor, world, reserved, store, source, sink)?;

    let finished = tokio::select! {
        result = daemon.run() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    match finished {
        Some(result) => result?,
        None => {
            tracing::info!("Interrupted, saving state");
            daemon.finish().await?;
        }
    }
    Ok(())
}

async fn send(project_root: &Path, command: TurnDaemonCommand) -> Result<()> {
    let config = load_config(project_root)?;
    let paths = LogPaths::for_profile(&config.channel_dir, &config.profile);
    let mut reader = EventReader::from_end(&paths, config.poll_interval()).await?;
    let kind = command.kind();
    let request_id = CommandWriter::new(&paths).send(command).await?;
    println!("Sent {kind} ({request_id})");

    match reader
        .wait_for(&request_id, Duration::from_millis(3000))
        .await?
        .map(|envelope| envelope.event)
    {
        Some(DaemonEvent::CommandResult { result }) if result.ok => {
            println!("ok{}", result.detail.map(|d| format!(": {d}")).unwrap_or_default());
            Ok(())
        }
        Some(DaemonEvent::CommandResult { result }) => {
            bail!("{} failed: {}", result.command, result.detail.unwrap_or_default())
        }
        Some(other) => {
            println!("{}", serde_json::to_string_pretty(&other)?);
            Ok(())
        }
        // Troop commands answer after the next batch; queued is not a failure.
        None => {
            println!("No reply yet; the daemon will handle it when it next reads the log.");
            Ok(())
        }
    }
}

async fn show_status(project_root: &Path, timeout_ms: u64) -> Result<()> {
    let config = load_config(project_root)?;
    let paths = LogPaths::for_profile(&config.channel_dir, &config.profile);
    let mut reader = EventReader::from_end(&paths, config.poll_interval()).await?;
    let request_id = CommandWriter::new(&paths)
        .send(TurnDaemonCommand::GetStatus { request_id: None })
        .await?;

    let Some(envelope) = reader
        .wait_for(&request_id, Duration::from_millis(timeout_ms))
        .await?
    else {
        bail!(
            "No status from profile '{}' within {timeout_ms}ms. Is the daemon running?",
            config.profile
        );
    };
    let DaemonEvent::Status { status } = envelope.event else {
        bail!("Unexpected reply to getStatus");
    };

    println!("Warlords Status");
    println!("===============");
    println!();
    println!("Profile:     {}", status.profile);
    println!("State:       {:?}", status.state);
    println!("Game date:   {}-{:02}", status.year, status.month);
    println!("Last turn:   {}", status.last_turn_time);
    if let Some(deadline) = status.next_deadline {
        println!("Next run:    {deadline}");
    }
    if let Some(cp) = &status.checkpoint {
        println!("Checkpoint:  general {} at {}", cp.general_id, cp.turn_time);
    }
    if let Some(batch) = &status.last_batch {
        println!(
            "Last batch:  {} generals, {} ticks{}",
            batch.processed_generals,
            batch.completed_ticks,
            if batch.partial { " (partial)" } else { "" }
        );
    }
    println!("Pending:     {} troop commands", status.pending_mutations);
    Ok(())
}

fn init_project(project_root: &Path, sample: bool) -> Result<()> {
    let config_path = project_root.join(CONFIG_PATH);
    if config_path.exists() {
        println!("Exists:  {}", config_path.display());
    } else {
        DaemonConfig::write_default(project_root)?;
        // Start the calendar at the current tick rather than the template date.
        let defaults = DaemonConfig::default();
        let rfc3339 = |at: DateTime<Utc>| format!("\"{}\"", at.to_rfc3339_opts(SecondsFormat::Secs, true));
        let start = get_next_tick_time(Utc::now(), defaults.tick_term_minutes);
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?
            .replace(&rfc3339(defaults.start_time), &rfc3339(start));
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        println!("Created: {}", config_path.display());
    }

    let config = load_config(project_root)?;
    for dir in [&config.channel_dir, &config.state_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        println!("Created: {}", dir.display());
    }

    if sample {
        let mut store = FileStateStore::open(&config.state_dir, &config.profile)?;
        if store.load_world()?.is_some() {
            bail!("Shard for profile '{}' already exists", config.profile);
        }
        let (world, reserved) = sample_shard(config.start_time)?;
        store.save_world(&world, &reserved)?;
        println!(
            "Created: {}",
            config.state_dir.join(format!("{}.shard.json", config.profile)).display()
        );
    }

    println!();
    println!("Warlords initialized. Start the daemon with 'warlords run'.");
    Ok(())
}

/// Two rival nations with a handful of generals and a few queued orders.
fn sample_shard(start: DateTime<Utc>) -> Result<(World, ReservedTurns)> {
    let mut world = World::new();
    world.insert_nation(Nation::new(NationId(1), "Wei"));
    world.insert_nation(Nation::new(NationId(2), "Shu"));
    world.insert_city(City::new(CityId(1), "Xuchang", NationId(1)));
    world.insert_city(City::new(CityId(2), "Luoyang", NationId(1)));
    world.insert_city(City::new(CityId(3), "Chengdu", NationId(2)));

    let roster = [
        (1, "Cao Cao", 1, 1, 12),
        (2, "Xun Yu", 1, 2, 1),
        (3, "Liu Bei", 2, 3, 12),
        (4, "Zhuge Liang", 2, 3, 1),
    ];
    for (offset, (id, name, nation, city, officer)) in roster.into_iter().enumerate() {
        let turn_time = start + chrono::Duration::minutes(offset as i64 * 2);
        let mut general =
            General::new(GeneralId(id), name, NationId(nation), CityId(city), turn_time);
        general.officer_level = officer;
        general.crew = 1000;
        world.insert_general(general);
    }

    let mut reserved = ReservedTurns::new();
    reserved.set_general_turn(GeneralId(1), 0, ReservedTurn::new("train", json!({})))?;
    reserved.set_general_turn(
        GeneralId(2),
        0,
        ReservedTurn::new("move", json!({ "destCityId": 1 })),
    )?;
    reserved.set_general_turn(
        GeneralId(4),
        0,
        ReservedTurn::new("donate", json!({ "isGold": true, "amount": 200 })),
    )?;
    reserved.set_nation_turn(
        NationId(1),
        1,
        ReservedTurn::new("declare_war", json!({ "destNationId": 2 })),
    )?;
    Ok((world, reserved))
}
