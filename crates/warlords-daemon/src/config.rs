//! Daemon configuration, loaded from .warlords/daemon.yaml

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use warlords_core::TurnCalendar;
use warlords_protocol::Budget;

/// Config file location relative to the project root
pub const CONFIG_PATH: &str = ".warlords/daemon.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Shard identifier; keys the channel logs and state files
    #[serde(default = "default_profile")]
    pub profile: String,

    #[serde(default = "default_tick_term")]
    pub tick_term_minutes: u32,

    /// Game year of the first tick
    #[serde(default = "default_start_year")]
    pub start_year: i32,

    /// Wall-clock time of the first tick
    #[serde(default = "default_start_time")]
    pub start_time: DateTime<Utc>,

    #[serde(default)]
    pub budget: Budget,

    #[serde(default = "default_channel_dir")]
    pub channel_dir: PathBuf,

    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// How often the command log is polled
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Recently handled request ids remembered to skip redeliveries
    #[serde(default = "default_dedupe_window")]
    pub dedupe_window: usize,

    /// Values exposed to constraints as env(key)
    #[serde(default)]
    pub env: Map<String, Value>,
}

fn default_profile() -> String {
    "default".to_string()
}
fn default_tick_term() -> u32 {
    10
}
fn default_start_year() -> i32 {
    180
}
fn default_start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
fn default_channel_dir() -> PathBuf {
    PathBuf::from(".warlords/channel")
}
fn default_state_dir() -> PathBuf {
    PathBuf::from(".warlords/state")
}
fn default_poll_interval() -> u64 {
    200
}
fn default_dedupe_window() -> usize {
    256
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            tick_term_minutes: default_tick_term(),
            start_year: default_start_year(),
            start_time: default_start_time(),
            budget: Budget::default(),
            channel_dir: default_channel_dir(),
            state_dir: default_state_dir(),
            poll_interval_ms: default_poll_interval(),
            dedupe_window: default_dedupe_window(),
            env: Map::new(),
        }
    }
}

pub const DEFAULT_CONFIG_YAML: &str = r#"# Warlords turn daemon configuration

# Shard identifier. Channel logs and state files are keyed by it.
profile: default

# Minutes per tick; twelve ticks make a game year.
tick_term_minutes: 10
start_year: 180
start_time: "2026-01-01T00:00:00Z"

# Limits for one processor run.
budget:
  budgetMs: 5000
  maxGenerals: 500
  catchUpCap: 3

channel_dir: .warlords/channel
state_dir: .warlords/state
poll_interval_ms: 200
dedupe_window: 256

# Exposed to constraints as env(key).
env: {}
"#;

impl DaemonConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from project root, defaults when the file is absent
    pub fn load_from_project(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(CONFIG_PATH);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.profile.trim().is_empty() {
            bail!("profile must not be empty");
        }
        if self.profile.contains(['/', '\\']) {
            bail!("profile {:?} must not contain path separators", self.profile);
        }
        if self.tick_term_minutes == 0 {
            bail!("tick_term_minutes must be at least 1");
        }
        if self.budget.budget_ms == 0 {
            bail!("budget.budgetMs must be at least 1");
        }
        if self.budget.max_generals == 0 {
            bail!("budget.maxGenerals must be at least 1");
        }
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be at least 1");
        }
        Ok(())
    }

    /// Resolve paths relative to project root
    pub fn resolve_paths(&mut self, project_root: &Path) {
        self.channel_dir = project_root.join(&self.channel_dir);
        self.state_dir = project_root.join(&self.state_dir);
    }

    pub fn calendar(&self) -> TurnCalendar {
        TurnCalendar::new(self.start_time, self.start_year, self.tick_term_minutes)
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }

    /// Write the commented default file unless one exists. Returns its path.
    pub fn write_default(project_root: &Path) -> Result<PathBuf> {
        let config_path = project_root.join(CONFIG_PATH);
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        if !config_path.exists() {
            std::fs::write(&config_path, DEFAULT_CONFIG_YAML)
                .with_context(|| format!("Failed to write {}", config_path.display()))?;
        }
        Ok(config_path)
    }
}
