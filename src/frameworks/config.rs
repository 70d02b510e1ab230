use crate::domain::tuning::GameTuning;
use std::{env, fmt, io, time::Duration};

/// Problems with the process configuration, as opposed to session data.
#[derive(Debug)]
pub enum ConfigError {
    ReadTuning { path: String, source: io::Error },
    ParseTuning { path: String, source: toml::de::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadTuning { path, source } => {
                write!(f, "failed to read tuning file {path}: {source}")
            }
            ConfigError::ParseTuning { path, source } => {
                write!(f, "invalid tuning file {path}: {source}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadTuning { source, .. } => Some(source),
            ConfigError::ParseTuning { source, .. } => Some(source),
        }
    }
}

// Runtime constants (not gameplay tuning).

fn millis_var(name: &str, default: u64) -> Duration {
    let millis = env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default);
    Duration::from_millis(millis)
}

pub fn frame_interval() -> Duration {
    millis_var("FRAME_INTERVAL_MS", 16)
}

pub fn input_publish_interval() -> Duration {
    millis_var("INPUT_PUBLISH_MS", 50)
}

pub fn world_publish_interval() -> Duration {
    millis_var("WORLD_PUBLISH_MS", 50)
}

pub fn demo_participants() -> usize {
    env::var("DEMO_PARTICIPANTS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(2)
}

pub fn demo_duration() -> Duration {
    let secs = env::var("DEMO_SECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(30);
    Duration::from_secs(secs)
}

/// Gameplay tuning, optionally overridden by the TOML file named in `TUNING_FILE`.
pub fn game_tuning() -> Result<GameTuning, ConfigError> {
    match env::var("TUNING_FILE") {
        Ok(path) => load_tuning(&path),
        Err(_) => Ok(GameTuning::default()),
    }
}

pub fn load_tuning(path: &str) -> Result<GameTuning, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadTuning {
        path: path.to_string(),
        source,
    })?;
    parse_tuning(&raw).map_err(|source| ConfigError::ParseTuning {
        path: path.to_string(),
        source,
    })
}

pub fn parse_tuning(raw: &str) -> Result<GameTuning, toml::de::Error> {
    toml::from_str(raw)
}

pub const INBOX_CAPACITY: usize = 256;
pub const WRITE_QUEUE_CAPACITY: usize = 256;
pub const COMMAND_CHANNEL_CAPACITY: usize = 32;
