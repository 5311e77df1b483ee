//! Configuration from environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `LOGWARDEN_LOG_DIR` | Yes | - | Directory the watched log files are read from |
//! | `LOGWARDEN_LOG_FILES` | No | `game.log,admin.log` | Comma-separated watched files, relative to the log dir |
//! | `LOGWARDEN_STATE_DIR` | No | `~/.logwarden` | Directory for cursor, day counter and kill log state |
//! | `LOGWARDEN_SOURCE_ID` | No | hostname | Identifier sent with every notification |
//! | `LOGWARDEN_POLL_INTERVAL_SECS` | No | 10 | Seconds between polls |
//! | `LOGWARDEN_ATTRIBUTION_WINDOW_SECS` | No | 300 | Max seconds between damage and death for a kill |
//! | `LOGWARDEN_DEATH_LOOP_THRESHOLD` | No | 3 | Deaths in a window that count as a loop (>= 2) |
//! | `LOGWARDEN_DEATH_LOOP_WINDOW_SECS` | No | 300 | Length of a death-loop window |
//! | `LOGWARDEN_LOOT_BATCH_SECS` | No | 120 | Loot batch flush delay |
//! | `LOGWARDEN_BUILD_BATCH_SECS` | No | 120 | Build batch flush delay |
//! | `LOGWARDEN_RAID_BATCH_SECS` | No | 60 | Raid batch flush delay |
//! | `LOGWARDEN_TZ_OFFSET` | No | `+00:00` | Offset of log timestamps and calendar days (`±HH:MM`) |
//! | `LOGWARDEN_KILL_LOG_SIZE` | No | 50 | Kill log capacity |
//! | `LOGWARDEN_WEBHOOK_URL` | No | - | Webhook receiving notifications; logged only when unset |
//! | `LOGWARDEN_NOTIFY_CONNECTIONS` | No | `false` | Notify individual connects and disconnects |
//!
//! # Example
//!
//! ```no_run
//! use logwarden_monitor::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("Watching: {:?}", config.log_files);
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use directories::BaseDirs;
use thiserror::Error;

use crate::engine::EngineConfig;

/// Default watched files.
const DEFAULT_LOG_FILES: &[&str] = &["game.log", "admin.log"];

/// Default state directory name relative to home.
const DEFAULT_STATE_DIR: &str = ".logwarden";

const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_ATTRIBUTION_WINDOW_SECS: u64 = 300;
const DEFAULT_DEATH_LOOP_THRESHOLD: u32 = 3;
const DEFAULT_DEATH_LOOP_WINDOW_SECS: u64 = 300;
const DEFAULT_LOOT_BATCH_SECS: u64 = 120;
const DEFAULT_BUILD_BATCH_SECS: u64 = 120;
const DEFAULT_RAID_BATCH_SECS: u64 = 60;
const DEFAULT_KILL_LOG_SIZE: usize = 50;

/// Smallest death-loop threshold that still lets one death through.
const MIN_DEATH_LOOP_THRESHOLD: u32 = 2;

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine home directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,
}

/// Configuration for the monitor binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory the local accessor reads from.
    pub log_dir: PathBuf,

    /// Watched files, relative to `log_dir`, in poll order.
    pub log_files: Vec<String>,

    /// Directory holding the persisted state files.
    pub state_dir: PathBuf,

    /// Identifier attached to outgoing notifications.
    pub source_id: String,

    pub poll_interval: Duration,
    pub attribution_window: Duration,
    pub death_loop_threshold: u32,
    pub death_loop_window: Duration,
    pub loot_batch_delay: Duration,
    pub build_batch_delay: Duration,
    pub raid_batch_delay: Duration,

    /// Offset used for log timestamps and for deciding the calendar day.
    pub tz_offset: FixedOffset,

    pub kill_log_size: usize,

    /// Webhook URL. `None` selects the logging sink.
    pub webhook_url: Option<String>,

    pub notify_connections: bool,
}

impl Config {
    /// Creates a new `Config` by parsing environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - `LOGWARDEN_LOG_DIR` is not set
    /// - a numeric variable is set but not a valid integer, or below its minimum
    /// - `LOGWARDEN_TZ_OFFSET` is not of the form `±HH:MM`
    /// - the home directory cannot be determined and no state dir is given
    pub fn from_env() -> Result<Self, ConfigError> {
        let log_dir = env::var("LOGWARDEN_LOG_DIR")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::MissingEnvVar("LOGWARDEN_LOG_DIR".to_string()))?;

        let log_files = match env::var("LOGWARDEN_LOG_FILES") {
            Ok(val) => {
                let files: Vec<String> = val
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if files.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        key: "LOGWARDEN_LOG_FILES".to_string(),
                        message: "at least one file is required".to_string(),
                    });
                }
                files
            }
            Err(_) => DEFAULT_LOG_FILES.iter().map(|s| (*s).to_string()).collect(),
        };

        let state_dir = match env::var("LOGWARDEN_STATE_DIR") {
            Ok(val) => PathBuf::from(val),
            Err(_) => BaseDirs::new()
                .ok_or(ConfigError::NoHomeDirectory)?
                .home_dir()
                .join(DEFAULT_STATE_DIR),
        };

        let source_id = env::var("LOGWARDEN_SOURCE_ID").unwrap_or_else(|_| get_hostname());

        let death_loop_threshold = match env::var("LOGWARDEN_DEATH_LOOP_THRESHOLD") {
            Ok(val) => {
                let n = val.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                    key: "LOGWARDEN_DEATH_LOOP_THRESHOLD".to_string(),
                    message: format!("expected positive integer, got '{val}'"),
                })?;
                if n < MIN_DEATH_LOOP_THRESHOLD {
                    return Err(ConfigError::InvalidValue {
                        key: "LOGWARDEN_DEATH_LOOP_THRESHOLD".to_string(),
                        message: format!(
                            "threshold must be at least {MIN_DEATH_LOOP_THRESHOLD}, got {n}"
                        ),
                    });
                }
                n
            }
            Err(_) => DEFAULT_DEATH_LOOP_THRESHOLD,
        };

        let tz_offset = match env::var("LOGWARDEN_TZ_OFFSET") {
            Ok(val) => parse_offset(&val).ok_or_else(|| ConfigError::InvalidValue {
                key: "LOGWARDEN_TZ_OFFSET".to_string(),
                message: format!("expected ±HH:MM, got '{val}'"),
            })?,
            Err(_) => Utc.fix(),
        };

        let notify_connections = match env::var("LOGWARDEN_NOTIFY_CONNECTIONS") {
            Ok(val) => parse_bool(&val).ok_or_else(|| ConfigError::InvalidValue {
                key: "LOGWARDEN_NOTIFY_CONNECTIONS".to_string(),
                message: format!("expected true or false, got '{val}'"),
            })?,
            Err(_) => false,
        };

        let kill_log_size = positive("LOGWARDEN_KILL_LOG_SIZE", DEFAULT_KILL_LOG_SIZE as u64)?;

        Ok(Self {
            log_dir,
            log_files,
            state_dir,
            source_id,
            poll_interval: seconds("LOGWARDEN_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?,
            attribution_window: seconds(
                "LOGWARDEN_ATTRIBUTION_WINDOW_SECS",
                DEFAULT_ATTRIBUTION_WINDOW_SECS,
            )?,
            death_loop_threshold,
            death_loop_window: seconds(
                "LOGWARDEN_DEATH_LOOP_WINDOW_SECS",
                DEFAULT_DEATH_LOOP_WINDOW_SECS,
            )?,
            loot_batch_delay: seconds("LOGWARDEN_LOOT_BATCH_SECS", DEFAULT_LOOT_BATCH_SECS)?,
            build_batch_delay: seconds("LOGWARDEN_BUILD_BATCH_SECS", DEFAULT_BUILD_BATCH_SECS)?,
            raid_batch_delay: seconds("LOGWARDEN_RAID_BATCH_SECS", DEFAULT_RAID_BATCH_SECS)?,
            tz_offset,
            kill_log_size: usize::try_from(kill_log_size).unwrap_or(DEFAULT_KILL_LOG_SIZE),
            webhook_url: env::var("LOGWARDEN_WEBHOOK_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            notify_connections,
        })
    }

    /// Engine settings derived from this configuration.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            files: self.log_files.clone(),
            state_dir: Some(self.state_dir.clone()),
            attribution_window: self.attribution_window,
            death_loop_threshold: self.death_loop_threshold,
            death_loop_window: self.death_loop_window,
            loot_batch_delay: self.loot_batch_delay,
            build_batch_delay: self.build_batch_delay,
            raid_batch_delay: self.raid_batch_delay,
            kill_log_size: self.kill_log_size,
            notify_connections: self.notify_connections,
        }
    }
}

/// Reads a positive integer variable, falling back to `default` when unset.
fn positive(key: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(val) => {
            let n = val.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected positive integer, got '{val}'"),
            })?;
            if n == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "value must be greater than 0".to_string(),
                });
            }
            Ok(n)
        }
        Err(_) => Ok(default),
    }
}

fn seconds(key: &str, default: u64) -> Result<Duration, ConfigError> {
    positive(key, default).map(Duration::from_secs)
}

/// Parses `+HH:MM`, `-HH:MM` or `Z`.
fn parse_offset(val: &str) -> Option<FixedOffset> {
    let val = val.trim();
    if val.eq_ignore_ascii_case("z") {
        return Some(Utc.fix());
    }
    let (sign, rest) = match val.as_bytes().first()? {
        b'+' => (1, &val[1..]),
        b'-' => (-1, &val[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Gets the system hostname, falling back to "unknown" if it cannot be determined.
fn get_hostname() -> String {
    gethostname::gethostname()
        .into_string()
        .unwrap_or_else(|_| "unknown".to_string())
}
