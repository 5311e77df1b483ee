//! Logwarden Monitor - incremental game-server log tailing.
//!
//! This crate tails append-only game-server logs through a stat + range-read
//! file accessor and turns new lines into classified events, correlated
//! kills, batched summaries and per-day counters.
//!
//! # Overview
//!
//! Every poll stats each watched file, fetches only the bytes appended since
//! the last poll and splits them into complete lines, carrying an unfinished
//! trailing line over to the next poll. Rotation is detected as a shrinking
//! file. Cursors are persisted atomically, so a restart resumes where the
//! previous run left off.
//!
//! # Modules
//!
//! - [`accessor`]: remote file access (stat, range read) and a local implementation
//! - [`cursor`]: per-file tail cursors and their persisted record
//! - [`splitter`]: line splitting with partial-line carry-over
//! - [`poller`]: the per-file stat / rotate / fetch state machine
//! - [`classifier`]: ordered pattern rules turning lines into events
//! - [`types`]: event types
//! - [`correlator`]: damage ledger and kill attribution
//! - [`aggregators`]: loot, build and raid batches and death-loop suppression
//! - [`day_state`]: per-day counters and rollover
//! - [`kill_log`]: ring buffer of recent kills
//! - [`statefile`]: atomic JSON state files
//! - [`sink`]: notification delivery
//! - [`stats`]: downstream stat stores
//! - [`messages`]: notification formatting
//! - [`clock`]: wall clock and calendar day
//! - [`engine`]: the pipeline tying it all together
//! - [`config`]: configuration from environment variables
//! - [`error`]: error types
//! - [`utils`]: shared utilities

pub mod accessor;
pub mod aggregators;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod correlator;
pub mod cursor;
pub mod day_state;
pub mod engine;
pub mod error;
pub mod kill_log;
pub mod messages;
pub mod poller;
pub mod sink;
pub mod splitter;
pub mod statefile;
pub mod stats;
pub mod types;
pub mod utils;

pub use accessor::{AccessError, FileStat, LocalFileAccessor, MemoryFileAccessor, RemoteFileAccessor};
pub use classifier::{fixed_offset, Classifier};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use engine::{Engine, EngineConfig, EngineDeps, PollReport};
pub use error::{MonitorError, Result};
pub use sink::{LogSink, MemorySink, Notification, NotificationKind, NotificationSink, ThreadKey, WebhookSink};
pub use stats::{MemoryStatStore, NullStatStore, StatStore};
pub use types::{Actor, EventKind, ParsedEvent, Timestamp};
