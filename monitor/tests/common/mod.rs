//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use logwarden_monitor::{
    fixed_offset, Engine, EngineConfig, EngineDeps, ManualClock, MemoryFileAccessor, MemorySink,
    MemoryStatStore,
};

pub const GAME_LOG: &str = "game.log";
pub const ADMIN_LOG: &str = "admin.log";

pub struct Harness {
    pub engine: Engine,
    pub files: Arc<MemoryFileAccessor>,
    pub sink: Arc<MemorySink>,
    pub stats: Arc<MemoryStatStore>,
    pub clock: Arc<ManualClock>,
}

pub fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

/// 2026-02-01 10:00 UTC, matching the log lines produced by [`line`].
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap()
}

/// A log line on 1 February 2026 at 10:`minute`.
pub fn line(minute: u32, body: &str) -> String {
    format!("(1/2/2026 10:{minute:02}) {body}\n")
}

pub fn config(state_dir: Option<PathBuf>) -> EngineConfig {
    EngineConfig {
        files: vec![GAME_LOG.to_string(), ADMIN_LOG.to_string()],
        state_dir,
        ..EngineConfig::default()
    }
}

pub fn harness(config: EngineConfig) -> Harness {
    let files = Arc::new(MemoryFileAccessor::new());
    let clock = Arc::new(ManualClock::new(start_time(), utc()));
    harness_with(config, files, clock)
}

pub fn harness_with(
    config: EngineConfig,
    files: Arc<MemoryFileAccessor>,
    clock: Arc<ManualClock>,
) -> Harness {
    let sink = Arc::new(MemorySink::new());
    let stats = Arc::new(MemoryStatStore::new());
    let engine = Engine::new(
        config,
        EngineDeps {
            accessor: files.clone(),
            sink: sink.clone(),
            stats: stats.clone(),
            clock: clock.clone(),
            timestamp: fixed_offset(utc()),
        },
    );
    Harness {
        engine,
        files,
        sink,
        stats,
        clock,
    }
}

/// A harness whose watched files exist and have been observed once, so
/// anything appended afterwards is read.
pub async fn primed(config: EngineConfig) -> Harness {
    let mut h = harness(config);
    h.files.set(GAME_LOG, Vec::new());
    h.files.set(ADMIN_LOG, Vec::new());
    h.engine.poll().await;
    h
}
