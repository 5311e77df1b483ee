//! Ring buffer of recent kill attributions, persisted as `kill_log.json`.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::statefile::{self, StateFileError};
use crate::types::{Actor, Timestamp};

/// One attributed player kill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillRecord {
    pub victim: Actor,
    pub attacker: Actor,
    pub total_damage: f64,
    pub timestamp: Timestamp,
}

/// Keeps the last `capacity` kills. The oldest record is evicted first.
#[derive(Debug)]
pub struct KillLog {
    path: Option<PathBuf>,
    capacity: usize,
    records: VecDeque<KillRecord>,
}

impl KillLog {
    /// Loads the log from `path`, repairing a corrupt file.
    #[must_use]
    pub fn load(path: &Path, capacity: usize) -> Self {
        let records: Vec<KillRecord> = statefile::load_or_repair(path);
        let mut log = Self {
            path: Some(path.to_path_buf()),
            capacity: capacity.max(1),
            records: VecDeque::new(),
        };
        for record in records {
            log.push_bounded(record);
        }
        log
    }

    /// A log that is never written to disk.
    #[must_use]
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            path: None,
            capacity: capacity.max(1),
            records: VecDeque::new(),
        }
    }

    fn push_bounded(&mut self, record: KillRecord) {
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Appends `record` and persists the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the log could not be written. The in-memory
    /// buffer is updated regardless.
    pub fn push(&mut self, record: KillRecord) -> Result<(), StateFileError> {
        self.push_bounded(record);
        self.save()
    }

    /// Writes the current buffer to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the atomic write fails.
    pub fn save(&self) -> Result<(), StateFileError> {
        match &self.path {
            Some(path) => statefile::write_atomic(path, &self.records),
            None => Ok(()),
        }
    }

    /// Records from oldest to newest.
    pub fn records(&self) -> impl Iterator<Item = &KillRecord> {
        self.records.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn record(victim: &str) -> KillRecord {
        KillRecord {
            victim: Actor::new(victim, None),
            attacker: Actor::new("Bob", Some(2)),
            total_damage: 50.0,
            timestamp: FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2026, 2, 1, 10, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut log = KillLog::in_memory(2);
        log.push(record("a")).unwrap();
        log.push(record("b")).unwrap();
        log.push(record("c")).unwrap();

        let victims: Vec<_> = log.records().map(|r| r.victim.name.as_str()).collect();
        assert_eq!(victims, ["b", "c"]);
    }

    #[test]
    fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kill_log.json");
        {
            let mut log = KillLog::load(&path, 10);
            log.push(record("a")).unwrap();
        }
        let log = KillLog::load(&path, 10);
        assert_eq!(log.len(), 1);
        assert_eq!(log.records().next().unwrap().attacker.id, Some(2));
    }

    #[test]
    fn reload_with_smaller_capacity_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kill_log.json");
        {
            let mut log = KillLog::load(&path, 10);
            for v in ["a", "b", "c"] {
                log.push(record(v)).unwrap();
            }
        }
        let log = KillLog::load(&path, 1);
        assert_eq!(log.records().next().unwrap().victim.name, "c");
    }
}
