//! Tail cursors and their persisted record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read position for one watched file.
///
/// Only the [`Poller`](crate::poller::Poller) mutates cursors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailCursor {
    /// Path of the file on the remote host.
    pub path: String,

    /// Number of bytes consumed so far.
    pub last_size: u64,

    /// Whether the file has been observed at least once.
    pub initialized: bool,

    /// Bytes after the last complete line, awaiting their terminator.
    pub partial: Vec<u8>,

    /// Offset restored from a previous run, applied at the first stat.
    seed: Option<u64>,
}

impl TailCursor {
    /// Creates a cursor that has never observed its file.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            last_size: 0,
            initialized: false,
            partial: Vec::new(),
            seed: None,
        }
    }

    /// Creates a cursor that resumes from a persisted offset, provided the
    /// offset is still within the file when it is first observed.
    #[must_use]
    pub fn resuming(path: impl Into<String>, offset: u64) -> Self {
        Self {
            seed: Some(offset),
            ..Self::new(path)
        }
    }

    /// Applies the persisted offset against the file's current size.
    ///
    /// A seed beyond the current size is discarded and the cursor stays
    /// uninitialized, so the file is picked up at its end.
    pub(crate) fn apply_seed(&mut self, size: u64) {
        if let Some(seed) = self.seed.take() {
            if seed <= size {
                self.last_size = seed;
                self.initialized = true;
            }
        }
    }

    /// Resets the cursor after the file shrank.
    pub(crate) fn reset(&mut self) {
        self.last_size = 0;
        self.partial.clear();
    }

    /// Offset safe to persist: everything before the carried partial line.
    ///
    /// Resuming from here re-reads the unterminated tail instead of
    /// dropping it.
    #[must_use]
    pub fn committed_offset(&self) -> Option<u64> {
        if self.initialized {
            Some(self.last_size.saturating_sub(self.partial.len() as u64))
        } else {
            self.seed
        }
    }
}

/// Durable form of all cursors, written after each successful poll pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorRecord {
    /// Committed byte offset per file path.
    #[serde(default)]
    pub files: BTreeMap<String, u64>,

    /// When the record was written.
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl CursorRecord {
    /// Builds a record from the current cursors.
    #[must_use]
    pub fn from_cursors<'a>(
        cursors: impl IntoIterator<Item = &'a TailCursor>,
        saved_at: DateTime<Utc>,
    ) -> Self {
        let files = cursors
            .into_iter()
            .filter_map(|c| c.committed_offset().map(|offset| (c.path.clone(), offset)))
            .collect();
        Self {
            files,
            saved_at: Some(saved_at),
        }
    }

    /// Creates the cursor for `path`, resuming when an offset is recorded.
    #[must_use]
    pub fn cursor_for(&self, path: &str) -> TailCursor {
        match self.files.get(path) {
            Some(offset) => TailCursor::resuming(path, *offset),
            None => TailCursor::new(path),
        }
    }
}
