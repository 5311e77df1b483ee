//! Incremental polling of watched log files.
//!
//! Each pass stats every watched file in order and, per file:
//!
//! 1. A missing file is skipped; its cursor is left as it is.
//! 2. A size below the consumed offset means rotation or truncation: the
//!    cursor restarts at 0 and the carried partial line is dropped.
//! 3. The first observation of a file records its size and reads nothing,
//!    so history is never replayed on a fresh start. A persisted offset that
//!    still fits the file resumes from there instead.
//! 4. An unchanged size is a no-op.
//! 5. Otherwise the new byte range is fetched and split into lines.
//!
//! A single fetch is capped at [`DEFAULT_MAX_FETCH_BYTES`]; a larger backlog
//! is drained over consecutive passes. The carried partial line is capped at
//! [`MAX_PARTIAL_BYTES`] and the rest of an unterminated line is dropped.
//!
//! A failed fetch leaves the cursor untouched, so the same range is retried
//! on the next pass. Delivery of byte ranges is at-least-once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace, warn};

use crate::accessor::{AccessError, RemoteFileAccessor};
use crate::cursor::{CursorRecord, TailCursor};
use crate::splitter::{cap_partial, split, MAX_PARTIAL_BYTES};

/// Upper bound on the bytes requested from one file in one pass.
pub const DEFAULT_MAX_FETCH_BYTES: u64 = 4 * 1024 * 1024;

/// Lines read from one file during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePoll {
    pub path: String,
    pub lines: Vec<String>,
}

/// Outcome of one pass over all watched files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollPass {
    /// Per-file lines, in the order the files are watched.
    pub files: Vec<FilePoll>,

    /// Number of files whose stat or fetch failed.
    pub failures: usize,
}

impl PollPass {
    /// Whether every file was polled without error.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures == 0
    }

    /// Total number of complete lines read.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.files.iter().map(|f| f.lines.len()).sum()
    }
}

/// Owns the cursors of all watched files.
pub struct Poller {
    accessor: Arc<dyn RemoteFileAccessor>,
    cursors: Vec<TailCursor>,
    max_fetch: u64,
}

impl Poller {
    /// Creates a poller for `paths`, resuming from `record` where possible.
    #[must_use]
    pub fn new(accessor: Arc<dyn RemoteFileAccessor>, paths: &[String], record: &CursorRecord) -> Self {
        let cursors = paths.iter().map(|p| record.cursor_for(p)).collect();
        Self {
            accessor,
            cursors,
            max_fetch: DEFAULT_MAX_FETCH_BYTES,
        }
    }

    /// Overrides the per-file fetch cap. Zero is treated as one byte.
    #[must_use]
    pub fn with_max_fetch(mut self, bytes: u64) -> Self {
        self.max_fetch = bytes.max(1);
        self
    }

    /// Current cursors, in watch order.
    #[must_use]
    pub fn cursors(&self) -> &[TailCursor] {
        &self.cursors
    }

    /// Durable snapshot of the cursors.
    #[must_use]
    pub fn record(&self, saved_at: DateTime<Utc>) -> CursorRecord {
        CursorRecord::from_cursors(&self.cursors, saved_at)
    }

    /// Polls every watched file once, sequentially.
    pub async fn poll(&mut self) -> PollPass {
        let mut pass = PollPass::default();

        for cursor in &mut self.cursors {
            match poll_cursor(self.accessor.as_ref(), cursor, self.max_fetch).await {
                Ok(lines) => pass.files.push(FilePoll {
                    path: cursor.path.clone(),
                    lines,
                }),
                Err(e) => {
                    warn!(path = %cursor.path, error = %e, "Poll failed, will retry next interval");
                    pass.failures += 1;
                }
            }
        }

        pass
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("cursors", &self.cursors)
            .finish_non_exhaustive()
    }
}

/// Advances one cursor, returning the complete lines that became available.
async fn poll_cursor(
    accessor: &dyn RemoteFileAccessor,
    cursor: &mut TailCursor,
    max_fetch: u64,
) -> Result<Vec<String>, AccessError> {
    let size = match accessor.stat(&cursor.path).await {
        Ok(stat) => stat.size,
        Err(AccessError::NotFound(_)) => {
            trace!(path = %cursor.path, "Watched file not present");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    cursor.apply_seed(size);

    if size < cursor.last_size {
        info!(
            path = %cursor.path,
            old_size = cursor.last_size,
            new_size = size,
            "File shrank, treating as rotation"
        );
        cursor.reset();
    }

    if !cursor.initialized {
        cursor.last_size = size;
        cursor.initialized = true;
        info!(path = %cursor.path, size, "Started tailing file at its end");
        return Ok(Vec::new());
    }

    if size == cursor.last_size {
        return Ok(Vec::new());
    }

    let end = size.min(cursor.last_size.saturating_add(max_fetch));
    if end < size {
        debug!(path = %cursor.path, backlog = size - end, "Backlog exceeds fetch cap, continuing next pass");
    }
    let bytes = accessor
        .read_range(&cursor.path, cursor.last_size, end)
        .await?;

    let mut out = split(&cursor.partial, &bytes);
    cursor.last_size += bytes.len() as u64;
    let dropped = cap_partial(&mut out.partial, MAX_PARTIAL_BYTES);
    if dropped > 0 {
        warn!(
            path = %cursor.path,
            dropped,
            max = MAX_PARTIAL_BYTES,
            "Unterminated line too long, dropping the excess"
        );
    }
    cursor.partial = out.partial;

    debug!(
        path = %cursor.path,
        bytes = bytes.len(),
        lines = out.lines.len(),
        offset = cursor.last_size,
        "Read new lines"
    );

    Ok(out.lines)
}
