//! Remote file access.
//!
//! The engine only ever sees the game server's files through
//! [`RemoteFileAccessor`]: a stat for the size, a ranged read for the new
//! bytes, and whole-file read/write. Absence of a file is reported as the
//! distinct [`AccessError::NotFound`] so the poller can treat it as "not
//! yet", not as a failure.
//!
//! Two implementations ship with the crate: [`LocalFileAccessor`] for logs
//! reachable on a mounted filesystem, and [`MemoryFileAccessor`] for
//! embedding and tests.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Errors surfaced by a [`RemoteFileAccessor`].
#[derive(Error, Debug)]
pub enum AccessError {
    /// The file does not exist (yet).
    #[error("file not found: {0}")]
    NotFound(String),

    /// Local or transport-level I/O failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The remote side refused or failed the request.
    #[error("remote error: {0}")]
    Remote(String),
}

impl AccessError {
    fn from_io(path: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_string())
        } else {
            Self::Io {
                path: path.to_string(),
                source,
            }
        }
    }

    /// Whether this error means the file is absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result of a stat call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Current size in bytes.
    pub size: u64,
}

/// File operations against the host running the game server.
#[async_trait]
pub trait RemoteFileAccessor: Send + Sync {
    /// Returns the current size of `path`.
    async fn stat(&self, path: &str) -> Result<FileStat, AccessError>;

    /// Reads bytes `[start, end)` of `path`. May return fewer bytes if the
    /// file is shorter than `end`.
    async fn read_range(&self, path: &str, start: u64, end: u64) -> Result<Vec<u8>, AccessError>;

    /// Reads the whole file.
    async fn read_full(&self, path: &str) -> Result<Vec<u8>, AccessError>;

    /// Replaces the whole file.
    async fn write_full(&self, path: &str, bytes: &[u8]) -> Result<(), AccessError>;
}

/// Accessor for files on a local or mounted filesystem, resolved relative
/// to a root directory.
#[derive(Debug, Clone)]
pub struct LocalFileAccessor {
    root: PathBuf,
}

impl LocalFileAccessor {
    /// Creates an accessor rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl RemoteFileAccessor for LocalFileAccessor {
    async fn stat(&self, path: &str) -> Result<FileStat, AccessError> {
        let meta = tokio::fs::metadata(self.resolve(path))
            .await
            .map_err(|e| AccessError::from_io(path, e))?;
        Ok(FileStat { size: meta.len() })
    }

    async fn read_range(&self, path: &str, start: u64, end: u64) -> Result<Vec<u8>, AccessError> {
        let mut file = tokio::fs::File::open(self.resolve(path))
            .await
            .map_err(|e| AccessError::from_io(path, e))?;
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|e| AccessError::from_io(path, e))?;

        let mut bytes = Vec::with_capacity(end.saturating_sub(start) as usize);
        file.take(end.saturating_sub(start))
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| AccessError::from_io(path, e))?;
        Ok(bytes)
    }

    async fn read_full(&self, path: &str) -> Result<Vec<u8>, AccessError> {
        tokio::fs::read(self.resolve(path))
            .await
            .map_err(|e| AccessError::from_io(path, e))
    }

    async fn write_full(&self, path: &str, bytes: &[u8]) -> Result<(), AccessError> {
        tokio::fs::write(self.resolve(path), bytes)
            .await
            .map_err(|e| AccessError::from_io(path, e))
    }
}

/// In-memory accessor. Files can be replaced, appended to, or removed
/// between polls, and ranged reads can be made to fail a number of times.
#[derive(Debug, Default)]
pub struct MemoryFileAccessor {
    files: Mutex<HashMap<String, Vec<u8>>>,
    failing_reads: AtomicUsize,
    failing_paths: Mutex<HashMap<String, usize>>,
}

impl MemoryFileAccessor {
    /// Creates an accessor with no files.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the content of `path`.
    pub fn set(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        self.files().insert(path.to_string(), bytes.into());
    }

    /// Appends to `path`, creating it if needed.
    pub fn append(&self, path: &str, bytes: impl AsRef<[u8]>) {
        self.files()
            .entry(path.to_string())
            .or_default()
            .extend_from_slice(bytes.as_ref());
    }

    /// Removes `path`.
    pub fn remove(&self, path: &str) {
        self.files().remove(path);
    }

    /// Makes the next `count` ranged reads fail with a remote error.
    pub fn fail_next_reads(&self, count: usize) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` ranged reads of `path` fail; other files are
    /// unaffected.
    pub fn fail_next_reads_of(&self, path: &str, count: usize) {
        self.failing_paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), count);
    }

    fn take_failure(&self, path: &str) -> bool {
        let mut paths = self.failing_paths.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(remaining) = paths.get_mut(path).filter(|n| **n > 0) {
            *remaining -= 1;
            return true;
        }
        drop(paths);

        let failing = self.failing_reads.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_reads.store(failing - 1, Ordering::SeqCst);
            return true;
        }
        false
    }
}

#[async_trait]
impl RemoteFileAccessor for MemoryFileAccessor {
    async fn stat(&self, path: &str) -> Result<FileStat, AccessError> {
        self.files()
            .get(path)
            .map(|bytes| FileStat {
                size: bytes.len() as u64,
            })
            .ok_or_else(|| AccessError::NotFound(path.to_string()))
    }

    async fn read_range(&self, path: &str, start: u64, end: u64) -> Result<Vec<u8>, AccessError> {
        if self.take_failure(path) {
            return Err(AccessError::Remote(format!("simulated read failure on {path}")));
        }

        let files = self.files();
        let bytes = files
            .get(path)
            .ok_or_else(|| AccessError::NotFound(path.to_string()))?;
        let len = bytes.len();
        let start = usize::try_from(start).unwrap_or(len).min(len);
        let end = usize::try_from(end).unwrap_or(len).clamp(start, len);
        Ok(bytes[start..end].to_vec())
    }

    async fn read_full(&self, path: &str) -> Result<Vec<u8>, AccessError> {
        self.files()
            .get(path)
            .cloned()
            .ok_or_else(|| AccessError::NotFound(path.to_string()))
    }

    async fn write_full(&self, path: &str, bytes: &[u8]) -> Result<(), AccessError> {
        self.set(path, bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn local_stat_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let accessor = LocalFileAccessor::new(dir.path());
        let err = accessor.stat("missing.log").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn local_range_read_returns_requested_slice() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("game.log")).unwrap();
        file.write_all(b"0123456789").unwrap();

        let accessor = LocalFileAccessor::new(dir.path());
        assert_eq!(accessor.stat("game.log").await.unwrap().size, 10);
        assert_eq!(accessor.read_range("game.log", 3, 7).await.unwrap(), b"3456");
        assert_eq!(accessor.read_range("game.log", 8, 20).await.unwrap(), b"89");
    }

    #[tokio::test]
    async fn local_write_then_read_full() {
        let dir = tempfile::tempdir().unwrap();
        let accessor = LocalFileAccessor::new(dir.path());
        accessor.write_full("notes.txt", b"hello").await.unwrap();
        assert_eq!(accessor.read_full("notes.txt").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn memory_accessor_failures_are_counted_down() {
        let accessor = MemoryFileAccessor::new();
        accessor.set("game.log", b"abc".to_vec());
        accessor.fail_next_reads(1);

        assert!(matches!(
            accessor.read_range("game.log", 0, 3).await,
            Err(AccessError::Remote(_))
        ));
        assert_eq!(accessor.read_range("game.log", 0, 3).await.unwrap(), b"abc");
    }

    #[tokio::test]
    async fn memory_accessor_path_failures_leave_other_files_alone() {
        let accessor = MemoryFileAccessor::new();
        accessor.set("game.log", b"abc".to_vec());
        accessor.set("admin.log", b"xyz".to_vec());
        accessor.fail_next_reads_of("admin.log", 1);

        assert_eq!(accessor.read_range("game.log", 0, 3).await.unwrap(), b"abc");
        assert!(accessor.read_range("admin.log", 0, 3).await.is_err());
        assert_eq!(accessor.read_range("admin.log", 0, 3).await.unwrap(), b"xyz");
    }

    #[tokio::test]
    async fn memory_accessor_clamps_ranges() {
        let accessor = MemoryFileAccessor::new();
        accessor.set("game.log", b"abc".to_vec());
        assert_eq!(accessor.read_range("game.log", 1, 99).await.unwrap(), b"bc");
        assert!(accessor.read_range("game.log", 5, 9).await.unwrap().is_empty());
    }
}
