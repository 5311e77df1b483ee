//! Generic keyed batch with a single flush timer.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::sink::Notification;
use crate::types::Timestamp;
use crate::utils::Timer;

/// Running totals for one key of a batch.
pub trait BatchEntry {
    /// One raw occurrence.
    type Item;

    /// Creates the entry from the first occurrence.
    fn start(item: Self::Item, at: Timestamp) -> Self;

    /// Folds a further occurrence into the entry.
    fn merge(&mut self, item: Self::Item, at: Timestamp);

    /// The notification emitted for this key on flush.
    fn summarize(&self) -> Notification;
}

/// Collects entries per key until the flush timer fires.
///
/// The timer is armed by the first record after a flush and is not pushed
/// back by later records, so a batch never waits longer than `delay`.
#[derive(Debug)]
pub struct BatchAccumulator<K, E> {
    name: &'static str,
    delay: Duration,
    timer: Timer,
    entries: BTreeMap<K, E>,
}

impl<K: Ord, E: BatchEntry> BatchAccumulator<K, E> {
    #[must_use]
    pub fn new(name: &'static str, delay: Duration) -> Self {
        Self {
            name,
            delay,
            timer: Timer::new(),
            entries: BTreeMap::new(),
        }
    }

    /// Adds `item` under `key`, arming the flush timer if needed.
    pub fn record(&mut self, key: K, item: E::Item, at: Timestamp, now: DateTime<Utc>) {
        match self.entries.get_mut(&key) {
            Some(entry) => entry.merge(item, at),
            None => {
                self.entries.insert(key, E::start(item, at));
            }
        }
        if self.timer.arm(now, self.delay) {
            debug!(batch = self.name, deadline = ?self.timer.deadline(), "Batch timer armed");
        }
    }

    /// Summarizes every key, clears the batch and disarms the timer.
    pub fn flush(&mut self) -> Vec<Notification> {
        self.timer.cancel();
        let entries = std::mem::take(&mut self.entries);
        if !entries.is_empty() {
            debug!(batch = self.name, keys = entries.len(), "Batch flushed");
        }
        entries.values().map(E::summarize).collect()
    }

    /// Flushes if the timer is due at `now`.
    pub fn flush_due(&mut self, now: DateTime<Utc>) -> Vec<Notification> {
        if self.timer.is_due(now) {
            self.flush()
        } else {
            Vec::new()
        }
    }

    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.timer.deadline()
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<&E> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Renders per-name counts as `"Wall x3, Door"`.
#[must_use]
pub fn format_counts(counts: &BTreeMap<String, u32>) -> String {
    counts
        .iter()
        .map(|(name, &n)| if n > 1 { format!("{name} x{n}") } else { name.clone() })
        .collect::<Vec<_>>()
        .join(", ")
}
