//! Death-loop suppression.
//!
//! A player's first death opens a window of fixed length measured on log
//! timestamps. Deaths inside the window are counted. Below the threshold
//! each one is notified individually; from the threshold on they are
//! suppressed and a single summary is emitted when the window runs out.
//! Suppression only affects notifications, never the counters.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::types::{Actor, Timestamp};
use crate::utils::{earliest, to_delta, Timer};

#[derive(Debug, Clone)]
struct DeathLoopEntry {
    player: Actor,
    count: u32,
    first: Timestamp,
    last: Timestamp,
    pending_flush: bool,
    timer: Timer,
}

impl DeathLoopEntry {
    fn summary(&self) -> LoopSummary {
        LoopSummary {
            player: self.player.clone(),
            count: self.count,
            first: self.first,
            last: self.last,
        }
    }
}

/// A flushed death loop.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSummary {
    pub player: Actor,
    pub count: u32,
    pub first: Timestamp,
    pub last: Timestamp,
}

/// Result of recording one death.
#[derive(Debug, Clone, PartialEq)]
pub struct DeathOutcome {
    /// Whether this death should be notified on its own.
    pub emit_individual: bool,

    /// A previous over-threshold loop closed by this death.
    pub flushed: Option<LoopSummary>,
}

#[derive(Debug)]
pub struct DeathLoopSuppressor {
    threshold: u32,
    window: Duration,
    entries: HashMap<String, DeathLoopEntry>,
}

impl DeathLoopSuppressor {
    #[must_use]
    pub fn new(threshold: u32, window: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            window,
            entries: HashMap::new(),
        }
    }

    /// Records a death of `player` logged at `at`; `now` arms the flush timer.
    pub fn record_death(&mut self, player: &Actor, at: Timestamp, now: DateTime<Utc>) -> DeathOutcome {
        let key = player.key();
        let window = to_delta(self.window);
        let mut flushed = None;

        if let Some(entry) = self.entries.get(&key) {
            if at.signed_duration_since(entry.first) > window {
                if entry.pending_flush {
                    flushed = Some(entry.summary());
                }
                self.entries.remove(&key);
            }
        }

        let entry = self.entries.entry(key).or_insert_with(|| DeathLoopEntry {
            player: player.clone(),
            count: 0,
            first: at,
            last: at,
            pending_flush: false,
            timer: Timer::new(),
        });
        entry.count += 1;
        entry.last = entry.last.max(at);

        if entry.count < self.threshold {
            return DeathOutcome {
                emit_individual: true,
                flushed,
            };
        }

        if !entry.pending_flush {
            entry.pending_flush = true;
            let elapsed = at.signed_duration_since(entry.first).max(TimeDelta::zero());
            let remaining = (window - elapsed).max(TimeDelta::zero());
            entry.timer.arm_at(now + remaining);
            debug!(player = %player, count = entry.count, "Death loop detected");
        }

        DeathOutcome {
            emit_individual: false,
            flushed,
        }
    }

    /// Emits loops whose flush timer is due.
    pub fn flush_due(&mut self, now: DateTime<Utc>) -> Vec<LoopSummary> {
        let due: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.timer.is_due(now))
            .map(|(k, _)| k.clone())
            .collect();
        let mut summaries: Vec<LoopSummary> = due
            .iter()
            .filter_map(|k| self.entries.remove(k))
            .map(|e| e.summary())
            .collect();
        summaries.sort_by(|a, b| a.first.cmp(&b.first));
        summaries
    }

    /// Emits every pending loop and forgets all entries.
    pub fn flush_all(&mut self) -> Vec<LoopSummary> {
        let mut summaries: Vec<LoopSummary> = self
            .entries
            .drain()
            .filter(|(_, e)| e.pending_flush)
            .map(|(_, e)| e.summary())
            .collect();
        summaries.sort_by(|a, b| a.first.cmp(&b.first));
        summaries
    }

    /// Drops below-threshold entries whose window ended before `reference`.
    pub fn sweep(&mut self, reference: Timestamp) -> usize {
        let window = to_delta(self.window);
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.pending_flush || reference.signed_duration_since(e.first) <= window);
        before - self.entries.len()
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        earliest(self.entries.values().map(|e| e.timer.deadline()))
    }

    /// Deaths counted in the current window for `player`.
    #[must_use]
    pub fn count(&self, player: &Actor) -> u32 {
        self.entries.get(&player.key()).map_or(0, |e| e.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn at(minute: u32) -> Timestamp {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 2, 1, 10, minute, 0)
            .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap()
    }

    fn suppressor() -> DeathLoopSuppressor {
        DeathLoopSuppressor::new(3, Duration::from_secs(300))
    }

    #[test]
    fn threshold_suppresses_and_flushes_once() {
        let mut s = suppressor();
        let alice = Actor::new("Alice", None);

        let emitted: Vec<bool> = (0..3)
            .map(|m| s.record_death(&alice, at(m), now()).emit_individual)
            .collect();
        assert_eq!(emitted, [true, true, false]);

        let deadline = s.next_deadline().unwrap();
        assert_eq!(deadline, now() + TimeDelta::minutes(3));
        assert!(s.flush_due(deadline - TimeDelta::seconds(1)).is_empty());

        let summaries = s.flush_due(deadline);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].count, 3);
        assert!(s.flush_due(deadline + TimeDelta::hours(1)).is_empty());
        assert_eq!(s.next_deadline(), None);
    }

    #[test]
    fn deaths_after_threshold_stay_suppressed() {
        let mut s = suppressor();
        let alice = Actor::new("Alice", None);
        for m in 0..3 {
            s.record_death(&alice, at(m), now());
        }
        let outcome = s.record_death(&alice, at(3), now());
        assert!(!outcome.emit_individual);
        assert_eq!(s.count(&alice), 4);
        assert_eq!(s.next_deadline(), Some(now() + TimeDelta::minutes(3)));
    }

    #[test]
    fn new_window_flushes_pending_loop_immediately() {
        let mut s = suppressor();
        let alice = Actor::new("Alice", None);
        for m in 0..3 {
            s.record_death(&alice, at(m), now());
        }

        let outcome = s.record_death(&alice, at(10), now());
        assert!(outcome.emit_individual);
        assert_eq!(outcome.flushed.unwrap().count, 3);
        assert_eq!(s.count(&alice), 1);
        assert_eq!(s.next_deadline(), None);
    }

    #[test]
    fn below_threshold_window_expires_silently() {
        let mut s = suppressor();
        let alice = Actor::new("Alice", None);
        s.record_death(&alice, at(0), now());
        s.record_death(&alice, at(1), now());

        let outcome = s.record_death(&alice, at(10), now());
        assert!(outcome.emit_individual);
        assert!(outcome.flushed.is_none());
        assert_eq!(s.count(&alice), 1);
    }

    #[test]
    fn players_are_tracked_independently() {
        let mut s = suppressor();
        for m in 0..2 {
            s.record_death(&Actor::new("Alice", None), at(m), now());
        }
        assert!(s.record_death(&Actor::new("Bob", None), at(2), now()).emit_individual);
    }

    #[test]
    fn flush_all_returns_only_pending_loops() {
        let mut s = suppressor();
        for m in 0..3 {
            s.record_death(&Actor::new("Alice", None), at(m), now());
        }
        s.record_death(&Actor::new("Bob", None), at(0), now());

        let summaries = s.flush_all();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].player.name, "Alice");
        assert_eq!(s.count(&Actor::new("Bob", None)), 0);
    }

    #[test]
    fn sweep_keeps_pending_loops() {
        let mut s = suppressor();
        for m in 0..3 {
            s.record_death(&Actor::new("Alice", None), at(m), now());
        }
        s.record_death(&Actor::new("Bob", None), at(0), now());

        assert_eq!(s.sweep(at(30)), 1);
        assert_eq!(s.count(&Actor::new("Alice", None)), 3);
    }
}
