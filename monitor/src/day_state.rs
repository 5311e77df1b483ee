//! Per-day event counters with rollover.
//!
//! The counters belong to one calendar day. When a later day is observed,
//! either through [`DayState::check_rollover`] or through an event dated on
//! that day, the finished day is summarized exactly once and the counters
//! restart at zero. State is persisted after every mutation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::statefile;

/// What a day counter counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterKind {
    Deaths,
    PvpKills,
    Builds,
    Loots,
    Raids,
    AdminAccess,
    CheatFlags,
    Connects,
    Disconnects,
}

impl CounterKind {
    /// Human-readable label for summaries.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Deaths => "Deaths",
            Self::PvpKills => "PvP kills",
            Self::Builds => "Builds",
            Self::Loots => "Loots",
            Self::Raids => "Raids",
            Self::AdminAccess => "Admin access",
            Self::CheatFlags => "Anti-cheat flags",
            Self::Connects => "Connects",
            Self::Disconnects => "Disconnects",
        }
    }
}

/// Persisted counters for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCounters {
    pub date: NaiveDate,
    #[serde(default)]
    pub counts: BTreeMap<CounterKind, u64>,
}

impl DayCounters {
    #[must_use]
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            counts: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, kind: CounterKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    fn summary(&self) -> Option<DaySummary> {
        let counts: BTreeMap<_, _> = self
            .counts
            .iter()
            .filter(|&(_, &n)| n > 0)
            .map(|(&k, &n)| (k, n))
            .collect();
        if counts.is_empty() {
            return None;
        }
        Some(DaySummary {
            date: self.date,
            counts,
        })
    }
}

/// The non-zero counters of a finished day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub counts: BTreeMap<CounterKind, u64>,
}

impl DaySummary {
    #[must_use]
    pub fn get(&self, kind: CounterKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// Owns the live [`DayCounters`].
#[derive(Debug)]
pub struct DayState {
    path: Option<PathBuf>,
    counters: DayCounters,
    late_events: u64,
}

impl DayState {
    /// Loads counters from `path`.
    ///
    /// If the stored day is earlier than `today` and has any non-zero count,
    /// its summary is returned so the caller can deliver it before the new
    /// day begins.
    pub fn load(path: &Path, today: NaiveDate) -> (Self, Option<DaySummary>) {
        let stored: Option<DayCounters> = statefile::load_or_repair(path);
        let mut state = Self {
            path: Some(path.to_path_buf()),
            counters: stored.unwrap_or_else(|| DayCounters::new(today)),
            late_events: 0,
        };
        let summary = state.check_rollover(today);
        if summary.is_some() {
            info!(date = %state.counters.date, "Summarizing day left over from previous run");
        }
        state.persist();
        (state, summary)
    }

    /// Counters that are never written to disk.
    #[must_use]
    pub fn in_memory(today: NaiveDate) -> Self {
        Self {
            path: None,
            counters: DayCounters::new(today),
            late_events: 0,
        }
    }

    #[must_use]
    pub fn counters(&self) -> &DayCounters {
        &self.counters
    }

    /// Events dated before the live day that were counted toward it since
    /// this process started.
    #[must_use]
    pub fn late_events(&self) -> u64 {
        self.late_events
    }

    /// Bumps `kind` for an event that happened on `on_date`.
    ///
    /// An event dated after the live day rolls the counters over first; the
    /// summary of the finished day is returned. An event dated earlier is
    /// counted toward the live day.
    pub fn incr(&mut self, kind: CounterKind, on_date: NaiveDate) -> Option<DaySummary> {
        if on_date < self.counters.date {
            self.late_events += 1;
            debug!(
                counter = kind.label(),
                event_date = %on_date,
                live_date = %self.counters.date,
                "Event from a finished day counted toward the live day"
            );
        }
        let summary = self.roll_to(on_date);
        *self.counters.counts.entry(kind).or_insert(0) += 1;
        self.persist();
        summary
    }

    /// Rolls the counters over if `today` is after the live day.
    pub fn check_rollover(&mut self, today: NaiveDate) -> Option<DaySummary> {
        if today <= self.counters.date {
            return None;
        }
        let summary = self.roll_to(today);
        self.persist();
        summary
    }

    fn roll_to(&mut self, date: NaiveDate) -> Option<DaySummary> {
        if date <= self.counters.date {
            return None;
        }
        let summary = self.counters.summary();
        info!(
            from = %self.counters.date,
            to = %date,
            total = summary.as_ref().map_or(0, DaySummary::total),
            "Day rollover"
        );
        self.counters = DayCounters::new(date);
        summary
    }

    /// Writes the counters to disk. Failures are logged, not returned.
    pub fn persist(&self) {
        if let Some(path) = &self.path {
            if let Err(e) = statefile::write_atomic(path, &self.counters) {
                warn!(path = %path.display(), error = %e, "Failed to persist day counters");
            }
        }
    }
}
