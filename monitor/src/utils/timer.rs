//! Deadline-based one-shot timers.
//!
//! A [`Timer`] owns its own armed/disarmed state. It never sleeps by itself:
//! the host loop asks for the earliest deadline across all timers, waits
//! until then, and calls back into whatever owns the timer. Tests move a
//! manual clock instead of waiting.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// A single deadline that is either armed or not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<DateTime<Utc>>,
}

impl Timer {
    /// Creates a disarmed timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer to fire `delay` after `now`, unless it is already armed.
    ///
    /// Returns `true` if this call armed the timer.
    pub fn arm(&mut self, now: DateTime<Utc>, delay: Duration) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(now + to_delta(delay));
        true
    }

    /// Arms the timer for `deadline`, replacing any existing deadline.
    pub fn arm_at(&mut self, deadline: DateTime<Utc>) {
        self.deadline = Some(deadline);
    }

    /// Disarms the timer.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Whether the timer is armed and its deadline has passed.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|d| d <= now)
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }
}

/// Converts a std duration to a chrono delta, saturating on overflow.
#[must_use]
pub fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

/// The earliest of a set of optional deadlines.
pub fn earliest<I>(deadlines: I) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = Option<DateTime<Utc>>>,
{
    deadlines.into_iter().flatten().min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn arm_does_not_extend_an_armed_timer() {
        let mut timer = Timer::new();
        assert!(timer.arm(t0(), Duration::from_secs(60)));
        assert!(!timer.arm(t0() + TimeDelta::seconds(30), Duration::from_secs(60)));
        assert_eq!(timer.deadline(), Some(t0() + TimeDelta::seconds(60)));
    }

    #[test]
    fn due_only_after_deadline() {
        let mut timer = Timer::new();
        timer.arm(t0(), Duration::from_secs(60));
        assert!(!timer.is_due(t0() + TimeDelta::seconds(59)));
        assert!(timer.is_due(t0() + TimeDelta::seconds(60)));
    }

    #[test]
    fn cancel_disarms() {
        let mut timer = Timer::new();
        timer.arm(t0(), Duration::from_secs(1));
        timer.cancel();
        assert!(!timer.is_armed());
        assert!(!timer.is_due(t0() + TimeDelta::hours(1)));
    }

    #[test]
    fn earliest_skips_disarmed() {
        let a = Some(t0() + TimeDelta::seconds(5));
        let b = Some(t0() + TimeDelta::seconds(2));
        assert_eq!(earliest([a, None, b]), b);
        assert_eq!(earliest([None, None]), None);
    }
}
