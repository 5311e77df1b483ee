//! Builders for individually delivered notifications.
//!
//! Batched notifications are built by their aggregators; everything else is
//! formatted here.

use crate::aggregators::LoopSummary;
use crate::correlator::Attribution;
use crate::day_state::DaySummary;
use crate::sink::{Notification, NotificationKind};
use crate::types::{Actor, Timestamp};

/// A death, credited to a killer when one was attributed.
#[must_use]
pub fn death(victim: &Actor, killer: Option<&Attribution>, at: Timestamp) -> Notification {
    match killer {
        Some(k) => Notification::new(
            NotificationKind::PvpKill,
            format!("{} was killed by {}", victim.name, k.attacker.name),
        )
        .field("Victim", victim)
        .field("Killer", &k.attacker)
        .field("Damage", format!("{:.1}", k.total_damage))
        .at(at),
        None => Notification::new(NotificationKind::Death, format!("{} died", victim.name))
            .field("Player", victim)
            .at(at),
    }
}

#[must_use]
pub fn death_loop(summary: &LoopSummary) -> Notification {
    Notification::new(
        NotificationKind::DeathLoop,
        format!("{} looped {} times", summary.player.name, summary.count),
    )
    .field("Player", &summary.player)
    .field("Deaths", summary.count)
    .field("First", summary.first.format("%H:%M"))
    .field("Last", summary.last.format("%H:%M"))
    .at(summary.last)
}

#[must_use]
pub fn admin_access(player: &Actor, at: Timestamp) -> Notification {
    Notification::new(
        NotificationKind::AdminAccess,
        format!("{} was granted admin access", player.name),
    )
    .field("Player", player)
    .at(at)
}

#[must_use]
pub fn cheat_flag(player: &Actor, reason: &str, at: Timestamp) -> Notification {
    Notification::new(
        NotificationKind::CheatFlag,
        format!("Anti-cheat flagged {}", player.name),
    )
    .field("Player", player)
    .field("Reason", reason)
    .at(at)
}

#[must_use]
pub fn connection(player: &Actor, connected: bool, at: Timestamp) -> Notification {
    let (kind, verb) = if connected {
        (NotificationKind::Connect, "connected")
    } else {
        (NotificationKind::Disconnect, "disconnected")
    };
    Notification::new(kind, format!("{} {verb}", player.name))
        .field("Player", player)
        .at(at)
}

/// Summary of a finished day: one field per non-zero counter.
#[must_use]
pub fn day_summary(summary: &DaySummary) -> Notification {
    let mut n = Notification::new(
        NotificationKind::DaySummary,
        format!("Summary for {}", summary.date.format("%Y-%m-%d")),
    )
    .description(format!("{} events recorded", summary.total()));
    for (kind, count) in &summary.counts {
        n = n.field(kind.label(), count);
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::day_state::CounterKind;
    use chrono::{FixedOffset, NaiveDate, TimeZone};
    use std::collections::BTreeMap;

    fn at() -> Timestamp {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 2, 1, 10, 0, 0)
            .unwrap()
    }

    #[test]
    fn attributed_death_is_a_pvp_kill() {
        let k = Attribution {
            attacker: Actor::new("Bob", Some(2)),
            total_damage: 42.0,
        };
        let n = death(&Actor::new("Alice", None), Some(&k), at());
        assert_eq!(n.kind, NotificationKind::PvpKill);
        assert_eq!(n.field_value("Killer"), Some("Bob (2)"));
        assert_eq!(n.field_value("Damage"), Some("42.0"));
    }

    #[test]
    fn plain_death() {
        let n = death(&Actor::new("Alice", None), None, at());
        assert_eq!(n.kind, NotificationKind::Death);
        assert_eq!(n.title, "Alice died");
    }

    #[test]
    fn day_summary_lists_counters() {
        let summary = DaySummary {
            date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            counts: BTreeMap::from([(CounterKind::Connects, 3), (CounterKind::Deaths, 1)]),
        };
        let n = day_summary(&summary);
        assert_eq!(n.title, "Summary for 2026-02-01");
        assert_eq!(n.field_value("Connects"), Some("3"));
        assert_eq!(n.field_value("Deaths"), Some("1"));
        assert_eq!(n.description.as_deref(), Some("4 events recorded"));
    }
}
