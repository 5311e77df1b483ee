//! Loot batching, keyed by looter and container owner.

use std::collections::BTreeMap;

use super::batch::{format_counts, BatchAccumulator, BatchEntry};
use crate::sink::{Notification, NotificationKind};
use crate::types::{Actor, Timestamp};

/// One container looted from someone else.
#[derive(Debug, Clone, PartialEq)]
pub struct LootItem {
    pub looter: Actor,
    pub owner_id: u64,
    pub container: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LootEntry {
    pub looter: Actor,
    pub owner_id: u64,
    pub count: u32,
    pub containers: BTreeMap<String, u32>,
    pub first: Timestamp,
    pub last: Timestamp,
}

impl BatchEntry for LootEntry {
    type Item = LootItem;

    fn start(item: LootItem, at: Timestamp) -> Self {
        Self {
            looter: item.looter,
            owner_id: item.owner_id,
            count: 1,
            containers: BTreeMap::from([(item.container, 1)]),
            first: at,
            last: at,
        }
    }

    fn merge(&mut self, item: LootItem, at: Timestamp) {
        self.count += 1;
        *self.containers.entry(item.container).or_insert(0) += 1;
        self.last = self.last.max(at);
        self.first = self.first.min(at);
    }

    fn summarize(&self) -> Notification {
        Notification::new(
            NotificationKind::Loot,
            format!("{} looted {} container(s)", self.looter.name, self.count),
        )
        .field("Looter", &self.looter)
        .field("Owner", self.owner_id)
        .field("Containers", format_counts(&self.containers))
        .field("Count", self.count)
        .at(self.last)
    }
}

/// Loot batch: `(looter key, owner id)` to running totals.
pub type LootBatch = BatchAccumulator<(String, u64), LootEntry>;

/// Batch key for a loot occurrence.
#[must_use]
pub fn loot_key(item: &LootItem) -> (String, u64) {
    (item.looter.key(), item.owner_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone, Utc};
    use std::time::Duration;

    fn at(minute: u32) -> Timestamp {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 2, 1, 10, minute, 0)
            .unwrap()
    }

    fn item(looter: &str, owner: u64, container: &str) -> LootItem {
        LootItem {
            looter: Actor::new(looter, Some(1)),
            owner_id: owner,
            container: container.to_string(),
        }
    }

    #[test]
    fn groups_by_looter_and_owner() {
        let mut batch = LootBatch::new("loot", Duration::from_secs(120));
        let now = Utc::now();
        for it in [
            item("Alice", 9, "Box"),
            item("alice", 9, "Box"),
            item("Alice", 9, "Chest"),
            item("Alice", 8, "Box"),
        ] {
            batch.record(loot_key(&it), it, at(0), now);
        }
        assert_eq!(batch.len(), 2);

        let entry = batch.get(&("alice".to_string(), 9)).unwrap();
        assert_eq!(entry.count, 3);
        assert_eq!(entry.containers.get("Box"), Some(&2));

        let summaries = batch.flush();
        let owner_9 = summaries
            .iter()
            .find(|n| n.field_value("Owner") == Some("9"))
            .unwrap();
        assert_eq!(owner_9.field_value("Containers"), Some("Box x2, Chest"));
        assert_eq!(owner_9.field_value("Count"), Some("3"));
    }
}
