//! Raid batching, keyed by attacker and structure owner.
//!
//! Unowned structures destroyed by a player are batched under the owner-less
//! key `(attacker, None)`.

use std::collections::BTreeMap;

use super::batch::{format_counts, BatchAccumulator, BatchEntry};
use crate::sink::{Notification, NotificationKind};
use crate::types::{Actor, Timestamp};

#[derive(Debug, Clone, PartialEq)]
pub struct RaidItem {
    pub attacker: Actor,
    pub owner_id: Option<u64>,
    pub structure: String,
    pub destroyed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RaidEntry {
    pub attacker: Actor,
    pub owner_id: Option<u64>,
    pub damaged: u32,
    pub destroyed: u32,
    pub structures: BTreeMap<String, u32>,
    pub first: Timestamp,
    pub last: Timestamp,
}

impl RaidEntry {
    fn tally(&mut self, item: RaidItem) {
        if item.destroyed {
            self.destroyed += 1;
        } else {
            self.damaged += 1;
        }
        *self.structures.entry(item.structure).or_insert(0) += 1;
    }
}

impl BatchEntry for RaidEntry {
    type Item = RaidItem;

    fn start(item: RaidItem, at: Timestamp) -> Self {
        let mut entry = Self {
            attacker: item.attacker.clone(),
            owner_id: item.owner_id,
            damaged: 0,
            destroyed: 0,
            structures: BTreeMap::new(),
            first: at,
            last: at,
        };
        entry.tally(item);
        entry
    }

    fn merge(&mut self, item: RaidItem, at: Timestamp) {
        self.tally(item);
        self.last = self.last.max(at);
        self.first = self.first.min(at);
    }

    fn summarize(&self) -> Notification {
        let owner = self
            .owner_id
            .map_or_else(|| "unowned".to_string(), |id| id.to_string());
        Notification::new(
            NotificationKind::Raid,
            format!("{} raided structures of {owner}", self.attacker.name),
        )
        .field("Attacker", &self.attacker)
        .field("Owner", owner)
        .field("Structures", format_counts(&self.structures))
        .field("Damaged", self.damaged)
        .field("Destroyed", self.destroyed)
        .at(self.last)
    }
}

/// Raid batch: `(attacker key, owner id)` to running totals.
pub type RaidBatch = BatchAccumulator<(String, Option<u64>), RaidEntry>;

/// Batch key for a raid occurrence.
#[must_use]
pub fn raid_key(item: &RaidItem) -> (String, Option<u64>) {
    (item.attacker.key(), item.owner_id)
}
