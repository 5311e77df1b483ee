//! Build batching, keyed by builder.

use std::collections::BTreeMap;

use super::batch::{format_counts, BatchAccumulator, BatchEntry};
use crate::sink::{Notification, NotificationKind};
use crate::types::{Actor, Timestamp};

#[derive(Debug, Clone, PartialEq)]
pub struct BuildItem {
    pub builder: Actor,
    pub item: String,
    pub clan: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildEntry {
    pub builder: Actor,
    pub clan: Option<String>,
    pub count: u32,
    pub items: BTreeMap<String, u32>,
    pub first: Timestamp,
    pub last: Timestamp,
}

impl BatchEntry for BuildEntry {
    type Item = BuildItem;

    fn start(item: BuildItem, at: Timestamp) -> Self {
        Self {
            builder: item.builder,
            clan: item.clan,
            count: 1,
            items: BTreeMap::from([(item.item, 1)]),
            first: at,
            last: at,
        }
    }

    fn merge(&mut self, item: BuildItem, at: Timestamp) {
        self.count += 1;
        *self.items.entry(item.item).or_insert(0) += 1;
        if item.clan.is_some() {
            self.clan = item.clan;
        }
        self.last = self.last.max(at);
        self.first = self.first.min(at);
    }

    fn summarize(&self) -> Notification {
        let mut n = Notification::new(
            NotificationKind::Build,
            format!("{} built {} piece(s)", self.builder.name, self.count),
        )
        .field("Builder", &self.builder);
        if let Some(clan) = &self.clan {
            n = n.field("Clan", clan);
        }
        n.field("Items", format_counts(&self.items))
            .field("Count", self.count)
            .at(self.last)
    }
}

/// Build batch: builder key to running totals.
pub type BuildBatch = BatchAccumulator<String, BuildEntry>;
