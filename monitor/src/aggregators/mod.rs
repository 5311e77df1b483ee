//! Time-debounced aggregation of bursty events.
//!
//! Loot, build and raid events are merged per key in a
//! [`BatchAccumulator`] and summarized once its flush timer fires. Deaths go
//! through the [`DeathLoopSuppressor`], which lets the first few through and
//! folds the rest of a loop into one summary.

pub mod batch;
pub mod build;
pub mod death_loop;
pub mod loot;
pub mod raid;

pub use batch::{format_counts, BatchAccumulator, BatchEntry};
pub use build::{BuildBatch, BuildEntry, BuildItem};
pub use death_loop::{DeathLoopSuppressor, DeathOutcome, LoopSummary};
pub use loot::{loot_key, LootBatch, LootEntry, LootItem};
pub use raid::{raid_key, RaidBatch, RaidEntry, RaidItem};
