//! Downstream statistics consumers.
//!
//! The engine calls a [`StatStore`] once per recognised event, regardless of
//! notification batching or suppression. Stores are injected, so several
//! engines can run side by side with their own stores. Calls are not
//! deduplicated: a byte range re-read after a crash is counted again.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::classifier::SourceClass;
use crate::types::{Actor, Timestamp};

/// Receives one call per recognised event. Every method defaults to a no-op.
#[allow(unused_variables)]
pub trait StatStore: Send + Sync {
    fn record_death(&self, victim: &Actor, at: Timestamp) {}

    fn record_pvp_kill(&self, attacker: &Actor, victim: &Actor, total_damage: f64, at: Timestamp) {}

    fn record_build(&self, builder: &Actor, item: &str, at: Timestamp) {}

    fn record_raid(
        &self,
        attacker: &Actor,
        owner_id: Option<u64>,
        structure: &str,
        destroyed: bool,
        at: Timestamp,
    ) {
    }

    fn record_loot(&self, looter: &Actor, owner_id: u64, container: &str, at: Timestamp) {}

    fn record_damage_taken(
        &self,
        victim: &Actor,
        source: &Actor,
        amount: f64,
        class: SourceClass,
        at: Timestamp,
    ) {
    }

    fn record_connect(&self, player: &Actor, at: Timestamp) {}

    fn record_disconnect(&self, player: &Actor, at: Timestamp) {}

    fn record_admin_access(&self, player: &Actor, at: Timestamp) {}

    fn record_cheat_flag(&self, player: &Actor, reason: &str, at: Timestamp) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatStore;

impl StatStore for NullStatStore {}

/// Counts calls per method, keyed by event name.
#[derive(Debug, Default)]
pub struct MemoryStatStore {
    calls: Mutex<BTreeMap<&'static str, u64>>,
}

impl MemoryStatStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self, name: &'static str) {
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name)
            .or_insert(0) += 1;
    }

    /// Number of calls recorded for `name` (e.g. `"death"`, `"pvp_kill"`).
    #[must_use]
    pub fn count(&self, name: &str) -> u64 {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Total calls across all methods.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }
}

impl StatStore for MemoryStatStore {
    fn record_death(&self, _: &Actor, _: Timestamp) {
        self.bump("death");
    }

    fn record_pvp_kill(&self, _: &Actor, _: &Actor, _: f64, _: Timestamp) {
        self.bump("pvp_kill");
    }

    fn record_build(&self, _: &Actor, _: &str, _: Timestamp) {
        self.bump("build");
    }

    fn record_raid(&self, _: &Actor, _: Option<u64>, _: &str, _: bool, _: Timestamp) {
        self.bump("raid");
    }

    fn record_loot(&self, _: &Actor, _: u64, _: &str, _: Timestamp) {
        self.bump("loot");
    }

    fn record_damage_taken(&self, _: &Actor, _: &Actor, _: f64, _: SourceClass, _: Timestamp) {
        self.bump("damage_taken");
    }

    fn record_connect(&self, _: &Actor, _: Timestamp) {
        self.bump("connect");
    }

    fn record_disconnect(&self, _: &Actor, _: Timestamp) {
        self.bump("disconnect");
    }

    fn record_admin_access(&self, _: &Actor, _: Timestamp) {
        self.bump("admin_access");
    }

    fn record_cheat_flag(&self, _: &Actor, _: &str, _: Timestamp) {
        self.bump("cheat_flag");
    }
}
