//! Damage to kill attribution.
//!
//! The ledger keeps at most one entry per victim. Damage from the same
//! attacker accumulates; damage from a different attacker replaces the entry
//! outright, so the last player to hit a victim is the one credited.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, trace};

use crate::types::{Actor, Timestamp};
use crate::utils::to_delta;

/// Damage one attacker has dealt to a victim so far.
#[derive(Debug, Clone, PartialEq)]
pub struct DamageLedgerEntry {
    pub attacker: Actor,
    pub attacker_key: String,
    pub last_timestamp: Timestamp,
    pub accumulated_damage: f64,
}

/// A death credited to an attacker.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    pub attacker: Actor,
    pub total_damage: f64,
}

/// Per-victim damage ledger.
#[derive(Debug)]
pub struct DamageLedger {
    window: Duration,
    entries: HashMap<String, DamageLedgerEntry>,
}

impl DamageLedger {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: HashMap::new(),
        }
    }

    /// Records `amount` of damage dealt by `attacker` to `victim`.
    pub fn record_damage(&mut self, victim: &Actor, attacker: &Actor, amount: f64, at: Timestamp) {
        let attacker_key = attacker.key();
        match self.entries.get_mut(&victim.key()) {
            Some(entry) if entry.attacker_key == attacker_key => {
                entry.accumulated_damage += amount;
                entry.last_timestamp = at;
                entry.attacker = attacker.clone();
            }
            _ => {
                trace!(victim = %victim, attacker = %attacker, "Damage ledger entry replaced");
                self.entries.insert(
                    victim.key(),
                    DamageLedgerEntry {
                        attacker: attacker.clone(),
                        attacker_key,
                        last_timestamp: at,
                        accumulated_damage: amount,
                    },
                );
            }
        }
    }

    /// Attributes a death of `victim` at `died_at`.
    ///
    /// Any entry for the victim is consumed, whether or not it falls inside
    /// the window.
    pub fn check_kill(&mut self, victim: &Actor, died_at: Timestamp) -> Option<Attribution> {
        let entry = self.entries.remove(&victim.key())?;
        let elapsed = died_at.signed_duration_since(entry.last_timestamp);
        if elapsed < chrono::TimeDelta::zero() || elapsed > to_delta(self.window) {
            debug!(victim = %victim, attacker = %entry.attacker, "Stale damage entry discarded");
            return None;
        }
        Some(Attribution {
            attacker: entry.attacker,
            total_damage: entry.accumulated_damage,
        })
    }

    /// Removes entries older than twice the window relative to `reference`.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&mut self, reference: Timestamp) -> usize {
        let max_age = to_delta(self.window * 2);
        let before = self.entries.len();
        self.entries
            .retain(|_, e| reference.signed_duration_since(e.last_timestamp) <= max_age);
        before - self.entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The live entry for `victim`, if any.
    #[must_use]
    pub fn entry(&self, victim: &Actor) -> Option<&DamageLedgerEntry> {
        self.entries.get(&victim.key())
    }
}
