//! Event types produced by the classifier.
//!
//! A [`ParsedEvent`] is transient: it is produced once from a complete log
//! line and consumed immediately by the correlator, the aggregators, the day
//! counters and the stat stores. Nothing here is ever queued on disk.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::classifier::SourceClass;

/// A log timestamp, already placed in the configured timezone.
pub type Timestamp = DateTime<FixedOffset>;

/// A named participant in an event, optionally carrying the stable numeric
/// identifier the game server assigns to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

impl Actor {
    /// Creates an actor from a name and optional identifier.
    #[must_use]
    pub fn new(name: impl Into<String>, id: Option<u64>) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }

    /// Case-folded name, used as the key for per-player state.
    #[must_use]
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{} ({id})", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// One classified log line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvent {
    /// The subject of the event: the victim of a death or damage, the
    /// builder, the looter, the raider, the connecting player.
    pub actor: Actor,

    /// When the line says the event happened (minute resolution).
    pub timestamp: Timestamp,

    /// Variant-specific payload.
    pub kind: EventKind,
}

/// Payload for each recognised event shape.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// The actor died.
    Death,

    /// The actor finished building a structure piece.
    Build {
        item: String,
        clan: Option<String>,
    },

    /// The actor took damage from `source`.
    DamageTaken {
        amount: f64,
        source: Actor,
        class: SourceClass,
    },

    /// The actor looted a container owned by someone else.
    Loot { container: String, owner_id: u64 },

    /// The actor damaged or destroyed a structure. `owner_id` is `None` for
    /// unowned structures.
    Raid {
        structure: String,
        owner_id: Option<u64>,
        destroyed: bool,
    },

    /// The actor was granted admin access.
    AdminAccess,

    /// The anti-cheat flagged the actor.
    CheatFlag { reason: String },

    /// The actor connected.
    Connect,

    /// The actor disconnected.
    Disconnect,
}

impl EventKind {
    /// Short label used in logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Death => "death",
            Self::Build { .. } => "build",
            Self::DamageTaken { .. } => "damage_taken",
            Self::Loot { .. } => "loot",
            Self::Raid { .. } => "raid",
            Self::AdminAccess => "admin_access",
            Self::CheatFlag { .. } => "cheat_flag",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_key_is_case_folded() {
        let actor = Actor::new("AliCe", Some(7));
        assert_eq!(actor.key(), "alice");
    }

    #[test]
    fn actor_display_includes_id_when_known() {
        assert_eq!(Actor::new("Bob", Some(42)).to_string(), "Bob (42)");
        assert_eq!(Actor::new("Bob", None).to_string(), "Bob");
    }

    #[test]
    fn actor_serializes_without_missing_id() {
        let json = serde_json::to_string(&Actor::new("Bob", None)).unwrap();
        assert_eq!(json, r#"{"name":"Bob"}"#);
    }
}
