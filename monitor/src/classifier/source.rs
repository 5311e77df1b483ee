//! Damage source taxonomy.
//!
//! Sources are free-form strings in the log. They are sorted into creature
//! types, players and everything else through ordered keyword tables.
//! Keywords match whole name tokens only, so `Wolfgang` is not a wolf. The
//! first creature keyword that matches wins, so more specific keywords sit
//! above broader ones.

/// Classification of a damage source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceClass {
    /// A creature, labelled with its display name.
    Creature(&'static str),
    /// Another player; a candidate for PvP attribution.
    Player,
    /// Environment, NPCs, traps and anything else that is not a player.
    Other,
}

/// Name prefixes the server gives to non-player entities.
const NON_PLAYER_PREFIXES: &[&str] = &["BP_", "NPC_", "AI_"];

/// Ordered creature keywords, matched case-insensitively against whole
/// name tokens.
const CREATURE_KEYWORDS: &[(&str, &str)] = &[
    ("puppet", "Zombie"),
    ("zombie", "Zombie"),
    ("wolf", "Wolf"),
    ("wolves", "Wolf"),
    ("bear", "Bear"),
    ("boar", "Boar"),
    ("crocodile", "Crocodile"),
    ("croc", "Crocodile"),
    ("shark", "Shark"),
    ("spider", "Spider"),
    ("razorback", "Boar"),
];

/// Whole-token keywords for non-creature, non-player sources.
const NPC_KEYWORDS: &[&str] = &[
    "npc", "guard", "sentry", "drone", "bandit", "decay", "fall", "falling", "bleed", "bleeding",
    "starve", "starving", "starvation", "drown", "drowning", "fire", "burning", "trap", "mine",
    "landmine", "radiation", "poison",
];

fn has_non_player_prefix(source: &str) -> bool {
    NON_PLAYER_PREFIXES.iter().any(|p| source.starts_with(p))
}

/// Lowercase name tokens, split on anything that is not alphanumeric.
fn tokens(source: &str) -> Vec<String> {
    source
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn creature_of(tokens: &[String]) -> Option<&'static str> {
    CREATURE_KEYWORDS
        .iter()
        .find(|(keyword, _)| tokens.iter().any(|t| t == keyword))
        .map(|(_, label)| *label)
}

fn is_npc(tokens: &[String]) -> bool {
    tokens.iter().any(|t| NPC_KEYWORDS.contains(&t.as_str()))
}

/// Classifies a damage source from its name and, when the log carries one,
/// its numeric player id.
///
/// An id marks the source as a player unless the name has a non-player
/// prefix. Without an id, keywords decide; a name that matches none is a
/// player.
#[must_use]
pub fn classify_source(source: &str, id: Option<u64>) -> SourceClass {
    let prefixed = has_non_player_prefix(source);
    if id.is_some() && !prefixed {
        return SourceClass::Player;
    }

    let tokens = tokens(source);
    if let Some(label) = creature_of(&tokens) {
        return SourceClass::Creature(label);
    }

    if prefixed || is_npc(&tokens) {
        return SourceClass::Other;
    }

    SourceClass::Player
}

/// Whether a source may be credited with a PvP kill or a raid.
#[must_use]
pub fn is_pvp_candidate(source: &str, id: Option<u64>) -> bool {
    classify_source(source, id) == SourceClass::Player
}
