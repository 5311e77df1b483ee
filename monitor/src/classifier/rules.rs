//! Ordered pattern rules.
//!
//! Each [`Rule`] pairs a body pattern with an extractor. Rules are evaluated
//! top to bottom against the line body (the text after the timestamp) and
//! the first one whose pattern matches decides the outcome, even when its
//! extractor rejects the line. Owned-structure raids therefore sit above
//! unowned ones, and every specific shape sits above the generic
//! connect/disconnect catch-alls.

use std::sync::LazyLock;

use regex_lite::{Captures, Regex};

use super::source::{classify_source, is_pvp_candidate};
use crate::types::{Actor, EventKind};

/// Result of applying a matched rule.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    /// The line describes an event.
    Event(Actor, EventKind),
    /// The line matched but is explicitly excluded (decay, NPC, self-damage).
    Excluded,
}

type Extractor = fn(&Captures<'_>) -> Option<RuleOutcome>;

/// One entry of the rule table.
pub struct Rule {
    /// Stable name, used in logs and tests.
    pub name: &'static str,
    pattern: Regex,
    extract: Extractor,
}

impl Rule {
    fn new(name: &'static str, pattern: &str, extract: Extractor) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("rule pattern is valid"),
            extract,
        }
    }

    /// Applies the rule to a line body.
    ///
    /// Returns `None` when the pattern does not match, so evaluation moves on
    /// to the next rule. A matching pattern whose captures cannot be
    /// extracted (an out-of-range id, say) is treated as excluded.
    #[must_use]
    pub fn apply(&self, body: &str) -> Option<RuleOutcome> {
        let caps = self.pattern.captures(body)?;
        Some((self.extract)(&caps).unwrap_or(RuleOutcome::Excluded))
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

fn text(caps: &Captures<'_>, name: &str) -> Option<String> {
    caps.name(name).map(|m| m.as_str().trim().to_string())
}

fn number(caps: &Captures<'_>, name: &str) -> Option<Option<u64>> {
    match caps.name(name) {
        Some(m) => m.as_str().parse().ok().map(Some),
        None => Some(None),
    }
}

fn actor(caps: &Captures<'_>, name: &str, id: &str) -> Option<Actor> {
    Some(Actor::new(text(caps, name)?, number(caps, id)?))
}

fn admin_access(caps: &Captures<'_>) -> Option<RuleOutcome> {
    Some(RuleOutcome::Event(actor(caps, "name", "id")?, EventKind::AdminAccess))
}

fn cheat_flag(caps: &Captures<'_>) -> Option<RuleOutcome> {
    let reason = text(caps, "reason").unwrap_or_default();
    Some(RuleOutcome::Event(
        actor(caps, "name", "id")?,
        EventKind::CheatFlag { reason },
    ))
}

fn raid(caps: &Captures<'_>) -> Option<RuleOutcome> {
    let attacker = actor(caps, "attacker", "attacker_id")?;
    let owner_id = number(caps, "owner")?;
    let destroyed = caps.name("verb")?.as_str() == "destroyed";

    if !is_pvp_candidate(&attacker.name, attacker.id) {
        return Some(RuleOutcome::Excluded);
    }

    match owner_id {
        Some(owner) if attacker.id == Some(owner) => return Some(RuleOutcome::Excluded),
        None if !destroyed => return Some(RuleOutcome::Excluded),
        _ => {}
    }

    Some(RuleOutcome::Event(
        attacker,
        EventKind::Raid {
            structure: text(caps, "structure")?,
            owner_id,
            destroyed,
        },
    ))
}

fn build(caps: &Captures<'_>) -> Option<RuleOutcome> {
    Some(RuleOutcome::Event(
        actor(caps, "name", "id")?,
        EventKind::Build {
            item: text(caps, "item")?,
            clan: text(caps, "clan"),
        },
    ))
}

fn loot(caps: &Captures<'_>) -> Option<RuleOutcome> {
    let looter = actor(caps, "name", "id")?;
    let owner_id = number(caps, "owner")??;
    Some(RuleOutcome::Event(
        looter,
        EventKind::Loot {
            container: text(caps, "container")?,
            owner_id,
        },
    ))
}

fn damage(caps: &Captures<'_>) -> Option<RuleOutcome> {
    let source = actor(caps, "source", "source_id")?;
    let class = classify_source(&source.name, source.id);
    Some(RuleOutcome::Event(
        actor(caps, "name", "id")?,
        EventKind::DamageTaken {
            amount: caps.name("amount")?.as_str().parse().ok()?,
            source,
            class,
        },
    ))
}

fn death(caps: &Captures<'_>) -> Option<RuleOutcome> {
    Some(RuleOutcome::Event(actor(caps, "name", "id")?, EventKind::Death))
}

fn disconnect(caps: &Captures<'_>) -> Option<RuleOutcome> {
    Some(RuleOutcome::Event(actor(caps, "name", "id")?, EventKind::Disconnect))
}

fn connect(caps: &Captures<'_>) -> Option<RuleOutcome> {
    Some(RuleOutcome::Event(actor(caps, "name", "id")?, EventKind::Connect))
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(
            "admin_access",
            r"^(?P<name>.+?) \((?P<id>\d+)\) was granted admin access$",
            admin_access,
        ),
        Rule::new(
            "cheat_flag",
            r"^AntiCheat: (?P<name>.+?) \((?P<id>\d+)\) flagged for (?P<reason>.+)$",
            cheat_flag,
        ),
        Rule::new(
            "cheat_kick",
            r"^(?P<name>.+?) \((?P<id>\d+)\) was kicked by anti-cheat(?:: (?P<reason>.+))?$",
            cheat_flag,
        ),
        Rule::new(
            "raid_owned",
            r"^(?P<structure>.+?) owned by (?P<owner>\d+) was (?P<verb>damaged|destroyed) by (?P<attacker>.+?)(?: \((?P<attacker_id>\d+)\))?$",
            raid,
        ),
        Rule::new(
            "raid_unowned",
            r"^(?P<structure>.+?) was (?P<verb>damaged|destroyed) by (?P<attacker>.+?)(?: \((?P<attacker_id>\d+)\))?$",
            raid,
        ),
        Rule::new(
            "build",
            r"^(?:\[(?P<clan>[^\]]+)\] )?(?P<name>.+?) \((?P<id>\d+)\) built (?P<item>.+)$",
            build,
        ),
        Rule::new(
            "loot",
            r"^(?P<name>.+?) \((?P<id>\d+)\) looted (?P<container>.+?) owned by (?P<owner>\d+)$",
            loot,
        ),
        Rule::new(
            "damage_taken",
            r"^(?P<name>.+?)(?: \((?P<id>\d+)\))? took (?P<amount>\d+(?:\.\d+)?) damage from (?P<source>.+?)(?: \((?P<source_id>\d+)\))?$",
            damage,
        ),
        Rule::new(
            "death",
            r"^Player died \((?P<name>[^)]+)\)(?: \[(?P<id>\d+)\])?$",
            death,
        ),
        Rule::new(
            "disconnect",
            r"^(?P<name>.+?) \((?P<id>\d+)\) disconnected$",
            disconnect,
        ),
        Rule::new(
            "connect",
            r"^(?P<name>.+?) \((?P<id>\d+)\) connected$",
            connect,
        ),
    ]
});

/// The rule table, in evaluation order.
#[must_use]
pub fn rules() -> &'static [Rule] {
    &RULES
}

/// Evaluates the rule table against a line body, first match wins.
///
/// Returns the name of the matching rule alongside its outcome.
#[must_use]
pub fn evaluate(body: &str) -> Option<(&'static str, RuleOutcome)> {
    rules()
        .iter()
        .find_map(|rule| rule.apply(body).map(|outcome| (rule.name, outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::SourceClass;

    fn rule(name: &str) -> &'static Rule {
        rules().iter().find(|r| r.name == name).unwrap()
    }

    #[test]
    fn every_pattern_compiles() {
        assert_eq!(rules().len(), 11);
    }

    #[test]
    fn owned_raid_precedes_unowned() {
        let names: Vec<_> = rules().iter().map(|r| r.name).collect();
        let owned = names.iter().position(|n| *n == "raid_owned").unwrap();
        let unowned = names.iter().position(|n| *n == "raid_unowned").unwrap();
        assert!(owned < unowned);
    }

    #[test]
    fn admin_access_rule() {
        let outcome = rule("admin_access")
            .apply("Carol (99) was granted admin access")
            .unwrap();
        assert_eq!(
            outcome,
            RuleOutcome::Event(Actor::new("Carol", Some(99)), EventKind::AdminAccess)
        );
    }

    #[test]
    fn cheat_flag_phrasings() {
        let a = rule("cheat_flag")
            .apply("AntiCheat: Dave (5) flagged for speed hack")
            .unwrap();
        assert_eq!(
            a,
            RuleOutcome::Event(
                Actor::new("Dave", Some(5)),
                EventKind::CheatFlag {
                    reason: "speed hack".to_string()
                }
            )
        );

        let b = rule("cheat_kick")
            .apply("Dave (5) was kicked by anti-cheat: aimbot")
            .unwrap();
        assert!(matches!(
            b,
            RuleOutcome::Event(_, EventKind::CheatFlag { ref reason }) if reason == "aimbot"
        ));
    }

    #[test]
    fn owned_raid_by_player() {
        let outcome = rule("raid_owned")
            .apply("Wooden Wall owned by 200 was destroyed by Bob (100)")
            .unwrap();
        assert_eq!(
            outcome,
            RuleOutcome::Event(
                Actor::new("Bob", Some(100)),
                EventKind::Raid {
                    structure: "Wooden Wall".to_string(),
                    owner_id: Some(200),
                    destroyed: true,
                }
            )
        );
    }

    #[test]
    fn owned_raid_excludes_decay_npc_and_self_damage() {
        let r = rule("raid_owned");
        assert_eq!(
            r.apply("Wooden Wall owned by 200 was damaged by Decay"),
            Some(RuleOutcome::Excluded)
        );
        assert_eq!(
            r.apply("Wooden Wall owned by 200 was damaged by BP_Bear_C"),
            Some(RuleOutcome::Excluded)
        );
        assert_eq!(
            r.apply("Wooden Wall owned by 200 was damaged by Bob (200)"),
            Some(RuleOutcome::Excluded)
        );
    }

    #[test]
    fn raid_by_player_with_keyword_like_name_is_kept() {
        assert!(matches!(
            evaluate("Wall owned by 200 was destroyed by Jasmine (100)"),
            Some((
                "raid_owned",
                RuleOutcome::Event(ref a, EventKind::Raid { owner_id: Some(200), destroyed: true, .. })
            )) if a.name == "Jasmine"
        ));
    }

    #[test]
    fn unowned_structure_posts_only_when_destroyed_by_player() {
        let r = rule("raid_unowned");
        assert_eq!(
            r.apply("Gate was damaged by Bob (100)"),
            Some(RuleOutcome::Excluded)
        );
        assert_eq!(
            r.apply("Gate was destroyed by BP_Zombie"),
            Some(RuleOutcome::Excluded)
        );
        assert!(matches!(
            r.apply("Gate was destroyed by Bob (100)"),
            Some(RuleOutcome::Event(
                _,
                EventKind::Raid {
                    owner_id: None,
                    destroyed: true,
                    ..
                }
            ))
        ));
    }

    #[test]
    fn build_with_and_without_clan() {
        let plain = rule("build").apply("Erin (3) built Wooden Foundation").unwrap();
        assert_eq!(
            plain,
            RuleOutcome::Event(
                Actor::new("Erin", Some(3)),
                EventKind::Build {
                    item: "Wooden Foundation".to_string(),
                    clan: None,
                }
            )
        );

        let tagged = rule("build")
            .apply("[Wolves] Erin (3) built Stone Wall")
            .unwrap();
        assert!(matches!(
            tagged,
            RuleOutcome::Event(ref a, EventKind::Build { clan: Some(ref c), .. })
                if a.name == "Erin" && c == "Wolves"
        ));
    }

    #[test]
    fn loot_rule_carries_owner() {
        let outcome = rule("loot")
            .apply("Frank (8) looted Wooden Chest owned by 9")
            .unwrap();
        assert_eq!(
            outcome,
            RuleOutcome::Event(
                Actor::new("Frank", Some(8)),
                EventKind::Loot {
                    container: "Wooden Chest".to_string(),
                    owner_id: 9,
                }
            )
        );
    }

    #[test]
    fn damage_rule_classifies_source() {
        let outcome = rule("damage_taken")
            .apply("Alice (1) took 35.5 damage from Bob (2)")
            .unwrap();
        match outcome {
            RuleOutcome::Event(victim, EventKind::DamageTaken { amount, source, class }) => {
                assert_eq!(victim, Actor::new("Alice", Some(1)));
                assert!((amount - 35.5).abs() < f64::EPSILON);
                assert_eq!(source, Actor::new("Bob", Some(2)));
                assert_eq!(class, SourceClass::Player);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let creature = rule("damage_taken")
            .apply("Alice took 10 damage from BP_Wolf_C")
            .unwrap();
        assert!(matches!(
            creature,
            RuleOutcome::Event(_, EventKind::DamageTaken { class: SourceClass::Creature("Wolf"), .. })
        ));
    }

    #[test]
    fn damage_from_player_named_like_hazard_is_player() {
        assert!(matches!(
            rule("damage_taken").apply("Carol (3) took 60 damage from Fallon (4)"),
            Some(RuleOutcome::Event(_, EventKind::DamageTaken { class: SourceClass::Player, .. }))
        ));
    }

    #[test]
    fn death_rule_with_optional_id() {
        assert_eq!(
            rule("death").apply("Player died (Alice)"),
            Some(RuleOutcome::Event(Actor::new("Alice", None), EventKind::Death))
        );
        assert_eq!(
            rule("death").apply("Player died (Alice) [12]"),
            Some(RuleOutcome::Event(Actor::new("Alice", Some(12)), EventKind::Death))
        );
    }

    #[test]
    fn disconnect_is_not_mistaken_for_connect() {
        assert!(matches!(
            evaluate("Gina (4) disconnected"),
            Some(("disconnect", RuleOutcome::Event(_, EventKind::Disconnect)))
        ));
        assert!(matches!(
            evaluate("Gina (4) connected"),
            Some(("connect", RuleOutcome::Event(_, EventKind::Connect)))
        ));
    }

    #[test]
    fn excluded_match_does_not_fall_through() {
        // The owned rule matches and excludes; the unowned rule must not get a
        // second chance at the same line.
        assert!(matches!(
            evaluate("Wall owned by 7 was destroyed by Bob (7)"),
            Some(("raid_owned", RuleOutcome::Excluded))
        ));
    }

    #[test]
    fn unknown_body_matches_nothing() {
        assert!(evaluate("Server restarting in 5 minutes").is_none());
    }
}
