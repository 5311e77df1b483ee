//! Log line classification.
//!
//! A complete line is turned into zero or one [`ParsedEvent`]: the
//! timestamp prefix is parsed first, then the body is matched against the
//! ordered [`rules`] table. Lines that match nothing are dropped silently;
//! they are expected, not errors.
//!
//! # Example
//!
//! ```
//! use chrono::FixedOffset;
//! use logwarden_monitor::classifier::{fixed_offset, Classifier};
//! use logwarden_monitor::types::EventKind;
//!
//! let classifier = Classifier::new(fixed_offset(FixedOffset::east_opt(0).unwrap()));
//! let event = classifier.classify("(1/2/2026 10:00) Player died (Alice)").unwrap();
//! assert_eq!(event.actor.name, "Alice");
//! assert_eq!(event.kind, EventKind::Death);
//! ```

pub mod rules;
pub mod source;
pub mod timestamp;

use tracing::trace;

pub use rules::{evaluate, rules, Rule, RuleOutcome};
pub use source::{classify_source, is_pvp_candidate, SourceClass};
pub use timestamp::{fixed_offset, split_timestamp, TimestampFn};

use crate::types::ParsedEvent;

/// Turns complete log lines into typed events.
#[derive(Clone)]
pub struct Classifier {
    timestamp: TimestampFn,
}

impl Classifier {
    /// Creates a classifier using the given timestamp construction function.
    #[must_use]
    pub fn new(timestamp: TimestampFn) -> Self {
        Self { timestamp }
    }

    /// Classifies one complete line.
    #[must_use]
    pub fn classify(&self, line: &str) -> Option<ParsedEvent> {
        let Some((timestamp, body)) = split_timestamp(line, &self.timestamp) else {
            trace!(line, "No timestamp prefix");
            return None;
        };

        match evaluate(body) {
            Some((_, RuleOutcome::Event(actor, kind))) => Some(ParsedEvent {
                actor,
                timestamp,
                kind,
            }),
            Some((rule, RuleOutcome::Excluded)) => {
                trace!(rule, body, "Line matched an exclusion");
                None
            }
            None => {
                trace!(body, "Line matched no rule");
                None
            }
        }
    }
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Actor, EventKind};
    use chrono::FixedOffset;

    fn classifier() -> Classifier {
        Classifier::new(fixed_offset(FixedOffset::east_opt(0).unwrap()))
    }

    #[test]
    fn classifies_death_line() {
        let event = classifier()
            .classify("(1/2/2026 10:00) Player died (Alice)")
            .unwrap();
        assert_eq!(event.actor, Actor::new("Alice", None));
        assert_eq!(event.kind, EventKind::Death);
    }

    #[test]
    fn unknown_line_yields_nothing() {
        assert!(classifier()
            .classify("(1/2/2026 10:00) Saving world...")
            .is_none());
    }

    #[test]
    fn excluded_line_yields_nothing() {
        assert!(classifier()
            .classify("(1/2/2026 10:00) Wall owned by 3 was damaged by Decay")
            .is_none());
    }

    #[test]
    fn line_without_timestamp_yields_nothing() {
        assert!(classifier().classify("Player died (Alice)").is_none());
    }
}
