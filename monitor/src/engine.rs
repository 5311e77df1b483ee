//! The tailing engine.
//!
//! [`Engine`] wires the pipeline together: the poller reads new lines, the
//! classifier turns them into events, and each event is fanned out to the
//! stat store, the day counters, the damage ledger, the death-loop
//! suppressor and the batches. Notifications produced along the way are
//! queued in an outbox and delivered once all state has been updated, so a
//! slow or failing sink never interleaves with mutation.
//!
//! The engine owns no timers of its own. The host calls [`Engine::poll`] on
//! its interval and [`Engine::fire_due`] whenever [`Engine::next_deadline`]
//! passes. All calls take `&mut self`, so no two of them ever overlap.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace, warn};

use crate::accessor::{AccessError, RemoteFileAccessor};
use crate::aggregators::{
    loot_key, raid_key, BuildBatch, BuildItem, DeathLoopSuppressor, LootBatch, LootItem,
    RaidBatch, RaidItem,
};
use crate::classifier::{Classifier, SourceClass, TimestampFn};
use crate::clock::Clock;
use crate::correlator::{Attribution, DamageLedger};
use crate::cursor::{CursorRecord, TailCursor};
use crate::day_state::{CounterKind, DayCounters, DayState, DaySummary};
use crate::kill_log::{KillLog, KillRecord};
use crate::messages;
use crate::poller::Poller;
use crate::sink::{Notification, NotificationSink, ThreadKey};
use crate::splitter::split;
use crate::statefile;
use crate::stats::StatStore;
use crate::types::{EventKind, ParsedEvent, Timestamp};
use crate::utils::earliest;

/// Cursor record file name inside the state directory.
pub const CURSORS_FILE: &str = "cursors.json";

/// Day counters file name inside the state directory.
pub const DAY_COUNTERS_FILE: &str = "day_counters.json";

/// Kill log file name inside the state directory.
pub const KILL_LOG_FILE: &str = "kill_log.json";

/// Locations of the persisted state files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub cursors: PathBuf,
    pub day_counters: PathBuf,
    pub kill_log: PathBuf,
}

impl StatePaths {
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            cursors: dir.join(CURSORS_FILE),
            day_counters: dir.join(DAY_COUNTERS_FILE),
            kill_log: dir.join(KILL_LOG_FILE),
        }
    }
}

/// Tunables for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Watched files, polled in this order.
    pub files: Vec<String>,

    /// Where state files live. `None` keeps all state in memory.
    pub state_dir: Option<PathBuf>,

    pub attribution_window: Duration,
    pub death_loop_threshold: u32,
    pub death_loop_window: Duration,
    pub loot_batch_delay: Duration,
    pub build_batch_delay: Duration,
    pub raid_batch_delay: Duration,
    pub kill_log_size: usize,

    /// Whether connects and disconnects are notified individually.
    pub notify_connections: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            files: vec!["game.log".to_string(), "admin.log".to_string()],
            state_dir: None,
            attribution_window: Duration::from_secs(300),
            death_loop_threshold: 3,
            death_loop_window: Duration::from_secs(300),
            loot_batch_delay: Duration::from_secs(120),
            build_batch_delay: Duration::from_secs(120),
            raid_batch_delay: Duration::from_secs(60),
            kill_log_size: 50,
            notify_connections: false,
        }
    }
}

/// Injected collaborators.
pub struct EngineDeps {
    pub accessor: Arc<dyn RemoteFileAccessor>,
    pub sink: Arc<dyn NotificationSink>,
    pub stats: Arc<dyn StatStore>,
    pub clock: Arc<dyn Clock>,
    pub timestamp: TimestampFn,
}

/// What one poll did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub lines: usize,
    pub events: usize,
    pub failures: usize,
    pub delivered: usize,
    pub dropped: usize,
}

/// What a backfill read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub lines: usize,
    pub events: usize,
    pub kills: usize,
}

/// Delivery outcome of one outbox drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
}

pub struct Engine {
    config: EngineConfig,
    paths: Option<StatePaths>,
    accessor: Arc<dyn RemoteFileAccessor>,
    sink: Arc<dyn NotificationSink>,
    stats: Arc<dyn StatStore>,
    clock: Arc<dyn Clock>,
    classifier: Classifier,
    poller: Poller,
    ledger: DamageLedger,
    kill_log: KillLog,
    death_loops: DeathLoopSuppressor,
    loot: LootBatch,
    build: BuildBatch,
    raid: RaidBatch,
    day: DayState,
    outbox: Vec<(ThreadKey, Notification)>,
    persisted_cursors: Option<BTreeMap<String, u64>>,
    latest_event: Option<Timestamp>,
}

impl Engine {
    /// Builds an engine, loading (and if necessary repairing) persisted state.
    ///
    /// A day summary left over from a previous run is queued immediately and
    /// goes out with the first delivery, normally from [`Engine::start`].
    #[must_use]
    pub fn new(config: EngineConfig, deps: EngineDeps) -> Self {
        let paths = config.state_dir.as_deref().map(StatePaths::in_dir);
        let today = deps.clock.today();

        let (record, kill_log, day, stale) = match &paths {
            Some(p) => {
                let record: CursorRecord = statefile::load_or_repair(&p.cursors);
                let kill_log = KillLog::load(&p.kill_log, config.kill_log_size);
                let (day, stale) = DayState::load(&p.day_counters, today);
                (record, kill_log, day, stale)
            }
            None => (
                CursorRecord::default(),
                KillLog::in_memory(config.kill_log_size),
                DayState::in_memory(today),
                None,
            ),
        };

        let persisted_cursors = paths.as_ref().map(|_| record.files.clone());
        let poller = Poller::new(Arc::clone(&deps.accessor), &config.files, &record);

        let mut engine = Self {
            ledger: DamageLedger::new(config.attribution_window),
            death_loops: DeathLoopSuppressor::new(
                config.death_loop_threshold,
                config.death_loop_window,
            ),
            loot: LootBatch::new("loot", config.loot_batch_delay),
            build: BuildBatch::new("build", config.build_batch_delay),
            raid: RaidBatch::new("raid", config.raid_batch_delay),
            classifier: Classifier::new(deps.timestamp),
            accessor: deps.accessor,
            sink: deps.sink,
            stats: deps.stats,
            clock: deps.clock,
            paths,
            poller,
            kill_log,
            day,
            outbox: Vec::new(),
            persisted_cursors,
            latest_event: None,
            config,
        };

        if let Some(summary) = stale {
            engine.queue_summary(&summary);
        }
        engine
    }

    /// Delivers anything queued during construction.
    pub async fn start(&mut self) -> Delivery {
        info!(
            files = ?self.config.files,
            state_dir = ?self.config.state_dir,
            day = %self.day.counters().date,
            "Engine started"
        );
        self.deliver().await
    }

    /// Polls every watched file once and processes the new lines.
    pub async fn poll(&mut self) -> PollReport {
        let pass = self.poller.poll().await;
        let mut report = PollReport {
            lines: pass.line_count(),
            failures: pass.failures,
            ..PollReport::default()
        };

        for file in &pass.files {
            for line in &file.lines {
                if let Some(event) = self.classifier.classify(line) {
                    report.events += 1;
                    self.handle_event(event);
                }
            }
        }

        if pass.is_complete() {
            self.persist_cursors(false);
        }

        let delivery = self.deliver().await;
        report.delivered = delivery.delivered;
        report.dropped = delivery.dropped;

        if report.lines > 0 || report.failures > 0 {
            debug!(
                lines = report.lines,
                events = report.events,
                failures = report.failures,
                "Poll complete"
            );
        }
        report
    }

    /// Classifies and processes one line as if it had just been read.
    pub fn ingest_line(&mut self, line: &str) -> bool {
        match self.classifier.classify(line) {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Routes one event through counters, correlation and aggregation.
    pub fn handle_event(&mut self, event: ParsedEvent) {
        if is_self_interaction(&event) {
            trace!(actor = %event.actor, kind = event.kind.label(), "Self-interaction ignored");
            return;
        }

        let at = event.timestamp;
        let now = self.clock.now();
        self.latest_event = Some(self.latest_event.map_or(at, |t| t.max(at)));

        let attribution = record_stats(self.stats.as_ref(), &mut self.ledger, &event);
        let actor = event.actor;

        match event.kind {
            EventKind::Death => {
                self.count(CounterKind::Deaths, at);
                if let Some(kill) = &attribution {
                    self.count(CounterKind::PvpKills, at);
                    let record = KillRecord {
                        victim: actor.clone(),
                        attacker: kill.attacker.clone(),
                        total_damage: kill.total_damage,
                        timestamp: at,
                    };
                    if let Err(e) = self.kill_log.push(record) {
                        warn!(error = %e, "Failed to persist kill log");
                    }
                }

                let outcome = self.death_loops.record_death(&actor, at, now);
                if let Some(flushed) = outcome.flushed {
                    self.queue(messages::death_loop(&flushed));
                }
                if outcome.emit_individual {
                    self.queue(messages::death(&actor, attribution.as_ref(), at));
                }
            }
            EventKind::Build { item, clan } => {
                self.count(CounterKind::Builds, at);
                self.build.record(
                    actor.key(),
                    BuildItem {
                        builder: actor,
                        item,
                        clan,
                    },
                    at,
                    now,
                );
            }
            EventKind::DamageTaken { .. } => {}
            EventKind::Loot {
                container,
                owner_id,
            } => {
                self.count(CounterKind::Loots, at);
                let item = LootItem {
                    looter: actor,
                    owner_id,
                    container,
                };
                self.loot.record(loot_key(&item), item, at, now);
            }
            EventKind::Raid {
                structure,
                owner_id,
                destroyed,
            } => {
                self.count(CounterKind::Raids, at);
                let item = RaidItem {
                    attacker: actor,
                    owner_id,
                    structure,
                    destroyed,
                };
                self.raid.record(raid_key(&item), item, at, now);
            }
            EventKind::AdminAccess => {
                self.count(CounterKind::AdminAccess, at);
                self.queue(messages::admin_access(&actor, at));
            }
            EventKind::CheatFlag { reason } => {
                self.count(CounterKind::CheatFlags, at);
                self.queue(messages::cheat_flag(&actor, &reason, at));
            }
            EventKind::Connect => {
                self.count(CounterKind::Connects, at);
                if self.config.notify_connections {
                    self.queue(messages::connection(&actor, true, at));
                }
            }
            EventKind::Disconnect => {
                self.count(CounterKind::Disconnects, at);
                if self.config.notify_connections {
                    self.queue(messages::connection(&actor, false, at));
                }
            }
        }
    }

    /// Flushes whatever timers are due, sweeps stale state and checks for a
    /// day rollover.
    pub async fn fire_due(&mut self) -> Delivery {
        let now = self.clock.now();

        let mut due = self.loot.flush_due(now);
        due.extend(self.build.flush_due(now));
        due.extend(self.raid.flush_due(now));
        due.extend(
            self.death_loops
                .flush_due(now)
                .iter()
                .map(messages::death_loop),
        );
        for n in due {
            self.queue(n);
        }

        if let Some(reference) = self.latest_event {
            let swept = self.ledger.sweep(reference) + self.death_loops.sweep(reference);
            if swept > 0 {
                trace!(swept, "Swept stale correlation state");
            }
        }

        if let Some(summary) = self.day.check_rollover(self.clock.today()) {
            self.queue_summary(&summary);
        }

        self.deliver().await
    }

    /// The earliest armed flush deadline, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        earliest([
            self.loot.deadline(),
            self.build.deadline(),
            self.raid.deadline(),
            self.death_loops.next_deadline(),
        ])
    }

    /// Flushes every outstanding batch and death loop, persists all state
    /// and delivers what remains.
    pub async fn stop(&mut self) -> Delivery {
        let mut pending = self.loot.flush();
        pending.extend(self.build.flush());
        pending.extend(self.raid.flush());
        pending.extend(self.death_loops.flush_all().iter().map(messages::death_loop));
        for n in pending {
            self.queue(n);
        }

        self.persist_cursors(true);
        self.day.persist();
        if let Err(e) = self.kill_log.save() {
            warn!(error = %e, "Failed to persist kill log");
        }

        let delivery = self.deliver().await;
        info!(
            delivered = delivery.delivered,
            dropped = delivery.dropped,
            "Engine stopped"
        );
        delivery
    }

    /// Reads `path` in full and records stats and kill correlation for every
    /// line. Nothing is notified and neither cursors nor day counters move.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub async fn backfill(&mut self, path: &str) -> Result<BackfillReport, AccessError> {
        let mut bytes = self.accessor.read_full(path).await?;
        if !bytes.ends_with(b"\n") {
            bytes.push(b'\n');
        }
        let lines = split(&[], &bytes).lines;

        let mut ledger = DamageLedger::new(self.config.attribution_window);
        let mut report = BackfillReport {
            lines: lines.len(),
            ..BackfillReport::default()
        };
        for line in &lines {
            let Some(event) = self.classifier.classify(line) else {
                continue;
            };
            if is_self_interaction(&event) {
                continue;
            }
            report.events += 1;
            if record_stats(self.stats.as_ref(), &mut ledger, &event).is_some() {
                report.kills += 1;
            }
        }

        info!(
            path,
            lines = report.lines,
            events = report.events,
            kills = report.kills,
            "Backfill complete"
        );
        Ok(report)
    }

    /// Drains the outbox into the sink. Failed sends are logged and dropped.
    pub async fn deliver(&mut self) -> Delivery {
        let mut delivery = Delivery::default();
        for (thread, message) in std::mem::take(&mut self.outbox) {
            match self.sink.send(&thread, &message).await {
                Ok(()) => delivery.delivered += 1,
                Err(e) => {
                    warn!(
                        thread = %thread,
                        kind = ?message.kind,
                        error = %e,
                        "Notification delivery failed, dropping"
                    );
                    delivery.dropped += 1;
                }
            }
        }
        delivery
    }

    #[must_use]
    pub fn cursors(&self) -> &[TailCursor] {
        self.poller.cursors()
    }

    #[must_use]
    pub fn day_counters(&self) -> &DayCounters {
        self.day.counters()
    }

    /// Events counted toward a later live day than their own date.
    #[must_use]
    pub fn late_events(&self) -> u64 {
        self.day.late_events()
    }

    #[must_use]
    pub fn kill_log(&self) -> &KillLog {
        &self.kill_log
    }

    #[must_use]
    pub fn ledger(&self) -> &DamageLedger {
        &self.ledger
    }

    #[must_use]
    pub fn outbox_len(&self) -> usize {
        self.outbox.len()
    }

    fn count(&mut self, kind: CounterKind, at: Timestamp) {
        if let Some(summary) = self.day.incr(kind, at.date_naive()) {
            self.queue_summary(&summary);
        }
    }

    fn queue(&mut self, message: Notification) {
        let thread = ThreadKey::for_date(self.clock.today());
        self.outbox.push((thread, message));
    }

    fn queue_summary(&mut self, summary: &DaySummary) {
        self.outbox
            .push((ThreadKey::for_date(summary.date), messages::day_summary(summary)));
    }

    fn persist_cursors(&mut self, force: bool) {
        let Some(paths) = &self.paths else {
            return;
        };
        let record = self.poller.record(self.clock.now());
        if !force && self.persisted_cursors.as_ref() == Some(&record.files) {
            return;
        }
        match statefile::write_atomic(&paths.cursors, &record) {
            Ok(()) => self.persisted_cursors = Some(record.files),
            Err(e) => warn!(error = %e, "Failed to persist cursors"),
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("cursors", &self.poller.cursors())
            .field("day", &self.day.counters())
            .field("outbox", &self.outbox.len())
            .finish_non_exhaustive()
    }
}

/// Whether the actor interacts with something they own.
fn is_self_interaction(event: &ParsedEvent) -> bool {
    let Some(id) = event.actor.id else {
        return false;
    };
    match &event.kind {
        EventKind::Loot { owner_id, .. } => *owner_id == id,
        EventKind::Raid { owner_id, .. } => *owner_id == Some(id),
        _ => false,
    }
}

/// Issues the stat-store call for `event` and feeds the damage ledger.
/// Returns the kill attribution when the event is an attributed death.
fn record_stats(
    stats: &dyn StatStore,
    ledger: &mut DamageLedger,
    event: &ParsedEvent,
) -> Option<Attribution> {
    let actor = &event.actor;
    let at = event.timestamp;
    match &event.kind {
        EventKind::Death => {
            stats.record_death(actor, at);
            let kill = ledger.check_kill(actor, at)?;
            stats.record_pvp_kill(&kill.attacker, actor, kill.total_damage, at);
            Some(kill)
        }
        EventKind::Build { item, .. } => {
            stats.record_build(actor, item, at);
            None
        }
        EventKind::DamageTaken {
            amount,
            source,
            class,
        } => {
            stats.record_damage_taken(actor, source, *amount, *class, at);
            if *class == SourceClass::Player && source.key() != actor.key() {
                ledger.record_damage(actor, source, *amount, at);
            }
            None
        }
        EventKind::Loot {
            container,
            owner_id,
        } => {
            stats.record_loot(actor, *owner_id, container, at);
            None
        }
        EventKind::Raid {
            structure,
            owner_id,
            destroyed,
        } => {
            stats.record_raid(actor, *owner_id, structure, *destroyed, at);
            None
        }
        EventKind::AdminAccess => {
            stats.record_admin_access(actor, at);
            None
        }
        EventKind::CheatFlag { reason } => {
            stats.record_cheat_flag(actor, reason, at);
            None
        }
        EventKind::Connect => {
            stats.record_connect(actor, at);
            None
        }
        EventKind::Disconnect => {
            stats.record_disconnect(actor, at);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::MemoryFileAccessor;
    use crate::classifier::fixed_offset;
    use crate::clock::ManualClock;
    use crate::sink::{MemorySink, NotificationKind};
    use crate::stats::MemoryStatStore;
    use chrono::{FixedOffset, TimeZone};

    struct Harness {
        engine: Engine,
        sink: Arc<MemorySink>,
        stats: Arc<MemoryStatStore>,
    }

    fn harness(config: EngineConfig) -> Harness {
        let offset = FixedOffset::east_opt(0).unwrap();
        let sink = Arc::new(MemorySink::new());
        let stats = Arc::new(MemoryStatStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap(),
            offset,
        ));
        let engine = Engine::new(
            config,
            EngineDeps {
                accessor: Arc::new(MemoryFileAccessor::new()),
                sink: sink.clone(),
                stats: stats.clone(),
                clock,
                timestamp: fixed_offset(offset),
            },
        );
        Harness {
            engine,
            sink,
            stats,
        }
    }

    #[tokio::test]
    async fn self_loot_is_ignored_entirely() {
        let mut h = harness(EngineConfig::default());
        assert!(h
            .engine
            .ingest_line("(1/2/2026 10:00) Alice (7) looted Box owned by 7"));

        assert_eq!(h.stats.total(), 0);
        assert_eq!(h.engine.day_counters().get(CounterKind::Loots), 0);
        assert_eq!(h.engine.next_deadline(), None);
    }

    #[tokio::test]
    async fn damage_then_death_is_a_pvp_kill() {
        let mut h = harness(EngineConfig::default());
        h.engine
            .ingest_line("(1/2/2026 10:00) Alice (1) took 30 damage from Bob (2)");
        h.engine.ingest_line("(1/2/2026 10:01) Player died (Alice) [1]");
        h.engine.deliver().await;

        let kills = h.sink.of_kind(NotificationKind::PvpKill);
        assert_eq!(kills.len(), 1);
        assert_eq!(kills[0].field_value("Killer"), Some("Bob (2)"));
        assert_eq!(h.stats.count("pvp_kill"), 1);
        assert_eq!(h.engine.kill_log().len(), 1);
        assert_eq!(h.engine.day_counters().get(CounterKind::PvpKills), 1);
    }

    #[tokio::test]
    async fn creature_damage_is_not_attributed() {
        let mut h = harness(EngineConfig::default());
        h.engine
            .ingest_line("(1/2/2026 10:00) Alice (1) took 30 damage from Zombie");
        h.engine.ingest_line("(1/2/2026 10:01) Player died (Alice) [1]");
        h.engine.deliver().await;

        assert!(h.engine.ledger().is_empty());
        assert_eq!(h.sink.of_kind(NotificationKind::PvpKill).len(), 0);
        assert_eq!(h.sink.of_kind(NotificationKind::Death).len(), 1);
    }

    #[tokio::test]
    async fn connections_are_counted_but_quiet_by_default() {
        let mut h = harness(EngineConfig::default());
        h.engine.ingest_line("(1/2/2026 10:00) Alice (1) connected");
        h.engine.deliver().await;

        assert_eq!(h.engine.day_counters().get(CounterKind::Connects), 1);
        assert!(h.sink.sent().is_empty());
    }

    #[tokio::test]
    async fn connections_notify_when_enabled() {
        let mut h = harness(EngineConfig {
            notify_connections: true,
            ..EngineConfig::default()
        });
        h.engine.ingest_line("(1/2/2026 10:00) Alice (1) connected");
        h.engine.ingest_line("(1/2/2026 10:05) Alice (1) disconnected");
        h.engine.deliver().await;

        assert_eq!(h.sink.of_kind(NotificationKind::Connect).len(), 1);
        assert_eq!(h.sink.of_kind(NotificationKind::Disconnect).len(), 1);
    }

    #[tokio::test]
    async fn failed_delivery_is_dropped() {
        let mut h = harness(EngineConfig::default());
        h.sink.set_failing(true);
        h.engine
            .ingest_line("(1/2/2026 10:00) Alice (1) was granted admin access");

        let delivery = h.engine.deliver().await;
        assert_eq!(delivery, Delivery { delivered: 0, dropped: 1 });
        assert_eq!(h.engine.outbox_len(), 0);
    }

    #[test]
    fn self_interaction_covers_loot_and_raid_only() {
        let at = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 2, 1, 10, 0, 0)
            .unwrap();
        let event = |kind| ParsedEvent {
            actor: crate::types::Actor::new("Alice", Some(7)),
            timestamp: at,
            kind,
        };
        assert!(is_self_interaction(&event(EventKind::Loot {
            container: "Box".into(),
            owner_id: 7
        })));
        assert!(is_self_interaction(&event(EventKind::Raid {
            structure: "Wall".into(),
            owner_id: Some(7),
            destroyed: true
        })));
        assert!(!is_self_interaction(&event(EventKind::Raid {
            structure: "Wall".into(),
            owner_id: None,
            destroyed: true
        })));
        assert!(!is_self_interaction(&event(EventKind::Death)));
    }
}
