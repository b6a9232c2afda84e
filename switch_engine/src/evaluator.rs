//! Throttled condition polling.
//!
//! The host calls [`ConditionEvaluator::tick`] once per frame. At most one evaluation pass runs
//! per interval; every other tick returns immediately. A pass cooks each registered condition,
//! applies the ones whose predicate holds to the [`SwitchStore`], and reports a [`ChangeNotice`]
//! only for writes that actually changed a value.

use std::cell::Cell;

use log::{debug, info, warn};
use time::OffsetDateTime;
use variantly::Variantly;

use crate::condition::{ConditionKey, ConditionKind, ConditionRegistry, RawCondition};
use crate::game_state::GameState;
use crate::key::SwitchKey;
use crate::store::{SwitchState, SwitchStore};

/// Minimum seconds between evaluation passes unless configured otherwise.
pub const DEFAULT_CHECK_INTERVAL_SECS: i64 = 1;

/// Wall-clock source, in unix seconds.
pub trait Clock {
    fn now(&self) -> i64;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        OffsetDateTime::now_utc().unix_timestamp()
    }
}

/// A clock that only moves when told to. Useful for replays and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<i64>,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self { now: Cell::new(start) }
    }

    pub fn set(&self, now: i64) {
        self.now.set(now);
    }

    pub fn advance(&self, secs: i64) {
        self.now.set(self.now.get() + secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.get()
    }
}

/// A switch write caused by a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    pub key: SwitchKey,
    pub new_state: bool,
    pub cause: ConditionKind,
}

impl ChangeNotice {
    /// Text for the host's message window.
    pub fn message(&self) -> String {
        format!(
            "Switch '{}' is now {} ({} condition)",
            self.key.name,
            SwitchState::from(self.new_state),
            self.cause
        )
    }
}

/// Outcome of one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub at: i64,
    /// Conditions that cooked cleanly and were checked.
    pub evaluated: usize,
    /// Damaged records passed over.
    pub skipped_corrupt: usize,
    /// One-shot conditions removed after firing.
    pub expired: usize,
    pub notices: Vec<ChangeNotice>,
}

impl PassReport {
    pub fn changed(&self) -> bool {
        !self.notices.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Variantly)]
pub enum EvaluatorPhase {
    #[default]
    Idle,
    Evaluating,
}

#[derive(Debug, Clone)]
pub struct ConditionEvaluator {
    interval: i64,
    last_pass: Option<i64>,
    phase: EvaluatorPhase,
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_CHECK_INTERVAL_SECS)
    }
}

impl ConditionEvaluator {
    pub fn new(interval_secs: i64) -> Self {
        Self {
            interval: interval_secs.max(0),
            last_pass: None,
            phase: EvaluatorPhase::Idle,
        }
    }

    pub fn interval(&self) -> i64 {
        self.interval
    }

    pub fn last_pass(&self) -> Option<i64> {
        self.last_pass
    }

    pub fn phase(&self) -> EvaluatorPhase {
        self.phase
    }

    /// Forget when the last pass ran, so the next tick evaluates immediately.
    pub fn reset(&mut self) {
        self.last_pass = None;
    }

    /// True if a tick at `now` would run a pass.
    pub fn is_due(&self, now: i64) -> bool {
        self.last_pass.is_none_or(|last| now.saturating_sub(last) >= self.interval)
    }

    /// Per-frame entry point. Returns `None` while throttled.
    pub fn tick(
        &mut self,
        now: i64,
        store: &mut SwitchStore,
        conditions: &mut ConditionRegistry,
        state: &dyn GameState,
    ) -> Option<PassReport> {
        if !self.is_due(now) {
            return None;
        }
        self.last_pass = Some(now);
        Some(self.evaluate(now, store, conditions, state))
    }

    /// Run one pass unconditionally.
    ///
    /// Conditions are read from a snapshot of the registry; fired timers are removed after the
    /// walk completes.
    pub fn evaluate(
        &mut self,
        now: i64,
        store: &mut SwitchStore,
        conditions: &mut ConditionRegistry,
        state: &dyn GameState,
    ) -> PassReport {
        self.phase = EvaluatorPhase::Evaluating;
        let mut report = PassReport {
            at: now,
            ..PassReport::default()
        };
        let pending: Vec<(ConditionKey, RawCondition)> = conditions
            .iter()
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect();
        let mut fired_timers = Vec::new();

        for (key, record) in pending {
            let condition = match record.to_condition(&key) {
                Ok(condition) => condition,
                Err(e) => {
                    debug!("skipping condition: {e}");
                    report.skipped_corrupt += 1;
                    continue;
                },
            };
            report.evaluated += 1;
            if !condition.is_satisfied(now, state) {
                continue;
            }
            if condition.is_one_shot() {
                fired_timers.push(key.clone());
            }
            if store.is_on(&key.switch) == condition.new_state {
                continue;
            }
            match store.set(&key.switch, condition.new_state) {
                Ok(true) => {
                    info!("condition {key} set switch to {}", SwitchState::from(condition.new_state));
                    report.notices.push(ChangeNotice {
                        key: key.switch.clone(),
                        new_state: condition.new_state,
                        cause: key.kind,
                    });
                },
                Ok(false) => {},
                Err(e) => {
                    warn!("condition {key} could not be applied: {e}");
                    report.skipped_corrupt += 1;
                },
            }
        }

        for key in &fired_timers {
            conditions.remove(key.kind, &key.switch);
        }
        report.expired = fired_timers.len();
        debug!(
            "condition pass at {now}: {} evaluated, {} changed, {} expired, {} skipped",
            report.evaluated,
            report.notices.len(),
            report.expired,
            report.skipped_corrupt
        );
        self.phase = EvaluatorPhase::Idle;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{CompareOp, Condition};
    use crate::game_state::GameVariables;

    fn door() -> SwitchKey {
        SwitchKey::new(1, 5, "DOOR")
    }

    struct Fixture {
        store: SwitchStore,
        conditions: ConditionRegistry,
        state: GameVariables,
        evaluator: ConditionEvaluator,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: SwitchStore::new(),
                conditions: ConditionRegistry::new(),
                state: GameVariables::new(),
                evaluator: ConditionEvaluator::default(),
            }
        }

        fn tick(&mut self, now: i64) -> Option<PassReport> {
            self.evaluator
                .tick(now, &mut self.store, &mut self.conditions, &self.state)
        }
    }

    #[test]
    fn tick_is_throttled_to_the_interval() {
        let mut fx = Fixture::new();
        assert!(fx.tick(100).is_some());
        assert!(fx.tick(100).is_none());
        assert!(fx.evaluator.phase().is_idle());
        assert!(fx.tick(101).is_some());
        fx.evaluator.reset();
        assert!(fx.tick(101).is_some());
    }

    #[test]
    fn longer_interval_skips_intermediate_ticks() {
        let mut fx = Fixture::new();
        fx.evaluator = ConditionEvaluator::new(5);
        assert!(fx.tick(0).is_some());
        assert!((1..5).all(|t| fx.tick(t).is_none()));
        assert!(fx.tick(5).is_some());
    }

    #[test]
    fn variable_condition_fires_once_per_edge() {
        let mut fx = Fixture::new();
        fx.conditions
            .add(door(), Condition::variable(1, CompareOp::Ge, 10, true));
        assert!(!fx.tick(0).expect("pass").changed());

        fx.state.set_variable(1, 10);
        let report = fx.tick(1).expect("pass");
        assert_eq!(report.notices.len(), 1);
        assert_eq!(report.notices[0].cause, ConditionKind::Variable);
        assert!(fx.store.is_on(&door()));

        assert!(!fx.tick(2).expect("pass").changed());
        assert_eq!(fx.conditions.len(), 1);
    }

    #[test]
    fn off_target_on_unset_switch_is_silent() {
        let mut fx = Fixture::new();
        fx.conditions.add(door(), Condition::mirror(4, false, false));
        let report = fx.tick(0).expect("pass");
        assert!(!report.changed());
        assert!(fx.store.get(&door()).is_unset());
    }

    #[test]
    fn timer_fires_and_is_removed() {
        let mut fx = Fixture::new();
        fx.conditions.add(door(), Condition::timer(50, 30, true));
        assert!(!fx.tick(79).expect("pass").changed());
        let report = fx.tick(80).expect("pass");
        assert_eq!(report.expired, 1);
        assert!(report.changed());
        assert!(fx.conditions.is_empty());
    }

    #[test]
    fn timer_is_removed_even_when_already_at_target() {
        let mut fx = Fixture::new();
        fx.store.set(&door(), true).expect("set");
        fx.conditions.add(door(), Condition::timer(0, 1, true));
        let report = fx.tick(5).expect("pass");
        assert!(!report.changed());
        assert_eq!(report.expired, 1);
        assert!(fx.conditions.is_empty());
    }

    #[test]
    fn corrupt_records_are_skipped_not_removed() {
        let mut fx = Fixture::new();
        fx.conditions.insert_raw(
            ConditionKey::new(ConditionKind::Timer, door()),
            RawCondition {
                kind: Some(ConditionKind::Timer),
                start_time: Some(0),
                seconds: Some(0),
                ..RawCondition::default()
            },
        );
        let report = fx.tick(10).expect("pass");
        assert_eq!(report.skipped_corrupt, 1);
        assert_eq!(report.evaluated, 0);
        assert_eq!(fx.conditions.len(), 1);
    }

    #[test]
    fn condition_on_reserved_name_is_counted_not_applied() {
        let mut fx = Fixture::new();
        fx.conditions.add(door().renamed("A"), Condition::mirror(1, false, true));
        let report = fx.tick(0).expect("pass");
        assert_eq!(report.skipped_corrupt, 1);
        assert!(fx.store.is_empty());
    }

    #[test]
    fn notice_message_names_switch_and_cause() {
        let notice = ChangeNotice {
            key: door(),
            new_state: false,
            cause: ConditionKind::Inventory,
        };
        assert_eq!(notice.message(), "Switch 'DOOR' is now OFF (inventory condition)");
    }

    #[test]
    fn manual_clock_moves_on_request() {
        let clock = ManualClock::new(10);
        clock.advance(5);
        assert_eq!(clock.now(), 15);
        clock.set(3);
        assert_eq!(clock.now(), 3);
        assert!(SystemClock.now() > 1_600_000_000);
    }
}
