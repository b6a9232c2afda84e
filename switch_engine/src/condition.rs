//! Declarative switch conditions.
//!
//! A condition watches some piece of game state and, while its predicate holds, drives one
//! custom switch to a target value. Conditions are stored as loosely typed [`RawCondition`]
//! records (this is also their save format) and cooked into a typed [`Condition`] when they are
//! evaluated, so damaged records can sit in the registry without breaking the tick loop until
//! [`ConditionRegistry::cleanup_invalid`] reaps them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::SwitchError;
use crate::game_state::GameState;
use crate::key::{SwitchKey, validate_name};

/// The four kinds of condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKind {
    Timer,
    Variable,
    GameSwitch,
    Inventory,
}

impl ConditionKind {
    pub const ALL: [ConditionKind; 4] = [
        ConditionKind::Timer,
        ConditionKind::Variable,
        ConditionKind::GameSwitch,
        ConditionKind::Inventory,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConditionKind::Timer => "timer",
            ConditionKind::Variable => "variable",
            ConditionKind::GameSwitch => "gameswitch",
            ConditionKind::Inventory => "inventory",
        }
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionKind {
    type Err = SwitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConditionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SwitchError::corrupt(s, "unknown condition kind"))
    }
}

/// Comparison used by variable conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Gt,
    Lt,
    Ge,
    Le,
    Ne,
}

impl CompareOp {
    pub fn compare(self, current: i64, target: i64) -> bool {
        match self {
            CompareOp::Eq => current == target,
            CompareOp::Gt => current > target,
            CompareOp::Lt => current < target,
            CompareOp::Ge => current >= target,
            CompareOp::Le => current <= target,
            CompareOp::Ne => current != target,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
            CompareOp::Ne => "!=",
        }
    }
}

/// Comparison used by inventory conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityOp {
    AtLeast,
    Exactly,
    AtMost,
}

impl QuantityOp {
    pub fn compare(self, held: u32, target: u32) -> bool {
        match self {
            QuantityOp::AtLeast => held >= target,
            QuantityOp::Exactly => held == target,
            QuantityOp::AtMost => held <= target,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            QuantityOp::AtLeast => ">=",
            QuantityOp::Exactly => "=",
            QuantityOp::AtMost => "<=",
        }
    }
}

/// What a condition watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionRule {
    /// Fires once `duration` seconds have passed since `started_at`.
    Timer { started_at: i64, duration: i64 },
    VariableThreshold { variable_id: u32, op: CompareOp, value: i64 },
    MirrorSwitch { source_switch_id: u32, trigger_state: bool },
    InventoryThreshold { item_id: u32, op: QuantityOp, quantity: u32 },
}

/// A validated condition: when `rule` holds, the switch is driven to `new_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition {
    pub rule: ConditionRule,
    pub new_state: bool,
}

impl Condition {
    pub fn timer(started_at: i64, duration: i64, new_state: bool) -> Self {
        Self {
            rule: ConditionRule::Timer { started_at, duration },
            new_state,
        }
    }

    pub fn variable(variable_id: u32, op: CompareOp, value: i64, new_state: bool) -> Self {
        Self {
            rule: ConditionRule::VariableThreshold { variable_id, op, value },
            new_state,
        }
    }

    pub fn mirror(source_switch_id: u32, trigger_state: bool, new_state: bool) -> Self {
        Self {
            rule: ConditionRule::MirrorSwitch {
                source_switch_id,
                trigger_state,
            },
            new_state,
        }
    }

    pub fn inventory(item_id: u32, op: QuantityOp, quantity: u32, new_state: bool) -> Self {
        Self {
            rule: ConditionRule::InventoryThreshold { item_id, op, quantity },
            new_state,
        }
    }

    pub fn kind(&self) -> ConditionKind {
        match self.rule {
            ConditionRule::Timer { .. } => ConditionKind::Timer,
            ConditionRule::VariableThreshold { .. } => ConditionKind::Variable,
            ConditionRule::MirrorSwitch { .. } => ConditionKind::GameSwitch,
            ConditionRule::InventoryThreshold { .. } => ConditionKind::Inventory,
        }
    }

    /// Timers are removed once they fire; every other kind is a standing rule.
    pub fn is_one_shot(&self) -> bool {
        self.kind() == ConditionKind::Timer
    }

    /// Evaluate the predicate against the clock and game state.
    pub fn is_satisfied(&self, now: i64, state: &dyn GameState) -> bool {
        match self.rule {
            ConditionRule::Timer { started_at, duration } => now.saturating_sub(started_at) >= duration,
            ConditionRule::VariableThreshold { variable_id, op, value } => op.compare(state.variable(variable_id), value),
            ConditionRule::MirrorSwitch {
                source_switch_id,
                trigger_state,
            } => state.switch(source_switch_id) == trigger_state,
            ConditionRule::InventoryThreshold { item_id, op, quantity } => {
                op.compare(state.item_quantity(item_id), quantity)
            },
        }
    }

    /// Seconds left on a timer, or `None` for other kinds.
    pub fn remaining(&self, now: i64) -> Option<i64> {
        match self.rule {
            ConditionRule::Timer { started_at, duration } => {
                Some(duration.saturating_sub(now.saturating_sub(started_at)).max(0))
            },
            _ => None,
        }
    }

    /// Human summary for diagnostics.
    pub fn describe(&self, now: i64) -> String {
        let action = if self.new_state { "on" } else { "off" };
        match self.rule {
            ConditionRule::Timer { duration, .. } => {
                let left = self.remaining(now).unwrap_or(duration);
                format!("timer: switch turns {action} in {left}s")
            },
            ConditionRule::VariableThreshold { variable_id, op, value } => {
                format!("variable: switch turns {action} while variable {variable_id} {} {value}", op.symbol())
            },
            ConditionRule::MirrorSwitch {
                source_switch_id,
                trigger_state,
            } => {
                let watched = if trigger_state { "ON" } else { "OFF" };
                format!("gameswitch: switch turns {action} while game switch {source_switch_id} is {watched}")
            },
            ConditionRule::InventoryThreshold { item_id, op, quantity } => {
                format!("inventory: switch turns {action} while item {item_id} count {} {quantity}", op.symbol())
            },
        }
    }
}

/// Stored form of a condition. Every field is optional so damaged records still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCondition {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ConditionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_state: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<CompareOp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_state: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_comparison: Option<QuantityOp>,
}

impl RawCondition {
    /// True if the record lacks the fields every condition needs.
    pub fn is_incomplete(&self) -> bool {
        self.kind.is_none() || self.new_state.is_none()
    }

    /// Convert this record into a typed [`Condition`].
    ///
    /// # Errors
    /// - `CorruptRecord` if a required field is missing.
    pub fn to_condition(&self, key: &ConditionKey) -> Result<Condition, SwitchError> {
        let missing = |field: &str| SwitchError::corrupt(key, format!("missing field '{field}'"));
        let kind = self.kind.ok_or_else(|| missing("type"))?;
        let new_state = self.new_state.ok_or_else(|| missing("new_state"))?;
        if kind != key.kind {
            return Err(SwitchError::corrupt(key, format!("record holds a {kind} condition")));
        }
        let rule = match kind {
            ConditionKind::Timer => ConditionRule::Timer {
                started_at: self.start_time.ok_or_else(|| missing("start_time"))?,
                duration: self.seconds.ok_or_else(|| missing("seconds"))?,
            },
            ConditionKind::Variable => ConditionRule::VariableThreshold {
                variable_id: self.var_id.ok_or_else(|| missing("var_id"))?,
                op: self.comparison.ok_or_else(|| missing("comparison"))?,
                value: self.value.ok_or_else(|| missing("value"))?,
            },
            ConditionKind::GameSwitch => ConditionRule::MirrorSwitch {
                source_switch_id: self.switch_id.ok_or_else(|| missing("switch_id"))?,
                trigger_state: self.trigger_state.ok_or_else(|| missing("trigger_state"))?,
            },
            ConditionKind::Inventory => ConditionRule::InventoryThreshold {
                item_id: self.item_id.ok_or_else(|| missing("item_id"))?,
                op: self.quantity_comparison.ok_or_else(|| missing("quantity_comparison"))?,
                quantity: self.quantity.ok_or_else(|| missing("quantity"))?,
            },
        };
        Ok(Condition { rule, new_state })
    }
}

impl From<Condition> for RawCondition {
    fn from(condition: Condition) -> Self {
        let mut raw = RawCondition {
            kind: Some(condition.kind()),
            new_state: Some(condition.new_state),
            ..RawCondition::default()
        };
        match condition.rule {
            ConditionRule::Timer { started_at, duration } => {
                raw.start_time = Some(started_at);
                raw.seconds = Some(duration);
            },
            ConditionRule::VariableThreshold { variable_id, op, value } => {
                raw.var_id = Some(variable_id);
                raw.comparison = Some(op);
                raw.value = Some(value);
            },
            ConditionRule::MirrorSwitch {
                source_switch_id,
                trigger_state,
            } => {
                raw.switch_id = Some(source_switch_id);
                raw.trigger_state = Some(trigger_state);
            },
            ConditionRule::InventoryThreshold { item_id, op, quantity } => {
                raw.item_id = Some(item_id);
                raw.quantity_comparison = Some(op);
                raw.quantity = Some(quantity);
            },
        }
        raw
    }
}

/// Registry key: one condition of each kind per switch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConditionKey {
    pub kind: ConditionKind,
    pub switch: SwitchKey,
}

impl ConditionKey {
    pub fn new(kind: ConditionKind, switch: SwitchKey) -> Self {
        Self { kind, switch }
    }
}

/// Rendered as `kind:scope:owner:name`.
impl fmt::Display for ConditionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.switch)
    }
}

impl FromStr for ConditionKey {
    type Err = SwitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = |reason: &str| SwitchError::corrupt(s, reason);
        let mut parts = s.splitn(4, ':');
        let (Some(kind), Some(scope), Some(owner), Some(name)) = (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(bad("expected kind:scope:owner:name"));
        };
        let kind = kind.parse()?;
        let scope = scope.parse().map_err(|_| bad("scope is not a number"))?;
        let owner = owner.parse().map_err(|_| bad("owner is not a number"))?;
        if name.is_empty() {
            return Err(bad("switch name is empty"));
        }
        Ok(ConditionKey::new(kind, SwitchKey::new(scope, owner, name)))
    }
}

/// Per-kind totals, as shown by debug tooling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConditionStats {
    pub total: usize,
    pub timer: usize,
    pub variable: usize,
    pub game_switch: usize,
    pub inventory: usize,
    pub corrupt: usize,
}

/// All registered conditions.
#[derive(Debug, Clone, Default)]
pub struct ConditionRegistry {
    records: BTreeMap<ConditionKey, RawCondition>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a condition for `switch`, replacing any existing condition of the same kind.
    pub fn add(&mut self, switch: SwitchKey, condition: Condition) -> Option<RawCondition> {
        let key = ConditionKey::new(condition.kind(), switch);
        info!("condition registered: {key}");
        self.records.insert(key, condition.into())
    }

    /// Store a record as-is, damaged or not.
    pub fn insert_raw(&mut self, key: ConditionKey, record: RawCondition) -> Option<RawCondition> {
        self.records.insert(key, record)
    }

    pub fn remove(&mut self, kind: ConditionKind, switch: &SwitchKey) -> Option<RawCondition> {
        self.records.remove(&ConditionKey::new(kind, switch.clone()))
    }

    /// Drop every condition attached to `switch`. Returns how many were removed.
    pub fn remove_for_switch(&mut self, switch: &SwitchKey) -> usize {
        let before = self.records.len();
        self.records.retain(|key, _| &key.switch != switch);
        before - self.records.len()
    }

    /// Conditions attached to one switch.
    pub fn for_switch<'a>(&'a self, switch: &'a SwitchKey) -> impl Iterator<Item = (&'a ConditionKey, &'a RawCondition)> {
        self.records.iter().filter(move |(key, _)| &key.switch == switch)
    }

    /// Move every condition of `old` onto `new`. Conditions already on `new` are replaced.
    pub fn rekey(&mut self, old: &SwitchKey, new: &SwitchKey) -> usize {
        let moving: Vec<_> = self
            .records
            .keys()
            .filter(|key| &key.switch == old)
            .cloned()
            .collect();
        for key in &moving {
            if let Some(record) = self.records.remove(key) {
                self.records.insert(ConditionKey::new(key.kind, new.clone()), record);
            }
        }
        moving.len()
    }

    pub fn get(&self, key: &ConditionKey) -> Option<&RawCondition> {
        self.records.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConditionKey, &RawCondition)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Count registered conditions per kind.
    pub fn list_stats(&self) -> ConditionStats {
        let mut stats = ConditionStats {
            total: self.records.len(),
            ..ConditionStats::default()
        };
        for record in self.records.values() {
            match record.kind {
                Some(ConditionKind::Timer) => stats.timer += 1,
                Some(ConditionKind::Variable) => stats.variable += 1,
                Some(ConditionKind::GameSwitch) => stats.game_switch += 1,
                Some(ConditionKind::Inventory) => stats.inventory += 1,
                None => {},
            }
            if record.is_incomplete() {
                stats.corrupt += 1;
            }
        }
        stats
    }

    /// One line per condition for debug listings.
    pub fn describe(&self, now: i64) -> Vec<String> {
        self.records
            .iter()
            .map(|(key, record)| match record.to_condition(key) {
                Ok(condition) => format!("{key}: {}", condition.describe(now)),
                Err(e) => format!("{key}: {e}"),
            })
            .collect()
    }

    /// Maintenance sweep: drop damaged records and timers long past their deadline.
    ///
    /// A record is damaged if it cannot be cooked into a [`Condition`] or if its switch name
    /// fails [`validate_name`]. A timer is stale once more than `duration + grace_secs` has
    /// elapsed since it started.
    pub fn cleanup_invalid(&mut self, now: i64, grace_secs: i64, max_name_len: usize) -> usize {
        let doomed: Vec<_> = self
            .records
            .iter()
            .filter_map(|(key, record)| match record.to_condition(key) {
                Err(e) => {
                    warn!("removing corrupt condition: {e}");
                    Some(key.clone())
                },
                Ok(_) if validate_name(&key.switch.name, max_name_len).is_err() => {
                    warn!("removing condition {key}: switch name cannot be written");
                    Some(key.clone())
                },
                Ok(Condition {
                    rule: ConditionRule::Timer { started_at, duration },
                    ..
                }) if now.saturating_sub(started_at) > duration.saturating_add(grace_secs) => {
                    info!("removing stale timer condition {key}");
                    Some(key.clone())
                },
                Ok(_) => None,
            })
            .collect();
        for key in &doomed {
            self.records.remove(key);
        }
        if !doomed.is_empty() {
            info!("condition cleanup removed {} records", doomed.len());
        }
        doomed.len()
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }
}
