//! The switch engine: store, registry, conditions and evaluator wired together.
//!
//! `SwitchEngine` is the single owner of switch state for a session. The host passes it in
//! explicitly to whatever needs it (menus, debug tools, the frame loop). Multi-store operations
//! such as renaming a switch check everything first and then apply, so a rejected operation
//! leaves all three stores untouched.

use std::collections::BTreeSet;

use log::{info, warn};
use switch_data::MapDef;

use crate::condition::{Condition, ConditionKey, ConditionRegistry};
use crate::config::EngineConfig;
use crate::error::SwitchError;
use crate::evaluator::{ChangeNotice, ConditionEvaluator, PassReport};
use crate::game_state::GameState;
use crate::key::{SwitchKey, validate_name};
use crate::map::{GameMap, RefreshReport};
use crate::registry::SwitchRegistry;
use crate::snapshot::{RestoreReport, SwitchSnapshot};
use crate::store::{SwitchState, SwitchStore};

/// What happened during one host frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Present when the evaluator ran a pass this tick.
    pub pass: Option<PassReport>,
    /// Present when the current map was refreshed.
    pub refresh: Option<RefreshReport>,
    /// Messages for condition changes on the current map.
    pub messages: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SwitchEngine {
    config: EngineConfig,
    store: SwitchStore,
    registry: SwitchRegistry,
    conditions: ConditionRegistry,
    evaluator: ConditionEvaluator,
}

impl Default for SwitchEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl SwitchEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            store: SwitchStore::with_max_name_len(config.max_name_len),
            registry: SwitchRegistry::new(),
            conditions: ConditionRegistry::new(),
            evaluator: ConditionEvaluator::new(config.check_interval_secs),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &SwitchStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SwitchStore {
        &mut self.store
    }

    pub fn registry(&self) -> &SwitchRegistry {
        &self.registry
    }

    pub fn conditions(&self) -> &ConditionRegistry {
        &self.conditions
    }

    pub fn conditions_mut(&mut self) -> &mut ConditionRegistry {
        &mut self.conditions
    }

    pub fn evaluator(&self) -> &ConditionEvaluator {
        &self.evaluator
    }

    pub fn get(&self, key: &SwitchKey) -> SwitchState {
        self.store.get(key)
    }

    /// # Errors
    /// - `InvalidSwitchName` if the key's name is not a valid custom name.
    pub fn set(&mut self, key: &SwitchKey, value: bool) -> Result<bool, SwitchError> {
        self.store.set(key, value)
    }

    /// Rebuild the switch registry from map definitions.
    pub fn scan<'a>(&mut self, maps: impl IntoIterator<Item = &'a MapDef>) -> usize {
        self.registry.scan(maps)
    }

    /// Build the runtime form of a map that is about to become current.
    pub fn load_map(&mut self, def: &MapDef) -> GameMap {
        self.store.take_dirty(def.id);
        GameMap::from_def(def)
    }

    /// Flag a map for page re-resolution, e.g. after an external client changed a switch.
    pub fn notify_map_changed(&mut self, scope: i32) {
        self.store.mark_dirty(scope);
    }

    /// One host frame: run the throttled condition pass, then refresh the current map if any
    /// write this tick (or earlier) touched it.
    pub fn tick(&mut self, now: i64, state: &dyn GameState, map: Option<&mut GameMap>) -> TickReport {
        let pass = self
            .evaluator
            .tick(now, &mut self.store, &mut self.conditions, state);
        let mut report = TickReport::default();

        if let Some(map) = map {
            if self.config.announce_changes
                && let Some(pass) = &pass
            {
                report.messages = pass
                    .notices
                    .iter()
                    .filter(|notice| notice.key.scope == map.id)
                    .map(ChangeNotice::message)
                    .collect();
            }
            if self.store.take_dirty(map.id) || map.need_refresh {
                report.refresh = Some(map.refresh(&mut self.store, state));
            }
        }
        report.pass = pass;
        report
    }

    /// Declare a new switch for one event, starting off.
    ///
    /// # Errors
    /// - `InvalidSwitchName` if `name` is not a valid custom name.
    /// - `NameCollision` if the map already declares `name`.
    pub fn create_switch(&mut self, scope: i32, name: &str, owner: i32) -> Result<(), SwitchError> {
        self.registry.create(scope, name, owner, self.store.max_name_len())?;
        self.store.set(&SwitchKey::new(scope, owner, name), false)?;
        info!("switch '{name}' created on map {scope} for event {owner}");
        Ok(())
    }

    /// Rename a switch for every event that declares it on a map. Values and conditions follow
    /// the switch. Returns the number of events affected.
    ///
    /// # Errors
    /// - `InvalidSwitchName` if either name is not a valid custom name.
    /// - `NameCollision` if `new_name` is already declared on the map, or if `overwrite` is false
    ///   and any event already holds a different value or a condition of a moving kind under
    ///   `new_name`.
    /// - `MissingScope` if `old_name` is not declared on the map.
    pub fn rename_switch(
        &mut self,
        scope: i32,
        old_name: &str,
        new_name: &str,
        overwrite: bool,
    ) -> Result<usize, SwitchError> {
        let max = self.store.max_name_len();
        validate_name(old_name, max)?;
        validate_name(new_name, max)?;
        let owners = self.declared_owners(scope, old_name)?;
        if old_name == new_name {
            return Ok(owners.len());
        }
        let collision = || SwitchError::NameCollision {
            scope,
            name: new_name.to_string(),
        };
        if self.registry.contains(scope, new_name) {
            return Err(collision());
        }
        let moves: Vec<(SwitchKey, SwitchKey)> = owners
            .iter()
            .map(|owner| (SwitchKey::new(scope, *owner, old_name), SwitchKey::new(scope, *owner, new_name)))
            .collect();
        if !overwrite {
            let values_differ = moves.iter().any(|(old, new)| {
                let target = self.store.get(new);
                !target.is_unset() && target != self.store.get(old)
            });
            if values_differ {
                warn!("rename of '{old_name}' to '{new_name}' on map {scope} refused: values differ");
                return Err(collision());
            }
            let conditions_clash = moves.iter().any(|(old, new)| {
                self.conditions
                    .for_switch(new)
                    .any(|(key, _)| self.conditions.get(&ConditionKey::new(key.kind, old.clone())).is_some())
            });
            if conditions_clash {
                warn!("rename of '{old_name}' to '{new_name}' on map {scope} refused: target already has conditions");
                return Err(collision());
            }
        }

        for (old, new) in &moves {
            self.store.rename(old, new, true)?;
            self.conditions.rekey(old, new);
        }
        self.registry.reassign(scope, old_name, new_name, max)?;
        info!(
            "switch '{old_name}' renamed to '{new_name}' on map {scope} ({} events)",
            moves.len()
        );
        Ok(moves.len())
    }

    /// Remove a switch from a map: its values, registry entry, and conditions.
    ///
    /// # Errors
    /// - `MissingScope` if `name` is not declared on the map.
    pub fn delete_switch(&mut self, scope: i32, name: &str) -> Result<usize, SwitchError> {
        let owners = self.declared_owners(scope, name)?;
        for owner in &owners {
            let key = SwitchKey::new(scope, *owner, name);
            self.store.delete(&key);
            self.conditions.remove_for_switch(&key);
        }
        self.registry.unregister(scope, name);
        info!("switch '{name}' deleted from map {scope} ({} events)", owners.len());
        Ok(owners.len())
    }

    /// Set a switch for every event that declares it on a map. Returns how many values changed.
    ///
    /// # Errors
    /// - `InvalidSwitchName` if `name` is not a valid custom name.
    /// - `MissingScope` if `name` is not declared on the map.
    pub fn set_for_all(&mut self, scope: i32, name: &str, value: bool) -> Result<usize, SwitchError> {
        validate_name(name, self.store.max_name_len())?;
        let owners = self.declared_owners(scope, name)?;
        let mut changed = 0;
        for owner in owners {
            if self.store.set(&SwitchKey::new(scope, owner, name), value)? {
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Attach a condition to a switch, replacing one of the same kind.
    ///
    /// # Errors
    /// - `InvalidSwitchName` if the switch name is not a valid custom name.
    pub fn add_condition(&mut self, switch: SwitchKey, condition: Condition) -> Result<(), SwitchError> {
        validate_name(&switch.name, self.store.max_name_len())?;
        self.conditions.add(switch, condition);
        Ok(())
    }

    /// Run the maintenance sweep over registered conditions.
    pub fn cleanup_invalid(&mut self, now: i64) -> usize {
        self.conditions
            .cleanup_invalid(now, self.config.stale_timer_grace_secs, self.store.max_name_len())
    }

    pub fn snapshot(&self) -> SwitchSnapshot {
        SwitchSnapshot::capture(&self.store, &self.registry, &self.conditions)
    }

    /// Replace all switch state with a snapshot. The next tick evaluates conditions immediately.
    pub fn restore(&mut self, snapshot: &SwitchSnapshot) -> RestoreReport {
        let report = snapshot.apply(&mut self.store, &mut self.registry, &mut self.conditions);
        self.evaluator.reset();
        report
    }

    fn declared_owners(&self, scope: i32, name: &str) -> Result<BTreeSet<i32>, SwitchError> {
        self.registry
            .owners(scope, name)
            .cloned()
            .ok_or(SwitchError::MissingScope { scope, owner: None })
    }
}
