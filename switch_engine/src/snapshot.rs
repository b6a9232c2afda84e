//! Save-game snapshot of switch values, the switch registry, and conditions.
//!
//! Everything is stored as nested maps of plain values so the host's save pipeline can embed it
//! in whatever format it uses. Restoring never fails: a document that cannot be parsed restores
//! as empty state, and individual bad entries are skipped.

use std::collections::BTreeMap;

use log::{info, warn};
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};

use crate::condition::{ConditionKey, ConditionRegistry, RawCondition};
use crate::key::{SwitchKey, validate_name};
use crate::registry::SwitchRegistry;
use crate::store::SwitchStore;

/// `scope -> owner -> name -> value`
pub type SwitchValues = BTreeMap<i32, BTreeMap<i32, BTreeMap<String, bool>>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchSnapshot {
    #[serde(default)]
    pub switches: SwitchValues,
    /// `scope -> name -> owners`
    #[serde(default)]
    pub registry: BTreeMap<i32, BTreeMap<String, Vec<i32>>>,
    /// Keyed `kind:scope:owner:name`.
    #[serde(default)]
    pub conditions: BTreeMap<String, RawCondition>,
}

/// How much of a snapshot made it back in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub switches: usize,
    pub registry: usize,
    pub conditions: usize,
    pub skipped: usize,
}

impl SwitchSnapshot {
    pub fn capture(store: &SwitchStore, registry: &SwitchRegistry, conditions: &ConditionRegistry) -> Self {
        let mut switches = SwitchValues::new();
        for (key, value) in store.entries() {
            switches
                .entry(key.scope)
                .or_default()
                .entry(key.owner)
                .or_default()
                .insert(key.name.clone(), value);
        }
        let registry: BTreeMap<i32, BTreeMap<String, Vec<i32>>> = registry
            .query_all()
            .iter()
            .map(|(scope, names)| {
                let names: BTreeMap<String, Vec<i32>> = names
                    .iter()
                    .map(|(name, owners)| (name.clone(), owners.iter().copied().collect()))
                    .collect();
                (*scope, names)
            })
            .collect();
        let conditions: BTreeMap<String, RawCondition> = conditions
            .iter()
            .map(|(key, record)| (key.to_string(), record.clone()))
            .collect();
        Self {
            switches,
            registry,
            conditions,
        }
    }

    /// Replace the contents of all three stores with this snapshot.
    pub fn apply(
        &self,
        store: &mut SwitchStore,
        registry: &mut SwitchRegistry,
        conditions: &mut ConditionRegistry,
    ) -> RestoreReport {
        store.clear();
        registry.clear();
        conditions.clear();
        let mut report = RestoreReport::default();

        for (scope, owners) in &self.switches {
            for (owner, names) in owners {
                for (name, value) in names {
                    match store.restore(SwitchKey::new(*scope, *owner, name.as_str()), *value) {
                        Ok(()) => report.switches += 1,
                        Err(e) => {
                            warn!("snapshot: skipping switch value: {e}");
                            report.skipped += 1;
                        },
                    }
                }
            }
        }

        for (scope, names) in &self.registry {
            for (name, owners) in names {
                if let Err(e) = validate_name(name, store.max_name_len()) {
                    warn!("snapshot: skipping registry entry on map {scope}: {e}");
                    report.skipped += 1;
                    continue;
                }
                for owner in owners {
                    registry.register(*scope, name, *owner);
                }
                if !owners.is_empty() {
                    report.registry += 1;
                }
            }
        }

        for (text, record) in &self.conditions {
            let parsed = text
                .parse::<ConditionKey>()
                .and_then(|key| validate_name(&key.switch.name, store.max_name_len()).map(|()| key));
            match parsed {
                Ok(key) => {
                    conditions.insert_raw(key, record.clone());
                    report.conditions += 1;
                },
                Err(e) => {
                    warn!("snapshot: skipping condition: {e}");
                    report.skipped += 1;
                },
            }
        }

        info!(
            "snapshot restored: {} switch values, {} registry names, {} conditions ({} skipped)",
            report.switches, report.registry, report.conditions, report.skipped
        );
        report
    }

    /// Serialize as pretty RON.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, PrettyConfig::default())
    }

    /// Parse a RON snapshot strictly.
    ///
    /// # Errors
    /// Returns the parse error if the document does not have the snapshot shape.
    pub fn parse_ron(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    /// Parse a RON snapshot, falling back to an empty snapshot if it is malformed.
    pub fn from_ron(text: &str) -> Self {
        Self::parse_ron(text).unwrap_or_else(|e| {
            warn!("snapshot could not be parsed, starting from empty state: {e}");
            Self::default()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.switches.is_empty() && self.registry.is_empty() && self.conditions.is_empty()
    }
}
