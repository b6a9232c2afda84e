//! Registry of declared custom switches.
//!
//! Tracks which events declare which switch names on each map: `scope -> name -> owners`.
//! It is rebuilt from map definitions by [`SwitchRegistry::scan`] and then kept current by the
//! create/rename/delete operations. A `(scope, name)` pair never maps to an empty owner set.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};
use switch_data::MapDef;

use crate::annotation;
use crate::error::SwitchError;
use crate::key::{BuiltinSwitch, validate_name};

/// Names declared on one map, each with the events that declare it.
pub type ScopeSwitches = BTreeMap<String, BTreeSet<i32>>;

/// A search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchMatch {
    pub scope: i32,
    pub name: String,
    pub owners: BTreeSet<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct SwitchRegistry {
    scopes: BTreeMap<i32, ScopeSwitches>,
}

impl SwitchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the registry from scratch by scanning every event page of `maps`.
    ///
    /// Events or pages with missing data are skipped; reserved letters are never registered.
    /// Returns the number of `(scope, name, owner)` registrations made.
    pub fn scan<'a>(&mut self, maps: impl IntoIterator<Item = &'a MapDef>) -> usize {
        self.scopes.clear();
        let mut count = 0;
        for map in maps {
            for event in &map.events {
                if event.pages.is_empty() {
                    debug!("scan: map {} event {} has no pages, skipping", map.id, event.id);
                    continue;
                }
                for (index, slot) in event.pages.iter().enumerate() {
                    let Some(page) = slot else {
                        warn!("scan: map {} event {} page {} is missing", map.id, event.id, index + 1);
                        continue;
                    };
                    for found in annotation::parse_page(page) {
                        if BuiltinSwitch::from_name(&found.name).is_some() {
                            continue;
                        }
                        if self.register(map.id, &found.name, event.id) {
                            count += 1;
                        }
                    }
                }
            }
        }
        info!(
            "switch scan complete: {count} registrations across {} maps",
            self.scopes.len()
        );
        count
    }

    /// Record that `owner` declares `name` on map `scope`. Returns false if it already did.
    pub fn register(&mut self, scope: i32, name: &str, owner: i32) -> bool {
        self.scopes
            .entry(scope)
            .or_default()
            .entry(name.to_string())
            .or_default()
            .insert(owner)
    }

    /// Register a brand new switch name on a map.
    ///
    /// # Errors
    /// - `InvalidSwitchName` if `name` is not a valid custom name.
    /// - `NameCollision` if the map already declares `name`.
    pub fn create(&mut self, scope: i32, name: &str, owner: i32, max_name_len: usize) -> Result<(), SwitchError> {
        validate_name(name, max_name_len)?;
        if self.contains(scope, name) {
            return Err(SwitchError::NameCollision {
                scope,
                name: name.to_string(),
            });
        }
        self.register(scope, name, owner);
        Ok(())
    }

    /// Remove a name from a map entirely, returning the owners it had.
    pub fn unregister(&mut self, scope: i32, name: &str) -> Option<BTreeSet<i32>> {
        let switches = self.scopes.get_mut(&scope)?;
        let owners = switches.remove(name);
        if switches.is_empty() {
            self.scopes.remove(&scope);
        }
        owners
    }

    /// Remove a single owner from a name, pruning the name and the scope when they empty out.
    pub fn detach(&mut self, scope: i32, name: &str, owner: i32) -> bool {
        let Some(switches) = self.scopes.get_mut(&scope) else {
            return false;
        };
        let Some(owners) = switches.get_mut(name) else {
            return false;
        };
        let removed = owners.remove(&owner);
        if owners.is_empty() {
            switches.remove(name);
        }
        if switches.is_empty() {
            self.scopes.remove(&scope);
        }
        removed
    }

    /// Move every owner of `old_name` to `new_name` on the same map.
    ///
    /// # Errors
    /// - `InvalidSwitchName` if `new_name` is not a valid custom name.
    /// - `NameCollision` if `new_name` is already declared on the map.
    /// - `MissingScope` if `old_name` is not declared on the map.
    pub fn reassign(
        &mut self,
        scope: i32,
        old_name: &str,
        new_name: &str,
        max_name_len: usize,
    ) -> Result<BTreeSet<i32>, SwitchError> {
        validate_name(new_name, max_name_len)?;
        let Some(owners) = self.owners(scope, old_name).cloned() else {
            return Err(SwitchError::MissingScope { scope, owner: None });
        };
        if old_name == new_name {
            return Ok(owners);
        }
        if self.contains(scope, new_name) {
            return Err(SwitchError::NameCollision {
                scope,
                name: new_name.to_string(),
            });
        }
        self.unregister(scope, old_name);
        for owner in &owners {
            self.register(scope, new_name, *owner);
        }
        Ok(owners)
    }

    pub fn contains(&self, scope: i32, name: &str) -> bool {
        self.scopes.get(&scope).is_some_and(|s| s.contains_key(name))
    }

    pub fn owners(&self, scope: i32, name: &str) -> Option<&BTreeSet<i32>> {
        self.scopes.get(&scope)?.get(name)
    }

    /// Switches declared on one map.
    pub fn query(&self, scope: i32) -> Option<&ScopeSwitches> {
        self.scopes.get(&scope)
    }

    pub fn query_all(&self) -> &BTreeMap<i32, ScopeSwitches> {
        &self.scopes
    }

    /// Case-insensitive substring search over switch names on every map.
    pub fn search(&self, needle: &str) -> Vec<SwitchMatch> {
        let needle = needle.to_lowercase();
        self.scopes
            .iter()
            .flat_map(|(scope, switches)| {
                switches
                    .iter()
                    .filter(|(name, _)| name.to_lowercase().contains(&needle))
                    .map(|(name, owners)| SwitchMatch {
                        scope: *scope,
                        name: name.clone(),
                        owners: owners.clone(),
                    })
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.scopes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::DEFAULT_MAX_NAME_LEN;
    use switch_data::{CommandDef, EventDef, PageDef};

    fn page(comments: &[&str]) -> Option<PageDef> {
        Some(PageDef {
            list: Some(comments.iter().map(|c| CommandDef::comment(*c)).collect()),
            ..PageDef::default()
        })
    }

    fn sample_maps() -> Vec<MapDef> {
        vec![
            MapDef {
                id: 1,
                name: "Town".into(),
                events: vec![
                    EventDef {
                        id: 5,
                        name: "Door".into(),
                        pages: vec![page(&[]), page(&["Switch: DOOR: on"])],
                    },
                    EventDef {
                        id: 6,
                        name: "Door2".into(),
                        pages: vec![page(&["Switch: DOOR: off", "SelfSwitch: Lamp"])],
                    },
                    EventDef {
                        id: 7,
                        name: "Broken".into(),
                        pages: vec![None, Some(PageDef::default())],
                    },
                    EventDef {
                        id: 8,
                        name: "Empty".into(),
                        pages: Vec::new(),
                    },
                ],
            },
            MapDef {
                id: 2,
                name: "Cave".into(),
                events: vec![EventDef {
                    id: 1,
                    name: "Rock".into(),
                    pages: vec![page(&["Switch: A: on", "Switch: Boulder: on"])],
                }],
            },
        ]
    }

    #[test]
    fn scan_collects_names_and_skips_bad_records() {
        let mut registry = SwitchRegistry::new();
        let count = registry.scan(&sample_maps());
        assert_eq!(count, 4);
        let town = registry.query(1).expect("town scanned");
        assert_eq!(town["DOOR"], BTreeSet::from([5, 6]));
        assert_eq!(town["Lamp"], BTreeSet::from([6]));
        let cave = registry.query(2).expect("cave scanned");
        assert!(!cave.contains_key("A"));
        assert!(cave.contains_key("Boulder"));
    }

    #[test]
    fn scan_replaces_previous_contents() {
        let mut registry = SwitchRegistry::new();
        registry.register(9, "OLD", 1);
        registry.scan(&sample_maps());
        assert!(registry.query(9).is_none());
    }

    #[test]
    fn register_is_idempotent() {
        let mut registry = SwitchRegistry::new();
        assert!(registry.register(1, "DOOR", 5));
        assert!(!registry.register(1, "DOOR", 5));
        assert_eq!(registry.owners(1, "DOOR").map(BTreeSet::len), Some(1));
    }

    #[test]
    fn unregister_prunes_empty_scope() {
        let mut registry = SwitchRegistry::new();
        registry.register(1, "DOOR", 5);
        assert_eq!(registry.unregister(1, "DOOR"), Some(BTreeSet::from([5])));
        assert!(registry.query(1).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn detach_last_owner_prunes_name() {
        let mut registry = SwitchRegistry::new();
        registry.register(1, "DOOR", 5);
        registry.register(1, "LAMP", 5);
        assert!(registry.detach(1, "DOOR", 5));
        assert!(!registry.contains(1, "DOOR"));
        assert!(registry.contains(1, "LAMP"));
        assert!(!registry.detach(1, "DOOR", 5));
    }

    #[test]
    fn create_refuses_existing_names() {
        let mut registry = SwitchRegistry::new();
        registry.create(1, "DOOR", 5, DEFAULT_MAX_NAME_LEN).expect("create");
        assert_eq!(
            registry.create(1, "DOOR", 6, DEFAULT_MAX_NAME_LEN),
            Err(SwitchError::NameCollision {
                scope: 1,
                name: "DOOR".into()
            })
        );
        assert!(matches!(
            registry.create(1, "C", 6, DEFAULT_MAX_NAME_LEN),
            Err(SwitchError::InvalidSwitchName { .. })
        ));
    }

    #[test]
    fn reassign_moves_owners() {
        let mut registry = SwitchRegistry::new();
        registry.scan(&sample_maps());
        let moved = registry.reassign(1, "DOOR", "GATE", DEFAULT_MAX_NAME_LEN).expect("reassign");
        assert_eq!(moved, BTreeSet::from([5, 6]));
        assert!(!registry.contains(1, "DOOR"));
        assert_eq!(registry.owners(1, "GATE"), Some(&BTreeSet::from([5, 6])));
    }

    #[test]
    fn reassign_onto_existing_name_fails_untouched() {
        let mut registry = SwitchRegistry::new();
        registry.scan(&sample_maps());
        let err = registry.reassign(1, "DOOR", "Lamp", DEFAULT_MAX_NAME_LEN).expect_err("collision");
        assert_eq!(err.code(), "name_collision");
        assert!(registry.contains(1, "DOOR"));
        assert_eq!(registry.owners(1, "Lamp"), Some(&BTreeSet::from([6])));
        assert!(registry.reassign(1, "DOOR", "DOOR", DEFAULT_MAX_NAME_LEN).is_ok());
        assert!(matches!(
            registry.reassign(1, "NOPE", "X1", DEFAULT_MAX_NAME_LEN),
            Err(SwitchError::MissingScope { scope: 1, .. })
        ));
    }

    #[test]
    fn search_is_case_insensitive_across_scopes() {
        let mut registry = SwitchRegistry::new();
        registry.scan(&sample_maps());
        let hits = registry.search("O");
        let names: Vec<_> = hits.iter().map(|m| (m.scope, m.name.as_str())).collect();
        assert_eq!(names, vec![(1, "DOOR"), (2, "Boulder")]);
        assert!(registry.search("zzz").is_empty());
        assert_eq!(registry.search("LAMP")[0].owners, BTreeSet::from([6]));
    }
}
